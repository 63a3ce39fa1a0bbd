//! Retry runner: exponential backoff with optional jitter around any inner
//! node, with a full attempt history on the trace entry.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{info, warn};

use fluxo_core::{
    ExecutionContext, RetryAttemptRecord, RetryAttemptStatus, TraceId, TraceKind, TraceStatus,
};

use crate::error::{EngineError, RetryContext, RetryFailureReason};
use crate::flow::RetrySpec;
use crate::orchestrator::Orchestrator;

use super::dispatch;

pub(crate) async fn run(
    orch: &Orchestrator,
    ctx: &mut ExecutionContext,
    spec: &RetrySpec,
    parent: Option<TraceId>,
) -> Result<(), EngineError> {
    let entry = ctx.trace.open(&spec.name, TraceKind::Retry, parent);
    let policy = &spec.policy;

    let mut attempts: Vec<RetryAttemptRecord> = Vec::new();
    let mut attempt: u32 = 1;
    let outcome = loop {
        let attempt_started = Instant::now();
        let result = dispatch(orch, ctx, &spec.inner, Some(entry)).await;
        let duration_ms = attempt_started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                attempts.push(RetryAttemptRecord {
                    attempt,
                    status: RetryAttemptStatus::Success,
                    wait_time_seconds: None,
                    duration_ms,
                    error_type: None,
                    message: None,
                });
                break Ok(());
            }
            Err(mut err) => {
                let error_type = err.error_type().to_string();
                let message = err.to_string();

                // Configuration errors are never retried.
                let config_error = !matches!(err, EngineError::StepFailed { .. });
                if config_error {
                    attempts.push(failed_attempt(
                        attempt,
                        RetryAttemptStatus::Error,
                        duration_ms,
                        &error_type,
                        &message,
                    ));
                    break Err(err);
                }

                if !policy.is_retryable(&error_type) {
                    attempts.push(failed_attempt(
                        attempt,
                        RetryAttemptStatus::Failed,
                        duration_ms,
                        &error_type,
                        &message,
                    ));
                    warn!(step = %spec.name, error_type = %error_type, "error type is not retryable");
                    enrich(&mut err, attempt, policy.max_attempts, RetryFailureReason::NotRetryable);
                    break Err(err);
                }

                if attempt >= policy.max_attempts {
                    attempts.push(failed_attempt(
                        attempt,
                        RetryAttemptStatus::Failed,
                        duration_ms,
                        &error_type,
                        &message,
                    ));
                    warn!(step = %spec.name, attempts = attempt, "retry attempts exhausted");
                    enrich(
                        &mut err,
                        attempt,
                        policy.max_attempts,
                        RetryFailureReason::MaxAttemptsReached,
                    );
                    break Err(err);
                }

                let mut wait = policy.wait_seconds(attempt);
                if policy.jitter > 0.0 {
                    wait += policy.jitter * wait * rand::random::<f64>();
                }
                attempts.push(RetryAttemptRecord {
                    attempt,
                    status: RetryAttemptStatus::Retrying,
                    wait_time_seconds: Some(wait),
                    duration_ms,
                    error_type: Some(error_type.clone()),
                    message: Some(message),
                });
                info!(
                    step = %spec.name,
                    attempt,
                    wait_seconds = wait,
                    error_type = %error_type,
                    "step failed, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
                attempt += 1;
            }
        }
    };

    let meta = retry_meta(&attempts, policy.max_attempts);
    match outcome {
        Ok(()) => {
            ctx.trace.close_with_meta(entry, TraceStatus::Success, meta);
            Ok(())
        }
        Err(err) => {
            ctx.trace.close_with_meta(entry, TraceStatus::Failed, meta);
            Err(err)
        }
    }
}

fn failed_attempt(
    attempt: u32,
    status: RetryAttemptStatus,
    duration_ms: u64,
    error_type: &str,
    message: &str,
) -> RetryAttemptRecord {
    RetryAttemptRecord {
        attempt,
        status,
        wait_time_seconds: None,
        duration_ms,
        error_type: Some(error_type.to_string()),
        message: Some(message.to_string()),
    }
}

fn enrich(err: &mut EngineError, attempts_executed: u32, max_attempts: u32, reason: RetryFailureReason) {
    if let EngineError::StepFailed { retry_context, .. } = err {
        *retry_context = Some(RetryContext {
            attempts_executed,
            max_attempts,
            reason,
        });
    }
}

fn retry_meta(attempts: &[RetryAttemptRecord], max_attempts: u32) -> serde_json::Value {
    let total_duration_ms: u64 = attempts.iter().map(|a| a.duration_ms).sum();
    let success_attempt = attempts
        .iter()
        .find(|a| a.status == RetryAttemptStatus::Success)
        .map(|a| a.attempt);
    let avg = if attempts.is_empty() {
        0
    } else {
        total_duration_ms / attempts.len() as u64
    };
    json!({
        "retryAttempts": attempts,
        "maxAttempts": max_attempts,
        "retryStats": {
            "attemptsCount": attempts.len(),
            "totalDurationMs": total_duration_ms,
            "avgAttemptDurationMs": avg,
            "successAttempt": success_attempt,
        },
    })
}
