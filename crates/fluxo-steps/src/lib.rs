//! Built-in step implementations.
//!
//! This crate provides the basic step catalog:
//! - `mapper` - Shape data between context origins
//! - `validator` - Validate a context origin against a JSON Schema
//! - `http_request` - Make HTTP requests
//! - `debug` - Log a message and an optional context value

mod debug;
mod http;
mod mapper;
mod validator;

pub use self::debug::DebugStep;
pub use self::http::HttpRequestStep;
pub use self::mapper::MapperStep;
pub use self::validator::ValidatorStep;

use fluxo_core::StepRegistry;

/// Create a step registry with all built-in steps registered.
pub fn create_default_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();

    registry.register(MapperStep::new());
    registry.register(ValidatorStep::new());
    registry.register(HttpRequestStep::new());
    registry.register(DebugStep::new());

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contents() {
        let registry = create_default_registry();
        assert_eq!(
            registry.names(),
            vec!["debug", "http_request", "mapper", "validator"]
        );
    }
}
