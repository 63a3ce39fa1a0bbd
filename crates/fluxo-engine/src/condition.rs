//! Conditional expression evaluation.
//!
//! Expressions are interpolated before they reach this module, so the
//! grammar is deliberately small: `||` at the lowest precedence, then `&&`,
//! then simple atoms (numeric comparisons, string equality with optional
//! quotes, boolean literals, fallback truthiness). Evaluation never raises;
//! anything unparseable is logged and treated as false.

use serde_json::Value;
use tracing::warn;

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Atom(Atom),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Literal(bool),
    Numeric { lhs: f64, op: CmpOp, rhs: f64 },
    StringEq { lhs: String, rhs: String, negated: bool },
    Truthy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

/// Operator spellings, longest first so `===` wins over `==` and `>=` over `>`.
const OPERATORS: &[&str] = &["===", "!==", ">=", "<=", "==", "!=", ">", "<"];

/// Evaluate an already-interpolated expression string.
pub fn evaluate(expression: &str) -> bool {
    match parse(expression) {
        Ok(expr) => eval(&expr),
        Err(reason) => {
            warn!(expression, reason, "condition did not parse, treating as false");
            false
        }
    }
}

/// Evaluate an interpolated condition value. Full-reference interpolation
/// can produce non-strings; only strings go through the parser.
pub fn evaluate_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => evaluate(s),
        Value::Null => false,
        _ => true,
    }
}

/// Parse into an [`Expr`] tree: `or := and ("||" and)*`, `and := atom ("&&" atom)*`.
pub fn parse(expression: &str) -> Result<Expr, String> {
    let clauses = expression
        .split("||")
        .map(parse_and)
        .collect::<Result<Vec<_>, _>>()?;
    if clauses.len() == 1 {
        Ok(clauses.into_iter().next().unwrap_or(Expr::Atom(Atom::Literal(false))))
    } else {
        Ok(Expr::Or(clauses))
    }
}

fn parse_and(clause: &str) -> Result<Expr, String> {
    let atoms = clause
        .split("&&")
        .map(|part| parse_atom(part.trim()).map(Expr::Atom))
        .collect::<Result<Vec<_>, _>>()?;
    if atoms.len() == 1 {
        Ok(atoms.into_iter().next().unwrap_or(Expr::Atom(Atom::Literal(false))))
    } else {
        Ok(Expr::And(atoms))
    }
}

fn parse_atom(atom: &str) -> Result<Atom, String> {
    match atom {
        "true" => return Ok(Atom::Literal(true)),
        "false" => return Ok(Atom::Literal(false)),
        _ => {}
    }

    for op in OPERATORS {
        if let Some(idx) = atom.find(op) {
            let lhs = atom[..idx].trim();
            let rhs = atom[idx + op.len()..].trim();
            return parse_comparison(lhs, op, rhs);
        }
    }

    Ok(Atom::Truthy(atom.to_string()))
}

fn parse_comparison(lhs: &str, op: &str, rhs: &str) -> Result<Atom, String> {
    if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        let op = match op {
            ">" => CmpOp::Gt,
            "<" => CmpOp::Lt,
            ">=" => CmpOp::Ge,
            "<=" => CmpOp::Le,
            "==" | "===" => CmpOp::Eq,
            "!=" | "!==" => CmpOp::Ne,
            other => return Err(format!("unknown operator '{}'", other)),
        };
        return Ok(Atom::Numeric { lhs: l, op, rhs: r });
    }

    // Ordering operators are numeric-only.
    match op {
        "==" | "===" => Ok(Atom::StringEq {
            lhs: unquote(lhs).to_string(),
            rhs: unquote(rhs).to_string(),
            negated: false,
        }),
        "!=" | "!==" => Ok(Atom::StringEq {
            lhs: unquote(lhs).to_string(),
            rhs: unquote(rhs).to_string(),
            negated: true,
        }),
        other => Err(format!(
            "operator '{}' needs numeric operands, got '{}' and '{}'",
            other, lhs, rhs
        )),
    }
}

fn unquote(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

fn eval(expr: &Expr) -> bool {
    match expr {
        Expr::Or(clauses) => clauses.iter().any(eval),
        Expr::And(atoms) => atoms.iter().all(eval),
        Expr::Atom(atom) => eval_atom(atom),
    }
}

fn eval_atom(atom: &Atom) -> bool {
    match atom {
        Atom::Literal(b) => *b,
        Atom::Numeric { lhs, op, rhs } => match op {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        },
        Atom::StringEq { lhs, rhs, negated } => (lhs == rhs) != *negated,
        Atom::Truthy(word) => fallback_truthy(word),
    }
}

/// The single home of fallback truthiness for words that are not
/// comparisons or literals.
fn fallback_truthy(word: &str) -> bool {
    match word.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" | "" => false,
        _ => true,
    }
}
