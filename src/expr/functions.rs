//! `fn.*` builtin functions (§4.3): `uppercase`, `lowercase`, `trim`,
//! `substring`, `concat`, `replace`, `formatDate`. All are null-safe: a
//! `null` argument anywhere propagates to a `null` result rather than
//! raising an error, matching the source systems' permissive behaviour the
//! specification asks for.

use crate::tree::TreeValue;
use crate::utils::error::{EngineError, EngineResult};
use chrono::{DateTime, NaiveDate};

pub fn call(name: &str, args: &[TreeValue]) -> EngineResult<TreeValue> {
    match name {
        "uppercase" => unary_string(args, name, |s| s.to_uppercase()),
        "lowercase" => unary_string(args, name, |s| s.to_lowercase()),
        "trim" => unary_string(args, name, |s| s.trim().to_string()),
        "substring" => substring(args),
        "concat" => concat(args),
        "replace" => replace(args),
        "formatDate" => format_date(args),
        other => Err(EngineError::Expression {
            expression: format!("fn.{}(...)", other),
            message: format!("unknown function '{}'", other),
        }),
    }
}

fn unary_string(
    args: &[TreeValue],
    name: &str,
    f: impl FnOnce(&str) -> String,
) -> EngineResult<TreeValue> {
    require_arity(name, args, 1)?;
    if args[0].is_null() {
        return Ok(TreeValue::Null);
    }
    let s = args[0].as_str().ok_or_else(|| wrong_type(name, 0))?;
    Ok(TreeValue::String(f(s)))
}

/// `fn.substring(value, start, end)` — end-exclusive, 0-based, clamped to
/// the string's length; `end` may be omitted to mean "to the end".
fn substring(args: &[TreeValue]) -> EngineResult<TreeValue> {
    if args.len() != 2 && args.len() != 3 {
        return Err(arity_error("substring", args.len(), "2 or 3"));
    }
    if args[0].is_null() {
        return Ok(TreeValue::Null);
    }
    let s = args[0].as_str().ok_or_else(|| wrong_type("substring", 0))?;
    let chars: Vec<char> = s.chars().collect();
    let start = as_usize(&args[1], "substring", 1)?.min(chars.len());
    let end = if args.len() == 3 {
        as_usize(&args[2], "substring", 2)?.min(chars.len())
    } else {
        chars.len()
    };
    if start >= end {
        return Ok(TreeValue::String(String::new()));
    }
    Ok(TreeValue::String(chars[start..end].iter().collect()))
}

/// `fn.concat(a, b, ...)` — stringifies each argument and joins with no
/// separator; any `null` argument contributes an empty string.
fn concat(args: &[TreeValue]) -> EngineResult<TreeValue> {
    let mut out = String::new();
    for arg in args {
        if !arg.is_null() {
            out.push_str(&arg.stringify());
        }
    }
    Ok(TreeValue::String(out))
}

fn replace(args: &[TreeValue]) -> EngineResult<TreeValue> {
    require_arity("replace", args, 3)?;
    if args[0].is_null() {
        return Ok(TreeValue::Null);
    }
    let s = args[0].as_str().ok_or_else(|| wrong_type("replace", 0))?;
    let from = args[1].as_str().ok_or_else(|| wrong_type("replace", 1))?;
    let to = args[2].as_str().ok_or_else(|| wrong_type("replace", 2))?;
    Ok(TreeValue::String(s.replace(from, to)))
}

/// `fn.formatDate(value, pattern)` — `value` is parsed as RFC 3339/ISO 8601,
/// falling back to a bare `%Y-%m-%d` date; `pattern` is a `strftime` dialect
/// string. Returns `null` if `value` fails to parse either way, per §6's
/// resolved behaviour.
fn format_date(args: &[TreeValue]) -> EngineResult<TreeValue> {
    require_arity("formatDate", args, 2)?;
    if args[0].is_null() {
        return Ok(TreeValue::Null);
    }
    let raw = args[0].as_str().ok_or_else(|| wrong_type("formatDate", 0))?;
    let pattern = args[1].as_str().ok_or_else(|| wrong_type("formatDate", 1))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(TreeValue::String(dt.format(pattern).to_string()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(TreeValue::String(date.format(pattern).to_string()));
    }
    Ok(TreeValue::Null)
}

fn as_usize(value: &TreeValue, fn_name: &str, position: usize) -> EngineResult<usize> {
    match value {
        TreeValue::Number(n) => n
            .as_f64()
            .filter(|f| *f >= 0.0)
            .map(|f| f as usize)
            .ok_or_else(|| wrong_type(fn_name, position)),
        _ => Err(wrong_type(fn_name, position)),
    }
}

fn require_arity(name: &str, args: &[TreeValue], expected: usize) -> EngineResult<()> {
    if args.len() != expected {
        return Err(arity_error(name, args.len(), &expected.to_string()));
    }
    Ok(())
}

fn arity_error(name: &str, got: usize, expected: &str) -> EngineError {
    EngineError::Expression {
        expression: format!("fn.{}(...)", name),
        message: format!("expected {} argument(s), got {}", expected, got),
    }
}

fn wrong_type(name: &str, position: usize) -> EngineError {
    EngineError::Expression {
        expression: format!("fn.{}(...)", name),
        message: format!("argument {} has the wrong type", position),
    }
}
