//! `$ctx.…` substitution (§4.4). Per the redesign note in §9, a proper
//! first-class `ctx` binding in the evaluator's variable scope would be
//! preferable; this revision's hand-rolled evaluator does not yet expose
//! scoped bindings, so we fall back to the source's textual-rewrite
//! approach — but behind one well-tested regex instead of ad hoc string
//! splicing, and with an explicit, documented choice for the unresolved
//! case (§9 open question): unresolved tokens resolve to JSON `null`.

use crate::mapping::TransformationContext;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn ctx_token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"\$ctx\.settings\[\s*(?:'([^']*)'|"([^"]*)")\s*\]|\$ctx\.([A-Za-z_][A-Za-z0-9_]*)"#,
        )
        .expect("static $ctx pattern compiles")
    })
}

/// Returns `Some(value)` when `text` is *exactly* one `$ctx.…` token with no
/// surrounding characters — the `defaultValue`-is-a-bare-reference case,
/// where the resolved object (not a stringified literal) is returned.
pub fn resolve_whole_token(text: &str, ctx: &TransformationContext) -> Option<Value> {
    let re = ctx_token_pattern();
    let m = re.find(text)?;
    if m.start() != 0 || m.end() != text.len() {
        return None;
    }
    let caps = re.captures(text)?;
    Some(resolve_capture(&caps, ctx))
}

fn resolve_capture(caps: &Captures, ctx: &TransformationContext) -> Value {
    if let Some(key) = caps.get(1).or_else(|| caps.get(2)) {
        return ctx
            .settings
            .get(key.as_str())
            .map(|s| Value::String(s.clone()))
            .unwrap_or(Value::Null);
    }
    let name = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    match name {
        "organizationId" => ctx.organization_id.clone().map(Value::String).unwrap_or(Value::Null),
        "facilityId" => ctx.facility_id.clone().map(Value::String).unwrap_or(Value::Null),
        "tenantId" => ctx.tenant_id.clone().map(Value::String).unwrap_or(Value::Null),
        other => ctx.variables.get(other).cloned().unwrap_or(Value::Null),
    }
}

/// Substitute every `$ctx.…` token in an expression string with a properly
/// quoted expression literal (strings quoted, numbers/booleans/null bare),
/// ready to be fed to the expression parser (§4.3).
pub fn substitute_for_expression(expr: &str, ctx: &TransformationContext) -> String {
    ctx_token_pattern()
        .replace_all(expr, |caps: &Captures| value_to_literal(&resolve_capture(caps, ctx)))
        .into_owned()
}

/// Substitute every `$ctx.…` token in a plain (non-expression) template
/// string — used for `defaultValue` strings that embed a token alongside
/// other literal text (e.g. `"urn:oid:$ctx.settings['x']"`).
pub fn substitute_for_template(text: &str, ctx: &TransformationContext) -> String {
    ctx_token_pattern()
        .replace_all(text, |caps: &Captures| value_to_raw_text(&resolve_capture(caps, ctx)))
        .into_owned()
}

fn value_to_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", escape_for_literal(s)),
        other => format!("\"{}\"", escape_for_literal(&other.to_string())),
    }
}

fn value_to_raw_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_for_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
