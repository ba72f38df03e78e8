//! The expression sublanguage (§4.3): literals, variable references, member
//! access, list indexing, arithmetic/comparison/boolean/string-concat
//! operators, and `fn.*`/`fn:*` function calls. Enrichment source: the
//! teacher repo has no expression language of its own, so the parser
//! combinator choice (`nom`) and overall tokenizer-free recursive-descent
//! shape follow `octofhir-fhirpath-rs`'s `fhirpath-parser` crate, scoped
//! down to this grammar — this is NOT a FHIRPath port, only a small
//! sandboxed sublanguage with no reflective or host-process capability.

pub mod context;
pub mod functions;

use crate::tree::TreeValue;
use crate::utils::error::{EngineError, EngineResult};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of},
    combinator::{cut, map, opt, recognize, value},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Var(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// A process-wide cache of parsed expressions keyed by `(source, arity)`,
/// per §9's recommendation. `arity` here is simply the binding count the
/// caller intends to evaluate against (currently always the same shape per
/// field mapping, but kept in the key so two different call sites never
/// collide on incompatible assumptions).
fn parse_cache() -> &'static Mutex<HashMap<(String, usize), Expr>> {
    static CACHE: OnceLock<Mutex<HashMap<(String, usize), Expr>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

pub fn parse_cached(source: &str, arity: usize) -> EngineResult<Expr> {
    let key = (source.to_string(), arity);
    if let Some(expr) = parse_cache().lock().unwrap().get(&key) {
        return Ok(expr.clone());
    }
    let expr = parse(source)?;
    parse_cache().lock().unwrap().insert(key, expr.clone());
    Ok(expr)
}

pub fn parse(source: &str) -> EngineResult<Expr> {
    let (rest, expr) = delimited(multispace0, parse_or, multispace0)(source).map_err(|e| {
        EngineError::Expression {
            expression: source.to_string(),
            message: format!("parse error: {}", e),
        }
    })?;
    if !rest.is_empty() {
        return Err(EngineError::Expression {
            expression: source.to_string(),
            message: format!("unexpected trailing input: '{}'", rest),
        });
    }
    Ok(expr)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_and(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), parse_and))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, rhs| {
        Expr::Binary(BinOp::Or, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_equality(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), parse_equality))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, rhs| {
        Expr::Binary(BinOp::And, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_equality(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_relational(input)?;
    let (input, rest) = many0(pair(
        ws(alt((tag("=="), tag("!=")))),
        parse_relational,
    ))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, (op, rhs)| {
        let op = if op == "==" { BinOp::Eq } else { BinOp::Ne };
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_relational(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_additive(input)?;
    let (input, rest) = many0(pair(
        ws(alt((tag("<="), tag(">="), tag("<"), tag(">")))),
        parse_additive,
    ))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, (op, rhs)| {
        let op = match op {
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "<" => BinOp::Lt,
            _ => BinOp::Gt,
        };
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_multiplicative(input)?;
    let (input, rest) = many0(pair(ws(alt((tag("+"), tag("-")))), parse_multiplicative))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, (op, rhs)| {
        let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_unary(input)?;
    let (input, rest) = many0(pair(ws(alt((tag("*"), tag("/")))), parse_unary))(input)?;
    Ok((input, rest.into_iter().fold(first, |acc, (op, rhs)| {
        let op = if op == "*" { BinOp::Mul } else { BinOp::Div };
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    })))
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), parse_unary), |e| Expr::Not(Box::new(e))),
        map(preceded(ws(char('-')), parse_unary), |e| Expr::Neg(Box::new(e))),
        parse_postfix,
    ))(input)
}

fn parse_postfix(input: &str) -> IResult<&str, Expr> {
    let (input, base) = parse_primary(input)?;
    let (input, suffixes) = many0(alt((
        map(preceded(ws(char('.')), identifier), PostfixOp::Member),
        map(
            delimited(ws(char('[')), parse_or, ws(char(']'))),
            PostfixOp::Index,
        ),
    )))(input)?;
    Ok((
        input,
        suffixes.into_iter().fold(base, |acc, op| match op {
            PostfixOp::Member(name) => Expr::Member(Box::new(acc), name),
            PostfixOp::Index(idx) => Expr::Index(Box::new(acc), Box::new(idx)),
        }),
    ))
}

enum PostfixOp {
    Member(String),
    Index(Expr),
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        parse_call,
        parse_number,
        parse_string,
        parse_bool,
        parse_null,
        parse_paren,
        parse_var,
    )))(input)
}

fn parse_paren(input: &str) -> IResult<&str, Expr> {
    delimited(ws(char('(')), parse_or, ws(cut(char(')'))))(input)
}

fn identifier(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn dotted_path(input: &str) -> IResult<&str, Vec<String>> {
    map(
        pair(identifier, many0(preceded(char('.'), identifier))),
        |(first, rest)| {
            let mut parts = vec![first];
            parts.extend(rest);
            parts
        },
    )(input)
}

/// `fn.name(args)` or the concrete scenario syntax `fn:name(args)`.
fn parse_call(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("fn")(input)?;
    let (input, _) = alt((char('.'), char(':')))(input)?;
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), parse_or),
        ws(cut(char(')'))),
    )(input)?;
    Ok((input, Expr::Call(name, args)))
}

fn parse_number(input: &str) -> IResult<&str, Expr> {
    map(double, Expr::Number)(input)
}

fn parse_string(input: &str) -> IResult<&str, Expr> {
    alt((quoted('\''), quoted('"')))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> IResult<&'a str, Expr> {
    move |input: &'a str| {
        let (input, s) = delimited(
            char(quote),
            opt(escaped_transform(
                none_of(match quote {
                    '\'' => "\\'",
                    _ => "\\\"",
                }),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('\'', char('\'')),
                    value('"', char('"')),
                    value('\n', char('n')),
                )),
            )),
            char(quote),
        )(input)?;
        Ok((input, Expr::Str(s.unwrap_or_default())))
    }
}

fn parse_bool(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::Bool(true), tag("true")),
        value(Expr::Bool(false), tag("false")),
    ))(input)
}

fn parse_null(input: &str) -> IResult<&str, Expr> {
    value(Expr::Null, tag("null"))(input)
}

fn parse_var(input: &str) -> IResult<&str, Expr> {
    map(dotted_path, |parts| {
        let mut iter = parts.into_iter();
        let first = iter.next().expect("dotted_path yields at least one part");
        iter.fold(Expr::Var(first), |acc, part| Expr::Member(Box::new(acc), part))
    })(input)
}

// Silence unused-import warnings for helpers only used through combinators.
#[allow(unused_imports)]
use {digit1 as _, is_not as _, take_while1 as _, tuple as _};

/// Evaluation bindings: top-level document keys plus the `value` placeholder.
pub struct Bindings<'a> {
    pub document: &'a TreeValue,
    pub value: Option<&'a TreeValue>,
}

pub fn eval(expr: &Expr, bindings: &Bindings) -> EngineResult<TreeValue> {
    match expr {
        Expr::Null => Ok(TreeValue::Null),
        Expr::Bool(b) => Ok(TreeValue::Bool(*b)),
        Expr::Number(n) => Ok(TreeValue::from(*n)),
        Expr::Str(s) => Ok(TreeValue::String(s.clone())),
        Expr::Var(name) => Ok(resolve_var(name, bindings)),
        Expr::Member(base, name) => {
            let base_val = eval(base, bindings)?;
            Ok(base_val
                .as_map()
                .and_then(|m| m.get(name))
                .cloned()
                .unwrap_or(TreeValue::Null))
        }
        Expr::Index(base, idx) => {
            let base_val = eval(base, bindings)?;
            let idx_val = eval(idx, bindings)?;
            let idx = as_index(&idx_val)?;
            Ok(base_val
                .as_list()
                .and_then(|l| l.get(idx))
                .cloned()
                .unwrap_or(TreeValue::Null))
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, bindings))
                .collect::<EngineResult<Vec<_>>>()?;
            functions::call(name, &values)
        }
        Expr::Not(inner) => Ok(TreeValue::Bool(!eval(inner, bindings)?.truthy())),
        Expr::Neg(inner) => {
            let v = eval(inner, bindings)?;
            let n = as_number(&v)?;
            Ok(TreeValue::from(-n))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, bindings),
    }
}

fn resolve_var(name: &str, bindings: &Bindings) -> TreeValue {
    if name == "value" {
        return bindings.value.cloned().unwrap_or(TreeValue::Null);
    }
    bindings
        .document
        .as_map()
        .and_then(|m| m.get(name))
        .cloned()
        .unwrap_or(TreeValue::Null)
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, bindings: &Bindings) -> EngineResult<TreeValue> {
    match op {
        BinOp::And => {
            let l = eval(lhs, bindings)?;
            if !l.truthy() {
                return Ok(TreeValue::Bool(false));
            }
            Ok(TreeValue::Bool(eval(rhs, bindings)?.truthy()))
        }
        BinOp::Or => {
            let l = eval(lhs, bindings)?;
            if l.truthy() {
                return Ok(TreeValue::Bool(true));
            }
            Ok(TreeValue::Bool(eval(rhs, bindings)?.truthy()))
        }
        _ => {
            let l = eval(lhs, bindings)?;
            let r = eval(rhs, bindings)?;
            eval_binary_values(op, &l, &r)
        }
    }
}

fn eval_binary_values(op: BinOp, l: &TreeValue, r: &TreeValue) -> EngineResult<TreeValue> {
    use BinOp::*;
    match op {
        Eq => Ok(TreeValue::Bool(l.to_json() == r.to_json())),
        Ne => Ok(TreeValue::Bool(l.to_json() != r.to_json())),
        Add => {
            if let (Ok(a), Ok(b)) = (as_number(l), as_number(r)) {
                Ok(TreeValue::from(a + b))
            } else {
                Ok(TreeValue::String(format!("{}{}", l.stringify(), r.stringify())))
            }
        }
        Sub => Ok(TreeValue::from(as_number(l)? - as_number(r)?)),
        Mul => Ok(TreeValue::from(as_number(l)? * as_number(r)?)),
        Div => Ok(TreeValue::from(as_number(l)? / as_number(r)?)),
        Lt | Le | Gt | Ge => compare_ordered(op, l, r),
        And | Or => unreachable!("handled with short-circuit above"),
    }
}

fn compare_ordered(op: BinOp, l: &TreeValue, r: &TreeValue) -> EngineResult<TreeValue> {
    use std::cmp::Ordering;
    let ordering = match (as_number(l), as_number(r)) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => l.stringify().partial_cmp(&r.stringify()),
    };
    let ordering = ordering.unwrap_or(Ordering::Equal);
    let result = match op {
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    Ok(TreeValue::Bool(result))
}

pub fn as_number(value: &TreeValue) -> EngineResult<f64> {
    match value {
        TreeValue::Number(n) => n.as_f64().ok_or_else(|| not_a_number(value)),
        _ => Err(not_a_number(value)),
    }
}

fn as_index(value: &TreeValue) -> EngineResult<usize> {
    let n = as_number(value)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(EngineError::Expression {
            expression: value.stringify(),
            message: "index must be a non-negative integer".into(),
        });
    }
    Ok(n as usize)
}

fn not_a_number(value: &TreeValue) -> EngineError {
    EngineError::Expression {
        expression: value.stringify(),
        message: "expected a number".into(),
    }
}

/// Evaluate `condition` against the source document: `null` and missing
/// coerce to `false`, any other result coerces via standard truthiness.
pub fn eval_condition(source: &Expr, document: &TreeValue) -> EngineResult<bool> {
    let bindings = Bindings { document, value: None };
    Ok(eval(source, &bindings)?.truthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> TreeValue {
        TreeValue::from_json(value)
    }

    #[test]
    fn parses_and_evaluates_literals() {
        let expr = parse("1 + 2 * 3").unwrap();
        let bindings = Bindings { document: &TreeValue::empty_map(), value: None };
        assert_eq!(eval(&expr, &bindings).unwrap().to_json(), json!(7.0));
    }

    #[test]
    fn variable_and_member_access() {
        let d = doc(json!({"ssn": "123", "address": {"city": "SP"}}));
        let expr = parse("address.city").unwrap();
        let bindings = Bindings { document: &d, value: None };
        assert_eq!(eval(&expr, &bindings).unwrap().to_json(), json!("SP"));
    }

    #[test]
    fn condition_null_is_false() {
        let d = doc(json!({}));
        let expr = parse("ssn != null").unwrap();
        assert!(!eval_condition(&expr, &d).unwrap());
    }

    #[test]
    fn condition_present_is_true() {
        let d = doc(json!({"ssn": "999-99"}));
        let expr = parse("ssn != null").unwrap();
        assert!(eval_condition(&expr, &d).unwrap());
    }

    #[test]
    fn function_call_with_dot_namespace() {
        let expr = parse("fn.uppercase(value)").unwrap();
        let document = TreeValue::empty_map();
        let value = TreeValue::String("doe".into());
        let bindings = Bindings { document: &document, value: Some(&value) };
        assert_eq!(eval(&expr, &bindings).unwrap().to_json(), json!("DOE"));
    }

    #[test]
    fn function_call_with_colon_namespace_from_scenario_six() {
        let expr = parse("fn:uppercase(value)").unwrap();
        let document = TreeValue::empty_map();
        let value = TreeValue::String("Doe".into());
        let bindings = Bindings { document: &document, value: Some(&value) };
        assert_eq!(eval(&expr, &bindings).unwrap().to_json(), json!("DOE"));
    }

    #[test]
    fn string_concatenation_via_plus() {
        let expr = parse("'Patient/' + value").unwrap();
        let document = TreeValue::empty_map();
        let value = TreeValue::from(42i64);
        let bindings = Bindings { document: &document, value: Some(&value) };
        assert_eq!(eval(&expr, &bindings).unwrap().to_json(), json!("Patient/42"));
    }

    #[test]
    fn boolean_short_circuit_and_or() {
        let d = doc(json!({"a": true, "b": false}));
        let bindings = Bindings { document: &d, value: None };
        assert!(eval(&parse("a && !b").unwrap(), &bindings).unwrap().truthy());
        assert!(!eval(&parse("b || false").unwrap(), &bindings).unwrap().truthy());
    }

    #[test]
    fn cache_returns_identical_ast() {
        let a = parse_cached("1 + 1", 0).unwrap();
        let b = parse_cached("1 + 1", 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse("1 + 1 )").is_err());
    }
}
