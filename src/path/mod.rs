//! Dotted-path navigation over [`TreeValue`], generalised from the teacher's
//! `set_nested_value`/`ensure_nested_array`/`parse_array_path` family in
//! `application/usecases/fhir.rs` into a single reusable segment parser
//! shared by both reads and writes.

use crate::tree::{TreeMap, TreeValue};
use crate::utils::error::{EngineError, EngineResult};
use std::fmt;

/// One step of a dotted path: a bare key, or a key followed by one or more
/// `[i]` subscripts (`given[0]`, or the degenerate `identifier` with none).
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub key: String,
    pub indices: Vec<usize>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for idx in &self.indices {
            write!(f, "[{}]", idx)?;
        }
        Ok(())
    }
}

/// Parse a dotted path such as `name[0].given[0]` into its segments.
///
/// No wildcards, no predicates: only a literal key optionally followed by
/// one or more literal non-negative integer subscripts.
pub fn parse_path(path: &str) -> EngineResult<Vec<Segment>> {
    path.split('.')
        .map(parse_segment)
        .collect::<EngineResult<Vec<_>>>()
}

fn parse_segment(raw: &str) -> EngineResult<Segment> {
    let mut key = String::new();
    let mut indices = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c == '[' {
            break;
        }
        key.push(c);
        chars.next();
    }

    while chars.peek() == Some(&'[') {
        chars.next(); // consume '['
        let mut digits = String::new();
        for c in chars.by_ref() {
            if c == ']' {
                break;
            }
            digits.push(c);
        }
        let idx: usize = digits
            .parse()
            .map_err(|_| EngineError::Config(format!("invalid array index in segment '{}'", raw)))?;
        indices.push(idx);
    }

    if key.is_empty() {
        return Err(EngineError::Config(format!("empty path segment in '{}'", raw)));
    }

    Ok(Segment { key, indices })
}

/// Read `path` from `root`. Returns `None` ("missing") rather than copying
/// when the address does not resolve — absent key, short list, or a
/// non-container node where a container was expected.
pub fn get<'a>(root: &'a TreeValue, path: &str) -> Option<&'a TreeValue> {
    let segments = parse_path(path).ok()?;
    let mut current = root;
    for segment in &segments {
        current = descend(current, segment)?;
    }
    Some(current)
}

fn descend<'a>(node: &'a TreeValue, segment: &Segment) -> Option<&'a TreeValue> {
    let map = node.as_map()?;
    let mut value = map.get(&segment.key)?;
    for &idx in &segment.indices {
        value = value.as_list()?.get(idx)?;
    }
    Some(value)
}

/// Write `value` at `path` inside `root`, materialising intermediate maps
/// and lists as needed. Growing a list pads with `TreeValue::Null`
/// placeholders up to the target index, matching the spec's
/// "idempotent auto-materialisation" invariant: writing through a shared
/// path prefix never disturbs the prefix's existing type.
pub fn set(root: &mut TreeValue, path: &str, value: TreeValue) -> EngineResult<()> {
    let segments = parse_path(path)?;
    set_segments(root, &segments, value)
}

fn set_segments(node: &mut TreeValue, segments: &[Segment], value: TreeValue) -> EngineResult<()> {
    let (segment, rest) = match segments.split_first() {
        Some(pair) => pair,
        None => {
            *node = value;
            return Ok(());
        }
    };

    if !matches!(node, TreeValue::Map(_)) {
        if is_blank(node) {
            *node = TreeValue::empty_map();
        } else {
            return Err(conflict(&segment.key, "map", node));
        }
    }
    let map = node.as_map_mut().expect("just coerced to map");

    if segment.indices.is_empty() {
        let slot = map.entry(segment.key.clone()).or_insert(TreeValue::Null);
        return set_segments(slot, rest, value);
    }

    let slot = entry_as_list(map, &segment.key)?;
    materialise_list_path(slot, &segment.indices, rest, value)
}

fn entry_as_list<'a>(map: &'a mut TreeMap, key: &str) -> EngineResult<&'a mut TreeValue> {
    let slot = map.entry(key.to_string()).or_insert_with(|| TreeValue::List(Vec::new()));
    if is_blank(slot) {
        *slot = TreeValue::List(Vec::new());
    }
    if !matches!(slot, TreeValue::List(_)) {
        return Err(conflict(key, "list", slot));
    }
    Ok(slot)
}

fn materialise_list_path(
    list_node: &mut TreeValue,
    indices: &[usize],
    rest: &[Segment],
    value: TreeValue,
) -> EngineResult<()> {
    let (&idx, remaining_indices) = indices.split_first().expect("caller checked non-empty");
    let list = list_node.as_list_mut().expect("caller ensured list");
    while list.len() <= idx {
        list.push(TreeValue::Null);
    }

    if !remaining_indices.is_empty() {
        if is_blank(&list[idx]) {
            list[idx] = TreeValue::List(Vec::new());
        }
        if !matches!(list[idx], TreeValue::List(_)) {
            return Err(conflict(&format!("[{}]", idx), "list", &list[idx]));
        }
        return materialise_list_path(&mut list[idx], remaining_indices, rest, value);
    }

    if rest.is_empty() {
        list[idx] = value;
        return Ok(());
    }

    if is_blank(&list[idx]) {
        list[idx] = TreeValue::empty_map();
    }
    set_segments(&mut list[idx], rest, value)
}

fn is_blank(node: &TreeValue) -> bool {
    matches!(node, TreeValue::Null)
}

fn conflict(path: &str, expected: &str, found: &TreeValue) -> EngineError {
    let found_kind = match found {
        TreeValue::Null => "null",
        TreeValue::Bool(_) => "boolean",
        TreeValue::Number(_) => "number",
        TreeValue::String(_) => "string",
        TreeValue::List(_) => "list",
        TreeValue::Map(_) => "map",
    };
    EngineError::PathConflict {
        path: path.to_string(),
        expected: expected.to_string(),
        found: found_kind.to_string(),
    }
}
