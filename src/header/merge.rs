//! Hierarchical metadata merger.
//!
//! Extension records arrive as flat `(path, value)` writes in header order and
//! fold into one tree per namespace. Two write shapes are distinguished:
//!
//! - a **wholesale write** assigns a value (possibly a whole map or sequence)
//!   at its path, replacing whatever was there;
//! - a **refining write** whose path is strictly deeper than an earlier write
//!   mutates the existing subtree in place, leaving sibling entries intact.
//!
//! Both rules come out of a single recursive assignment: descent creates or
//! reuses containers, the final component overwrites. There is no separate
//! resolution pass; writes apply strictly in arrival order.

use super::path::PathComponent;
use serde_json::{Map, Value};

fn as_object_or_reset(node: &mut Value) -> &mut Map<String, Value> {
    if !matches!(node, Value::Object(_)) {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn as_array_or_reset(node: &mut Value) -> &mut Vec<Value> {
    if !matches!(node, Value::Array(_)) {
        *node = Value::Array(Vec::new());
    }
    match node {
        Value::Array(arr) => arr,
        _ => unreachable!(),
    }
}

/// Apply one write to `tree`, creating missing containers along `path`.
///
/// Container kind is chosen by the component being walked: an index creates a
/// sequence, a property name a map. Extending a sequence past its current
/// length fills the gap with explicit `null` placeholders. An intermediate
/// node of the wrong kind is replaced by a fresh container of the right kind.
pub fn apply(tree: &mut Value, path: &[PathComponent], value: Value) {
    match path.split_first() {
        None => *tree = value,
        Some((PathComponent::Field(name), rest)) => {
            let map = as_object_or_reset(tree);
            let slot = map.entry(name.clone()).or_insert(Value::Null);
            apply(slot, rest, value);
        }
        Some((PathComponent::Index(idx), rest)) => {
            let arr = as_array_or_reset(tree);
            if arr.len() <= *idx {
                arr.resize(*idx + 1, Value::Null);
            }
            apply(&mut arr[*idx], rest, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::path::parse_path;
    use serde_json::json;

    fn write(tree: &mut Value, path: &str, value: Value) {
        let path = parse_path(path).expect("test path must parse");
        apply(tree, &path, value);
    }

    #[test]
    fn test_ancestor_then_child_refines() {
        let mut tree = json!({});
        write(&mut tree, "b", json!({"x": 1, "y": 2}));
        write(&mut tree, "b.x", json!(9));
        assert_eq!(tree, json!({"b": {"x": 9, "y": 2}}));
    }

    #[test]
    fn test_child_then_ancestor_replaces() {
        let mut tree = json!({});
        write(&mut tree, "b.x", json!(9));
        write(&mut tree, "b", json!({"x": 1, "y": 2}));
        assert_eq!(tree, json!({"b": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_sparse_array_fill() {
        let mut tree = json!({});
        write(&mut tree, "items[2].name", json!("Item 2"));
        assert_eq!(
            tree,
            json!({"items": [null, null, {"name": "Item 2"}]})
        );
    }

    #[test]
    fn test_out_of_order_indices() {
        let mut tree = json!({});
        write(&mut tree, "items[5].name", json!("Item 5"));
        write(&mut tree, "items[2].name", json!("Item 2"));
        write(&mut tree, "items[0].name", json!("Item 0"));
        assert_eq!(
            tree,
            json!({"items": [
                {"name": "Item 0"},
                null,
                {"name": "Item 2"},
                null,
                null,
                {"name": "Item 5"}
            ]})
        );
    }

    #[test]
    fn test_nested_index_components() {
        let mut tree = json!({});
        write(&mut tree, "matrix[1][2]", json!(42));
        write(&mut tree, "matrix[0][1]", json!(17));
        assert_eq!(
            tree,
            json!({"matrix": [[null, 17], [null, null, 42]]})
        );
    }

    #[test]
    fn test_whole_array_then_index_refines() {
        // arrays follow the same wholesale/refine rules as objects
        let mut tree = json!({});
        write(
            &mut tree,
            "channels",
            json!([{"id": "Channel:0", "name": "DAPI"}]),
        );
        write(&mut tree, "channels[1].id", json!("Channel:1"));
        write(&mut tree, "channels[1].name", json!("GFP"));
        assert_eq!(
            tree,
            json!({"channels": [
                {"id": "Channel:0", "name": "DAPI"},
                {"id": "Channel:1", "name": "GFP"}
            ]})
        );
    }

    #[test]
    fn test_index_then_whole_array_replaces() {
        let mut tree = json!({});
        write(&mut tree, "channels[1].name", json!("GFP"));
        write(&mut tree, "channels", json!(["a", "b"]));
        assert_eq!(tree, json!({"channels": ["a", "b"]}));
    }

    #[test]
    fn test_refine_adds_new_sibling() {
        let mut tree = json!({});
        write(
            &mut tree,
            "config.options",
            json!({"timeout": 60, "retries": 2}),
        );
        write(&mut tree, "config.debug", json!(true));
        write(
            &mut tree,
            "config.options.ssl",
            json!({"enabled": true, "verify": false}),
        );
        write(&mut tree, "config.options.timeout", json!(120));
        assert_eq!(
            tree,
            json!({"config": {
                "debug": true,
                "options": {
                    "timeout": 120,
                    "retries": 2,
                    "ssl": {"enabled": true, "verify": false}
                }
            }})
        );
    }

    #[test]
    fn test_scalar_replaced_by_container_on_deeper_write() {
        let mut tree = json!({});
        write(&mut tree, "a", json!(5));
        write(&mut tree, "a.b", json!(1));
        assert_eq!(tree, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_null_gap_becomes_container() {
        let mut tree = json!({});
        write(&mut tree, "items[2]", json!("last"));
        write(&mut tree, "items[0].name", json!("first"));
        assert_eq!(
            tree,
            json!({"items": [{"name": "first"}, null, "last"]})
        );
    }
}
