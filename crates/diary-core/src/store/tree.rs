//! In-memory JSON tree with the hosted store's write semantics.
//!
//! Writing `null` deletes, and objects left empty by a delete disappear.

use serde_json::{Map, Value};

use super::compare_keys;

pub fn get<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

/// Set `value` at `segments`, creating intermediate objects. A `null` value
/// removes the node instead.
pub fn set(root: &mut Value, segments: &[String], value: Value) {
    if value.is_null() {
        remove(root, segments);
        return;
    }
    let Some((last, parents)) = segments.split_last() else {
        *root = value;
        return;
    };

    let mut node = root;
    for segment in parents {
        node = ensure_object(node)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(node).insert(last.clone(), value);
}

/// Merge each child of `children` into the object at `segments`.
pub fn merge(root: &mut Value, segments: &[String], children: Map<String, Value>) {
    for (key, value) in children {
        let mut child_path = segments.to_vec();
        child_path.extend(key.split('/').filter(|part| !part.is_empty()).map(str::to_string));
        set(root, &child_path, value);
    }
}

pub fn remove(root: &mut Value, segments: &[String]) {
    let Some((last, parents)) = segments.split_last() else {
        *root = Value::Null;
        return;
    };
    if let Some(Value::Object(children)) = get_mut(root, parents) {
        children.remove(last);
    }
    prune_empty(root);
}

/// Children of the node at `segments`, ordered the way the store orders keys.
/// Leaf or missing nodes have no children.
pub fn children(root: &Value, segments: &[String]) -> Vec<(String, Value)> {
    let Some(Value::Object(map)) = get(root, segments) else {
        return Vec::new();
    };
    let mut children: Vec<(String, Value)> = map
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    children.sort_by(|(a, _), (b, _)| compare_keys(a, b));
    children
}

fn get_mut<'a>(root: &'a mut Value, segments: &[String]) -> Option<&'a mut Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.as_object_mut()?.get_mut(segment))
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn prune_empty(node: &mut Value) {
    if let Value::Object(children) = node {
        for child in children.values_mut() {
            prune_empty(child);
        }
        children.retain(|_, child| !matches!(child, Value::Object(map) if map.is_empty()));
    }
}
