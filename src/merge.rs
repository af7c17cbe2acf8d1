// src/merge.rs

//! Overlay-biased deep merge of configuration mappings
//!
//! For each key of the overlay: when both sides hold a mapping the two are
//! merged recursively, otherwise the overlay value replaces the base value
//! wholesale. Arrays are never concatenated. Keys only present in the base
//! are kept. The operation is not commutative.

use serde_json::{Map, Value};

/// A configuration mapping node
pub type Tree = Map<String, Value>;

/// Merge `overlay` into `base`, returning the combined mapping
pub fn merge(mut base: Tree, overlay: Tree) -> Tree {
    merge_into(&mut base, overlay);
    base
}

/// In-place form of [`merge`]
pub fn merge_into(base: &mut Tree, overlay: Tree) {
    for (key, value) in overlay {
        match value {
            Value::Object(incoming) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => merge_into(existing, incoming),
                _ => {
                    base.insert(key, Value::Object(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
