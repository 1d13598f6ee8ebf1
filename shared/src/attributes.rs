//! Typed attribute tree
//!
//! Per-entity state that has to survive save/load is written into a string-keyed tree
//! at a single boundary (`to_attributes` / `from_attributes` on the owning type).
//! Everything else works on typed records and never touches the tree per tick.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Tree(AttributeTree),
}

impl AttributeValue {
    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Float(_) => "float",
            AttributeValue::Double(_) => "double",
            AttributeValue::Tree(_) => "tree",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("attribute '{key}' holds a {found}, expected {expected}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// String-keyed attribute store. Numeric reads coerce between int/float/double.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct AttributeTree {
    values: BTreeMap<String, AttributeValue>,
}

impl AttributeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.values.remove(key)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), AttributeValue::Bool(value));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), AttributeValue::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f32) {
        self.values.insert(key.to_string(), AttributeValue::Float(value));
    }

    pub fn set_double(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), AttributeValue::Double(value));
    }

    pub fn set_tree(&mut self, key: &str, tree: AttributeTree) {
        self.values.insert(key.to_string(), AttributeValue::Tree(tree));
    }

    pub fn try_float(&self, key: &str) -> Result<Option<f32>, AttributeError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(AttributeValue::Float(v)) => Ok(Some(*v)),
            Some(AttributeValue::Double(v)) => Ok(Some(*v as f32)),
            Some(AttributeValue::Int(v)) => Ok(Some(*v as f32)),
            Some(other) => Err(wrong_type(key, "float", other)),
        }
    }

    pub fn try_double(&self, key: &str) -> Result<Option<f64>, AttributeError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(AttributeValue::Double(v)) => Ok(Some(*v)),
            Some(AttributeValue::Float(v)) => Ok(Some(*v as f64)),
            Some(AttributeValue::Int(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(wrong_type(key, "double", other)),
        }
    }

    pub fn try_bool(&self, key: &str) -> Result<Option<bool>, AttributeError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(AttributeValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_type(key, "bool", other)),
        }
    }

    /// Float lookup that falls back to `default` when the key is absent or mistyped.
    pub fn float_or(&self, key: &str, default: f32) -> f32 {
        match self.try_float(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                warn!("{}; using default {}", e, default);
                default
            }
        }
    }

    pub fn double_or(&self, key: &str, default: f64) -> f64 {
        match self.try_double(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                warn!("{}; using default {}", e, default);
                default
            }
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.try_bool(key) {
            Ok(Some(v)) => v,
            Ok(None) => default,
            Err(e) => {
                warn!("{}; using default {}", e, default);
                default
            }
        }
    }

    pub fn tree(&self, key: &str) -> Option<&AttributeTree> {
        match self.values.get(key) {
            Some(AttributeValue::Tree(tree)) => Some(tree),
            _ => None,
        }
    }

    /// Subtree at `key`, created empty if it does not exist yet (or replaced if it
    /// held a non-tree value).
    pub fn tree_mut(&mut self, key: &str) -> &mut AttributeTree {
        let slot = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| AttributeValue::Tree(AttributeTree::new()));
        if !matches!(slot, AttributeValue::Tree(_)) {
            *slot = AttributeValue::Tree(AttributeTree::new());
        }
        match slot {
            AttributeValue::Tree(tree) => tree,
            _ => unreachable!("slot was just replaced with a tree"),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str, found: &AttributeValue) -> AttributeError {
    AttributeError::WrongType {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Host-owned attribute store of an entity (saved with the entity on the server).
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct EntityAttributes(pub AttributeTree);
