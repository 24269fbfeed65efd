//! The tagged value stored under each key, replacing the original's dynamic
//! type assertions with an enum every command matches on explicitly.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Bytes),
    Hash(HashMap<String, Bytes>),
    Set(HashSet<String>),
}

impl Value {
    /// The name `TYPE` reports for this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<String, Bytes>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }
}
