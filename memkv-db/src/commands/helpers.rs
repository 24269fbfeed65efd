use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;

use memkv_errors::Error;
use memkv_resp::Reply;

use crate::db::Database;
use crate::value::Value;

/// `Ok(None)` means absent, `Err` means present but the wrong type.
pub fn get_as_bytes(db: &Arc<Database>, key: &str) -> Result<Option<Bytes>, Reply> {
    match db.get_entity(key) {
        None => Ok(None),
        Some(Value::Bytes(b)) => Ok(Some(b)),
        Some(_) => Err(wrong_type()),
    }
}

pub fn get_as_hash(db: &Arc<Database>, key: &str) -> Result<Option<HashMap<String, Bytes>>, Reply> {
    match db.get_entity(key) {
        None => Ok(None),
        Some(Value::Hash(h)) => Ok(Some(h)),
        Some(_) => Err(wrong_type()),
    }
}

pub fn get_as_set(db: &Arc<Database>, key: &str) -> Result<Option<HashSet<String>>, Reply> {
    match db.get_entity(key) {
        None => Ok(None),
        Some(Value::Set(s)) => Ok(Some(s)),
        Some(_) => Err(wrong_type()),
    }
}

pub fn wrong_type() -> Reply {
    Reply::Error(Error::WrongType.wire_message())
}

pub fn key_string(arg: &Bytes) -> String {
    String::from_utf8_lossy(arg).into_owned()
}
