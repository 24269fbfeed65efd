use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use memkv_resp::Reply;

use super::helpers::{get_as_hash, key_string};
use crate::db::Database;
use crate::value::Value;

fn get_or_init_hash(db: &Arc<Database>, key: &str) -> Result<HashMap<String, Bytes>, Reply> {
    match get_as_hash(db, key)? {
        Some(h) => Ok(h),
        None => Ok(HashMap::new()),
    }
}

pub fn exec_hset(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let field = key_string(&args[1]);
    let mut hash = match get_or_init_hash(db, &key) {
        Err(e) => return e,
        Ok(h) => h,
    };
    let created = !hash.contains_key(&field);
    hash.insert(field, args[2].clone());
    db.put_entity(&key, Value::Hash(hash));
    Reply::Integer(if created { 1 } else { 0 })
}

pub fn exec_hsetnx(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let field = key_string(&args[1]);
    let mut hash = match get_or_init_hash(db, &key) {
        Err(e) => return e,
        Ok(h) => h,
    };
    if hash.contains_key(&field) {
        return Reply::Integer(0);
    }
    hash.insert(field, args[2].clone());
    db.put_entity(&key, Value::Hash(hash));
    Reply::Integer(1)
}

pub fn exec_hget(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let field = key_string(&args[1]);
    match get_as_hash(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::NullBulk,
        Ok(Some(hash)) => match hash.get(&field) {
            Some(value) => Reply::Bulk(value.clone()),
            None => Reply::NullBulk,
        },
    }
}

pub fn exec_hexists(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let field = key_string(&args[1]);
    match get_as_hash(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::Integer(0),
        Ok(Some(hash)) => Reply::Integer(if hash.contains_key(&field) { 1 } else { 0 }),
    }
}

pub fn exec_hdel(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let mut hash = match get_as_hash(db, &key) {
        Err(e) => return e,
        Ok(None) => return Reply::NullBulk,
        Ok(Some(h)) => h,
    };
    let mut removed = 0i64;
    for field_arg in &args[1..] {
        if hash.remove(&key_string(field_arg)).is_some() {
            removed += 1;
        }
    }
    if hash.is_empty() {
        db.remove(&key);
    } else {
        db.put_entity(&key, Value::Hash(hash));
    }
    Reply::Integer(removed)
}

pub fn exec_hlen(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    match get_as_hash(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::Integer(0),
        Ok(Some(hash)) => Reply::Integer(hash.len() as i64),
    }
}

pub fn exec_hstrlen(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let field = key_string(&args[1]);
    match get_as_hash(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::Integer(0),
        Ok(Some(hash)) => Reply::Integer(hash.get(&field).map(|v| v.len() as i64).unwrap_or(0)),
    }
}
