use std::sync::Arc;

use bytes::Bytes;

use memkv_resp::Reply;

use super::helpers::{get_as_bytes, key_string};
use crate::db::Database;
use crate::value::Value;

pub fn exec_get(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    match get_as_bytes(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::NullBulk,
        Ok(Some(bytes)) => Reply::Bulk(bytes),
    }
}

pub fn exec_set(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    db.put_entity(&key, Value::Bytes(args[1].clone()));
    Reply::Ok
}

pub fn exec_setnx(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let code = db.put_if_absent(&key, Value::Bytes(args[1].clone()));
    Reply::Integer(code as i64)
}

pub fn exec_getset(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let prior = match get_as_bytes(db, &key) {
        Err(e) => return e,
        Ok(v) => v,
    };
    db.put_entity(&key, Value::Bytes(args[1].clone()));
    match prior {
        None => Reply::NullBulk,
        Some(bytes) => Reply::Bulk(bytes),
    }
}

pub fn exec_strlen(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    match get_as_bytes(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::NullBulk,
        Ok(Some(bytes)) => Reply::Integer(bytes.len() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memkv_timewheel::TimeWheel;
    use std::time::Duration;

    fn new_db() -> Arc<Database> {
        Arc::new(Database::new(0, TimeWheel::spawn(Duration::from_millis(20), 8)))
    }

    #[tokio::test]
    async fn set_get_getset_strlen() {
        let db = new_db();
        assert_eq!(exec_set(&db, &[Bytes::from_static(b"k"), Bytes::from_static(b"v1")]), Reply::Ok);
        assert_eq!(exec_get(&db, &[Bytes::from_static(b"k")]), Reply::Bulk(Bytes::from_static(b"v1")));
        assert_eq!(
            exec_getset(&db, &[Bytes::from_static(b"k"), Bytes::from_static(b"v2")]),
            Reply::Bulk(Bytes::from_static(b"v1"))
        );
        assert_eq!(exec_strlen(&db, &[Bytes::from_static(b"k")]), Reply::Integer(2));
    }

    #[tokio::test]
    async fn setnx_only_sets_once() {
        let db = new_db();
        assert_eq!(exec_setnx(&db, &[Bytes::from_static(b"k"), Bytes::from_static(b"a")]), Reply::Integer(1));
        assert_eq!(exec_setnx(&db, &[Bytes::from_static(b"k"), Bytes::from_static(b"b")]), Reply::Integer(0));
        assert_eq!(exec_get(&db, &[Bytes::from_static(b"k")]), Reply::Bulk(Bytes::from_static(b"a")));
    }

    #[tokio::test]
    async fn wrong_type_on_hash_key() {
        let db = new_db();
        db.put_entity("h", Value::Hash(Default::default()));
        assert!(exec_get(&db, &[Bytes::from_static(b"h")]).is_error());
    }
}
