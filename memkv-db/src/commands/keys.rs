use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use memkv_errors::Error;
use memkv_resp::Reply;

use super::helpers::key_string;
use crate::db::Database;

pub fn exec_del(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let keys: Vec<String> = args.iter().map(key_string).collect();
    Reply::Integer(db.remove_many(&keys))
}

pub fn exec_exists(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let count = args.iter().filter(|arg| db.get_entity(&key_string(arg)).is_some()).count();
    Reply::Integer(count as i64)
}

pub fn exec_flushdb(db: &Arc<Database>, _args: &[Bytes]) -> Reply {
    db.flush();
    Reply::Ok
}

pub fn exec_type(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    match db.get_entity(&key) {
        Some(value) => Reply::Simple(value.type_name().to_string()),
        None => Reply::Simple("none".to_string()),
    }
}

pub fn exec_rename(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let old_key = key_string(&args[0]);
    let new_key = key_string(&args[1]);
    match db.get_entity(&old_key) {
        Some(entity) => {
            db.remove(&old_key);
            db.put_entity(&new_key, entity);
            Reply::Ok
        }
        None => Reply::Error(Error::Other("no such key".to_string()).wire_message()),
    }
}

pub fn exec_renamenx(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let old_key = key_string(&args[0]);
    let new_key = key_string(&args[1]);
    if db.get_entity(&new_key).is_some() {
        return Reply::Integer(0);
    }
    match db.get_entity(&old_key) {
        Some(entity) => {
            db.remove(&old_key);
            db.put_entity(&new_key, entity);
            Reply::Integer(1)
        }
        None => Reply::Error(Error::Other("no such key".to_string()).wire_message()),
    }
}

pub fn exec_keys(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let pattern = &args[0];
    let mut matched = Vec::new();
    db.for_each(|key, _value, _expire_at| {
        if memkv_util::is_match(pattern, key.as_bytes()) {
            matched.push(Bytes::from(key.to_string()));
        }
        true
    });
    Reply::multi_bulk_strings(matched)
}

pub fn exec_expire(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let seconds: i64 = match String::from_utf8_lossy(&args[1]).parse() {
        Ok(n) => n,
        Err(_) => return Reply::Integer(0),
    };
    if db.get_entity(&key).is_none() {
        return Reply::Integer(0);
    }
    let expire_at = SystemTime::now() + Duration::from_secs(seconds.max(0) as u64);
    db.expire(&key, expire_at);
    Reply::Integer(1)
}

pub fn exec_expireat(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let unix_secs: i64 = match String::from_utf8_lossy(&args[1]).parse() {
        Ok(n) => n,
        Err(_) => return Reply::Integer(0),
    };
    if db.get_entity(&key).is_none() {
        return Reply::Integer(0);
    }
    let expire_at = UNIX_EPOCH + Duration::from_secs(unix_secs.max(0) as u64);
    db.expire(&key, expire_at);
    Reply::Integer(1)
}

pub fn exec_ttl(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    if db.get_entity(&key).is_none() {
        return Reply::Integer(-2);
    }
    match db.ttl_of(&key) {
        None => Reply::Integer(-1),
        Some(expire_at) => {
            let remaining = expire_at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO);
            Reply::Integer(remaining.as_secs() as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use memkv_timewheel::TimeWheel;
    use std::time::Duration;

    fn new_db() -> Arc<Database> {
        Arc::new(Database::new(0, TimeWheel::spawn(Duration::from_millis(20), 8)))
    }

    #[tokio::test]
    async fn del_exists_flushdb() {
        let db = new_db();
        db.put_entity("a", Value::Bytes(Bytes::from_static(b"1")));
        db.put_entity("b", Value::Bytes(Bytes::from_static(b"2")));
        assert_eq!(exec_exists(&db, &[Bytes::from_static(b"a"), Bytes::from_static(b"missing")]), Reply::Integer(1));
        assert_eq!(exec_del(&db, &[Bytes::from_static(b"a"), Bytes::from_static(b"b")]), Reply::Integer(2));
        db.put_entity("c", Value::Bytes(Bytes::from_static(b"3")));
        assert_eq!(exec_flushdb(&db, &[]), Reply::Ok);
        assert!(db.get_entity("c").is_none());
    }

    #[tokio::test]
    async fn type_reports_each_tag() {
        let db = new_db();
        db.put_entity("s", Value::Bytes(Bytes::from_static(b"v")));
        db.put_entity("h", Value::Hash(Default::default()));
        db.put_entity("st", Value::Set(Default::default()));
        assert_eq!(exec_type(&db, &[Bytes::from_static(b"s")]), Reply::Simple("string".to_string()));
        assert_eq!(exec_type(&db, &[Bytes::from_static(b"h")]), Reply::Simple("hash".to_string()));
        assert_eq!(exec_type(&db, &[Bytes::from_static(b"st")]), Reply::Simple("set".to_string()));
        assert_eq!(exec_type(&db, &[Bytes::from_static(b"missing")]), Reply::Simple("none".to_string()));
    }

    #[tokio::test]
    async fn rename_moves_value_and_clears_old_key() {
        let db = new_db();
        db.put_entity("old", Value::Bytes(Bytes::from_static(b"v")));
        assert_eq!(exec_rename(&db, &[Bytes::from_static(b"old"), Bytes::from_static(b"new")]), Reply::Ok);
        assert!(db.get_entity("old").is_none());
        assert_eq!(db.get_entity("new"), Some(Value::Bytes(Bytes::from_static(b"v"))));
    }

    #[tokio::test]
    async fn renamenx_refuses_existing_destination() {
        let db = new_db();
        db.put_entity("old", Value::Bytes(Bytes::from_static(b"v")));
        db.put_entity("new", Value::Bytes(Bytes::from_static(b"taken")));
        assert_eq!(exec_renamenx(&db, &[Bytes::from_static(b"old"), Bytes::from_static(b"new")]), Reply::Integer(0));
    }

    #[tokio::test]
    async fn keys_matches_wildcard_pattern() {
        let db = new_db();
        db.put_entity("foo1", Value::Bytes(Bytes::from_static(b"a")));
        db.put_entity("foo2", Value::Bytes(Bytes::from_static(b"b")));
        db.put_entity("bar", Value::Bytes(Bytes::from_static(b"c")));
        match exec_keys(&db, &[Bytes::from_static(b"foo*")]) {
            Reply::MultiBulk(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn ttl_reports_absent_no_expiry_and_remaining() {
        let db = new_db();
        assert_eq!(exec_ttl(&db, &[Bytes::from_static(b"missing")]), Reply::Integer(-2));
        db.put_entity("k", Value::Bytes(Bytes::from_static(b"v")));
        assert_eq!(exec_ttl(&db, &[Bytes::from_static(b"k")]), Reply::Integer(-1));
        assert_eq!(exec_expire(&db, &[Bytes::from_static(b"k"), Bytes::from_static(b"100")]), Reply::Integer(1));
        match exec_ttl(&db, &[Bytes::from_static(b"k")]) {
            Reply::Integer(n) => assert!(n > 0 && n <= 100),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
