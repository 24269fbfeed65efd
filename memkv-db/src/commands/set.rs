use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use rand::seq::{IndexedRandom, SliceRandom};

use memkv_errors::Error;
use memkv_resp::Reply;

use super::helpers::{get_as_set, key_string};
use crate::db::Database;
use crate::value::Value;

fn get_or_init_set(db: &Arc<Database>, key: &str) -> Result<HashSet<String>, Reply> {
    match get_as_set(db, key)? {
        Some(s) => Ok(s),
        None => Ok(HashSet::new()),
    }
}

pub fn exec_sadd(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let member = key_string(&args[1]);
    let mut set = match get_or_init_set(db, &key) {
        Err(e) => return e,
        Ok(s) => s,
    };
    let added = set.insert(member);
    db.put_entity(&key, Value::Set(set));
    Reply::Integer(if added { 1 } else { 0 })
}

pub fn exec_sismember(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let member = key_string(&args[1]);
    match get_as_set(db, &key) {
        Err(e) => e,
        Ok(None) => Reply::Integer(0),
        Ok(Some(set)) => Reply::Integer(if set.contains(&member) { 1 } else { 0 }),
    }
}

pub fn exec_spop(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let mut set = match get_as_set(db, &key) {
        Err(e) => return e,
        Ok(None) => return Reply::NullBulk,
        Ok(Some(s)) if s.is_empty() => return Reply::NullBulk,
        Ok(Some(s)) => s,
    };
    let members: Vec<&String> = set.iter().collect();
    let chosen = members.choose(&mut rand::rng()).expect("set is non-empty").to_string();
    set.remove(&chosen);
    if set.is_empty() {
        db.remove(&key);
    } else {
        db.put_entity(&key, Value::Set(set));
    }
    Reply::Bulk(Bytes::from(chosen))
}

pub fn exec_srandmember(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let set = match get_as_set(db, &key) {
        Err(e) => return e,
        Ok(None) => return Reply::NullBulk,
        Ok(Some(s)) if s.is_empty() => return Reply::NullBulk,
        Ok(Some(s)) => s,
    };

    if args.len() == 1 {
        let members: Vec<&String> = set.iter().collect();
        let chosen = members.choose(&mut rand::rng()).expect("set is non-empty");
        return Reply::Bulk(Bytes::from(chosen.to_string()));
    }

    let count_str = String::from_utf8_lossy(&args[1]);
    let count: i64 = match count_str.parse() {
        Ok(n) => n,
        Err(_) => return Reply::Error(Error::NotAnInteger.wire_message()),
    };

    if count > 0 {
        let mut members: Vec<String> = set.into_iter().collect();
        members.shuffle(&mut rand::rng());
        members.truncate(count as usize);
        Reply::multi_bulk_strings(members.into_iter().map(Bytes::from))
    } else if count < 0 {
        let members: Vec<&String> = set.iter().collect();
        let mut rng = rand::rng();
        let picked: Vec<Bytes> = (0..(-count))
            .map(|_| Bytes::from(members.choose(&mut rng).expect("set is non-empty").to_string()))
            .collect();
        Reply::multi_bulk_strings(picked)
    } else {
        Reply::EmptyMultiBulk
    }
}

pub fn exec_srem(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let key = key_string(&args[0]);
    let mut set = match get_as_set(db, &key) {
        Err(e) => return e,
        Ok(None) => return Reply::Integer(0),
        Ok(Some(s)) => s,
    };
    let mut removed = 0i64;
    for member_arg in &args[1..] {
        if set.remove(&key_string(member_arg)) {
            removed += 1;
        }
    }
    if set.is_empty() {
        db.remove(&key);
    } else {
        db.put_entity(&key, Value::Set(set));
    }
    Reply::Integer(removed)
}

pub fn exec_sinter(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let mut result: Option<HashSet<String>> = None;
    for key_arg in args {
        let key = key_string(key_arg);
        match get_as_set(db, &key) {
            Err(e) => return e,
            Ok(None) => return Reply::NullBulk,
            Ok(Some(set)) => {
                result = Some(match result {
                    None => set,
                    Some(acc) => acc.intersection(&set).cloned().collect(),
                });
            }
        }
    }
    reply_from_set(result.unwrap_or_default())
}

pub fn exec_sunion(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let mut result: HashSet<String> = HashSet::new();
    for key_arg in args {
        let key = key_string(key_arg);
        match get_as_set(db, &key) {
            Err(e) => return e,
            Ok(None) => continue,
            Ok(Some(set)) => result = result.union(&set).cloned().collect(),
        }
    }
    reply_from_set(result)
}

pub fn exec_sdiff(db: &Arc<Database>, args: &[Bytes]) -> Reply {
    let mut result: Option<HashSet<String>> = None;
    for (i, key_arg) in args.iter().enumerate() {
        let key = key_string(key_arg);
        match get_as_set(db, &key) {
            Err(e) => return e,
            Ok(None) => {
                if i == 0 {
                    return Reply::NullBulk;
                }
                continue;
            }
            Ok(Some(set)) => {
                result = Some(match result {
                    None => set,
                    Some(acc) => {
                        let diff: HashSet<String> = acc.difference(&set).cloned().collect();
                        if diff.is_empty() {
                            return Reply::NullBulk;
                        }
                        diff
                    }
                });
            }
        }
    }
    reply_from_set(result.unwrap_or_default())
}

fn reply_from_set(set: HashSet<String>) -> Reply {
    if set.is_empty() {
        return Reply::EmptyMultiBulk;
    }
    Reply::multi_bulk_strings(set.into_iter().map(Bytes::from))
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
    async fn sadd_sismember_srem_lifecycle() {
        let db = new_db();
        assert_eq!(exec_sadd(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]), Reply::Integer(1));
        assert_eq!(exec_sadd(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]), Reply::Integer(0));
        assert_eq!(exec_sismember(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]), Reply::Integer(1));
        assert_eq!(exec_srem(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]), Reply::Integer(1));
        assert!(db.get_entity("s").is_none());
    }

    #[tokio::test]
    async fn sdiff_first_key_absent_is_null() {
        let db = new_db();
        exec_sadd(&db, &[Bytes::from_static(b"s2"), Bytes::from_static(b"x")]);
        let reply = exec_sdiff(&db, &[Bytes::from_static(b"missing"), Bytes::from_static(b"s2")]);
        assert_eq!(reply, Reply::NullBulk);
    }

    #[tokio::test]
    async fn sunion_tolerates_absent_keys() {
        let db = new_db();
        exec_sadd(&db, &[Bytes::from_static(b"s1"), Bytes::from_static(b"a")]);
        let reply = exec_sunion(&db, &[Bytes::from_static(b"s1"), Bytes::from_static(b"missing")]);
        match reply {
            Reply::MultiBulk(items) => assert_eq!(items.len(), 1),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn srandmember_count_zero_is_empty_array() {
        let db = new_db();
        exec_sadd(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]);
        let reply = exec_srandmember(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"0")]);
        assert_eq!(reply, Reply::EmptyMultiBulk);
    }

    #[tokio::test]
    async fn srandmember_negative_count_allows_repeats() {
        let db = new_db();
        exec_sadd(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"a")]);
        let reply = exec_srandmember(&db, &[Bytes::from_static(b"s"), Bytes::from_static(b"-3")]);
        match reply {
            Reply::MultiBulk(items) => assert_eq!(items.len(), 3),
            other => panic!("unexpected reply: {other:?}"),
        }
    }
}
