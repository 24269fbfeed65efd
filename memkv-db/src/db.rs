//! One logical database: a data map, a parallel ttl map, a segmented lock
//! table guarding multi-key operations, and a hook that forwards successful
//! mutations to the AOF writer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use memkv_dict::Dictionary;
use memkv_errors::Error;
use memkv_locks::LockTable;
use memkv_resp::Reply;
use memkv_timewheel::TimeWheel;

use crate::registry::{self, validate_arity};
use crate::value::Value;

pub const LOCKER_SIZE: usize = 1024;

/// Forwards a successful mutation's full command line (including its name)
/// for the owning database's index to the AOF writer.
pub type AofHook = dyn Fn(usize, Vec<Bytes>) + Send + Sync;

fn no_op_hook(_index: usize, _cmdline: Vec<Bytes>) {}

pub struct Database {
    index: usize,
    data: Dictionary<Value>,
    ttl: Dictionary<SystemTime>,
    locks: LockTable,
    wheel: TimeWheel,
    aof_hook: parking_lot::RwLock<Arc<AofHook>>,
}

impl Database {
    pub fn new(index: usize, wheel: TimeWheel) -> Self {
        Self {
            index,
            data: Dictionary::new(),
            ttl: Dictionary::new(),
            locks: LockTable::new(LOCKER_SIZE),
            wheel,
            aof_hook: parking_lot::RwLock::new(Arc::new(no_op_hook)),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Installs the AOF forwarding hook. Called once, after both the
    /// database set and the persister exist, breaking the construction
    /// cycle between them.
    pub fn set_aof_hook(&self, hook: Arc<AofHook>) {
        *self.aof_hook.write() = hook;
    }

    fn add_aof(&self, cmd_name: &str, args: &[Bytes]) {
        let mut cmdline = Vec::with_capacity(args.len() + 1);
        cmdline.push(Bytes::copy_from_slice(cmd_name.as_bytes()));
        cmdline.extend_from_slice(args);
        let hook = self.aof_hook.read().clone();
        hook(self.index, cmdline);
    }

    /// Runs one already-lowercased command (name included in `cmdline[0]`)
    /// against this database.
    pub fn exec(self: &Arc<Self>, cmdline: &[Bytes]) -> Reply {
        if cmdline.is_empty() {
            return Reply::Error(Error::UnknownCommand.wire_message());
        }
        let name = String::from_utf8_lossy(&cmdline[0]).to_lowercase();
        let record = match registry::registry().get(name.as_str()) {
            Some(r) => r,
            None => return Reply::Error(Error::UnknownCommand.wire_message()),
        };
        if !validate_arity(record.arity, cmdline) {
            return Reply::Error(Error::WrongArity(name).wire_message());
        }
        let args = &cmdline[1..];
        let (write_keys, read_keys) = (record.prepare)(args);
        let _guard = self.locks.lock_many(&write_keys, &read_keys);

        let executor = record.executor;
        let result = catch_unwind(AssertUnwindSafe(|| executor(self, args)));
        match result {
            Ok(reply) => {
                if !reply.is_error() {
                    self.add_aof(&name, args);
                }
                reply
            }
            Err(payload) => {
                tracing::error!(command = %name, panic = ?payload, "executor panicked");
                Reply::Error(Error::Internal.wire_message())
            }
        }
    }

    // ===== ttl =====

    pub fn expire(self: &Arc<Self>, key: &str, expire_at: SystemTime) {
        let now = SystemTime::now();
        if expire_at <= now {
            self.remove(key);
            return;
        }
        self.ttl.put(key.to_string(), expire_at);
        let task_key = expire_task_key(key);
        let delay = expire_at.duration_since(now).unwrap_or(Duration::ZERO);
        let db = Arc::clone(self);
        let key_owned = key.to_string();
        self.wheel.schedule(delay, task_key, move || {
            let _guard = db.locks.lock(&key_owned);
            tracing::info!(key = %key_owned, "expire");
            match db.ttl.get(&key_owned) {
                Some(expire_time) if SystemTime::now() >= expire_time => {
                    db.remove(&key_owned);
                }
                _ => {}
            }
        });
    }

    pub fn is_expired(&self, key: &str) -> bool {
        match self.ttl.get(key) {
            Some(expire_time) => {
                let expired = SystemTime::now() >= expire_time;
                if expired {
                    self.remove(key);
                }
                expired
            }
            None => false,
        }
    }

    pub fn ttl_of(&self, key: &str) -> Option<SystemTime> {
        self.ttl.get(key)
    }

    // ===== data =====

    pub fn get_entity(&self, key: &str) -> Option<Value> {
        let value = self.data.get(key)?;
        if self.is_expired(key) {
            return None;
        }
        Some(value)
    }

    pub fn put_entity(&self, key: &str, value: Value) -> i32 {
        self.data.put(key.to_string(), value)
    }

    pub fn put_if_exists(&self, key: &str, value: Value) -> i32 {
        self.data.put_if_exists(key, value)
    }

    pub fn put_if_absent(&self, key: &str, value: Value) -> i32 {
        self.data.put_if_absent(key.to_string(), value)
    }

    pub fn remove(&self, key: &str) {
        self.data.remove(key);
        self.ttl.remove(key);
        self.wheel.cancel(expire_task_key(key));
    }

    pub fn remove_many(&self, keys: &[String]) -> i64 {
        let mut count = 0i64;
        for key in keys {
            if self.data.get(key).is_some() {
                self.remove(key);
                count += 1;
            }
        }
        count
    }

    pub fn flush(&self) {
        self.data.clear();
        self.ttl.clear();
    }

    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &Value, Option<SystemTime>) -> bool,
    {
        self.data.for_each(|key, value| {
            let expire_at = self.ttl.get(key);
            visitor(key, value, expire_at)
        });
    }
}

fn expire_task_key(key: &str) -> String {
    format!("expire:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn new_db() -> Arc<Database> {
        let wheel = TimeWheel::spawn(Duration::from_millis(20), 8);
        Arc::new(Database::new(0, wheel))
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let db = new_db();
        let reply = db.exec(&[Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        assert_eq!(reply, Reply::Ok);
        let reply = db.exec(&[Bytes::from_static(b"GET"), Bytes::from_static(b"k")]);
        assert_eq!(reply, Reply::Bulk(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn unknown_command_errors() {
        let db = new_db();
        let reply = db.exec(&[Bytes::from_static(b"NOPE")]);
        assert!(reply.is_error());
    }

    #[tokio::test]
    async fn wrong_arity_errors() {
        let db = new_db();
        let reply = db.exec(&[Bytes::from_static(b"GET")]);
        assert!(reply.is_error());
    }

    #[tokio::test]
    async fn expire_removes_key_after_delay() {
        let db = new_db();
        db.exec(&[Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        db.expire("k", SystemTime::now() + Duration::from_millis(60));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(db.get_entity("k").is_none());
    }
}
