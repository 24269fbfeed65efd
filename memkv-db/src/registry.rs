//! The command table: name → (executor, key-extractor, arity), built once
//! and never mutated again.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;

use crate::commands;
use crate::db::Database;
use memkv_resp::Reply;

pub type ExecFn = fn(&Arc<Database>, &[Bytes]) -> Reply;
pub type PrepareFn = fn(&[Bytes]) -> (Vec<String>, Vec<String>);

pub struct CommandRecord {
    pub executor: ExecFn,
    pub prepare: PrepareFn,
    pub arity: i32,
}

/// `arity >= 0` means "exactly this many arguments including the command
/// name"; `arity < 0` means "at least `-arity`".
pub fn validate_arity(arity: i32, cmdline: &[Bytes]) -> bool {
    let n = cmdline.len() as i32;
    if arity >= 0 {
        n == arity
    } else {
        n >= -arity
    }
}

pub fn no_prepare(_args: &[Bytes]) -> (Vec<String>, Vec<String>) {
    (Vec::new(), Vec::new())
}

pub fn read_first_key(args: &[Bytes]) -> (Vec<String>, Vec<String>) {
    (Vec::new(), vec![key_str(&args[0])])
}

pub fn write_first_key(args: &[Bytes]) -> (Vec<String>, Vec<String>) {
    (vec![key_str(&args[0])], Vec::new())
}

pub fn read_all_keys(args: &[Bytes]) -> (Vec<String>, Vec<String>) {
    (Vec::new(), args.iter().map(key_str).collect())
}

pub fn write_all_keys(args: &[Bytes]) -> (Vec<String>, Vec<String>) {
    (args.iter().map(key_str).collect(), Vec::new())
}

fn key_str(b: &Bytes) -> String {
    String::from_utf8_lossy(b).into_owned()
}

static REGISTRY: OnceLock<HashMap<&'static str, CommandRecord>> = OnceLock::new();

pub fn registry() -> &'static HashMap<&'static str, CommandRecord> {
    REGISTRY.get_or_init(build)
}

fn reg(map: &mut HashMap<&'static str, CommandRecord>, name: &'static str, executor: ExecFn, prepare: PrepareFn, arity: i32) {
    map.insert(name, CommandRecord { executor, prepare, arity });
}

fn build() -> HashMap<&'static str, CommandRecord> {
    let mut map = HashMap::new();

    reg(&mut map, "ping", commands::ping::exec_ping, no_prepare, 1);

    reg(&mut map, "get", commands::string::exec_get, read_first_key, 2);
    reg(&mut map, "set", commands::string::exec_set, write_first_key, 3);
    reg(&mut map, "setnx", commands::string::exec_setnx, write_first_key, 3);
    reg(&mut map, "getset", commands::string::exec_getset, write_first_key, 3);
    reg(&mut map, "strlen", commands::string::exec_strlen, read_first_key, 2);

    reg(&mut map, "hset", commands::hash::exec_hset, write_first_key, 4);
    reg(&mut map, "hsetnx", commands::hash::exec_hsetnx, write_first_key, 4);
    reg(&mut map, "hget", commands::hash::exec_hget, read_first_key, 3);
    reg(&mut map, "hexists", commands::hash::exec_hexists, read_first_key, 3);
    reg(&mut map, "hdel", commands::hash::exec_hdel, write_first_key, -3);
    reg(&mut map, "hlen", commands::hash::exec_hlen, read_first_key, 2);
    reg(&mut map, "hstrlen", commands::hash::exec_hstrlen, read_first_key, 3);

    reg(&mut map, "sadd", commands::set::exec_sadd, write_first_key, 3);
    reg(&mut map, "sismember", commands::set::exec_sismember, read_first_key, 3);
    reg(&mut map, "spop", commands::set::exec_spop, write_first_key, 2);
    reg(&mut map, "srandmember", commands::set::exec_srandmember, read_first_key, -2);
    reg(&mut map, "srem", commands::set::exec_srem, write_first_key, -3);
    reg(&mut map, "sinter", commands::set::exec_sinter, read_all_keys, -3);
    reg(&mut map, "sunion", commands::set::exec_sunion, read_all_keys, -3);
    reg(&mut map, "sdiff", commands::set::exec_sdiff, read_all_keys, -3);

    reg(&mut map, "del", commands::keys::exec_del, write_all_keys, -2);
    reg(&mut map, "exists", commands::keys::exec_exists, read_all_keys, -2);
    reg(&mut map, "flushdb", commands::keys::exec_flushdb, no_prepare, 1);
    reg(&mut map, "type", commands::keys::exec_type, read_first_key, 2);
    reg(&mut map, "rename", commands::keys::exec_rename, write_all_keys, 3);
    reg(&mut map, "renamenx", commands::keys::exec_renamenx, write_all_keys, 3);
    reg(&mut map, "keys", commands::keys::exec_keys, no_prepare, 2);
    reg(&mut map, "expire", commands::keys::exec_expire, write_first_key, 3);
    reg(&mut map, "expireat", commands::keys::exec_expireat, write_first_key, 3);
    reg(&mut map, "ttl", commands::keys::exec_ttl, read_first_key, 2);

    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_exact_and_variadic() {
        assert!(validate_arity(3, &[Bytes::new(), Bytes::new(), Bytes::new()]));
        assert!(!validate_arity(3, &[Bytes::new(), Bytes::new()]));
        assert!(validate_arity(-2, &[Bytes::new(), Bytes::new()]));
        assert!(validate_arity(-2, &[Bytes::new(), Bytes::new(), Bytes::new()]));
        assert!(!validate_arity(-2, &[Bytes::new()]));
    }

    #[test]
    fn registry_contains_core_commands() {
        let reg = registry();
        assert!(reg.contains_key("get"));
        assert!(reg.contains_key("set"));
        assert!(reg.contains_key("hset"));
        assert!(reg.contains_key("sadd"));
        assert!(reg.contains_key("ttl"));
    }
}
