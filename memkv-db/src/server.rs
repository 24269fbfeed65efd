//! The indexed database set plus whatever AOF controller is wired in.
//! `Server::exec` is the single entry point every connection calls: it
//! peels off `select`/`rewriteaof` and otherwise forwards to the selected
//! database.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use parking_lot::RwLock;

use memkv_errors::Error;
use memkv_resp::Reply;
use memkv_timewheel::TimeWheel;

use crate::connection::Connection;
use crate::db::Database;
use crate::value::Value;

/// The subset of database-server behavior the AOF persister needs to
/// replay commands and snapshot state for a rewrite. Implemented by
/// [`Server`]; kept as a trait so `memkv-aof` never depends on the
/// concrete server type, only on this interface (mirroring the boundary
/// the original database/aof split draws).
#[async_trait::async_trait]
pub trait DbEngine: Send + Sync {
    async fn exec(&self, conn: &Connection, cmdline: &[Bytes]) -> Reply;

    /// Visits every (key, value, optional expiry) pair of database `index`.
    fn for_each(&self, index: usize, visitor: &mut dyn FnMut(&str, &Value, Option<SystemTime>) -> bool);

    fn database_count(&self) -> usize;
}

/// The AOF controller's view from the server's side: forward a successful
/// mutation, and trigger a rewrite on demand. Implemented by
/// `memkv_aof::Persister`.
#[async_trait::async_trait]
pub trait AofHandle: Send + Sync {
    fn save(&self, db_index: usize, cmdline: Vec<Bytes>);

    async fn rewrite(&self) -> Result<(), Error>;
}

pub struct Server {
    databases: Vec<Arc<Database>>,
    aof: RwLock<Option<Arc<dyn AofHandle>>>,
}

const DEFAULT_TICK: Duration = Duration::from_millis(100);
const DEFAULT_WHEEL_SLOTS: usize = 3600;

impl Server {
    /// Builds `count` empty databases sharing a single timing-wheel actor.
    pub fn new(count: usize) -> Self {
        let wheel = TimeWheel::spawn(DEFAULT_TICK, DEFAULT_WHEEL_SLOTS);
        let databases = (0..count).map(|i| Arc::new(Database::new(i, wheel.clone()))).collect();
        Self {
            databases,
            aof: RwLock::new(None),
        }
    }

    pub fn database(&self, index: usize) -> Option<&Arc<Database>> {
        self.databases.get(index)
    }

    /// Wires `handle` in as the AOF controller and installs a forwarding
    /// hook on every database, capturing each database's own index
    /// explicitly rather than relying on a shared loop variable.
    pub fn install_aof(&self, handle: Arc<dyn AofHandle>) {
        for db in &self.databases {
            let sink = Arc::clone(&handle);
            db.set_aof_hook(Arc::new(move |db_index: usize, cmdline: Vec<Bytes>| sink.save(db_index, cmdline)));
        }
        *self.aof.write() = Some(handle);
    }

    pub async fn exec(&self, conn: &Connection, cmdline: &[Bytes]) -> Reply {
        if cmdline.is_empty() {
            return Reply::Error(Error::UnknownCommand.wire_message());
        }
        let name = String::from_utf8_lossy(&cmdline[0]).to_lowercase();
        match name.as_str() {
            "rewriteaof" => self.exec_rewriteaof().await,
            "select" => self.exec_select(conn, &cmdline[1..]),
            _ => {
                let db = match self.databases.get(conn.selected_db()) {
                    Some(db) => db,
                    None => return Reply::Error(Error::DbIndexOutOfRange.wire_message()),
                };
                db.exec(cmdline)
            }
        }
    }

    async fn exec_rewriteaof(&self) -> Reply {
        let handle = self.aof.read().clone();
        match handle {
            None => Reply::Error(Error::Other("Aof persistence is not enabled".to_string()).wire_message()),
            Some(handle) => match handle.rewrite().await {
                Ok(()) => Reply::Ok,
                Err(e) => Reply::Error(e.wire_message()),
            },
        }
    }

    fn exec_select(&self, conn: &Connection, args: &[Bytes]) -> Reply {
        if args.len() != 1 {
            return Reply::Error(Error::WrongArity("select".to_string()).wire_message());
        }
        let index: i64 = match String::from_utf8_lossy(&args[0]).parse() {
            Ok(n) => n,
            Err(_) => return Reply::Error(Error::NotAnInteger.wire_message()),
        };
        if index < 0 || index as usize >= self.databases.len() {
            return Reply::Error(Error::DbIndexOutOfRange.wire_message());
        }
        conn.select_db(index as usize);
        Reply::Ok
    }
}

#[async_trait::async_trait]
impl DbEngine for Server {
    async fn exec(&self, conn: &Connection, cmdline: &[Bytes]) -> Reply {
        Server::exec(self, conn, cmdline).await
    }

    fn for_each(&self, index: usize, visitor: &mut dyn FnMut(&str, &Value, Option<SystemTime>) -> bool) {
        if let Some(db) = self.databases.get(index) {
            db.for_each(|key, value, expire_at| visitor(key, value, expire_at));
        }
    }

    fn database_count(&self) -> usize {
        self.databases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn select_switches_active_database() {
        let server = Server::new(4);
        let conn = Connection::new();
        assert_eq!(server.exec(&conn, &[Bytes::from_static(b"SELECT"), Bytes::from_static(b"2")]).await, Reply::Ok);
        assert_eq!(conn.selected_db(), 2);
    }

    #[tokio::test]
    async fn select_out_of_range_errors() {
        let server = Server::new(2);
        let conn = Connection::new();
        assert!(server.exec(&conn, &[Bytes::from_static(b"SELECT"), Bytes::from_static(b"9")]).await.is_error());
    }

    #[tokio::test]
    async fn rewriteaof_without_persister_errors() {
        let server = Server::new(1);
        let conn = Connection::new();
        assert!(server.exec(&conn, &[Bytes::from_static(b"REWRITEAOF")]).await.is_error());
    }

    #[tokio::test]
    async fn dispatches_to_selected_database() {
        let server = Server::new(2);
        let conn = Connection::new();
        server.exec(&conn, &[Bytes::from_static(b"SELECT"), Bytes::from_static(b"1")]).await;
        server.exec(&conn, &[Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]).await;
        let reply = server.exec(&conn, &[Bytes::from_static(b"GET"), Bytes::from_static(b"k")]).await;
        assert_eq!(reply, Reply::Bulk(Bytes::from_static(b"v")));

        let conn2 = Connection::new();
        let reply = server.exec(&conn2, &[Bytes::from_static(b"GET"), Bytes::from_static(b"k")]).await;
        assert_eq!(reply, Reply::NullBulk);
    }
}
