//! The socket-owning half of a client connection. [`memkv_db::Connection`]
//! (just the selected DB index) lives inside this one; everything
//! shaped by the `TcpStream` — the writer, the pending-writes counter, the
//! close timeout — belongs here instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// A connected client: the database-layer state plus everything needed to
/// write replies back and close the socket without cutting off a write
/// that's still in flight.
pub struct Connection {
    pub db: memkv_db::Connection,
    writer: Mutex<WriteHalf<TcpStream>>,
    pending: AtomicUsize,
    drained: Notify,
}

impl Connection {
    pub fn new(writer: WriteHalf<TcpStream>) -> Self {
        Self {
            db: memkv_db::Connection::new(),
            writer: Mutex::new(writer),
            pending: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// Writes `bytes` to the socket, tracking it as in-flight so `close`
    /// can wait for it to finish rather than cutting it off.
    pub async fn write(&self, bytes: &Bytes) -> std::io::Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let result = {
            let mut writer = self.writer.lock().await;
            writer.write_all(bytes).await
        };
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
        result
    }

    /// Waits up to 10 seconds for in-flight writes to finish, then shuts
    /// down the socket regardless of whether they did.
    pub async fn close(&self) {
        let deadline = tokio::time::Instant::now() + CLOSE_TIMEOUT;
        while self.pending.load(Ordering::SeqCst) > 0 {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            let _ = tokio::time::timeout(deadline - now, self.drained.notified()).await;
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_close_drains_cleanly() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (server_stream, _) = listener.accept().await.unwrap();
        let (_read, write) = tokio::io::split(server_stream);
        let conn = Connection::new(write);

        conn.write(&Bytes::from_static(b"+OK\r\n")).await.unwrap();
        conn.close().await;
        drop(client);
    }
}
