//! Append-only-file persistence: every successful mutation is re-encoded as
//! the RESP command that produced it and appended to a log that can be
//! replayed to reconstruct the store. [`rewrite`] implements the
//! non-blocking compaction that keeps the log from growing without bound.

pub mod rewrite;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use parking_lot::Mutex;

use memkv_db::{AofHandle, Connection, DbEngine};
use memkv_errors::Error;
use memkv_resp::{parse_stream, Payload, Reply};

/// Matches the original implementation's fixed queue depth; deep enough
/// that a burst of writes under `everysec`/`no` doesn't apply backpressure
/// to command execution in practice.
pub const AOF_QUEUE_SIZE: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    Always,
    EverySec,
    No,
}

impl FsyncPolicy {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "always" => FsyncPolicy::Always,
            "no" => FsyncPolicy::No,
            _ => FsyncPolicy::EverySec,
        }
    }
}

struct QueuedPayload {
    cmdline: Vec<Bytes>,
    db_index: usize,
}

/// Type-erased constructor for a disposable [`DbEngine`] used only to
/// replay the live AOF into during a rewrite.
pub type DbEngineFactory = Arc<dyn Fn() -> Arc<dyn DbEngine> + Send + Sync>;

pub struct Persister {
    pub(crate) db_engine: Arc<dyn DbEngine>,
    pub(crate) tmp_db_engine_maker: DbEngineFactory,
    pub(crate) filename: PathBuf,
    pub(crate) fsync: FsyncPolicy,
    pub(crate) file: Arc<Mutex<File>>,
    pub(crate) current_db: Arc<AtomicUsize>,
    /// Held across every write (direct or queued) and across both brief
    /// rewrite phases, so a write can never land between rewrite's
    /// tail-copy and its swap of the live file.
    pub(crate) pause: Arc<Mutex<()>>,
    sender: Option<std::sync::mpsc::SyncSender<QueuedPayload>>,
    writer_thread: Option<std::thread::JoinHandle<()>>,
    ticker_stop: Arc<AtomicBool>,
    ticker_thread: Option<std::thread::JoinHandle<()>>,
}

impl Persister {
    /// Optionally replays an existing log, opens (or creates) the live
    /// file for append, and starts the background writer (and, for
    /// `everysec`, the fsync ticker).
    pub async fn new(
        db_engine: Arc<dyn DbEngine>,
        load: bool,
        filename: impl Into<PathBuf>,
        fsync: &str,
        tmp_db_engine_maker: DbEngineFactory,
    ) -> Result<Self, Error> {
        let filename = filename.into();
        let fsync = FsyncPolicy::parse(fsync);
        let current_db = Arc::new(AtomicUsize::new(0));

        if load {
            if let Some(last_selected) = load_aof(db_engine.as_ref(), &filename, None).await? {
                current_db.store(last_selected, Ordering::SeqCst);
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&filename)
            .map_err(Error::Io)?;
        let file = Arc::new(Mutex::new(file));
        let pause = Arc::new(Mutex::new(()));

        let (sender, receiver) = std::sync::mpsc::sync_channel::<QueuedPayload>(AOF_QUEUE_SIZE);
        let writer_file = Arc::clone(&file);
        let writer_pause = Arc::clone(&pause);
        let writer_current_db = Arc::clone(&current_db);
        let writer_fsync = fsync;
        let writer_thread = std::thread::spawn(move || {
            for payload in receiver {
                write_payload(&writer_file, &writer_pause, &writer_current_db, writer_fsync, &payload.cmdline, payload.db_index);
            }
        });

        let ticker_stop = Arc::new(AtomicBool::new(false));
        let ticker_thread = if fsync == FsyncPolicy::EverySec {
            let ticker_file = Arc::clone(&file);
            let ticker_pause = Arc::clone(&pause);
            let stop = Arc::clone(&ticker_stop);
            Some(std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(std::time::Duration::from_secs(1));
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let _pause_guard = ticker_pause.lock();
                    let file = ticker_file.lock();
                    if let Err(e) = file.sync_all() {
                        tracing::warn!(error = %e, "aof fsync failed");
                    }
                    drop(file);
                }
            }))
        } else {
            None
        };

        Ok(Self {
            db_engine,
            tmp_db_engine_maker,
            filename,
            fsync,
            file,
            current_db,
            pause,
            sender: Some(sender),
            writer_thread: Some(writer_thread),
            ticker_stop,
            ticker_thread,
        })
    }

    /// The callback installed as every database's AOF hook.
    pub fn save(&self, db_index: usize, cmdline: Vec<Bytes>) {
        if self.fsync == FsyncPolicy::Always {
            write_payload(&self.file, &self.pause, &self.current_db, self.fsync, &cmdline, db_index);
            return;
        }
        let sent = self.sender.as_ref().map(|sender| sender.send(QueuedPayload { cmdline, db_index }));
        if matches!(sent, Some(Err(_))) {
            tracing::warn!("aof writer thread gone, dropping payload");
        }
    }

    /// Stops the ticker, closes the queue so the writer thread's drain
    /// loop ends, and joins both threads.
    pub fn close(&mut self) {
        self.ticker_stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.ticker_thread.take() {
            let _ = handle.join();
        }
        // Dropping the sender closes the channel; only then does the
        // writer thread's `for payload in receiver` loop end on its own.
        self.sender.take();
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Persister {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait::async_trait]
impl AofHandle for Persister {
    fn save(&self, db_index: usize, cmdline: Vec<Bytes>) {
        Persister::save(self, db_index, cmdline)
    }

    async fn rewrite(&self) -> Result<(), Error> {
        Persister::rewrite(self).await
    }
}

fn write_payload(file: &Mutex<File>, pause: &Mutex<()>, current_db: &AtomicUsize, fsync: FsyncPolicy, cmdline: &[Bytes], db_index: usize) {
    use std::io::Write as _;
    let _pause_guard = pause.lock();
    let mut file = file.lock();
    if current_db.load(Ordering::SeqCst) != db_index {
        let select = encode_cmdline(&[Bytes::from_static(b"select"), Bytes::from(db_index.to_string())]);
        if let Err(e) = file.write_all(&select) {
            tracing::warn!(error = %e, "aof write failed");
            return;
        }
        current_db.store(db_index, Ordering::SeqCst);
    }
    let data = encode_cmdline(cmdline);
    if let Err(e) = file.write_all(&data) {
        tracing::warn!(error = %e, "aof write failed");
        return;
    }
    if fsync == FsyncPolicy::Always {
        if let Err(e) = file.sync_all() {
            tracing::warn!(error = %e, "aof fsync failed");
        }
    }
}

/// Encodes a command line the same way it would be sent over the wire: a
/// RESP multi-bulk array of bulk strings.
pub(crate) fn encode_cmdline(cmdline: &[Bytes]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.extend_from_slice(format!("*{}\r\n", cmdline.len()).as_bytes());
    for arg in cmdline {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf.freeze()
}

/// Replays `path` against `db_engine` through a synthetic connection, up
/// to `limit` bytes if given. Returns the last `SELECT`ed index observed,
/// if any, so the caller can pick up the writer's notion of "current db"
/// where the log left off.
pub(crate) async fn load_aof(db_engine: &dyn DbEngine, path: &Path, limit: Option<u64>) -> Result<Option<usize>, Error> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    let reader: Box<dyn tokio::io::AsyncBufRead + Unpin + Send> = match limit {
        Some(n) => Box::new(tokio::io::BufReader::new(tokio::io::AsyncReadExt::take(file, n))),
        None => Box::new(tokio::io::BufReader::new(file)),
    };

    let conn = Connection::new();
    let mut last_selected = None;
    let mut stream = Box::pin(parse_stream(reader));
    while let Some(payload) = stream.next().await {
        let reply = match payload {
            Payload::Err(e) if e.is_fatal() => break,
            Payload::Err(_) => continue,
            Payload::Reply(Reply::MultiBulk(items)) => {
                let cmdline: Vec<Bytes> = match items.into_iter().collect::<Option<Vec<Bytes>>>() {
                    Some(c) if !c.is_empty() => c,
                    _ => continue,
                };
                if cmdline[0].eq_ignore_ascii_case(b"select") {
                    if let Some(idx) = cmdline.get(1).and_then(|b| String::from_utf8_lossy(b).parse::<usize>().ok()) {
                        conn.select_db(idx);
                        last_selected = Some(idx);
                    }
                    continue;
                }
                db_engine.exec(&conn, &cmdline).await
            }
            Payload::Reply(_) => continue,
        };
        if reply.is_error() {
            tracing::warn!(?reply, "error replaying aof entry");
        }
    }
    Ok(last_selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsync_policy_parses_known_values() {
        assert_eq!(FsyncPolicy::parse("always"), FsyncPolicy::Always);
        assert_eq!(FsyncPolicy::parse("ALWAYS"), FsyncPolicy::Always);
        assert_eq!(FsyncPolicy::parse("no"), FsyncPolicy::No);
        assert_eq!(FsyncPolicy::parse("everysec"), FsyncPolicy::EverySec);
        assert_eq!(FsyncPolicy::parse("bogus"), FsyncPolicy::EverySec);
    }

    #[test]
    fn encode_cmdline_matches_wire_format() {
        let encoded = encode_cmdline(&[Bytes::from_static(b"SET"), Bytes::from_static(b"k"), Bytes::from_static(b"v")]);
        assert_eq!(&encoded[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }
}
