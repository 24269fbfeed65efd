//! Non-blocking compaction: produce a fresh AOF that replays to the
//! current in-memory state without pausing command execution for longer
//! than two fsync latencies.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use bytes::Bytes;
use tempfile::NamedTempFile;

use memkv_db::Value;
use memkv_errors::Error;

use crate::{encode_cmdline, load_aof, Persister};

struct RewriteCtx {
    tmp_file: NamedTempFile,
    file_pointer: u64,
    db_idx: usize,
}

impl Persister {
    pub async fn rewrite(&self) -> Result<(), Error> {
        let ctx = self.prep_rewrite()?;
        let ctx = self.replay_and_snapshot(ctx).await?;
        self.append_tail_and_swap(ctx)
    }

    /// Brief pause: fsync the live file, record its current size as the
    /// replay boundary, and open a fresh temp file next to it. Shares the
    /// same pause mutex every write takes, so no write can land between
    /// this snapshot and the live file being replaced in `append_tail_and_swap`.
    fn prep_rewrite(&self) -> Result<RewriteCtx, Error> {
        let _guard = self.pause.lock();
        let file = self.file.lock();
        file.sync_all().map_err(Error::Io)?;
        let file_pointer = file.metadata().map_err(Error::Io)?.len();
        drop(file);

        let dir = self.filename.parent().unwrap_or_else(|| std::path::Path::new("."));
        let tmp_file = NamedTempFile::new_in(dir).map_err(Error::Io)?;

        Ok(RewriteCtx {
            tmp_file,
            file_pointer,
            db_idx: self.current_db.load(std::sync::atomic::Ordering::SeqCst),
        })
    }

    /// No pause: replay the live file (up to the recorded boundary) into a
    /// disposable engine, then dump its state as the minimal commands that
    /// recreate it.
    async fn replay_and_snapshot(&self, ctx: RewriteCtx) -> Result<RewriteCtx, Error> {
        let tmp_engine = (self.tmp_db_engine_maker)();
        load_aof(tmp_engine.as_ref(), &self.filename, Some(ctx.file_pointer)).await?;

        let mut tmp_file = ctx.tmp_file;
        for i in 0..tmp_engine.database_count() {
            tmp_file.write_all(&encode_cmdline(&[Bytes::from_static(b"select"), Bytes::from(i.to_string())])).map_err(Error::Io)?;

            let mut write_err = None;
            tmp_engine.for_each(i, &mut |key, value, expire_at| {
                for cmdline in entity_to_cmdlines(key, value) {
                    if let Err(e) = tmp_file.write_all(&encode_cmdline(&cmdline)) {
                        write_err = Some(e);
                        return false;
                    }
                }
                if let Some(expire_at) = expire_at {
                    let unix_secs = expire_at.duration_since(SystemTime::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
                    let cmd = [Bytes::from_static(b"expireat"), Bytes::from(key.to_string()), Bytes::from(unix_secs.to_string())];
                    if let Err(e) = tmp_file.write_all(&encode_cmdline(&cmd)) {
                        write_err = Some(e);
                        return false;
                    }
                }
                true
            });
            if let Some(e) = write_err {
                return Err(Error::Io(e));
            }
        }

        Ok(RewriteCtx {
            tmp_file,
            file_pointer: ctx.file_pointer,
            db_idx: ctx.db_idx,
        })
    }

    /// Brief pause: append everything written to the live file since the
    /// boundary, then swap the temp file in as the new live file. Held
    /// under the same mutex `write_payload` takes, so the tail read and
    /// the rename are atomic with respect to concurrent writers.
    fn append_tail_and_swap(&self, ctx: RewriteCtx) -> Result<(), Error> {
        let _guard = self.pause.lock();

        let mut src = File::open(&self.filename).map_err(Error::Io)?;
        src.seek(SeekFrom::Start(ctx.file_pointer)).map_err(Error::Io)?;

        let mut tmp_file = ctx.tmp_file;
        tmp_file
            .write_all(&encode_cmdline(&[Bytes::from_static(b"select"), Bytes::from(ctx.db_idx.to_string())]))
            .map_err(Error::Io)?;

        let mut tail = Vec::new();
        src.read_to_end(&mut tail).map_err(Error::Io)?;
        tmp_file.write_all(&tail).map_err(Error::Io)?;
        tmp_file.flush().map_err(Error::Io)?;

        tmp_file.persist(&self.filename).map_err(|e| Error::Io(e.error))?;

        let reopened = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.filename)
            .map_err(Error::Io)?;
        *self.file.lock() = reopened;

        let final_db = self.current_db.load(std::sync::atomic::Ordering::SeqCst);
        let select = encode_cmdline(&[Bytes::from_static(b"select"), Bytes::from(final_db.to_string())]);
        self.file.lock().write_all(&select).map_err(Error::Io)?;

        Ok(())
    }
}

fn entity_to_cmdlines(key: &str, value: &Value) -> Vec<Vec<Bytes>> {
    let key = Bytes::from(key.to_string());
    match value {
        Value::Bytes(b) => vec![vec![Bytes::from_static(b"set"), key, b.clone()]],
        Value::Hash(h) => h
            .iter()
            .map(|(field, v)| vec![Bytes::from_static(b"hset"), key.clone(), Bytes::from(field.clone()), v.clone()])
            .collect(),
        Value::Set(s) => s
            .iter()
            .map(|member| vec![Bytes::from_static(b"sadd"), key.clone(), Bytes::from(member.clone())])
            .collect(),
    }
}
