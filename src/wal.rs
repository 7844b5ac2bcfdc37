use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event to [len][bincode][crc32] format.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

/// Append-only log of every appointment and catalog change.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A torn last entry (crash mid-write) is discarded on replay via length-prefix + CRC check.
/// - A batch that fails to commit is cut back off the file with [`Wal::rollback`].
///   If that also fails the log refuses further appends until the next
///   compaction rewrites it, so no acknowledged entry ever follows a torn one.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    poisoned: bool,
}

/// Committed position of the log, taken before a batch is buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    len: u64,
    appends: u64,
}

impl Wal {
    /// Open (or create) the WAL file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            poisoned: false,
        })
    }

    /// Append one event and fsync. Tests only; the engine batches through
    /// `append_buffered` + `flush_sync`.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event without flushing. Durable only after `flush_sync()`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("WAL is poisoned by an earlier failed commit"));
        }
        encode_event(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Flush the BufWriter and fsync the underlying file.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    /// Current committed length. Anything still in the buffer is excluded.
    pub fn checkpoint(&self) -> io::Result<Checkpoint> {
        let len = self.writer.get_ref().metadata()?.len();
        Ok(Checkpoint {
            len,
            appends: self.appends_since_compact,
        })
    }

    /// Discard everything written or buffered since `checkpoint`.
    ///
    /// The buffer is dropped unflushed and the file truncated back to the
    /// checkpoint length. On failure the log is poisoned.
    pub fn rollback(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        let result = self.truncate_to(checkpoint);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn truncate_to(&mut self, checkpoint: Checkpoint) -> io::Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the unflushed bytes instead of writing them.
        let (_, _unflushed) = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(checkpoint.len)?;
        file.sync_all()?;
        self.appends_since_compact = checkpoint.appends;
        Ok(())
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write compacted events to `<wal>.tmp` and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the temp file over the WAL and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.poisoned = false;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the WAL from disk, returning all valid events in order.
    /// Replay stops at the first truncated or corrupt entry.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(path = %path.display(), replayed = events.len(), "discarding truncated WAL entry");
                    break;
                }
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(path = %path.display(), replayed = events.len(), "discarding truncated WAL entry");
                    break;
                }
                Err(e) => return Err(e),
            }
            let stored_crc = u32::from_le_bytes(crc_buf);

            if stored_crc != crc32fast::hash(&payload) {
                tracing::warn!(path = %path.display(), replayed = events.len(), "WAL checksum mismatch, stopping replay");
                break;
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "undecodable WAL entry, stopping replay");
                    break;
                }
            }
        }

        Ok(events)
    }
}
