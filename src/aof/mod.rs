// Package aof implements the append-only durability log: one line per Set,
// field-separated by `|`, replayed from offset 0 on startup.
//
// `SET|<json key>|<json value>|<expiry unix seconds>`
//
// Key and value are encoded with serde_json and then have any literal `|`
// byte rewritten to the JSON escape `|`, so the line stays valid JSON
// and never contains a raw pipe or newline outside the escape itself.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::AofError;
use crate::key::CacheKey;

const TAG_SET: &str = "SET";

/// Append-only log, guarded by a lock independent of any shard lock so
/// shard writes never serialize behind disk I/O.
pub struct Aof {
    path: PathBuf,
    writer: Mutex<BufWriter<std::fs::File>>,
}

impl Aof {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AofError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AofError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one SET record. Buffered; does not fsync.
    pub fn append_set<K, V>(&self, key: &K, value: &V, expires_at: i64) -> Result<(), AofError>
    where
        K: Serialize,
        V: Serialize,
    {
        let line = encode_set(key, value, expires_at)?;
        let mut w = self.writer.lock();
        w.write_all(line.as_bytes()).map_err(AofError::Write)?;
        w.write_all(b"\n").map_err(AofError::Write)?;
        Ok(())
    }

    /// Flushes the buffer and forces the file to stable storage.
    pub fn sync(&self) -> Result<(), AofError> {
        let mut w = self.writer.lock();
        w.flush().map_err(AofError::Flush)?;
        w.get_ref().sync_all().map_err(AofError::Sync)?;
        Ok(())
    }
}

fn encode_set<K: Serialize, V: Serialize>(
    key: &K,
    value: &V,
    expires_at: i64,
) -> Result<String, AofError> {
    let key_json = serde_json::to_string(key).map_err(AofError::Encode)?;
    let value_json = serde_json::to_string(value).map_err(AofError::Encode)?;
    Ok(format!(
        "{}|{}|{}|{}",
        TAG_SET,
        escape_pipes(&key_json),
        escape_pipes(&value_json),
        expires_at
    ))
}

fn escape_pipes(s: &str) -> String {
    if s.as_bytes().contains(&b'|') {
        s.replace('|', "\\u007c")
    } else {
        s.to_string()
    }
}

/// Replays an AOF file from offset 0, applying every non-expired SET record
/// through `apply`. Corrupt, truncated, or non-parseable lines are skipped,
/// never fatal — a partially written final line from a crash is expected.
pub fn replay<K, V, F>(path: &Path, now: i64, mut apply: F) -> Result<usize, AofError>
where
    K: CacheKey + DeserializeOwned,
    V: Clone + DeserializeOwned,
    F: FnMut(K, V, i64),
{
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(source) => {
            return Err(AofError::Open {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let reader = BufReader::new(file);
    let mut applied = 0;
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(component = "aof", event = "replay_read_error", line = lineno, error = %e, "skipping unreadable line");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(4, '|').collect();
        if fields.len() != 4 || fields[0] != TAG_SET {
            warn!(component = "aof", event = "replay_skip", line = lineno, "skipping malformed record");
            continue;
        }
        let key: K = match serde_json::from_str(fields[1]) {
            Ok(k) => k,
            Err(_) => {
                warn!(component = "aof", event = "replay_skip", line = lineno, "skipping record with malformed key");
                continue;
            }
        };
        let value: V = match serde_json::from_str(fields[2]) {
            Ok(v) => v,
            Err(_) => {
                warn!(component = "aof", event = "replay_skip", line = lineno, "skipping record with malformed value");
                continue;
            }
        };
        let expires_at: i64 = match fields[3].parse() {
            Ok(e) => e,
            Err(_) => {
                warn!(component = "aof", event = "replay_skip", line = lineno, "skipping record with malformed expiry");
                continue;
            }
        };
        if expires_at > now {
            apply(key, value, expires_at - now);
            applied += 1;
        }
    }
    Ok(applied)
}
