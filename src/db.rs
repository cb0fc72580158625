//! The command log stores, for every output path, the state of its last
//! successful build: the output's mtime at completion, a hash of the fully
//! expanded command line, and the deps the compiler reported.  Subsequent
//! runs consult it to rebuild only what has genuinely changed.
//!
//! The log is a text file at `<cache_dir>/.cook_log`, one entry per output:
//!
//! ```text
//! <path>\t<mtime>\t<cmd-hash-hex>\t<dep-count>
//! <dep-path>
//! ...
//! ```
//!
//! The whole table is loaded on open and rewritten on close.  A truncated or
//! garbled tail only discards entries (forcing rebuilds); it never caches
//! incorrectly.  An advisory lock on the file serializes concurrent cook
//! processes sharing a cache directory.

use crate::hash::Hash;
use anyhow::{anyhow, Context};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LOG_FILE_NAME: &str = ".cook_log";

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Nanosecond stamp of the output when its build completed.
    pub mtime: u64,
    pub cmd_hash: Hash,
    /// Deps discovered from the compiler's depfile, in depfile order.
    pub deps: Vec<String>,
}

/// An opened command log, holding the advisory lock until close.
pub struct Log {
    file: File,
    path: PathBuf,
    entries: HashMap<String, Entry>,
}

impl Log {
    /// Open (creating if needed) the log under `cache_dir`, acquire the
    /// advisory lock, and load prior entries.
    pub fn open(cache_dir: &Path) -> anyhow::Result<Log> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("create cache dir {}", cache_dir.display()))?;
        let path = cache_dir.join(LOG_FILE_NAME);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        file.lock_exclusive()
            .map_err(|err| anyhow!("lock {}: {}", path.display(), err))?;
        log::debug!("acquired lock on {}", path.display());

        let mut text = String::new();
        file.read_to_string(&mut text)
            .with_context(|| format!("read {}", path.display()))?;
        let entries = parse(&text);
        log::debug!("loaded {} log entries", entries.len());

        Ok(Log {
            file,
            path,
            entries,
        })
    }

    pub fn entry(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn set_entry(&mut self, path: String, entry: Entry) {
        self.entries.insert(path, entry);
    }

    /// Rewrite the table and release the lock.
    pub fn close(mut self) -> anyhow::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        let mut text = String::new();
        for (path, entry) in &self.entries {
            text.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                path,
                entry.mtime,
                entry.cmd_hash.to_hex(),
                entry.deps.len()
            ));
            for dep in &entry.deps {
                text.push_str(dep);
                text.push('\n');
            }
        }
        self.file
            .write_all(text.as_bytes())
            .with_context(|| format!("write {}", self.path.display()))?;
        self.file.flush()?;
        log::debug!("wrote {} log entries", self.entries.len());
        Ok(())
    }
}

/// Parse the stored table.  Stops at the first malformed entry, keeping
/// whatever parsed cleanly before it.
fn parse(text: &str) -> HashMap<String, Entry> {
    let mut entries = HashMap::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        let mut fields = line.split('\t');
        let parsed = (|| {
            let path = fields.next()?;
            let mtime = fields.next()?.parse::<u64>().ok()?;
            let cmd_hash = Hash::from_hex(fields.next()?)?;
            let dep_count = fields.next()?.parse::<usize>().ok()?;
            let mut deps = Vec::with_capacity(dep_count);
            for _ in 0..dep_count {
                deps.push(lines.next()?.to_string());
            }
            Some((
                path.to_string(),
                Entry {
                    mtime,
                    cmd_hash,
                    deps,
                },
            ))
        })();
        match parsed {
            Some((path, entry)) => {
                entries.insert(path, entry);
            }
            None => {
                log::warn!("discarding malformed command log tail");
                break;
            }
        }
    }
    entries
}
