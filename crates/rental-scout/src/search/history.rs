use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("unable to read history {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("unable to append to history {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("unable to clear history {}: {source}", .path.display())]
    Clear { path: PathBuf, source: io::Error },
}

/// Listing URLs already emitted by earlier runs, backed by a line-per-URL file.
///
/// `record` only touches memory; `flush` appends the URLs recorded since the
/// previous flush. Duplicate lines in the file are harmless.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    seen: HashSet<String>,
    pending: Vec<String>,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: HashSet::new(),
            pending: Vec::new(),
        }
    }

    /// Reads the history file into memory. A missing file is an empty history.
    ///
    /// Lines that are not valid UTF-8 are skipped; the rest still count.
    pub fn load(&mut self) -> Result<usize, PersistenceError> {
        match fs::read(&self.path) {
            Ok(contents) => {
                for (number, line) in contents.split(|byte| *byte == b'\n').enumerate() {
                    let Ok(line) = std::str::from_utf8(line) else {
                        warn!(path = %self.path.display(), line = number + 1, "skipping undecodable history line");
                        continue;
                    };
                    let line = line.trim();
                    if !line.is_empty() {
                        self.seen.insert(line.to_string());
                    }
                }
                Ok(self.seen.len())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(self.seen.len()),
            Err(source) => Err(PersistenceError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Returns `false` when the URL was already known.
    pub fn record(&mut self, url: &str) -> bool {
        if self.seen.insert(url.to_string()) {
            self.pending.push(url.to_string());
            true
        } else {
            false
        }
    }

    /// Appends pending URLs to the history file, returning how many were written.
    ///
    /// On failure the pending URLs are kept so a later flush can retry them.
    pub fn flush(&mut self) -> Result<usize, PersistenceError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut lines = String::new();
        for url in &self.pending {
            lines.push_str(url);
            lines.push('\n');
        }

        self.append(lines.as_bytes())
            .map_err(|source| PersistenceError::Write {
                path: self.path.clone(),
                source,
            })?;

        let written = self.pending.len();
        self.pending.clear();
        Ok(written)
    }

    /// Removes the history file and forgets everything held in memory.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(PersistenceError::Clear {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        self.seen.clear();
        self.pending.clear();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL_A: &str = "https://apartamento.mercadolibre.com.uy/MLU-1-_JM";
    const URL_B: &str = "https://apartamento.mercadolibre.com.uy/MLU-2-_JM";

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = DedupStore::new(dir.path().join("visited.txt"));
        assert_eq!(store.load().expect("load"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn recorded_urls_survive_a_fresh_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("visited.txt");

        let mut store = DedupStore::new(&path);
        store.load().expect("load");
        assert!(store.record(URL_A));
        assert!(store.contains(URL_A));
        assert_eq!(store.flush().expect("flush"), 1);
        assert_eq!(store.pending(), 0);

        let mut reloaded = DedupStore::new(&path);
        assert_eq!(reloaded.load().expect("reload"), 1);
        assert!(reloaded.contains(URL_A));
        assert!(!reloaded.contains(URL_B));
    }

    #[test]
    fn record_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("visited.txt");
        let mut store = DedupStore::new(&path);

        assert!(store.record(URL_A));
        assert!(!store.record(URL_A));
        assert_eq!(store.flush().expect("flush"), 1);
        assert!(!store.record(URL_A));
        assert_eq!(store.flush().expect("nothing pending"), 0);

        let contents = fs::read_to_string(&path).expect("history written");
        assert_eq!(contents, format!("{URL_A}\n"));
    }

    #[test]
    fn duplicate_and_blank_lines_in_storage_are_harmless() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("visited.txt");
        fs::write(&path, format!("{URL_A}\n\n  {URL_A}  \n{URL_B}\n")).expect("seed history");

        let mut store = DedupStore::new(&path);
        assert_eq!(store.load().expect("load"), 2);
        assert!(store.contains(URL_A));
        assert!(store.contains(URL_B));
    }

    #[test]
    fn undecodable_line_does_not_discard_the_rest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("visited.txt");
        let mut contents = format!("{URL_A}\n").into_bytes();
        contents.extend_from_slice(b"https://x/\xff\n");
        contents.extend_from_slice(format!("{URL_B}\r\n").as_bytes());
        fs::write(&path, contents).expect("seed history");

        let mut store = DedupStore::new(&path);
        assert_eq!(store.load().expect("load"), 2);
        assert!(store.contains(URL_A));
        assert!(store.contains(URL_B));
    }

    #[test]
    fn clear_removes_persisted_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("visited.txt");
        let mut store = DedupStore::new(&path);
        store.record(URL_A);
        store.flush().expect("flush");

        store.clear().expect("clear");
        assert!(!path.exists());
        assert!(store.is_empty());

        let mut reloaded = DedupStore::new(&path);
        assert_eq!(reloaded.load().expect("load after clear"), 0);
        store.clear().expect("clearing twice is fine");
    }

    #[test]
    fn unreadable_history_is_a_persistence_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = DedupStore::new(dir.path());
        match store.load() {
            Err(PersistenceError::Read { path, .. }) => assert_eq!(path, dir.path()),
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[test]
    fn failed_flush_keeps_pending_urls() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = DedupStore::new(dir.path());
        store.record(URL_A);
        assert!(matches!(store.flush(), Err(PersistenceError::Write { .. })));
        assert_eq!(store.pending(), 1);
    }
}
