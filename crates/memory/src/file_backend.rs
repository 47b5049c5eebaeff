//! Paired JSON-lines persistence for the vector store.
//!
//! Two files live side by side in the memory directory:
//!
//! - `records.jsonl`: one JSON-encoded `MemoryRecord` per line
//! - `vectors.jsonl`: one JSON array of floats per line
//!
//! Line `i` of each file belongs to the same entry. Loading pairs lines by
//! position and drops a pair when either half is unreadable. A failed
//! append truncates both files back to their previous lengths, so a record
//! is never left behind without its vector.

use cartwise_core::error::MemoryError;
use cartwise_core::memory::MemoryRecord;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const RECORDS_FILE: &str = "records.jsonl";
const VECTORS_FILE: &str = "vectors.jsonl";

/// Location of a persisted store.
#[derive(Debug, Clone)]
pub struct PairedFiles {
    dir: PathBuf,
}

impl PairedFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default directory: `~/.cartwise/memory`
    pub fn default_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".cartwise").join("memory")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    /// Load every readable pair. Missing files mean an empty store.
    pub fn load(&self) -> (Vec<MemoryRecord>, Vec<Vec<f32>>) {
        let records = read_lines(&self.records_path());
        let vectors = read_lines(&self.vectors_path());

        if records.len() != vectors.len() {
            warn!(
                records = records.len(),
                vectors = vectors.len(),
                "Memory files have different lengths, ignoring unpaired tail"
            );
        }

        let mut out_records = Vec::new();
        let mut out_vectors = Vec::new();
        for (i, (r, v)) in records.iter().zip(vectors.iter()).enumerate() {
            let record = serde_json::from_str::<MemoryRecord>(r);
            let vector = serde_json::from_str::<Vec<f32>>(v);
            match (record, vector) {
                (Ok(record), Ok(vector)) => {
                    if let Some(first) = out_vectors.first().map(|f: &Vec<f32>| f.len()) {
                        if first != vector.len() {
                            warn!(line = i + 1, "Skipping memory entry with mismatched dimension");
                            continue;
                        }
                    }
                    out_records.push(record);
                    out_vectors.push(vector);
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(line = i + 1, error = %e, "Skipping corrupted memory entry");
                }
            }
        }

        debug!(dir = %self.dir.display(), count = out_records.len(), "Memory files loaded");
        (out_records, out_vectors)
    }

    /// Append one pair to both files, or neither.
    pub fn append(&self, record: &MemoryRecord, vector: &[f32]) -> Result<(), MemoryError> {
        self.ensure_dir()?;
        let record_line = serde_json::to_string(record)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize memory record: {e}")))?;
        let vector_line = serde_json::to_string(vector)
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize vector: {e}")))?;

        let records_path = self.records_path();
        let vectors_path = self.vectors_path();
        let records_len = file_len(&records_path);
        let vectors_len = file_len(&vectors_path);

        let written = append_line(&records_path, &record_line)
            .and_then(|()| append_line(&vectors_path, &vector_line));
        if let Err(e) = written {
            warn!(error = %e, "Memory append failed, rolling back");
            truncate_to(&records_path, records_len);
            truncate_to(&vectors_path, vectors_len);
            return Err(e);
        }
        Ok(())
    }

    /// Truncate both files.
    pub fn clear(&self) -> Result<(), MemoryError> {
        self.ensure_dir()?;
        for path in [self.records_path(), self.vectors_path()] {
            std::fs::write(&path, "").map_err(|e| {
                MemoryError::Storage(format!("Failed to clear {}: {e}", path.display()))
            })?;
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), MemoryError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            MemoryError::Storage(format!("Failed to create memory directory: {e}"))
        })
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(), // File doesn't exist yet
    }
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Best-effort rollback of a partial append.
fn truncate_to(path: &Path, len: u64) {
    let truncated = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_len(len));
    if let Err(e) = truncated {
        debug!(path = %path.display(), error = %e, "Could not truncate memory file");
    }
}

fn append_line(path: &Path, line: &str) -> Result<(), MemoryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MemoryError::Storage(format!("Failed to open {}: {e}", path.display())))?;
    writeln!(file, "{line}")
        .map_err(|e| MemoryError::Storage(format!("Failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_dir_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path().join("nope"));
        let (records, vectors) = files.load();
        assert!(records.is_empty() && vectors.is_empty());
    }

    #[test]
    fn append_then_load_keeps_pairs() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path());
        files.append(&MemoryRecord::new("first"), &[1.0, 0.0]).unwrap();
        files.append(&MemoryRecord::new("second"), &[0.0, 1.0]).unwrap();

        let (records, vectors) = files.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].text, "second");
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn corrupted_line_drops_its_pair_only() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path());
        files.append(&MemoryRecord::new("a"), &[1.0]).unwrap();
        files.append(&MemoryRecord::new("b"), &[2.0]).unwrap();
        files.append(&MemoryRecord::new("c"), &[3.0]).unwrap();

        // Corrupt the middle record
        let path = tmp.path().join(RECORDS_FILE);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        std::fs::write(&path, format!("{}\nthis is not json\n{}\n", lines[0], lines[2])).unwrap();

        let (records, vectors) = files.load();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "a");
        assert_eq!(vectors[0], vec![1.0]);
        assert_eq!(records[1].text, "c");
        assert_eq!(vectors[1], vec![3.0]);
    }

    #[test]
    fn unpaired_tail_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path());
        files.append(&MemoryRecord::new("a"), &[1.0]).unwrap();
        append_line(&tmp.path().join(VECTORS_FILE), "[9.0]").unwrap();

        let (records, vectors) = files.load();
        assert_eq!(records.len(), 1);
        assert_eq!(vectors.len(), 1);
    }

    #[test]
    fn failed_vector_append_leaves_no_orphan_record() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path());
        files.append(&MemoryRecord::new("a"), &[1.0]).unwrap();

        // A directory in place of the vectors file makes the second write fail
        let vectors = tmp.path().join(VECTORS_FILE);
        let saved = tmp.path().join("vectors.saved");
        std::fs::rename(&vectors, &saved).unwrap();
        std::fs::create_dir(&vectors).unwrap();
        assert!(files.append(&MemoryRecord::new("bbbbbbbbbb"), &[10.0]).is_err());
        std::fs::remove_dir(&vectors).unwrap();
        std::fs::rename(&saved, &vectors).unwrap();

        files.append(&MemoryRecord::new("ccc"), &[3.0]).unwrap();

        let (records, vectors) = files.load();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "ccc"]);
        assert_eq!(vectors, vec![vec![1.0], vec![3.0]]);
    }

    #[test]
    fn clear_truncates() {
        let tmp = TempDir::new().unwrap();
        let files = PairedFiles::new(tmp.path());
        files.append(&MemoryRecord::new("a"), &[1.0]).unwrap();
        files.clear().unwrap();
        assert!(files.load().0.is_empty());
    }
}
