use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Append-only record of recovered panics. Injected into the supervisor so
/// nothing in the pipelines depends on process-wide globals.
#[derive(Debug, Clone)]
pub struct PanicSink {
    path: PathBuf,
}

impl PanicSink {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join("panic.log"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, task: &str, detail: &dyn Display) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let line = format!("{ts} [{task}] {detail}\n");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_append() {
        let dir = tempfile::tempdir().unwrap();
        let sink = PanicSink::new(dir.path());
        sink.record("ichal", &"boom");
        sink.record("schal", &"bang");
        let content = std::fs::read_to_string(sink.path()).unwrap();
        assert!(content.contains("[ichal] boom"));
        assert!(content.contains("[schal] bang"));
        assert_eq!(content.lines().count(), 2);
    }
}
