use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FILE_DIR: &str = "file";
const TMP_DIR: &str = "tmp";
const LOG_DIR: &str = "log";
const IDLE_PROOF_FILE: &str = "idle_proof";
const SERVICE_PROOF_FILE: &str = "service_proof";
const PEERS_FILE: &str = "peers";
const TAG_EXT: &str = "tag";

/// The miner's on-disk layout, rooted at the configured workspace directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory skeleton. Idempotent.
    pub fn init(&self) -> io::Result<()> {
        for dir in [self.file_dir(), self.tmp_dir(), self.log_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_dir(&self) -> PathBuf {
        self.root.join(FILE_DIR)
    }

    /// Staging area for fragments not yet reported to the chain.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn idle_proof_path(&self) -> PathBuf {
        self.root.join(IDLE_PROOF_FILE)
    }

    pub fn service_proof_path(&self) -> PathBuf {
        self.root.join(SERVICE_PROOF_FILE)
    }

    pub fn peers_path(&self) -> PathBuf {
        self.root.join(PEERS_FILE)
    }

    pub fn fragment_path(&self, fid: &str, fragment: &str) -> PathBuf {
        self.file_dir().join(fid).join(fragment)
    }

    pub fn tag_path(&self, fid: &str, fragment: &str) -> PathBuf {
        self.file_dir().join(fid).join(format!("{fragment}.{TAG_EXT}"))
    }

    /// Immediate subdirectories of `dir`, sorted by name so enumeration
    /// order is stable across runs.
    pub fn subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let ws = Workspace::new("/data/miner");
        assert_eq!(ws.idle_proof_path(), PathBuf::from("/data/miner/idle_proof"));
        assert_eq!(ws.service_proof_path(), PathBuf::from("/data/miner/service_proof"));
        assert_eq!(
            ws.fragment_path("fid0", "frag0"),
            PathBuf::from("/data/miner/file/fid0/frag0")
        );
        assert_eq!(
            ws.tag_path("fid0", "frag0"),
            PathBuf::from("/data/miner/file/fid0/frag0.tag")
        );
    }

    #[test]
    fn subdirs_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b", "a", "c"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("not-a-dir"), b"x").unwrap();
        let found = Workspace::subdirs(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
