use crate::models::profile::UserProfile;
use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// WAL operation types
#[derive(Debug, Clone, PartialEq)]
pub enum WalOperation {
    /// Full document after a committed write
    PutProfile {
        user_id: String,
        version: u64,
        profile: UserProfile,
    },
}

impl WalOperation {
    fn to_line(&self) -> Result<String> {
        match self {
            WalOperation::PutProfile {
                user_id,
                version,
                profile,
            } => {
                let document = serde_json::to_string(profile).context("Failed to serialize profile")?;
                Ok(format!("PUT_PROFILE|{}|{}|{}", hex::encode(user_id), version, document))
            }
        }
    }

    fn from_line(line: &str) -> Result<Self> {
        // The document is last so '|' inside JSON strings survives the split
        let parts: Vec<&str> = line.splitn(4, '|').collect();

        match parts.first() {
            Some(&"PUT_PROFILE") => {
                if parts.len() != 4 {
                    bail!("Invalid PUT_PROFILE format");
                }
                let user_id_bytes = hex::decode(parts[1]).context("Invalid user_id hex")?;
                let user_id = String::from_utf8(user_id_bytes).context("user_id is not UTF-8")?;
                if user_id.is_empty() {
                    bail!("user_id must not be empty");
                }
                let version = parts[2].parse::<u64>().context("Invalid version")?;
                let profile: UserProfile =
                    serde_json::from_str(parts[3]).context("Invalid profile document")?;

                Ok(WalOperation::PutProfile {
                    user_id,
                    version,
                    profile,
                })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

pub struct Wal {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .context("Failed to open WAL file")?;

        Ok(Wal {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Append one record as a single line.
    ///
    /// A torn tail left by an earlier failure is closed off with a newline
    /// first, and a failed write is rolled back to the previous length, so
    /// every record starts on a line boundary.
    pub fn log_operation(&self, op: &WalOperation) -> Result<()> {
        let mut line = op.to_line()?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("WAL lock poisoned"))?;

        let len_before = file.metadata().context("Failed to stat WAL")?.len();
        if len_before > 0 && !ends_with_newline(&mut file)? {
            tracing::warn!(len = len_before, "WAL ends with a partial record, terminating it");
            line.insert(0, '\n');
        }

        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            if let Err(rollback) = file.set_len(len_before) {
                tracing::error!(error = %rollback, "Failed to roll back partial WAL append");
            }
            return Err(e).context("Failed to write to WAL");
        }

        Ok(())
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let file = File::open(&self.path).context("Failed to open WAL for replay")?;
        let reader = BufReader::new(file);
        let mut operations = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result.context("Failed to read line from WAL")?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            match WalOperation::from_line(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse WAL line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    /// Replace the log with `operations`, e.g. one record per live profile.
    ///
    /// Writes to a sibling file first and renames it over the log so a crash
    /// mid-compaction leaves the old log intact.
    pub fn compact(&self, operations: &[WalOperation]) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("WAL lock poisoned"))?;

        let tmp_path = self.path.with_extension("wal.compact");
        {
            let mut tmp = File::create(&tmp_path).context("Failed to create compaction file")?;
            for op in operations {
                writeln!(tmp, "{}", op.to_line()?).context("Failed to write compaction file")?;
            }
            tmp.sync_all().context("Failed to sync compaction file")?;
        }

        std::fs::rename(&tmp_path, &self.path).context("Failed to replace WAL with compacted log")?;

        *file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .context("Failed to reopen WAL after compaction")?;

        Ok(())
    }
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1)).context("Failed to seek WAL")?;
    file.read_exact(&mut last).context("Failed to read WAL tail")?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cylinder::Cylinder;
    use crate::models::profile::Settings;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn profile(name: &str) -> UserProfile {
        let mut profile = UserProfile::new(name.to_string(), format!("{}@example.com", name), Settings::default());
        profile
            .gas_cylinders
            .push(Cylinder::new("c|1".to_string(), 6.0, Utc::now()));
        profile
    }

    fn put(user_id: &str, version: u64) -> WalOperation {
        WalOperation::PutProfile {
            user_id: user_id.to_string(),
            version,
            profile: profile(user_id),
        }
    }

    #[test]
    fn test_wal_operation_line_format() {
        let op = put("user|1", 3);
        let line = op.to_line().unwrap();

        assert!(line.starts_with(&format!("PUT_PROFILE|{}|3|{{", hex::encode("user|1"))));
        assert_eq!(WalOperation::from_line(&line).unwrap(), op);
    }

    #[test]
    fn test_wal_log_and_replay() {
        let temp_dir = TempDir::new().unwrap();
        let wal = Wal::new(temp_dir.path().join("test.wal")).unwrap();

        wal.log_operation(&put("alice", 1)).unwrap();
        wal.log_operation(&put("bob", 1)).unwrap();
        wal.log_operation(&put("alice", 2)).unwrap();

        let operations = wal.replay().unwrap();
        assert_eq!(operations.len(), 3);
        assert_eq!(operations[2], put("alice", 2));
    }

    #[test]
    fn test_wal_compact_then_append() {
        let temp_dir = TempDir::new().unwrap();
        let wal = Wal::new(temp_dir.path().join("test.wal")).unwrap();

        for version in 1..=5 {
            wal.log_operation(&put("alice", version)).unwrap();
        }

        wal.compact(&[put("alice", 5)]).unwrap();
        assert_eq!(wal.replay().unwrap(), vec![put("alice", 5)]);

        wal.log_operation(&put("alice", 6)).unwrap();
        assert_eq!(wal.replay().unwrap().len(), 2);
    }

    #[test]
    fn test_append_after_torn_tail_is_replayable() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let wal = Wal::new(wal_path.clone()).unwrap();

        wal.log_operation(&put("alice", 1)).unwrap();

        // Half a record, as a failed append would leave it
        let torn = put("alice", 2).to_line().unwrap();
        let mut raw = OpenOptions::new().append(true).open(&wal_path).unwrap();
        raw.write_all(&torn.as_bytes()[..20]).unwrap();
        drop(raw);

        wal.log_operation(&put("alice", 2)).unwrap();
        wal.log_operation(&put("alice", 3)).unwrap();

        assert_eq!(
            wal.replay().unwrap(),
            vec![put("alice", 1), put("alice", 2), put("alice", 3)]
        );
    }

    #[test]
    fn test_clean_appends_add_no_blank_lines() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");
        let wal = Wal::new(wal_path.clone()).unwrap();

        wal.log_operation(&put("alice", 1)).unwrap();
        wal.log_operation(&put("alice", 2)).unwrap();

        let content = fs::read_to_string(&wal_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
        assert!(!content.contains("\n\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_append_is_reported() {
        let wal = Wal::new(PathBuf::from("/dev/full")).unwrap();
        assert!(wal.log_operation(&put("alice", 1)).is_err());
    }

    #[test]
    fn test_wal_invalid_lines() {
        let temp_dir = TempDir::new().unwrap();
        let wal_path = temp_dir.path().join("test.wal");

        let valid = put("alice", 1).to_line().unwrap();
        fs::write(
            &wal_path,
            format!("INVALID_OP|data\nPUT_PROFILE|zz|1|{{}}\nPUT_PROFILE|{}|x|{{}}\n{}\n", hex::encode("a"), valid),
        )
        .unwrap();

        let wal = Wal::new(wal_path).unwrap();
        let operations = wal.replay().unwrap();

        assert_eq!(operations.len(), 1);
    }
}
