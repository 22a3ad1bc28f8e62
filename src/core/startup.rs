
use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::core::state::AppState;
use crate::models::profile::UserProfile;
use crate::wal::wal::WalOperation;

// this runs at boot time
/// Load the newest valid record per user into the store.
///
/// Later lines win over earlier ones; a record with a lower version than one
/// already seen is ignored. Returns the number of profiles restored.
pub fn apply_wal_operations(state: &AppState, operations: &[WalOperation]) -> usize {
    let mut latest: HashMap<&str, (u64, &UserProfile)> = HashMap::new();

    for op in operations {
        match op {
            WalOperation::PutProfile { user_id, version, profile } => {
                if let Err(e) = profile.validate() {
                    warn!(
                        user_id = %user_id,
                        version = version,
                        error = %e,
                        "Invalid profile record in WAL, skipping"
                    );
                    continue;
                }

                match latest.get(user_id.as_str()) {
                    Some((seen, _)) if *seen > *version => {
                        warn!(
                            user_id = %user_id,
                            version = version,
                            newest = seen,
                            "Stale profile record in WAL, skipping"
                        );
                    }
                    _ => {
                        latest.insert(user_id.as_str(), (*version, profile));
                    }
                }
            }
        }
    }

    let restored = latest.len();
    for (user_id, (version, profile)) in latest {
        state.store.restore(user_id, version, profile.clone());
    }
    restored
}

/// Replay the WAL and optionally compact it down to one line per profile
pub fn recover(state: &AppState) -> Result<usize> {
    let operations = state.wal.replay()
        .context("Failed to replay WAL")?;

    let restored = apply_wal_operations(state, &operations);

    info!(
        wal_path = %state.wal.path().display(),
        operations_replayed = operations.len(),
        profiles_loaded = restored,
        cylinders_loaded = state.store.total_cylinders(),
        "WAL replay completed"
    );

    if state.config.storage.compact_on_startup && operations.len() > restored {
        let written = state.store.compact()
            .context("Failed to compact WAL")?;
        info!(
            records_before = operations.len(),
            records_after = written,
            "WAL compacted"
        );
    }

    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::models::cylinder::Cylinder;
    use crate::models::profile::Settings;
    use crate::wal::wal::Wal;
    use chrono::Utc;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> AppState {
        let mut config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [admin]
            api_key = "k"

            [logging]
            "#,
        )
        .unwrap();
        config.storage.wal_path = dir.path().join("test.wal");
        let wal = Wal::new(config.storage.wal_path.clone()).unwrap();
        AppState::new(config, wal)
    }

    fn profile(cylinders: usize) -> UserProfile {
        let mut profile = UserProfile::new("Amina".to_string(), "amina@example.com".to_string(), Settings::default());
        for i in 0..cylinders {
            profile
                .gas_cylinders
                .push(Cylinder::new(format!("c{}", i), 6.0, Utc::now()));
        }
        profile
    }

    fn put(user_id: &str, version: u64, profile: UserProfile) -> WalOperation {
        WalOperation::PutProfile {
            user_id: user_id.to_string(),
            version,
            profile,
        }
    }

    #[test]
    fn test_last_record_wins() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let restored = apply_wal_operations(
            &state,
            &[put("u1", 1, profile(0)), put("u2", 1, profile(1)), put("u1", 2, profile(2))],
        );

        assert_eq!(restored, 2);
        let commit = state.store.get_with_version("u1").unwrap();
        assert_eq!(commit.version, 2);
        assert_eq!(commit.profile.gas_cylinders.len(), 2);
    }

    #[test]
    fn test_stale_record_ignored() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        apply_wal_operations(&state, &[put("u1", 3, profile(3)), put("u1", 2, profile(1))]);

        assert_eq!(state.store.get_with_version("u1").unwrap().version, 3);
    }

    #[test]
    fn test_invalid_record_skipped() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let mut broken = profile(1);
        broken.gas_cylinders[0].current_weight = 99.0;

        let restored = apply_wal_operations(&state, &[put("u1", 1, profile(0)), put("u1", 2, broken)]);

        assert_eq!(restored, 1);
        assert_eq!(state.store.get_with_version("u1").unwrap().version, 1);
    }

    #[test]
    fn test_recover_compacts() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        for version in 1..=3 {
            state.wal.log_operation(&put("u1", version, profile(version as usize))).unwrap();
        }

        assert_eq!(recover(&state).unwrap(), 1);
        assert_eq!(state.wal.replay().unwrap().len(), 1);
        assert_eq!(state.store.get("u1").unwrap().gas_cylinders.len(), 3);
    }
}
