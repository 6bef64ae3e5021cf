use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::common::Identity;

/// Persists the auth session under the data directory so an anonymous
/// identity keeps resolving to the same user across runs.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("session.json"),
        }
    }

    pub fn load(&self) -> Option<Identity> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(identity) => Some(identity),
                Err(err) => {
                    log::warn!("Failed to parse {}: {err}", self.path.display());
                    None
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                log::warn!("Failed to read {}: {err}", self.path.display());
                None
            }
        }
    }

    pub fn save(&self, identity: &Identity) {
        if let Err(err) = self.write(identity) {
            log::warn!("Failed to persist session: {err}");
        }
    }

    fn write(&self, identity: &Identity) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(identity)?;
        fs::write(&self.path, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("duochat-session-{}", uuid::Uuid::new_v4()));
        let file = SessionFile::new(&dir);
        assert!(file.load().is_none());

        let identity = Identity {
            user_id: "u1".into(),
            session: "s1".into(),
        };
        file.save(&identity);
        assert_eq!(file.load(), Some(identity));

        fs::remove_dir_all(&dir).ok();
    }
}
