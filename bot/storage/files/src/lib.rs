//! File-backed persistence for guild snapshots.
//!
//! Snapshots live as pretty-printed JSON in a single directory, one file per
//! guild named `backup_<guild name>.json`. Files from the first exporter are
//! named `channels_*.json` and hold a bare channel list; they still load.

#[macro_use]
extern crate lazy_static;

use guildvault::models::{snapshot::SnapshotDocument, GuildSnapshot, SnapshotError};
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, SnapshotError>;

const FILE_PREFIX: &str = "backup_";
const LEGACY_FILE_PREFIX: &str = "channels_";
const EXTENSION: &str = ".json";

lazy_static! {
    static ref ILLEGAL_FILE_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();
}

/// Turns a guild name into something safe to use as a file name. Falls back
/// to the guild id when nothing usable is left.
pub fn sanitize_file_name(guild_name: &str, guild_id: u64) -> String {
    let replaced = ILLEGAL_FILE_CHARS.replace_all(guild_name, "_");
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        guild_id.to_string()
    } else {
        trimmed.to_owned()
    }
}

/// Load names must stay inside the snapshot directory. Saved names may
/// contain `..` mid-name (`backup_a..b.json`), so only separators and the
/// bare relative components are rejected.
fn is_plain_file_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && !matches!(name, "" | "." | "..")
}

fn is_snapshot_file(name: &str) -> bool {
    (name.starts_with(FILE_PREFIX) || name.starts_with(LEGACY_FILE_PREFIX))
        && name.ends_with(EXTENSION)
}

#[derive(Clone, Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, snapshot: &GuildSnapshot) -> PathBuf {
        let name = sanitize_file_name(&snapshot.guild_name, snapshot.guild_id);
        self.dir.join(format!("{}{}{}", FILE_PREFIX, name, EXTENSION))
    }

    /// Writes the snapshot, replacing any earlier backup of the same guild.
    pub async fn save(&self, snapshot: &GuildSnapshot) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(snapshot);
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&path, json).await?;
        info!("Saved snapshot of {} to {:?}", snapshot.guild_name, path);
        Ok(path)
    }

    /// Loads a snapshot by file name. The `.json` extension is optional.
    pub async fn load(&self, name: &str) -> Result<GuildSnapshot> {
        if !is_plain_file_name(name) {
            return Err(SnapshotError::InvalidName(name.to_owned()));
        }
        let file_name = if name.ends_with(EXTENSION) {
            name.to_owned()
        } else {
            format!("{}{}", name, EXTENSION)
        };
        let path = self.dir.join(&file_name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(file_name));
            }
            Err(err) => return Err(err.into()),
        };
        let snapshot = SnapshotDocument::parse(&bytes)?;
        debug!(
            "Loaded {:?}: {} channels, {} roles",
            path,
            snapshot.channels.len(),
            snapshot.roles.len()
        );
        Ok(snapshot)
    }

    /// Snapshot file names in the directory, newest-looking names first.
    /// A missing directory holds no snapshots.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if is_snapshot_file(name) {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use guildvault::models::{ChannelKind, ChannelRecord};

    fn snapshot(name: &str, id: u64) -> GuildSnapshot {
        let exported_at = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let channels = vec![ChannelRecord {
            id: 1,
            name: String::from("general"),
            kind: ChannelKind::Text,
            position: 0,
            is_category: false,
            category_name: None,
            topic: Some(String::from("Welcome")),
            nsfw: false,
            bitrate: None,
            user_limit: None,
            permissions: None,
        }];
        GuildSnapshot::new(name, id, exported_at, channels, Vec::new())
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("My: Guild?", 1), "My_ Guild_");
        assert_eq!(sanitize_file_name(" .Guild. ", 1), "Guild");
        assert_eq!(sanitize_file_name("a/b\\c", 1), "a_b_c");
        assert_eq!(sanitize_file_name(" .. ", 42), "42");
        assert_eq!(sanitize_file_name("", 42), "42");
    }

    #[tokio::test]
    async fn test_save_then_load_by_name_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("exports"));
        let original = snapshot("Cool Guild", 7);

        let path = store.save(&original).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "backup_Cool Guild.json");

        let loaded = store.load("backup_Cool Guild").await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_saved_file_omits_empty_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save(&snapshot("Guild", 7)).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        let channel = &json["channels"][0];
        assert!(channel.get("permissions").is_none());
        assert_eq!(json["export_date"], "2024-03-01T12:00:00");
        assert_eq!(json["categories_count"], 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        match store.load("backup_nothing.json").await {
            Err(SnapshotError::NotFound(name)) => assert_eq!(name, "backup_nothing.json"),
            other => panic!("expected NotFound, got {:?}", other.map(|s| s.guild_name)),
        }
    }

    #[tokio::test]
    async fn test_load_rejects_names_outside_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("exports"));
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(dir.path().join("x.json"), "[]").unwrap();

        for name in ["../x", "../x.json", "a/b", "a\\b", "..", "."] {
            match store.load(name).await {
                Err(SnapshotError::InvalidName(rejected)) => assert_eq!(rejected, name),
                other => panic!("{:?} was accepted: {:?}", name, other.map(|s| s.guild_name)),
            }
        }
    }

    #[tokio::test]
    async fn test_dotted_guild_names_still_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let original = snapshot("a..b", 7);
        let path = store.save(&original).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "backup_a..b.json");
        assert_eq!(store.load("backup_a..b").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_malformed_file_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("backup_bad.json"), "{not json").unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(matches!(
            store.load("backup_bad").await,
            Err(SnapshotError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_array_loads_with_no_roles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("channels_old.json"),
            r#"[{"id": 1, "name": "Mods", "type": "ChannelType.category", "position": 0},
                {"id": 2, "name": "logs", "type": "ChannelType.text", "position": 1,
                 "category": "Mods"}]"#,
        )
        .unwrap();
        let store = SnapshotStore::new(dir.path());

        let loaded = store.load("channels_old").await.unwrap();
        assert!(loaded.roles.is_empty());
        assert_eq!(loaded.categories_count, 0);
        assert_eq!(loaded.channels.len(), 2);
        assert!(loaded.channels[0].is_category());
        assert_eq!(loaded.channels[1].category_name.as_deref(), Some("Mods"));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts_descending() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "backup_a.json",
            "backup_c.json",
            "channels_b.json",
            "notes.txt",
            "backup_d.txt",
            "other.json",
        ] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let store = SnapshotStore::new(dir.path());
        assert_eq!(
            store.list().await.unwrap(),
            vec!["channels_b.json", "backup_c.json", "backup_a.json"]
        );
    }

    #[tokio::test]
    async fn test_list_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
