//! The structural document written by `save_backup` and consumed by
//! `load_backup`.
//!
//! Identifiers stored here belong to the source guild. They are only ever
//! used to link records inside the same document: every restore mints new
//! identifiers on the target guild.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

const UNKNOWN_GUILD_NAME: &str = "Unknown";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Backup file not found: {}", .0)]
    NotFound(String),
    #[error("Backup file is not valid JSON: {}", .0)]
    InvalidFormat(#[from] serde_json::Error),
    #[error("Backup file name is not allowed: {}", .0)]
    InvalidName(String),
    #[error("IO error: {}", .0)]
    Io(#[from] std::io::Error),
}

/// The kinds of guild channel a snapshot can describe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    #[default]
    Text,
    Voice,
    Forum,
    Stage,
    News,
    Category,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Voice => "voice",
            Self::Forum => "forum",
            Self::Stage => "stage_voice",
            Self::News => "news",
            Self::Category => "category",
        }
    }

    /// Reads the kind from any of the spellings older exports used
    /// (`text`, `ChannelType.text`, `stage_voice`, ...). Unknown spellings
    /// fall back to a text channel.
    pub fn parse_lenient(value: &str) -> Self {
        let value = value.to_lowercase();
        if value.contains("category") {
            Self::Category
        } else if value.contains("stage") {
            Self::Stage
        } else if value.contains("voice") {
            Self::Voice
        } else if value.contains("forum") {
            Self::Forum
        } else if value.contains("news") || value.contains("announcement") {
            Self::News
        } else {
            Self::Text
        }
    }

    /// Voice-like channels carry a bitrate and a user limit.
    pub fn is_voice_like(self) -> bool {
        matches!(self, Self::Voice | Self::Stage)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChannelKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChannelKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&value))
    }
}

/// An allow/deny bitmask pair for a single overwrite target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPair {
    #[serde(default)]
    pub allow: u64,
    #[serde(default)]
    pub deny: u64,
}

impl PermissionPair {
    pub fn new(allow: u64, deny: u64) -> Self {
        Self { allow, deny }
    }

    pub fn is_empty(&self) -> bool {
        self.allow == 0 && self.deny == 0
    }
}

/// Overwrites keyed by `role_<id>` or `member_<id>`.
pub type PermissionTable = BTreeMap<String, PermissionPair>;

/// The parsed form of a [`PermissionTable`] key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverwriteTarget {
    Role(u64),
    Member(u64),
}

impl OverwriteTarget {
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(id) = key.strip_prefix("role_") {
            id.parse().ok().map(Self::Role)
        } else if let Some(id) = key.strip_prefix("member_") {
            id.parse().ok().map(Self::Member)
        } else {
            None
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OverwriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Role(id) => write!(f, "role_{}", id),
            Self::Member(id) => write!(f, "member_{}", id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ChannelKind,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub is_category: bool,
    /// Name of the parent category. Restores link by name because the parent
    /// gets a fresh identifier.
    #[serde(rename = "category", default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionTable>,
}

impl ChannelRecord {
    /// Older exports only flagged categories through the type string.
    pub fn is_category(&self) -> bool {
        self.is_category || self.kind == ChannelKind::Category
    }

    pub fn permissions(&self) -> impl Iterator<Item = (&String, &PermissionPair)> {
        self.permissions.iter().flat_map(|table| table.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub mentionable: bool,
    #[serde(default)]
    pub permissions: u64,
    /// Hierarchy rank: higher is more senior.
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_emoji: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildSnapshot {
    #[serde(default = "unknown_guild_name")]
    pub guild_name: String,
    #[serde(default)]
    pub guild_id: u64,
    #[serde(rename = "export_date", default)]
    pub exported_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub categories_count: usize,
    #[serde(default)]
    pub roles_count: usize,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
    /// Sorted ascending by position.
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
}

fn unknown_guild_name() -> String {
    String::from(UNKNOWN_GUILD_NAME)
}

impl GuildSnapshot {
    /// Builds a snapshot, deriving the redundant counts and ordering the
    /// roles from most junior to most senior.
    pub fn new(
        guild_name: impl Into<String>,
        guild_id: u64,
        exported_at: NaiveDateTime,
        channels: Vec<ChannelRecord>,
        mut roles: Vec<RoleRecord>,
    ) -> Self {
        roles.sort_by_key(|role| role.position);
        let categories_count = channels.iter().filter(|c| c.is_category()).count();
        Self {
            guild_name: guild_name.into(),
            guild_id,
            exported_at: Some(exported_at),
            categories_count,
            roles_count: roles.len(),
            channels,
            roles,
        }
    }

    /// Wraps the bare channel list written by the first version of the
    /// exporter.
    pub fn from_legacy(channels: Vec<ChannelRecord>) -> Self {
        Self {
            guild_name: unknown_guild_name(),
            guild_id: 0,
            exported_at: None,
            categories_count: 0,
            roles_count: 0,
            channels,
            roles: Vec::new(),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.channels.iter().filter(|c| c.is_category())
    }

    pub fn leaf_channels(&self) -> impl Iterator<Item = &ChannelRecord> {
        self.channels.iter().filter(|c| !c.is_category())
    }

    /// Member identifiers referenced by any overwrite in the document.
    pub fn referenced_members(&self) -> Vec<u64> {
        let mut members: Vec<u64> = self
            .channels
            .iter()
            .flat_map(|channel| channel.permissions())
            .filter_map(|(key, _)| match OverwriteTarget::parse(key) {
                Some(OverwriteTarget::Member(id)) => Some(id),
                _ => None,
            })
            .collect();
        members.sort_unstable();
        members.dedup();
        members
    }

    /// Checks the cross-record references a restore relies on. None of these
    /// problems stop a restore; they are reported so the caller can log them.
    pub fn validate(&self) -> Vec<SnapshotWarning> {
        let mut warnings = Vec::new();
        // Documents without an export date predate the recorded counts.
        let actual = self.categories().count();
        if self.exported_at.is_some() && self.categories_count != actual {
            warnings.push(SnapshotWarning::CategoryCountMismatch {
                recorded: self.categories_count,
                actual,
            });
        }

        let mut category_names: HashMap<&str, usize> = HashMap::new();
        for category in self.categories() {
            *category_names.entry(category.name.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<&str> = category_names
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(name, _)| *name)
            .collect();
        duplicates.sort_unstable();
        warnings.extend(
            duplicates
                .into_iter()
                .map(|name| SnapshotWarning::DuplicateCategory(name.to_owned())),
        );

        for channel in self.leaf_channels() {
            if let Some(parent) = channel.category_name.as_deref() {
                if !category_names.contains_key(parent) {
                    warnings.push(SnapshotWarning::MissingCategory {
                        channel: channel.name.clone(),
                        category: parent.to_owned(),
                    });
                }
            }
        }

        for (key, _) in self.channels.iter().flat_map(|c| c.permissions()) {
            if OverwriteTarget::parse(key).is_none() {
                warnings.push(SnapshotWarning::MalformedOverwriteKey(key.clone()));
            }
        }

        warnings
    }
}

/// Non-fatal inconsistencies found in a loaded snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SnapshotWarning {
    #[error("Multiple categories are named `{}`; channels will join the last one created", .0)]
    DuplicateCategory(String),
    #[error("Channel `{}` references unknown category `{}`", .channel, .category)]
    MissingCategory { channel: String, category: String },
    #[error("Unrecognized permission overwrite key `{}`", .0)]
    MalformedOverwriteKey(String),
    #[error("Document records {} categories but contains {}", .recorded, .actual)]
    CategoryCountMismatch { recorded: usize, actual: usize },
}

/// Either on-disk shape a snapshot file can take.
#[derive(Debug)]
pub enum SnapshotDocument {
    Legacy(Vec<ChannelRecord>),
    Full(GuildSnapshot),
}

impl SnapshotDocument {
    pub fn parse(bytes: &[u8]) -> Result<GuildSnapshot, SnapshotError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        let document = if value.is_array() {
            Self::Legacy(serde_json::from_value(value)?)
        } else {
            Self::Full(serde_json::from_value(value)?)
        };
        Ok(document.into())
    }
}

impl From<SnapshotDocument> for GuildSnapshot {
    fn from(document: SnapshotDocument) -> Self {
        match document {
            SnapshotDocument::Legacy(channels) => GuildSnapshot::from_legacy(channels),
            SnapshotDocument::Full(snapshot) => snapshot,
        }
    }
}
