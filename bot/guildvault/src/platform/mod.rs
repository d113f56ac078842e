//! The seam between backup logic and the chat platform.
//!
//! Backup and restore code only ever talks to a [`GuildPlatform`]. The live
//! implementation is [`HttpGuild`], which is usually wrapped in
//! [`Throttled`] so that pacing and timeouts stay out of the restore code.

mod http;
mod throttle;

pub use self::{
    http::HttpGuild,
    throttle::{build_limiter, DirectRateLimiter, Throttled},
};

use crate::models::{id::marker::*, id::Id, ChannelKind};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Missing permissions: {}", .0)]
    InsufficientPrivilege(String),
    #[error("{}", .0)]
    Transient(String),
    #[error("Request timed out after {:?}", .0)]
    Timeout(Duration),
}

impl PlatformError {
    /// Whether the failure is worth reporting as a privilege problem to the
    /// invoking user.
    pub fn is_privilege(&self) -> bool {
        matches!(self, Self::InsufficientPrivilege(_))
    }
}

/// The target of a live permission overwrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverwriteHandle {
    Role(Id<RoleMarker>),
    Member(Id<UserMarker>),
}

/// A permission overwrite as it exists, or should exist, on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overwrite {
    pub target: OverwriteHandle,
    pub allow: u64,
    pub deny: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveRole {
    pub id: Id<RoleMarker>,
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
    pub managed: bool,
    pub permissions: u64,
    pub position: i64,
    pub unicode_emoji: Option<String>,
}

/// A guild channel. `kind` is `None` for channel types snapshots do not
/// cover, such as threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveChannel {
    pub id: Id<ChannelMarker>,
    pub name: Option<String>,
    pub kind: Option<ChannelKind>,
    pub position: i64,
    pub parent_id: Option<Id<ChannelMarker>>,
    pub topic: Option<String>,
    pub nsfw: bool,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    pub overwrites: Vec<Overwrite>,
}

/// A read-only picture of a guild taken at one point in time.
#[derive(Clone, Debug)]
pub struct GuildView {
    pub id: Id<GuildMarker>,
    pub name: String,
    pub channels: Vec<LiveChannel>,
    pub roles: Vec<LiveRole>,
}

impl GuildView {
    /// The `@everyone` role shares its identifier with the guild.
    pub fn everyone_role(&self) -> Id<RoleMarker> {
        self.id.cast()
    }

    pub fn channel(&self, id: Id<ChannelMarker>) -> Option<&LiveChannel> {
        self.channels.iter().find(|channel| channel.id == id)
    }
}

#[derive(Clone, Debug)]
pub struct NewRole<'a> {
    pub name: &'a str,
    pub permissions: u64,
    pub color: u32,
    pub hoist: bool,
    pub mentionable: bool,
}

#[derive(Clone, Debug)]
pub struct NewChannel<'a> {
    pub name: &'a str,
    pub kind: ChannelKind,
    pub position: i64,
    pub parent_id: Option<Id<ChannelMarker>>,
    pub topic: Option<&'a str>,
    pub nsfw: bool,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
}

/// The guild operations backups and restores need. Every implementation is
/// bound to a single guild.
#[async_trait]
pub trait GuildPlatform: Send + Sync {
    async fn fetch_view(&self) -> PlatformResult<GuildView>;

    /// Returns the subset of `user_ids` that are currently guild members.
    async fn fetch_members(&self, user_ids: &[Id<UserMarker>])
        -> PlatformResult<HashSet<Id<UserMarker>>>;

    async fn create_role(&self, role: &NewRole<'_>) -> PlatformResult<LiveRole>;

    async fn create_channel(&self, channel: &NewChannel<'_>) -> PlatformResult<LiveChannel>;

    /// Replaces every overwrite on the channel.
    async fn set_overwrites(
        &self,
        channel_id: Id<ChannelMarker>,
        overwrites: &[Overwrite],
    ) -> PlatformResult<()>;
}

#[cfg(test)]
pub(crate) mod fake;
