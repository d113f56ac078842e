//! Capturing a guild's structure and rebuilding it elsewhere.
//!
//! A restore runs roles first, so channel overwrites can point at the new
//! roles, then categories, then the remaining channels. Every mutating call
//! is awaited before the next one starts; pacing is left to the platform.

mod channels;
mod overwrites;
mod roles;
mod serializer;

pub use self::{
    channels::{restore_channels, ChannelRestore},
    overwrites::{translate, OverwriteContext},
    roles::{restore_roles, RoleRestore},
    serializer::serialize,
};

use crate::models::{GuildSnapshot, SnapshotWarning};
use crate::platform::{GuildPlatform, PlatformResult};
use crate::prelude::*;
use std::collections::HashSet;

/// What a restore achieved. Only successful creations are counted.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub roles_created: usize,
    pub roles_failed: usize,
    pub channels: ChannelRestore,
    pub warnings: Vec<SnapshotWarning>,
}

impl RestoreReport {
    pub fn failures(&self) -> usize {
        self.roles_failed + self.channels.failed
    }
}

/// Reads the guild and captures it.
pub async fn snapshot<P>(platform: &P) -> PlatformResult<GuildSnapshot>
where
    P: GuildPlatform + ?Sized,
{
    let view = platform.fetch_view().await?;
    let snapshot = serialize(&view);
    info!(
        "Captured guild {} ({}): {} channels, {} categories, {} roles",
        snapshot.guild_name,
        snapshot.guild_id,
        snapshot.channels.len(),
        snapshot.categories_count,
        snapshot.roles_count
    );
    metrics::increment_counter!("guildvault_snapshots_taken");
    Ok(snapshot)
}

/// Rebuilds the snapshot's roles and channels on the platform's guild.
///
/// Only the initial read of the guild can fail the whole operation. Every
/// create or edit after that is tolerated individually and shows up in the
/// report's counts.
pub async fn restore<P>(platform: &P, snapshot: &GuildSnapshot) -> PlatformResult<RestoreReport>
where
    P: GuildPlatform + ?Sized,
{
    let warnings = snapshot.validate();
    for warning in warnings.iter() {
        warn!("Snapshot of {}: {}", snapshot.guild_name, warning);
    }

    let view = platform.fetch_view().await?;
    info!(
        "Restoring snapshot of {} onto guild {} ({})",
        snapshot.guild_name, view.name, view.id
    );
    metrics::increment_counter!("guildvault_restores_started");

    let roles = restore_roles(platform, &snapshot.roles).await;
    let members = fetch_members(platform, snapshot).await;
    let ctx = OverwriteContext::new(&view, snapshot)
        .with_restored_roles(&roles.created, &roles.id_map)
        .with_members(members);
    let channels = restore_channels(platform, snapshot, &ctx).await;

    let report = RestoreReport {
        roles_created: roles.count(),
        roles_failed: roles.failed,
        channels,
        warnings,
    };
    info!(
        "Restore onto guild {} finished: {} roles, {} categories, {} channels, {} failures",
        view.id,
        report.roles_created,
        report.channels.categories,
        report.channels.channels,
        report.failures()
    );
    Ok(report)
}

/// Runs [`restore`] but gives up once `deadline` has passed. Work already
/// done on the guild is kept.
pub async fn restore_within<P>(
    platform: &P,
    snapshot: &GuildSnapshot,
    deadline: Duration,
) -> Result<RestoreReport>
where
    P: GuildPlatform + ?Sized,
{
    match tokio::time::timeout(deadline, restore(platform, snapshot)).await {
        Ok(report) => Ok(report?),
        Err(_) => {
            error!(
                "Restore of {} did not finish within {:?}",
                snapshot.guild_name, deadline
            );
            Err(Error::DeadlineExceeded(deadline))
        }
    }
}

/// Member overwrites only survive for users still in the guild. A failed
/// lookup drops them all rather than failing the restore.
async fn fetch_members<P>(platform: &P, snapshot: &GuildSnapshot) -> HashSet<Id<UserMarker>>
where
    P: GuildPlatform + ?Sized,
{
    let user_ids: Vec<Id<UserMarker>> = snapshot
        .referenced_members()
        .into_iter()
        .filter_map(Id::new_checked)
        .collect();
    if user_ids.is_empty() {
        return HashSet::new();
    }
    match platform.fetch_members(&user_ids).await {
        Ok(members) => members,
        Err(err) => {
            warn!("Failed to look up members, dropping member overwrites: {}", err);
            HashSet::new()
        }
    }
}
