use super::CommandError;
use crate::prelude::*;
use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Process-wide state shared by every command handler.
pub struct Session {
    ready: AtomicBool,
    cooldown: Duration,
    last_invoked: DashMap<&'static str, Instant>,
    active_guilds: Arc<DashSet<Id<GuildMarker>>>,
}

impl Session {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            ready: AtomicBool::new(false),
            cooldown,
            last_invoked: DashMap::new(),
            active_guilds: Arc::new(DashSet::new()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Records an invocation of `command`, rejecting it if the previous one
    /// was too recent.
    pub fn check_cooldown(&self, command: &'static str) -> std::result::Result<(), CommandError> {
        self.check_cooldown_at(command, Instant::now())
    }

    fn check_cooldown_at(
        &self,
        command: &'static str,
        now: Instant,
    ) -> std::result::Result<(), CommandError> {
        match self.last_invoked.entry(command) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed < self.cooldown {
                    return Err(CommandError::OnCooldown(self.cooldown - elapsed));
                }
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
            }
        }
        Ok(())
    }

    /// Claims `guild_id` for a backup or restore. The claim is released when
    /// the returned guard is dropped.
    pub fn begin_operation(
        &self,
        guild_id: Id<GuildMarker>,
    ) -> std::result::Result<OperationGuard, CommandError> {
        if !self.active_guilds.insert(guild_id) {
            return Err(CommandError::OperationInProgress);
        }
        Ok(OperationGuard {
            active_guilds: self.active_guilds.clone(),
            guild_id,
        })
    }
}

#[must_use]
pub struct OperationGuard {
    active_guilds: Arc<DashSet<Id<GuildMarker>>>,
    guild_id: Id<GuildMarker>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.active_guilds.remove(&self.guild_id);
    }
}
