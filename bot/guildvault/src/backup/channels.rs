use super::overwrites::{translate, OverwriteContext};
use crate::models::{ChannelKind, ChannelRecord, GuildSnapshot};
use crate::platform::{GuildPlatform, LiveChannel, NewChannel, PlatformError};
use crate::prelude::*;
use std::collections::HashMap;

/// Counts of what a channel restore actually managed to create.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelRestore {
    pub categories: usize,
    pub channels: usize,
    pub failed: usize,
    /// Channels that were created but whose overwrites could not be applied.
    pub overwrite_failures: usize,
}

impl ChannelRestore {
    pub fn total(&self) -> usize {
        self.categories + self.channels
    }
}

fn by_position<'a>(records: impl Iterator<Item = &'a ChannelRecord>) -> Vec<&'a ChannelRecord> {
    let mut records: Vec<_> = records.collect();
    records.sort_by_key(|record| record.position);
    records
}

/// Recreates categories, then every other channel under its category.
///
/// Categories are linked by name because the new ones get fresh ids. If two
/// categories share a name, children join the one created last.
pub async fn restore_channels<P>(
    platform: &P,
    snapshot: &GuildSnapshot,
    ctx: &OverwriteContext,
) -> ChannelRestore
where
    P: GuildPlatform + ?Sized,
{
    let mut restore = ChannelRestore::default();
    let mut categories: HashMap<&str, Id<ChannelMarker>> = HashMap::new();

    for record in by_position(snapshot.categories()) {
        let new_channel = NewChannel {
            name: &record.name,
            kind: ChannelKind::Category,
            position: record.position,
            parent_id: None,
            topic: None,
            nsfw: false,
            bitrate: None,
            user_limit: None,
        };
        let category = match create(platform, record, &new_channel).await {
            Some(category) => category,
            None => {
                restore.failed += 1;
                continue;
            }
        };
        if !apply_overwrites(platform, record, &category, ctx).await {
            restore.overwrite_failures += 1;
        }
        if categories.insert(&record.name, category.id).is_some() {
            warn!(
                "Category name {:?} is used more than once, later channels will join the newest one",
                record.name
            );
        }
        restore.categories += 1;
    }

    for record in by_position(snapshot.leaf_channels()) {
        let parent_id = record
            .category_name
            .as_deref()
            .and_then(|name| categories.get(name))
            .copied();
        if parent_id.is_none() && record.category_name.is_some() {
            debug!(
                "Category {:?} for channel {:?} was not created, placing it at the top level",
                record.category_name, record.name
            );
        }

        let text_like = !record.kind.is_voice_like();
        let voice_like = record.kind.is_voice_like();
        let new_channel = NewChannel {
            name: &record.name,
            kind: record.kind,
            position: record.position,
            parent_id,
            topic: record.topic.as_deref().filter(|_| text_like),
            nsfw: record.nsfw,
            bitrate: record.bitrate.filter(|_| voice_like),
            user_limit: record.user_limit.filter(|_| voice_like),
        };
        let channel = match create(platform, record, &new_channel).await {
            Some(channel) => channel,
            None => {
                restore.failed += 1;
                continue;
            }
        };
        if !apply_overwrites(platform, record, &channel, ctx).await {
            restore.overwrite_failures += 1;
        }
        restore.channels += 1;
    }

    restore
}

async fn create<P>(
    platform: &P,
    record: &ChannelRecord,
    new_channel: &NewChannel<'_>,
) -> Option<LiveChannel>
where
    P: GuildPlatform + ?Sized,
{
    match platform.create_channel(new_channel).await {
        Ok(channel) => {
            debug!(
                "Created {} channel {:?} ({} -> {})",
                new_channel.kind, record.name, record.id, channel.id
            );
            metrics::increment_counter!("guildvault_restored_items", "kind" => "channel");
            Some(channel)
        }
        Err(err) => {
            log_failure("create channel", &record.name, &err);
            metrics::increment_counter!("guildvault_failed_items", "kind" => "channel");
            None
        }
    }
}

/// Returns false only when overwrites were present and could not be applied.
async fn apply_overwrites<P>(
    platform: &P,
    record: &ChannelRecord,
    channel: &LiveChannel,
    ctx: &OverwriteContext,
) -> bool
where
    P: GuildPlatform + ?Sized,
{
    let overwrites = match record.permissions.as_ref() {
        Some(table) => translate(table, ctx),
        None => return true,
    };
    if overwrites.is_empty() {
        return true;
    }
    match platform.set_overwrites(channel.id, &overwrites).await {
        Ok(()) => true,
        Err(err) => {
            log_failure("apply overwrites to", &record.name, &err);
            false
        }
    }
}

fn log_failure(action: &str, name: &str, err: &PlatformError) {
    if err.is_privilege() {
        warn!("Missing permissions to {} {:?}: {}", action, name, err);
    } else {
        error!("Failed to {} {:?}: {}", action, name, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::tests::record_channel;
    use crate::models::{PermissionPair, RoleRecord};
    use crate::platform::fake::FakeGuild;
    use crate::platform::OverwriteHandle;
    use chrono::Utc;

    fn snapshot(channels: Vec<ChannelRecord>, roles: Vec<RoleRecord>) -> GuildSnapshot {
        GuildSnapshot::new("Source", 1, Utc::now().naive_utc(), channels, roles)
    }

    fn child(id: u64, name: &str, category: &str, position: i64) -> ChannelRecord {
        let mut record = record_channel(id, name, ChannelKind::Text, position);
        record.category_name = Some(category.to_owned());
        record
    }

    async fn context(guild: &FakeGuild, snapshot: &GuildSnapshot) -> OverwriteContext {
        let view = guild.fetch_view().await.unwrap();
        OverwriteContext::new(&view, snapshot)
    }

    #[tokio::test]
    async fn test_children_join_category_created_in_same_run() {
        let guild = FakeGuild::new(200, "Target");
        let snapshot = snapshot(
            vec![
                child(2, "logs", "Mods", 0),
                record_channel(1, "Mods", ChannelKind::Category, 3),
            ],
            Vec::new(),
        );
        let ctx = context(&guild, &snapshot).await;

        let restore = restore_channels(&guild, &snapshot, &ctx).await;
        assert_eq!(restore.categories, 1);
        assert_eq!(restore.channels, 1);
        assert_eq!(guild.created_channel_names(), vec!["Mods", "logs"]);

        let mods = guild.channel_named("Mods").unwrap();
        let logs = guild.channel_named("logs").unwrap();
        assert_ne!(mods.id.get(), 1);
        assert_eq!(logs.parent_id, Some(mods.id));
    }

    #[tokio::test]
    async fn test_failed_channel_does_not_abort_the_rest() {
        let guild = FakeGuild::new(200, "Target").failing("c3", false);
        let channels = (1..=5)
            .map(|i| record_channel(i, &format!("c{}", i), ChannelKind::Text, i as i64))
            .collect();
        let snapshot = snapshot(channels, Vec::new());
        let ctx = context(&guild, &snapshot).await;

        let restore = restore_channels(&guild, &snapshot, &ctx).await;
        assert_eq!(restore.channels, 4);
        assert_eq!(restore.total(), 4);
        assert_eq!(restore.failed, 1);
        assert_eq!(guild.created_channel_names(), vec!["c1", "c2", "c4", "c5"]);
    }

    #[tokio::test]
    async fn test_channels_are_created_in_position_order() {
        let guild = FakeGuild::new(200, "Target");
        let snapshot = snapshot(
            vec![
                record_channel(1, "third", ChannelKind::Text, 2),
                record_channel(2, "first", ChannelKind::Voice, 0),
                record_channel(3, "second", ChannelKind::Text, 1),
            ],
            Vec::new(),
        );
        let ctx = context(&guild, &snapshot).await;

        restore_channels(&guild, &snapshot, &ctx).await;
        assert_eq!(guild.created_channel_names(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_overwrite_failure_keeps_the_category() {
        let guild = FakeGuild::new(200, "Target").failing_overwrites("Mods");
        let mut mods = record_channel(1, "Mods", ChannelKind::Category, 0);
        mods.permissions = Some(
            [(String::from("role_5"), PermissionPair::new(0, 1024))]
                .into_iter()
                .collect(),
        );
        let snapshot = snapshot(vec![mods, child(2, "logs", "Mods", 0)], Vec::new());
        let ctx = context(&guild, &snapshot).await;

        let restore = restore_channels(&guild, &snapshot, &ctx).await;
        assert_eq!(restore.categories, 1);
        assert_eq!(restore.channels, 1);
        assert_eq!(restore.overwrite_failures, 1);
        let mods = guild.channel_named("Mods").unwrap();
        assert_eq!(guild.channel_named("logs").unwrap().parent_id, Some(mods.id));
    }

    #[tokio::test]
    async fn test_missing_category_places_channel_at_top_level() {
        let guild = FakeGuild::new(200, "Target").failing("Mods", true);
        let snapshot = snapshot(
            vec![
                record_channel(1, "Mods", ChannelKind::Category, 0),
                child(2, "logs", "Mods", 0),
                child(3, "orphan", "Gone", 1),
            ],
            Vec::new(),
        );
        let ctx = context(&guild, &snapshot).await;

        let restore = restore_channels(&guild, &snapshot, &ctx).await;
        assert_eq!(restore.categories, 0);
        assert_eq!(restore.channels, 2);
        assert_eq!(guild.channel_named("logs").unwrap().parent_id, None);
        assert_eq!(guild.channel_named("orphan").unwrap().parent_id, None);
    }

    #[tokio::test]
    async fn test_voice_fields_only_reach_voice_channels() {
        let guild = FakeGuild::new(200, "Target");
        let mut voice = record_channel(1, "lounge", ChannelKind::Voice, 0);
        voice.bitrate = Some(96_000);
        voice.user_limit = Some(5);
        voice.topic = Some(String::from("ignored"));
        let mut text = record_channel(2, "general", ChannelKind::Text, 1);
        text.topic = Some(String::from("hello"));
        text.bitrate = Some(1);
        let snapshot = snapshot(vec![voice, text], Vec::new());
        let ctx = context(&guild, &snapshot).await;

        restore_channels(&guild, &snapshot, &ctx).await;
        let lounge = guild.channel_named("lounge").unwrap();
        assert_eq!(lounge.kind, Some(ChannelKind::Voice));
        assert_eq!(lounge.bitrate, Some(96_000));
        assert_eq!(lounge.user_limit, Some(5));
        assert_eq!(lounge.topic, None);
        let general = guild.channel_named("general").unwrap();
        assert_eq!(general.topic.as_deref(), Some("hello"));
        assert_eq!(general.bitrate, None);
    }

    #[tokio::test]
    async fn test_category_overwrites_use_translated_targets() {
        let guild = FakeGuild::new(200, "Target");
        let mut mods = record_channel(1, "Mods", ChannelKind::Category, 0);
        mods.permissions = Some(
            [
                (String::from("role_1"), PermissionPair::new(0, 1024)),
                (String::from("role_7"), PermissionPair::new(0, 0)),
            ]
            .into_iter()
            .collect(),
        );
        let snapshot = snapshot(vec![mods], Vec::new());
        let ctx = context(&guild, &snapshot).await;

        restore_channels(&guild, &snapshot, &ctx).await;
        let mods = guild.channel_named("Mods").unwrap();
        let overwrites = guild.overwrites_for(mods.id);
        assert_eq!(overwrites.len(), 1);
        assert_eq!(overwrites[0].target, OverwriteHandle::Role(Id::new(200)));
        assert_eq!(overwrites[0].deny, 1024);
    }
}
