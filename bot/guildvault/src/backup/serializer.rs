use crate::models::*;
use crate::platform::{GuildView, LiveChannel, LiveRole, Overwrite, OverwriteHandle};
use chrono::Utc;
use tracing::warn;

/// Captures the structure of a guild as a snapshot.
///
/// Channels the snapshot format cannot describe (threads, unnamed or
/// unsupported kinds) are skipped with a warning instead of failing the
/// whole capture.
pub fn serialize(view: &GuildView) -> GuildSnapshot {
    let channels = view
        .channels
        .iter()
        .filter_map(|channel| serialize_channel(view, channel))
        .collect();

    let everyone = view.everyone_role();
    let roles = view
        .roles
        .iter()
        .filter(|role| role.id != everyone && !role.managed)
        .map(serialize_role)
        .collect();

    GuildSnapshot::new(
        view.name.as_str(),
        view.id.get(),
        Utc::now().naive_utc(),
        channels,
        roles,
    )
}

fn serialize_channel(view: &GuildView, channel: &LiveChannel) -> Option<ChannelRecord> {
    let kind = match channel.kind {
        Some(kind) => kind,
        None => {
            warn!("Skipping channel {} of an unsupported type", channel.id);
            return None;
        }
    };
    let name = match channel.name.as_ref() {
        Some(name) => name.clone(),
        None => {
            warn!("Skipping unnamed channel {}", channel.id);
            return None;
        }
    };

    let mut record = ChannelRecord {
        id: channel.id.get(),
        name,
        kind,
        position: channel.position,
        is_category: kind == ChannelKind::Category,
        category_name: None,
        topic: None,
        nsfw: false,
        bitrate: None,
        user_limit: None,
        permissions: permission_table(&channel.overwrites),
    };
    if record.is_category {
        return Some(record);
    }

    record.category_name = channel
        .parent_id
        .and_then(|parent| view.channel(parent))
        .and_then(|parent| parent.name.clone());
    record.topic = channel.topic.clone();
    record.nsfw = channel.nsfw;
    if kind.is_voice_like() {
        record.bitrate = channel.bitrate;
        record.user_limit = channel.user_limit;
    }
    Some(record)
}

fn permission_table(overwrites: &[Overwrite]) -> Option<PermissionTable> {
    if overwrites.is_empty() {
        return None;
    }
    let table = overwrites
        .iter()
        .map(|overwrite| {
            let target = match overwrite.target {
                OverwriteHandle::Role(id) => OverwriteTarget::Role(id.get()),
                OverwriteHandle::Member(id) => OverwriteTarget::Member(id.get()),
            };
            (target.key(), PermissionPair::new(overwrite.allow, overwrite.deny))
        })
        .collect();
    Some(table)
}

fn serialize_role(role: &LiveRole) -> RoleRecord {
    RoleRecord {
        id: role.id.get(),
        name: role.name.clone(),
        color: role.color,
        hoist: role.hoist,
        mentionable: role.mentionable,
        permissions: role.permissions,
        position: role.position,
        unicode_emoji: role.unicode_emoji.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::tests::{live_channel, sample_view};

    #[test]
    fn test_roles_skip_everyone_and_managed() {
        let snapshot = serialize(&sample_view());
        let names: Vec<&str> = snapshot.roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Member", "Mod", "Admin"]);
        assert_eq!(snapshot.roles_count, 3);
    }

    #[test]
    fn test_channels_link_parents_by_name() {
        let snapshot = serialize(&sample_view());
        let logs = snapshot.channels.iter().find(|c| c.name == "logs").unwrap();
        assert_eq!(logs.category_name.as_deref(), Some("Mods"));
        assert_eq!(logs.topic.as_deref(), Some("audit trail"));
        let lounge = snapshot.channels.iter().find(|c| c.name == "lounge").unwrap();
        assert_eq!(lounge.bitrate, Some(64_000));
        assert_eq!(lounge.user_limit, Some(10));
        assert_eq!(snapshot.categories_count, 1);
    }

    #[test]
    fn test_category_keeps_only_overwrites() {
        let snapshot = serialize(&sample_view());
        let mods = snapshot.channels.iter().find(|c| c.name == "Mods").unwrap();
        assert!(mods.is_category);
        assert!(mods.topic.is_none());
        assert!(mods.category_name.is_none());
        let table = mods.permissions.as_ref().unwrap();
        assert_eq!(table["role_100"], PermissionPair::new(0, 1024));
        assert_eq!(table["role_11"], PermissionPair::new(1024, 0));
    }

    #[test]
    fn test_channel_without_overwrites_omits_permissions_key() {
        let snapshot = serialize(&sample_view());
        let general = snapshot.channels.iter().find(|c| c.name == "general").unwrap();
        assert!(general.permissions.is_none());
        let json = serde_json::to_value(general).unwrap();
        assert!(json.get("permissions").is_none());
    }

    #[test]
    fn test_unsupported_channels_are_skipped() {
        let mut view = sample_view();
        let mut thread = live_channel(300, "thread", ChannelKind::Text, 9);
        thread.kind = None;
        let mut unnamed = live_channel(301, "", ChannelKind::Text, 10);
        unnamed.name = None;
        view.channels.push(thread);
        view.channels.push(unnamed);

        let snapshot = serialize(&view);
        assert_eq!(snapshot.channels.len(), view.channels.len() - 2);
        assert!(snapshot.channels.iter().all(|c| c.id < 300));
    }
}
