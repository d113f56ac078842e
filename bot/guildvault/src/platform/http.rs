use super::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use twilight_http::{
    error::ErrorType,
    request::Request,
    response::DeserializeBodyError,
    routing::Route,
    Client,
};
use twilight_model::{
    channel::{Channel, ChannelType},
    guild::{Guild, Role},
};

const FORBIDDEN: u16 = 403;
const NOT_FOUND: u16 = 404;

impl From<twilight_http::Error> for PlatformError {
    fn from(err: twilight_http::Error) -> Self {
        match err.kind() {
            ErrorType::Response { status, .. } if status.get() == FORBIDDEN => {
                Self::InsufficientPrivilege(err.to_string())
            }
            _ => Self::Transient(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transient(format!("Failed to parse Discord response: {}", err))
    }
}

impl From<DeserializeBodyError> for PlatformError {
    fn from(err: DeserializeBodyError) -> Self {
        Self::Transient(format!("Failed to parse Discord response: {}", err))
    }
}

/// Request validation failures are reported like any other failed call.
fn invalid(err: impl std::fmt::Display) -> PlatformError {
    PlatformError::Transient(err.to_string())
}

fn is_not_found(err: &twilight_http::Error) -> bool {
    matches!(err.kind(), ErrorType::Response { status, .. } if status.get() == NOT_FOUND)
}

fn channel_kind(kind: ChannelType) -> Option<ChannelKind> {
    match kind {
        ChannelType::GuildText => Some(ChannelKind::Text),
        ChannelType::GuildVoice => Some(ChannelKind::Voice),
        ChannelType::GuildForum => Some(ChannelKind::Forum),
        ChannelType::GuildStageVoice => Some(ChannelKind::Stage),
        ChannelType::GuildAnnouncement => Some(ChannelKind::News),
        ChannelType::GuildCategory => Some(ChannelKind::Category),
        _ => None,
    }
}

fn channel_type(kind: ChannelKind) -> ChannelType {
    match kind {
        ChannelKind::Text => ChannelType::GuildText,
        ChannelKind::Voice => ChannelType::GuildVoice,
        ChannelKind::Forum => ChannelType::GuildForum,
        ChannelKind::Stage => ChannelType::GuildStageVoice,
        ChannelKind::News => ChannelType::GuildAnnouncement,
        ChannelKind::Category => ChannelType::GuildCategory,
    }
}

/// Permission bitfields exactly as Discord sends them. twilight-model 0.14
/// only keeps the bits it knows about, so every permission value read from
/// or written to the API goes through these instead of `Permissions`.
mod raw {
    use serde::{Deserialize, Serialize};
    use twilight_model::id::{marker::*, Id};

    pub const ROLE: u8 = 0;
    pub const MEMBER: u8 = 1;

    mod bits {
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(value)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
            #[derive(Deserialize)]
            #[serde(untagged)]
            enum Bits {
                Text(String),
                Number(u64),
            }
            match Bits::deserialize(deserializer)? {
                Bits::Text(text) => text.parse().map_err(D::Error::custom),
                Bits::Number(number) => Ok(number),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Overwrite {
        pub id: Id<GenericMarker>,
        #[serde(rename = "type")]
        pub kind: u8,
        #[serde(with = "bits")]
        pub allow: u64,
        #[serde(with = "bits")]
        pub deny: u64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Role {
        pub id: Id<RoleMarker>,
        #[serde(with = "bits")]
        pub permissions: u64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Guild {
        pub roles: Vec<Role>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Channel {
        pub id: Id<ChannelMarker>,
        #[serde(default)]
        pub permission_overwrites: Option<Vec<Overwrite>>,
    }

    #[derive(Debug, Serialize)]
    pub struct NewRole<'a> {
        pub name: &'a str,
        #[serde(with = "bits")]
        pub permissions: u64,
        pub color: u32,
        pub hoist: bool,
        pub mentionable: bool,
    }

    #[derive(Debug, Serialize)]
    pub struct ChannelOverwrites<'a> {
        pub permission_overwrites: &'a [Overwrite],
    }
}

fn to_overwrite(overwrite: &raw::Overwrite) -> Option<Overwrite> {
    let target = match overwrite.kind {
        raw::ROLE => OverwriteHandle::Role(overwrite.id.cast()),
        raw::MEMBER => OverwriteHandle::Member(overwrite.id.cast()),
        _ => return None,
    };
    Some(Overwrite {
        target,
        allow: overwrite.allow,
        deny: overwrite.deny,
    })
}

fn from_overwrite(overwrite: &Overwrite) -> raw::Overwrite {
    let (id, kind) = match overwrite.target {
        OverwriteHandle::Role(id) => (id.cast(), raw::ROLE),
        OverwriteHandle::Member(id) => (id.cast(), raw::MEMBER),
    };
    raw::Overwrite {
        id,
        kind,
        allow: overwrite.allow,
        deny: overwrite.deny,
    }
}

fn to_live_role(role: Role, permissions: u64) -> LiveRole {
    LiveRole {
        id: role.id,
        name: role.name,
        color: role.color,
        hoist: role.hoist,
        mentionable: role.mentionable,
        managed: role.managed,
        permissions,
        position: role.position,
        unicode_emoji: role.unicode_emoji,
    }
}

fn to_live_channel(channel: Channel, overwrites: &[raw::Overwrite]) -> LiveChannel {
    LiveChannel {
        id: channel.id,
        kind: channel_kind(channel.kind),
        name: channel.name,
        position: channel.position.map(i64::from).unwrap_or_default(),
        parent_id: channel.parent_id,
        topic: channel.topic,
        nsfw: channel.nsfw.unwrap_or(false),
        bitrate: channel.bitrate,
        user_limit: channel.user_limit,
        overwrites: overwrites.iter().filter_map(to_overwrite).collect(),
    }
}

fn decode_roles(roles: Vec<Role>, raw_roles: Vec<raw::Role>) -> Vec<LiveRole> {
    let permissions: HashMap<Id<RoleMarker>, u64> = raw_roles
        .into_iter()
        .map(|role| (role.id, role.permissions))
        .collect();
    roles
        .into_iter()
        .map(|role| {
            let bits = permissions.get(&role.id).copied().unwrap_or_default();
            to_live_role(role, bits)
        })
        .collect()
}

fn decode_guild(body: &[u8]) -> PlatformResult<(Guild, Vec<LiveRole>)> {
    let mut guild: Guild = serde_json::from_slice(body)?;
    let raw: raw::Guild = serde_json::from_slice(body)?;
    let roles = decode_roles(std::mem::take(&mut guild.roles), raw.roles);
    Ok((guild, roles))
}

fn decode_channels(body: &[u8]) -> PlatformResult<Vec<LiveChannel>> {
    let channels: Vec<Channel> = serde_json::from_slice(body)?;
    let raw: Vec<raw::Channel> = serde_json::from_slice(body)?;
    let overwrites: HashMap<Id<ChannelMarker>, Vec<raw::Overwrite>> = raw
        .into_iter()
        .map(|channel| (channel.id, channel.permission_overwrites.unwrap_or_default()))
        .collect();
    Ok(channels
        .into_iter()
        .map(|channel| {
            let channel_overwrites = overwrites.get(&channel.id).map(Vec::as_slice).unwrap_or(&[]);
            to_live_channel(channel, channel_overwrites)
        })
        .collect())
}

/// A [`GuildPlatform`] backed by the Discord REST API.
#[derive(Clone)]
pub struct HttpGuild {
    http: Arc<Client>,
    guild_id: Id<GuildMarker>,
}

impl HttpGuild {
    pub fn new(http: Arc<Client>, guild_id: Id<GuildMarker>) -> Self {
        Self { http, guild_id }
    }
}

#[async_trait]
impl GuildPlatform for HttpGuild {
    async fn fetch_view(&self) -> PlatformResult<GuildView> {
        let body = self.http.guild(self.guild_id).await?.bytes().await?;
        let (guild, roles) = decode_guild(&body)?;
        let body = self
            .http
            .guild_channels(self.guild_id)
            .await?
            .bytes()
            .await?;
        let channels = decode_channels(&body)?;
        debug!(
            "Fetched guild {} with {} channels and {} roles",
            guild.id,
            channels.len(),
            roles.len()
        );
        Ok(GuildView {
            id: guild.id,
            name: guild.name,
            channels,
            roles,
        })
    }

    async fn fetch_members(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> PlatformResult<HashSet<Id<UserMarker>>> {
        let mut members = HashSet::new();
        for user_id in user_ids {
            match self.http.guild_member(self.guild_id, *user_id).await {
                Ok(_) => {
                    members.insert(*user_id);
                }
                Err(err) if is_not_found(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(members)
    }

    async fn create_role(&self, role: &NewRole<'_>) -> PlatformResult<LiveRole> {
        let request = Request::builder(&Route::CreateRole {
            guild_id: self.guild_id.get(),
        })
        .json(&raw::NewRole {
            name: role.name,
            permissions: role.permissions,
            color: role.color,
            hoist: role.hoist,
            mentionable: role.mentionable,
        })?
        .build();
        let body = self.http.request::<Role>(request).await?.bytes().await?;
        let created: Role = serde_json::from_slice(&body)?;
        let permissions = serde_json::from_slice::<raw::Role>(&body)?.permissions;
        Ok(to_live_role(created, permissions))
    }

    async fn create_channel(&self, channel: &NewChannel<'_>) -> PlatformResult<LiveChannel> {
        let mut request = self
            .http
            .create_guild_channel(self.guild_id, channel.name)
            .map_err(invalid)?
            .kind(channel_type(channel.kind));
        if let Ok(position) = u64::try_from(channel.position) {
            request = request.position(position);
        }
        if channel.kind != ChannelKind::Category {
            request = request.nsfw(channel.nsfw);
        }
        if let Some(parent_id) = channel.parent_id {
            request = request.parent_id(parent_id);
        }
        if let Some(topic) = channel.topic {
            request = request.topic(topic).map_err(invalid)?;
        }
        if let Some(bitrate) = channel.bitrate {
            request = request.bitrate(bitrate).map_err(invalid)?;
        }
        if let Some(user_limit) = channel.user_limit {
            request = request.user_limit(u16::try_from(user_limit).unwrap_or(u16::MAX));
        }

        let created = request.await?.model().await?;
        Ok(to_live_channel(created, &[]))
    }

    async fn set_overwrites(
        &self,
        channel_id: Id<ChannelMarker>,
        overwrites: &[Overwrite],
    ) -> PlatformResult<()> {
        let overwrites: Vec<raw::Overwrite> = overwrites.iter().map(from_overwrite).collect();
        let request = Request::builder(&Route::UpdateChannel {
            channel_id: channel_id.get(),
        })
        .json(&raw::ChannelOverwrites {
            permission_overwrites: &overwrites,
        })?
        .build();
        self.http.request::<Channel>(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// SEND_VOICE_MESSAGES, CREATE_EXPRESSIONS and USE_SOUNDBOARD on top of
    /// VIEW_CHANNEL. twilight-model 0.14 knows none of the first three.
    const NEWER_BITS: u64 = (1 << 46) | (1 << 43) | (1 << 42) | 1024;

    fn role_json(id: u64, permissions: u64) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "name": "Speaker",
            "color": 0,
            "hoist": false,
            "managed": false,
            "mentionable": false,
            "permissions": permissions.to_string(),
            "position": 3,
        })
    }

    #[test]
    fn test_channel_kinds_round_trip_through_twilight_types() {
        for kind in [
            ChannelKind::Text,
            ChannelKind::Voice,
            ChannelKind::Forum,
            ChannelKind::Stage,
            ChannelKind::News,
            ChannelKind::Category,
        ] {
            assert_eq!(channel_kind(channel_type(kind)), Some(kind));
        }
        assert_eq!(channel_kind(ChannelType::Private), None);
    }

    #[test]
    fn test_overwrites_keep_target_kind() {
        let overwrite = Overwrite {
            target: OverwriteHandle::Member(Id::new(12)),
            allow: 1024,
            deny: 2048,
        };
        let converted = from_overwrite(&overwrite);
        assert_eq!(converted.kind, raw::MEMBER);
        assert_eq!(converted.id.get(), 12);
        assert_eq!(to_overwrite(&converted), Some(overwrite));
    }

    #[test]
    fn test_sent_overwrites_keep_newer_permission_bits() {
        let overwrite = Overwrite {
            target: OverwriteHandle::Role(Id::new(5)),
            allow: NEWER_BITS,
            deny: 1 << 41,
        };
        let body = serde_json::to_value(raw::ChannelOverwrites {
            permission_overwrites: &[from_overwrite(&overwrite)],
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "permission_overwrites": [{
                    "id": "5",
                    "type": 0,
                    "allow": NEWER_BITS.to_string(),
                    "deny": (1u64 << 41).to_string(),
                }]
            })
        );
    }

    #[test]
    fn test_created_role_request_keeps_newer_permission_bits() {
        let body = serde_json::to_value(raw::NewRole {
            name: "Speaker",
            permissions: NEWER_BITS,
            color: 0,
            hoist: false,
            mentionable: true,
        })
        .unwrap();
        assert_eq!(body["permissions"], json!("83562883712000"));
    }

    #[test]
    fn test_fetched_roles_keep_newer_permission_bits() {
        let body = serde_json::to_vec(&json!([role_json(7, NEWER_BITS)])).unwrap();
        let roles: Vec<Role> = serde_json::from_slice(&body).unwrap();
        let raw_roles: Vec<raw::Role> = serde_json::from_slice(&body).unwrap();

        let live = decode_roles(roles, raw_roles);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "Speaker");
        assert_eq!(live[0].permissions, NEWER_BITS);
    }

    #[test]
    fn test_fetched_channel_overwrites_keep_newer_permission_bits() {
        let body = serde_json::to_vec(&json!([{
            "id": "30",
            "type": 0,
            "guild_id": "1",
            "name": "general",
            "position": 2,
            "permission_overwrites": [
                {"id": "1", "type": 0, "allow": "0", "deny": NEWER_BITS.to_string()},
                {"id": "50", "type": 1, "allow": NEWER_BITS.to_string(), "deny": "0"},
            ],
        }]))
        .unwrap();

        let channels = decode_channels(&body).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name.as_deref(), Some("general"));
        assert_eq!(channels[0].kind, Some(ChannelKind::Text));
        assert_eq!(
            channels[0].overwrites,
            vec![
                Overwrite {
                    target: OverwriteHandle::Role(Id::new(1)),
                    allow: 0,
                    deny: NEWER_BITS,
                },
                Overwrite {
                    target: OverwriteHandle::Member(Id::new(50)),
                    allow: NEWER_BITS,
                    deny: 0,
                },
            ]
        );
    }

    #[test]
    fn test_numeric_permission_bits_are_accepted() {
        let overwrite: raw::Overwrite =
            serde_json::from_value(json!({"id": "9", "type": 1, "allow": 1024, "deny": "0"}))
                .unwrap();
        assert_eq!(overwrite.allow, 1024);
    }
}
