//! An in-memory guild used by the backup and restore tests.

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    channels: Vec<LiveChannel>,
    roles: Vec<LiveRole>,
    members: HashSet<Id<UserMarker>>,
    next_id: u64,
    created_roles: Vec<String>,
    created_channels: Vec<String>,
    applied_overwrites: HashMap<Id<ChannelMarker>, Vec<Overwrite>>,
}

pub(crate) struct FakeGuild {
    id: Id<GuildMarker>,
    name: String,
    state: Mutex<FakeState>,
    failing_names: HashMap<String, bool>,
    failing_overwrites: HashSet<String>,
    latency: Option<Duration>,
}

impl FakeGuild {
    pub fn new(id: u64, name: &str) -> Self {
        let id = Id::new(id);
        let everyone = LiveRole {
            id: id.cast(),
            name: String::from("@everyone"),
            color: 0,
            hoist: false,
            mentionable: false,
            managed: false,
            permissions: 0,
            position: 0,
            unicode_emoji: None,
        };
        Self {
            id,
            name: name.to_owned(),
            state: Mutex::new(FakeState {
                roles: vec![everyone],
                next_id: 1_000,
                ..Default::default()
            }),
            failing_names: HashMap::new(),
            failing_overwrites: HashSet::new(),
            latency: None,
        }
    }

    pub fn with_role(self, id: u64, name: &str, position: i64, managed: bool) -> Self {
        self.state.lock().unwrap().roles.push(LiveRole {
            id: Id::new(id),
            name: name.to_owned(),
            color: 0x00ff00,
            hoist: true,
            mentionable: false,
            managed,
            permissions: 8,
            position,
            unicode_emoji: None,
        });
        self
    }

    pub fn with_channel(self, channel: LiveChannel) -> Self {
        self.state.lock().unwrap().channels.push(channel);
        self
    }

    pub fn with_member(self, id: u64) -> Self {
        self.state.lock().unwrap().members.insert(Id::new(id));
        self
    }

    /// Creating a role or channel with this name fails. `privilege` selects
    /// the error variant.
    pub fn failing(mut self, name: &str, privilege: bool) -> Self {
        self.failing_names.insert(name.to_owned(), privilege);
        self
    }

    /// Applying overwrites to the channel created with this name fails.
    pub fn failing_overwrites(mut self, name: &str) -> Self {
        self.failing_overwrites.insert(name.to_owned());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn created_role_names(&self) -> Vec<String> {
        self.state.lock().unwrap().created_roles.clone()
    }

    pub fn created_channel_names(&self) -> Vec<String> {
        self.state.lock().unwrap().created_channels.clone()
    }

    pub fn channel_named(&self, name: &str) -> Option<LiveChannel> {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .rev()
            .find(|channel| channel.name.as_deref() == Some(name))
            .cloned()
    }

    pub fn role_named(&self, name: &str) -> Option<LiveRole> {
        self.state
            .lock()
            .unwrap()
            .roles
            .iter()
            .find(|role| role.name == name)
            .cloned()
    }

    pub fn overwrites_for(&self, channel_id: Id<ChannelMarker>) -> Vec<Overwrite> {
        self.state
            .lock()
            .unwrap()
            .applied_overwrites
            .get(&channel_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_failure(&self, name: &str) -> PlatformResult<()> {
        match self.failing_names.get(name) {
            Some(true) => Err(PlatformError::InsufficientPrivilege(format!(
                "cannot create {}",
                name
            ))),
            Some(false) => Err(PlatformError::Transient(format!("failed to create {}", name))),
            None => Ok(()),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl GuildPlatform for FakeGuild {
    async fn fetch_view(&self) -> PlatformResult<GuildView> {
        self.delay().await;
        let state = self.state.lock().unwrap();
        Ok(GuildView {
            id: self.id,
            name: self.name.clone(),
            channels: state.channels.clone(),
            roles: state.roles.clone(),
        })
    }

    async fn fetch_members(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> PlatformResult<HashSet<Id<UserMarker>>> {
        self.delay().await;
        let state = self.state.lock().unwrap();
        Ok(user_ids
            .iter()
            .filter(|id| state.members.contains(id))
            .copied()
            .collect())
    }

    async fn create_role(&self, role: &NewRole<'_>) -> PlatformResult<LiveRole> {
        self.delay().await;
        self.check_failure(role.name)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        // New roles land directly above @everyone, pushing older ones up.
        for existing in state.roles.iter_mut().filter(|r| r.position > 0) {
            existing.position += 1;
        }
        let created = LiveRole {
            id: Id::new(state.next_id),
            name: role.name.to_owned(),
            color: role.color,
            hoist: role.hoist,
            mentionable: role.mentionable,
            managed: false,
            permissions: role.permissions,
            position: 1,
            unicode_emoji: None,
        };
        state.roles.push(created.clone());
        state.created_roles.push(role.name.to_owned());
        Ok(created)
    }

    async fn create_channel(&self, channel: &NewChannel<'_>) -> PlatformResult<LiveChannel> {
        self.delay().await;
        self.check_failure(channel.name)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let created = LiveChannel {
            id: Id::new(state.next_id),
            name: Some(channel.name.to_owned()),
            kind: Some(channel.kind),
            position: channel.position,
            parent_id: channel.parent_id,
            topic: channel.topic.map(str::to_owned),
            nsfw: channel.nsfw,
            bitrate: channel.bitrate,
            user_limit: channel.user_limit,
            overwrites: Vec::new(),
        };
        state.channels.push(created.clone());
        state.created_channels.push(channel.name.to_owned());
        Ok(created)
    }

    async fn set_overwrites(
        &self,
        channel_id: Id<ChannelMarker>,
        overwrites: &[Overwrite],
    ) -> PlatformResult<()> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        let name = state
            .channels
            .iter()
            .find(|channel| channel.id == channel_id)
            .and_then(|channel| channel.name.clone())
            .unwrap_or_default();
        if self.failing_overwrites.contains(&name) {
            return Err(PlatformError::InsufficientPrivilege(format!(
                "cannot edit {}",
                name
            )));
        }
        if let Some(channel) = state.channels.iter_mut().find(|c| c.id == channel_id) {
            channel.overwrites = overwrites.to_vec();
        }
        state
            .applied_overwrites
            .insert(channel_id, overwrites.to_vec());
        Ok(())
    }
}
