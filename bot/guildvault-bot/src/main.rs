mod commands;

use anyhow::Result;
use futures::stream::StreamExt;
use guildvault::{
    commands::{CommandTable, Session},
    config::{self, GuildvaultConfig},
    gateway::{cluster::*, Event, EventTypeFlags, Intents},
    init,
    models::{channel::Message, gateway::payload::incoming::Ready, users::CurrentUser},
    platform::{build_limiter, DirectRateLimiter, HttpGuild, Throttled},
    prelude::*,
};
use guildvault_storage::SnapshotStore;
use std::sync::Mutex;

const BOT_INTENTS: Intents = Intents::from_bits_truncate(
    Intents::GUILDS.bits()
        | Intents::GUILD_MEMBERS.bits()
        | Intents::GUILD_MESSAGES.bits()
        | Intents::MESSAGE_CONTENT.bits(),
);

const BOT_EVENTS: EventTypeFlags = EventTypeFlags::from_bits_truncate(
    EventTypeFlags::READY.bits() | EventTypeFlags::MESSAGE_CREATE.bits(),
);

#[tokio::main]
async fn main() {
    let config = config::load_config(config::get_config_path().as_ref());

    init::init(&config);
    let http_client = Arc::new(init::http_client(&config));

    let (gateway, mut events) = init::cluster(&config, BOT_INTENTS)
        .http_client(http_client.clone())
        .event_types(BOT_EVENTS)
        .build()
        .await
        .expect("Failed to connect to the Discord gateway");
    let gateway = Arc::new(gateway);

    let user = http_client
        .current_user()
        .await
        .expect("Current user should not fail to load.")
        .model()
        .await
        .expect("Failed to deserialize CurrentUser.");
    info!("Logged in as {} ({})", user.name, user.id);

    let client = Client(Arc::new(ClientRef {
        gateway: gateway.clone(),
        http: http_client,
        session: Session::new(config.cooldown()),
        commands: commands::table(),
        store: SnapshotStore::new(config.backup.export_dir.clone()),
        limiter: build_limiter(&config.throttle),
        presence: Mutex::new(commands::presence::PresenceState::default()),
        user,
        config,
    }));

    info!("Starting gateway...");
    gateway.up().await;
    info!("Client started.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            res = events.next() => {
                if let Some((shard_id, evt)) = res {
                    tokio::spawn(client.clone().consume_event(shard_id, evt));
                } else {
                    break;
                }
            }
        }
    }

    info!("Shutting down gateway...");
    gateway.down();
    info!("Client stopped.");
}

pub struct ClientRef {
    gateway: Arc<Cluster>,
    http: Arc<guildvault::http::Client>,
    user: CurrentUser,
    config: GuildvaultConfig,
    session: Session,
    commands: CommandTable<commands::Command>,
    store: SnapshotStore,
    limiter: Arc<DirectRateLimiter>,
    presence: Mutex<commands::presence::PresenceState>,
}

#[derive(Clone)]
pub struct Client(Arc<ClientRef>);

impl Client {
    #[inline(always)]
    pub fn http(&self) -> &Arc<guildvault::http::Client> {
        &self.0.http
    }

    #[inline(always)]
    pub fn gateway(&self) -> &Cluster {
        &self.0.gateway
    }

    pub fn user(&self) -> &CurrentUser {
        &self.0.user
    }

    pub fn config(&self) -> &GuildvaultConfig {
        &self.0.config
    }

    pub fn prefix(&self) -> &str {
        &self.0.config.command_prefix
    }

    pub fn session(&self) -> &Session {
        &self.0.session
    }

    pub fn commands(&self) -> &CommandTable<commands::Command> {
        &self.0.commands
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.0.store
    }

    pub fn presence(&self) -> &Mutex<commands::presence::PresenceState> {
        &self.0.presence
    }

    /// A paced, time-bounded handle on one guild. Every handle shares the
    /// same limiter.
    pub fn platform(&self, guild_id: Id<GuildMarker>) -> Throttled<HttpGuild> {
        Throttled::new(
            HttpGuild::new(self.0.http.clone(), guild_id),
            self.0.limiter.clone(),
            self.0.config.throttle.call_timeout(),
        )
    }

    async fn consume_event(self, shard_id: u64, event: Event) {
        let kind = event.kind();
        let result = match event {
            Event::Ready(evt) => self.on_shard_ready(shard_id, evt).await,
            Event::MessageCreate(evt) => self.on_message_create(evt.0).await,
            _ => Ok(()),
        };

        if let Err(err) = result {
            error!(
                "Error while running event with {:?}: {} ({:?})",
                kind, err, err
            );
        }
    }

    async fn on_shard_ready(self, shard_id: u64, evt: Box<Ready>) -> Result<()> {
        info!(
            "Shard {} ready with {} guilds",
            shard_id,
            evt.guilds.len()
        );
        self.session().mark_ready();
        Ok(())
    }

    async fn on_message_create(self, message: Message) -> Result<()> {
        // Only react to commands typed by the account itself.
        if !self.session().is_ready() || message.author.id != self.user().id {
            return Ok(());
        }
        commands::handle_message(&self, &message).await
    }
}
