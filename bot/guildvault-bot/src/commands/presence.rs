use crate::Client;
use anyhow::Result;
use guildvault::commands::{prelude::*, CommandError, Context, Invocation};
use guildvault::models::gateway::{
    payload::outgoing::{update_presence::UpdatePresencePayload, UpdatePresence},
    presence::{Activity, ActivityType, MinimalActivity, Status},
    OpCode,
};
use std::str::FromStr;
use tracing::info;

/// The presence last sent to the gateway. Status and activity are sent
/// together, so each command keeps the other half.
#[derive(Clone, Debug)]
pub struct PresenceState {
    status: Status,
    activity: Option<Activity>,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self {
            status: Status::Online,
            activity: None,
        }
    }
}

impl PresenceState {
    fn payload(&self) -> UpdatePresence {
        UpdatePresence {
            d: UpdatePresencePayload {
                activities: self.activity.iter().cloned().collect(),
                afk: false,
                since: None,
                status: self.status,
            },
            op: OpCode::PresenceUpdate,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusArgument(pub Status);

impl FromStr for StatusArgument {
    type Err = String;

    fn from_str(arg: &str) -> std::result::Result<Self, Self::Err> {
        match arg.to_lowercase().as_str() {
            "online" => Ok(Self(Status::Online)),
            "idle" => Ok(Self(Status::Idle)),
            "dnd" => Ok(Self(Status::DoNotDisturb)),
            "invisible" => Ok(Self(Status::Invisible)),
            _ => Err(String::from(
                "Invalid status. Available statuses: online, idle, dnd, invisible",
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivityKindArgument(pub ActivityType);

impl FromStr for ActivityKindArgument {
    type Err = String;

    fn from_str(arg: &str) -> std::result::Result<Self, Self::Err> {
        match arg.to_lowercase().as_str() {
            "playing" => Ok(Self(ActivityType::Playing)),
            "streaming" => Ok(Self(ActivityType::Streaming)),
            "listening" => Ok(Self(ActivityType::Listening)),
            "watching" => Ok(Self(ActivityType::Watching)),
            "competing" => Ok(Self(ActivityType::Competing)),
            _ => Err(String::from(
                "Invalid activity. Types: playing, streaming, listening, watching, competing",
            )),
        }
    }
}

async fn publish(client: &Client, state: PresenceState) -> Result<()> {
    let payload = state.payload();
    for shard in client.gateway().shards() {
        shard.command(&payload).await?;
    }
    Ok(())
}

/// Applies `update` to the stored presence and returns the new state.
fn update_presence(client: &Client, update: impl FnOnce(&mut PresenceState)) -> PresenceState {
    let mut presence = client
        .presence()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    update(&mut *presence);
    presence.clone()
}

pub async fn status(client: &Client, ctx: &Context<'_>, invocation: &Invocation<'_>) -> Result<()> {
    let StatusArgument(status) = invocation
        .arguments()
        .parse_next::<StatusArgument>()
        .map_err(CommandError::InvalidArgument)?
        .ok_or_else(|| CommandError::Usage(format!("{}status <online|idle|dnd|invisible>", client.prefix())))?;

    let state = update_presence(client, |presence| presence.status = status);
    publish(client, state).await?;
    info!("Status changed to {:?}", status);
    ctx.respond(&format!("✅ Status set to `{}`", invocation.rest.to_lowercase()))
        .await
}

pub async fn activity(
    client: &Client,
    ctx: &Context<'_>,
    invocation: &Invocation<'_>,
) -> Result<()> {
    let mut args = invocation.arguments();
    let ActivityKindArgument(kind) = args
        .parse_next::<ActivityKindArgument>()
        .map_err(CommandError::InvalidArgument)?
        .ok_or_else(|| CommandError::Usage(format!("{}activity <type> <name>", client.prefix())))?;
    let name = args.remainder();

    let activity: Activity = MinimalActivity {
        kind,
        name: name.clone(),
        url: None,
    }
    .into();
    let state = update_presence(client, |presence| presence.activity = Some(activity));
    publish(client, state).await?;
    info!("Activity changed to {:?} {}", kind, name);
    ctx.respond(&format!("✅ Activity set to {:?} **{}**", kind, name))
        .await
}
