use crate::Client;
use anyhow::Result;
use chrono::{TimeZone, Utc};
use guildvault::commands::{
    precondition::require_in_guild, prelude::*, CommandError, Context, Invocation,
};
use guildvault::models::{util::Timestamp, Snowflake, UserLike};
use guildvault::util::mentions::UserArgument;
use std::time::Instant;
use tracing::debug;
use twilight_util::builder::embed::EmbedBuilder;

const EMBED_COLOR: u32 = 0x5865F2;
const MAX_PURGE: u16 = 100;
const PURGE_LOOKBACK: u16 = 10;

fn format_date(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| String::from("Unknown"))
}

pub async fn ping(ctx: &Context<'_>) -> Result<()> {
    let start = Instant::now();
    ctx.respond("🏓 Pong!").await?;
    let latency = start.elapsed().as_millis();
    ctx.respond(&format!("🏓 Pong! Latency: {}ms", latency)).await
}

pub async fn help(client: &Client, ctx: &Context<'_>) -> Result<()> {
    ctx.respond(&client.commands().help(client.prefix())).await
}

pub async fn info(client: &Client, ctx: &Context<'_>) -> Result<()> {
    let user = client.user();
    let guilds = client
        .http()
        .current_user_guilds()
        .await?
        .models()
        .await?
        .len();
    let info = format!(
        "**📊 Account information:**\n\n\
         **Tag:** {}\n**ID:** {}\n**Created:** {}\n**Bot:** {}\n**Servers:** {}",
        user.display_name(),
        user.id,
        user.created_at().format("%d/%m/%Y"),
        if user.bot { "Yes" } else { "No" },
        guilds
    );
    ctx.respond(&info).await
}

async fn target_user(
    client: &Client,
    invocation: &Invocation<'_>,
) -> Result<Option<guildvault::models::users::User>> {
    let mut args = invocation.arguments();
    let target = args
        .parse_next::<UserArgument>()
        .map_err(CommandError::InvalidArgument)?;
    match target {
        Some(UserArgument(user_id)) => {
            Ok(Some(client.http().user(user_id).await?.model().await?))
        }
        None => Ok(None),
    }
}

pub async fn avatar(client: &Client, ctx: &Context<'_>, invocation: &Invocation<'_>) -> Result<()> {
    let (name, url) = match target_user(client, invocation).await? {
        Some(user) => (user.display_name(), user.avatar_url()),
        None => (client.user().display_name(), client.user().avatar_url()),
    };
    ctx.respond(&format!("**Avatar of {}:**\n{}", name, url)).await
}

pub async fn server_info(client: &Client, ctx: &Context<'_>) -> Result<()> {
    let guild_id = require_in_guild(ctx)?;
    let guild = client
        .http()
        .guild(guild_id)
        .with_counts(true)
        .await?
        .model()
        .await?;
    let channels = client
        .http()
        .guild_channels(guild_id)
        .await?
        .models()
        .await?
        .len();
    let members = guild
        .approximate_member_count
        .or(guild.member_count)
        .map(|count| count.to_string())
        .unwrap_or_else(|| String::from("Unknown"));

    let info = format!(
        "**📊 Server information:**\n\n\
         **Name:** {}\n**ID:** {}\n**Owner:** <@{}>\n**Members:** {}\n**Channels:** {}\n\
         **Roles:** {}\n**Created:** {}\n**Boost:** {:?} ({} boosts)",
        guild.name,
        guild.id,
        guild.owner_id,
        members,
        channels,
        guild.roles.len(),
        guild.id.created_at().format("%d/%m/%Y"),
        guild.premium_tier,
        guild.premium_subscription_count.unwrap_or(0)
    );
    ctx.respond(&info).await
}

pub async fn user_info(
    client: &Client,
    ctx: &Context<'_>,
    invocation: &Invocation<'_>,
) -> Result<()> {
    let user = match target_user(client, invocation).await? {
        Some(user) => user,
        None => client.http().user(client.user().id).await?.model().await?,
    };

    let mut info = format!(
        "**👤 Information about {}:**\n\n\
         **ID:** {}\n**Tag:** {}\n**Bot:** {}\n**Created:** {}",
        user.display_name(),
        user.id,
        user.display_name(),
        if user.bot { "Yes" } else { "No" },
        user.created_at().format("%d/%m/%Y")
    );

    if let Some(guild_id) = ctx.message.guild_id {
        match client.http().guild_member(guild_id, user.id).await {
            Ok(response) => {
                let member = response.model().await?;
                info.push_str(&format!(
                    "\n**Joined:** {}\n**Roles:** {}",
                    format_date(member.joined_at.as_secs()),
                    member.roles.len()
                ));
            }
            Err(err) => debug!("User {} is not a member of {}: {}", user.id, guild_id, err),
        }
    }
    ctx.respond(&info).await
}

pub async fn say(ctx: &Context<'_>, invocation: &Invocation<'_>) -> Result<()> {
    ctx.respond(invocation.rest).await
}

/// Splits `title | description`; both halves are trimmed.
fn split_embed_text(text: &str) -> Option<(&str, &str)> {
    text.split_once('|')
        .map(|(title, description)| (title.trim(), description.trim()))
}

pub async fn embed(client: &Client, ctx: &Context<'_>, invocation: &Invocation<'_>) -> Result<()> {
    let (title, description) = split_embed_text(invocation.rest).ok_or_else(|| {
        CommandError::Usage(format!("{}embed <title> | <description>", client.prefix()))
    })?;
    let mut builder = EmbedBuilder::new()
        .title(title)
        .description(description)
        .color(EMBED_COLOR);
    if let Ok(timestamp) = Timestamp::from_secs(Utc::now().timestamp()) {
        builder = builder.timestamp(timestamp);
    }
    let embed = builder.validate()?.build();

    client
        .http()
        .update_message(ctx.message.channel_id, ctx.message.id)
        .content(None)?
        .embeds(Some(&[embed]))?
        .await?;
    Ok(())
}

pub async fn purge(client: &Client, ctx: &Context<'_>, invocation: &Invocation<'_>) -> Result<()> {
    let amount = invocation
        .arguments()
        .parse_next::<u16>()
        .ok()
        .flatten()
        .filter(|amount| (1..=MAX_PURGE).contains(amount))
        .ok_or_else(|| {
            CommandError::InvalidArgument(format!("Specify a number between 1 and {}.", MAX_PURGE))
        })?;

    let channel_id = ctx.message.channel_id;
    let messages = client
        .http()
        .channel_messages(channel_id)
        .limit((amount + PURGE_LOOKBACK).min(MAX_PURGE))?
        .await?
        .models()
        .await?;

    let user_id = client.user().id;
    let mut deleted = 0;
    for message in messages
        .iter()
        .filter(|message| message.author.id == user_id)
        .take(usize::from(amount))
    {
        match client.http().delete_message(channel_id, message.id).await {
            Ok(_) => deleted += 1,
            Err(err) => debug!("Failed to delete message {}: {}", message.id, err),
        }
    }
    debug!("Purged {} of {} requested messages", deleted, amount);
    Ok(())
}
