use crate::Client;
use anyhow::Result;
use guildvault::backup::{self, RestoreReport};
use guildvault::commands::{precondition::require_in_guild, Context, Invocation};
use guildvault::models::{GuildSnapshot, SnapshotError};
use guildvault::Error;
use tracing::{error, info};

const LISTED_FILES: usize = 10;

pub async fn save_backup(client: &Client, ctx: &Context<'_>) -> Result<()> {
    let guild_id = require_in_guild(ctx)?;
    let _guard = client.session().begin_operation(guild_id)?;
    ctx.respond("⏳ Saving server structure...").await?;

    let snapshot = backup::snapshot(&client.platform(guild_id)).await?;
    let path = client.store().save(&snapshot).await?;
    let leaf_channels = snapshot.leaf_channels().count();
    ctx.respond(&format!(
        "✅ Backup saved: {} channels ({} categories, {} channels) and {} roles\n📁 `{}`",
        snapshot.channels.len(),
        snapshot.categories_count,
        leaf_channels,
        snapshot.roles_count,
        path.display()
    ))
    .await
}

pub async fn load_backup(
    client: &Client,
    ctx: &Context<'_>,
    invocation: &Invocation<'_>,
) -> Result<()> {
    let guild_id = require_in_guild(ctx)?;
    if invocation.rest.is_empty() {
        return list_backups(client, ctx).await;
    }

    let _guard = client.session().begin_operation(guild_id)?;
    let snapshot = match client.store().load(invocation.rest).await {
        Ok(snapshot) => snapshot,
        Err(SnapshotError::NotFound(name)) => {
            return ctx
                .respond(&format!(
                    ":x: File `{}` not found. Use `{}load_backup` to list backups.",
                    name,
                    client.prefix()
                ))
                .await;
        }
        Err(SnapshotError::InvalidName(name)) => {
            info!("Rejected backup name {:?}", name);
            return ctx.respond(":x: Invalid file name.").await;
        }
        Err(SnapshotError::InvalidFormat(err)) => {
            info!("Rejected backup {:?}: {}", invocation.rest, err);
            return ctx.respond(":x: Invalid JSON file.").await;
        }
        Err(err) => return Err(err.into()),
    };

    ctx.respond(&format!(
        "⏳ Restoring {} channels and {} roles from `{}`...",
        snapshot.channels.len(),
        snapshot.roles.len(),
        snapshot.guild_name
    ))
    .await?;

    let platform = client.platform(guild_id);
    let deadline = client.config().backup.restore_deadline();
    match backup::restore_within(&platform, &snapshot, deadline).await {
        Ok(report) => ctx.respond(&summarize(&snapshot, &report)).await,
        Err(Error::DeadlineExceeded(deadline)) => {
            ctx.respond(&format!(
                ":x: Restore timed out after {}s. Anything already created was kept.",
                deadline.as_secs()
            ))
            .await
        }
        Err(Error::Platform(err)) if err.is_privilege() => {
            ctx.respond(":x: Missing permissions to read this server.")
                .await
        }
        Err(err) => {
            error!("Restore of {} failed: {}", snapshot.guild_name, err);
            Err(err.into())
        }
    }
}

async fn list_backups(client: &Client, ctx: &Context<'_>) -> Result<()> {
    let files = client.store().list().await?;
    if files.is_empty() {
        return ctx
            .respond(&format!(
                "📁 No backup files in `{}`",
                client.store().dir().display()
            ))
            .await;
    }

    let mut message = String::from("📁 **Available backups:**\n");
    for file in files.iter().take(LISTED_FILES) {
        message.push_str(&format!("• `{}`\n", file));
    }
    if files.len() > LISTED_FILES {
        message.push_str(&format!("...and {} more\n", files.len() - LISTED_FILES));
    }
    message.push_str(&format!("Usage: `{}load_backup <file>`", client.prefix()));
    ctx.respond(&message).await
}

fn summarize(snapshot: &GuildSnapshot, report: &RestoreReport) -> String {
    let mut summary = format!(
        "✅ Restored `{}`: {} channels ({} categories, {} channels) and {} roles",
        snapshot.guild_name,
        report.channels.total(),
        report.channels.categories,
        report.channels.channels,
        report.roles_created
    );
    if report.failures() > 0 {
        summary.push_str(&format!("\n⚠️ {} items could not be created", report.failures()));
    }
    if report.channels.overwrite_failures > 0 {
        summary.push_str(&format!(
            "\n⚠️ Permissions could not be applied to {} channels",
            report.channels.overwrite_failures
        ));
    }
    if !report.warnings.is_empty() {
        summary.push_str(&format!(
            "\n⚠️ {} problems found in the backup file",
            report.warnings.len()
        ));
    }
    summary
}
