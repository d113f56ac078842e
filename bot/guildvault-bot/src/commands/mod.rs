mod backup;
pub mod presence;
mod standard;

use crate::Client;
use anyhow::Result;
use guildvault::commands::{
    parse_invocation, Arity, CommandError, CommandSpec, CommandTable, Context, Invocation,
};
use guildvault::models::channel::Message;
use tracing::{debug, error};

/// Every command the client answers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Ping,
    Help,
    Info,
    Avatar,
    ServerInfo,
    UserInfo,
    Say,
    Embed,
    Purge,
    Status,
    Activity,
    SaveBackup,
    LoadBackup,
}

fn spec(
    name: &'static str,
    usage: &'static str,
    description: &'static str,
    arity: Arity,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        description,
        arity,
    }
}

pub fn table() -> CommandTable<Command> {
    CommandTable::default()
        .register(spec("ping", "", "Shows the edit latency", Arity::NONE), Command::Ping)
        .register(spec("help", "", "Shows this message", Arity::NONE), Command::Help)
        .register(
            spec("info", "", "Shows information about this account", Arity::NONE),
            Command::Info,
        )
        .register(
            spec("avatar", "[@user]", "Shows a user's avatar", Arity::between(0, 1)),
            Command::Avatar,
        )
        .register(
            spec("serverinfo", "", "Shows information about this server", Arity::NONE),
            Command::ServerInfo,
        )
        .register(
            spec("userinfo", "[@user]", "Shows information about a user", Arity::between(0, 1)),
            Command::UserInfo,
        )
        .register(
            spec("say", "<message>", "Replaces this message with the text", Arity::at_least(1)),
            Command::Say,
        )
        .register(
            spec(
                "embed",
                "<title> | <description>",
                "Replaces this message with an embed",
                Arity::at_least(1),
            ),
            Command::Embed,
        )
        .register(
            spec("purge", "<1-100>", "Deletes your most recent messages", Arity::exactly(1)),
            Command::Purge,
        )
        .register(
            spec(
                "status",
                "<online|idle|dnd|invisible>",
                "Changes your status",
                Arity::exactly(1),
            ),
            Command::Status,
        )
        .register(
            spec(
                "activity",
                "<playing|streaming|listening|watching|competing> <name>",
                "Changes your activity",
                Arity::at_least(2),
            ),
            Command::Activity,
        )
        .register(
            spec(
                "save_backup",
                "",
                "Saves this server's channels, categories and roles to a file",
                Arity::NONE,
            ),
            Command::SaveBackup,
        )
        .register(
            spec(
                "load_backup",
                "[file]",
                "Restores a backup onto this server, or lists backups",
                Arity::at_least(0),
            ),
            Command::LoadBackup,
        )
}

pub async fn handle_message(client: &Client, message: &Message) -> Result<()> {
    let invocation = match parse_invocation(client.prefix(), &message.content) {
        Some(invocation) => invocation,
        None => return Ok(()),
    };
    let ctx = Context {
        message,
        http: client.http().clone(),
    };

    let (spec, command) = match client.commands().resolve(client.prefix(), &invocation) {
        Ok(found) => found,
        Err(CommandError::UnknownCommand(name)) => {
            debug!("Ignoring unknown command {:?}", name);
            return Ok(());
        }
        Err(err) => {
            ctx.respond(&format!(":x: {}", err)).await?;
            return Ok(());
        }
    };
    if let Err(err) = client.session().check_cooldown(spec.name) {
        debug!("Ignoring {}: {}", spec.name, err);
        return Ok(());
    }

    let result = run(client, &ctx, &invocation, *command).await;
    if let Err(err) = result {
        if is_user_error(&err) {
            ctx.respond(&format!(":x: {}", err)).await?;
        } else {
            error!("Command {} failed: {} ({:?})", spec.name, err, err);
            ctx.respond(&format!(":x: Error: {}", err)).await?;
        }
    }
    Ok(())
}

/// Errors caused by how the command was used rather than by a failure.
fn is_user_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<CommandError>().is_some()
        || matches!(
            err.downcast_ref::<guildvault::Error>(),
            Some(guildvault::Error::Command(_))
        )
}

async fn run(
    client: &Client,
    ctx: &Context<'_>,
    invocation: &Invocation<'_>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Ping => standard::ping(ctx).await,
        Command::Help => standard::help(client, ctx).await,
        Command::Info => standard::info(client, ctx).await,
        Command::Avatar => standard::avatar(client, ctx, invocation).await,
        Command::ServerInfo => standard::server_info(client, ctx).await,
        Command::UserInfo => standard::user_info(client, ctx, invocation).await,
        Command::Say => standard::say(ctx, invocation).await,
        Command::Embed => standard::embed(client, ctx, invocation).await,
        Command::Purge => standard::purge(client, ctx, invocation).await,
        Command::Status => presence::status(client, ctx, invocation).await,
        Command::Activity => presence::activity(client, ctx, invocation).await,
        Command::SaveBackup => backup::save_backup(client, ctx).await,
        Command::LoadBackup => backup::load_backup(client, ctx, invocation).await,
    }
}
