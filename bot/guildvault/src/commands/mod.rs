pub mod precondition;
pub mod prelude;
pub mod registry;
pub mod session;

pub use self::{
    registry::{Arity, CommandSpec, CommandTable},
    session::{OperationGuard, Session},
};

use crate::http::Client;
use crate::models::channel::Message;
use std::iter::Peekable;
use std::str::SplitWhitespace;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Arguments<'a> = Peekable<SplitWhitespace<'a>>;

#[derive(Clone)]
pub struct Context<'a> {
    pub message: &'a Message,
    pub http: Arc<Client>,
}

impl Context<'_> {
    /// Replies by editing the invoking message in place.
    pub async fn respond(&self, content: &str) -> anyhow::Result<()> {
        self.http
            .update_message(self.message.channel_id, self.message.id)
            .content(Some(content))?
            .await?;
        Ok(())
    }
}

/// The sum type of all errors that might result from running a command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command: `{}`", .0)]
    UnknownCommand(String),
    #[error("User failed to satisfy preconditions: {}", .0)]
    FailedPrecondition(&'static str),
    #[error("Invalid Argument: {}", .0)]
    InvalidArgument(String),
    #[error("Usage: `{}`", .0)]
    Usage(String),
    #[error("Another backup or restore is already running on this server.")]
    OperationInProgress,
    #[error("Command is on cooldown for another {:?}", .0)]
    OnCooldown(Duration),
}

/// A prefixed command message split into its name and arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Lowercased command name.
    pub name: String,
    /// Everything after the name, with surrounding whitespace removed.
    pub rest: &'a str,
}

impl<'a> Invocation<'a> {
    pub fn arguments(&self) -> Arguments<'a> {
        self.rest.split_whitespace().peekable()
    }

    pub fn argument_count(&self) -> usize {
        self.rest.split_whitespace().count()
    }
}

/// Returns `None` when `content` does not start with `prefix` or names no
/// command.
pub fn parse_invocation<'a>(prefix: &str, content: &'a str) -> Option<Invocation<'a>> {
    let body = content.strip_prefix(prefix)?.trim();
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim_start()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(Invocation {
        name: name.to_lowercase(),
        rest,
    })
}
