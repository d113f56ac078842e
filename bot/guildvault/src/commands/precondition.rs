use super::{CommandError, Context};
use crate::prelude::*;

pub fn require_in_guild(ctx: &Context<'_>) -> Result<Id<GuildMarker>> {
    ctx.message
        .guild_id
        .ok_or_else(|| CommandError::FailedPrecondition("Command must be run in a server.").into())
}
