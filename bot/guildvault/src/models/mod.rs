pub mod snapshot;
pub mod user;

pub use twilight_model::channel;
pub use twilight_model::gateway;
pub use twilight_model::guild;
pub use twilight_model::id;
pub use twilight_model::user as users;
pub use twilight_model::util;

use chrono::prelude::DateTime;
use chrono::Utc;
use std::time::{Duration, UNIX_EPOCH};

pub use self::{
    snapshot::{
        ChannelKind, ChannelRecord, GuildSnapshot, OverwriteTarget, PermissionPair,
        PermissionTable, RoleRecord, SnapshotError, SnapshotWarning,
    },
    user::UserLike,
};

const DISCORD_EPOCH_MS: u64 = 1420070400000;

pub trait Snowflake<I: SnowflakeId> {
    fn id(&self) -> I;

    fn created_at(&self) -> DateTime<Utc> {
        let timestamp = (self.id().as_u64() >> 22) + DISCORD_EPOCH_MS;
        DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_millis(timestamp))
    }
}

pub trait SnowflakeId: Clone {
    fn as_u64(&self) -> u64;
}

impl<T> SnowflakeId for id::Id<T> {
    fn as_u64(&self) -> u64 {
        self.get()
    }
}

impl<T> Snowflake<id::Id<T>> for id::Id<T> {
    fn id(&self) -> id::Id<T> {
        *self
    }
}
