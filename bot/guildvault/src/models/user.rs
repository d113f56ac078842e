use super::id::{marker::UserMarker, Id};
use super::Snowflake;
use twilight_model::user::{CurrentUser, User};
use twilight_model::util::image_hash::ImageHash;

const DEFAULT_AVATAR_COUNT: u64 = 5;
const BASE_ASSET_URI: &str = "https://cdn.discordapp.com";

pub trait UserLike: Snowflake<Id<UserMarker>> {
    fn name(&self) -> &str;
    fn discriminator(&self) -> u16;
    fn avatar_hash(&self) -> Option<ImageHash>;
    fn bot(&self) -> bool;

    fn avatar_url(&self) -> String {
        let is_animated = self
            .avatar_hash()
            .map(|hash| hash.is_animated())
            .unwrap_or(false);
        let format = if is_animated { "gif" } else { "png" };
        self.avatar_url_as(format, 1024)
    }

    fn avatar_url_as(&self, format: &str, size: u32) -> String {
        if let Some(hash) = self.avatar_hash() {
            format!(
                "{}/avatars/{}/{}.{}?size={}",
                BASE_ASSET_URI,
                self.id(),
                hash,
                format,
                size
            )
        } else {
            self.default_avatar_url()
        }
    }

    fn default_avatar_url(&self) -> String {
        let idx = self.id().get() % DEFAULT_AVATAR_COUNT;
        format!("{}/embed/avatars/{}.png", BASE_ASSET_URI, idx)
    }

    /// Accounts migrated to unique usernames report a discriminator of zero.
    fn display_name(&self) -> String {
        match self.discriminator() {
            0 => self.name().to_owned(),
            discriminator => format!("{}#{:04}", self.name(), discriminator),
        }
    }
}

impl Snowflake<Id<UserMarker>> for User {
    fn id(&self) -> Id<UserMarker> {
        self.id
    }
}

impl UserLike for User {
    fn name(&self) -> &str {
        &self.name
    }

    fn discriminator(&self) -> u16 {
        self.discriminator
    }

    fn avatar_hash(&self) -> Option<ImageHash> {
        self.avatar
    }

    fn bot(&self) -> bool {
        self.bot
    }
}

impl Snowflake<Id<UserMarker>> for CurrentUser {
    fn id(&self) -> Id<UserMarker> {
        self.id
    }
}

impl UserLike for CurrentUser {
    fn name(&self) -> &str {
        &self.name
    }

    fn discriminator(&self) -> u16 {
        self.discriminator
    }

    fn avatar_hash(&self) -> Option<ImageHash> {
        self.avatar
    }

    fn bot(&self) -> bool {
        self.bot
    }
}
