pub use crate::error::{Error, Result};
pub use crate::models::id::{
    marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker},
    Id,
};
pub use std::{sync::Arc, time::Duration};
pub use tracing::{debug, error, info, warn};
