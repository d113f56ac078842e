#[macro_use]
extern crate lazy_static;

pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod init;
pub mod models;
pub mod platform;
pub mod prelude;
pub mod util;

pub use self::error::{Error, Result};
pub use twilight_gateway as gateway;
pub use twilight_http as http;
