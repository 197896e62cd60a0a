//! `scrib-core` — shared configuration, errors, and id types.
//!
//! Everything here is consumed by the storage, scheduler, and feature-module
//! crates; nothing in this crate touches the network or the filesystem beyond
//! reading the config file.

pub mod config;
pub mod error;
pub mod types;

pub use config::ScribConfig;
pub use error::{Result, ScribError};
pub use types::{ChannelId, GuildId, RoleId, UserId};
