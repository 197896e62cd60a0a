use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use scrib_core::config::STORE_FILE_EXTENSION;
use scrib_core::GuildId;
use tracing::{debug, info};

use crate::error::Result;
use crate::schema;

/// Owns the mapping from a guild id to its on-disk store.
///
/// Stores are created lazily: the first operation against a never-seen guild
/// creates the file and applies the full schema. Connections are scoped to a
/// single [`StoreManager::with_guild`] call rather than held long-term, so
/// concurrent callers never contend on a shared handle.
pub struct StoreManager {
    root: PathBuf,
}

impl StoreManager {
    /// Create a manager rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!(root = %root.display(), "guild store root ready");
        Ok(Self { root })
    }

    /// Pure mapping from guild id to store location.
    pub fn store_path(&self, guild: GuildId) -> PathBuf {
        self.root.join(format!("{guild}.{STORE_FILE_EXTENSION}"))
    }

    /// Ensure the guild's store exists and is fully schema-initialised.
    ///
    /// Idempotent — safe to call before every operation. Open/create
    /// failures surface as [`crate::StoreError::Storage`] and are not
    /// retried.
    pub fn ensure_store(&self, guild: GuildId) -> Result<()> {
        self.open(guild).map(drop)
    }

    /// Run `action` against the guild's store with a call-scoped connection.
    ///
    /// The connection is released on all exit paths: it lives on this
    /// function's stack, so `Drop` closes it whether `action` returns,
    /// errors, or unwinds. No transaction boundary is provided beyond
    /// SQLite's per-statement auto-commit.
    ///
    /// The error type is generic so callers layering their own errors on top
    /// of [`crate::StoreError`] can mix store and non-store work in one
    /// scoped call.
    pub fn with_guild<T, E>(
        &self,
        guild: GuildId,
        action: impl FnOnce(&Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<crate::StoreError>,
    {
        let conn = self.open(guild).map_err(E::from)?;
        action(&conn)
    }

    /// Every guild for which a store file already exists. Used by the
    /// startup job-rebuild pass; guilds the bot has never written to are
    /// absent by construction.
    pub fn known_guilds(&self) -> Result<Vec<GuildId>> {
        let mut guilds = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if let Some(guild) = guild_id_from_path(&path) {
                guilds.push(guild);
            }
        }
        guilds.sort_by_key(|g| g.get());
        Ok(guilds)
    }

    fn open(&self, guild: GuildId) -> Result<Connection> {
        let path = self.store_path(guild);
        let fresh = !path.exists();
        let conn = Connection::open(&path)?;
        schema::init_db(&conn)?;
        if fresh {
            debug!(%guild, path = %path.display(), "created guild store");
        }
        Ok(conn)
    }
}

fn guild_id_from_path(path: &Path) -> Option<GuildId> {
    if path.extension()?.to_str()? != STORE_FILE_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}
