//! Quote module: record memorable guild messages and replay them on demand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use scrib_core::{GuildId, UserId};
use scrib_store::quotes::{self, Quote};
use scrib_store::StoreManager;

use crate::error::{ModuleError, Result};

pub struct QuoteModule {
    stores: Arc<StoreManager>,
}

impl QuoteModule {
    pub fn new(stores: Arc<StoreManager>) -> Arc<Self> {
        Arc::new(Self { stores })
    }

    /// Record a quote. `quoted_at` is when the quoted message was originally
    /// said, which can predate the recording by years.
    pub fn add(
        self: &Arc<Self>,
        guild: GuildId,
        content: &str,
        author: UserId,
        recorder: UserId,
        quoted_at: DateTime<Utc>,
    ) -> Result<String> {
        if content.trim().is_empty() {
            return Err(ModuleError::Rejected(
                "Cannot record an empty quote".to_string(),
            ));
        }
        self.stores.with_guild(guild, |conn| {
            quotes::add(conn, author, content, recorder, quoted_at)
        })?;
        Ok("New Quote added!".to_string())
    }

    /// A random quote, optionally restricted to one author.
    pub fn random(self: &Arc<Self>, guild: GuildId, author: Option<UserId>) -> Result<Quote> {
        self.stores
            .with_guild(guild, |conn| quotes::random(conn, author))?
            .ok_or_else(|| match author {
                Some(author) => {
                    ModuleError::Rejected(format!("No quotes found yet for user {author}"))
                }
                None => ModuleError::Rejected("No quotes recorded yet".to_string()),
            })
    }

    /// Look up a quote by id; unknown ids are reported back to the caller.
    pub fn get(self: &Arc<Self>, guild: GuildId, id: i64) -> Result<Quote> {
        self.stores
            .with_guild(guild, |conn| quotes::find(conn, id))?
            .ok_or_else(|| {
                ModuleError::Rejected(format!("Unable to find Quote with id [{id}]"))
            })
    }

    pub fn by_author(self: &Arc<Self>, guild: GuildId, author: UserId) -> Result<Vec<Quote>> {
        Ok(self
            .stores
            .with_guild(guild, |conn| quotes::by_author(conn, author))?)
    }

    pub fn remove(self: &Arc<Self>, guild: GuildId, id: i64) -> Result<String> {
        let removed = self.stores.with_guild(guild, |conn| quotes::remove(conn, id))?;
        if removed {
            Ok(format!("Quote with ID [{id}] deleted"))
        } else {
            Err(ModuleError::Rejected(format!(
                "Unable to find Quote with id [{id}]"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Arc<QuoteModule>) {
        let dir = tempfile::tempdir().unwrap();
        let stores = Arc::new(StoreManager::new(dir.path()).unwrap());
        (dir, QuoteModule::new(stores))
    }

    const GUILD: GuildId = GuildId(300);

    #[test]
    fn add_and_fetch_round_trip() {
        let (_dir, module) = setup();
        let msg = module
            .add(GUILD, "ship it", UserId(1), UserId(2), Utc::now())
            .unwrap();
        assert_eq!(msg, "New Quote added!");

        let quote = module.random(GUILD, None).unwrap();
        assert_eq!(quote.content, "ship it");
        assert_eq!(module.get(GUILD, quote.id).unwrap().id, quote.id);
    }

    #[test]
    fn empty_quotes_are_rejected() {
        let (_dir, module) = setup();
        assert!(module
            .add(GUILD, "   ", UserId(1), UserId(2), Utc::now())
            .is_err());
    }

    #[test]
    fn random_by_author_only_picks_theirs() {
        let (_dir, module) = setup();
        module
            .add(GUILD, "mine", UserId(1), UserId(9), Utc::now())
            .unwrap();
        module
            .add(GUILD, "theirs", UserId(2), UserId(9), Utc::now())
            .unwrap();

        for _ in 0..10 {
            let q = module.random(GUILD, Some(UserId(1))).unwrap();
            assert_eq!(q.author, UserId(1));
        }
        assert!(module.random(GUILD, Some(UserId(3))).is_err());
    }

    #[test]
    fn missing_ids_are_reported() {
        let (_dir, module) = setup();
        let err = module.get(GUILD, 41).unwrap_err();
        assert!(matches!(err, ModuleError::Rejected(_)));
        assert!(module.remove(GUILD, 41).is_err());
    }

    #[test]
    fn remove_deletes_the_row() {
        let (_dir, module) = setup();
        module
            .add(GUILD, "gone soon", UserId(1), UserId(2), Utc::now())
            .unwrap();
        let quote = module.random(GUILD, None).unwrap();
        module.remove(GUILD, quote.id).unwrap();
        assert!(module.random(GUILD, None).is_err());
    }
}
