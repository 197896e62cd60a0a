//! Currency module: guild-defined currencies, balances, and redeemable
//! rewards. Unlike the timer-driven modules, this one owns no scheduled
//! jobs; the enabled flag gates the commands themselves.

use std::sync::Arc;

use scrib_core::{GuildId, UserId};
use scrib_store::currency::{self, Currency, Redemption};
use scrib_store::{options, StoreManager};

use crate::error::{ModuleError, Result};

pub const OPT_ENABLED: &str = "currency_module_enabled";

pub struct CurrencyModule {
    stores: Arc<StoreManager>,
}

impl CurrencyModule {
    pub fn new(stores: Arc<StoreManager>) -> Arc<Self> {
        Arc::new(Self { stores })
    }

    pub fn enable(self: &Arc<Self>, guild: GuildId) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| options::set(conn, OPT_ENABLED, "true"))?;
        Ok("Currency module enabled".to_string())
    }

    pub fn disable(self: &Arc<Self>, guild: GuildId) -> Result<String> {
        self.stores
            .with_guild(guild, |conn| options::set(conn, OPT_ENABLED, "false"))?;
        Ok("Currency module disabled".to_string())
    }

    pub fn mint(self: &Arc<Self>, guild: GuildId, name: &str, description: &str) -> Result<Currency> {
        self.require_enabled(guild)?;
        Ok(self
            .stores
            .with_guild(guild, |conn| currency::mint(conn, name, description))?)
    }

    pub fn list(self: &Arc<Self>, guild: GuildId) -> Result<Vec<Currency>> {
        self.require_enabled(guild)?;
        Ok(self.stores.with_guild(guild, currency::list_currencies)?)
    }

    pub fn balance(self: &Arc<Self>, guild: GuildId, user: UserId, currency_name: &str) -> Result<i64> {
        self.require_enabled(guild)?;
        self.stores.with_guild(guild, |conn| {
            let c = self.find(conn, currency_name)?;
            Ok(currency::balance(conn, user, c.id)?)
        })
    }

    /// Admin grant: create money out of thin air for a member.
    pub fn grant(
        self: &Arc<Self>,
        guild: GuildId,
        user: UserId,
        currency_name: &str,
        amount: i64,
    ) -> Result<String> {
        self.require_enabled(guild)?;
        let total = self.stores.with_guild(guild, |conn| {
            let c = self.find(conn, currency_name)?;
            Ok::<_, ModuleError>(currency::grant(conn, user, c.id, amount)?)
        })?;
        Ok(format!("Granted {amount} {currency_name}; balance is now {total}"))
    }

    /// Member-to-member transfer; overdrafts are rejected untouched.
    pub fn give(
        self: &Arc<Self>,
        guild: GuildId,
        from: UserId,
        to: UserId,
        currency_name: &str,
        amount: i64,
    ) -> Result<String> {
        self.require_enabled(guild)?;
        self.stores.with_guild(guild, |conn| {
            let c = self.find(conn, currency_name)?;
            Ok::<_, ModuleError>(currency::give(conn, from, to, c.id, amount)?)
        })?;
        Ok(format!("Gave {amount} {currency_name} to user {to}"))
    }

    pub fn add_redemption(
        self: &Arc<Self>,
        guild: GuildId,
        name: &str,
        description: &str,
    ) -> Result<Redemption> {
        self.require_enabled(guild)?;
        Ok(self
            .stores
            .with_guild(guild, |conn| currency::add_redemption(conn, name, description))?)
    }

    pub fn set_price(
        self: &Arc<Self>,
        guild: GuildId,
        redemption_name: &str,
        currency_name: &str,
        amount: i64,
    ) -> Result<String> {
        self.require_enabled(guild)?;
        self.stores.with_guild(guild, |conn| {
            let c = self.find(conn, currency_name)?;
            let r = currency::find_redemption(conn, redemption_name)?.ok_or_else(|| {
                ModuleError::Rejected(format!("No redemption named \"{redemption_name}\""))
            })?;
            currency::set_price(conn, r.id, c.id, amount)?;
            Ok::<_, ModuleError>(())
        })?;
        Ok(format!("\"{redemption_name}\" now costs {amount} {currency_name}"))
    }

    /// Buy a reward; the first affordable price (in priority order) is
    /// charged.
    pub fn buy(self: &Arc<Self>, guild: GuildId, user: UserId, redemption_name: &str) -> Result<String> {
        self.require_enabled(guild)?;
        let price = self
            .stores
            .with_guild(guild, |conn| currency::redeem(conn, user, redemption_name))?;
        Ok(format!(
            "Redeemed \"{redemption_name}\" for {} (currency id {})",
            price.amount, price.currency_id
        ))
    }

    fn require_enabled(&self, guild: GuildId) -> Result<()> {
        let enabled = self
            .stores
            .with_guild(guild, |conn| options::get_flag(conn, OPT_ENABLED))?;
        if enabled {
            Ok(())
        } else {
            Err(ModuleError::Rejected(
                "The currency module is not enabled on this server".to_string(),
            ))
        }
    }

    fn find(&self, conn: &rusqlite::Connection, name: &str) -> Result<Currency> {
        currency::find_currency(conn, name)?
            .ok_or_else(|| ModuleError::Rejected(format!("No currency named \"{name}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Arc<CurrencyModule>) {
        let dir = tempfile::tempdir().unwrap();
        let stores = Arc::new(StoreManager::new(dir.path()).unwrap());
        (dir, CurrencyModule::new(stores))
    }

    const GUILD: GuildId = GuildId(400);

    #[test]
    fn commands_require_the_module_enabled() {
        let (_dir, module) = setup();
        assert!(matches!(
            module.mint(GUILD, "gold", "").unwrap_err(),
            ModuleError::Rejected(_)
        ));
        module.enable(GUILD).unwrap();
        module.mint(GUILD, "gold", "").unwrap();
    }

    #[test]
    fn grant_give_and_balance_flow() {
        let (_dir, module) = setup();
        module.enable(GUILD).unwrap();
        module.mint(GUILD, "gold", "shiny").unwrap();

        module.grant(GUILD, UserId(1), "gold", 100).unwrap();
        module.give(GUILD, UserId(1), UserId(2), "gold", 40).unwrap();

        assert_eq!(module.balance(GUILD, UserId(1), "gold").unwrap(), 60);
        assert_eq!(module.balance(GUILD, UserId(2), "gold").unwrap(), 40);

        let overdraft = module.give(GUILD, UserId(2), UserId(1), "gold", 41);
        assert!(overdraft.is_err());
        assert_eq!(module.balance(GUILD, UserId(2), "gold").unwrap(), 40);
    }

    #[test]
    fn buy_charges_a_priced_redemption() {
        let (_dir, module) = setup();
        module.enable(GUILD).unwrap();
        module.mint(GUILD, "gold", "").unwrap();
        module.add_redemption(GUILD, "sticker", "").unwrap();
        module.set_price(GUILD, "sticker", "gold", 25).unwrap();
        module.grant(GUILD, UserId(1), "gold", 30).unwrap();

        module.buy(GUILD, UserId(1), "sticker").unwrap();
        assert_eq!(module.balance(GUILD, UserId(1), "gold").unwrap(), 5);
        assert!(module.buy(GUILD, UserId(1), "sticker").is_err());
    }

    #[test]
    fn unknown_names_are_reported() {
        let (_dir, module) = setup();
        module.enable(GUILD).unwrap();
        assert!(module.balance(GUILD, UserId(1), "ghost").is_err());
        assert!(module.buy(GUILD, UserId(1), "ghost").is_err());
    }
}
