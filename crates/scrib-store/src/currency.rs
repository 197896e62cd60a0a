//! Guild currencies, balances, and redemptions.
//!
//! Currency names are matched case-insensitively by storing them lowercased.
//! Transfers and purchases reject overdrafts, leaving balances untouched.

use rusqlite::{Connection, OptionalExtension, Row};
use scrib_core::UserId;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Price {
    pub id: i64,
    pub redemption_id: i64,
    pub currency_id: i64,
    pub amount: i64,
}

fn row_to_currency(row: &Row<'_>) -> rusqlite::Result<Currency> {
    Ok(Currency {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn row_to_redemption(row: &Row<'_>) -> rusqlite::Result<Redemption> {
    Ok(Redemption {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn row_to_price(row: &Row<'_>) -> rusqlite::Result<Price> {
    Ok(Price {
        id: row.get(0)?,
        redemption_id: row.get(1)?,
        currency_id: row.get(2)?,
        amount: row.get(3)?,
    })
}

/// Create a new currency. Names are unique, case-insensitive.
pub fn mint(conn: &Connection, name: &str, description: &str) -> Result<Currency> {
    let name = name.to_lowercase();
    if find_currency(conn, &name)?.is_some() {
        return Err(StoreError::Constraint(format!(
            "currency \"{name}\" already exists"
        )));
    }
    conn.execute(
        "INSERT INTO currencies (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description],
    )?;
    Ok(Currency {
        id: conn.last_insert_rowid(),
        name,
        description: description.to_string(),
    })
}

pub fn find_currency(conn: &Connection, name: &str) -> Result<Option<Currency>> {
    let currency = conn
        .query_row(
            "SELECT id, name, description FROM currencies WHERE name = ?1",
            [name.to_lowercase()],
            row_to_currency,
        )
        .optional()?;
    Ok(currency)
}

pub fn list_currencies(conn: &Connection) -> Result<Vec<Currency>> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM currencies ORDER BY id")?;
    let rows = stmt.query_map([], row_to_currency)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// A user's balance in one currency; zero when no row exists yet.
pub fn balance(conn: &Connection, user: UserId, currency_id: i64) -> Result<i64> {
    let amount = conn
        .query_row(
            "SELECT amount FROM balances WHERE user_id = ?1 AND currency_id = ?2",
            rusqlite::params![user.to_string(), currency_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(amount.unwrap_or(0))
}

/// Increase a user's balance (admin grant). Creates the balance row on
/// first grant.
pub fn grant(conn: &Connection, user: UserId, currency_id: i64, amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(StoreError::Constraint(format!(
            "grant amount must be positive (got {amount})"
        )));
    }
    adjust(conn, user, currency_id, amount)
}

/// Transfer between users. Rejects the transfer when the sender cannot
/// cover it; neither balance changes on rejection.
pub fn give(
    conn: &Connection,
    from: UserId,
    to: UserId,
    currency_id: i64,
    amount: i64,
) -> Result<()> {
    if amount <= 0 {
        return Err(StoreError::Constraint(format!(
            "transfer amount must be positive (got {amount})"
        )));
    }
    let available = balance(conn, from, currency_id)?;
    if available < amount {
        return Err(StoreError::Constraint(format!(
            "insufficient funds: balance {available}, tried to give {amount}"
        )));
    }
    adjust(conn, from, currency_id, -amount)?;
    adjust(conn, to, currency_id, amount)?;
    Ok(())
}

fn adjust(conn: &Connection, user: UserId, currency_id: i64, delta: i64) -> Result<i64> {
    let updated = conn.execute(
        "UPDATE balances SET amount = amount + ?3 WHERE user_id = ?1 AND currency_id = ?2",
        rusqlite::params![user.to_string(), currency_id, delta],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO balances (user_id, currency_id, amount) VALUES (?1, ?2, ?3)",
            rusqlite::params![user.to_string(), currency_id, delta],
        )?;
    }
    balance(conn, user, currency_id)
}

/// Define a redeemable reward. Names are unique, case-insensitive.
pub fn add_redemption(conn: &Connection, name: &str, description: &str) -> Result<Redemption> {
    let name = name.to_lowercase();
    if find_redemption(conn, &name)?.is_some() {
        return Err(StoreError::Constraint(format!(
            "redemption \"{name}\" already exists"
        )));
    }
    conn.execute(
        "INSERT INTO redemptions (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description],
    )?;
    Ok(Redemption {
        id: conn.last_insert_rowid(),
        name,
        description: description.to_string(),
    })
}

pub fn find_redemption(conn: &Connection, name: &str) -> Result<Option<Redemption>> {
    let redemption = conn
        .query_row(
            "SELECT id, name, description FROM redemptions WHERE name = ?1",
            [name.to_lowercase()],
            row_to_redemption,
        )
        .optional()?;
    Ok(redemption)
}

/// Set what a redemption costs in one currency (upsert). A redemption may
/// carry prices in several currencies; earlier-defined prices take priority
/// when redeeming.
pub fn set_price(
    conn: &Connection,
    redemption_id: i64,
    currency_id: i64,
    amount: i64,
) -> Result<()> {
    if amount <= 0 {
        return Err(StoreError::Constraint(format!(
            "price must be positive (got {amount})"
        )));
    }
    let updated = conn.execute(
        "UPDATE prices SET amount = ?3 WHERE redemption_id = ?1 AND currency_id = ?2",
        rusqlite::params![redemption_id, currency_id, amount],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO prices (redemption_id, currency_id, amount) VALUES (?1, ?2, ?3)",
            rusqlite::params![redemption_id, currency_id, amount],
        )?;
    }
    Ok(())
}

pub fn prices_for(conn: &Connection, redemption_id: i64) -> Result<Vec<Price>> {
    let mut stmt = conn.prepare(
        "SELECT id, redemption_id, currency_id, amount FROM prices
         WHERE redemption_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([redemption_id], row_to_price)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Redeem a reward by name: the first price (priority order) the user can
/// afford is charged. Unknown names surface `NotFound`; an unaffordable
/// reward surfaces `Constraint` with the shortfall explained.
pub fn redeem(conn: &Connection, user: UserId, redemption_name: &str) -> Result<Price> {
    let redemption =
        find_redemption(conn, redemption_name)?.ok_or_else(|| StoreError::NotFound {
            entity: "redemption",
            id: redemption_name.to_string(),
        })?;
    let prices = prices_for(conn, redemption.id)?;
    if prices.is_empty() {
        return Err(StoreError::Constraint(format!(
            "redemption \"{}\" has no price set",
            redemption.name
        )));
    }
    for price in &prices {
        if balance(conn, user, price.currency_id)? >= price.amount {
            adjust(conn, user, price.currency_id, -price.amount)?;
            return Ok(*price);
        }
    }
    Err(StoreError::Constraint(format!(
        "cannot afford \"{}\" with any currency",
        redemption.name
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn mint_is_case_insensitive_unique() {
        let conn = conn();
        mint(&conn, "Gold", "shiny").unwrap();
        let err = mint(&conn, "GOLD", "also shiny").unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert!(find_currency(&conn, "gOlD").unwrap().is_some());
    }

    #[test]
    fn grant_and_balance() {
        let conn = conn();
        let gold = mint(&conn, "gold", "").unwrap();
        assert_eq!(balance(&conn, UserId(1), gold.id).unwrap(), 0);
        assert_eq!(grant(&conn, UserId(1), gold.id, 50).unwrap(), 50);
        assert_eq!(grant(&conn, UserId(1), gold.id, 25).unwrap(), 75);
    }

    #[test]
    fn give_rejects_overdraft_without_side_effects() {
        let conn = conn();
        let gold = mint(&conn, "gold", "").unwrap();
        grant(&conn, UserId(1), gold.id, 30).unwrap();

        let err = give(&conn, UserId(1), UserId(2), gold.id, 31).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(balance(&conn, UserId(1), gold.id).unwrap(), 30);
        assert_eq!(balance(&conn, UserId(2), gold.id).unwrap(), 0);

        give(&conn, UserId(1), UserId(2), gold.id, 30).unwrap();
        assert_eq!(balance(&conn, UserId(1), gold.id).unwrap(), 0);
        assert_eq!(balance(&conn, UserId(2), gold.id).unwrap(), 30);
    }

    #[test]
    fn redeem_charges_first_affordable_price() {
        let conn = conn();
        let gold = mint(&conn, "gold", "").unwrap();
        let gems = mint(&conn, "gems", "").unwrap();
        let prize = add_redemption(&conn, "sticker", "a nice sticker").unwrap();
        set_price(&conn, prize.id, gold.id, 100).unwrap();
        set_price(&conn, prize.id, gems.id, 5).unwrap();

        // Can't afford gold, can afford gems — falls through to gems.
        grant(&conn, UserId(1), gems.id, 7).unwrap();
        let charged = redeem(&conn, UserId(1), "Sticker").unwrap();
        assert_eq!(charged.currency_id, gems.id);
        assert_eq!(balance(&conn, UserId(1), gems.id).unwrap(), 2);
    }

    #[test]
    fn redeem_unknown_and_unaffordable() {
        let conn = conn();
        let gold = mint(&conn, "gold", "").unwrap();
        let prize = add_redemption(&conn, "mug", "").unwrap();
        set_price(&conn, prize.id, gold.id, 10).unwrap();

        assert!(matches!(
            redeem(&conn, UserId(1), "ghost").unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            redeem(&conn, UserId(1), "mug").unwrap_err(),
            StoreError::Constraint(_)
        ));
    }
}
