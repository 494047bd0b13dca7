use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::TransactionRow;

const TRANSACTION_COLUMNS: &str = "id, stripe_event_id, payment_intent_id, application_id, \
     campaign_id, brand_id, creator_id, amount, currency, status, created_at";

pub struct NewTransaction<'a> {
    pub id: &'a str,
    pub stripe_event_id: &'a str,
    pub payment_intent_id: &'a str,
    pub application_id: Option<&'a str>,
    pub campaign_id: Option<&'a str>,
    pub brand_id: Option<&'a str>,
    pub creator_id: &'a str,
    pub amount: i64,
    pub currency: &'a str,
}

impl Database {
    // -- Transactions --

    /// Insert a held transaction. A replayed webhook event hits the
    /// UNIQUE stripe_event_id and fails with a constraint violation,
    /// which the webhook handler treats as "already recorded".
    pub fn create_transaction(&self, t: &NewTransaction<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO transactions (id, stripe_event_id, payment_intent_id,
                     application_id, campaign_id, brand_id, creator_id, amount, currency, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'held')",
                rusqlite::params![
                    t.id,
                    t.stripe_event_id,
                    t.payment_intent_id,
                    t.application_id,
                    t.campaign_id,
                    t.brand_id,
                    t.creator_id,
                    t.amount,
                    t.currency,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_transaction(&self, id: &str) -> Result<Option<TransactionRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_transaction).optional()?;
            Ok(row)
        })
    }

    pub fn set_transaction_status(&self, id: &str, status: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE transactions SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(())
        })
    }

    /// A creator's incoming or a brand's outgoing transactions.
    pub fn list_transactions_for_user(&self, user_id: &str, as_brand: bool) -> Result<Vec<TransactionRow>> {
        self.with_conn(|conn| {
            let column = if as_brand { "brand_id" } else { "creator_id" };
            let sql = format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions
                 WHERE {column} = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Sum of amounts in a given status for a user, on either side.
    pub fn sum_transactions(&self, user_id: &str, as_brand: bool, status: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let column = if as_brand { "brand_id" } else { "creator_id" };
            let sql = format!(
                "SELECT COALESCE(SUM(amount), 0) FROM transactions
                 WHERE {column} = ?1 AND status = ?2"
            );
            let total = conn.query_row(&sql, rusqlite::params![user_id, status], |row| row.get(0))?;
            Ok(total)
        })
    }

    /// Platform-wide volume and count.
    pub fn transaction_totals(&self) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let totals = conn.query_row(
                "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM transactions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(totals)
        })
    }
}

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok(TransactionRow {
        id: row.get(0)?,
        stripe_event_id: row.get(1)?,
        payment_intent_id: row.get(2)?,
        application_id: row.get(3)?,
        campaign_id: row.get(4)?,
        brand_id: row.get(5)?,
        creator_id: row.get(6)?,
        amount: row.get(7)?,
        currency: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
    })
}
