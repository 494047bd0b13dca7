use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{PackageRow, PortfolioItemRow};

pub struct NewPackage {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: i64,
    pub deliverables: String,
}

impl Database {
    // -- Portfolio items --

    pub fn create_portfolio_item(
        &self,
        id: &str,
        creator_id: &str,
        title: &str,
        description: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO portfolio_items (id, creator_id, title, description, media_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, creator_id, title, description, media_url],
            )?;
            Ok(())
        })
    }

    pub fn get_portfolio_item(&self, id: &str) -> Result<Option<PortfolioItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, creator_id, title, description, media_url, created_at
                 FROM portfolio_items WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_item).optional()?;
            Ok(row)
        })
    }

    pub fn list_portfolio_items(&self, creator_id: &str) -> Result<Vec<PortfolioItemRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, creator_id, title, description, media_url, created_at
                 FROM portfolio_items WHERE creator_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([creator_id], map_item)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_portfolio_item(
        &self,
        id: &str,
        title: &str,
        description: Option<&str>,
        media_url: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE portfolio_items SET title = ?2, description = ?3, media_url = ?4
                 WHERE id = ?1",
                rusqlite::params![id, title, description, media_url],
            )?;
            Ok(())
        })
    }

    pub fn delete_portfolio_item(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM portfolio_items WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn count_portfolio_items(&self, creator_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM portfolio_items WHERE creator_id = ?1",
                [creator_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    // -- Packages --

    pub fn list_packages(&self, creator_id: &str) -> Result<Vec<PackageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, creator_id, title, description, price, deliverables, created_at
                 FROM packages WHERE creator_id = ?1 ORDER BY price ASC",
            )?;
            let rows = stmt
                .query_map([creator_id], map_package)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replace a creator's whole package list. Delete and inserts run in
    /// one transaction, so a failure leaves the previous list intact.
    pub fn replace_packages(&self, creator_id: &str, packages: &[NewPackage]) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM packages WHERE creator_id = ?1", [creator_id])?;
            for p in packages {
                tx.execute(
                    "INSERT INTO packages (id, creator_id, title, description, price, deliverables)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![p.id, creator_id, p.title, p.description, p.price, p.deliverables],
                )?;
            }
            Ok(())
        })
    }
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<PortfolioItemRow> {
    Ok(PortfolioItemRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        media_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_package(row: &Row<'_>) -> rusqlite::Result<PackageRow> {
    Ok(PackageRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        deliverables: row.get(5)?,
        created_at: row.get(6)?,
    })
}
