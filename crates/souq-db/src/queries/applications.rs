use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{ApplicationRow, StatusCountRow};

const APPLICATION_SELECT: &str = "SELECT a.id, a.campaign_id, c.title, a.creator_id, u.full_name, \
     a.proposal, a.price, a.timeline, a.status, a.created_at \
     FROM campaign_applications a \
     JOIN campaigns c ON a.campaign_id = c.id \
     JOIN users u ON a.creator_id = u.id";

pub struct NewApplication<'a> {
    pub id: &'a str,
    pub campaign_id: &'a str,
    pub creator_id: &'a str,
    pub proposal: &'a str,
    pub price: i64,
    pub timeline: &'a str,
}

impl Database {
    // -- Applications --

    /// Fails with a UNIQUE violation when the creator already applied to
    /// this campaign; callers map that to a conflict.
    pub fn create_application(&self, a: &NewApplication<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO campaign_applications
                     (id, campaign_id, creator_id, proposal, price, timeline)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![a.id, a.campaign_id, a.creator_id, a.proposal, a.price, a.timeline],
            )?;
            Ok(())
        })
    }

    pub fn get_application(&self, id: &str) -> Result<Option<ApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{APPLICATION_SELECT} WHERE a.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_application).optional()?;
            Ok(row)
        })
    }

    pub fn list_applications_for_campaign(&self, campaign_id: &str) -> Result<Vec<ApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{APPLICATION_SELECT} WHERE a.campaign_id = ?1 ORDER BY a.created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([campaign_id], map_application)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_applications_for_creator(&self, creator_id: &str) -> Result<Vec<ApplicationRow>> {
        self.with_conn(|conn| {
            let sql = format!("{APPLICATION_SELECT} WHERE a.creator_id = ?1 ORDER BY a.created_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([creator_id], map_application)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_application_status(&self, id: &str, status: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE campaign_applications SET status = ?2 WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(())
        })
    }

    pub fn count_applications_by_status(&self, creator_id: &str) -> Result<Vec<StatusCountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM campaign_applications
                 WHERE creator_id = ?1 GROUP BY status",
            )?;
            let rows = stmt
                .query_map([creator_id], |row| {
                    Ok(StatusCountRow {
                        status: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// (total, pending) across all of a brand's campaigns.
    pub fn count_applications_for_brand(&self, brand_id: &str) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(a.status = 'pending'), 0)
                 FROM campaign_applications a
                 JOIN campaigns c ON a.campaign_id = c.id
                 WHERE c.brand_id = ?1",
                [brand_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(counts)
        })
    }
}

fn map_application(row: &Row<'_>) -> rusqlite::Result<ApplicationRow> {
    Ok(ApplicationRow {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        campaign_title: row.get(2)?,
        creator_id: row.get(3)?,
        creator_name: row.get(4)?,
        proposal: row.get(5)?,
        price: row.get(6)?,
        timeline: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}
