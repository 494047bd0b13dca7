use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{CampaignRow, StatusCountRow};

// brand_name comes from a JOIN, applications_count from a correlated
// subquery — derived on read, never stored.
const CAMPAIGN_SELECT: &str = "SELECT c.id, c.brand_id, u.full_name, c.title, c.description, \
     c.category, c.campaign_types, c.budget_min, c.budget_max, c.deadline, \
     c.target_audience, c.deliverables, c.status, c.estimated_reach, \
     (SELECT COUNT(*) FROM campaign_applications a WHERE a.campaign_id = c.id), \
     c.created_at \
     FROM campaigns c JOIN users u ON c.brand_id = u.id";

pub struct NewCampaign<'a> {
    pub id: &'a str,
    pub brand_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub campaign_types: &'a str,
    pub budget_min: i64,
    pub budget_max: i64,
    pub deadline: &'a str,
    pub target_audience: &'a str,
    pub deliverables: &'a str,
    pub status: &'a str,
    pub estimated_reach: i64,
}

#[derive(Default)]
pub struct CampaignPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub campaign_types: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub deadline: Option<String>,
    pub target_audience: Option<String>,
    pub deliverables: Option<String>,
}

#[derive(Default)]
pub struct CampaignFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_budget: Option<i64>,
    pub max_budget: Option<i64>,
    /// None lists active campaigns only (the public view).
    pub status: Option<String>,
    pub brand_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Database {
    // -- Campaigns --

    pub fn create_campaign(&self, c: &NewCampaign<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO campaigns (id, brand_id, title, description, category,
                     campaign_types, budget_min, budget_max, deadline, target_audience,
                     deliverables, status, estimated_reach)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    c.id,
                    c.brand_id,
                    c.title,
                    c.description,
                    c.category,
                    c.campaign_types,
                    c.budget_min,
                    c.budget_max,
                    c.deadline,
                    c.target_audience,
                    c.deliverables,
                    c.status,
                    c.estimated_reach,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_campaign(&self, id: &str) -> Result<Option<CampaignRow>> {
        self.with_conn(|conn| {
            let sql = format!("{CAMPAIGN_SELECT} WHERE c.id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_campaign).optional()?;
            Ok(row)
        })
    }

    pub fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<CampaignRow>> {
        self.with_conn(|conn| query_campaigns(conn, filter))
    }

    pub fn update_campaign(&self, id: &str, patch: &CampaignPatch) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE campaigns SET
                     title           = COALESCE(?2, title),
                     description     = COALESCE(?3, description),
                     category        = COALESCE(?4, category),
                     campaign_types  = COALESCE(?5, campaign_types),
                     budget_min      = COALESCE(?6, budget_min),
                     budget_max      = COALESCE(?7, budget_max),
                     deadline        = COALESCE(?8, deadline),
                     target_audience = COALESCE(?9, target_audience),
                     deliverables    = COALESCE(?10, deliverables),
                     updated_at      = datetime('now')
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.title,
                    patch.description,
                    patch.category,
                    patch.campaign_types,
                    patch.budget_min,
                    patch.budget_max,
                    patch.deadline,
                    patch.target_audience,
                    patch.deliverables,
                ],
            )?;
            Ok(())
        })
    }

    pub fn set_campaign_status(&self, id: &str, status: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE campaigns SET status = ?2, updated_at = datetime('now') WHERE id = ?1",
                rusqlite::params![id, status],
            )?;
            Ok(())
        })
    }

    pub fn delete_campaign(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM campaigns WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn count_campaigns_by_status(&self, brand_id: Option<&str>) -> Result<Vec<StatusCountRow>> {
        self.with_conn(|conn| {
            let (sql, params) = match brand_id {
                Some(id) => (
                    "SELECT status, COUNT(*) FROM campaigns WHERE brand_id = ?1 GROUP BY status",
                    vec![id.to_string()],
                ),
                None => ("SELECT status, COUNT(*) FROM campaigns GROUP BY status", vec![]),
            };
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok(StatusCountRow {
                        status: row.get(0)?,
                        count: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_campaigns(conn: &Connection, filter: &CampaignFilter) -> Result<Vec<CampaignRow>> {
    let mut sql = format!("{CAMPAIGN_SELECT} WHERE 1=1");
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    match (&filter.status, &filter.brand_id) {
        (Some(status), _) => {
            params.push(Box::new(status.clone()));
            sql.push_str(&format!(" AND c.status = ?{}", params.len()));
        }
        // Brand listing shows all of their campaigns regardless of status
        (None, Some(_)) => {}
        (None, None) => sql.push_str(" AND c.status = 'active'"),
    }
    if let Some(brand_id) = &filter.brand_id {
        params.push(Box::new(brand_id.clone()));
        sql.push_str(&format!(" AND c.brand_id = ?{}", params.len()));
    }
    if let Some(q) = &filter.q {
        params.push(Box::new(format!("%{q}%")));
        let i = params.len();
        sql.push_str(&format!(" AND (c.title LIKE ?{i} OR c.description LIKE ?{i})"));
    }
    if let Some(category) = &filter.category {
        params.push(Box::new(category.clone()));
        sql.push_str(&format!(" AND c.category = ?{}", params.len()));
    }
    if let Some(min) = filter.min_budget {
        params.push(Box::new(min));
        sql.push_str(&format!(" AND c.budget_max >= ?{}", params.len()));
    }
    if let Some(max) = filter.max_budget {
        params.push(Box::new(max));
        sql.push_str(&format!(" AND c.budget_min <= ?{}", params.len()));
    }

    params.push(Box::new(filter.limit as i64));
    sql.push_str(&format!(" ORDER BY c.created_at DESC LIMIT ?{}", params.len()));
    params.push(Box::new(filter.offset as i64));
    sql.push_str(&format!(" OFFSET ?{}", params.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), map_campaign)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_campaign(row: &Row<'_>) -> rusqlite::Result<CampaignRow> {
    Ok(CampaignRow {
        id: row.get(0)?,
        brand_id: row.get(1)?,
        brand_name: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        category: row.get(5)?,
        campaign_types: row.get(6)?,
        budget_min: row.get(7)?,
        budget_max: row.get(8)?,
        deadline: row.get(9)?,
        target_audience: row.get(10)?,
        deliverables: row.get(11)?,
        status: row.get(12)?,
        estimated_reach: row.get(13)?,
        applications_count: row.get(14)?,
        created_at: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::NewUser;

    fn db_with_brand() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&NewUser {
            id: "b1",
            email: "brand@example.com",
            password_hash: Some("hash"),
            full_name: "Barakah Foods",
            user_type: "brand",
            email_verified: true,
        })
        .unwrap();
        db
    }

    fn insert_campaign(db: &Database, id: &str, status: &str) {
        db.create_campaign(&NewCampaign {
            id,
            brand_id: "b1",
            title: "Ramadan Recipe Collection",
            description: "Share your best iftar recipes",
            category: "food",
            campaign_types: r#"["sponsored_post"]"#,
            budget_min: 500,
            budget_max: 2000,
            deadline: "2026-10-01",
            target_audience: r#"["families","foodies"]"#,
            deliverables: r#"["1 reel","2 stories"]"#,
            status,
            estimated_reach: 50_000,
        })
        .unwrap();
    }

    #[test]
    fn get_campaign_joins_brand_and_counts_applications() {
        let db = db_with_brand();
        insert_campaign(&db, "camp1", "active");

        let row = db.get_campaign("camp1").unwrap().unwrap();
        assert_eq!(row.brand_name, "Barakah Foods");
        assert_eq!(row.applications_count, 0);
        assert!(db.get_campaign("nope").unwrap().is_none());
    }

    #[test]
    fn public_listing_shows_only_active() {
        let db = db_with_brand();
        insert_campaign(&db, "camp1", "active");
        insert_campaign(&db, "camp2", "draft");
        insert_campaign(&db, "camp3", "cancelled");

        let rows = db
            .list_campaigns(&CampaignFilter { limit: 20, ..Default::default() })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "camp1");

        // Brand view includes drafts
        let mine = db
            .list_campaigns(&CampaignFilter {
                brand_id: Some("b1".into()),
                limit: 20,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(mine.len(), 3);
    }

    #[test]
    fn budget_filters_overlap_ranges() {
        let db = db_with_brand();
        insert_campaign(&db, "camp1", "active");

        let hit = db
            .list_campaigns(&CampaignFilter {
                min_budget: Some(1000),
                max_budget: Some(3000),
                limit: 20,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = db
            .list_campaigns(&CampaignFilter {
                min_budget: Some(5000),
                limit: 20,
                ..Default::default()
            })
            .unwrap();
        assert!(miss.is_empty());
    }
}
