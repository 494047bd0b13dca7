use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{StatusCountRow, UserRow};

const USER_COLUMNS: &str = "id, email, password, full_name, user_type, email_verified, \
     is_active, bio, location, niche, platforms, followers, price_min, price_max, \
     avatar_url, created_at";

pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: Option<&'a str>,
    pub full_name: &'a str,
    pub user_type: &'a str,
    pub email_verified: bool,
}

/// Profile fields updatable by the owner. `None` leaves the column as is.
#[derive(Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub niche: Option<String>,
    pub platforms: Option<String>,
    pub followers: Option<i64>,
    pub price_min: Option<i64>,
    pub price_max: Option<i64>,
    pub avatar_url: Option<String>,
}

/// Filters for the creator search endpoint.
#[derive(Default)]
pub struct CreatorFilter {
    pub q: Option<String>,
    pub niche: Option<String>,
    pub platform: Option<String>,
    pub min_followers: Option<i64>,
    pub max_price: Option<i64>,
    pub limit: u32,
    pub offset: u32,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, full_name, user_type, email_verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.password_hash,
                    user.full_name,
                    user.user_type,
                    user.email_verified,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([email], map_user).optional()?;
            Ok(row)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_user).optional()?;
            Ok(row)
        })
    }

    pub fn mark_email_verified(&self, email: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET email_verified = 1 WHERE email = ?1",
                [email],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE email = ?1",
                rusqlite::params![email, password_hash],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_user_active(&self, id: &str, active: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_active = ?2 WHERE id = ?1",
                rusqlite::params![id, active],
            )?;
            Ok(n > 0)
        })
    }

    pub fn update_profile(&self, id: &str, patch: &ProfilePatch) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET
                     full_name  = COALESCE(?2, full_name),
                     bio        = COALESCE(?3, bio),
                     location   = COALESCE(?4, location),
                     niche      = COALESCE(?5, niche),
                     platforms  = COALESCE(?6, platforms),
                     followers  = COALESCE(?7, followers),
                     price_min  = COALESCE(?8, price_min),
                     price_max  = COALESCE(?9, price_max),
                     avatar_url = COALESCE(?10, avatar_url)
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    patch.full_name,
                    patch.bio,
                    patch.location,
                    patch.niche,
                    patch.platforms,
                    patch.followers,
                    patch.price_min,
                    patch.price_max,
                    patch.avatar_url,
                ],
            )?;
            Ok(())
        })
    }

    /// Search active, verified creators. The platform filter matches the
    /// JSON platforms column with a LIKE on the quoted element.
    pub fn search_creators(&self, filter: &CreatorFilter) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_creators(conn, filter))
    }

    /// Admin listing: any user type, inactive included.
    pub fn list_users(&self, user_type: Option<&str>, q: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1");
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(t) = user_type {
                params.push(Box::new(t.to_string()));
                sql.push_str(&format!(" AND user_type = ?{}", params.len()));
            }
            if let Some(q) = q {
                params.push(Box::new(format!("%{q}%")));
                let i = params.len();
                sql.push_str(&format!(" AND (email LIKE ?{i} OR full_name LIKE ?{i})"));
            }
            sql.push_str(" ORDER BY created_at DESC LIMIT 200");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users_by_type(&self) -> Result<Vec<StatusCountRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT user_type, COUNT(*) FROM users GROUP BY user_type")?;
            let rows = stmt
                .query_map([], |row| {
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

fn query_creators(conn: &Connection, filter: &CreatorFilter) -> Result<Vec<UserRow>> {
    let mut sql = format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE user_type = 'creator' AND is_active = 1 AND email_verified = 1"
    );
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(q) = &filter.q {
        params.push(Box::new(format!("%{q}%")));
        let i = params.len();
        sql.push_str(&format!(
            " AND (full_name LIKE ?{i} OR bio LIKE ?{i} OR niche LIKE ?{i})"
        ));
    }
    if let Some(niche) = &filter.niche {
        params.push(Box::new(niche.clone()));
        sql.push_str(&format!(" AND niche = ?{}", params.len()));
    }
    if let Some(platform) = &filter.platform {
        // platforms is a JSON array of strings, e.g. ["instagram","youtube"]
        params.push(Box::new(format!("%\"{platform}\"%")));
        sql.push_str(&format!(" AND platforms LIKE ?{}", params.len()));
    }
    if let Some(min) = filter.min_followers {
        params.push(Box::new(min));
        sql.push_str(&format!(" AND followers >= ?{}", params.len()));
    }
    if let Some(max) = filter.max_price {
        params.push(Box::new(max));
        sql.push_str(&format!(" AND price_min <= ?{}", params.len()));
    }

    params.push(Box::new(filter.limit as i64));
    sql.push_str(&format!(" ORDER BY followers DESC LIMIT ?{}", params.len()));
    params.push(Box::new(filter.offset as i64));
    sql.push_str(&format!(" OFFSET ?{}", params.len()));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        full_name: row.get(3)?,
        user_type: row.get(4)?,
        email_verified: row.get(5)?,
        is_active: row.get(6)?,
        bio: row.get(7)?,
        location: row.get(8)?,
        niche: row.get(9)?,
        platforms: row.get(10)?,
        followers: row.get(11)?,
        price_min: row.get(12)?,
        price_max: row.get(13)?,
        avatar_url: row.get(14)?,
        created_at: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::is_unique_violation;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn insert_user(db: &Database, id: &str, email: &str, user_type: &str) {
        db.create_user(&NewUser {
            id,
            email,
            password_hash: Some("hash"),
            full_name: "Test User",
            user_type,
            email_verified: true,
        })
        .unwrap();
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = db();
        insert_user(&db, "u1", "a@example.com", "creator");

        let err = db
            .create_user(&NewUser {
                id: "u2",
                email: "a@example.com",
                password_hash: Some("hash"),
                full_name: "Other",
                user_type: "brand",
                email_verified: false,
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn email_verification_flip() {
        let db = db();
        db.create_user(&NewUser {
            id: "u1",
            email: "a@example.com",
            password_hash: Some("hash"),
            full_name: "Test",
            user_type: "creator",
            email_verified: false,
        })
        .unwrap();

        assert!(!db.get_user_by_email("a@example.com").unwrap().unwrap().email_verified);
        assert!(db.mark_email_verified("a@example.com").unwrap());
        assert!(db.get_user_by_email("a@example.com").unwrap().unwrap().email_verified);
        assert!(!db.mark_email_verified("missing@example.com").unwrap());
    }

    #[test]
    fn profile_patch_leaves_absent_fields() {
        let db = db();
        insert_user(&db, "u1", "a@example.com", "creator");

        db.update_profile(
            "u1",
            &ProfilePatch {
                bio: Some("halal food reviews".into()),
                followers: Some(12_000),
                ..Default::default()
            },
        )
        .unwrap();

        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.bio.as_deref(), Some("halal food reviews"));
        assert_eq!(user.followers, Some(12_000));
        assert_eq!(user.full_name, "Test User");
    }

    #[test]
    fn creator_search_filters_by_platform_and_followers() {
        let db = db();
        insert_user(&db, "c1", "c1@example.com", "creator");
        insert_user(&db, "c2", "c2@example.com", "creator");
        insert_user(&db, "b1", "b1@example.com", "brand");

        db.update_profile(
            "c1",
            &ProfilePatch {
                platforms: Some(r#"["instagram","tiktok"]"#.into()),
                followers: Some(50_000),
                ..Default::default()
            },
        )
        .unwrap();
        db.update_profile(
            "c2",
            &ProfilePatch {
                platforms: Some(r#"["youtube"]"#.into()),
                followers: Some(1_000),
                ..Default::default()
            },
        )
        .unwrap();

        let found = db
            .search_creators(&CreatorFilter {
                platform: Some("instagram".into()),
                min_followers: Some(10_000),
                limit: 20,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "c1");

        // Brands never show up in creator search
        let all = db
            .search_creators(&CreatorFilter { limit: 20, ..Default::default() })
            .unwrap();
        assert_eq!(all.len(), 2);
    }
}
