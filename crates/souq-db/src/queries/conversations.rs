use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{ConversationRow, MessageRow};

impl Database {
    // -- Conversations --

    /// Find the conversation between two users for a given campaign
    /// context (NULL campaign matches NULL). The participant pair is
    /// unordered.
    pub fn find_conversation(
        &self,
        user_a: &str,
        user_b: &str,
        campaign_id: Option<&str>,
    ) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.id FROM conversations c
                     JOIN conversation_participants pa ON pa.conversation_id = c.id AND pa.user_id = ?1
                     JOIN conversation_participants pb ON pb.conversation_id = c.id AND pb.user_id = ?2
                     WHERE c.campaign_id IS ?3",
                    rusqlite::params![user_a, user_b, campaign_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Create a conversation and both participant rows atomically.
    pub fn create_conversation(
        &self,
        id: &str,
        user_a: &str,
        user_b: &str,
        campaign_id: Option<&str>,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO conversations (id, campaign_id) VALUES (?1, ?2)",
                rusqlite::params![id, campaign_id],
            )?;
            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![id, user_a],
            )?;
            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![id, user_b],
            )?;
            Ok(())
        })
    }

    pub fn is_participant(&self, conversation_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM conversation_participants
                     WHERE conversation_id = ?1 AND user_id = ?2",
                    rusqlite::params![conversation_id, user_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Caller's conversations, newest activity first, with peer info and
    /// last message preview in one query.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.campaign_id, peer.id, peer.full_name, peer.user_type,
                        peer.avatar_url,
                        (SELECT m.body FROM messages m
                         WHERE m.conversation_id = c.id
                         ORDER BY m.created_at DESC LIMIT 1),
                        c.updated_at
                 FROM conversations c
                 JOIN conversation_participants me ON me.conversation_id = c.id AND me.user_id = ?1
                 JOIN conversation_participants other
                      ON other.conversation_id = c.id AND other.user_id != ?1
                 JOIN users peer ON peer.id = other.user_id
                 ORDER BY c.updated_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        campaign_id: row.get(1)?,
                        peer_id: row.get(2)?,
                        peer_name: row.get(3)?,
                        peer_type: row.get(4)?,
                        peer_avatar_url: row.get(5)?,
                        last_message: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    /// Insert a message and bump the conversation's updated_at in one
    /// transaction.
    pub fn insert_message(
        &self,
        id: &str,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, body) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, conversation_id, sender_id, body],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = datetime('now') WHERE id = ?1",
                [conversation_id],
            )?;
            Ok(())
        })
    }

    /// Newest first; `before` is the created_at cursor of the oldest
    /// message from the previous page.
    pub fn get_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch sender_name in a single query
            let mut sql = String::from(
                "SELECT m.id, m.conversation_id, m.sender_id, u.full_name, m.body, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1",
            );
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> =
                vec![Box::new(conversation_id.to_string())];

            if let Some(before) = before {
                params.push(Box::new(before.to_string()));
                sql.push_str(&format!(" AND m.created_at < ?{}", params.len()));
            }
            params.push(Box::new(limit as i64));
            sql.push_str(&format!(" ORDER BY m.created_at DESC LIMIT ?{}", params.len()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row.get::<_, Option<String>>(3)?.unwrap_or_else(|| "unknown".to_string()),
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users::NewUser;

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, email) in [("u1", "a@example.com"), ("u2", "b@example.com")] {
            db.create_user(&NewUser {
                id,
                email,
                password_hash: Some("hash"),
                full_name: "Someone",
                user_type: "creator",
                email_verified: true,
            })
            .unwrap();
        }
        db
    }

    #[test]
    fn find_matches_unordered_pair_and_campaign_context() {
        let db = seeded_db();
        db.create_conversation("conv1", "u1", "u2", None).unwrap();

        assert_eq!(db.find_conversation("u1", "u2", None).unwrap().as_deref(), Some("conv1"));
        assert_eq!(db.find_conversation("u2", "u1", None).unwrap().as_deref(), Some("conv1"));
        // Different campaign context is a different conversation
        assert!(db.find_conversation("u1", "u2", Some("camp1")).unwrap().is_none());
    }

    #[test]
    fn participant_check() {
        let db = seeded_db();
        db.create_conversation("conv1", "u1", "u2", None).unwrap();
        db.create_user(&NewUser {
            id: "u3",
            email: "c@example.com",
            password_hash: Some("hash"),
            full_name: "Outsider",
            user_type: "brand",
            email_verified: true,
        })
        .unwrap();

        assert!(db.is_participant("conv1", "u1").unwrap());
        assert!(!db.is_participant("conv1", "u3").unwrap());
    }

    #[test]
    fn messages_paginate_with_before_cursor() {
        let db = seeded_db();
        db.create_conversation("conv1", "u1", "u2", None).unwrap();

        // Distinct timestamps so the cursor is unambiguous
        db.with_conn_mut(|conn| {
            for (i, ts) in ["2026-01-01 10:00:00", "2026-01-01 10:01:00", "2026-01-01 10:02:00"]
                .iter()
                .enumerate()
            {
                conn.execute(
                    "INSERT INTO messages (id, conversation_id, sender_id, body, created_at)
                     VALUES (?1, 'conv1', 'u1', ?2, ?3)",
                    rusqlite::params![format!("m{i}"), format!("msg {i}"), ts],
                )?;
            }
            Ok(())
        })
        .unwrap();

        let page1 = db.get_messages("conv1", 2, None).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].id, "m2");

        let cursor = &page1[1].created_at;
        let page2 = db.get_messages("conv1", 2, Some(cursor)).unwrap();
        assert_eq!(page2.len(), 1);
        assert_eq!(page2[0].id, "m0");
    }

    #[test]
    fn send_bumps_conversation_activity() {
        let db = seeded_db();
        db.create_conversation("conv1", "u1", "u2", None).unwrap();
        db.insert_message("m1", "conv1", "u1", "assalamu alaikum").unwrap();

        let convs = db.list_conversations("u2").unwrap();
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].peer_id, "u1");
        assert_eq!(convs[0].last_message.as_deref(), Some("assalamu alaikum"));
    }
}
