use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        TEXT,
            full_name       TEXT NOT NULL,
            user_type       TEXT NOT NULL,
            email_verified  INTEGER NOT NULL DEFAULT 0,
            is_active       INTEGER NOT NULL DEFAULT 1,
            bio             TEXT,
            location        TEXT,
            niche           TEXT,
            platforms       TEXT NOT NULL DEFAULT '[]',
            followers       INTEGER,
            price_min       INTEGER,
            price_max       INTEGER,
            avatar_url      TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS campaigns (
            id               TEXT PRIMARY KEY,
            brand_id         TEXT NOT NULL REFERENCES users(id),
            title            TEXT NOT NULL,
            description      TEXT NOT NULL,
            category         TEXT NOT NULL,
            campaign_types   TEXT NOT NULL DEFAULT '[]',
            budget_min       INTEGER NOT NULL,
            budget_max       INTEGER NOT NULL,
            deadline         TEXT NOT NULL,
            target_audience  TEXT NOT NULL DEFAULT '[]',
            deliverables     TEXT NOT NULL DEFAULT '[]',
            status           TEXT NOT NULL DEFAULT 'draft',
            estimated_reach  INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_campaigns_brand
            ON campaigns(brand_id);
        CREATE INDEX IF NOT EXISTS idx_campaigns_status
            ON campaigns(status, created_at);

        -- One application per creator per campaign. Re-applying after a
        -- rejection is intentionally not possible.
        CREATE TABLE IF NOT EXISTS campaign_applications (
            id           TEXT PRIMARY KEY,
            campaign_id  TEXT NOT NULL REFERENCES campaigns(id),
            creator_id   TEXT NOT NULL REFERENCES users(id),
            proposal     TEXT NOT NULL,
            price        INTEGER NOT NULL,
            timeline     TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending',
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(campaign_id, creator_id)
        );

        CREATE INDEX IF NOT EXISTS idx_applications_creator
            ON campaign_applications(creator_id, created_at);

        CREATE TABLE IF NOT EXISTS conversations (
            id           TEXT PRIMARY KEY,
            campaign_id  TEXT REFERENCES campaigns(id),
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS conversation_participants (
            conversation_id  TEXT NOT NULL REFERENCES conversations(id),
            user_id          TEXT NOT NULL REFERENCES users(id),
            PRIMARY KEY (conversation_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL REFERENCES conversations(id),
            sender_id        TEXT NOT NULL REFERENCES users(id),
            body             TEXT NOT NULL,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS portfolio_items (
            id          TEXT PRIMARY KEY,
            creator_id  TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            description TEXT,
            media_url   TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_portfolio_creator
            ON portfolio_items(creator_id);

        CREATE TABLE IF NOT EXISTS packages (
            id           TEXT PRIMARY KEY,
            creator_id   TEXT NOT NULL REFERENCES users(id),
            title        TEXT NOT NULL,
            description  TEXT,
            price        INTEGER NOT NULL,
            deliverables TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_packages_creator
            ON packages(creator_id);

        -- stripe_event_id is UNIQUE so a replayed webhook event can never
        -- double-insert.
        CREATE TABLE IF NOT EXISTS transactions (
            id                 TEXT PRIMARY KEY,
            stripe_event_id    TEXT NOT NULL UNIQUE,
            payment_intent_id  TEXT NOT NULL,
            application_id     TEXT REFERENCES campaign_applications(id),
            campaign_id        TEXT REFERENCES campaigns(id),
            brand_id           TEXT REFERENCES users(id),
            creator_id         TEXT NOT NULL REFERENCES users(id),
            amount             INTEGER NOT NULL,
            currency           TEXT NOT NULL DEFAULT 'usd',
            status             TEXT NOT NULL DEFAULT 'held',
            created_at         TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_creator
            ON transactions(creator_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_transactions_brand
            ON transactions(brand_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
