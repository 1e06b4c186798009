use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    info!(path = %config.db.path.display(), "schema migrations applied");
    pool.close().await;
    Ok(())
}

/// Create every table and index that does not exist yet.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Leads, scoped to a dealership
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            dealership_id TEXT NOT NULL,
            name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            car TEXT NOT NULL DEFAULT 'Unknown',
            source TEXT NOT NULL DEFAULT 'Website',
            status TEXT NOT NULL DEFAULT 'new'
                CHECK (status IN ('new', 'warm', 'hot', 'follow_up', 'cold',
                                  'appointment_booked', 'deal_won', 'deal_lost')),
            message TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            lead_id TEXT NOT NULL,
            message TEXT NOT NULL,
            sender TEXT NOT NULL CHECK (sender IN ('customer', 'agent')),
            created_at INTEGER NOT NULL,
            FOREIGN KEY (lead_id) REFERENCES leads(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inventory (
            id TEXT PRIMARY KEY,
            dealership_id TEXT NOT NULL,
            make TEXT NOT NULL,
            model TEXT NOT NULL,
            year INTEGER NOT NULL,
            price TEXT NOT NULL,
            mileage INTEGER,
            description TEXT,
            features TEXT,
            condition TEXT,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'sold', 'pending')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One embedding per inventory row
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vehicle_embeddings (
            inventory_id TEXT PRIMARY KEY,
            dealership_id TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            formatted_text TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (inventory_id) REFERENCES inventory(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_leads_dealership ON leads(dealership_id, created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_conversations_lead ON conversations(lead_id, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_inventory_dealership ON inventory(dealership_id, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vehicle_embeddings_dealership ON vehicle_embeddings(dealership_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// In-memory database with the schema applied, for unit tests.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    // One connection: every in-memory connection is its own database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    apply_schema(&pool).await.unwrap();
    pool
}
