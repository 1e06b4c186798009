//! Database statistics overview.
//!
//! Provides a quick summary of what the database holds: leads by status,
//! conversation volume, inventory and embedding coverage, and a
//! per-dealership breakdown. Used by `showroom stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Per-dealership breakdown.
struct DealershipStats {
    dealership_id: String,
    leads: i64,
    vehicles: i64,
    active: i64,
    embedded: i64,
    last_lead_ts: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads")
        .fetch_one(&pool)
        .await?;
    let total_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
        .fetch_one(&pool)
        .await?;
    let total_vehicles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
        .fetch_one(&pool)
        .await?;
    let active_vehicles: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM inventory WHERE status = 'active'")
            .fetch_one(&pool)
            .await?;
    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vehicle_embeddings")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Showroom Database Stats");
    println!("=======================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Leads:       {}", total_leads);
    for (status, count) in lead_status_counts(&pool).await? {
        println!("    {:<20} {:>6}", status, count);
    }
    println!("  Messages:    {}", total_messages);
    println!(
        "  Vehicles:    {} ({} active)",
        total_vehicles, active_vehicles
    );
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        active_vehicles,
        percent(total_embedded, active_vehicles)
    );

    let dealerships = dealership_stats(&pool).await?;
    if !dealerships.is_empty() {
        println!();
        println!("  By dealership:");
        println!(
            "  {:<24} {:>6} {:>9} {:>7} {:>9}   {}",
            "DEALERSHIP", "LEADS", "VEHICLES", "ACTIVE", "EMBEDDED", "LAST LEAD"
        );
        println!("  {}", "-".repeat(80));

        for d in &dealerships {
            let last = match d.last_lead_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<24} {:>6} {:>9} {:>7} {:>9}   {}",
                d.dealership_id, d.leads, d.vehicles, d.active, d.embedded, last
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

async fn lead_status_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM leads GROUP BY status ORDER BY n DESC, status",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|r| (r.get::<String, _>("status"), r.get::<i64, _>("n")))
        .collect())
}

async fn dealership_stats(pool: &SqlitePool) -> Result<Vec<DealershipStats>> {
    let rows = sqlx::query(
        r#"
        SELECT
            d.dealership_id AS dealership_id,
            (SELECT COUNT(*) FROM leads l WHERE l.dealership_id = d.dealership_id) AS leads,
            (SELECT MAX(l.created_at) FROM leads l WHERE l.dealership_id = d.dealership_id) AS last_lead,
            (SELECT COUNT(*) FROM inventory i WHERE i.dealership_id = d.dealership_id) AS vehicles,
            (SELECT COUNT(*) FROM inventory i
                WHERE i.dealership_id = d.dealership_id AND i.status = 'active') AS active,
            (SELECT COUNT(*) FROM vehicle_embeddings e
                WHERE e.dealership_id = d.dealership_id) AS embedded
        FROM (
            SELECT dealership_id FROM leads
            UNION
            SELECT dealership_id FROM inventory
        ) d
        ORDER BY leads DESC, d.dealership_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| DealershipStats {
            dealership_id: row.get("dealership_id"),
            leads: row.get("leads"),
            vehicles: row.get("vehicles"),
            active: row.get("active"),
            embedded: row.get("embedded"),
            last_lead_ts: row.get("last_lead"),
        })
        .collect())
}

fn percent(part: i64, whole: i64) -> i64 {
    if whole > 0 {
        (part * 100) / whole
    } else {
        0
    }
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp relative to now (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = db::now_ts() - ts;
    if delta < 0 {
        return db::format_ts_iso(ts);
    }

    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, plural(mins))
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, plural(days))
    } else {
        db::format_ts_iso(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::test_pool;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_ts_relative() {
        let now = db::now_ts();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 3 * 3600 - 5), "3 hours ago");
        assert_eq!(format_ts_relative(now - 86400 - 5), "1 day ago");
    }

    #[tokio::test]
    async fn test_dealership_breakdown() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO leads (id, dealership_id, name, status, created_at, updated_at) \
             VALUES ('l1', 'd1', 'Ana', 'new', 100, 100), ('l2', 'd1', 'Ben', 'hot', 200, 200)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO inventory (id, dealership_id, make, model, year, price, status, created_at, updated_at) \
             VALUES ('v1', 'd2', 'Honda', 'Civic', 2022, '$21,000', 'active', 1, 1)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let stats = dealership_stats(&pool).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].dealership_id, "d1");
        assert_eq!(stats[0].leads, 2);
        assert_eq!(stats[0].last_lead_ts, Some(200));
        assert_eq!(stats[1].dealership_id, "d2");
        assert_eq!(stats[1].active, 1);
        assert_eq!(stats[1].last_lead_ts, None);

        let counts = lead_status_counts(&pool).await.unwrap();
        assert_eq!(counts.len(), 2);
    }
}
