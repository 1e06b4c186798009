//! Lead CRUD.
//!
//! A lead created with an opening message gets that message as the first
//! customer entry of its conversation thread, written in the same
//! transaction as the lead row.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db::now_ts;
use crate::error::ShowroomError;
use crate::models::{Lead, LeadStatus, NewLead, Sender};

const LEAD_COLUMNS: &str = "id, dealership_id, name, email, phone, car, source, status, \
     message, created_at, updated_at";

fn lead_from_row(row: &SqliteRow) -> Result<Lead> {
    let status: String = row.get("status");
    Ok(Lead {
        id: row.get("id"),
        dealership_id: row.get("dealership_id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        car: row.get("car"),
        source: row.get("source"),
        status: status.parse()?,
        message: row.get("message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create_lead(pool: &SqlitePool, dealership_id: &str, new: NewLead) -> Result<Lead> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(ShowroomError::invalid("name must not be empty"));
    }
    let email = non_empty(new.email);
    if email.as_deref().is_some_and(|e| !e.contains('@')) {
        return Err(ShowroomError::invalid("email is not valid"));
    }

    let now = now_ts();
    let lead = Lead {
        id: uuid::Uuid::new_v4().to_string(),
        dealership_id: dealership_id.to_string(),
        name: name.to_string(),
        email,
        phone: non_empty(new.phone),
        car: non_empty(new.car).unwrap_or_else(|| "Unknown".to_string()),
        source: non_empty(new.source).unwrap_or_else(|| "Website".to_string()),
        status: LeadStatus::New,
        message: non_empty(new.message),
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO leads (id, dealership_id, name, email, phone, car, source, status, \
         message, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&lead.id)
    .bind(&lead.dealership_id)
    .bind(&lead.name)
    .bind(&lead.email)
    .bind(&lead.phone)
    .bind(&lead.car)
    .bind(&lead.source)
    .bind(lead.status.as_str())
    .bind(&lead.message)
    .bind(lead.created_at)
    .bind(lead.updated_at)
    .execute(&mut *tx)
    .await?;

    if let Some(message) = &lead.message {
        sqlx::query(
            "INSERT INTO conversations (id, lead_id, message, sender, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&lead.id)
        .bind(message)
        .bind(Sender::Customer.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(id = %lead.id, dealership_id, "lead created");
    Ok(lead)
}

/// Leads of a dealership, newest first.
pub async fn list_leads(pool: &SqlitePool, dealership_id: &str) -> Result<Vec<Lead>> {
    let sql = format!(
        "SELECT {} FROM leads WHERE dealership_id = ? ORDER BY created_at DESC, rowid DESC",
        LEAD_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(dealership_id).fetch_all(pool).await?;
    rows.iter().map(lead_from_row).collect()
}

/// Leads of one dealership, or of all of them.
pub(crate) async fn list_scoped(pool: &SqlitePool, dealership_id: Option<&str>) -> Result<Vec<Lead>> {
    let sql = format!(
        "SELECT {} FROM leads WHERE (? IS NULL OR dealership_id = ?) ORDER BY created_at, rowid",
        LEAD_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(dealership_id)
        .bind(dealership_id)
        .fetch_all(pool)
        .await?;
    rows.iter().map(lead_from_row).collect()
}

pub(crate) async fn find_lead(pool: &SqlitePool, id: &str) -> Result<Option<Lead>> {
    let sql = format!("SELECT {} FROM leads WHERE id = ?", LEAD_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(lead_from_row).transpose()
}

pub async fn get_lead(pool: &SqlitePool, dealership_id: &str, id: &str) -> Result<Lead> {
    let lead = find_lead(pool, id)
        .await?
        .ok_or_else(|| ShowroomError::not_found(format!("lead {}", id)))?;
    if lead.dealership_id != dealership_id {
        return Err(ShowroomError::forbidden(format!(
            "lead {} belongs to another dealership",
            id
        )));
    }
    Ok(lead)
}

pub async fn update_lead_status(
    pool: &SqlitePool,
    dealership_id: &str,
    id: &str,
    status: LeadStatus,
) -> Result<Lead> {
    let mut lead = get_lead(pool, dealership_id, id).await?;
    set_status(pool, id, status).await?;
    lead.status = status;
    lead.updated_at = now_ts();
    info!(id, dealership_id, status = %status, "lead status updated");
    Ok(lead)
}

pub(crate) async fn set_status(pool: &SqlitePool, id: &str, status: LeadStatus) -> Result<()> {
    sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_ts())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Removes the lead and, by cascade, its conversation thread.
pub async fn delete_lead(pool: &SqlitePool, dealership_id: &str, id: &str) -> Result<()> {
    get_lead(pool, dealership_id, id).await?;
    sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    info!(id, dealership_id, "lead deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::list_for_lead;
    use crate::migrate::test_pool;

    fn new_lead(name: &str, message: Option<&str>) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
            car: Some("Tiguan".to_string()),
            source: None,
            message: message.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_stores_initial_message() {
        let pool = test_pool().await;
        let lead = create_lead(&pool, "d1", new_lead("Ana", Some("Is the Tiguan available?")))
            .await
            .unwrap();
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.source, "Website");

        let thread = list_for_lead(&pool, &lead.id).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].sender, Sender::Customer);
        assert_eq!(thread[0].message, "Is the Tiguan available?");
    }

    #[tokio::test]
    async fn test_create_without_message_and_validation() {
        let pool = test_pool().await;
        let lead = create_lead(&pool, "d1", new_lead("Ben", Some("  "))).await.unwrap();
        assert!(lead.message.is_none());
        assert!(list_for_lead(&pool, &lead.id).await.unwrap().is_empty());

        let err = create_lead(&pool, "d1", new_lead(" ", None)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShowroomError>(),
            Some(ShowroomError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_list_get_scoping() {
        let pool = test_pool().await;
        let a = create_lead(&pool, "d1", new_lead("Ana", None)).await.unwrap();
        let b = create_lead(&pool, "d1", new_lead("Ben", None)).await.unwrap();
        create_lead(&pool, "d2", new_lead("Cy", None)).await.unwrap();

        let leads = list_leads(&pool, "d1").await.unwrap();
        let ids: Vec<&str> = leads.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);

        assert!(matches!(
            get_lead(&pool, "d2", &a.id).await.unwrap_err().downcast_ref::<ShowroomError>(),
            Some(ShowroomError::Forbidden(_))
        ));
        assert!(matches!(
            get_lead(&pool, "d1", "nope").await.unwrap_err().downcast_ref::<ShowroomError>(),
            Some(ShowroomError::NotFound(_))
        ));
        assert_eq!(list_scoped(&pool, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_status_update_and_delete_cascades() {
        let pool = test_pool().await;
        let lead = create_lead(&pool, "d1", new_lead("Ana", Some("hi there")))
            .await
            .unwrap();

        let updated = update_lead_status(&pool, "d1", &lead.id, LeadStatus::AppointmentBooked)
            .await
            .unwrap();
        assert_eq!(updated.status, LeadStatus::AppointmentBooked);
        assert_eq!(
            get_lead(&pool, "d1", &lead.id).await.unwrap().status,
            LeadStatus::AppointmentBooked
        );

        delete_lead(&pool, "d1", &lead.id).await.unwrap();
        assert!(find_lead(&pool, &lead.id).await.unwrap().is_none());
        assert!(list_for_lead(&pool, &lead.id).await.unwrap().is_empty());
    }
}
