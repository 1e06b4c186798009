//! Conversation threads.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db::now_ts;
use crate::error::ShowroomError;
use crate::leads::find_lead;
use crate::models::{Conversation, Sender};

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    let sender: String = row.get("sender");
    Ok(Conversation {
        id: row.get("id"),
        lead_id: row.get("lead_id"),
        message: row.get("message"),
        sender: sender.parse()?,
        created_at: row.get("created_at"),
    })
}

/// Append a message to a lead's thread. Unknown leads are `NotFound`.
pub async fn add_message(
    pool: &SqlitePool,
    lead_id: &str,
    message: &str,
    sender: Sender,
) -> Result<Conversation> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ShowroomError::invalid("message must not be empty"));
    }
    if find_lead(pool, lead_id).await?.is_none() {
        return Err(ShowroomError::not_found(format!("lead {}", lead_id)));
    }

    let conversation = Conversation {
        id: uuid::Uuid::new_v4().to_string(),
        lead_id: lead_id.to_string(),
        message: message.to_string(),
        sender,
        created_at: now_ts(),
    };

    sqlx::query(
        "INSERT INTO conversations (id, lead_id, message, sender, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&conversation.id)
    .bind(&conversation.lead_id)
    .bind(&conversation.message)
    .bind(sender.as_str())
    .bind(conversation.created_at)
    .execute(pool)
    .await?;

    debug!(lead_id, sender = sender.as_str(), "message stored");
    Ok(conversation)
}

pub async fn add_agent_reply(pool: &SqlitePool, lead_id: &str, message: &str) -> Result<Conversation> {
    add_message(pool, lead_id, message, Sender::Agent).await
}

/// Thread of a lead, oldest first. Insertion order breaks same-second ties.
pub async fn list_for_lead(pool: &SqlitePool, lead_id: &str) -> Result<Vec<Conversation>> {
    let rows = sqlx::query(
        "SELECT id, lead_id, message, sender, created_at FROM conversations \
         WHERE lead_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(lead_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(conversation_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::create_lead;
    use crate::migrate::test_pool;
    use crate::models::NewLead;

    #[tokio::test]
    async fn test_thread_is_chronological() {
        let pool = test_pool().await;
        let lead = create_lead(
            &pool,
            "d1",
            NewLead {
                name: "Ana".to_string(),
                email: None,
                phone: None,
                car: None,
                source: None,
                message: Some("Hi, any Civics?".to_string()),
            },
        )
        .await
        .unwrap();

        add_agent_reply(&pool, &lead.id, "Yes! A 2022 Civic EX. Want to see it?")
            .await
            .unwrap();
        add_message(&pool, &lead.id, "Saturday works", Sender::Customer)
            .await
            .unwrap();

        let thread = list_for_lead(&pool, &lead.id).await.unwrap();
        let senders: Vec<Sender> = thread.iter().map(|c| c.sender).collect();
        assert_eq!(senders, vec![Sender::Customer, Sender::Agent, Sender::Customer]);
        assert_eq!(thread[2].message, "Saturday works");
    }

    #[tokio::test]
    async fn test_unknown_lead_and_empty_message() {
        let pool = test_pool().await;
        let err = add_message(&pool, "missing", "hello", Sender::Customer)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShowroomError>(),
            Some(ShowroomError::NotFound(_))
        ));

        let err = add_message(&pool, "missing", "  ", Sender::Customer)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShowroomError>(),
            Some(ShowroomError::Invalid(_))
        ));
    }
}
