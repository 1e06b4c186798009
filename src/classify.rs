//! Time-based lead classification.
//!
//! Derives the automatic pipeline status of a lead from its conversation
//! timing:
//!
//! | Status | When |
//! |--------|------|
//! | `new` | no customer message yet, lead younger than 24h |
//! | `cold` | no customer message and lead older than 24h, or customer silent for 7+ days |
//! | `hot` | customer replied within 24h with sustained back-and-forth |
//! | `warm` | customer replied within 24h |
//! | `follow_up` | customer last replied 1 to 7 days ago |
//!
//! Manual statuses (`appointment_booked`, `deal_won`, `deal_lost`) are never
//! overwritten.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::conversations::list_for_lead;
use crate::db::{format_ts_iso, now_ts};
use crate::leads::{list_scoped, set_status};
use crate::models::{Conversation, Lead, LeadStatus, Sender};

const HOUR: i64 = 3600;
const NEW_LEAD_WINDOW: i64 = 24 * HOUR;
const WARM_WINDOW: i64 = 24 * HOUR;
const COLD_AFTER: i64 = 7 * 24 * HOUR;
const HOT_MIN_MESSAGES: usize = 6;
const HOT_RECENT_WINDOW: i64 = 48 * HOUR;
const HOT_MIN_RECENT: usize = 4;
const HOT_MIN_SENDER_CHANGES: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationSummary {
    pub total_processed: usize,
    pub total_updated: usize,
    pub status_distribution: BTreeMap<String, usize>,
    pub timestamp: String,
}

/// Status a lead should have at `now`, given its thread in chronological order.
pub fn determine_status(lead_created_at: i64, conversations: &[Conversation], now: i64) -> LeadStatus {
    let last_customer = conversations
        .iter()
        .rev()
        .find(|c| c.sender == Sender::Customer);

    let Some(last_customer) = last_customer else {
        return if now - lead_created_at < NEW_LEAD_WINDOW {
            LeadStatus::New
        } else {
            LeadStatus::Cold
        };
    };

    let silence = now - last_customer.created_at;
    if silence >= COLD_AFTER {
        LeadStatus::Cold
    } else if silence <= WARM_WINDOW {
        if is_hot(conversations, now) {
            LeadStatus::Hot
        } else {
            LeadStatus::Warm
        }
    } else {
        LeadStatus::FollowUp
    }
}

fn is_hot(conversations: &[Conversation], now: i64) -> bool {
    if conversations.len() < HOT_MIN_MESSAGES {
        return false;
    }
    let recent: Vec<Sender> = conversations
        .iter()
        .filter(|c| now - c.created_at <= HOT_RECENT_WINDOW)
        .map(|c| c.sender)
        .collect();
    if recent.len() < HOT_MIN_RECENT {
        return false;
    }

    let tail = &recent[recent.len().saturating_sub(6)..];
    let changes = tail.windows(2).filter(|w| w[0] != w[1]).count();
    changes >= HOT_MIN_SENDER_CHANGES
}

/// Reclassify one lead. Returns the new status when it changed.
pub async fn classify_lead(pool: &SqlitePool, lead: &Lead, now: i64) -> Result<Option<LeadStatus>> {
    if lead.status.is_manual() {
        return Ok(None);
    }
    let conversations = list_for_lead(pool, &lead.id).await?;
    let status = determine_status(lead.created_at, &conversations, now);
    if status == lead.status {
        return Ok(None);
    }
    set_status(pool, &lead.id, status).await?;
    debug!(id = %lead.id, from = %lead.status, to = %status, "lead reclassified");
    Ok(Some(status))
}

/// Reclassify every lead of `dealership_id`, or of all dealerships.
///
/// Leads with a manual status count as processed but are left out of the
/// distribution.
pub async fn classify_all(pool: &SqlitePool, dealership_id: Option<&str>) -> Result<ClassificationSummary> {
    let now = now_ts();
    let leads = list_scoped(pool, dealership_id).await?;

    let mut updated = 0;
    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    for lead in &leads {
        if lead.status.is_manual() {
            continue;
        }
        let status = match classify_lead(pool, lead, now).await? {
            Some(status) => {
                updated += 1;
                status
            }
            None => lead.status,
        };
        *distribution.entry(status.as_str().to_string()).or_default() += 1;
    }

    info!(
        processed = leads.len(),
        updated,
        dealership_id = dealership_id.unwrap_or("*"),
        "lead classification finished"
    );

    Ok(ClassificationSummary {
        total_processed: leads.len(),
        total_updated: updated,
        status_distribution: distribution,
        timestamp: format_ts_iso(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::add_message;
    use crate::leads::{create_lead, get_lead, update_lead_status};
    use crate::migrate::test_pool;
    use crate::models::NewLead;

    const NOW: i64 = 1_700_000_000;

    fn msg(sender: Sender, ago: i64) -> Conversation {
        Conversation {
            id: ago.to_string(),
            lead_id: "l1".to_string(),
            message: "x".to_string(),
            sender,
            created_at: NOW - ago,
        }
    }

    #[test]
    fn test_no_customer_messages() {
        assert_eq!(determine_status(NOW - HOUR, &[], NOW), LeadStatus::New);
        assert_eq!(determine_status(NOW - 25 * HOUR, &[], NOW), LeadStatus::Cold);
        // Agent-only threads count as no engagement
        let agent_only = vec![msg(Sender::Agent, HOUR)];
        assert_eq!(
            determine_status(NOW - 2 * HOUR, &agent_only, NOW),
            LeadStatus::New
        );
    }

    #[test]
    fn test_silence_thresholds() {
        let created = NOW - 30 * 24 * HOUR;
        assert_eq!(
            determine_status(created, &[msg(Sender::Customer, 2 * HOUR)], NOW),
            LeadStatus::Warm
        );
        assert_eq!(
            determine_status(created, &[msg(Sender::Customer, 3 * 24 * HOUR)], NOW),
            LeadStatus::FollowUp
        );
        assert_eq!(
            determine_status(created, &[msg(Sender::Customer, 7 * 24 * HOUR)], NOW),
            LeadStatus::Cold
        );
    }

    #[test]
    fn test_hot_needs_back_and_forth() {
        let created = NOW - 3 * 24 * HOUR;
        let lively = vec![
            msg(Sender::Customer, 30 * HOUR),
            msg(Sender::Agent, 29 * HOUR),
            msg(Sender::Customer, 5 * HOUR),
            msg(Sender::Agent, 4 * HOUR),
            msg(Sender::Customer, 3 * HOUR),
            msg(Sender::Agent, 2 * HOUR),
        ];
        assert_eq!(determine_status(created, &lively, NOW), LeadStatus::Hot);

        let monologue: Vec<Conversation> =
            (1..=6).rev().map(|h| msg(Sender::Customer, h * HOUR)).collect();
        assert_eq!(determine_status(created, &monologue, NOW), LeadStatus::Warm);

        // Enough messages, but most of them are old
        let stale = vec![
            msg(Sender::Customer, 70 * HOUR),
            msg(Sender::Agent, 69 * HOUR),
            msg(Sender::Customer, 68 * HOUR),
            msg(Sender::Agent, 67 * HOUR),
            msg(Sender::Customer, 2 * HOUR),
            msg(Sender::Agent, HOUR),
        ];
        assert_eq!(determine_status(created, &stale, NOW), LeadStatus::Warm);
    }

    #[tokio::test]
    async fn test_classify_all_skips_manual_statuses() {
        let pool = test_pool().await;
        let lead = |name: &str| NewLead {
            name: name.to_string(),
            email: None,
            phone: None,
            car: None,
            source: None,
            message: None,
        };
        let quiet = create_lead(&pool, "d1", lead("Quiet")).await.unwrap();
        let chatty = create_lead(&pool, "d1", lead("Chatty")).await.unwrap();
        add_message(&pool, &chatty.id, "Still have the Civic?", Sender::Customer)
            .await
            .unwrap();
        let booked = create_lead(&pool, "d1", lead("Booked")).await.unwrap();
        update_lead_status(&pool, "d1", &booked.id, LeadStatus::AppointmentBooked)
            .await
            .unwrap();
        create_lead(&pool, "d2", lead("Elsewhere")).await.unwrap();

        let summary = classify_all(&pool, Some("d1")).await.unwrap();
        assert_eq!(summary.total_processed, 3);
        assert_eq!(summary.total_updated, 1);
        assert_eq!(summary.status_distribution.get("new"), Some(&1));
        assert_eq!(summary.status_distribution.get("warm"), Some(&1));

        assert_eq!(get_lead(&pool, "d1", &quiet.id).await.unwrap().status, LeadStatus::New);
        assert_eq!(get_lead(&pool, "d1", &chatty.id).await.unwrap().status, LeadStatus::Warm);
        assert_eq!(
            get_lead(&pool, "d1", &booked.id).await.unwrap().status,
            LeadStatus::AppointmentBooked
        );
    }
}
