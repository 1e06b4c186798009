//! Core data models used throughout Showroom.
//!
//! These types represent the leads, conversations and inventory rows stored
//! in SQLite, plus the request payloads that create or mutate them.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ShowroomError;

fn serialize_ts<S: Serializer>(ts: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::db::format_ts_iso(*ts))
}

// ============ Enumerations ============

/// Pipeline status of a lead.
///
/// The first five values are assigned by [`crate::classify`]; the last three
/// are set by a salesperson and never overwritten automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Warm,
    Hot,
    FollowUp,
    Cold,
    AppointmentBooked,
    DealWon,
    DealLost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Warm => "warm",
            LeadStatus::Hot => "hot",
            LeadStatus::FollowUp => "follow_up",
            LeadStatus::Cold => "cold",
            LeadStatus::AppointmentBooked => "appointment_booked",
            LeadStatus::DealWon => "deal_won",
            LeadStatus::DealLost => "deal_lost",
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            LeadStatus::AppointmentBooked | LeadStatus::DealWon | LeadStatus::DealLost
        )
    }
}

impl FromStr for LeadStatus {
    type Err = ShowroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(LeadStatus::New),
            "warm" => Ok(LeadStatus::Warm),
            "hot" => Ok(LeadStatus::Hot),
            // older rows and clients spell it with a dash
            "follow_up" | "follow-up" => Ok(LeadStatus::FollowUp),
            "cold" => Ok(LeadStatus::Cold),
            "appointment_booked" => Ok(LeadStatus::AppointmentBooked),
            "deal_won" => Ok(LeadStatus::DealWon),
            "deal_lost" => Ok(LeadStatus::DealLost),
            other => Err(ShowroomError::Invalid(format!("unknown lead status: {}", other))),
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Customer,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::Customer => "customer",
            Sender::Agent => "agent",
        }
    }
}

impl FromStr for Sender {
    type Err = ShowroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Sender::Customer),
            "agent" => Ok(Sender::Agent),
            other => Err(ShowroomError::Invalid(format!("unknown sender: {}", other))),
        }
    }
}

/// Sales status of an inventory row. Only `active` vehicles are retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Active,
    Sold,
    Pending,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Active => "active",
            VehicleStatus::Sold => "sold",
            VehicleStatus::Pending => "pending",
        }
    }
}

impl FromStr for VehicleStatus {
    type Err = ShowroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(VehicleStatus::Active),
            "sold" => Ok(VehicleStatus::Sold),
            "pending" => Ok(VehicleStatus::Pending),
            other => Err(ShowroomError::Invalid(format!("unknown vehicle status: {}", other))),
        }
    }
}

// ============ Rows ============

/// A prospective customer.
#[derive(Debug, Clone, Serialize)]
pub struct Lead {
    pub id: String,
    pub dealership_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub car: String,
    pub source: String,
    pub status: LeadStatus,
    pub message: Option<String>,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_ts")]
    pub updated_at: i64,
}

/// One message in a lead's thread.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub lead_id: String,
    pub message: String,
    pub sender: Sender,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
}

/// An inventory row.
#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub id: String,
    pub dealership_id: String,
    pub make: String,
    pub model: String,
    pub year: i64,
    /// Price as entered by the dealership (`"$29,500"`, `"TBD"`).
    pub price: String,
    pub mileage: Option<i64>,
    pub description: Option<String>,
    pub features: Option<String>,
    pub condition: Option<String>,
    pub status: VehicleStatus,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_ts")]
    pub updated_at: i64,
}

impl Vehicle {
    /// Numeric price, or `None` for placeholders like `"Call"`.
    pub fn price_value(&self) -> Option<f64> {
        parse_price(&self.price)
    }

    /// `"2021 Volkswagen Tiguan"`.
    pub fn title(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    /// Text sent to the embedding provider for this row.
    ///
    /// ```rust
    /// # use showroom::models::{Vehicle, VehicleStatus};
    /// let v = Vehicle {
    ///     id: "v1".into(), dealership_id: "d1".into(),
    ///     make: "Volkswagen".into(), model: "Tiguan".into(), year: 2021,
    ///     price: "29500".into(), mileage: Some(28000),
    ///     description: Some("White, one owner".into()), features: None,
    ///     condition: Some("used".into()), status: VehicleStatus::Active,
    ///     created_at: 0, updated_at: 0,
    /// };
    /// assert_eq!(
    ///     v.format_for_embedding(),
    ///     "2021 Volkswagen Tiguan. $29,500. White, one owner. 28,000 miles. Condition: used"
    /// );
    /// ```
    pub fn format_for_embedding(&self) -> String {
        let mut parts = vec![self.title(), format_price(self.price_value())];

        if let Some(features) = non_empty(&self.features) {
            parts.push(features.to_string());
        }
        if let Some(description) = non_empty(&self.description) {
            parts.push(description.to_string());
        }
        if let Some(mileage) = self.mileage.filter(|m| *m > 0) {
            parts.push(format!("{} miles", group_thousands(mileage)));
        }
        if let Some(condition) = non_empty(&self.condition) {
            parts.push(format!("Condition: {}", condition));
        }

        parts.join(". ")
    }

    /// Lower-cased description and features, the haystack for text predicates.
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {}",
            self.description.as_deref().unwrap_or(""),
            self.features.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// ============ Payloads ============

/// `POST /leads` body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub car: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// First customer message; stored as the opening conversation entry.
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /messages` body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub lead_id: String,
    pub message: String,
}

/// `POST /inventory` body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i64,
    pub price: String,
    #[serde(default)]
    pub mileage: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub status: VehicleStatus,
}

/// `PUT /inventory/{id}` body; absent fields are left unchanged.
///
/// The optional columns take an explicit `null` to clear them, which
/// deserializes to `Some(None)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleUpdate {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub price: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub mileage: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub features: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub condition: Option<Option<String>>,
    pub status: Option<VehicleStatus>,
}

/// Present fields become `Some`, including `null`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============ Formatting helpers ============

/// Parse a dealership price string: strips `$`, `,` and whitespace.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p >= 0.0)
}

/// `"$29,500"`, or the upon-request placeholder for missing prices.
pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p > 0.0 => format!("${}", group_thousands(p.round() as i64)),
        _ => "Price available upon request".to_string(),
    }
}

/// `28000` → `"28,000"`.
pub fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_price_variants() {
        assert_eq!(parse_price("$29,500"), Some(29500.0));
        assert_eq!(parse_price("18999.00"), Some(18999.0));
        assert_eq!(parse_price(" 12 000 "), Some(12000.0));
        assert_eq!(parse_price("TBD"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("Call"), None);
    }

    #[test]
    fn test_vehicle_update_null_clears() {
        let update: VehicleUpdate =
            serde_json::from_str(r#"{"description": null, "mileage": 12000}"#).unwrap();
        assert_eq!(update.description, Some(None));
        assert_eq!(update.mileage, Some(Some(12000)));
        assert_eq!(update.features, None);
        assert_eq!(update.condition, None);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-4500), "-4,500");
    }

    #[test]
    fn test_format_price_placeholder() {
        assert_eq!(format_price(None), "Price available upon request");
        assert_eq!(format_price(Some(0.0)), "Price available upon request");
        assert_eq!(format_price(Some(19800.4)), "$19,800");
    }

    #[test]
    fn test_lead_status_roundtrip_and_manual() {
        for s in ["new", "warm", "hot", "follow_up", "cold", "deal_won"] {
            let status: LeadStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert_eq!("follow-up".parse::<LeadStatus>().unwrap(), LeadStatus::FollowUp);
        assert!(LeadStatus::AppointmentBooked.is_manual());
        assert!(!LeadStatus::Hot.is_manual());
        assert!("lukewarm".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_format_for_embedding_skips_empty_parts() {
        let v = Vehicle {
            id: "v".into(),
            dealership_id: "d".into(),
            make: "Honda".into(),
            model: "Civic".into(),
            year: 2022,
            price: "TBD".into(),
            mileage: None,
            description: Some("  ".into()),
            features: Some("Sunroof, CarPlay".into()),
            condition: None,
            status: VehicleStatus::Active,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(
            v.format_for_embedding(),
            "2022 Honda Civic. Price available upon request. Sunroof, CarPlay"
        );
    }
}
