use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Canonical normalized event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gig {
    pub id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub title: String,
    pub artists: Vec<String>,
    pub venue: Venue,
    /// ISO-8601 UTC
    pub date_start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets_url: Option<String>,
    pub images: Vec<String>,
    pub genre: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_restriction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: GigStatus,
    pub hash: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Venue {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GigStatus {
    #[default]
    Scheduled,
    Cancelled,
    Postponed,
    Soldout,
    Rescheduled,
}

impl GigStatus {
    /// Read a status out of listing text such as "SOLD OUT" or "Cancelled - refunds available".
    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("cancel") {
            Some(GigStatus::Cancelled)
        } else if text.contains("postpone") {
            Some(GigStatus::Postponed)
        } else if text.contains("reschedul") {
            Some(GigStatus::Rescheduled)
        } else if text.contains("sold out") || text.contains("soldout") || text.contains("sold-out") {
            Some(GigStatus::Soldout)
        } else if text.contains("scheduled") || text.contains("on sale") {
            Some(GigStatus::Scheduled)
        } else {
            None
        }
    }
}

impl fmt::Display for GigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GigStatus::Scheduled => "scheduled",
            GigStatus::Cancelled => "cancelled",
            GigStatus::Postponed => "postponed",
            GigStatus::Soldout => "soldout",
            GigStatus::Rescheduled => "rescheduled",
        };
        f.write_str(s)
    }
}

fn id_part(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Stable id from venue, title, start and city; case and whitespace do not matter.
pub fn gig_id(venue: &str, title: &str, date_start: &str, city: Option<&str>) -> String {
    let key = [venue, title, date_start, city.unwrap_or("")]
        .iter()
        .map(|part| id_part(part))
        .collect::<Vec<_>>()
        .join("|");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// SHA-256 over every normalized field except `hash` and `updatedAt`.
pub fn content_hash(gig: &Gig) -> String {
    let mut value = serde_json::to_value(gig).unwrap_or(Value::Null);
    if let Some(fields) = value.as_object_mut() {
        fields.remove("hash");
        fields.remove("updatedAt");
    }
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
