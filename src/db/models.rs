//! Row shapes for the hosted tables.
//!
//! Identifiers are opaque strings. Timestamps arrive as ISO-8601 text and are
//! decoded into UTC. Rows are created and mutated by the backend; the insert and
//! update shapes here only describe what may be sent.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

/// Decodes an ISO-8601 timestamp. Values without an offset come from
/// `timestamp without time zone` columns and are taken as UTC.
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Binds a row type to the table it lives in.
pub trait Table: DeserializeOwned + Send + 'static {
    const NAME: &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Table for Profile {
    const NAME: &'static str = "profiles";
}

/// Insert payload for `profiles`; the backend fills in missing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileInsert {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileInsert {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            full_name: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Partial update for `profiles`.
///
/// `full_name` is doubly optional: `None` leaves the column alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Table for Conversation {
    const NAME: &'static str = "conversations";
}

/// Speaker of a message. Only these two values exist in the `messages` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Table for Message {
    const NAME: &'static str = "messages";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl TryFrom<&str> for RiskTolerance {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(RiskTolerance::Conservative),
            "moderate" => Ok(RiskTolerance::Moderate),
            "aggressive" => Ok(RiskTolerance::Aggressive),
            other => Err(format!("Unknown risk tolerance: {other}")),
        }
    }
}

/// Optional money picture attached one-to-one to a profile. Amounts are MXN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialProfile {
    pub id: String,
    pub user_id: String,
    pub monthly_income: Option<f64>,
    pub monthly_expenses: Option<f64>,
    pub savings: Option<f64>,
    pub debt: Option<f64>,
    pub risk_tolerance: Option<String>,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl FinancialProfile {
    /// The stored tolerance, if it is one of the recognised levels.
    pub fn risk_tolerance(&self) -> Option<RiskTolerance> {
        self.risk_tolerance
            .as_deref()
            .and_then(|s| RiskTolerance::try_from(s).ok())
    }

    /// Income left after expenses, when both are known.
    pub fn monthly_surplus(&self) -> Option<f64> {
        Some(self.monthly_income? - self.monthly_expenses?)
    }
}

impl Table for FinancialProfile {
    const NAME: &'static str = "financial_profiles";
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_role_accepts_only_user_and_assistant() {
        let row = |role: &str| {
            json!({
                "id": "m1",
                "conversation_id": "c1",
                "role": role,
                "content": "hola",
                "created_at": "2024-05-01T12:00:00+00:00"
            })
        };

        let msg: Message = serde_json::from_value(row("assistant")).unwrap();
        assert_eq!(msg.role, MessageRole::Assistant);

        assert!(serde_json::from_value::<Message>(row("system")).is_err());
        assert!(serde_json::from_value::<Message>(row("USER")).is_err());
        assert!(MessageRole::try_from("moderator").is_err());
    }

    #[test]
    fn nullable_columns_decode_to_none() {
        let conv: Conversation = serde_json::from_value(json!({
            "id": "c1",
            "user_id": "u1",
            "title": null,
            "created_at": "2024-05-01T12:00:00.123456+00:00",
            "updated_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(conv.title, None);
    }

    #[test]
    fn timestamps_without_offset_are_utc() {
        let conv: Conversation = serde_json::from_value(json!({
            "id": "c1",
            "user_id": "u1",
            "title": "Metas 2024",
            "created_at": "2024-05-01T12:00:00.123456",
            "updated_at": "2024-05-01 12:30:00"
        }))
        .unwrap();
        assert_eq!(conv.created_at.to_rfc3339(), "2024-05-01T12:00:00.123456+00:00");
        assert_eq!(conv.updated_at.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn offset_timestamps_are_converted_to_utc() {
        let msg: Message = serde_json::from_value(json!({
            "id": "m1",
            "conversation_id": "c1",
            "role": "user",
            "content": "hola",
            "created_at": "2024-05-01T06:00:00-06:00"
        }))
        .unwrap();
        assert_eq!(msg.created_at.to_rfc3339(), "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let result = serde_json::from_value::<Message>(json!({
            "id": "m1",
            "conversation_id": "c1",
            "role": "user",
            "content": "hola",
            "created_at": "ayer"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn profile_update_serializes_only_set_fields() {
        let update = ProfileUpdate {
            full_name: Some(None),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "full_name": null }));
        assert!(ProfileUpdate::default().is_empty());
        assert!(!update.is_empty());
    }

    #[test]
    fn financial_profile_helpers() {
        let profile: FinancialProfile = serde_json::from_value(json!({
            "id": "f1",
            "user_id": "u1",
            "monthly_income": 25000.0,
            "monthly_expenses": 18000.5,
            "savings": null,
            "debt": 4000,
            "risk_tolerance": "Moderate",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(profile.risk_tolerance(), Some(RiskTolerance::Moderate));
        assert_eq!(profile.monthly_surplus(), Some(6999.5));
        assert_eq!(profile.savings, None);
        assert_eq!(profile.debt, Some(4000.0));
    }
}
