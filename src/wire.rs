//! JSON shapes exchanged with the directory endpoint.
//!
//! Reads are `GET ?action=...` queries. Admin writes are a single JSON object
//! carrying the password, the action name and the action's own fields.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::member::{Member, MemberId, MembershipType};

pub const ACTION_LOOKUP: &str = "lookup";
pub const ACTION_GET_ALL: &str = "getAll";
pub const ACTION_ADD: &str = "addMember";
pub const ACTION_UPDATE: &str = "updateMember";
pub const ACTION_RENEW: &str = "renewMember";
pub const ACTION_DELETE: &str = "deleteMember";

/// Body of every admin POST.
#[derive(Debug, Serialize)]
pub struct AdminRequest<'a> {
    pub password: &'a str,
    #[serde(flatten)]
    pub action: AdminAction<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "action")]
pub enum AdminAction<'a> {
    #[serde(rename = "addMember")]
    AddMember { member: &'a Member },

    #[serde(rename = "updateMember")]
    UpdateMember { member: &'a Member },

    #[serde(rename = "renewMember", rename_all = "camelCase")]
    RenewMember {
        member_id: &'a MemberId,
        membership_type: MembershipType,
        start_date: NaiveDate,
    },

    #[serde(rename = "deleteMember", rename_all = "camelCase")]
    DeleteMember { member_id: &'a MemberId },
}

impl AdminAction<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddMember { .. } => ACTION_ADD,
            Self::UpdateMember { .. } => ACTION_UPDATE,
            Self::RenewMember { .. } => ACTION_RENEW,
            Self::DeleteMember { .. } => ACTION_DELETE,
        }
    }
}

/// Any reply from the directory. Anything but `success: true` is a failure.
///
/// Member rows stay as raw JSON here. The sheet may hold blank or half-filled
/// rows, and one bad row must not spoil the rest of the reply.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub member: Option<Value>,
    pub members: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "de::optional_text")]
    pub new_end_date: Option<String>,
}

/// Lenient field readers for spreadsheet-sourced values, where a phone
/// number may arrive as a JSON number and an age as a string.
pub(crate) mod de {
    use chrono::NaiveDate;
    use serde::{de::Error, Deserialize, Deserializer};
    use serde_json::Value;

    use crate::lifecycle;

    fn value_to_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            value @ (Value::String(_) | Value::Number(_) | Value::Bool(_)) => {
                Ok(value_to_text(value).unwrap_or_default())
            }
            other => Err(D::Error::custom(format!("expected text, found {other}"))),
        }
    }

    pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(value_to_text(Value::deserialize(deserializer)?))
    }

    pub fn whole_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = match Value::deserialize(deserializer)? {
            Value::Null => return Ok(0),
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => return Ok(0),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match number {
            Some(n) if n.is_finite() && n >= 0.0 && n <= f64::from(u32::MAX) => {
                Ok(n.round() as u32)
            }
            _ => Err(D::Error::custom("expected a non-negative whole number")),
        }
    }

    pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        lifecycle::parse_date(&raw).map_err(D::Error::custom)
    }
}
