use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    lifecycle::{self, ValidationError},
    wire::de,
};

/// Human-assigned member key such as `GYM001`.
///
/// Never empty. Ids typed by a person go through [`MemberId::parse`], which
/// trims and upper-cases them. Ids read back from the directory are kept
/// exactly as stored, because the directory matches ids exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    pub fn parse<S>(raw: S) -> Result<Self, ValidationError>
    where
        S: AsRef<str>,
    {
        let id = raw.as_ref().trim().to_uppercase();

        if id.is_empty() {
            return Err(ValidationError::EmptyMemberId);
        }

        Ok(Self(id))
    }

    /// Wraps an id as the directory stored it, without normalising it.
    pub fn verbatim<S>(raw: S) -> Result<Self, ValidationError>
    where
        S: Into<String>,
    {
        let id = raw.into();

        if id.trim().is_empty() {
            return Err(ValidationError::EmptyMemberId);
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for MemberId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for MemberId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = de::text(deserializer)?;
        Self::verbatim(raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MembershipType {
    #[serde(rename = "3 Months")]
    ThreeMonths,
    #[serde(rename = "6 Months")]
    SixMonths,
    #[serde(rename = "1 Year")]
    OneYear,
}

impl MembershipType {
    pub const ALL: [MembershipType; 3] = [Self::ThreeMonths, Self::SixMonths, Self::OneYear];

    pub fn label(self) -> &'static str {
        match self {
            Self::ThreeMonths => "3 Months",
            Self::SixMonths => "6 Months",
            Self::OneYear => "1 Year",
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for MembershipType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();

        Self::ALL
            .into_iter()
            .find(|plan| plan.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownPlan(wanted.to_string()))
    }
}

/// Spreadsheet cells are edited by hand, so `3 months` reads as `3 Months`.
impl<'de> Deserialize<'de> for MembershipType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = de::text(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberStatus {
    Active,
    Expired,
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.pad("Active"),
            Self::Expired => f.pad("Expired"),
        }
    }
}

/// The stored part of a member record.
///
/// The client derives `end_date` from the plan and start date whenever it
/// creates, edits or renews a record. A record read from the directory
/// keeps the directory's `endDate`. Status fields sent by the directory are
/// dropped on deserialization; use [`Member::snapshot`] to derive them for a
/// given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    id: MemberId,
    #[serde(deserialize_with = "de::text")]
    name: String,
    #[serde(default, deserialize_with = "de::text")]
    phone: String,
    #[serde(default, deserialize_with = "de::whole_number")]
    age: u32,
    #[serde(default, deserialize_with = "de::whole_number")]
    weight: u32,
    membership_type: MembershipType,
    #[serde(deserialize_with = "de::date")]
    start_date: NaiveDate,
    #[serde(deserialize_with = "de::date")]
    end_date: NaiveDate,
}

impl Member {
    pub fn new(
        id: MemberId,
        name: String,
        phone: String,
        age: u32,
        weight: u32,
        membership_type: MembershipType,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            name,
            phone,
            age,
            weight,
            membership_type,
            start_date,
            end_date: lifecycle::compute_end_date(start_date, membership_type),
        }
    }

    pub fn id(&self) -> &MemberId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn membership_type(&self) -> MembershipType {
        self.membership_type
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub(crate) fn set_plan(&mut self, membership_type: MembershipType, start_date: NaiveDate) {
        self.membership_type = membership_type;
        self.start_date = start_date;
        self.end_date = lifecycle::compute_end_date(start_date, membership_type);
    }

    pub fn snapshot(self, today: NaiveDate) -> MemberSnapshot {
        MemberSnapshot {
            status: lifecycle::compute_status(self.end_date, today),
            days_remaining: lifecycle::compute_days_remaining(self.end_date, today),
            member: self,
        }
    }
}

/// A member together with the status derived for one particular day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSnapshot {
    #[serde(flatten)]
    pub member: Member,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<u32>,
}

impl MemberSnapshot {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Form data for enrolling a new member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub id: MemberId,
    pub name: String,
    pub phone: String,
    pub age: u32,
    pub weight: u32,
    pub membership_type: MembershipType,
    pub start_date: NaiveDate,
}

impl NewMember {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }

        Ok(())
    }

    pub fn into_member(self) -> Result<Member, ValidationError> {
        self.validate()?;

        Ok(Member::new(
            self.id,
            self.name.trim().to_string(),
            self.phone.trim().to_string(),
            self.age,
            self.weight,
            self.membership_type,
            self.start_date,
        ))
    }
}

/// Fields an admin may change on an existing member. The id is not one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub weight: Option<u32>,
    pub membership_type: Option<MembershipType>,
    pub start_date: Option<NaiveDate>,
}

impl MemberUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges the supplied fields into `member`, recomputing the end date
    /// when the plan or start date moves.
    pub fn apply_to(&self, member: &mut Member) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::MissingField("name"));
            }
            member.name = name.to_string();
        }
        if let Some(phone) = &self.phone {
            member.phone = phone.trim().to_string();
        }
        if let Some(age) = self.age {
            member.age = age;
        }
        if let Some(weight) = self.weight {
            member.weight = weight;
        }

        let plan = self.membership_type.unwrap_or(member.membership_type);
        let start = self.start_date.unwrap_or(member.start_date);
        if plan != member.membership_type || start != member.start_date {
            member.set_plan(plan, start);
        }

        Ok(())
    }
}
