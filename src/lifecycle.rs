//! Plan durations, end dates and status derivation.
//!
//! Everything here is a pure function of its arguments. Plans use fixed day
//! counts rather than calendar months so the same start date always yields
//! the same end date regardless of month lengths.

use chrono::{DateTime, Days, Local, NaiveDate};
use thiserror::Error;

use crate::member::{Member, MemberStatus, MembershipType};

/// Wire and display format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a Member ID")]
    EmptyMemberId,

    #[error("Unknown membership plan '{0}' (expected 3 Months, 6 Months or 1 Year)")]
    UnknownPlan(String),

    #[error("'{0}' is not a valid date (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

pub fn plan_duration_days(plan: MembershipType) -> u64 {
    match plan {
        MembershipType::ThreeMonths => 90,
        MembershipType::SixMonths => 180,
        MembershipType::OneYear => 365,
    }
}

/// Last valid day of a plan that begins on `start`.
///
/// Saturates at [`NaiveDate::MAX`] instead of overflowing.
pub fn compute_end_date(start: NaiveDate, plan: MembershipType) -> NaiveDate {
    start
        .checked_add_days(Days::new(plan_duration_days(plan)))
        .unwrap_or(NaiveDate::MAX)
}

/// A member stays active through their end date, inclusive.
pub fn compute_status(end_date: NaiveDate, today: NaiveDate) -> MemberStatus {
    if today <= end_date {
        MemberStatus::Active
    } else {
        MemberStatus::Expired
    }
}

/// Whole days left on the plan, or `None` once it has expired.
pub fn compute_days_remaining(end_date: NaiveDate, today: NaiveDate) -> Option<u32> {
    match compute_status(end_date, today) {
        MemberStatus::Active => {
            let days = (end_date - today).num_days().max(0);
            Some(u32::try_from(days).unwrap_or(u32::MAX))
        }
        MemberStatus::Expired => None,
    }
}

/// Parses a calendar date.
///
/// Accepts `YYYY-MM-DD` as well as full RFC 3339 timestamps, which is how
/// spreadsheet date cells come back over JSON. Timestamps are converted to
/// the local calendar day.
pub fn parse_date<S>(raw: S) -> Result<NaiveDate, ValidationError>
where
    S: AsRef<str>,
{
    let raw = raw.as_ref().trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Local).date_naive())
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Starts a new plan cycle for `member` on `new_start`.
///
/// Only the plan fields change; identity and contact details are kept.
pub fn renew<S>(
    member: &Member,
    plan: MembershipType,
    new_start: S,
) -> Result<Member, ValidationError>
where
    S: AsRef<str>,
{
    let start = parse_date(new_start)?;
    Ok(renew_on(member, plan, start))
}

pub fn renew_on(member: &Member, plan: MembershipType, start: NaiveDate) -> Member {
    let mut renewed = member.clone();
    renewed.set_plan(plan, start);
    renewed
}
