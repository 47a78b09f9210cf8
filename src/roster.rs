use std::str::FromStr;

use crate::member::{MemberId, MemberSnapshot, MemberStatus};

const ID_PREFIX: &str = "GYM";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RosterFilter {
    #[default]
    All,
    Active,
    Expired,
}

impl RosterFilter {
    pub fn matches(self, status: MemberStatus) -> bool {
        match self {
            Self::All => true,
            Self::Active => status == MemberStatus::Active,
            Self::Expired => status == MemberStatus::Expired,
        }
    }
}

impl FromStr for RosterFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown filter '{other}' (expected all, active or expired)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosterStats {
    pub total: usize,
    pub active: usize,
    pub expired: usize,
}

/// Every member as of one fetch, with status already derived.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<MemberSnapshot>,
}

impl Roster {
    pub fn new(mut entries: Vec<MemberSnapshot>) -> Self {
        entries.sort_by(|a, b| a.member.id().cmp(b.member.id()));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemberSnapshot> {
        self.entries.iter()
    }

    pub fn get(&self, id: &MemberId) -> Option<&MemberSnapshot> {
        self.entries.iter().find(|entry| entry.member.id() == id)
    }

    pub fn filtered(&self, filter: RosterFilter) -> impl Iterator<Item = &MemberSnapshot> {
        self.entries.iter().filter(move |entry| filter.matches(entry.status))
    }

    pub fn stats(&self) -> RosterStats {
        self.entries.iter().fold(RosterStats::default(), |mut stats, entry| {
            stats.total += 1;
            match entry.status {
                MemberStatus::Active => stats.active += 1,
                MemberStatus::Expired => stats.expired += 1,
            }
            stats
        })
    }

    /// `GYM` followed by the roster size plus one, zero-padded to three
    /// digits, skipping forward past any id already taken.
    pub fn suggest_next_id(&self) -> MemberId {
        let mut n = self.entries.len() + 1;

        loop {
            let candidate = format!("{ID_PREFIX}{n:03}");
            if !self.entries.iter().any(|entry| entry.member.id().as_str() == candidate) {
                // Prefix plus digits always parses.
                return MemberId::parse(candidate).unwrap_or_else(|_| unreachable!());
            }
            n += 1;
        }
    }
}

impl From<Vec<MemberSnapshot>> for Roster {
    fn from(entries: Vec<MemberSnapshot>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::member::{Member, MembershipType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn build(ids_and_starts: &[(&str, NaiveDate)], today: NaiveDate) -> Roster {
        ids_and_starts
            .iter()
            .map(|(id, start)| {
                Member::new(
                    MemberId::parse(id).unwrap(),
                    format!("Member {id}"),
                    String::new(),
                    30,
                    70,
                    MembershipType::ThreeMonths,
                    *start,
                )
                .snapshot(today)
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_stats_and_filters() {
        let today = date(2024, 6, 1);
        let roster = build(
            &[
                ("GYM003", date(2024, 5, 1)),
                ("GYM001", date(2023, 1, 1)),
                ("GYM002", date(2024, 4, 1)),
            ],
            today,
        );

        let expected = RosterStats {
            total: 3,
            active: 2,
            expired: 1,
        };
        assert_eq!(expected, roster.stats());

        let ids = |filter: RosterFilter| {
            roster
                .filtered(filter)
                .map(|e| e.member.id().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(vec!["GYM002", "GYM003"], ids(RosterFilter::Active));
        assert_eq!(vec!["GYM001"], ids(RosterFilter::Expired));

        assert_eq!(3, roster.filtered(RosterFilter::All).count());
    }

    #[test]
    fn test_suggest_next_id_skips_taken() {
        let today = date(2024, 6, 1);
        assert_eq!("GYM001", Roster::default().suggest_next_id().as_str());

        let roster = build(&[("GYM001", today), ("GYM003", today)], today);
        assert_eq!("GYM004", roster.suggest_next_id().as_str());

        let roster = build(&[("GYM002", today)], today);
        assert_eq!("GYM003", roster.suggest_next_id().as_str());
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!(Ok(RosterFilter::Expired), "Expired".parse());
        assert!("lapsed".parse::<RosterFilter>().is_err());
    }
}
