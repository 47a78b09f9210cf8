//! Client library for a spreadsheet-backed gym membership directory.
//!
//! Members look themselves up by id; an administrator verifies the shared
//! password once per session and can then add, edit, renew and delete
//! records. Plan arithmetic and status derivation live in [`lifecycle`] and
//! never touch the network.

pub mod client;
pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod member;
pub mod roster;
pub mod wire;

pub use client::{DirectoryClient, DirectoryError, Renewal};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AdminSession, ConfigError, ConfigStore, DirectoryConfig, SessionState};
pub use lifecycle::ValidationError;
pub use member::{
    Member, MemberId, MemberSnapshot, MemberStatus, MemberUpdate, MembershipType, NewMember,
};
pub use roster::{Roster, RosterFilter, RosterStats};
