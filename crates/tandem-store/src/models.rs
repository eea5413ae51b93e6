use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of an invite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Consumed,
}

impl fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Consumed => "consumed",
        };
        f.write_str(s)
    }
}

impl FromStr for InviteStatus {
    type Err = InviteStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "consumed" => Ok(Self::Consumed),
            other => Err(InviteStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`InviteStatus`] string.
#[derive(Debug, Clone)]
pub struct InviteStatusParseError(pub String);

impl fmt::Display for InviteStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid invite status: {:?}", self.0)
    }
}

impl std::error::Error for InviteStatusParseError {}

// ---------------------------------------------------------------------------
// Plan documents
// ---------------------------------------------------------------------------

/// A single stop on a day's schedule.
///
/// Locations carry a generated id so concurrent add/remove from two clients
/// cannot misidentify entries the way positional indexing would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Location {
    pub fn new(name: impl Into<String>, note: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            note,
        }
    }
}

/// The schedule for one day of the trip, keyed in the plan by its day label
/// (`"Day 1"`, `"Day 2"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub completed: bool,
}

impl DayPlan {
    /// Whether this day holds anything worth preserving across a resize.
    pub fn has_content(&self) -> bool {
        self.title.is_some() || !self.locations.is_empty() || self.completed
    }
}

/// A comment on a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// A proposed flight or stay.
///
/// The business fields are an opaque JSON object; only votes and comments
/// have store-level semantics (toggle and append). A booking is always
/// written whole under its own map key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub details: serde_json::Value,
    #[serde(default)]
    pub votes: BTreeSet<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            details,
            votes: BTreeSet::new(),
            comments: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Toggle `identity`'s vote. Returns whether the vote is now present.
    pub fn toggle_vote(&mut self, identity: &str) -> bool {
        if !self.votes.remove(identity) {
            self.votes.insert(identity.to_owned());
            true
        } else {
            false
        }
    }
}

/// The shared plan document -- the only multi-writer resource in the tree.
///
/// `id` equals the creator's identity and never changes. Concurrent writes
/// resolve last-write-wins at the granularity of the individual field or
/// map key being written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub id: String,
    pub owner: String,
    pub members: Vec<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: i32,
    pub daily_plans: BTreeMap<String, DayPlan>,
    pub flights: BTreeMap<Uuid, Booking>,
    pub stays: BTreeMap<Uuid, Booking>,
    pub skipped_days: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl TravelPlan {
    /// A fresh plan owned (and keyed) by `identity`.
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        Self {
            id: identity.clone(),
            owner: identity.clone(),
            members: vec![identity],
            start_date: None,
            end_date: None,
            total_days: 0,
            daily_plans: BTreeMap::new(),
            flights: BTreeMap::new(),
            stays: BTreeMap::new(),
            skipped_days: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.members.iter().any(|m| m == identity)
    }

    /// Whether any day already holds content (guards destructive resizes).
    pub fn has_populated_days(&self) -> bool {
        self.daily_plans.values().any(DayPlan::has_content)
    }
}

// ---------------------------------------------------------------------------
// Pointer, invite, and grant records
// ---------------------------------------------------------------------------

/// Maps an identity to its current plan. One row per identity; switching
/// plans overwrites the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserPointer {
    pub identity: String,
    pub plan_id: String,
    pub joined_at: DateTime<Utc>,
}

impl UserPointer {
    pub fn new(identity: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            plan_id: plan_id.into(),
            joined_at: Utc::now(),
        }
    }
}

/// A single-use, time-boxed join code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invite {
    pub code: String,
    pub plan_id: String,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Pre-authorization for a non-member to read a plan during the join
/// protocol. Deleted on both the success and failure paths.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccessGrant {
    pub plan_id: String,
    pub identity: String,
    pub granted_at: DateTime<Utc>,
}

impl AccessGrant {
    pub fn new(plan_id: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            identity: identity.into(),
            granted_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
