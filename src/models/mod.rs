use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PelaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCategory {
    /// Best player of the match.
    Craque,
    /// Worst player of the match.
    Bagre,
}

impl VoteCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCategory::Craque => "craque",
            VoteCategory::Bagre => "bagre",
        }
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteCategory {
    type Err = PelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "craque" => Ok(VoteCategory::Craque),
            "bagre" => Ok(VoteCategory::Bagre),
            other => Err(PelaError::InvalidInput(format!("unknown vote category '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub match_id: String,
    pub voter_id: String,
    pub voted_user_id: String,
    pub category: VoteCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    #[serde(skip_serializing)]
    pub id: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

/// Displayable plurality winner of one match and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinnerResult {
    pub user_id: String,
    pub vote_count: u32,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(guild_id: String, name: String, created_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            guild_id,
            name,
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }
}

impl FromStr for GroupRole {
    type Err = PelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(GroupRole::Admin),
            "member" => Ok(GroupRole::Member),
            other => Err(PelaError::Corrupt(format!("unknown group role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub group_id: String,
    pub user_id: String,
    pub role: GroupRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub group_id: String,
    pub location: String,
    pub scheduled_at: DateTime<Utc>,
    /// Discord channel where the craque/bagre results get announced.
    pub channel_id: Option<String>,
    pub results_announced: bool,
}

impl Match {
    pub fn new(
        group_id: String,
        location: String,
        scheduled_at: DateTime<Utc>,
        channel_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_id,
            location,
            scheduled_at,
            channel_id,
            results_announced: false,
        }
    }

    /// Saturates at the latest representable instant instead of overflowing.
    pub fn voting_closes_at(&self, window_hours: i64) -> DateTime<Utc> {
        Duration::try_hours(window_hours)
            .and_then(|window| self.scheduled_at.checked_add_signed(window))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_voting_open(&self, now: DateTime<Utc>, window_hours: i64) -> bool {
        now >= self.scheduled_at && now <= self.voting_closes_at(window_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsvpStatus {
    Confirmed,
    Declined,
}

impl RsvpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Confirmed => "confirmed",
            RsvpStatus::Declined => "declined",
        }
    }
}

impl FromStr for RsvpStatus {
    type Err = PelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(RsvpStatus::Confirmed),
            "declined" => Ok(RsvpStatus::Declined),
            other => Err(PelaError::InvalidInput(format!("unknown RSVP status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = PelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(PelaError::InvalidInput(format!("unknown transaction kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount_cents: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        group_id: String,
        user_id: String,
        kind: TransactionKind,
        amount_cents: i64,
        description: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            group_id,
            user_id,
            kind,
            amount_cents,
            description,
            created_at: Utc::now(),
        }
    }

    /// Effect of this transaction on the group's cash balance.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Income => self.amount_cents,
            TransactionKind::Expense => -self.amount_cents,
        }
    }
}
