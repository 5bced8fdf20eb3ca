//! Recipients and directory snapshots
//!
//! The user directory is owned by an external store. The fanout engine only
//! reads a [`DirectorySnapshot`] of it for filtering and never mutates it.

use crate::error::ParseStatusError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Opaque, stable recipient identifier (the chat id on the provider side)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub String);

impl RecipientId {
    /// Create a recipient id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Account status of a technician in the directory
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    /// Approved and working
    #[default]
    Active,
    /// Awaiting approval
    Pending,
    /// Access revoked by an administrator
    Blocked,
}

impl RecipientStatus {
    /// All statuses, in display order
    pub const ALL: [RecipientStatus; 3] = [Self::Active, Self::Pending, Self::Blocked];

    /// Lowercase name used in config files and messages
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipientStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "blocked" => Ok(Self::Blocked),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A technician reachable through the chat provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Directory identifier
    pub id: RecipientId,
    /// Account status (missing status reads as active)
    #[serde(default)]
    pub status: RecipientStatus,
    /// Operating region, if the technician declared one
    #[serde(default)]
    pub region: Option<String>,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
}

impl Recipient {
    /// Create an active recipient with no region
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: RecipientId::new(id),
            status: RecipientStatus::Active,
            region: None,
            display_name: display_name.into(),
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: RecipientStatus) -> Self {
        self.status = status;
        self
    }

    /// With region
    #[inline]
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Name shown in failure lines, falling back to the identifier
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.display_name.trim();
        if name.is_empty() {
            format!("ID {}", self.id)
        } else {
            name.to_string()
        }
    }
}

/// Insertion-ordered, duplicate-free copy of the user directory
///
/// The first recipient seen for an identifier wins; later duplicates are
/// dropped. Iteration order is insertion order, which keeps audience
/// resolution deterministic for a fixed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Recipient>", into = "Vec<Recipient>")]
pub struct DirectorySnapshot {
    entries: IndexMap<RecipientId, Recipient>,
}

impl DirectorySnapshot {
    /// Create an empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a recipient
    ///
    /// Returns `false` (and keeps the existing entry) if the id is already present.
    pub fn insert(&mut self, recipient: Recipient) -> bool {
        if self.entries.contains_key(&recipient.id) {
            return false;
        }
        self.entries.insert(recipient.id.clone(), recipient);
        true
    }

    /// Look up a recipient by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &RecipientId) -> Option<&Recipient> {
        self.entries.get(id)
    }

    /// Number of recipients
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no recipients
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate recipients in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Recipient> {
        self.entries.values()
    }
}

impl FromIterator<Recipient> for DirectorySnapshot {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for recipient in iter {
            snapshot.insert(recipient);
        }
        snapshot
    }
}

impl From<Vec<Recipient>> for DirectorySnapshot {
    fn from(recipients: Vec<Recipient>) -> Self {
        recipients.into_iter().collect()
    }
}

impl From<DirectorySnapshot> for Vec<Recipient> {
    fn from(snapshot: DirectorySnapshot) -> Self {
        snapshot.entries.into_values().collect()
    }
}
