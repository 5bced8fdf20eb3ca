//! Audience resolution
//!
//! Turns a [`TargetingRule`] into the concrete, ordered list of recipients
//! one job will contact, and summarizes the directory for the operator's
//! confirmation screen.

use crate::error::FanoutError;
use fieldops_types::{DirectorySnapshot, Recipient, RecipientStatus, TargetingRule};
use std::collections::{BTreeMap, HashSet};

/// Label used for recipients without a region in summaries
pub const UNSPECIFIED_REGION: &str = "unspecified";

/// Resolved, duplicate-free recipient list for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audience {
    rule: TargetingRule,
    recipients: Vec<Recipient>,
}

impl Audience {
    /// Rule this audience was resolved from
    #[inline]
    #[must_use]
    pub fn rule(&self) -> &TargetingRule {
        &self.rule
    }

    /// Recipients, in directory order
    #[inline]
    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Number of recipients
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    /// Always false for an audience returned by [`resolve`]
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    /// Iterate recipients
    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.recipients.iter()
    }
}

/// Resolve a targeting rule against a directory snapshot
///
/// Deterministic for a fixed snapshot: recipients keep directory order and
/// each identifier appears once.
///
/// # Errors
/// Returns [`FanoutError::EmptyAudience`] when nobody matches. Callers must
/// surface it without dispatching.
pub fn resolve(rule: &TargetingRule, snapshot: &DirectorySnapshot) -> Result<Audience, FanoutError> {
    let mut seen = HashSet::new();
    let recipients: Vec<Recipient> = snapshot
        .iter()
        .filter(|r| rule.matches(r))
        .filter(|r| seen.insert(r.id.clone()))
        .cloned()
        .collect();

    if recipients.is_empty() {
        return Err(FanoutError::EmptyAudience { rule: rule.clone() });
    }

    tracing::debug!(rule = %rule, recipients = recipients.len(), "audience resolved");
    Ok(Audience {
        rule: rule.clone(),
        recipients,
    })
}

/// Per-region counts for region targeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBreakdown {
    pub region: String,
    pub active: usize,
    pub total: usize,
}

/// Directory overview shown before the administrator picks a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudienceSummary {
    pub total: usize,
    pub active: usize,
    pub pending: usize,
    pub blocked: usize,
    /// Largest regions first, at most three; missing regions count as "unspecified"
    pub top_regions: Vec<(String, usize)>,
    /// Declared regions sorted by name
    pub regions: Vec<RegionBreakdown>,
}

impl AudienceSummary {
    /// Count for one status
    #[must_use]
    pub fn count(&self, status: RecipientStatus) -> usize {
        match status {
            RecipientStatus::Active => self.active,
            RecipientStatus::Pending => self.pending,
            RecipientStatus::Blocked => self.blocked,
        }
    }
}

/// Summarize a directory snapshot
#[must_use]
pub fn summarize(snapshot: &DirectorySnapshot) -> AudienceSummary {
    let mut summary = AudienceSummary {
        total: snapshot.len(),
        ..AudienceSummary::default()
    };
    let mut all_regions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut declared: BTreeMap<&str, RegionBreakdown> = BTreeMap::new();

    for recipient in snapshot.iter() {
        match recipient.status {
            RecipientStatus::Active => summary.active += 1,
            RecipientStatus::Pending => summary.pending += 1,
            RecipientStatus::Blocked => summary.blocked += 1,
        }

        let region = recipient.region.as_deref();
        *all_regions.entry(region.unwrap_or(UNSPECIFIED_REGION)).or_default() += 1;

        if let Some(region) = region {
            let entry = declared.entry(region).or_insert_with(|| RegionBreakdown {
                region: region.to_string(),
                active: 0,
                total: 0,
            });
            entry.total += 1;
            if recipient.status == RecipientStatus::Active {
                entry.active += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = all_regions
        .into_iter()
        .map(|(region, count)| (region.to_string(), count))
        .collect();
    // Stable sort keeps name order among ties.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(3);

    summary.top_regions = ranked;
    summary.regions = declared.into_values().collect();
    summary
}
