//! Per-record outcomes and batch reports for call reconciliation.
//!
//! A sync pass never aborts on a single bad record; instead each record
//! yields a [`RecordOutcome`] and the pass returns a [`BatchReport`] that
//! tests and the HTTP layer can inspect.

use serde::Serialize;

use crate::types::DbId;

/// Why a record was passed over without touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingEntryId,
    MissingPhoneNumber,
    /// Another writer inserted the same external id between our lookup and insert.
    DuplicateExternalId,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingEntryId => "missing_entry_id",
            Self::MissingPhoneNumber => "missing_phone_number",
            Self::DuplicateExternalId => "duplicate_external_id",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of reconciling one provider record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// A new local call row was written.
    Created {
        call_id: DbId,
        contact_id: DbId,
        deal_id: Option<DbId>,
        contact_created: bool,
        deal_created: bool,
        has_recording: bool,
    },
    /// An existing call without a recording got one.
    RecordingAttached { call_id: DbId },
    /// Already reconciled; nothing to do.
    AlreadySynced { call_id: DbId },
    Skipped { reason: SkipReason },
    Failed { entry_id: Option<String>, error: String },
}

impl RecordOutcome {
    /// Counts toward the `synced` total of a pass.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Created { .. } | Self::RecordingAttached { .. })
    }
}

/// Everything a sync pass did, record by record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub synced: usize,
    pub recordings_updated: usize,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: RecordOutcome) {
        self.total += 1;
        if outcome.is_synced() {
            self.synced += 1;
        }
        if matches!(outcome, RecordOutcome::RecordingAttached { .. }) {
            self.recordings_updated += 1;
        }
        self.outcomes.push(outcome);
    }

    pub fn created(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Created { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Failed { .. }))
            .count()
    }
}
