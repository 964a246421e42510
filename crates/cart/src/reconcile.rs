//! Reconciliation engine: merge remote change events into the local store.
//!
//! Each entry is a last-writer-wins register keyed by its [`Stamp`]:
//!
//! 1. Unknown entry: insert the incoming state.
//! 2. Known entry: the incoming state replaces the local one only when its
//!    stamp is greater (`version` first, then `last_writer_id`
//!    lexicographically). Lower or equal stamps are discarded.
//!
//! Because the outcome depends only on the pair of stamps, every client
//! resolves the same conflict identically, re-delivery is a no-op, and the
//! stored version can never go backwards. No sequencer or total-order
//! broadcast is needed.

use tracing::{debug, warn};

use groupcart_core::{CartError, CartResult};
use groupcart_events::ChangeEvent;

use crate::clock::{Precedence, Stamp};
use crate::entry::CartEntry;
use crate::store::EntryStore;

/// What happened to one incoming change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sighting of the entry.
    Inserted,
    /// Higher version replaced the local value.
    Superseded,
    /// Equal version, larger writer id replaced the local value.
    WonTie,
    /// Equal version, smaller writer id; local value kept.
    LostTie,
    /// Identical stamp already stored.
    Duplicate,
    /// Lower version; discarded.
    Stale,
}

impl MergeOutcome {
    /// Whether the store changed (and the display should re-render).
    pub fn applied(self) -> bool {
        matches!(
            self,
            MergeOutcome::Inserted | MergeOutcome::Superseded | MergeOutcome::WonTie
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MergeOutcome::Inserted => "inserted",
            MergeOutcome::Superseded => "superseded",
            MergeOutcome::WonTie => "won_tie",
            MergeOutcome::LostTie => "lost_tie",
            MergeOutcome::Duplicate => "duplicate",
            MergeOutcome::Stale => "stale",
        }
    }
}

/// Per-outcome counters for a batch of merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub superseded: usize,
    pub won_tie: usize,
    pub lost_tie: usize,
    pub duplicate: usize,
    pub stale: usize,
    pub malformed: usize,
}

impl MergeReport {
    pub fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Superseded => self.superseded += 1,
            MergeOutcome::WonTie => self.won_tie += 1,
            MergeOutcome::LostTie => self.lost_tie += 1,
            MergeOutcome::Duplicate => self.duplicate += 1,
            MergeOutcome::Stale => self.stale += 1,
        }
    }

    /// Number of merges that changed the store.
    pub fn applied(&self) -> usize {
        self.inserted + self.superseded + self.won_tie
    }

    /// Number of merges that left the store untouched (malformed excluded).
    pub fn discarded(&self) -> usize {
        self.lost_tie + self.duplicate + self.stale
    }
}

/// Stateless merge rule. All state lives in the [`EntryStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine;

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Merge one change event.
    ///
    /// Reordering and duplication are handled by the rule, not reported as
    /// errors. The only error is [`CartError::MalformedEvent`] for events
    /// that violate entry invariants; the store is untouched in that case.
    pub fn apply(&self, store: &mut EntryStore, event: &ChangeEvent) -> CartResult<MergeOutcome> {
        event.validate()?;

        let incoming = Stamp::new(event.version, event.last_writer_id.clone());

        let outcome = match store.get(&event.entry_id) {
            None => MergeOutcome::Inserted,
            Some(local) => match Precedence::of(&incoming, local.stamp()) {
                Precedence::Supersedes => MergeOutcome::Superseded,
                Precedence::WinsTie => MergeOutcome::WonTie,
                Precedence::Duplicate => MergeOutcome::Duplicate,
                Precedence::LosesTie => MergeOutcome::LostTie,
                Precedence::Stale => MergeOutcome::Stale,
            },
        };

        if outcome.applied() {
            store.upsert(CartEntry::from_change(event));
        }

        debug!(
            entry_id = %event.entry_id,
            version = event.version,
            writer = %event.last_writer_id,
            outcome = outcome.as_str(),
            "merged change event"
        );

        Ok(outcome)
    }

    /// Decode and merge a raw JSON change event.
    pub fn apply_wire(&self, store: &mut EntryStore, raw: &str) -> CartResult<MergeOutcome> {
        let event = ChangeEvent::from_json(raw).inspect_err(|err| {
            warn!(error = %err, "dropping malformed change event");
        })?;
        self.apply(store, &event)
    }

    /// Merge a batch (e.g. a bootstrap snapshot). Malformed events are counted
    /// and skipped; they never stop the batch.
    pub fn merge_all<'a>(
        &self,
        store: &mut EntryStore,
        events: impl IntoIterator<Item = &'a ChangeEvent>,
    ) -> MergeReport {
        let mut report = MergeReport::default();
        for event in events {
            match self.apply(store, event) {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    warn!(entry_id = %event.entry_id, error = %err, "skipping malformed change event");
                    report.malformed += 1;
                }
            }
        }
        report
    }
}
