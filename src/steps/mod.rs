//! Step model for multi-phase swap progress
//!
//! This module provides:
//! - Typed step descriptors with shallow-merge semantics
//! - Step records and ordered step lists
//! - The canonical cross-venue swap template
//! - Pure reconciliation functions (see [`merge`])

pub mod identity;
pub mod merge;

pub use identity::{ChainScopedIdentity, IdentityKind, StepIdentity, StepTypeIdentity};
pub use merge::{all_done, merge_complete, merge_list, seed, signature};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical phase type tags emitted by the swap execution engine
pub mod phase {
    pub const SWAP_START: &str = "SWAP_START";
    pub const DETERMINING_SWAP: &str = "DETERMINING_SWAP";
    pub const CREATE_PERMIT_FOR_SOURCE_SWAP: &str = "CREATE_PERMIT_FOR_SOURCE_SWAP";
    pub const SOURCE_SWAP_BATCH_TX: &str = "SOURCE_SWAP_BATCH_TX";
    pub const SOURCE_SWAP_HASH: &str = "SOURCE_SWAP_HASH";
    pub const RFF_ID: &str = "RFF_ID";
    pub const DESTINATION_SWAP_BATCH_TX: &str = "DESTINATION_SWAP_BATCH_TX";
    pub const DESTINATION_SWAP_HASH: &str = "DESTINATION_SWAP_HASH";
    pub const SWAP_COMPLETE: &str = "SWAP_COMPLETE";

    /// Phase order of a cross-venue swap
    pub const CANONICAL_SWAP: [&str; 9] = [
        SWAP_START,
        DETERMINING_SWAP,
        CREATE_PERMIT_FOR_SOURCE_SWAP,
        SOURCE_SWAP_BATCH_TX,
        SOURCE_SWAP_HASH,
        RFF_ID,
        DESTINATION_SWAP_BATCH_TX,
        DESTINATION_SWAP_HASH,
        SWAP_COMPLETE,
    ];
}

/// Describes one phase of a swap
///
/// Fields other than `step_type` are filled in by the execution engine as the
/// phase runs, so most of them are only known once the phase completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Phase type tag, e.g. `SOURCE_SWAP_HASH`
    #[serde(rename = "type")]
    pub step_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// Transaction hash produced by the phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,

    /// Request-for-funds identifier assigned by the solver network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,

    /// Amount as a decimal string, never a float
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Fields this crate does not model explicitly
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StepDescriptor {
    /// Create a descriptor carrying only a phase type
    pub fn new(step_type: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            ..Default::default()
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: impl Into<String>) -> Self {
        self.tx_hash = Some(tx_hash.into());
        self
    }

    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = Some(url.into());
        self
    }

    pub fn with_intent_id(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Shallow union with a newer descriptor for the same phase.
    ///
    /// Every field present on `newer` wins; fields absent on `newer` keep the
    /// value already held. `extra` is unioned key by key the same way.
    pub fn absorb(mut self, newer: StepDescriptor) -> Self {
        let StepDescriptor {
            step_type,
            chain_id,
            tx_hash,
            explorer_url,
            intent_id,
            amount,
            token,
            extra,
        } = newer;

        if !step_type.is_empty() {
            self.step_type = step_type;
        }
        self.chain_id = chain_id.or(self.chain_id);
        self.tx_hash = tx_hash.or(self.tx_hash);
        self.explorer_url = explorer_url.or(self.explorer_url);
        self.intent_id = intent_id.or(self.intent_id);
        self.amount = amount.or(self.amount);
        self.token = token.or(self.token);
        self.extra.extend(extra);
        self
    }
}

/// A step descriptor plus its completion flag and display position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Index within the current list; recomputed whenever the list is replaced
    pub position: usize,
    pub completed: bool,
    pub step: StepDescriptor,
}

/// Ordered sequence of step records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepList {
    records: Vec<StepRecord>,
}

impl StepList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from `(completed, step)` pairs, numbering positions in order
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (bool, StepDescriptor)>,
    {
        let records = entries
            .into_iter()
            .enumerate()
            .map(|(position, (completed, step))| StepRecord {
                position,
                completed,
                step,
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StepRecord> {
        self.records.iter()
    }

    pub fn get(&self, position: usize) -> Option<&StepRecord> {
        self.records.get(position)
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of completed records
    pub fn completed_count(&self) -> usize {
        self.records.iter().filter(|r| r.completed).count()
    }

    pub fn into_records(self) -> Vec<StepRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a StepList {
    type Item = &'a StepRecord;
    type IntoIter = std::slice::Iter<'a, StepRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// The canonical 9-phase cross-venue swap template
pub fn canonical_swap_template() -> Vec<StepDescriptor> {
    phase::CANONICAL_SWAP
        .iter()
        .map(|step_type| StepDescriptor::new(*step_type))
        .collect()
}
