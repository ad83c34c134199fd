//! Progress tracker owning the working step list
//!
//! The tracker is a plain owned value: every handler runs to completion and
//! the next call observes the state it produced. Hosting it behind a channel
//! or lock is the caller's concern (see [`crate::engine`]).

use crate::error::ProgressResult;
use crate::events::ProgressEvent;
use crate::steps::merge::{self, DEFAULT_SIGNATURE_SEPARATOR};
use crate::steps::{StepDescriptor, StepIdentity, StepList};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// What a steps-list event does when its signature matches the last one seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignaturePolicy {
    /// Merge every list; the signature is bookkeeping only
    #[default]
    AlwaysMerge,
    /// Skip the merge when the plan shape is unchanged
    SkipUnchanged,
}

/// Outcome of a steps-list event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOutcome {
    Merged { shape_changed: bool },
    Skipped,
}

/// Serializable view of the tracker at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub tracker_id: Uuid,
    pub steps: StepList,
    pub all_completed: bool,
    pub completed_count: usize,
    pub total: usize,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

/// Reconciles step events into a displayable progress list
pub struct ProgressTracker {
    id: Uuid,
    /// Expected-phase template used by construction and reset
    template: Option<Arc<[StepDescriptor]>>,
    identity: Arc<dyn StepIdentity>,
    policy: SignaturePolicy,
    separator: char,
    steps: StepList,
    /// `None` until a steps list has been observed
    last_signature: Option<String>,
    all_completed: bool,
    revision: u64,
    updated_at: DateTime<Utc>,
}

impl ProgressTracker {
    /// Create a tracker, seeded from `template` when one is given
    pub fn new(
        template: Option<Arc<[StepDescriptor]>>,
        identity: Arc<dyn StepIdentity>,
        policy: SignaturePolicy,
    ) -> Self {
        let steps = template
            .as_deref()
            .map(merge::seed)
            .unwrap_or_default();
        let all_completed = merge::all_done(&steps);

        Self {
            id: Uuid::new_v4(),
            template,
            identity,
            policy,
            separator: DEFAULT_SIGNATURE_SEPARATOR,
            steps,
            last_signature: None,
            all_completed,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Use a custom separator when joining keys into a signature
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn steps(&self) -> &StepList {
        &self.steps
    }

    pub fn all_completed(&self) -> bool {
        self.all_completed
    }

    /// Signature of the last observed plan shape, empty before any list
    pub fn last_signature(&self) -> &str {
        self.last_signature.as_deref().unwrap_or_default()
    }

    pub fn template(&self) -> Option<&[StepDescriptor]> {
        self.template.as_deref()
    }

    pub fn policy(&self) -> SignaturePolicy {
        self.policy
    }

    /// Incremented on every applied change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            tracker_id: self.id,
            steps: self.steps.clone(),
            all_completed: self.all_completed,
            completed_count: self.steps.completed_count(),
            total: self.steps.len(),
            revision: self.revision,
            updated_at: self.updated_at,
        }
    }

    /// Dispatch an external event to its handler
    pub fn apply(&mut self, event: ProgressEvent) -> ProgressResult<()> {
        match event {
            ProgressEvent::StepsList { steps } => self.on_steps_list(&steps).map(|_| ()),
            ProgressEvent::StepComplete { step } => self.on_step_complete(step),
        }
    }

    /// Handle a full-plan observation
    pub fn on_steps_list(&mut self, incoming: &[StepDescriptor]) -> ProgressResult<ListOutcome> {
        let signature = merge::signature(incoming, self.identity.as_ref(), self.separator)?;
        let shape_changed = self.last_signature.as_deref() != Some(signature.as_str());

        if !shape_changed && self.policy == SignaturePolicy::SkipUnchanged {
            debug!(tracker = %self.id, "Step plan unchanged, skipping merge");
            return Ok(ListOutcome::Skipped);
        }

        let merged = merge::merge_list(&self.steps, incoming, self.identity.as_ref())?;
        if shape_changed {
            debug!(
                tracker = %self.id,
                "Step plan changed: {:?} -> {:?}",
                self.last_signature(),
                signature
            );
            self.last_signature = Some(signature);
        }
        self.replace(merged);

        Ok(ListOutcome::Merged { shape_changed })
    }

    /// Handle one phase finishing
    pub fn on_step_complete(&mut self, step: StepDescriptor) -> ProgressResult<()> {
        let step_type = step.step_type.clone();
        let merged = merge::merge_complete(&self.steps, step, self.identity.as_ref())?;
        debug!(tracker = %self.id, "Step {} completed", step_type);
        self.replace(merged);
        Ok(())
    }

    /// Replace the list with an unstarted copy of `expected`
    pub fn seed(&mut self, expected: &[StepDescriptor]) {
        info!(tracker = %self.id, "Seeding {} expected steps", expected.len());
        self.replace(merge::seed(expected));
    }

    /// Return to the template (or empty) and forget the last plan shape
    pub fn reset(&mut self) {
        let steps = self
            .template
            .as_deref()
            .map(merge::seed)
            .unwrap_or_default();
        self.last_signature = None;
        info!(tracker = %self.id, "Progress reset to {} steps", steps.len());
        self.replace(steps);
    }

    fn replace(&mut self, steps: StepList) {
        let was_completed = self.all_completed;
        self.steps = steps;
        self.all_completed = merge::all_done(&self.steps);
        self.revision += 1;
        self.updated_at = Utc::now();

        if self.all_completed && !was_completed {
            info!(tracker = %self.id, "All {} steps completed", self.steps.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgressError;
    use crate::steps::identity::MockStepIdentity;
    use crate::steps::{canonical_swap_template, phase, StepTypeIdentity};

    fn tracker(policy: SignaturePolicy) -> ProgressTracker {
        ProgressTracker::new(
            Some(canonical_swap_template().into()),
            Arc::new(StepTypeIdentity),
            policy,
        )
    }

    fn steps(types: &[&str]) -> Vec<StepDescriptor> {
        types.iter().map(|t| StepDescriptor::new(*t)).collect()
    }

    #[test]
    fn test_new_seeds_from_template() {
        let t = tracker(SignaturePolicy::AlwaysMerge);
        assert_eq!(t.steps().len(), 9);
        assert!(!t.all_completed());
        assert_eq!(t.last_signature(), "");
        assert_eq!(t.revision(), 0);
    }

    #[test]
    fn test_new_without_template_is_empty() {
        let t = ProgressTracker::new(None, Arc::new(StepTypeIdentity), SignaturePolicy::AlwaysMerge);
        assert!(t.steps().is_empty());
        assert!(!t.all_completed());
    }

    #[test]
    fn test_steps_list_records_signature_on_change() {
        let mut t = tracker(SignaturePolicy::AlwaysMerge);
        let outcome = t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: true });
        assert_eq!(t.last_signature(), "A|B");

        let outcome = t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: false });
        assert_eq!(t.last_signature(), "A|B");
    }

    #[test]
    fn test_always_merge_replaces_on_matching_signature() {
        let mut t = tracker(SignaturePolicy::AlwaysMerge);
        t.on_steps_list(&steps(&["A", "B"])).unwrap();
        t.on_step_complete(StepDescriptor::new("Z")).unwrap();
        assert_eq!(t.steps().len(), 3);

        // Same shape again: the appended out-of-plan record is dropped
        t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert_eq!(t.steps().len(), 2);
    }

    #[test]
    fn test_skip_unchanged_keeps_list_on_matching_signature() {
        let mut t = tracker(SignaturePolicy::SkipUnchanged);
        t.on_steps_list(&steps(&["A", "B"])).unwrap();
        t.on_step_complete(StepDescriptor::new("Z")).unwrap();
        let revision = t.revision();

        let outcome = t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert_eq!(outcome, ListOutcome::Skipped);
        assert_eq!(t.steps().len(), 3);
        assert_eq!(t.revision(), revision);

        let outcome = t.on_steps_list(&steps(&["A", "B", "C"])).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: true });
        assert_eq!(t.steps().len(), 3);
        assert_eq!(t.steps().get(2).unwrap().step.step_type, "C");
    }

    #[test]
    fn test_skip_unchanged_applies_first_empty_list() {
        let mut t = tracker(SignaturePolicy::SkipUnchanged);
        let outcome = t.on_steps_list(&[]).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: true });
        assert!(t.steps().is_empty());
        assert!(!t.all_completed());

        // Same empty shape again is now unchanged
        assert_eq!(t.on_steps_list(&[]).unwrap(), ListOutcome::Skipped);
    }

    #[test]
    fn test_skip_unchanged_applies_empty_list_after_reset() {
        let mut t = tracker(SignaturePolicy::SkipUnchanged);
        t.on_steps_list(&[]).unwrap();
        t.reset();
        assert_eq!(t.steps().len(), 9);

        let outcome = t.on_steps_list(&[]).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: true });
        assert!(t.steps().is_empty());
    }

    #[test]
    fn test_skip_unchanged_distinguishes_separator_in_keys() {
        let mut t = tracker(SignaturePolicy::SkipUnchanged);
        t.on_steps_list(&steps(&["A", "B"])).unwrap();

        let outcome = t.on_steps_list(&steps(&["A|B"])).unwrap();
        assert_eq!(outcome, ListOutcome::Merged { shape_changed: true });
        assert_eq!(t.steps().len(), 1);
    }

    #[test]
    fn test_seed_keeps_signature_and_reset_clears_it() {
        let mut t = tracker(SignaturePolicy::AlwaysMerge);
        t.on_steps_list(&steps(&["A"])).unwrap();

        t.seed(&steps(&["X", "Y"]));
        assert_eq!(t.steps().len(), 2);
        assert_eq!(t.last_signature(), "A");

        t.reset();
        assert_eq!(t.steps().len(), 9);
        assert_eq!(t.last_signature(), "");
        assert!(t.steps().iter().all(|r| !r.completed));
    }

    #[test]
    fn test_reset_without_template_empties() {
        let mut t = ProgressTracker::new(None, Arc::new(StepTypeIdentity), SignaturePolicy::AlwaysMerge);
        t.on_step_complete(StepDescriptor::new(phase::SWAP_COMPLETE)).unwrap();
        assert!(t.all_completed());

        t.reset();
        assert!(t.steps().is_empty());
        assert!(!t.all_completed());
    }

    #[test]
    fn test_accepts_events_after_completion() {
        let mut t = ProgressTracker::new(None, Arc::new(StepTypeIdentity), SignaturePolicy::AlwaysMerge);
        t.on_step_complete(StepDescriptor::new("A")).unwrap();
        assert!(t.all_completed());

        t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert!(!t.all_completed());
        assert_eq!(t.steps().completed_count(), 1);
    }

    #[test]
    fn test_custom_separator() {
        let mut t = tracker(SignaturePolicy::AlwaysMerge).with_separator(',');
        t.on_steps_list(&steps(&["A", "B"])).unwrap();
        assert_eq!(t.last_signature(), "A,B");
    }

    #[test]
    fn test_key_failure_leaves_state_untouched() {
        let mut identity = MockStepIdentity::new();
        identity.expect_key().returning(|step| {
            if step.step_type == "BAD" {
                Err(ProgressError::KeyDerivation {
                    step_type: step.step_type.clone(),
                    reason: "rejected".to_string(),
                })
            } else {
                Ok(step.step_type.clone())
            }
        });

        let mut t = ProgressTracker::new(
            Some(canonical_swap_template().into()),
            Arc::new(identity),
            SignaturePolicy::AlwaysMerge,
        );
        t.on_step_complete(StepDescriptor::new(phase::SWAP_START)).unwrap();
        let before = t.snapshot();

        assert!(t.on_steps_list(&steps(&["A", "BAD"])).is_err());
        assert!(t.on_step_complete(StepDescriptor::new("BAD")).is_err());
        assert!(t
            .apply(ProgressEvent::StepComplete {
                step: StepDescriptor::new("BAD")
            })
            .is_err());

        assert_eq!(t.snapshot(), before);
        assert_eq!(t.last_signature(), "");
    }

    #[test]
    fn test_snapshot_counts() {
        let mut t = tracker(SignaturePolicy::AlwaysMerge);
        t.apply(ProgressEvent::StepComplete {
            step: StepDescriptor::new(phase::SWAP_START),
        })
        .unwrap();

        let snapshot = t.snapshot();
        assert_eq!(snapshot.total, 9);
        assert_eq!(snapshot.completed_count, 1);
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.tracker_id, t.id());
        assert!(!snapshot.all_completed);
    }
}
