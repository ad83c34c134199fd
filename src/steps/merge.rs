//! Pure reconciliation of step lists
//!
//! Every function here takes the previous list by reference and returns a new
//! list; records are never mutated in place. Key derivation happens before any
//! output is built, so a failing descriptor leaves the caller's state intact.

use super::identity::StepIdentity;
use super::{StepDescriptor, StepList};
use crate::error::{ProgressError, ProgressResult};

use std::borrow::Cow;
use std::collections::HashSet;

/// Default separator used when joining keys into a signature
pub const DEFAULT_SIGNATURE_SEPARATOR: char = '|';

/// Escapes separator and escape characters occurring inside keys
pub const SIGNATURE_ESCAPE: char = '\\';

/// Build an unstarted list from an expected-phase template
pub fn seed(expected: &[StepDescriptor]) -> StepList {
    StepList::from_entries(expected.iter().cloned().map(|step| (false, step)))
}

/// Fingerprint of an ordered step sequence.
///
/// Separator and escape characters inside keys are escaped, so distinct key
/// sequences never share a signature. `separator` must not be the escape
/// character.
pub fn signature<I>(incoming: &[StepDescriptor], identity: &I, separator: char) -> ProgressResult<String>
where
    I: StepIdentity + ?Sized,
{
    if separator == SIGNATURE_ESCAPE {
        return Err(ProgressError::Config(format!(
            "signature separator cannot be {:?}",
            SIGNATURE_ESCAPE
        )));
    }

    let keys = derive_keys(incoming, identity)?;
    let mut signature = String::new();
    for (index, key) in keys.iter().enumerate() {
        if index > 0 {
            signature.push(separator);
        }
        signature.push_str(&escape_key(key, separator));
    }
    Ok(signature)
}

fn escape_key(key: &str, separator: char) -> Cow<'_, str> {
    if !key.contains([separator, SIGNATURE_ESCAPE]) {
        return Cow::Borrowed(key);
    }

    let mut escaped = String::with_capacity(key.len() + 2);
    for c in key.chars() {
        if c == separator || c == SIGNATURE_ESCAPE {
            escaped.push(SIGNATURE_ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Replace `previous` with `incoming`, carrying completion for keys that persist.
///
/// The result has exactly `incoming.len()` records in `incoming` order. Phases
/// only present in `previous` are dropped; new phases start uncompleted.
pub fn merge_list<I>(
    previous: &StepList,
    incoming: &[StepDescriptor],
    identity: &I,
) -> ProgressResult<StepList>
where
    I: StepIdentity + ?Sized,
{
    let incoming_keys = derive_keys(incoming, identity)?;

    let mut completed_keys = HashSet::new();
    for record in previous.iter().filter(|r| r.completed) {
        completed_keys.insert(identity.key(&record.step)?);
    }

    Ok(StepList::from_entries(
        incoming_keys
            .iter()
            .zip(incoming.iter().cloned())
            .map(|(key, step)| (completed_keys.contains(key), step)),
    ))
}

/// Mark one phase complete, appending it when the list does not know it yet.
///
/// A matching record keeps its position and absorbs the newer descriptor's
/// fields. Only the first record with the key is touched.
pub fn merge_complete<I>(
    previous: &StepList,
    step: StepDescriptor,
    identity: &I,
) -> ProgressResult<StepList>
where
    I: StepIdentity + ?Sized,
{
    let key = identity.key(&step)?;

    let mut matched = None;
    for (index, record) in previous.iter().enumerate() {
        if identity.key(&record.step)? == key {
            matched = Some(index);
            break;
        }
    }

    let mut entries: Vec<(bool, StepDescriptor)> = previous
        .iter()
        .map(|r| (r.completed, r.step.clone()))
        .collect();

    match matched {
        Some(index) => {
            let (_, existing) = std::mem::take(&mut entries[index]);
            entries[index] = (true, existing.absorb(step));
        }
        None => entries.push((true, step)),
    }

    Ok(StepList::from_entries(entries))
}

/// True iff the list is non-empty and every record is completed
pub fn all_done(list: &StepList) -> bool {
    !list.is_empty() && list.iter().all(|r| r.completed)
}

fn derive_keys<I>(steps: &[StepDescriptor], identity: &I) -> ProgressResult<Vec<String>>
where
    I: StepIdentity + ?Sized,
{
    steps.iter().map(|step| identity.key(step)).collect()
}
