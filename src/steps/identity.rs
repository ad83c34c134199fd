//! Step identity derivation
//!
//! A step's identity key names "which phase this is" independently of the
//! payload fields the execution engine fills in later. Identity across
//! successive step lists is carried by this key, never by position.

use super::StepDescriptor;
use crate::error::{ProgressError, ProgressResult};

use serde::Deserialize;
use std::sync::Arc;

/// Derives a stable key for a step descriptor
#[cfg_attr(test, mockall::automock)]
pub trait StepIdentity: Send + Sync {
    fn key(&self, step: &StepDescriptor) -> ProgressResult<String>;
}

/// Keys a step by its phase type alone
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTypeIdentity;

impl StepIdentity for StepTypeIdentity {
    fn key(&self, step: &StepDescriptor) -> ProgressResult<String> {
        require_type(step).map(str::to_string)
    }
}

/// Keys a step by phase type and chain, for plans that repeat a phase per chain
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainScopedIdentity;

impl StepIdentity for ChainScopedIdentity {
    fn key(&self, step: &StepDescriptor) -> ProgressResult<String> {
        let step_type = require_type(step)?;
        Ok(match step.chain_id {
            Some(chain_id) => format!("{}@{}", step_type, chain_id),
            None => step_type.to_string(),
        })
    }
}

fn require_type(step: &StepDescriptor) -> ProgressResult<&str> {
    let step_type = step.step_type.trim();
    if step_type.is_empty() {
        return Err(ProgressError::KeyDerivation {
            step_type: step.step_type.clone(),
            reason: "step type is empty".to_string(),
        });
    }
    Ok(step_type)
}

/// Identity derivation selectable from configuration
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    #[default]
    StepType,
    ChainScoped,
}

impl IdentityKind {
    pub fn build(self) -> Arc<dyn StepIdentity> {
        match self {
            IdentityKind::StepType => Arc::new(StepTypeIdentity),
            IdentityKind::ChainScoped => Arc::new(ChainScopedIdentity),
        }
    }
}
