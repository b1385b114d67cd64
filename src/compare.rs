//! Set comparison between two entity lists.
//!
//! Entities are compared by [`Entity::key`], so duplicates inside one list
//! collapse. The exception is `improvement`, which is the difference of the
//! raw list lengths.

use crate::entity::{Entity, EntityType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Overlap statistics between the base and the adapter model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityComparison {
    /// Length of the base list.
    pub base_total: usize,
    /// Length of the adapter list.
    pub lora_total: usize,
    /// Distinct keys found by both.
    pub common: usize,
    /// Distinct keys found only by the base model.
    pub base_only: usize,
    /// Distinct keys found only by the adapter.
    pub lora_only: usize,
    /// `lora_total - base_total`.
    pub improvement: i64,
}

/// The key sets behind an [`EntityComparison`], sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityDiff {
    pub common: Vec<String>,
    pub base_only: Vec<String>,
    pub lora_only: Vec<String>,
}

pub(crate) fn key_set(entities: &[Entity]) -> BTreeSet<String> {
    entities.iter().map(Entity::key).collect()
}

/// Compare two entity lists.
pub fn compare_entities(base: &[Entity], lora: &[Entity]) -> EntityComparison {
    let base_set = key_set(base);
    let lora_set = key_set(lora);

    let common = base_set.intersection(&lora_set).count();

    EntityComparison {
        base_total: base.len(),
        lora_total: lora.len(),
        common,
        base_only: base_set.len() - common,
        lora_only: lora_set.len() - common,
        improvement: lora.len() as i64 - base.len() as i64,
    }
}

/// List which keys each side found.
pub fn diff_entities(base: &[Entity], lora: &[Entity]) -> EntityDiff {
    let base_set = key_set(base);
    let lora_set = key_set(lora);

    EntityDiff {
        common: base_set.intersection(&lora_set).cloned().collect(),
        base_only: base_set.difference(&lora_set).cloned().collect(),
        lora_only: lora_set.difference(&base_set).cloned().collect(),
    }
}

/// Count entities per category. Every category is present, possibly with zero.
pub fn type_distribution(entities: &[Entity]) -> BTreeMap<EntityType, usize> {
    let mut counts: BTreeMap<EntityType, usize> =
        EntityType::ALL.iter().map(|t| (*t, 0)).collect();
    for entity in entities {
        *counts.entry(entity.category()).or_default() += 1;
    }
    counts
}
