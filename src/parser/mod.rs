//! Recovering entity lists from unstructured model responses.
//!
//! Generative models wrap their JSON in prose, reasoning blocks and the
//! occasional broken fragment. Parsing runs in two stages:
//! 1. [`fragment::find_entity_fragments`] locates every `{"entities": [...]}` block
//! 2. [`parse_fragment`] parses each block on its own, skipping the broken ones
//!
//! When no block yields anything, single lines holding a complete JSON
//! object are tried as a last resort. Parsing never fails; the
//! [`ParseOutcome`] tells "nothing found" apart from "found, but some of it
//! was unusable".

pub mod fragment;

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Coarse result of parsing one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Extracted,
    NoEntities,
    Degraded,
}

/// Outcome of parsing one response.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// At least one entity was recovered.
    Extracted(Vec<Entity>),
    /// The response held no entities (including the "no entities" sentinel).
    NoEntities,
    /// Some list elements could not be read as entities and were skipped.
    Degraded { entities: Vec<Entity>, reason: String },
}

impl ParseOutcome {
    pub fn status(&self) -> ParseStatus {
        match self {
            ParseOutcome::Extracted(_) => ParseStatus::Extracted,
            ParseOutcome::NoEntities => ParseStatus::NoEntities,
            ParseOutcome::Degraded { .. } => ParseStatus::Degraded,
        }
    }

    pub fn entities(&self) -> &[Entity] {
        match self {
            ParseOutcome::Extracted(entities) | ParseOutcome::Degraded { entities, .. } => entities,
            ParseOutcome::NoEntities => &[],
        }
    }

    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            ParseOutcome::Extracted(entities) | ParseOutcome::Degraded { entities, .. } => entities,
            ParseOutcome::NoEntities => Vec::new(),
        }
    }
}

/// Parse a raw response into its deduplicated entity list.
pub fn parse_response(raw: &str) -> Vec<Entity> {
    parse(raw).into_entities()
}

/// Parse a raw response, keeping track of how the entities were found.
pub fn parse(raw: &str) -> ParseOutcome {
    let text = fragment::strip_reasoning(raw);

    let mut collected = Collected::default();
    for inner in fragment::find_entity_fragments(text) {
        match parse_fragment(inner) {
            Ok(values) => collected.extend(&values),
            Err(e) => debug!(error = %e, "skipping unparseable entities block"),
        }
    }

    if collected.elements == 0 {
        if let Some(values) = scan_lines(text) {
            // A whole-line document is taken as-is, without deduplication.
            let mut line_collected = Collected::default();
            line_collected.extend(&values);
            return line_collected.finish();
        }
    }

    collected.entities = dedup_entities(collected.entities);
    collected.finish()
}

/// Parse the inner text of one entities block as `{"entities": [<inner>]}`.
pub fn parse_fragment(inner: &str) -> serde_json::Result<Vec<Value>> {
    let document: Value = serde_json::from_str(&format!(r#"{{"entities": [{}]}}"#, inner))?;
    Ok(document
        .get("entities")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default())
}

/// Keep the first entity for each key, preserving order.
pub fn dedup_entities(entities: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    entities
        .into_iter()
        .filter(|entity| seen.insert(entity.key()))
        .collect()
}

/// Find the first line that is a complete JSON object with an `entities` field.
fn scan_lines(text: &str) -> Option<Vec<Value>> {
    for line in text.trim().lines() {
        let line = line.trim();
        if !(line.starts_with('{') && line.ends_with('}')) {
            continue;
        }
        let Ok(document) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(entities) = document.get("entities") {
            return Some(entities.as_array().cloned().unwrap_or_default());
        }
    }
    None
}

#[derive(Default)]
struct Collected {
    /// Raw list elements seen, usable or not.
    elements: usize,
    entities: Vec<Entity>,
    rejected: usize,
}

impl Collected {
    fn extend(&mut self, values: &[Value]) {
        self.elements += values.len();
        for value in values {
            match Entity::from_value(value) {
                Some(entity) => self.entities.push(entity),
                None => {
                    debug!(element = %value, "skipping non-object entity element");
                    self.rejected += 1;
                }
            }
        }
    }

    fn finish(self) -> ParseOutcome {
        if self.rejected > 0 {
            ParseOutcome::Degraded {
                entities: self.entities,
                reason: format!("{} list element(s) were not entity objects", self.rejected),
            }
        } else if self.entities.is_empty() {
            ParseOutcome::NoEntities
        } else {
            ParseOutcome::Extracted(self.entities)
        }
    }
}
