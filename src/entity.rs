//! Entity records recovered from model output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A named entity as emitted by the model.
///
/// Two entities are the same entity for comparison purposes when their
/// [`key`](Entity::key) matches; extra fields do not take part in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Entity {
    /// Surface name, captured verbatim (may embed coordinates like `兰州(36.06,103.79)`).
    pub name: String,
    /// Type label as written by the model.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Any other fields the model attached, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            extra: Map::new(),
        }
    }

    /// Build an entity from a JSON object.
    ///
    /// Missing `name`/`type` become empty strings. Returns `None` for
    /// anything that is not an object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let mut extra = object.clone();
        let name = extra.remove("name").map(|v| scalar_text(&v)).unwrap_or_default();
        let entity_type = extra.remove("type").map(|v| scalar_text(&v)).unwrap_or_default();
        Some(Self {
            name,
            entity_type,
            extra,
        })
    }

    /// Identity key: `"{name}|{type}"`.
    pub fn key(&self) -> String {
        format!("{}|{}", self.name, self.entity_type)
    }

    /// Category of the type label.
    pub fn category(&self) -> EntityType {
        EntityType::from_label(&self.entity_type)
    }
}

impl TryFrom<Value> for Entity {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Entity::from_value(&value).ok_or_else(|| format!("expected an entity object, got {}", value))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.entity_type)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The four entity categories the NER prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Equipment,
    Location,
    Organization,
    Person,
    Unknown,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Equipment,
        EntityType::Location,
        EntityType::Organization,
        EntityType::Person,
        EntityType::Unknown,
    ];

    /// Map a model-written type label (Chinese or English) to a category.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "军事装备" => EntityType::Equipment,
            "地理位置" => EntityType::Location,
            "组织名称" => EntityType::Organization,
            "人名" => EntityType::Person,
            other => match other.to_lowercase().as_str() {
                "equipment" | "weapon" => EntityType::Equipment,
                "location" => EntityType::Location,
                "organization" | "organisation" => EntityType::Organization,
                "person" => EntityType::Person,
                _ => EntityType::Unknown,
            },
        }
    }

    /// The label the prompt uses for this category.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Equipment => "军事装备",
            EntityType::Location => "地理位置",
            EntityType::Organization => "组织名称",
            EntityType::Person => "人名",
            EntityType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
