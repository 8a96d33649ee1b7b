//! Typed views of the character-window API documents
//!
//! Only the fields the tracker inspects are modelled; everything else in the
//! documents is ignored here and passed through untouched to the renderer as
//! raw bytes.

use serde::Deserialize;
use std::collections::HashMap;

/// One entry of `get-characters`
#[derive(Debug, Clone, Deserialize)]
pub struct PoeCharacter {
    pub name: String,
    #[serde(default)]
    pub realm: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub level: u32,
}

/// `get-items` response
#[derive(Debug, Clone, Deserialize)]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<Item>,
    pub character: PoeCharacter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "typeLine", default)]
    pub type_line: String,
    #[serde(rename = "inventoryId", default)]
    pub inventory_id: String,
    #[serde(default)]
    pub ilvl: u32,
    #[serde(rename = "socketedItems", default)]
    pub socketed_items: Vec<serde_json::Value>,
}

/// `get-passive-skills` response
#[derive(Debug, Clone, Deserialize)]
pub struct PassiveSkillsResponse {
    #[serde(default)]
    pub character: u32,
    #[serde(default)]
    pub ascendancy: u32,
    #[serde(default)]
    pub hashes: Vec<u32>,
    #[serde(default)]
    pub hashes_ex: Vec<u32>,
    #[serde(default)]
    pub mastery_effects: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

impl PassiveSkillsResponse {
    /// Number of allocated nodes, cluster jewel nodes included
    pub fn allocated(&self) -> usize {
        self.hashes.len() + self.hashes_ex.len()
    }
}

/// Error envelope returned with 4xx/5xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: i64,
    #[serde(alias = "Message")]
    pub message: String,
}
