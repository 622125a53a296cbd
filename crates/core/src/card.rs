//! Character card and persona data.
//!
//! A card is the `data.json` describing a character and the world it lives
//! in; a persona describes the user's side of the roleplay. Both are
//! supplied fully formed and only ever read by the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    #[serde(default)]
    pub spec: String,
    #[serde(default)]
    pub spec_version: String,
    pub character: Character,
    #[serde(default)]
    pub world: World,
    #[serde(default)]
    pub meta: CardMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub alt_greetings: Vec<String>,
    #[serde(default)]
    pub msg_examples: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardMeta {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub creator: Creator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub world: String,
}

impl CardData {
    /// A minimal card with just a character name, mostly for tests.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            spec: "parley_card".into(),
            spec_version: "1.0".into(),
            character: Character {
                name: name.into(),
                ..Character::default()
            },
            world: World::default(),
            meta: CardMeta::default(),
        }
    }
}

/// The user's side of the roleplay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaData {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
