//! System prompt rendering.
//!
//! Pure: the same card, persona, memory and jailbreak text always render the
//! same string. Optional sections appear only when their source field has
//! content; there are no blank placeholders.

use std::fmt;
use std::str::FromStr;

use parley_core::{CardData, ContextError, PersonaData};
use serde::{Deserialize, Serialize};

/// Layout of the rendered system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    #[default]
    Markdown,
    /// Declared so configs can name it; rendering is not implemented.
    Xml,
}

impl PromptVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptVariant {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" => Ok(Self::Markdown),
            "xml" => Ok(Self::Xml),
            _ => Err(ContextError::UnsupportedTemplateVariant(s.to_string())),
        }
    }
}

/// Everything the system prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct SystemPromptParams<'a> {
    pub card: &'a CardData,
    pub persona: &'a PersonaData,
    pub character_memory: &'a str,
    pub jailbreak: &'a str,
    pub variant: PromptVariant,
}

/// Render the system prompt for the requested variant.
pub fn render_system_prompt(params: &SystemPromptParams<'_>) -> Result<String, ContextError> {
    match params.variant {
        PromptVariant::Markdown => Ok(render_markdown(params)),
        PromptVariant::Xml => Err(ContextError::UnsupportedTemplateVariant(
            PromptVariant::Xml.to_string(),
        )),
    }
}

fn render_markdown(params: &SystemPromptParams<'_>) -> String {
    let character = &params.card.character;

    let mut sections = vec![format!(
        "### Instruction\nYou are now roleplaying as {}.\nYou are in a chat with {}.",
        character.name, params.persona.name
    )];

    let optional = [
        ("### Character Info\n", character.description.as_str()),
        ("### World Info\n", params.card.world.description.as_str()),
        (
            "### User Info\nUser's description: ",
            params.persona.description.as_str(),
        ),
        ("### Character Memory\n", params.character_memory),
        ("### Messages Examples\n", character.msg_examples.as_str()),
    ];
    for (header, body) in optional {
        if !body.trim().is_empty() {
            sections.push(format!("{header}{body}"));
        }
    }

    if !params.jailbreak.trim().is_empty() {
        sections.push(params.jailbreak.to_string());
    }

    sections.join("\n\n").trim().to_string()
}
