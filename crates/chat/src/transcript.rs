//! Request transcript construction.
//!
//! Only used to build the generation request; the stored log is never
//! rewritten by anything in here.

use {
    sapfire_providers::{Turn, TurnRole},
    sapfire_sessions::{Contact, Message, Role},
};

/// Who the model speaks as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub bio: String,
}

impl From<&Contact> for Persona {
    fn from(contact: &Contact) -> Self {
        Self {
            id: contact.id.clone(),
            name: contact.name.clone(),
            bio: contact.bio.clone(),
        }
    }
}

pub fn system_instruction(persona: &Persona, language: &str) -> String {
    format!(
        "You are {}, a core inhabitant of Sapfire. Bio: {}. Be ultra-futuristic, crisp, and insightful. Your replies should be concise and meaningful. Language: {language}.",
        persona.name, persona.bio
    )
}

/// Build a strictly alternating transcript that starts on the user side.
///
/// System messages and blank messages are dropped, model and admin messages
/// become model turns, everything else a user turn. A `greeting` user turn is
/// prepended when the first turn is the model's, then adjacent same-role turns
/// are joined with a newline.
pub fn build_transcript(messages: &[Message], greeting: &str) -> Vec<Turn> {
    let mut turns: Vec<Turn> = messages
        .iter()
        .filter(|m| m.role != Role::System && !m.is_blank())
        .map(|m| Turn {
            role: match m.role {
                Role::Model | Role::Admin => TurnRole::Model,
                Role::User | Role::System => TurnRole::User,
            },
            text: m.content.clone(),
        })
        .collect();

    if turns.first().is_some_and(|t| t.role != TurnRole::User) {
        turns.insert(0, Turn::user(greeting));
    }

    let mut coalesced: Vec<Turn> = Vec::with_capacity(turns.len());
    for turn in turns {
        match coalesced.last_mut() {
            Some(last) if last.role == turn.role => {
                last.text.push('\n');
                last.text.push_str(&turn.text);
            },
            _ => coalesced.push(turn),
        }
    }
    coalesced
}
