use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    #[default]
    Direct,
    Group,
    Channel,
}

impl ContactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Online,
    #[default]
    Offline,
    Busy,
}

/// A direct peer, group, or channel. Its conversation log is stored
/// separately under the contact's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ContactKind,
    pub name: String,
    #[serde(default)]
    pub username: String,
    /// Persona description handed to the model.
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default)]
    pub is_ai: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participant_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

impl Contact {
    pub fn direct(id: impl Into<String>, name: impl Into<String>, bio: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            kind: ContactKind::Direct,
            username: name.to_lowercase(),
            name,
            bio: bio.into(),
            status: ContactStatus::Offline,
            is_ai: false,
            is_verified: false,
            owner_id: None,
            participant_ids: Vec::new(),
            last_message: None,
        }
    }

    /// A group or channel created and owned by `owner_id`. A blank
    /// `description` gets a stock bio.
    pub fn community(
        kind: ContactKind,
        name: &str,
        description: &str,
        owner_id: &str,
        participant_ids: Vec<String>,
    ) -> Self {
        let name = name.trim();
        let description = description.trim();
        let bio = if description.is_empty() {
            format!("Official {} of {name}.", kind.as_str())
        } else {
            description.to_string()
        };
        Self {
            id: format!("com-{}", uuid::Uuid::new_v4().simple()),
            kind,
            name: name.to_string(),
            username: name
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_"),
            bio,
            status: ContactStatus::Online,
            is_ai: false,
            is_verified: false,
            owner_id: Some(owner_id.to_string()),
            participant_ids,
            last_message: None,
        }
    }

    /// Channels accept posts only from their owner; groups and direct
    /// peers from anyone.
    #[must_use]
    pub fn can_post(&self, user_id: &str) -> bool {
        match self.kind {
            ContactKind::Channel => self.owner_id.as_deref() == Some(user_id),
            ContactKind::Direct | ContactKind::Group => true,
        }
    }
}
