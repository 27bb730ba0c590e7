use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use tracing::{debug, info};

use sapfire_sessions::{
    Contact, ContactKind, ContactStore, ConversationStore, Message, Sender, defaults,
};

use crate::{
    error::{Error, Result},
    pipeline::{ConversationPipeline, SendOutcome, SendRequest, toggle_reaction},
    runtime::{ChatEvent, ChatRuntime},
    transcript::Persona,
};

/// Contacts with a send currently outstanding.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Releases a contact's in-flight slot when dropped.
struct InFlightGuard {
    set: InFlight,
    contact_id: String,
}

impl InFlightGuard {
    fn acquire(set: &InFlight, contact_id: &str) -> Option<Self> {
        let mut active = set.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(contact_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            contact_id: contact_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self.set.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.contact_id);
    }
}

/// Front door for chat front ends: resolves contacts, enforces the posting
/// gate and one send per conversation at a time, and persists the logs the
/// pipeline returns.
pub struct ChatService {
    pipeline: ConversationPipeline,
    runtime: Arc<dyn ChatRuntime>,
    conversations: ConversationStore,
    contacts: ContactStore,
    user: Sender,
    language: String,
    in_flight: InFlight,
}

impl ChatService {
    pub fn new(
        pipeline: ConversationPipeline,
        runtime: Arc<dyn ChatRuntime>,
        conversations: ConversationStore,
        contacts: ContactStore,
        user: Sender,
        language: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            runtime,
            conversations,
            contacts,
            user,
            language: language.into(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Seed the default directory and its opening conversations on first run.
    pub async fn seed_defaults(&self) -> Result<()> {
        if !self.contacts.ensure_seeded().await? {
            return Ok(());
        }
        for contact in defaults::contacts() {
            let opening = defaults::opening_messages(&contact.id);
            if opening.is_empty() || self.conversations.exists(&contact.id) {
                continue;
            }
            self.conversations
                .replace_history(&contact.id, opening)
                .await?;
        }
        info!("seeded default contacts");
        Ok(())
    }

    pub async fn contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.contacts.load().await?)
    }

    pub async fn contact(&self, contact_id: &str) -> Result<Contact> {
        self.contacts
            .get(contact_id)
            .await?
            .ok_or_else(|| Error::UnknownContact {
                id: contact_id.to_string(),
            })
    }

    /// Full conversation log with `contact_id`.
    pub async fn history(&self, contact_id: &str) -> Result<Vec<Message>> {
        self.contact(contact_id).await?;
        Ok(self.conversations.read(contact_id).await?)
    }

    /// The last `n` messages with `contact_id`.
    pub async fn recent(&self, contact_id: &str, n: usize) -> Result<Vec<Message>> {
        self.contact(contact_id).await?;
        Ok(self.conversations.read_last_n(contact_id, n).await?)
    }

    /// Send `text` to `contact_id` and persist the resulting log.
    ///
    /// Contact, permission and concurrency failures are returned as `Err`
    /// before the pipeline runs; pipeline failures ride in the outcome.
    pub async fn send(&self, contact_id: &str, text: &str) -> Result<SendOutcome> {
        let contact = self.contact(contact_id).await?;
        let user_id = self.user.id.as_deref().unwrap_or_default();
        if !contact.can_post(user_id) {
            return Err(Error::PostingNotAllowed {
                contact: contact.name,
            });
        }

        let _guard = InFlightGuard::acquire(&self.in_flight, contact_id).ok_or_else(|| {
            Error::Busy {
                contact: contact.name.clone(),
            }
        })?;

        let log = self.conversations.read(contact_id).await?;
        let request = SendRequest {
            text: text.to_string(),
            sender: self.user.clone(),
            persona: Persona::from(&contact),
            language: self.language.clone(),
        };
        let outcome = self.pipeline.send(&log, request).await;

        if outcome.messages.len() != log.len() {
            self.conversations
                .replace_history(contact_id, outcome.messages.clone())
                .await?;
            if let Some(last) = outcome.messages.last() {
                self.contacts
                    .touch_last_message(contact_id, &preview(last))
                    .await?;
            }
            debug!(
                contact = contact_id,
                messages = outcome.messages.len(),
                "conversation persisted"
            );
        }

        Ok(outcome)
    }

    /// Toggle `emoji` on one message and persist the log.
    pub async fn react(
        &self,
        contact_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<Message>> {
        let log = self.history(contact_id).await?;
        let updated = toggle_reaction(&log, message_id, emoji);
        if updated != log {
            self.conversations
                .replace_history(contact_id, updated.clone())
                .await?;
        }
        self.runtime.emit(ChatEvent::Reaction).await;
        Ok(updated)
    }

    /// Create a group or channel owned by the current user, open its log
    /// with a system notice and put it at the top of the directory.
    ///
    /// Group members must be existing direct contacts; channels only list
    /// their owner.
    pub async fn create_community(
        &self,
        kind: ContactKind,
        name: &str,
        description: &str,
        member_ids: &[String],
    ) -> Result<Contact> {
        let invalid = |reason: &str| Error::InvalidCommunity {
            reason: reason.to_string(),
        };
        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        let owner = self.user.id.clone().unwrap_or_default();

        let participants = match kind {
            ContactKind::Direct => return Err(invalid("only groups and channels can be created")),
            ContactKind::Channel => vec![owner.clone()],
            ContactKind::Group => {
                let directory = self.contacts.load().await?;
                let mut participants = vec![owner.clone()];
                for id in member_ids {
                    match directory.iter().find(|c| &c.id == id) {
                        Some(c) if c.kind == ContactKind::Direct => {},
                        Some(c) => {
                            return Err(invalid(&format!("{} is not a direct contact", c.name)));
                        },
                        None => return Err(Error::UnknownContact { id: id.clone() }),
                    }
                    if !participants.contains(id) {
                        participants.push(id.clone());
                    }
                }
                participants
            },
        };

        let mut contact = Contact::community(kind, name, description, &owner, participants);
        let notice = match kind {
            ContactKind::Group => format!("Вы создали группу \"{}\"", contact.name),
            _ => format!("Вы создали канал \"{}\"", contact.name),
        };
        self.conversations
            .append(&contact.id, &Message::system(notice.as_str()))
            .await?;
        contact.last_message = Some(notice);
        self.contacts.insert_front(contact.clone()).await?;

        info!(
            contact = %contact.id,
            kind = kind.as_str(),
            members = contact.participant_ids.len(),
            "community created"
        );
        Ok(contact)
    }
}

/// Contact-list preview for a message.
fn preview(message: &Message) -> String {
    if message.content.trim().is_empty() && message.attachment.is_some() {
        return "Attachment".to_string();
    }
    message.content.clone()
}
