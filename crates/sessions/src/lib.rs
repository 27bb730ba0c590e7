//! Conversation data model and storage.
//!
//! Each contact's conversation log is a JSONL file (one message per line)
//! at `<data_dir>/conversations/<contact_id>.jsonl`, written under a file
//! lock. The contact directory lives next to it in `contacts.json`.

pub mod contact;
pub mod contacts;
pub mod defaults;
pub mod error;
pub mod message;
pub mod store;

pub use {
    contact::{Contact, ContactKind, ContactStatus},
    contacts::ContactStore,
    error::{Error, Result},
    message::{Attachment, AttachmentKind, Message, Role, Sender},
    store::ConversationStore,
};
