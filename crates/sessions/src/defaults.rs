//! Contact directory and opening messages seeded on first run.

use crate::{
    contact::{Contact, ContactKind, ContactStatus},
    message::{Message, Role},
};

pub const ADMIN_ID: &str = "admin_id";

/// Fixed epoch for seeded messages so reseeding is deterministic.
const SEEDED_AT: u64 = 1_735_689_600_000;

fn seeded(id: &str, role: Role, content: &str) -> Message {
    let mut msg = Message::new(role, content).with_id(id);
    msg.created_at = SEEDED_AT;
    msg
}

/// Default contacts, in display order.
#[must_use]
pub fn contacts() -> Vec<Contact> {
    let mut alexander = Contact::direct("c1", "Alexander", "AI researcher.");
    alexander.status = ContactStatus::Online;
    alexander.is_ai = true;

    let mut maria = Contact::direct("c2", "Maria", "Art Director.");
    maria.is_ai = true;

    let team = Contact {
        id: "g1".into(),
        kind: ContactKind::Group,
        name: "Sapfire Core Team".into(),
        username: "sapfire_team".into(),
        bio: "Core team of the Sapfire project.".into(),
        status: ContactStatus::Online,
        is_ai: true,
        is_verified: false,
        owner_id: Some("some_other_id".into()),
        participant_ids: vec!["me".into(), "c1".into(), "c2".into()],
        last_message: Some("Привет всем! Давайте обсудим обновление.".into()),
    };

    let news = Contact {
        id: "ch1".into(),
        kind: ContactKind::Channel,
        name: "Sapfire News".into(),
        username: "sapfire_news".into(),
        bio: "Official Sapfire announcements.".into(),
        status: ContactStatus::Online,
        is_ai: false,
        is_verified: true,
        owner_id: Some(ADMIN_ID.into()),
        participant_ids: Vec::new(),
        last_message: Some("Новое обновление v5.0.2 уже доступно!".into()),
    };

    vec![alexander, maria, team, news]
}

/// Opening conversation log for a seeded contact, empty for the rest.
#[must_use]
pub fn opening_messages(contact_id: &str) -> Vec<Message> {
    match contact_id {
        "g1" => {
            let mut greeting = seeded(
                "m1",
                Role::Model,
                "Привет всем! Давайте обсудим обновление.",
            );
            greeting.sender_name = Some("Alexander".into());
            greeting.sender_id = Some("c1".into());
            greeting.sender_color = Some("#3b82f6".into());
            vec![
                seeded("m0", Role::System, "Alexander добавил Maria в группу"),
                greeting,
            ]
        },
        "ch1" => {
            let mut post = seeded(
                "cm1",
                Role::Admin,
                "Новое обновление v5.0.2 уже доступно! Проверьте вкладку \"Магазин\".",
            )
            .with_views(1240);
            post.sender_name = Some("Sapfire News".into());
            post.sender_id = Some(ADMIN_ID.into());
            post.sender_color = Some("#2563eb".into());
            vec![seeded("cm0", Role::System, "Канал создан"), post]
        },
        _ => Vec::new(),
    }
}
