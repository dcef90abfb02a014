//! Conversation Engine
//!
//! Ephemeral per-user wizards. State lives in memory only and is dropped
//! on completion, on `/cancel`, or when another wizard is started.
//!
//! The engine validates input and collects answers; it never writes to the
//! store. A [`Step::Completed`] hands the collected data to the caller,
//! which commits it through the gatekeeper.

use crate::gatekeeper::authorization::{is_channel_admin, is_global_admin};
use crate::gatekeeper::channels::{ChannelDraft, SettingsChange};
use crate::store::{ApplicantProfile, Channel, Document, Grant};
use crate::telegram::callback::CallbackAction;
use crate::telegram::messages::msg_unknown_channel;
use crate::telegram::traits::{Button, ChannelId, Keyboard, UserId};
use std::collections::HashMap;

/// Prefix every supergroup/channel id carries on the platform
const CHANNEL_ID_PREFIX: &str = "-100";
const LINK_PREFIX: &str = "https://t.me/";
const KEEP: &str = "keep";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationState {
    SelectChannel,
    Name {
        channel: ChannelId,
    },
    Surname {
        channel: ChannelId,
        name: String,
    },
    Country {
        channel: ChannelId,
        name: String,
        surname: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionState {
    ChannelId,
    Name {
        id: ChannelId,
    },
    Link {
        id: ChannelId,
        name: String,
    },
    Admin {
        id: ChannelId,
        name: String,
        link: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsState {
    Name,
    Link { change: SettingsChange },
    ChannelId { change: SettingsChange },
}

/// Active wizard of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    Registration(RegistrationState),
    Provision(ProvisionState),
    SettingsEdit {
        channel: ChannelId,
        state: SettingsState,
    },
    AddAdmin {
        channel: ChannelId,
    },
}

/// Data collected by a finished wizard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Registration {
        channel: ChannelId,
        profile: ApplicantProfile,
    },
    Provision(ChannelDraft),
    Settings {
        channel: ChannelId,
        change: SettingsChange,
    },
    AddAdmin {
        channel: ChannelId,
        admin: UserId,
    },
}

/// Engine reply to one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Next question; the wizard continues
    Prompt {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Input rejected; the same question stands
    Invalid(String),
    /// Wizard ended without a result
    Aborted(String),
    /// Registration refused because the actor already holds a grant; the
    /// caller shows the time left and the join link
    Member {
        name: String,
        link: String,
        grant: Grant,
    },
    /// Wizard finished; the caller commits the result
    Completed(Completion),
}

impl Step {
    fn prompt(text: impl Into<String>) -> Self {
        Step::Prompt {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// In-memory wizard manager
///
/// One conversation per user; starting a wizard replaces any stale one.
#[derive(Debug, Default)]
pub struct ConversationEngine {
    conversations: HashMap<UserId, ConversationState>,
}

impl ConversationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, actor: UserId) -> Option<&ConversationState> {
        self.conversations.get(&actor)
    }

    pub fn is_active(&self, actor: UserId) -> bool {
        self.conversations.contains_key(&actor)
    }

    /// Discard the actor's wizard; returns whether one was active
    pub fn cancel(&mut self, actor: UserId) -> bool {
        self.conversations.remove(&actor).is_some()
    }

    /// Number of open wizards
    pub fn active_count(&self) -> usize {
        self.conversations.len()
    }

    // ========================================================================
    // Wizard entry points
    // ========================================================================

    /// Begin registration, optionally for a specific channel.
    ///
    /// With a single configured channel the selection step is skipped.
    pub fn start_registration(
        &mut self,
        actor: UserId,
        requested: Option<ChannelId>,
        doc: &Document,
    ) -> Step {
        self.conversations.remove(&actor);

        if let Some(channel) = requested {
            return self.select_channel(actor, channel, doc);
        }

        match doc.channels.len() {
            0 => Step::Aborted("❌ No channel is open for registration yet.".to_string()),
            1 => {
                let only = doc.channels.keys().copied().next();
                match only {
                    Some(channel) => self.select_channel(actor, channel, doc),
                    None => Step::Aborted("❌ No channel is open for registration yet.".to_string()),
                }
            }
            _ => {
                self.conversations.insert(
                    actor,
                    ConversationState::Registration(RegistrationState::SelectChannel),
                );
                Step::Prompt {
                    text: "👋 Welcome!\n\nChoose the channel you want to join:".to_string(),
                    keyboard: Some(channel_keyboard(doc)),
                }
            }
        }
    }

    /// Pick the registration channel (button press, `/start <id>`, or typed id)
    pub fn select_channel(&mut self, actor: UserId, channel: ChannelId, doc: &Document) -> Step {
        let Some(record) = doc.channel(channel) else {
            self.conversations.remove(&actor);
            return Step::Aborted(msg_unknown_channel(channel));
        };

        if let Some(grant) = record.members.get(&actor) {
            self.conversations.remove(&actor);
            return Step::Member {
                name: record.name.clone(),
                link: record.link.clone(),
                grant: grant.clone(),
            };
        }
        if record.pending.contains_key(&actor) {
            self.conversations.remove(&actor);
            return Step::Aborted(format!(
                "⏳ Your registration for {} is already waiting for validation.",
                record.name
            ));
        }

        self.conversations.insert(
            actor,
            ConversationState::Registration(RegistrationState::Name { channel }),
        );
        Step::prompt(format!(
            "📝 Registration for {}\n\nStep 1/3 - Enter your last name:",
            record.name
        ))
    }

    /// Begin channel provisioning (global admins only)
    pub fn start_provision(&mut self, actor: UserId, doc: &Document) -> Step {
        self.conversations.remove(&actor);
        if !is_global_admin(doc, actor) {
            return Step::Aborted("❌ Access denied.".to_string());
        }
        self.conversations
            .insert(actor, ConversationState::Provision(ProvisionState::ChannelId));
        Step::prompt(
            "➕ New channel\n\nStep 1/4 - Channel id (e.g. -1001234567890):\n\n/cancel to abort",
        )
    }

    /// Begin editing a channel's name, link and id
    pub fn start_settings(&mut self, actor: UserId, channel: ChannelId, doc: &Document) -> Step {
        self.conversations.remove(&actor);
        let record = match admin_channel(doc, actor, channel) {
            Ok(record) => record,
            Err(step) => return step,
        };
        self.conversations.insert(
            actor,
            ConversationState::SettingsEdit {
                channel,
                state: SettingsState::Name,
            },
        );
        Step::prompt(format!(
            "⚙️ Settings for {}\n\nStep 1/3 - New name (current: {}), or '{}':",
            record.name, record.name, KEEP
        ))
    }

    /// Begin adding a channel admin
    pub fn start_add_admin(&mut self, actor: UserId, channel: ChannelId, doc: &Document) -> Step {
        self.conversations.remove(&actor);
        let record = match admin_channel(doc, actor, channel) {
            Ok(record) => record,
            Err(step) => return step,
        };
        self.conversations
            .insert(actor, ConversationState::AddAdmin { channel });
        Step::prompt(format!(
            "👮 New admin for {}\n\nEnter the user id of the new admin:",
            record.name
        ))
    }

    // ========================================================================
    // Input handling
    // ========================================================================

    /// Feed free text to the actor's wizard.
    ///
    /// Returns `None` when the actor has no active wizard.
    pub fn advance(&mut self, actor: UserId, text: &str, doc: &Document) -> Option<Step> {
        let state = self.conversations.remove(&actor)?;
        let input = text.trim();

        let (next, step) = match state {
            ConversationState::Registration(state) => self.advance_registration(actor, state, input, doc),
            ConversationState::Provision(state) => advance_provision(state, input, doc),
            ConversationState::SettingsEdit { channel, state } => {
                advance_settings(channel, state, input, doc)
            }
            ConversationState::AddAdmin { channel } => advance_add_admin(channel, input, doc),
        };

        if let Some(next) = next {
            self.conversations.insert(actor, next);
        }
        Some(step)
    }

    fn advance_registration(
        &mut self,
        actor: UserId,
        state: RegistrationState,
        input: &str,
        doc: &Document,
    ) -> (Option<ConversationState>, Step) {
        let wrap = ConversationState::Registration;

        if input.is_empty() {
            return (Some(wrap(state)), Step::Invalid(msg_empty_input()));
        }

        match state {
            RegistrationState::SelectChannel => match input.parse::<i64>() {
                Ok(id) if doc.channel(ChannelId(id)).is_some() => {
                    // select_channel stores the next state itself
                    let step = self.select_channel(actor, ChannelId(id), doc);
                    (self.conversations.remove(&actor), step)
                }
                _ => (
                    Some(wrap(RegistrationState::SelectChannel)),
                    Step::Invalid("❌ Unknown channel. Use the buttons to choose one.".to_string()),
                ),
            },
            RegistrationState::Name { channel } => (
                Some(wrap(RegistrationState::Surname {
                    channel,
                    name: input.to_string(),
                })),
                Step::prompt("Step 2/3 - Enter your first name:"),
            ),
            RegistrationState::Surname { channel, name } => (
                Some(wrap(RegistrationState::Country {
                    channel,
                    name,
                    surname: input.to_string(),
                })),
                Step::prompt("Step 3/3 - Enter your country:"),
            ),
            RegistrationState::Country {
                channel,
                name,
                surname,
            } => (
                None,
                Step::Completed(Completion::Registration {
                    channel,
                    profile: ApplicantProfile {
                        name,
                        surname,
                        country: input.to_string(),
                    },
                }),
            ),
        }
    }
}

fn advance_provision(
    state: ProvisionState,
    input: &str,
    doc: &Document,
) -> (Option<ConversationState>, Step) {
    let wrap = ConversationState::Provision;

    match state {
        ProvisionState::ChannelId => match parse_channel_id(input) {
            Ok(id) if doc.channels.contains_key(&id) => (
                Some(wrap(ProvisionState::ChannelId)),
                Step::Invalid(format!("❌ Channel {} is already registered.", id)),
            ),
            Ok(id) => (
                Some(wrap(ProvisionState::Name { id })),
                Step::prompt("Step 2/4 - Channel name:"),
            ),
            Err(reason) => (Some(wrap(ProvisionState::ChannelId)), Step::Invalid(reason)),
        },
        ProvisionState::Name { id } => {
            if input.is_empty() {
                return (Some(wrap(ProvisionState::Name { id })), Step::Invalid(msg_empty_input()));
            }
            (
                Some(wrap(ProvisionState::Link {
                    id,
                    name: input.to_string(),
                })),
                Step::prompt("Step 3/4 - Invite link (https://t.me/...):"),
            )
        }
        ProvisionState::Link { id, name } => match parse_link(input) {
            Ok(link) => (
                Some(wrap(ProvisionState::Admin { id, name, link })),
                Step::prompt("Step 4/4 - User id of the channel admin:"),
            ),
            Err(reason) => (Some(wrap(ProvisionState::Link { id, name })), Step::Invalid(reason)),
        },
        ProvisionState::Admin { id, name, link } => match parse_user_id(input) {
            Ok(admin) => (
                None,
                Step::Completed(Completion::Provision(ChannelDraft {
                    id,
                    name,
                    link,
                    admin,
                })),
            ),
            Err(reason) => (
                Some(wrap(ProvisionState::Admin { id, name, link })),
                Step::Invalid(reason),
            ),
        },
    }
}

fn advance_settings(
    channel: ChannelId,
    state: SettingsState,
    input: &str,
    doc: &Document,
) -> (Option<ConversationState>, Step) {
    let wrap = |state: SettingsState| ConversationState::SettingsEdit { channel, state };
    let keep = input.eq_ignore_ascii_case(KEEP);
    let current = doc.channel(channel);

    match state {
        SettingsState::Name => {
            if input.is_empty() {
                return (Some(wrap(SettingsState::Name)), Step::Invalid(msg_empty_input()));
            }
            let change = SettingsChange {
                name: (!keep).then(|| input.to_string()),
                ..Default::default()
            };
            let current_link = current.map(|c| c.link.as_str()).unwrap_or_default();
            (
                Some(wrap(SettingsState::Link { change })),
                Step::prompt(format!(
                    "Step 2/3 - New invite link (current: {}), or '{}':",
                    current_link, KEEP
                )),
            )
        }
        SettingsState::Link { mut change } => {
            if !keep {
                match parse_link(input) {
                    Ok(link) => change.link = Some(link),
                    Err(reason) => {
                        return (Some(wrap(SettingsState::Link { change })), Step::Invalid(reason))
                    }
                }
            }
            (
                Some(wrap(SettingsState::ChannelId { change })),
                Step::prompt(format!(
                    "Step 3/3 - New channel id (current: {}), or '{}':",
                    channel, KEEP
                )),
            )
        }
        SettingsState::ChannelId { mut change } => {
            if !keep {
                match parse_channel_id(input) {
                    Ok(id) if id == channel => {}
                    Ok(id) if doc.channels.contains_key(&id) => {
                        return (
                            Some(wrap(SettingsState::ChannelId { change })),
                            Step::Invalid(format!("❌ Channel {} is already registered.", id)),
                        )
                    }
                    Ok(id) => change.id = Some(id),
                    Err(reason) => {
                        return (
                            Some(wrap(SettingsState::ChannelId { change })),
                            Step::Invalid(reason),
                        )
                    }
                }
            }
            (None, Step::Completed(Completion::Settings { channel, change }))
        }
    }
}

fn advance_add_admin(
    channel: ChannelId,
    input: &str,
    doc: &Document,
) -> (Option<ConversationState>, Step) {
    let retry = Some(ConversationState::AddAdmin { channel });

    let admin = match parse_user_id(input) {
        Ok(admin) => admin,
        Err(reason) => return (retry, Step::Invalid(reason)),
    };
    if doc.channel(channel).is_some_and(|c| c.has_admin(admin)) {
        return (
            retry,
            Step::Invalid(format!("❌ User {} is already an admin of this channel.", admin)),
        );
    }
    (None, Step::Completed(Completion::AddAdmin { channel, admin }))
}

fn admin_channel(doc: &Document, actor: UserId, channel: ChannelId) -> Result<&Channel, Step> {
    if !is_channel_admin(doc, actor, channel) {
        return Err(Step::Aborted("❌ Access denied.".to_string()));
    }
    doc.channel(channel)
        .ok_or_else(|| Step::Aborted(msg_unknown_channel(channel)))
}

fn channel_keyboard(doc: &Document) -> Keyboard {
    Keyboard::column(
        doc.channels
            .values()
            .map(|c| {
                Button::callback(
                    format!("📢 {}", c.name),
                    CallbackAction::Register { channel: c.id }.encode(),
                )
            })
            .collect(),
    )
}

fn msg_empty_input() -> String {
    "❌ Please enter a non-empty value.".to_string()
}

// ============================================================================
// Validation
// ============================================================================

/// Channel ids look like `-100` followed by digits
pub fn parse_channel_id(input: &str) -> Result<ChannelId, String> {
    let input = input.trim();
    let invalid = || {
        format!(
            "❌ Invalid channel id '{}'. It must start with {} followed by digits.",
            input, CHANNEL_ID_PREFIX
        )
    };

    let digits = input.strip_prefix(CHANNEL_ID_PREFIX).ok_or_else(invalid)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    input.parse::<i64>().map(ChannelId).map_err(|_| invalid())
}

pub fn parse_link(input: &str) -> Result<String, String> {
    let input = input.trim();
    match input.strip_prefix(LINK_PREFIX) {
        Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
            Ok(input.to_string())
        }
        _ => Err(format!("❌ Invalid link. It must start with {}", LINK_PREFIX)),
    }
}

/// Positive numeric user id
pub fn parse_user_id(input: &str) -> Result<UserId, String> {
    match input.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(UserId(id)),
        _ => Err("❌ Invalid user id. Enter a positive number.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PendingRequest;

    const ROOT: UserId = UserId(1);
    const USER: UserId = UserId(500);

    fn channel(id: i64, name: &str) -> Channel {
        Channel::new(
            ChannelId(id),
            name.to_string(),
            format!("https://t.me/+{}", name),
            0,
        )
    }

    fn doc_with(channels: Vec<Channel>) -> Document {
        let mut doc = Document::default();
        doc.global_admins.insert(ROOT);
        for c in channels {
            doc.channels.insert(c.id, c);
        }
        doc
    }

    fn profile() -> ApplicantProfile {
        ApplicantProfile {
            name: "Doe".into(),
            surname: "Jane".into(),
            country: "France".into(),
        }
    }

    fn completed(step: Option<Step>) -> Completion {
        match step {
            Some(Step::Completed(c)) => c,
            other => panic!("expected completion, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_single_channel_skips_selection() {
        let doc = doc_with(vec![channel(-1001, "VIP")]);
        let mut engine = ConversationEngine::new();

        let step = engine.start_registration(USER, None, &doc);
        assert!(matches!(step, Step::Prompt { .. }));
        assert_eq!(
            engine.state(USER),
            Some(&ConversationState::Registration(RegistrationState::Name {
                channel: ChannelId(-1001)
            }))
        );

        engine.advance(USER, "Doe", &doc);
        engine.advance(USER, "Jane", &doc);
        let completion = completed(engine.advance(USER, "France", &doc));

        assert_eq!(
            completion,
            Completion::Registration {
                channel: ChannelId(-1001),
                profile: profile(),
            }
        );
        assert!(!engine.is_active(USER));
    }

    #[test]
    fn test_registration_multi_channel_offers_buttons() {
        let doc = doc_with(vec![channel(-1001, "A"), channel(-1002, "B")]);
        let mut engine = ConversationEngine::new();

        match engine.start_registration(USER, None, &doc) {
            Step::Prompt {
                keyboard: Some(keyboard),
                ..
            } => assert_eq!(keyboard.rows.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        // typed id works too
        let step = engine.advance(USER, "-1002", &doc).unwrap();
        assert!(matches!(step, Step::Prompt { .. }));
        assert_eq!(
            engine.state(USER),
            Some(&ConversationState::Registration(RegistrationState::Name {
                channel: ChannelId(-1002)
            }))
        );
    }

    #[test]
    fn test_registration_unknown_typed_channel_reprompts() {
        let doc = doc_with(vec![channel(-1001, "A"), channel(-1002, "B")]);
        let mut engine = ConversationEngine::new();
        engine.start_registration(USER, None, &doc);

        let step = engine.advance(USER, "-1003", &doc).unwrap();
        assert!(matches!(step, Step::Invalid(_)));
        assert_eq!(
            engine.state(USER),
            Some(&ConversationState::Registration(RegistrationState::SelectChannel))
        );
    }

    #[test]
    fn test_registration_blocked_for_members_and_pending() {
        let mut vip = channel(-1001, "VIP");
        vip.members.insert(USER, Grant::new(profile(), 0, 3600));
        vip.pending.insert(
            UserId(501),
            PendingRequest {
                profile: profile(),
                registered_at: 0,
            },
        );
        let doc = doc_with(vec![vip]);
        let mut engine = ConversationEngine::new();

        assert!(matches!(
            engine.start_registration(USER, None, &doc),
            Step::Member { name, link, .. } if name == "VIP" && link == "https://t.me/+VIP"
        ));
        assert!(matches!(
            engine.start_registration(UserId(501), None, &doc),
            Step::Aborted(text) if text.contains("already waiting")
        ));
        assert_eq!(engine.active_count(), 0);
    }

    #[test]
    fn test_empty_input_reprompts() {
        let doc = doc_with(vec![channel(-1001, "VIP")]);
        let mut engine = ConversationEngine::new();
        engine.start_registration(USER, None, &doc);

        let before = engine.state(USER).cloned();
        let step = engine.advance(USER, "   ", &doc).unwrap();
        assert!(matches!(step, Step::Invalid(_)));
        assert_eq!(engine.state(USER).cloned(), before);
    }

    #[test]
    fn test_advance_without_conversation() {
        let doc = doc_with(vec![]);
        let mut engine = ConversationEngine::new();
        assert!(engine.advance(USER, "hello", &doc).is_none());
    }

    #[test]
    fn test_cancel_discards_state() {
        let doc = doc_with(vec![channel(-1001, "VIP")]);
        let mut engine = ConversationEngine::new();
        engine.start_registration(USER, None, &doc);

        assert!(engine.cancel(USER));
        assert!(!engine.cancel(USER));
        assert!(engine.advance(USER, "Doe", &doc).is_none());
    }

    #[test]
    fn test_provisioning_scenario() {
        let doc = doc_with(vec![]);
        let mut engine = ConversationEngine::new();

        assert!(matches!(engine.start_provision(ROOT, &doc), Step::Prompt { .. }));
        engine.advance(ROOT, "-1009999", &doc);
        engine.advance(ROOT, "Test", &doc);
        engine.advance(ROOT, "https://t.me/+abc", &doc);
        let completion = completed(engine.advance(ROOT, "42", &doc));

        assert_eq!(
            completion,
            Completion::Provision(ChannelDraft {
                id: ChannelId(-1009999),
                name: "Test".to_string(),
                link: "https://t.me/+abc".to_string(),
                admin: UserId(42),
            })
        );
    }

    #[test]
    fn test_provisioning_requires_global_admin() {
        let doc = doc_with(vec![]);
        let mut engine = ConversationEngine::new();
        assert!(matches!(engine.start_provision(USER, &doc), Step::Aborted(_)));
        assert!(!engine.is_active(USER));
    }

    #[test]
    fn test_provisioning_rejects_bad_input() {
        let doc = doc_with(vec![channel(-1001, "Existing")]);
        let mut engine = ConversationEngine::new();
        engine.start_provision(ROOT, &doc);

        for bad in ["1234", "-100", "-100abc", "-1001"] {
            assert!(
                matches!(engine.advance(ROOT, bad, &doc), Some(Step::Invalid(_))),
                "accepted {}",
                bad
            );
        }
        engine.advance(ROOT, "-1002", &doc);
        engine.advance(ROOT, "Name", &doc);
        assert!(matches!(
            engine.advance(ROOT, "http://t.me/x", &doc),
            Some(Step::Invalid(_))
        ));
        engine.advance(ROOT, "https://t.me/x", &doc);
        for bad in ["abc", "0", "-5"] {
            assert!(matches!(engine.advance(ROOT, bad, &doc), Some(Step::Invalid(_))));
        }
        assert!(matches!(
            engine.advance(ROOT, "7", &doc),
            Some(Step::Completed(_))
        ));
    }

    #[test]
    fn test_settings_keep_everything() {
        let doc = doc_with(vec![channel(-1001, "VIP")]);
        let mut engine = ConversationEngine::new();
        engine.start_settings(ROOT, ChannelId(-1001), &doc);

        engine.advance(ROOT, "keep", &doc);
        engine.advance(ROOT, "KEEP", &doc);
        let completion = completed(engine.advance(ROOT, "keep", &doc));
        assert_eq!(
            completion,
            Completion::Settings {
                channel: ChannelId(-1001),
                change: SettingsChange::default(),
            }
        );
    }

    #[test]
    fn test_settings_change_all_fields() {
        let doc = doc_with(vec![channel(-1001, "VIP"), channel(-1002, "Other")]);
        let mut engine = ConversationEngine::new();
        engine.start_settings(ROOT, ChannelId(-1001), &doc);

        engine.advance(ROOT, "Renamed", &doc);
        engine.advance(ROOT, "https://t.me/+new", &doc);
        assert!(matches!(
            engine.advance(ROOT, "-1002", &doc),
            Some(Step::Invalid(_))
        ));
        let completion = completed(engine.advance(ROOT, "-1003", &doc));
        assert_eq!(
            completion,
            Completion::Settings {
                channel: ChannelId(-1001),
                change: SettingsChange {
                    name: Some("Renamed".to_string()),
                    link: Some("https://t.me/+new".to_string()),
                    id: Some(ChannelId(-1003)),
                },
            }
        );
    }

    #[test]
    fn test_settings_requires_channel_admin() {
        let mut vip = channel(-1001, "VIP");
        vip.add_admin(UserId(10));
        let doc = doc_with(vec![vip, channel(-1002, "Other")]);
        let mut engine = ConversationEngine::new();

        assert!(matches!(
            engine.start_settings(UserId(10), ChannelId(-1001), &doc),
            Step::Prompt { .. }
        ));
        assert!(matches!(
            engine.start_settings(UserId(10), ChannelId(-1002), &doc),
            Step::Aborted(_)
        ));
    }

    #[test]
    fn test_add_admin_rejects_existing() {
        let mut vip = channel(-1001, "VIP");
        vip.add_admin(UserId(10));
        let doc = doc_with(vec![vip]);
        let mut engine = ConversationEngine::new();
        engine.start_add_admin(UserId(10), ChannelId(-1001), &doc);

        assert!(matches!(
            engine.advance(UserId(10), "10", &doc),
            Some(Step::Invalid(_))
        ));
        let completion = completed(engine.advance(UserId(10), "11", &doc));
        assert_eq!(
            completion,
            Completion::AddAdmin {
                channel: ChannelId(-1001),
                admin: UserId(11),
            }
        );
    }

    #[test]
    fn test_starting_wizard_replaces_stale_one() {
        let doc = doc_with(vec![channel(-1001, "VIP")]);
        let mut engine = ConversationEngine::new();
        engine.start_registration(ROOT, None, &doc);
        engine.start_provision(ROOT, &doc);

        assert_eq!(
            engine.state(ROOT),
            Some(&ConversationState::Provision(ProvisionState::ChannelId))
        );
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn test_validators() {
        assert_eq!(parse_channel_id("-1001234567890"), Ok(ChannelId(-1001234567890)));
        assert!(parse_channel_id("-100").is_err());
        assert!(parse_channel_id("-200123").is_err());
        assert!(parse_link("https://t.me/").is_err());
        assert!(parse_link("https://t.me/+abc").is_ok());
        assert_eq!(parse_user_id(" 42 "), Ok(UserId(42)));
        assert!(parse_user_id("0").is_err());
    }
}
