//! Access Bot
//!
//! Main bot implementation that:
//! - Polls the platform for private messages and button presses
//! - Routes commands, wizard input and callbacks
//! - Commits finished wizards through the gatekeeper
//!
//! Updates are processed one at a time. Store writes are still serialized
//! by the store itself, since the expiration sweeper runs concurrently.

use super::callback::CallbackAction;
use super::commands::{parse_command, Command};
use super::conversation::{Completion, ConversationEngine, Step};
use super::duration_parse::parse_duration_to_hours;
use super::messages::*;
use super::traits::*;
use crate::clock::Clock;
use crate::gatekeeper::authorization::accessible_channels;
use crate::gatekeeper::channels::{add_channel_admin, apply_settings, provision_channel};
use crate::gatekeeper::removal::notify_best_effort;
use crate::gatekeeper::{
    is_channel_admin, is_global_admin, AccessError, AccessPolicy, AccessResult, GrantAuthority,
};
use crate::store::{Channel, Document, Store};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between polls; the Bot API long-polls so this only matters when
/// updates arrive back to back or polling fails.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Access bot
pub struct AccessBot<G: MessagingGateway> {
    gateway: G,
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    authority: GrantAuthority<G>,
    conversations: ConversationEngine,
}

impl<G: MessagingGateway> AccessBot<G> {
    pub fn new(gateway: G, store: Arc<Store>, clock: Arc<dyn Clock>, policy: AccessPolicy) -> Self {
        let authority = GrantAuthority::new(store.clone(), gateway.clone(), clock.clone(), policy);
        Self {
            gateway,
            store,
            clock,
            authority,
            conversations: ConversationEngine::new(),
        }
    }

    pub fn conversations(&self) -> &ConversationEngine {
        &self.conversations
    }

    /// Run bot event loop
    ///
    /// Never returns on its own; receive failures are logged and retried.
    pub async fn run(&mut self) {
        info!("Bot started, waiting for updates");
        let mut interval = tokio::time::interval(POLL_INTERVAL);

        loop {
            interval.tick().await;
            if let Err(e) = self.poll_once().await {
                warn!("Error receiving updates, will retry: {}", e);
                tokio::time::sleep(ERROR_BACKOFF).await;
            }
        }
    }

    /// Receive one batch of updates and handle each of them.
    ///
    /// Returns the number of updates handled.
    pub async fn poll_once(&mut self) -> GatewayResult<usize> {
        let updates = self.gateway.receive_updates().await?;
        let count = updates.len();

        for update in updates {
            let sender = update.sender();
            if let Err(e) = self.handle_update(update).await {
                // A daemon must survive individual update failures
                match &e {
                    AccessError::Persistence(_) => warn!(user = %sender, error = %e, "Update failed"),
                    _ => debug!(user = %sender, error = %e, "Request refused"),
                }
                notify_best_effort(&self.gateway, sender, &e.user_message()).await;
            }
        }
        Ok(count)
    }

    /// Handle one inbound update
    pub async fn handle_update(&mut self, update: Update) -> AccessResult<()> {
        match update {
            Update::Message { sender, text, .. } => {
                if text.trim_start().starts_with('/') {
                    self.handle_command(sender, parse_command(&text)).await
                } else {
                    self.handle_text(sender, &text).await
                }
            }
            Update::Callback {
                id,
                sender,
                message,
                data,
            } => {
                if let Err(e) = self.gateway.answer_callback(&id, None).await {
                    debug!(error = %e, "Failed to answer callback");
                }
                match CallbackAction::decode(&data) {
                    Ok(action) => self.handle_callback(sender, action, message).await,
                    Err(e) => {
                        warn!(user = %sender, error = %e, "Ignoring callback");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn reply(&self, actor: UserId, text: &str) {
        notify_best_effort(&self.gateway, actor, text).await;
    }

    /// Reply in as many messages as the text needs
    async fn reply_long(&self, actor: UserId, text: &str) {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            self.reply(actor, &chunk).await;
        }
    }

    async fn reply_with(&self, actor: UserId, text: &str, keyboard: &Keyboard) {
        if let Err(e) = self.gateway.send(actor.into(), text, Some(keyboard)).await {
            warn!(user = %actor, error = %e, "Failed to send reply");
        }
    }

    // ========================================================================
    // Free text
    // ========================================================================

    async fn handle_text(&mut self, actor: UserId, text: &str) -> AccessResult<()> {
        let doc = self.store.load().await?;
        match self.conversations.advance(actor, text, &doc) {
            Some(step) => self.handle_step(actor, step).await,
            None => {
                self.reply(actor, "ℹ️ Send /start to register or /help for the commands.")
                    .await;
                Ok(())
            }
        }
    }

    async fn handle_step(&mut self, actor: UserId, step: Step) -> AccessResult<()> {
        match step {
            Step::Prompt {
                text,
                keyboard: Some(keyboard),
            } => self.reply_with(actor, &text, &keyboard).await,
            Step::Prompt { text, keyboard: None } => self.reply(actor, &text).await,
            Step::Invalid(text) | Step::Aborted(text) => self.reply(actor, &text).await,
            Step::Member { name, link, grant } => {
                let keyboard = Keyboard::single(Button::url("🔗 Join the channel", link));
                self.reply_with(
                    actor,
                    &msg_already_member(&name, &grant, self.clock.now()),
                    &keyboard,
                )
                .await
            }
            Step::Completed(completion) => return self.commit(actor, completion).await,
        }
        Ok(())
    }

    /// Commit a finished wizard
    async fn commit(&mut self, actor: UserId, completion: Completion) -> AccessResult<()> {
        let now = self.clock.now();

        match completion {
            Completion::Registration { channel, profile } => {
                self.authority
                    .submit_registration(actor, channel, profile.clone())
                    .await?;
                let doc = self.store.load().await?;
                if let Some(record) = doc.channel(channel) {
                    self.reply(actor, &msg_registration_submitted(record, &profile))
                        .await;
                }
            }
            Completion::Provision(draft) => {
                let admin = draft.admin;
                let channel = provision_channel(&self.store, actor, draft, now).await?;
                self.reply(actor, &msg_channel_created(&channel)).await;
                if admin != actor {
                    self.reply(admin, &msg_now_admin(&channel)).await;
                }
            }
            Completion::Settings { channel, change } => {
                let channel = apply_settings(&self.store, actor, channel, change, now).await?;
                self.reply(actor, &msg_settings_updated(&channel)).await;
            }
            Completion::AddAdmin { channel, admin } => {
                let channel = add_channel_admin(&self.store, actor, channel, admin, now).await?;
                self.reply(actor, &msg_admin_added(&channel, admin)).await;
                self.reply(admin, &msg_now_admin(&channel)).await;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, actor: UserId, command: Command) -> AccessResult<()> {
        let doc = self.store.load().await?;
        let administered = accessible_channels(&doc, actor);
        // Global admins count even before the first channel exists
        let is_admin = is_global_admin(&doc, actor) || !administered.is_empty();

        if command.is_admin_only() && !is_admin {
            return Err(AccessError::Unauthorized);
        }

        match command {
            Command::Start { channel: None } if is_admin => {
                self.reply(actor, &msg_help(true)).await;
            }
            Command::Start { channel } => {
                let step = self.conversations.start_registration(actor, channel, &doc);
                return self.handle_step(actor, step).await;
            }
            Command::Cancel => {
                let text = if self.conversations.cancel(actor) {
                    "❌ Cancelled."
                } else {
                    "ℹ️ Nothing to cancel."
                };
                self.reply(actor, text).await;
            }
            Command::Help => {
                self.reply(actor, &msg_help(is_admin)).await;
            }
            Command::Status => {
                self.reply(actor, &self.status_text(&doc, actor)).await;
            }
            Command::Channels => {
                let channels: Vec<&Channel> = administered
                    .iter()
                    .filter_map(|id| doc.channel(*id))
                    .collect();
                self.reply(actor, &msg_channel_list(&channels)).await;
            }
            Command::Info { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?;
                let keyboard = Keyboard::column(vec![
                    Button::callback(
                        "⚙️ Settings",
                        CallbackAction::EditSettings { channel: channel.id }.encode(),
                    ),
                    Button::callback(
                        "👮 Add admin",
                        CallbackAction::AddAdmin { channel: channel.id }.encode(),
                    ),
                ]);
                self.reply_with(actor, &msg_channel_info(channel), &keyboard)
                    .await;
            }
            Command::List { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?;
                self.reply_long(actor, &msg_member_list(channel, self.clock.now()))
                    .await;
            }
            Command::Pending { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?;
                self.reply_long(actor, &msg_pending_list(channel)).await;
            }
            Command::Approve {
                channel,
                user,
                duration,
            } => {
                let hours = parse_duration_to_hours(&duration).map_err(AccessError::Validation)?;
                let grant = self.authority.approve(actor, channel, user, hours).await?;
                self.reply(actor, &msg_admin_approved(grant.profile(), user, &grant, hours))
                    .await;
            }
            Command::Reject { channel, user } => {
                if self.authority.reject(actor, channel, user).await? {
                    self.reply(actor, &msg_admin_rejected(user)).await;
                } else {
                    return Err(AccessError::NotPending);
                }
            }
            Command::Remove { channel, user } => {
                let channel = resolve_channel(&doc, actor, channel)?.id;
                let grant = self.authority.revoke(actor, channel, user).await?;
                self.reply(actor, &msg_member_removed(grant.profile(), user))
                    .await;
            }
            Command::Purge { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?;
                let removed = self.authority.purge(actor, channel.id).await?;
                self.reply(actor, &msg_purge_done(&channel.name, removed))
                    .await;
            }
            Command::NewChannel => {
                let step = self.conversations.start_provision(actor, &doc);
                return self.handle_step(actor, step).await;
            }
            Command::Settings { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?.id;
                let step = self.conversations.start_settings(actor, channel, &doc);
                return self.handle_step(actor, step).await;
            }
            Command::AddAdmin { channel } => {
                let channel = resolve_channel(&doc, actor, channel)?.id;
                let step = self.conversations.start_add_admin(actor, channel, &doc);
                return self.handle_step(actor, step).await;
            }
            Command::Usage(usage) => {
                self.reply(actor, &format!("Usage: {}", usage)).await;
            }
            Command::Unknown(_) => {
                self.reply(actor, "❓ Unknown command. Send /help.").await;
            }
        }
        Ok(())
    }

    fn status_text(&self, doc: &Document, actor: UserId) -> String {
        let now = self.clock.now();
        let mut lines = Vec::new();
        for channel in doc.channels.values() {
            if let Some(grant) = channel.members.get(&actor) {
                lines.push(msg_member_status(channel, grant, now));
            } else if channel.pending.contains_key(&actor) {
                lines.push(msg_pending_status(channel));
            }
        }
        if lines.is_empty() {
            msg_no_access()
        } else {
            lines.join("\n\n")
        }
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    async fn handle_callback(
        &mut self,
        actor: UserId,
        action: CallbackAction,
        message: Option<MessageHandle>,
    ) -> AccessResult<()> {
        match action {
            CallbackAction::Register { channel } => {
                let doc = self.store.load().await?;
                let step = self.conversations.select_channel(actor, channel, &doc);
                self.handle_step(actor, step).await
            }
            CallbackAction::Approve {
                channel,
                applicant,
                hours,
            } => {
                let grant = self.authority.approve(actor, channel, applicant, hours).await?;
                let text = msg_admin_approved(grant.profile(), applicant, &grant, hours);
                self.update_admin_message(actor, message, &text).await;
                Ok(())
            }
            CallbackAction::Reject { channel, applicant } => {
                if !self.authority.reject(actor, channel, applicant).await? {
                    return Err(AccessError::NotPending);
                }
                self.update_admin_message(actor, message, &msg_admin_rejected(applicant))
                    .await;
                Ok(())
            }
            CallbackAction::EditSettings { channel } => {
                let doc = self.store.load().await?;
                let step = self.conversations.start_settings(actor, channel, &doc);
                self.handle_step(actor, step).await
            }
            CallbackAction::AddAdmin { channel } => {
                let doc = self.store.load().await?;
                let step = self.conversations.start_add_admin(actor, channel, &doc);
                self.handle_step(actor, step).await
            }
        }
    }

    /// Replace the buttons of a registration notice with the outcome,
    /// or send the outcome when the notice cannot be edited.
    async fn update_admin_message(&self, actor: UserId, message: Option<MessageHandle>, text: &str) {
        if let Some(handle) = message {
            match self.gateway.edit(&handle, text, None).await {
                Ok(()) => return,
                Err(e) => debug!(error = %e, "Could not edit admin message"),
            }
        }
        self.reply(actor, text).await;
    }
}

/// Pick the channel an admin command applies to.
///
/// Without an explicit channel the actor's only administered channel is
/// used; with several the actor must name one.
fn resolve_channel(
    doc: &Document,
    actor: UserId,
    requested: Option<ChannelId>,
) -> AccessResult<&Channel> {
    let id = match requested {
        Some(id) => {
            if !is_channel_admin(doc, actor, id) {
                return Err(AccessError::Unauthorized);
            }
            id
        }
        None => {
            let administered = accessible_channels(doc, actor);
            let mut ids = administered.iter();
            match (ids.next(), ids.next()) {
                (Some(id), None) => *id,
                (None, _) => return Err(AccessError::Unauthorized),
                (Some(_), Some(_)) => {
                    return Err(AccessError::Validation(
                        "Several channels available: add the channel id to the command. \
                         /channels lists them."
                            .to_string(),
                    ))
                }
            }
        }
    };
    doc.channel(id).ok_or(AccessError::ChannelNotFound(id))
}
