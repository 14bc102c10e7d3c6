//! Dispatcher
//!
//! Top-level entry point for every inbound event. Resolves the caller's
//! identity, routes commands through the command table, drives the admin
//! menu from callback tokens, and runs the AI path for plain messages that
//! pass the trigger gate.
//!
//! Collaborators (store, transport, chat model) are injected; handlers for
//! distinct events run concurrently and share nothing but the store.

use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::types::InlineKeyboardMarkup;
use tracing::{error, info, warn};

use crate::ai::ChatModel;
use crate::context::{self, Mention, MessageFacts, RepliedTo, HISTORY_LIMIT};
use crate::error::{BotError, Result};
use crate::flags::{self, FlagView};
use crate::menu::{self, MenuAction, MenuPanel};
use crate::roles::{AdminAction, Role};
use crate::router::{self, Command, Parsed};
use crate::store::{Profile, Store, StoredUser};
use crate::transport::Transport;

/// Delay between the restart confirmation and process exit, long enough for
/// the confirmation send to flush.
const RESTART_DELAY: Duration = Duration::from_secs(2);

const GENERIC_FAILURE: &str = "Error al procesar solicitud.";
const DENIED_MESSAGE: &str = "No tienes permiso para ejecutar este comando.";
const DENIED_ALERT: &str = "No tienes permiso.";
const NOT_FOUND_MESSAGE: &str = "Usuario no encontrado.";

/// The bot's own Telegram identity, fetched once at startup.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub id: i64,
    pub username: String,
}

/// Sender of a message this update replies to.
#[derive(Debug, Clone)]
pub struct ReplySender {
    pub sender_id: i64,
    pub first_name: String,
    /// The replied-to message was sent by this bot.
    pub is_self: bool,
}

/// One inbound text message, already decoupled from the wire types.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: i64,
    pub sender_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub text: String,
    pub is_private: bool,
    pub reply_to: Option<ReplySender>,
    /// Usernames from mention entities, without the leading `@`.
    pub mentions: Vec<String>,
}

/// One inbound callback-button press.
#[derive(Debug, Clone)]
pub struct CallbackInbound {
    pub callback_id: String,
    pub sender_id: i64,
    /// Chat and message owning the pressed keyboard, when accessible.
    pub chat_id: Option<i64>,
    pub message_id: Option<i32>,
    pub data: Option<String>,
}

/// Everything a handler invocation needs, wired once at startup.
pub struct BotApp {
    pub store: Arc<Store>,
    pub transport: Arc<dyn Transport>,
    pub model: Arc<dyn ChatModel>,
    pub me: SelfIdentity,
    started_at: Instant,
}

impl BotApp {
    pub fn new(
        store: Arc<Store>,
        transport: Arc<dyn Transport>,
        model: Arc<dyn ChatModel>,
        me: SelfIdentity,
    ) -> Self {
        Self {
            store,
            transport,
            model,
            me,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Handle one inbound message end to end. Never panics the dispatcher:
    /// command failures get a fixed apology, AI-path failures stay silent.
    pub async fn handle_message(&self, msg: Inbound) {
        let profile = Profile {
            username: msg.username.clone(),
            first_name: msg.first_name.clone(),
            last_name: msg.last_name.clone(),
        };

        // First contact creates the user; the very first user ever becomes
        // the operator.
        let (caller, created) = match self.store.ensure_user(msg.sender_id, &profile) {
            Ok(pair) => pair,
            Err(e) => {
                error!("Identity resolution failed for {}: {}", msg.sender_id, e);
                let _ = self
                    .transport
                    .send_message(msg.chat_id, GENERIC_FAILURE, None)
                    .await;
                return;
            }
        };

        match router::parse(&msg.text, &self.me.username) {
            Parsed::NotACommand => {
                if let Err(e) = self.handle_plain(&msg).await {
                    // No reply on AI-path failures; a group does not need
                    // to see the error output.
                    warn!("AI path failed for chat {}: {}", msg.chat_id, e);
                }
            }
            Parsed::Unrecognized => {}
            Parsed::BadArgs(usage) => {
                let hint = format!("Uso: {}", usage);
                if let Err(e) = self.transport.send_message(msg.chat_id, &hint, None).await {
                    error!("Failed to send usage hint: {}", e);
                }
            }
            Parsed::Command(cmd) => {
                if let Err(e) = self.run_command(&msg, &caller, created, cmd).await {
                    error!(
                        "Command {:?} failed (caller {}, chat {}): {}",
                        cmd, caller.id, msg.chat_id, e
                    );
                    let _ = self
                        .transport
                        .send_message(msg.chat_id, GENERIC_FAILURE, None)
                        .await;
                }
            }
        }
    }

    async fn run_command(
        &self,
        msg: &Inbound,
        caller: &StoredUser,
        created: bool,
        cmd: Command,
    ) -> Result<()> {
        match cmd {
            Command::Start => {
                let text = if created {
                    match caller.role {
                        Role::Operator => "Sistema inicializado.".to_string(),
                        _ => "Registro completado.".to_string(),
                    }
                } else {
                    format!(
                        "Sistema listo, {}.",
                        caller.first_name.as_deref().unwrap_or("usuario")
                    )
                };
                self.transport.send_message(msg.chat_id, &text, None).await
            }

            Command::Promote(target) => self.change_role(msg, caller, target, Role::Admin).await,
            Command::Demote(target) => self.change_role(msg, caller, target, Role::User).await,

            Command::Users => {
                if !caller.role.allows(AdminAction::ListUsers) {
                    return self.deny(msg.chat_id).await;
                }
                let users = self.store.list_users()?;
                let (text, _) = menu::render_user_list(&users);
                self.transport.send_message(msg.chat_id, &text, None).await
            }

            Command::AdminMenu => {
                if !caller.role.allows(AdminAction::AdminMenu) {
                    return self.deny(msg.chat_id).await;
                }
                let (text, keyboard) = menu::render_main();
                self.transport
                    .send_message(msg.chat_id, &text, Some(keyboard))
                    .await
            }

            Command::Restart => {
                if !caller.role.allows(AdminAction::Restart) {
                    return self.deny(msg.chat_id).await;
                }
                warn!(
                    "Restart requested by user {} (telegram {})",
                    caller.id, caller.telegram_id
                );
                self.transport
                    .send_message(msg.chat_id, "Reiniciando el sistema...", None)
                    .await?;
                // Exiting *is* the restart; the process supervisor
                // relaunches us.
                tokio::spawn(async {
                    tokio::time::sleep(RESTART_DELAY).await;
                    std::process::exit(0);
                });
                Ok(())
            }
        }
    }

    async fn change_role(
        &self,
        msg: &Inbound,
        caller: &StoredUser,
        target: i64,
        new_role: Role,
    ) -> Result<()> {
        let action = if new_role == Role::Admin {
            AdminAction::Promote
        } else {
            AdminAction::Demote
        };
        if !caller.role.allows(action) {
            return self.deny(msg.chat_id).await;
        }

        match self.store.update_user_role(target, new_role) {
            Ok(user) => {
                let text = if new_role == Role::Admin {
                    format!("Usuario {} promovido a Admin.", user.display_name())
                } else {
                    format!("Usuario {} degradado a Usuario.", user.display_name())
                };
                info!(
                    "User {} role set to {} by {}",
                    user.id,
                    new_role.as_str(),
                    caller.id
                );
                self.transport.send_message(msg.chat_id, &text, None).await
            }
            Err(BotError::NotFound) => {
                self.transport
                    .send_message(msg.chat_id, NOT_FOUND_MESSAGE, None)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn deny(&self, chat_id: i64) -> Result<()> {
        self.transport
            .send_message(chat_id, DENIED_MESSAGE, None)
            .await
    }

    /// The AI path. Runs only when the `ai` flag is enabled and the message
    /// qualifies: private chat, bot mention, or reply to the bot.
    async fn handle_plain(&self, msg: &Inbound) -> Result<()> {
        let view = FlagView::load(&self.store)?;
        if !view.ai {
            return Ok(());
        }

        let replying_to_bot = msg.reply_to.as_ref().is_some_and(|r| r.is_self);
        let mentioned = context::mentions_bot(&msg.text, &self.me.username);
        if !(msg.is_private || mentioned || replying_to_bot) {
            return Ok(());
        }

        self.transport.send_typing(msg.chat_id).await?;

        let facts = MessageFacts {
            caller_id: msg.sender_id,
            caller_username: msg.username.clone(),
            caller_first_name: msg.first_name.clone(),
            replied_to: msg.reply_to.as_ref().map(|r| RepliedTo {
                telegram_id: r.sender_id,
                first_name: r.first_name.clone(),
            }),
            mentions: msg
                .mentions
                .iter()
                .filter(|m| !m.eq_ignore_ascii_case(&self.me.username))
                .map(|m| Mention {
                    username: m.clone(),
                })
                .collect(),
        };

        let stripped = context::strip_self_mention(&msg.text, &self.me.username);
        let history = self.store.recent_turns(msg.chat_id, HISTORY_LIMIT)?;
        let prompt = context::build_prompt(&facts, &history, &stripped, view.dark_humor);

        // The user turn is persisted before the call so the exchange is
        // recorded even if the completion fails.
        self.store.append_turn(msg.chat_id, "user", &stripped)?;

        let reply = self.model.complete(&prompt).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Ok(());
        }

        self.transport.send_message(msg.chat_id, reply, None).await?;
        self.store.append_turn(msg.chat_id, "assistant", reply)?;
        info!(
            "Replied in chat {} ({} prompt turns)",
            msg.chat_id,
            prompt.len()
        );
        Ok(())
    }

    /// Handle one callback-button press.
    pub async fn handle_callback(&self, cb: CallbackInbound) {
        if let Err(e) = self.dispatch_callback(&cb).await {
            error!("Callback failed (user {}): {}", cb.sender_id, e);
            // Unexpected errors surface as a toast; the menu stays as it
            // was.
            let _ = self
                .transport
                .answer_callback(&cb.callback_id, Some(GENERIC_FAILURE), true)
                .await;
        }
    }

    async fn dispatch_callback(&self, cb: &CallbackInbound) -> Result<()> {
        let action = cb.data.as_deref().and_then(MenuAction::decode);
        let Some(action) = action else {
            return self
                .transport
                .answer_callback(&cb.callback_id, None, false)
                .await;
        };

        // A callback from someone we never saw resolves to least privilege.
        let role = self
            .store
            .get_user_by_telegram_id(cb.sender_id)?
            .map(|u| u.role)
            .unwrap_or(Role::User);

        if !role.allows(action.required()) {
            return self
                .transport
                .answer_callback(&cb.callback_id, Some(DENIED_ALERT), true)
                .await;
        }

        let (Some(chat_id), Some(message_id)) = (cb.chat_id, cb.message_id) else {
            return self
                .transport
                .answer_callback(&cb.callback_id, None, false)
                .await;
        };

        match action {
            MenuAction::Toggle(key) => {
                let now_on = flags::toggle(&self.store, &key)?;
                let confirmation = format!(
                    "{}: {}",
                    flags::label(&key),
                    if now_on { "activado" } else { "desactivado" }
                );
                self.transport
                    .answer_callback(&cb.callback_id, Some(&confirmation), false)
                    .await?;

                // Re-render in place so the menu never grows the chat.
                let view = FlagView::load(&self.store)?;
                let (text, keyboard) = menu::render_config(&view);
                self.transport
                    .edit_message(chat_id, message_id, &text, Some(keyboard))
                    .await
            }
            MenuAction::Show(panel) => {
                let (text, keyboard) = self.render_panel(panel)?;
                self.transport
                    .edit_message(chat_id, message_id, &text, Some(keyboard))
                    .await?;
                self.transport
                    .answer_callback(&cb.callback_id, None, false)
                    .await
            }
        }
    }

    fn render_panel(&self, panel: MenuPanel) -> Result<(String, InlineKeyboardMarkup)> {
        let view = FlagView::load(&self.store)?;
        Ok(match panel {
            MenuPanel::Main => menu::render_main(),
            MenuPanel::Config => menu::render_config(&view),
            MenuPanel::Status => {
                menu::render_status(self.store.user_count()?, self.uptime_secs(), &view)
            }
            MenuPanel::UserList => menu::render_user_list(&self.store.list_users()?),
        })
    }
}
