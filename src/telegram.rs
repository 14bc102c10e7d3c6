//! Telegram wiring
//!
//! Builds the bot, wires the dispatcher collaborators, and runs the
//! explicit Dispatcher with long polling. Wire types stop here: updates are
//! converted to the dispatcher's own inbound structs before any handler
//! logic runs.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{MessageEntityKind, Update},
};

use crate::ai::OpenAiClient;
use crate::config::Config;
use crate::dispatch::{BotApp, CallbackInbound, Inbound, ReplySender, SelfIdentity};
use crate::store::Store;
use crate::transport::TelegramTransport;

/// Run the bot until the process is stopped.
pub async fn run_bot(config: &Config, store: Arc<Store>) -> Result<()> {
    let bot = Bot::new(&config.telegram_token);

    // Verify the token and learn our own identity up front; the mention
    // trigger and command addressing need the username.
    let me = bot.get_me().await.context("getMe failed")?;
    let identity = SelfIdentity {
        id: me.id.0 as i64,
        username: me.username.clone().unwrap_or_default(),
    };
    tracing::info!(
        "Bot authenticated: @{} (ID: {})",
        identity.username,
        identity.id
    );

    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let model = Arc::new(OpenAiClient::new(
        &config.openai_api_key,
        &config.openai_model,
    )?);
    let app = Arc::new(BotApp::new(store, transport, model, identity));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    tracing::info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in update handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

async fn message_handler(msg: Message, app: Arc<BotApp>) -> Result<()> {
    if let Some(inbound) = to_inbound(&msg, &app.me) {
        app.handle_message(inbound).await;
    }
    Ok(())
}

async fn callback_handler(query: CallbackQuery, app: Arc<BotApp>) -> Result<()> {
    let inbound = CallbackInbound {
        callback_id: query.id.clone(),
        sender_id: query.from.id.0 as i64,
        chat_id: query.message.as_ref().map(|m| m.chat().id.0),
        message_id: query.message.as_ref().map(|m| m.id().0),
        data: query.data.clone(),
    };
    app.handle_callback(inbound).await;
    Ok(())
}

/// Convert a wire message into the dispatcher's inbound form. Non-text
/// messages and messages without a sender are dropped here.
fn to_inbound(msg: &Message, me: &SelfIdentity) -> Option<Inbound> {
    let text = msg.text()?.to_string();
    let from = msg.from.as_ref()?;

    let mentions = msg
        .parse_entities()
        .unwrap_or_default()
        .iter()
        .filter(|e| matches!(e.kind(), MessageEntityKind::Mention))
        .map(|e| e.text().trim_start_matches('@').to_string())
        .collect();

    let reply_to = msg
        .reply_to_message()
        .and_then(|replied| replied.from.as_ref())
        .map(|sender| ReplySender {
            sender_id: sender.id.0 as i64,
            first_name: sender.first_name.clone(),
            is_self: sender.id.0 as i64 == me.id,
        });

    Some(Inbound {
        chat_id: msg.chat.id.0,
        sender_id: from.id.0 as i64,
        username: from.username.clone(),
        first_name: Some(from.first_name.clone()),
        last_name: from.last_name.clone(),
        text,
        is_private: msg.chat.is_private(),
        reply_to,
        mentions,
    })
}
