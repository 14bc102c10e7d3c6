//! Kenner Bot
//!
//! A Telegram assistant with a rough Venezuelan persona and role-gated
//! admin controls.
//!
//! # Features
//!
//! - **Roles**: operator > admin > user; the first user ever seen becomes
//!   the operator
//! - **Commands**: /start, /promote, /demote, /users, /admin, /restart
//! - **Admin menu**: inline-keyboard panels edited in place
//! - **AI replies**: OpenAI chat completions over a bounded per-chat history
//! - **Runtime flags**: `ai` and `dark_humor`, toggled without a restart
//! - **Status API**: read-only axum endpoints over the same store
//!
//! # Architecture
//!
//! ```text
//! Telegram ──► dispatch ──┬── router (commands)
//!   (teloxide)            ├── menu (callback panels)
//!                         ├── context + ai (chat completions)
//!                         └── store (SQLite: users, config, history)
//!                                │
//! HTTP ──────► api ──────────────┘
//!   (axum, read-only)
//! ```

pub mod ai;
pub mod api;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod flags;
pub mod menu;
pub mod roles;
pub mod router;
pub mod store;
pub mod telegram;
pub mod transport;

pub use config::Config;
pub use error::{BotError, Result};
pub use roles::Role;
pub use store::Store;
