//! Runtime config gate
//!
//! Boolean-ish feature flags persisted as config key/value pairs. The policy
//! is default-on: a missing key means enabled, and only the literal string
//! `"false"` disables a feature. Toggles flip between the two sentinels and
//! take effect on the next message without a restart.

use std::sync::Arc;

use crate::error::Result;
use crate::store::Store;

pub const FLAG_AI: &str = "ai";
pub const FLAG_DARK_HUMOR: &str = "dark_humor";

pub const VALUE_ON: &str = "true";
pub const VALUE_OFF: &str = "false";

/// Whether a stored value (or its absence) means "enabled".
pub fn is_enabled(value: Option<&str>) -> bool {
    value != Some(VALUE_OFF)
}

/// Keys the toggle callbacks accept. Anything else in a `toggle_*` token is
/// dropped by the menu decoder.
pub fn is_known(key: &str) -> bool {
    matches!(key, FLAG_AI | FLAG_DARK_HUMOR)
}

/// Spanish display label for a flag key.
pub fn label(key: &str) -> &str {
    match key {
        FLAG_AI => "IA",
        FLAG_DARK_HUMOR => "Humor negro",
        other => other,
    }
}

/// Snapshot of the effective flag values, read once per message or render.
#[derive(Debug, Clone, Copy)]
pub struct FlagView {
    pub ai: bool,
    pub dark_humor: bool,
}

impl FlagView {
    pub fn load(store: &Arc<Store>) -> Result<Self> {
        Ok(Self {
            ai: is_enabled(store.get_config(FLAG_AI)?.as_deref()),
            dark_humor: is_enabled(store.get_config(FLAG_DARK_HUMOR)?.as_deref()),
        })
    }
}

/// Flip a flag's stored value and persist it. Returns the new effective
/// value.
pub fn toggle(store: &Arc<Store>, key: &str) -> Result<bool> {
    let currently_on = is_enabled(store.get_config(key)?.as_deref());
    let next = if currently_on { VALUE_OFF } else { VALUE_ON };
    store.set_config(key, next)?;
    Ok(!currently_on)
}
