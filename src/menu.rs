//! Admin menu
//!
//! Inline-keyboard panel state machine. The panel currently shown is owned
//! by the edited message and identified only by the callback tokens on its
//! buttons; rendering is pure (panel + data in, text + keyboard out) so it
//! tests without a transport.
//!
//! Transitions: main -> config/status/users via buttons, each back to main,
//! and config -> config after a toggle (re-rendered in place with updated
//! glyphs so the menu never grows the chat).

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::flags::{self, FlagView, FLAG_AI, FLAG_DARK_HUMOR};
use crate::roles::AdminAction;
use crate::store::StoredUser;

/// Which inline panel a message is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPanel {
    Main,
    Config,
    Status,
    UserList,
}

impl MenuPanel {
    pub fn token(&self) -> &'static str {
        match self {
            MenuPanel::Main => "admin_main",
            MenuPanel::Config => "admin_config",
            MenuPanel::Status => "admin_status",
            MenuPanel::UserList => "admin_users",
        }
    }

    fn from_token(token: &str) -> Option<MenuPanel> {
        match token {
            "admin_main" => Some(MenuPanel::Main),
            "admin_config" => Some(MenuPanel::Config),
            "admin_status" => Some(MenuPanel::Status),
            "admin_users" => Some(MenuPanel::UserList),
            _ => None,
        }
    }
}

/// Decoded callback token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Show(MenuPanel),
    /// Flip one config flag, then re-render the config panel.
    Toggle(String),
}

impl MenuAction {
    pub fn encode(&self) -> String {
        match self {
            MenuAction::Show(panel) => panel.token().to_string(),
            MenuAction::Toggle(key) => format!("toggle_{}", key),
        }
    }

    /// Decode callback data. Unknown tokens and toggles of unknown flags
    /// decode to `None` and are answered without effect.
    pub fn decode(data: &str) -> Option<MenuAction> {
        if let Some(panel) = MenuPanel::from_token(data) {
            return Some(MenuAction::Show(panel));
        }
        let key = data.strip_prefix("toggle_")?;
        if flags::is_known(key) {
            Some(MenuAction::Toggle(key.to_string()))
        } else {
            None
        }
    }

    /// The policy action a caller must be allowed before this executes.
    pub fn required(&self) -> AdminAction {
        match self {
            MenuAction::Show(MenuPanel::Config) => AdminAction::ViewConfig,
            MenuAction::Show(MenuPanel::UserList) => AdminAction::ListUsers,
            MenuAction::Show(_) => AdminAction::AdminMenu,
            MenuAction::Toggle(_) => AdminAction::ToggleFlag,
        }
    }
}

fn glyph(on: bool) -> &'static str {
    if on {
        "✅"
    } else {
        "🚫"
    }
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![InlineKeyboardButton::callback(
        "« Volver",
        MenuPanel::Main.token(),
    )]
}

/// Main panel: entry point of the menu.
pub fn render_main() -> (String, InlineKeyboardMarkup) {
    let text = "Panel de administración\n\nElige una sección.".to_string();
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "Configuración",
            MenuPanel::Config.token(),
        )],
        vec![InlineKeyboardButton::callback(
            "Estado",
            MenuPanel::Status.token(),
        )],
        vec![InlineKeyboardButton::callback(
            "Usuarios",
            MenuPanel::UserList.token(),
        )],
    ]);
    (text, keyboard)
}

/// Config panel: one toggle button per flag, glyphs reflect the current
/// effective values.
pub fn render_config(view: &FlagView) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "Configuración\n\nIA: {}\nHumor negro: {}",
        glyph(view.ai),
        glyph(view.dark_humor)
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("IA {}", glyph(view.ai)),
            MenuAction::Toggle(FLAG_AI.to_string()).encode(),
        )],
        vec![InlineKeyboardButton::callback(
            format!("Humor negro {}", glyph(view.dark_humor)),
            MenuAction::Toggle(FLAG_DARK_HUMOR.to_string()).encode(),
        )],
        back_row(),
    ]);
    (text, keyboard)
}

/// Status panel: quick process facts.
pub fn render_status(
    user_count: i64,
    uptime_secs: u64,
    view: &FlagView,
) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "Estado\n\nEn línea: sí\nUsuarios registrados: {}\nUptime: {}s\nIA: {}",
        user_count,
        uptime_secs,
        glyph(view.ai)
    );
    (text, InlineKeyboardMarkup::new(vec![back_row()]))
}

/// User list panel. Shows the internal ids promote/demote expect.
pub fn render_user_list(users: &[StoredUser]) -> (String, InlineKeyboardMarkup) {
    let mut text = String::from("Usuarios registrados:\n");
    for user in users {
        text.push_str(&format!(
            "ID: {} | {} | Rol: {}\n",
            user.id,
            user.display_name(),
            user.role.label()
        ));
    }
    if users.is_empty() {
        text.push_str("(ninguno)\n");
    }
    (text, InlineKeyboardMarkup::new(vec![back_row()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_tokens(keyboard: &InlineKeyboardMarkup) -> Vec<String> {
        keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_token_roundtrip() {
        for action in [
            MenuAction::Show(MenuPanel::Main),
            MenuAction::Show(MenuPanel::Config),
            MenuAction::Show(MenuPanel::Status),
            MenuAction::Show(MenuPanel::UserList),
            MenuAction::Toggle("ai".to_string()),
            MenuAction::Toggle("dark_humor".to_string()),
        ] {
            let encoded = action.encode();
            assert_eq!(MenuAction::decode(&encoded), Some(action));
        }
    }

    #[test]
    fn test_unknown_tokens_rejected() {
        assert_eq!(MenuAction::decode("admin_secret"), None);
        assert_eq!(MenuAction::decode("toggle_restart"), None);
        assert_eq!(MenuAction::decode(""), None);
    }

    #[test]
    fn test_main_links_to_all_panels() {
        let (_, keyboard) = render_main();
        let tokens = callback_tokens(&keyboard);
        assert!(tokens.contains(&"admin_config".to_string()));
        assert!(tokens.contains(&"admin_status".to_string()));
        assert!(tokens.contains(&"admin_users".to_string()));
    }

    #[test]
    fn test_every_sub_panel_has_a_way_back() {
        let view = FlagView {
            ai: true,
            dark_humor: false,
        };
        let (_, config) = render_config(&view);
        let (_, status) = render_status(3, 60, &view);
        let (_, users) = render_user_list(&[]);

        for keyboard in [config, status, users] {
            assert!(callback_tokens(&keyboard).contains(&"admin_main".to_string()));
        }
    }

    #[test]
    fn test_config_glyphs_track_flags() {
        let on = FlagView {
            ai: true,
            dark_humor: true,
        };
        let off = FlagView {
            ai: false,
            dark_humor: false,
        };

        let (text_on, _) = render_config(&on);
        let (text_off, _) = render_config(&off);
        assert!(text_on.contains("IA: ✅"));
        assert!(text_off.contains("IA: 🚫"));
        assert_ne!(text_on, text_off);
    }

    #[test]
    fn test_config_exposes_toggle_tokens() {
        let view = FlagView {
            ai: true,
            dark_humor: false,
        };
        let (_, keyboard) = render_config(&view);
        let tokens = callback_tokens(&keyboard);
        assert!(tokens.contains(&"toggle_ai".to_string()));
        assert!(tokens.contains(&"toggle_dark_humor".to_string()));
    }

    #[test]
    fn test_user_list_shows_internal_ids() {
        let users = vec![StoredUser {
            id: 7,
            telegram_id: 555,
            username: Some("ana".to_string()),
            first_name: None,
            last_name: None,
            role: Role::Admin,
            created_at: 0,
        }];
        let (text, _) = render_user_list(&users);
        assert!(text.contains("ID: 7"));
        assert!(text.contains("ana"));
        assert!(text.contains("Admin"));
    }

    #[test]
    fn test_required_actions() {
        assert_eq!(
            MenuAction::Show(MenuPanel::Config).required(),
            AdminAction::ViewConfig
        );
        assert_eq!(
            MenuAction::Show(MenuPanel::UserList).required(),
            AdminAction::ListUsers
        );
        assert_eq!(
            MenuAction::Toggle("ai".to_string()).required(),
            AdminAction::ToggleFlag
        );
        assert_eq!(
            MenuAction::Show(MenuPanel::Main).required(),
            AdminAction::AdminMenu
        );
    }
}
