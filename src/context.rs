//! Conversation context builder
//!
//! Assembles the full prompt for the chat-completion collaborator: persona
//! directive, tone selected by the `dark_humor` flag, situational facts
//! about the caller and the message, the bounded chat history, and the
//! current text as the final user turn.

use crate::store::ConversationTurn;

/// Turns of history included in each prompt.
pub const HISTORY_LIMIT: usize = 10;

/// One prompt message for the chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTurn {
    pub role: String, // "system" | "user" | "assistant"
    pub content: String,
}

impl PromptTurn {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// The sender of a replied-to message.
#[derive(Debug, Clone)]
pub struct RepliedTo {
    pub telegram_id: i64,
    pub first_name: String,
}

/// A user mentioned by `@username`.
///
/// Telegram mention entities carry only the username; the numeric id is not
/// resolvable from the entity alone and is surfaced as explicitly
/// unavailable rather than invented.
#[derive(Debug, Clone)]
pub struct Mention {
    pub username: String,
}

/// Situational facts about one inbound plain message.
#[derive(Debug, Clone, Default)]
pub struct MessageFacts {
    pub caller_id: i64,
    pub caller_username: Option<String>,
    pub caller_first_name: Option<String>,
    pub replied_to: Option<RepliedTo>,
    pub mentions: Vec<Mention>,
}

const PERSONA: &str = "Tu nombre es Kenner, un hombre pana con mucha personalidad y bastante rudo.\n\
Tu personalidad:\n\
- Eres rudo, directo y no te andas con rodeos. Tienes un carácter fuerte y hablas golpeado.\n\
- Hablas con un marcado acento venezolano (usa palabras como 'pana', 'chévere', 'chamo', 'epale', 'si va', 'no me vengas con cuentos').\n\
- Te dejas llevar por el tono del usuario: si te buscan pelea, dásela sin piedad; si son panas, sé un pana rudo.\n\
- Si te preguntan por su ID o el de la persona a la que responden, dáselo de una vez sin tanto drama; si un ID no está disponible, dilo claro, no lo inventes.\n\
- Si te preguntan por comandos, diles que tienes: /start, /users, /promote, /demote. No te gusta repetir las cosas.\n\
- Responde de forma natural sin marcas de agua.";

const TONE_DARK: &str = "Tienes un sentido del humor muy ácido y negro. \
No tienes filtros sociales y eres políticamente incorrecto.";

const TONE_PLAIN: &str = "Mantén el humor ligero y sin pasarte de tono; \
sigue siendo rudo pero sin humor negro.";

/// The fixed persona/tone directive, selected by the `dark_humor` flag.
pub fn tone_directive(dark_humor: bool) -> &'static str {
    if dark_humor {
        TONE_DARK
    } else {
        TONE_PLAIN
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte ranges of the bot's own `@username` in `text`, case-insensitive.
/// A match followed by another username character is a different,
/// longer username and does not count.
fn self_mention_ranges(text: &str, bot_username: &str) -> Vec<(usize, usize)> {
    if bot_username.is_empty() {
        return Vec::new();
    }
    // Usernames are ASCII; ASCII folding keeps byte offsets aligned.
    let token = format!("@{}", bot_username).to_ascii_lowercase();
    let haystack = text.to_ascii_lowercase();

    let mut ranges = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(&token) {
        let start = from + pos;
        let end = start + token.len();
        if !text[end..].chars().next().is_some_and(is_username_char) {
            ranges.push((start, end));
        }
        from = end;
    }
    ranges
}

/// Remove the bot's own `@username` mention from message text.
pub fn strip_self_mention(text: &str, bot_username: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, mut end) in self_mention_ranges(text, bot_username) {
        // Swallow one trailing space so the removal does not leave a
        // double gap mid-sentence.
        let at_boundary = start == 0
            || text[..start]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace);
        if at_boundary && text[end..].starts_with(' ') {
            end += 1;
        }
        stripped.push_str(&text[cursor..start]);
        cursor = end;
    }
    stripped.push_str(&text[cursor..]);
    stripped.trim().to_string()
}

/// Whether the text mentions the bot's own username.
pub fn mentions_bot(text: &str, bot_username: &str) -> bool {
    !self_mention_ranges(text, bot_username).is_empty()
}

fn facts_block(facts: &MessageFacts) -> String {
    let mut block = format!(
        "- El ID de Telegram del usuario actual es: {}.",
        facts.caller_id
    );
    if let Some(ref username) = facts.caller_username {
        block.push_str(&format!("\n- Su username es @{}.", username));
    }
    if let Some(ref first_name) = facts.caller_first_name {
        block.push_str(&format!("\n- Su nombre es {}.", first_name));
    }
    if let Some(ref reply) = facts.replied_to {
        block.push_str(&format!(
            "\n- El usuario al que se está respondiendo es: {} (ID: {}).",
            reply.first_name, reply.telegram_id
        ));
    }
    for mention in &facts.mentions {
        block.push_str(&format!(
            "\n- Se menciona a @{} (ID: no disponible).",
            mention.username
        ));
    }
    block
}

/// Compose the full prompt: system directive, chronological history, then
/// the current (already mention-stripped) text as the last user turn.
///
/// `history` comes from the store most-recent-first and is reversed here.
pub fn build_prompt(
    facts: &MessageFacts,
    history: &[ConversationTurn],
    current_text: &str,
    dark_humor: bool,
) -> Vec<PromptTurn> {
    let system = format!(
        "{}\n{}\n{}",
        PERSONA,
        tone_directive(dark_humor),
        facts_block(facts)
    );

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(PromptTurn::new("system", system));
    for turn in history.iter().rev() {
        turns.push(PromptTurn::new(&turn.role, turn.content.clone()));
    }
    turns.push(PromptTurn::new("user", current_text));
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str, timestamp: i64) -> ConversationTurn {
        ConversationTurn {
            role: role.to_string(),
            content: content.to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_strip_self_mention() {
        assert_eq!(
            strip_self_mention("@KennerBot cómo estás", "KennerBot"),
            "cómo estás"
        );
        assert_eq!(
            strip_self_mention("oye @KennerBot dime algo", "KennerBot"),
            "oye dime algo"
        );
        assert_eq!(strip_self_mention("sin mención", "KennerBot"), "sin mención");
    }

    #[test]
    fn test_strip_self_mention_ignores_case() {
        // The strip accepts every casing the trigger accepts.
        assert_eq!(
            strip_self_mention("@kennerbot qué más", "KennerBot"),
            "qué más"
        );
        assert_eq!(
            strip_self_mention("oye @KENNERBOT dime algo", "KennerBot"),
            "oye dime algo"
        );
    }

    #[test]
    fn test_mentions_bot_case_insensitive() {
        assert!(mentions_bot("hola @KennerBot", "KennerBot"));
        assert!(mentions_bot("hola @kennerbot", "KennerBot"));
        assert!(!mentions_bot("hola @OtroBot", "KennerBot"));
        assert!(!mentions_bot("hola pana", "KennerBot"));
    }

    #[test]
    fn test_longer_username_sharing_prefix_is_not_a_self_mention() {
        assert!(!mentions_bot("hola @KennerBotFan", "KennerBot"));
        assert_eq!(
            strip_self_mention("hola @KennerBotFan", "KennerBot"),
            "hola @KennerBotFan"
        );
        // A real mention next to the lookalike still counts.
        assert!(mentions_bot("@KennerBotFan y @KennerBot", "KennerBot"));
    }

    #[test]
    fn test_prompt_shape() {
        let facts = MessageFacts {
            caller_id: 111,
            caller_first_name: Some("Ana".to_string()),
            ..Default::default()
        };
        let history = vec![
            turn("assistant", "epale", 2), // most recent first
            turn("user", "hola", 1),
        ];

        let prompt = build_prompt(&facts, &history, "qué más", false);
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[0].role, "system");
        // History is chronological in the prompt.
        assert_eq!(prompt[1].content, "hola");
        assert_eq!(prompt[2].content, "epale");
        assert_eq!(prompt[3], PromptTurn::new("user", "qué más"));
    }

    #[test]
    fn test_system_directive_carries_facts() {
        let facts = MessageFacts {
            caller_id: 111,
            caller_username: Some("ana".to_string()),
            replied_to: Some(RepliedTo {
                telegram_id: 222,
                first_name: "Luis".to_string(),
            }),
            mentions: vec![Mention {
                username: "pedro".to_string(),
            }],
            ..Default::default()
        };

        let prompt = build_prompt(&facts, &[], "hola", false);
        let system = &prompt[0].content;
        assert!(system.contains("111"));
        assert!(system.contains("@ana"));
        assert!(system.contains("Luis (ID: 222)"));
        // Mentioned users' ids are unresolvable, never fabricated.
        assert!(system.contains("@pedro (ID: no disponible)"));
    }

    #[test]
    fn test_tone_follows_dark_humor_flag() {
        let facts = MessageFacts::default();
        let dark = build_prompt(&facts, &[], "hola", true);
        let plain = build_prompt(&facts, &[], "hola", false);

        assert!(dark[0].content.contains("humor muy ácido y negro"));
        assert!(!plain[0].content.contains("humor muy ácido y negro"));
        assert!(plain[0].content.contains("sin humor negro"));
    }

    #[test]
    fn test_empty_history_prompt() {
        let prompt = build_prompt(&MessageFacts::default(), &[], "hola", false);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[1].role, "user");
    }
}
