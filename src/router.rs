//! Command router
//!
//! Declarative table mapping command names to argument shapes and command
//! values. Parsing is decoupled from authorization and execution: the router
//! only decides *which* command was typed, the dispatcher decides whether
//! the caller may run it.

/// A recognized, fully parsed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    /// Target is the *internal* user id, as listed by `/users`.
    Promote(i64),
    Demote(i64),
    Users,
    AdminMenu,
    Restart,
}

/// Outcome of matching inbound text against the command table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Recognized name, unusable argument. Carries the usage line.
    BadArgs(&'static str),
    /// Unknown command token, or a command addressed to another bot.
    /// Ignored without a reply.
    Unrecognized,
    /// Text does not start with a command token at all.
    NotACommand,
}

/// Argument shape a command expects.
#[derive(Debug, Clone, Copy)]
enum ArgSpec {
    None,
    /// One integer internal user id.
    UserId,
}

/// How to build the command value once arguments parse.
enum Ctor {
    Plain(Command),
    WithUserId(fn(i64) -> Command),
}

struct CommandSpec {
    name: &'static str,
    args: ArgSpec,
    usage: &'static str,
    ctor: Ctor,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        args: ArgSpec::None,
        usage: "/start",
        ctor: Ctor::Plain(Command::Start),
    },
    CommandSpec {
        name: "promote",
        args: ArgSpec::UserId,
        usage: "/promote <id>",
        ctor: Ctor::WithUserId(Command::Promote),
    },
    CommandSpec {
        name: "demote",
        args: ArgSpec::UserId,
        usage: "/demote <id>",
        ctor: Ctor::WithUserId(Command::Demote),
    },
    CommandSpec {
        name: "users",
        args: ArgSpec::None,
        usage: "/users",
        ctor: Ctor::Plain(Command::Users),
    },
    CommandSpec {
        name: "admin",
        args: ArgSpec::None,
        usage: "/admin",
        ctor: Ctor::Plain(Command::AdminMenu),
    },
    CommandSpec {
        name: "restart",
        args: ArgSpec::None,
        usage: "/restart",
        ctor: Ctor::Plain(Command::Restart),
    },
];

/// Match `text` against the command table.
///
/// Group chats address commands as `/name@botname`; a suffix naming another
/// bot is not for us and parses as `Unrecognized`.
pub fn parse(text: &str, bot_username: &str) -> Parsed {
    let text = text.trim();
    let Some(rest) = text.strip_prefix('/') else {
        return Parsed::NotACommand;
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let token = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    let name = match token.split_once('@') {
        Some((name, addressee)) => {
            if !addressee.eq_ignore_ascii_case(bot_username) {
                return Parsed::Unrecognized;
            }
            name
        }
        None => token,
    };

    let Some(spec) = COMMANDS.iter().find(|s| s.name == name) else {
        return Parsed::Unrecognized;
    };

    match spec.args {
        ArgSpec::None => match &spec.ctor {
            Ctor::Plain(cmd) => Parsed::Command(*cmd),
            Ctor::WithUserId(_) => Parsed::Unrecognized,
        },
        ArgSpec::UserId => {
            let Some(id) = args.split_whitespace().next().and_then(|a| a.parse().ok()) else {
                return Parsed::BadArgs(spec.usage);
            };
            match &spec.ctor {
                Ctor::WithUserId(build) => Parsed::Command(build(id)),
                Ctor::Plain(cmd) => Parsed::Command(*cmd),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "KennerBot";

    #[test]
    fn test_plain_commands() {
        assert_eq!(parse("/start", BOT), Parsed::Command(Command::Start));
        assert_eq!(parse("/users", BOT), Parsed::Command(Command::Users));
        assert_eq!(parse("/admin", BOT), Parsed::Command(Command::AdminMenu));
        assert_eq!(parse("/restart", BOT), Parsed::Command(Command::Restart));
    }

    #[test]
    fn test_promote_demote_take_internal_id() {
        assert_eq!(parse("/promote 2", BOT), Parsed::Command(Command::Promote(2)));
        assert_eq!(parse("/demote 999", BOT), Parsed::Command(Command::Demote(999)));
    }

    #[test]
    fn test_missing_or_bad_argument_yields_usage() {
        assert_eq!(parse("/promote", BOT), Parsed::BadArgs("/promote <id>"));
        assert_eq!(parse("/promote pepe", BOT), Parsed::BadArgs("/promote <id>"));
        assert_eq!(parse("/demote   ", BOT), Parsed::BadArgs("/demote <id>"));
    }

    #[test]
    fn test_unknown_command_is_ignored() {
        assert_eq!(parse("/frobnicate", BOT), Parsed::Unrecognized);
        assert_eq!(parse("/startx", BOT), Parsed::Unrecognized);
    }

    #[test]
    fn test_addressed_commands() {
        assert_eq!(parse("/start@KennerBot", BOT), Parsed::Command(Command::Start));
        assert_eq!(parse("/start@kennerbot", BOT), Parsed::Command(Command::Start));
        assert_eq!(parse("/start@OtherBot", BOT), Parsed::Unrecognized);
    }

    #[test]
    fn test_extra_argument_on_plain_command_still_parses() {
        assert_eq!(parse("/start ahora", BOT), Parsed::Command(Command::Start));
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse("hola pana", BOT), Parsed::NotACommand);
        assert_eq!(parse("", BOT), Parsed::NotACommand);
    }
}
