use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BotCommand {
    Start,
    Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelegramCommandSpec {
    pub command: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommandDef {
    command: BotCommand,
    patterns: &'static [&'static str],
    /// Listed in the Telegram command menu.
    advertised: bool,
    telegram_spec: TelegramCommandSpec,
}

const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        command: BotCommand::Start,
        patterns: &["/start"],
        advertised: false,
        telegram_spec: TelegramCommandSpec {
            command: "start",
            description: "Start the bot",
        },
    },
    CommandDef {
        command: BotCommand::Menu,
        patterns: &["/menu"],
        advertised: true,
        telegram_spec: TelegramCommandSpec {
            command: "menu",
            description: "Show the main menu",
        },
    },
];

/// Commands shown in the Telegram command menu.
pub(crate) fn telegram_command_specs() -> Vec<TelegramCommandSpec> {
    COMMAND_DEFS
        .iter()
        .filter(|def| def.advertised)
        .map(|def| def.telegram_spec)
        .collect()
}

pub(crate) fn parse_command(text: &str) -> Option<BotCommand> {
    let trimmed = text.trim();

    COMMAND_DEFS.iter().find_map(|def| {
        def.patterns
            .iter()
            .any(|pattern| command_matches(trimmed, pattern))
            .then_some(def.command)
    })
}

/// Whether `text` sends the user back to the start screen.
pub(crate) fn is_restart_command(text: &str) -> bool {
    matches!(
        parse_command(text),
        Some(BotCommand::Start | BotCommand::Menu)
    )
}

fn command_matches(trimmed_text: &str, command: &str) -> bool {
    if trimmed_text == command {
        return true;
    }

    // `/start <payload>` comes from deep links; the payload is ignored.
    trimmed_text.strip_prefix(command).is_some_and(|stripped| {
        stripped.starts_with('@') || (command == "/start" && stripped.starts_with(' '))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{
        BotCommand, command_matches, is_restart_command, parse_command, telegram_command_specs,
    };

    #[test]
    fn parse_start_and_menu_commands() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command(" /start@shop_bot "), Some(BotCommand::Start));
        assert_eq!(parse_command("/start ref42"), Some(BotCommand::Start));
        assert_eq!(parse_command("/menu"), Some(BotCommand::Menu));
        assert_eq!(parse_command("/menu@shop_bot"), Some(BotCommand::Menu));
    }

    #[test]
    fn rejects_non_commands() {
        assert_eq!(parse_command("milk"), None);
        assert_eq!(parse_command("/menu please"), None);
        assert_eq!(parse_command("/starter"), None);
        assert!(!is_restart_command("start"));
    }

    #[test]
    fn both_commands_restart() {
        assert!(is_restart_command("/start"));
        assert!(is_restart_command("/menu"));
    }

    #[test]
    fn command_matcher_accepts_bot_mentions_only() {
        assert!(command_matches("/menu", "/menu"));
        assert!(command_matches("/menu@shop_bot", "/menu"));
        assert!(!command_matches("/menu anything", "/menu"));
    }

    #[test]
    fn telegram_command_specs_are_unique_and_non_empty() {
        let specs = telegram_command_specs();
        assert!(!specs.is_empty());

        let mut names = HashSet::new();
        for spec in specs {
            assert!(!spec.command.trim().is_empty());
            assert!(!spec.description.trim().is_empty());
            assert!(names.insert(spec.command));
        }
    }
}
