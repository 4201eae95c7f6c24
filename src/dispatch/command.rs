//! Menu commands and their text forms.
//!
//! Every command has a reply-keyboard label and a slash alias. Parsing is an
//! exact match on the trimmed text, so free-text input such as a destination
//! handle is never mistaken for a command unless it is one verbatim.

/// A recognised menu command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Login,
    Logout,
    AddChat,
    RemoveChat,
    ListChats,
    SetMessage,
    StartAds,
    StopAds,
    Interval,
    Status,
    Cancel,
    Menu,
}

/// Reply keyboard layout, row by row.
pub const MENU_ROWS: &[&[Command]] = &[
    &[Command::Login, Command::Logout],
    &[Command::AddChat, Command::RemoveChat],
    &[Command::ListChats],
    &[Command::SetMessage],
    &[Command::StartAds, Command::StopAds],
    &[Command::Interval, Command::Status],
];

impl Command {
    pub const ALL: [Command; 13] = [
        Self::Start,
        Self::Login,
        Self::Logout,
        Self::AddChat,
        Self::RemoveChat,
        Self::ListChats,
        Self::SetMessage,
        Self::StartAds,
        Self::StopAds,
        Self::Interval,
        Self::Status,
        Self::Cancel,
        Self::Menu,
    ];

    /// Keyboard label, for commands that appear on the menu.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Login => Some("📱 Login"),
            Self::Logout => Some("🚪 Logout"),
            Self::AddChat => Some("➕ Add Chat"),
            Self::RemoveChat => Some("➖ Remove Chat"),
            Self::ListChats => Some("📋 List Chats"),
            Self::SetMessage => Some("📝 Set Message"),
            Self::StartAds => Some("▶ Start Ads"),
            Self::StopAds => Some("⏹ Stop Ads"),
            Self::Interval => Some("⏱ Interval"),
            Self::Status => Some("📊 Status"),
            Self::Start | Self::Cancel | Self::Menu => None,
        }
    }

    pub fn alias(&self) -> &'static str {
        match self {
            Self::Start => "/start",
            Self::Login => "/login",
            Self::Logout => "/logout",
            Self::AddChat => "/add",
            Self::RemoveChat => "/remove",
            Self::ListChats => "/list",
            Self::SetMessage => "/message",
            Self::StartAds => "/startads",
            Self::StopAds => "/stopads",
            Self::Interval => "/interval",
            Self::Status => "/status",
            Self::Cancel => "/cancel",
            Self::Menu => "/menu",
        }
    }

    /// Parse a command label or slash alias.
    ///
    /// Aliases are case-insensitive and may carry a `@botname` suffix as
    /// Telegram sends them in group chats.
    pub fn parse(text: &str) -> Option<Command> {
        let trimmed = text.trim();
        if let Some(cmd) = Self::ALL.iter().find(|c| c.label() == Some(trimmed)) {
            return Some(*cmd);
        }

        if !trimmed.starts_with('/') {
            return None;
        }
        let word = trimmed.split('@').next().unwrap_or(trimmed).to_lowercase();
        Self::ALL.iter().copied().find(|c| c.alias() == word)
    }
}

/// Labels of the reply keyboard, row by row.
pub fn menu_labels() -> Vec<Vec<String>> {
    MENU_ROWS
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|c| c.label())
                .map(str::to_string)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_to_their_command() {
        for cmd in Command::ALL {
            if let Some(label) = cmd.label() {
                assert_eq!(Command::parse(label), Some(cmd), "label {label}");
            }
        }
    }

    #[test]
    fn aliases_parse_to_their_command() {
        for cmd in Command::ALL {
            assert_eq!(Command::parse(cmd.alias()), Some(cmd));
        }
    }

    #[test]
    fn alias_with_bot_suffix_and_case() {
        assert_eq!(Command::parse("/Login@ad_bot"), Some(Command::Login));
        assert_eq!(Command::parse("  /STATUS "), Some(Command::Status));
    }

    #[test]
    fn free_text_is_not_a_command() {
        assert_eq!(Command::parse("@mychannel"), None);
        assert_eq!(Command::parse("Login"), None);
        assert_eq!(Command::parse("📱 Login please"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn menu_has_every_labelled_command_once() {
        let labels: Vec<String> = menu_labels().into_iter().flatten().collect();
        let labelled = Command::ALL.iter().filter(|c| c.label().is_some()).count();
        assert_eq!(labels.len(), labelled);
        assert_eq!(labels[0], "📱 Login");
        assert_eq!(menu_labels()[2], vec!["📋 List Chats".to_string()]);
    }
}
