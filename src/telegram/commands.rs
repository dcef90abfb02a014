//! Private Message Commands
//!
//! Text starting with `/` is parsed into a [`Command`]. Anything else is
//! wizard input and never reaches this parser.
//!
//! Commands taking an optional channel fall back to the actor's single
//! accessible channel when it is omitted.

use crate::telegram::traits::{ChannelId, UserId};

/// PM command types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start registration, optionally for one channel
    Start { channel: Option<ChannelId> },

    /// Abort the current wizard
    Cancel,

    /// Show help
    Help,

    /// Own memberships and time left
    Status,

    /// Channels the actor administers
    Channels,

    /// Channel information
    Info { channel: Option<ChannelId> },

    /// Members and time left
    List { channel: Option<ChannelId> },

    /// Pending registrations
    Pending { channel: Option<ChannelId> },

    /// Approve with a human-readable duration
    Approve {
        channel: ChannelId,
        user: UserId,
        duration: String,
    },

    /// Reject a pending registration
    Reject { channel: ChannelId, user: UserId },

    /// Revoke a member
    Remove {
        channel: Option<ChannelId>,
        user: UserId,
    },

    /// Remove every member except global admins
    Purge { channel: Option<ChannelId> },

    /// Provision a new channel (global admins)
    NewChannel,

    /// Edit a channel's name, link or id
    Settings { channel: Option<ChannelId> },

    /// Add a channel admin
    AddAdmin { channel: Option<ChannelId> },

    /// Known command with unusable arguments
    Usage(&'static str),

    /// Unknown command
    Unknown(String),
}

impl Command {
    /// Whether the command requires admin rights
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::Channels
                | Command::Info { .. }
                | Command::List { .. }
                | Command::Pending { .. }
                | Command::Approve { .. }
                | Command::Reject { .. }
                | Command::Remove { .. }
                | Command::Purge { .. }
                | Command::NewChannel
                | Command::Settings { .. }
                | Command::AddAdmin { .. }
        )
    }
}

const USAGE_APPROVE: &str = "/approve <channel> <user> <duration>  (e.g. 36h, 7d)";
const USAGE_REJECT: &str = "/reject <channel> <user>";
const USAGE_REMOVE: &str = "/remove [channel] <user>";

fn channel_arg(arg: &str) -> Option<ChannelId> {
    arg.parse::<i64>().ok().map(ChannelId)
}

fn user_arg(arg: &str) -> Option<UserId> {
    arg.parse::<i64>().ok().filter(|id| *id > 0).map(UserId)
}

/// Parse command text
///
/// `/cmd@botname` forms are accepted. An optional channel argument that
/// does not parse as an id yields [`Command::Usage`].
pub fn parse_command(text: &str) -> Command {
    let text = text.trim();

    if !text.starts_with('/') {
        return Command::Unknown(text.to_string());
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    let Some(head) = parts.first() else {
        return Command::Unknown(text.to_string());
    };
    let name = head.split('@').next().unwrap_or(head);
    let args = &parts[1..];

    // Optional single channel argument
    let optional_channel = |usage: &'static str| -> Result<Option<ChannelId>, Command> {
        match args {
            [] => Ok(None),
            [arg] => channel_arg(arg).map(Some).ok_or(Command::Usage(usage)),
            _ => Err(Command::Usage(usage)),
        }
    };

    let parsed = match name {
        "/start" => match args {
            [] => Ok(Command::Start { channel: None }),
            // Deep-link payloads that are not channel ids start plain registration
            [arg] => Ok(Command::Start {
                channel: channel_arg(arg),
            }),
            _ => Ok(Command::Start { channel: None }),
        },
        "/cancel" => Ok(Command::Cancel),
        "/help" => Ok(Command::Help),
        "/status" => Ok(Command::Status),
        "/channels" => Ok(Command::Channels),
        "/info" => optional_channel("/info [channel]").map(|channel| Command::Info { channel }),
        "/list" => optional_channel("/list [channel]").map(|channel| Command::List { channel }),
        "/pending" => {
            optional_channel("/pending [channel]").map(|channel| Command::Pending { channel })
        }
        "/purge" => optional_channel("/purge [channel]").map(|channel| Command::Purge { channel }),
        "/settings" => {
            optional_channel("/settings [channel]").map(|channel| Command::Settings { channel })
        }
        "/addadmin" => {
            optional_channel("/addadmin [channel]").map(|channel| Command::AddAdmin { channel })
        }
        "/newchannel" => Ok(Command::NewChannel),
        "/approve" => match args {
            [channel, user, duration @ ..] if !duration.is_empty() => {
                match (channel_arg(channel), user_arg(user)) {
                    (Some(channel), Some(user)) => Ok(Command::Approve {
                        channel,
                        user,
                        duration: duration.join(" "),
                    }),
                    _ => Err(Command::Usage(USAGE_APPROVE)),
                }
            }
            _ => Err(Command::Usage(USAGE_APPROVE)),
        },
        "/reject" => match args {
            [channel, user] => match (channel_arg(channel), user_arg(user)) {
                (Some(channel), Some(user)) => Ok(Command::Reject { channel, user }),
                _ => Err(Command::Usage(USAGE_REJECT)),
            },
            _ => Err(Command::Usage(USAGE_REJECT)),
        },
        "/remove" => match args {
            [user] => user_arg(user)
                .map(|user| Command::Remove {
                    channel: None,
                    user,
                })
                .ok_or(Command::Usage(USAGE_REMOVE)),
            [channel, user] => match (channel_arg(channel), user_arg(user)) {
                (Some(channel), Some(user)) => Ok(Command::Remove {
                    channel: Some(channel),
                    user,
                }),
                _ => Err(Command::Usage(USAGE_REMOVE)),
            },
            _ => Err(Command::Usage(USAGE_REMOVE)),
        },
        _ => Ok(Command::Unknown(text.to_string())),
    };

    parsed.unwrap_or_else(|usage| usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start() {
        assert_eq!(parse_command("/start"), Command::Start { channel: None });
        assert_eq!(
            parse_command("/start -1001234"),
            Command::Start {
                channel: Some(ChannelId(-1001234))
            }
        );
        assert_eq!(
            parse_command("/start campaign"),
            Command::Start { channel: None }
        );
    }

    #[test]
    fn test_parse_bot_suffix() {
        assert_eq!(parse_command("/help@timegate_bot"), Command::Help);
    }

    #[test]
    fn test_parse_optional_channel() {
        assert_eq!(parse_command("/list"), Command::List { channel: None });
        assert_eq!(
            parse_command("/list -1001"),
            Command::List {
                channel: Some(ChannelId(-1001))
            }
        );
        assert!(matches!(parse_command("/list vip"), Command::Usage(_)));
        assert!(matches!(parse_command("/purge -1 -2"), Command::Usage(_)));
    }

    #[test]
    fn test_parse_approve() {
        assert_eq!(
            parse_command("/approve -1001 42 1d 12h"),
            Command::Approve {
                channel: ChannelId(-1001),
                user: UserId(42),
                duration: "1d 12h".to_string(),
            }
        );
        assert!(matches!(parse_command("/approve -1001 42"), Command::Usage(_)));
        assert!(matches!(parse_command("/approve -1001 bob 24"), Command::Usage(_)));
    }

    #[test]
    fn test_parse_remove_forms() {
        assert_eq!(
            parse_command("/remove 42"),
            Command::Remove {
                channel: None,
                user: UserId(42)
            }
        );
        assert_eq!(
            parse_command("/remove -1001 42"),
            Command::Remove {
                channel: Some(ChannelId(-1001)),
                user: UserId(42)
            }
        );
        assert!(matches!(parse_command("/remove"), Command::Usage(_)));
        assert!(matches!(parse_command("/remove -5"), Command::Usage(_)));
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse_command("/frobnicate"),
            Command::Unknown("/frobnicate".to_string())
        );
        assert_eq!(parse_command("hello"), Command::Unknown("hello".to_string()));
    }

    #[test]
    fn test_admin_only() {
        assert!(parse_command("/purge").is_admin_only());
        assert!(!parse_command("/status").is_admin_only());
        assert!(!parse_command("/start").is_admin_only());
    }
}
