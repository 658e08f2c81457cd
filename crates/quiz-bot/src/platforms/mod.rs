//! Platform-specific transport adapters
//!
//! Each adapter owns its own long-poll loop, maps platform events to
//! `(user_id, text)`, and drives the shared conversation engine.

pub mod telegram;
pub mod vk;

pub use telegram::TelegramBot;
pub use vk::VkBot;

/// Seconds an adapter waits after a failed poll before trying again.
pub(crate) const POLL_RETRY_DELAY_SECS: u64 = 5;

/// Supported values of the `run --platform` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Telegram,
    Vk,
}

impl Platform {
    /// Parse a CLI platform value; `None` for anything unsupported.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "telegram" => Some(Self::Telegram),
            "vk" => Some(Self::Vk),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!(Platform::parse("telegram"), Some(Platform::Telegram));
        assert_eq!(Platform::parse("vk"), Some(Platform::Vk));
        assert_eq!(Platform::parse("icq"), None);
        assert_eq!(Platform::parse(""), None);
        // Values are case-sensitive, like the original CLI.
        assert_eq!(Platform::parse("Telegram"), None);
    }
}
