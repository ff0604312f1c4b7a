//! Session configuration.

use murmur_core::DEFAULT_RETENTION;

/// Display name given to groups joined without one.
pub const DEFAULT_GROUP_NAME: &str = "Group";

/// Chat session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Run one history query per topic when it is first subscribed, and
    /// deliver the results through the inbound path.
    pub store_messages: bool,
    /// Records kept per conversation. Older ones are evicted.
    pub retention: usize,
    /// Create unknown conversations named by broadcast records instead of
    /// discarding those records.
    pub auto_join_on_broadcast: bool,
    /// Display name for groups joined without an explicit name.
    pub group_display_name: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store_messages: true,
            retention: DEFAULT_RETENTION,
            auto_join_on_broadcast: true,
            group_display_name: DEFAULT_GROUP_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChatConfig::default();
        assert!(config.store_messages);
        assert!(config.auto_join_on_broadcast);
        assert_eq!(config.retention, 100);
        assert_eq!(config.group_display_name, "Group");
    }
}
