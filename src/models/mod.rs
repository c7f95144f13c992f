pub mod channel;

pub use channel::{
    default_categories, default_channels, default_channels_by_category, group_by_category,
    now_millis, Channel, ChannelFilter, PlaylistStats, PlaylistTestResult, PlaylistUpdateResult,
    ALL_CATEGORIES, DEFAULT_CATEGORY, RADIO_CATEGORY,
};
