mod settings;

pub use settings::{
    Config, ConfigError, DEFAULT_EVENT_LOG_CAPACITY, DEFAULT_HOOK_POLL_INTERVAL_MS,
    DEFAULT_HOOK_POLL_MAX_ATTEMPTS,
};
