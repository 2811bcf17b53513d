//! Shared utilities: data-dir paths and listener panic isolation.

pub mod panic;
pub mod paths;

pub use paths::{config_path, data_dir, init_data_dir, log_file_path, logs_dir, store_snapshot_path};
