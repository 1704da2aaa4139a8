//! Default values for every config field.

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10_000;
pub const DEFAULT_DB_PATH: &str = "voxledger.db";

pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;
pub const DEFAULT_COMMAND_BUFFER: usize = 1_024;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub(crate) fn bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

pub(crate) fn port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

pub(crate) fn debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

pub(crate) fn tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

pub(crate) fn enabled() -> bool {
    true
}

pub(crate) fn broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

pub(crate) fn command_buffer() -> usize {
    DEFAULT_COMMAND_BUFFER
}

pub(crate) fn log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
