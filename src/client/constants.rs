//! Constants for the client module (timeouts, circuit breaker).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fixed per-attempt request timeout (20 seconds). Applies to the send
/// phase of every request, independent of any pool wait.
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Circuit-breaker ban window after an observed timeout (30 seconds).
pub const BAN_WINDOW_SECS: u64 = 30;

/// Length of the random suffix used for temp file names.
pub const TEMP_NAME_LEN: usize = 16;
