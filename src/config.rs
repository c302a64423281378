//! Protocol-wide constants shared between the bridge server and client.

use std::time::Duration;

/// Maximum payload carried by a single PUT body or GET response (§ wire protocol).
pub const MAX_CHUNK: usize = 640 * 1024;

/// Upper bound on how long an idle GET may be held open by the server.
pub const IDLE_TIMEOUT_SECONDS: u64 = 60;

/// The server answers an idle GET this many seconds early, so its response
/// reliably lands before the client's read timeout fires.
pub const SERVER_POLL_MARGIN_SECONDS: u64 = 3;

/// The client's downlink read timeout is this many seconds later than the
/// server's poll deadline, so the server always answers first.
pub const CLIENT_READ_MARGIN_SECONDS: u64 = 3;

/// Floor on a single HTTP request's lifetime on the server, comfortably above
/// the idle poll window.
pub const SERVER_REQUEST_TIMEOUT_SECONDS: u64 = 600;

/// Backoff between a failed PUT/GET retry and the next attempt, so a
/// persistently unreachable bridge doesn't spin the pump hot.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Bound on how many times the Tunnel Opener retries the opening POST after
/// a transport/connect error, before giving up (§4.5).
pub const OPEN_RETRY_ATTEMPTS: u32 = 5;

/// How long the server's long-poll GET handler waits for destination
/// readability before giving up and returning 204.
pub fn server_poll_wait() -> Duration {
    Duration::from_secs(IDLE_TIMEOUT_SECONDS.saturating_sub(SERVER_POLL_MARGIN_SECONDS))
}

/// Per-request timeout used by the client's downlink (GET) HTTP client.
pub fn client_downlink_timeout() -> Duration {
    Duration::from_secs(IDLE_TIMEOUT_SECONDS + CLIENT_READ_MARGIN_SECONDS)
}

/// Per-request timeout used by the client's uplink (PUT/POST/DELETE) HTTP client.
pub fn client_uplink_timeout() -> Duration {
    Duration::from_secs(IDLE_TIMEOUT_SECONDS)
}
