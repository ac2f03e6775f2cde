/// Default address of the remote design service
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3845";

/// Path of the SSE endpoint on the remote service
pub const DEFAULT_SSE_PATH: &str = "/sse";

/// Per-call timeout covering negotiation, dispatch and correlation (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// TCP connect timeout (milliseconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Total attempts per call, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay (milliseconds); doubles per attempt
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Backoff ceiling (milliseconds)
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;

/// Lifetime of cached call results (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Overall extraction budget (milliseconds)
pub const DEFAULT_MAX_WAIT_MS: u64 = 30_000;

/// Smallest accepted `max_wait_time` (milliseconds)
pub const MIN_MAX_WAIT_MS: u64 = 5_000;

/// Largest accepted `max_wait_time` (milliseconds)
pub const MAX_MAX_WAIT_MS: u64 = 60_000;
