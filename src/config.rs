//! Tunables that the original hard-codes as literals scattered through
//! `pan/server.go` (5s session timeout) and `pan/client.go` (100ms
//! keep-alive interval, 100ms retry backoff). Collected here with
//! `Default` impls matching those constants exactly.

use std::time::Duration;

/// Server-side tunables.
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// How long a session may go without a refreshing op before the
    /// reaper treats it as expired. Matches `newSessionTimeout`'s 5s.
    pub session_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            session_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn session_timeout_micros(&self) -> i64 {
        self.session_timeout.as_micros() as i64
    }
}

/// Client-side tunables.
#[derive(Debug, Clone, Copy)]
pub struct ClientConfig {
    /// Interval between `KeepAlive` calls. Matches the original's 100ms.
    pub keep_alive_interval: Duration,
    /// Backoff slept between leader-failover retries. Matches the
    /// original's `time.Sleep(100 * time.Millisecond)` in every retry loop.
    pub retry_backoff: Duration,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            keep_alive_interval: Duration::from_millis(100),
            retry_backoff: Duration::from_millis(100),
        }
    }
}
