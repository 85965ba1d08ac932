//! Liveness Probe
//!
//! Application-level ping/pong monitoring for the feed connection. The
//! client drives the probe from its interval tick: the probe decides when
//! to send a ping (with a fresh correlation id) and when an unanswered
//! ping means the connection is dead.
//!
//! Any inbound frame counts as proof of life, so an active stream is never
//! pinged into a false timeout.

use std::time::Duration;

use tokio::time::Instant;

/// Configuration for liveness probing.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// Interval between probe ticks.
    pub ping_interval: Duration,
    /// How long an unanswered ping may stay outstanding before the
    /// connection is considered dead.
    pub pong_timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(60),
        }
    }
}

impl LivenessConfig {
    /// Create configuration from `ConnectionSettings`.
    #[must_use]
    pub const fn from_connection_settings(
        settings: &crate::infrastructure::config::ConnectionSettings,
    ) -> Self {
        Self {
            ping_interval: settings.ping_interval,
            pong_timeout: settings.pong_timeout,
        }
    }
}

/// What the client should do on a probe tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeAction {
    /// Send a ping carrying this correlation id.
    Ping(u64),
    /// The outstanding ping expired; treat the connection as dead.
    Expired {
        /// Correlation id of the unanswered ping.
        cid: u64,
    },
    /// A ping is outstanding and still within its timeout.
    Wait,
}

#[derive(Debug)]
struct Outstanding {
    cid: u64,
    sent_at: Instant,
}

/// Ping/pong probe state for one connection.
#[derive(Debug)]
pub struct LivenessProbe {
    config: LivenessConfig,
    next_cid: u64,
    outstanding: Option<Outstanding>,
}

impl LivenessProbe {
    /// Create a probe with the given configuration.
    #[must_use]
    pub const fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            next_cid: 1,
            outstanding: None,
        }
    }

    /// Interval at which the client should tick the probe.
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        self.config.ping_interval
    }

    /// Forget probe state for a new connection epoch.
    ///
    /// Correlation ids keep incrementing across epochs so a stale pong
    /// from a previous connection never matches.
    pub fn reset(&mut self) {
        self.outstanding = None;
    }

    /// Record inbound traffic; an active stream is proof of life.
    pub fn on_activity(&mut self) {
        self.outstanding = None;
    }

    /// Record a pong response.
    ///
    /// Returns `true` when the correlation id matched the outstanding ping.
    pub fn on_pong(&mut self, cid: u64) -> bool {
        match &self.outstanding {
            Some(outstanding) if outstanding.cid == cid => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    /// Advance the probe on an interval tick.
    pub fn on_tick(&mut self) -> ProbeAction {
        if let Some(outstanding) = &self.outstanding {
            if outstanding.sent_at.elapsed() >= self.config.pong_timeout {
                return ProbeAction::Expired {
                    cid: outstanding.cid,
                };
            }
            return ProbeAction::Wait;
        }

        let cid = self.next_cid;
        self.next_cid += 1;
        self.outstanding = Some(Outstanding {
            cid,
            sent_at: Instant::now(),
        });
        ProbeAction::Ping(cid)
    }
}
