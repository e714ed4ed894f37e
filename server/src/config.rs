use std::time::Duration;

/// Runtime settings shared by the gateway and every room it spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Fixed simulation step. Every room advances by exactly this much per tick.
    pub tick_interval: Duration,
    /// How long a room with nobody connected survives before teardown.
    pub grace_period: Duration,
    /// Last level of a run. Winning it completes the game.
    pub max_level: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(60),
            max_level: 5,
        }
    }
}

impl ServerConfig {
    pub fn tick_ms(&self) -> u64 {
        (self.tick_interval.as_millis() as u64).max(1)
    }

    pub fn grace_ms(&self) -> u64 {
        self.grace_period.as_millis() as u64
    }
}
