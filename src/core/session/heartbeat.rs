use crate::core::communication::message::Envelope;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Periodic keepalive while the session is open.
///
/// Only exists while the session is `Open`; dropping it stops the ticks.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Interval,
}

impl Heartbeat {
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(30_000);

    /// First tick fires one full period after start
    pub fn start(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next tick and build the frame to send
    pub async fn tick(&mut self) -> Envelope {
        self.interval.tick().await;
        Envelope::ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::FrameKind;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_full_period() {
        let started = Instant::now();
        let mut heartbeat = Heartbeat::start(Heartbeat::DEFAULT_PERIOD);

        let frame = heartbeat.tick().await;
        assert_eq!(frame.kind, FrameKind::Ping);
        assert_eq!(started.elapsed(), Duration::from_millis(30_000));

        heartbeat.tick().await;
        assert_eq!(started.elapsed(), Duration::from_millis(60_000));
    }
}
