use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Longest interval a pacer will wait; slower rates are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

fn interval_for(period_secs: f64, rate: f64) -> Duration {
    Duration::try_from_secs_f64(period_secs / rate).map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL))
}

/// Open-loop pacer: at most one emission per interval.
pub struct RateController {
    interval: Duration,
    last_send: Option<Instant>,
}

impl RateController {
    /// Pace at `per_second` events per second, never slower than `MAX_INTERVAL`.
    pub fn per_second(per_second: f64) -> Self {
        Self::with_interval(interval_for(1.0, per_second))
    }

    /// Pace at `per_minute` events per minute. Non-positive rates fall back to one per second.
    pub fn per_minute(per_minute: f64) -> Self {
        if per_minute > 0.0 {
            Self::with_interval(interval_for(60.0, per_minute))
        } else {
            Self::with_interval(Duration::from_secs(1))
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            last_send: None,
        }
    }

    /// Wait until it's time to send the next message. The first call returns immediately.
    pub async fn wait_for_next(&mut self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last_send = Some(Instant::now());
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_minute_interval() {
        assert_eq!(RateController::per_minute(120.0).interval(), Duration::from_millis(500));
        assert_eq!(RateController::per_minute(0.0).interval(), Duration::from_secs(1));
        assert_eq!(RateController::per_minute(-5.0).interval(), Duration::from_secs(1));
    }

    #[test]
    fn tiny_rates_clamp_to_max_interval() {
        assert_eq!(RateController::per_second(1e-30).interval(), MAX_INTERVAL);
        assert_eq!(RateController::per_minute(1e-300).interval(), MAX_INTERVAL);
        assert_eq!(RateController::per_second(0.001).interval(), Duration::from_secs(1000));
        assert_eq!(RateController::per_second(f64::NAN).interval(), MAX_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_emissions_by_interval() {
        let mut rc = RateController::per_second(4.0);
        let start = Instant::now();
        for _ in 0..5 {
            rc.wait_for_next().await;
        }
        // first emission is immediate, four waits follow
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1100));
    }
}
