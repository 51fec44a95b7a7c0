//! Historical (batch) and live (paced) event generation.

use crate::factory::EventFactory;
use crate::model::PlayEvent;
use crate::rate::RateController;
use chrono::{DateTime, TimeDelta, Utc};
use futures::Stream;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// `volume` events spread linearly over `[start, end)`, in timestamp order.
///
/// Event `i` is stamped `start + span * i / volume`; with a zero span every
/// event lands on `start`.
pub fn generate_historical(
    factory: &EventFactory,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    volume: usize,
) -> Vec<PlayEvent> {
    let span = end - start;
    let span_us: i128 = span
        .num_microseconds()
        .map(i128::from)
        .unwrap_or_else(|| i128::from(span.num_milliseconds()) * 1_000);
    let mut rng = rand::rng();
    (0..volume)
        .map(|i| {
            let offset_us = span_us * i as i128 / volume as i128;
            let played_at = start + TimeDelta::microseconds(offset_us as i64);
            factory.create_event_with(&mut rng, Some(played_at))
        })
        .collect()
}

/// Paced, open-ended event source. Each event is stamped at emission time.
pub struct LiveGenerator {
    factory: EventFactory,
    rate: RateController,
    duration: Option<Duration>,
    started: Option<Instant>,
    cancel: CancellationToken,
    done: bool,
}

/// Live generator at `rate_per_minute` (non-positive falls back to one per
/// second) that ends after `duration_seconds`, or never when that is zero,
/// unless `cancel` fires first.
pub fn generate_live(
    factory: EventFactory,
    rate_per_minute: f64,
    duration_seconds: u64,
    cancel: CancellationToken,
) -> LiveGenerator {
    LiveGenerator {
        factory,
        rate: RateController::per_minute(rate_per_minute),
        duration: (duration_seconds > 0).then(|| Duration::from_secs(duration_seconds)),
        started: None,
        cancel,
        done: false,
    }
}

impl LiveGenerator {
    pub fn interval(&self) -> Duration {
        self.rate.interval()
    }

    /// Next event, sleeping out the pacing interval first. `None` once the
    /// duration has elapsed or the token is cancelled.
    pub async fn next(&mut self) -> Option<PlayEvent> {
        if self.done {
            return None;
        }
        let started = *self.started.get_or_insert_with(Instant::now);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.done = true;
                return None;
            }
            _ = self.rate.wait_for_next() => {}
        }
        if let Some(limit) = self.duration {
            if started.elapsed() >= limit {
                self.done = true;
                return None;
            }
        }
        Some(self.factory.create_event(Some(Utc::now())))
    }

    pub fn into_stream(self) -> impl Stream<Item = PlayEvent> {
        futures::stream::unfold(self, |mut generator| async move {
            generator.next().await.map(|event| (event, generator))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::tests::reference_data;
    use chrono::TimeZone;
    use futures::StreamExt;
    use std::sync::Arc;

    fn factory() -> EventFactory {
        EventFactory::new(Arc::new(reference_data(3, 200_000))).unwrap()
    }

    fn hour() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap(),
        )
    }

    #[test]
    fn historical_fills_linearly() {
        let (start, end) = hour();
        let events = generate_historical(&factory(), start, end, 4);
        let stamps: Vec<_> = events.iter().map(|e| e.played_at).collect();
        assert_eq!(
            stamps,
            vec![
                start,
                start + TimeDelta::minutes(15),
                start + TimeDelta::minutes(30),
                start + TimeDelta::minutes(45),
            ]
        );
    }

    #[test]
    fn historical_volume_and_order() {
        let (start, end) = hour();
        for volume in [0usize, 1, 7, 1000] {
            let events = generate_historical(&factory(), start, end, volume);
            assert_eq!(events.len(), volume);
            assert!(events.windows(2).all(|w| w[0].played_at <= w[1].played_at));
            assert!(events.iter().all(|e| e.played_at >= start && e.played_at < end));
            if let Some(first) = events.first() {
                assert_eq!(first.played_at, start);
            }
        }
    }

    #[test]
    fn zero_span_collapses_to_start() {
        let (start, _) = hour();
        let events = generate_historical(&factory(), start, start, 3);
        assert!(events.iter().all(|e| e.played_at == start));
    }

    #[tokio::test(start_paused = true)]
    async fn live_without_duration_keeps_producing() {
        let live = generate_live(factory(), 6000.0, 0, CancellationToken::new());
        let events: Vec<_> = live.into_stream().take(25).collect().await;
        assert_eq!(events.len(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn live_stops_at_duration() {
        let begin = Instant::now();
        let mut live = generate_live(factory(), 120.0, 3, CancellationToken::new());
        assert_eq!(live.interval(), Duration::from_millis(500));
        let mut emitted_at = Vec::new();
        while live.next().await.is_some() {
            emitted_at.push(begin.elapsed());
        }
        assert_eq!(emitted_at.len(), 6);
        assert!(emitted_at.iter().all(|t| *t < Duration::from_secs(3)));
        assert!(live.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn live_honours_cancellation_mid_sleep() {
        let cancel = CancellationToken::new();
        let mut live = generate_live(factory(), 1.0, 0, cancel.clone());
        assert!(live.next().await.is_some());
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });
        let begin = Instant::now();
        assert!(live.next().await.is_none());
        assert!(begin.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn non_positive_rate_defaults_to_one_second() {
        let live = generate_live(factory(), 0.0, 0, CancellationToken::new());
        assert_eq!(live.interval(), Duration::from_secs(1));
    }
}
