use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Produces the tick events that drive the trade loop.
#[async_trait]
pub trait TickSource: Send {
    /// Wait for the next tick. `None` means no more ticks will come.
    async fn next_tick(&mut self) -> Option<Instant>;
}

/// Fixed-period ticks. The first tick fires immediately; a tick that runs
/// long pushes the following ones back instead of bunching them up.
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> Option<Instant> {
        Some(self.interval.tick().await)
    }
}

/// Ticks pushed in by hand, one per message. Ends when every sender is dropped.
pub struct ChannelTicks {
    rx: mpsc::Receiver<()>,
}

impl ChannelTicks {
    pub fn new(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl TickSource for ChannelTicks {
    async fn next_tick(&mut self) -> Option<Instant> {
        self.rx.recv().await.map(|()| Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_fire_immediately_then_every_period() {
        let start = Instant::now();
        let mut ticks = IntervalTicks::new(Duration::from_secs(10));

        let first = ticks.next_tick().await.unwrap();
        assert!(first - start < Duration::from_millis(1));

        let second = ticks.next_tick().await.unwrap();
        assert_eq!(second - first, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn channel_ticks_end_when_sender_dropped() {
        let (tx, mut ticks) = ChannelTicks::new(2);
        tx.send(()).await.unwrap();
        drop(tx);
        assert!(ticks.next_tick().await.is_some());
        assert!(ticks.next_tick().await.is_none());
    }
}
