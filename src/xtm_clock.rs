// Game clock: a ticker thread and a counting thread joined by a rendezvous channel
// Only the counting thread writes the elapsed seconds; readers see an atomic snapshot

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::xtm_error::ClockError;
use crate::xtm_game::SharedOutcome;

/// Default tick interval
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Messages handled by the counting thread, in arrival order
#[derive(Debug)]
enum ClockEvent {
    Tick,
    Reset(SyncSender<()>),   // Answered once the counter reads zero
    Settle(SyncSender<u64>), // Answered with the counter after earlier ticks
}

/// Running clock for the whole process
///
/// Each tick adds a second and calls `on_tick` with the new total, but only
/// while the shared outcome is still `Playing`. Once a game ends the counter
/// freezes until `reset` is called for the next game.
pub struct Clock {
    elapsed: Arc<AtomicU64>,
    control: Option<SyncSender<ClockEvent>>,
    stop: Option<Sender<()>>,
    generator: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl Clock {
    pub fn start_with_period<F>(
        period: Duration,
        outcome: SharedOutcome,
        on_tick: F,
    ) -> Result<Self, ClockError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (tick_tx, tick_rx) = mpsc::sync_channel(0);
        let (stop_tx, stop_rx) = mpsc::channel();
        let elapsed = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&elapsed);
        let consumer = thread::Builder::new()
            .name("xtm-clock".to_string())
            .spawn(move || count_ticks(tick_rx, counter, outcome, on_tick))
            .map_err(ClockError::Spawn)?;

        let ticker_tx = tick_tx.clone();
        let generator = match thread::Builder::new()
            .name("xtm-ticker".to_string())
            .spawn(move || generate_ticks(period, stop_rx, ticker_tx))
        {
            Ok(handle) => handle,
            Err(e) => {
                // Closing the last sender lets the counting thread return
                drop(tick_tx);
                let _ = consumer.join();
                return Err(ClockError::Spawn(e));
            }
        };

        info!(?period, "clock started");
        Ok(Clock {
            elapsed,
            control: Some(tick_tx),
            stop: Some(stop_tx),
            generator: Some(generator),
            consumer: Some(consumer),
        })
    }

    /// Seconds counted for the current game
    pub fn elapsed(&self) -> u64 {
        self.elapsed.load(Ordering::Acquire)
    }

    /// Start again from zero; `elapsed()` reads 0 once this returns
    ///
    /// Call it while the outcome is still over so no tick lands between the
    /// reset and the next game. Never call it while holding the render lock.
    pub fn reset(&self) {
        let Some(control) = &self.control else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        if control.send(ClockEvent::Reset(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Final count for a game that just ended
    ///
    /// Ticks already taken by the counting thread are applied first, and later
    /// ones see the finished outcome, so the value no longer moves.
    pub fn settled_elapsed(&self) -> u64 {
        if let Some(control) = &self.control {
            let (reply_tx, reply_rx) = mpsc::sync_channel(1);
            if control.send(ClockEvent::Settle(reply_tx)).is_ok() {
                if let Ok(seconds) = reply_rx.recv() {
                    return seconds;
                }
            }
        }
        self.elapsed()
    }

    /// Stop the ticker, then wait for both threads to exit
    pub fn shutdown(&mut self) -> Result<(), ClockError> {
        if self.generator.is_none() && self.consumer.is_none() {
            return Ok(());
        }
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let generator = self.generator.take().map(JoinHandle::join);
        // The ticker held the only other sender, so the counter now sees end of stream
        self.control.take();
        let consumer = self.consumer.take().map(JoinHandle::join);
        info!("clock stopped");
        match (generator, consumer) {
            (Some(Err(_)), _) | (_, Some(Err(_))) => Err(ClockError::Join),
            _ => Ok(()),
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Ticker thread body: one tick per period until told to stop
fn generate_ticks(period: Duration, stop: Receiver<()>, ticks: SyncSender<ClockEvent>) {
    let mut deadline = Instant::now() + period;
    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                if ticks.send(ClockEvent::Tick).is_err() {
                    break;
                }
                deadline += period;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("ticker finished");
}

/// Counting thread body: owns the seconds counter
fn count_ticks<F>(events: Receiver<ClockEvent>, elapsed: Arc<AtomicU64>, outcome: SharedOutcome, mut on_tick: F)
where
    F: FnMut(u64),
{
    let mut seconds = 0u64;
    for event in events {
        match event {
            ClockEvent::Tick if outcome.get().is_over() => {}
            ClockEvent::Tick => {
                seconds += 1;
                elapsed.store(seconds, Ordering::Release);
                on_tick(seconds);
            }
            ClockEvent::Reset(ack) => {
                seconds = 0;
                elapsed.store(seconds, Ordering::Release);
                let _ = ack.send(());
            }
            ClockEvent::Settle(reply) => {
                let _ = reply.send(seconds);
            }
        }
    }
    debug!(seconds, "clock counter finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtm_game::Outcome;

    const FAST: Duration = Duration::from_millis(10);
    const WAIT: Duration = Duration::from_secs(2);

    fn observed_clock(outcome: SharedOutcome) -> (Clock, Receiver<u64>) {
        let (tx, rx) = mpsc::channel();
        let clock = Clock::start_with_period(FAST, outcome, move |secs| {
            let _ = tx.send(secs);
        })
        .unwrap();
        (clock, rx)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn counts_one_per_tick_while_playing() {
        let (mut clock, rx) = observed_clock(SharedOutcome::new());
        let seen: Vec<u64> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(seen, [1, 2, 3]);
        assert!(clock.elapsed() >= 3);
        clock.shutdown().unwrap();
    }

    #[test]
    fn freezes_once_game_is_over() {
        let outcome = SharedOutcome::new();
        let (mut clock, rx) = observed_clock(outcome.clone());
        rx.recv_timeout(WAIT).unwrap();
        outcome.finish(Outcome::Won);
        thread::sleep(FAST * 3);
        while rx.try_recv().is_ok() {}
        let frozen = clock.elapsed();

        thread::sleep(FAST * 8);
        assert_eq!(clock.elapsed(), frozen);
        assert!(rx.try_recv().is_err());
        clock.shutdown().unwrap();
    }

    #[test]
    fn reset_returns_to_zero() {
        let outcome = SharedOutcome::new();
        let (mut clock, rx) = observed_clock(outcome.clone());
        while rx.recv_timeout(WAIT).unwrap() < 3 {}
        outcome.finish(Outcome::Lost);
        clock.reset();
        assert_eq!(clock.elapsed(), 0);
        thread::sleep(FAST * 4);
        assert_eq!(clock.elapsed(), 0);
        clock.shutdown().unwrap();
    }

    #[test]
    fn reset_is_visible_as_soon_as_it_returns() {
        let outcome = SharedOutcome::new();
        let (mut clock, rx) = observed_clock(outcome.clone());
        rx.recv_timeout(WAIT).unwrap();
        outcome.finish(Outcome::Won);
        for _ in 0..200 {
            clock.reset();
            assert_eq!(clock.elapsed(), 0);
        }
        clock.shutdown().unwrap();
    }

    #[test]
    fn settled_count_stays_final() {
        for _ in 0..20 {
            let outcome = SharedOutcome::new();
            let mut clock = Clock::start_with_period(Duration::from_millis(1), outcome.clone(), |_| {}).unwrap();
            assert!(wait_until(|| clock.elapsed() >= 2));
            outcome.finish(Outcome::Won);
            let settled = clock.settled_elapsed();
            thread::sleep(Duration::from_millis(5));
            assert_eq!(clock.elapsed(), settled);
            assert_eq!(clock.settled_elapsed(), settled);
            clock.shutdown().unwrap();
        }
    }

    #[test]
    fn settle_after_shutdown_reads_last_value() {
        let (mut clock, rx) = observed_clock(SharedOutcome::new());
        rx.recv_timeout(WAIT).unwrap();
        clock.shutdown().unwrap();
        assert_eq!(clock.settled_elapsed(), clock.elapsed());
        clock.reset();
    }

    #[test]
    fn shutdown_is_prompt_and_repeatable() {
        let (tx, _rx) = mpsc::channel();
        let mut clock = Clock::start_with_period(Duration::from_secs(3600), SharedOutcome::new(), move |s| {
            let _ = tx.send(s);
        })
        .unwrap();
        let started = Instant::now();
        clock.shutdown().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.elapsed(), 0);
        clock.shutdown().unwrap();
    }

    #[test]
    fn observer_ends_when_clock_drops() {
        let (clock, rx) = observed_clock(SharedOutcome::new());
        rx.recv_timeout(WAIT).unwrap();
        drop(clock);
        // The callback (and its sender) went away with the counting thread
        assert!(wait_until(|| matches!(rx.try_recv(), Err(mpsc::TryRecvError::Disconnected))));
    }
}
