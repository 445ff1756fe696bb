//! Per-seat timers and the turn state machine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::events::GameEvent;
use super::types::Seat;

pub const DEFAULT_BUDGET_SECS: u64 = 5;
pub const MAX_BUDGET_SECS: u64 = 30;
pub const REACTION_BONUS_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    Idle,
    WaitMain,
    Selecting,
    WaitReactions,
    ApplyOperation,
    WinSettlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickerState {
    Idle,
    Running,
    Timeout,
    Stopped,
}

/// One seat's time bank. `Start` spawns a
/// cancellable context; on deadline it fires `onTimeout` via the shared
/// mailbox sender (a `Timeout{seat}` event), on cancellation it charges
/// elapsed time against `available` and fires `onStop`.
pub struct PlayerTicker {
    seat: Seat,
    available_ms: AtomicU64,
    running: AtomicBool,
    state: parking_lot::Mutex<TickerState>,
    cancel: parking_lot::Mutex<Option<CancellationToken>>,
    mailbox: mpsc::Sender<GameEvent>,
}

impl PlayerTicker {
    pub fn new(seat: Seat, mailbox: mpsc::Sender<GameEvent>, initial_budget: Duration) -> Arc<Self> {
        Arc::new(Self {
            seat,
            available_ms: AtomicU64::new(initial_budget.as_millis() as u64),
            running: AtomicBool::new(false),
            state: parking_lot::Mutex::new(TickerState::Idle),
            cancel: parking_lot::Mutex::new(None),
            mailbox,
        })
    }

    pub fn available(&self) -> Duration {
        Duration::from_millis(self.available_ms.load(Ordering::SeqCst))
    }

    /// `Start(d)` requires `!running && available >= d`.
    pub fn start(self: &Arc<Self>, duration: Duration) -> bool {
        if self.running.load(Ordering::SeqCst) {
            return false;
        }
        if self.available() < duration {
            return false;
        }
        self.running.store(true, Ordering::SeqCst);
        *self.state.lock() = TickerState::Running;

        let token = CancellationToken::new();
        *self.cancel.lock() = Some(token.clone());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    this.running.store(false, Ordering::SeqCst);
                    this.available_ms.store(0, Ordering::SeqCst);
                    *this.state.lock() = TickerState::Timeout;
                    let _ = this.mailbox.try_send(GameEvent::Timeout { seat: this.seat });
                }
                _ = token.cancelled() => {
                    let elapsed = started.elapsed();
                    let remaining = duration.saturating_sub(elapsed);
                    this.running.store(false, Ordering::SeqCst);
                    this.available_ms.store(remaining.as_millis() as u64, Ordering::SeqCst);
                    *this.state.lock() = TickerState::Stopped;
                }
            }
        });
        true
    }

    /// Idempotent cancel.
    pub fn stop(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
    }

    pub fn add_compensation(&self, compensation: Duration) {
        let current = self.available();
        let budget = (current + compensation).min(Duration::from_secs(MAX_BUDGET_SECS));
        self.available_ms.store(budget.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn reset_to_default(&self) {
        self.available_ms
            .store(Duration::from_secs(DEFAULT_BUDGET_SECS).as_millis() as u64, Ordering::SeqCst);
    }
}

/// The four seat tickers plus the current turn state and active seat.
pub struct TurnManager {
    pub current: Seat,
    pub state: TurnState,
    pub tickers: [Arc<PlayerTicker>; 4],
}

impl TurnManager {
    pub fn new(mailbox: mpsc::Sender<GameEvent>) -> Self {
        let tickers = std::array::from_fn(|seat| {
            PlayerTicker::new(seat as Seat, mailbox.clone(), Duration::from_secs(DEFAULT_BUDGET_SECS))
        });
        Self {
            current: 0,
            state: TurnState::Idle,
            tickers,
        }
    }

    /// Entering `WaitMain(s)`: budget is `min(available + compensation,
    /// max)`.
    pub fn enter_wait_main(&mut self, seat: Seat) {
        self.current = seat;
        self.state = TurnState::WaitMain;
        let ticker = &self.tickers[seat as usize];
        ticker.add_compensation(Duration::from_secs(DEFAULT_BUDGET_SECS));
        ticker.start(ticker.available());
    }

    pub fn stop_current(&self) {
        self.tickers[self.current as usize].stop();
    }

    /// Starts a reaction-window ticker for a seat holding an option on the
    /// current discard: resets to the default per-turn budget, then layers
    /// the reaction bonus on top, mirroring `enter_wait_main`'s
    /// compensation step.
    pub fn start_reaction(&self, seat: Seat) {
        let ticker = &self.tickers[seat as usize];
        ticker.reset_to_default();
        ticker.add_compensation(Duration::from_secs(REACTION_BONUS_SECS));
        ticker.start(ticker.available());
    }

    /// Cancels a single seat's ticker without touching `current`/`state`;
    /// used when a reacting seat responds before its window expires.
    pub fn stop_seat(&self, seat: Seat) {
        self.tickers[seat as usize].stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_requires_sufficient_budget() {
        let (tx, _rx) = mpsc::channel(8);
        let ticker = PlayerTicker::new(0, tx, Duration::from_secs(2));
        assert!(!ticker.start(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn timeout_fires_timeout_event_and_zeroes_budget() {
        let (tx, mut rx) = mpsc::channel(8);
        let ticker = PlayerTicker::new(1, tx, Duration::from_millis(20));
        assert!(ticker.start(Duration::from_millis(20)));

        let event = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, GameEvent::Timeout { seat: 1 }));
        assert_eq!(ticker.available(), Duration::ZERO);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_charges_elapsed() {
        let (tx, _rx) = mpsc::channel(8);
        let ticker = PlayerTicker::new(0, tx, Duration::from_secs(5));
        ticker.start(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(30)).await;
        ticker.stop();
        ticker.stop();
        assert!(ticker.available() < Duration::from_secs(5));
    }
}
