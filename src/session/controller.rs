//! Timed test session state machine.
//!
//! Lifecycle: `Setup -> Arming(i) -> Recording(i) -> Stopping(i)` and then
//! either `Arming(i+1)` or `Review`; `Reset` returns from `Review` to
//! `Setup` with a cleared capture map.
//!
//! The controller runs as a single task that owns the capture device, the
//! live handle, and the countdown ticker. Countdown expiry, an explicit
//! "next", and forward navigation all converge on one teardown+advance
//! path. Teardown is idempotent and binds the artifact to the card id
//! captured when the stop was requested, so a late artifact can never land
//! on the wrong card.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval};
use tokio_util::sync::CancellationToken;

use crate::capture::{Artifact, CaptureDevice, CaptureHandle};
use crate::config;
use crate::domain::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
  Setup,
  Arming(usize),
  Recording(usize),
  Stopping(usize),
  Review,
}

/// Point-in-time view of a session, published on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
  pub phase: SessionPhase,
  pub cursor: usize,
  pub remaining_sec: u32,
  /// Number of cards with a finished recording
  pub recorded: usize,
  pub last_error: Option<String>,
}

enum Cmd {
  Start,
  Next,
  Navigate(i32),
  Reset,
  Recordings(oneshot::Sender<HashMap<String, Artifact>>),
}

/// Caller-side handle to a running session task.
///
/// Dropping the handle (or calling [`SessionHandle::cancel`]) tears the
/// session down; the capture device is never left armed.
pub struct SessionHandle {
  cmd: mpsc::UnboundedSender<Cmd>,
  state: watch::Receiver<SessionSnapshot>,
  cancel: CancellationToken,
  task: JoinHandle<()>,
}

impl SessionHandle {
  /// Stage a deck snapshot and spawn the controller task.
  pub fn spawn<D: CaptureDevice>(deck: Vec<Card>, device: D) -> Self {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SessionSnapshot {
      phase: SessionPhase::Setup,
      cursor: 0,
      remaining_sec: 0,
      recorded: 0,
      last_error: None,
    });
    let cancel = CancellationToken::new();

    let controller = Controller {
      deck,
      device,
      cursor: 0,
      phase: SessionPhase::Setup,
      remaining_sec: 0,
      artifacts: HashMap::new(),
      active: None,
      ticker: None,
      last_error: None,
      state_tx,
    };

    let task = tokio::spawn(controller.run(cmd_rx, cancel.clone()));

    Self {
      cmd: cmd_tx,
      state: state_rx,
      cancel,
      task,
    }
  }

  pub fn start(&self) {
    let _ = self.cmd.send(Cmd::Start);
  }

  pub fn next(&self) {
    let _ = self.cmd.send(Cmd::Next);
  }

  /// Navigation intent. In test mode a forward step is equivalent to
  /// "next"; backward steps are ignored while recording.
  pub fn navigate(&self, delta: i32) {
    let _ = self.cmd.send(Cmd::Navigate(delta));
  }

  pub fn reset(&self) {
    let _ = self.cmd.send(Cmd::Reset);
  }

  /// Tear the session down from outside. Safe to call more than once.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    self.state.borrow().clone()
  }

  /// Wait until the published state satisfies the predicate. `None` when
  /// the session task has already exited.
  pub async fn wait_for(
    &mut self,
    mut predicate: impl FnMut(&SessionSnapshot) -> bool,
  ) -> Option<SessionSnapshot> {
    self
      .state
      .wait_for(|s| predicate(s))
      .await
      .ok()
      .map(|s| s.clone())
  }

  /// Fetch the finished recordings, keyed by card id. `None` when the
  /// session task has already exited.
  pub async fn recordings(&self) -> Option<HashMap<String, Artifact>> {
    let (tx, rx) = oneshot::channel();
    if self.cmd.send(Cmd::Recordings(tx)).is_err() {
      return None;
    }
    rx.await.ok()
  }

  /// Cancel and wait for the controller task to finish its teardown.
  pub async fn shutdown(self) {
    self.cancel.cancel();
    let _ = self.task.await;
  }
}

struct ActiveCapture<H> {
  card_id: String,
  handle: H,
}

struct Controller<D: CaptureDevice> {
  deck: Vec<Card>,
  device: D,
  cursor: usize,
  phase: SessionPhase,
  remaining_sec: u32,
  artifacts: HashMap<String, Artifact>,
  active: Option<ActiveCapture<D::Handle>>,
  ticker: Option<Interval>,
  last_error: Option<String>,
  state_tx: watch::Sender<SessionSnapshot>,
}

impl<D: CaptureDevice> Controller<D> {
  async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Cmd>, cancel: CancellationToken) {
    loop {
      tokio::select! {
        _ = cancel.cancelled() => {
          // External teardown: stop everything before the state is
          // abandoned, then never arm again.
          self.teardown().await;
          self.set_phase(SessionPhase::Setup);
          tracing::debug!("session cancelled");
          break;
        }
        cmd = cmd_rx.recv() => {
          match cmd {
            Some(cmd) => self.handle_cmd(cmd, &cancel).await,
            None => {
              // Every handle dropped; same contract as cancellation
              self.teardown().await;
              break;
            }
          }
        }
        _ = next_tick(&mut self.ticker) => {
          self.on_tick(&cancel).await;
        }
      }
    }
  }

  async fn handle_cmd(&mut self, cmd: Cmd, cancel: &CancellationToken) {
    match cmd {
      Cmd::Start => {
        if self.phase == SessionPhase::Setup {
          self.last_error = None;
          self.arm(self.cursor, cancel).await;
        } else {
          tracing::debug!("start ignored in phase {:?}", self.phase);
        }
      }
      Cmd::Next => {
        if matches!(self.phase, SessionPhase::Recording(_)) {
          self.stop_and_advance(cancel).await;
        }
      }
      Cmd::Navigate(delta) => {
        // Forward collapses onto "next"; backward is not permitted here
        if delta > 0 && matches!(self.phase, SessionPhase::Recording(_)) {
          self.stop_and_advance(cancel).await;
        }
      }
      Cmd::Reset => {
        if self.phase == SessionPhase::Review {
          self.artifacts.clear();
          self.cursor = 0;
          self.remaining_sec = 0;
          self.last_error = None;
          self.set_phase(SessionPhase::Setup);
        }
      }
      Cmd::Recordings(reply) => {
        let _ = reply.send(self.artifacts.clone());
      }
    }
  }

  async fn on_tick(&mut self, cancel: &CancellationToken) {
    if !matches!(self.phase, SessionPhase::Recording(_)) {
      return;
    }
    if self.remaining_sec <= 1 {
      // A displayed 1 expires on the next boundary; never shows 0
      self.stop_and_advance(cancel).await;
    } else {
      self.remaining_sec -= 1;
      self.publish();
    }
  }

  /// Acquire the capture device for the card at `index` and start its
  /// countdown. On failure the session stays idle on the same card and a
  /// later Start retries from here.
  async fn arm(&mut self, index: usize, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
      return;
    }
    let Some(card) = self.deck.get(index) else {
      self.remaining_sec = 0;
      self.set_phase(SessionPhase::Review);
      return;
    };
    let card_id = card.id.clone();
    let duration_sec = card.duration_sec;

    self.set_phase(SessionPhase::Arming(index));
    match self.device.acquire().await {
      Ok(handle) => {
        self.active = Some(ActiveCapture { card_id, handle });
        self.remaining_sec = duration_sec;
        self.ticker = Some(countdown_ticker());
        self.set_phase(SessionPhase::Recording(index));
      }
      Err(e) => {
        tracing::warn!("capture acquisition failed for {}: {}", card_id, e);
        self.last_error = Some(e.to_string());
        self.remaining_sec = 0;
        self.set_phase(SessionPhase::Setup);
      }
    }
  }

  /// The single teardown+advance path shared by countdown expiry, "next",
  /// and forward navigation.
  async fn stop_and_advance(&mut self, cancel: &CancellationToken) {
    let SessionPhase::Recording(index) = self.phase else {
      return;
    };
    self.set_phase(SessionPhase::Stopping(index));
    self.teardown().await;

    self.cursor += 1;
    if self.cursor < self.deck.len() {
      // Let the hardware release settle before re-acquisition
      time::sleep(Duration::from_millis(config::CAPTURE_SETTLE_MS)).await;
      self.arm(self.cursor, cancel).await;
    } else {
      self.remaining_sec = 0;
      self.set_phase(SessionPhase::Review);
    }
  }

  /// Stop the countdown, finalize the capture, release the hardware.
  /// Idempotent: with nothing running this is a no-op.
  async fn teardown(&mut self) {
    self.ticker = None;

    let Some(active) = self.active.take() else {
      return;
    };
    // The id is bound here; the cursor may move before the artifact lands
    let ActiveCapture {
      card_id,
      mut handle,
    } = active;

    match handle.finalize().await {
      Ok(artifact) => {
        tracing::debug!("recorded {} bytes for {}", artifact.len(), card_id);
        self.artifacts.insert(card_id, artifact);
      }
      Err(e) => {
        tracing::warn!("capture finalize failed for {}: {}", card_id, e);
      }
    }
    handle.release();
    self.publish();
  }

  fn set_phase(&mut self, phase: SessionPhase) {
    if self.phase != phase {
      tracing::debug!("session phase {:?} -> {:?}", self.phase, phase);
    }
    self.phase = phase;
    self.publish();
  }

  fn publish(&self) {
    let _ = self.state_tx.send(SessionSnapshot {
      phase: self.phase,
      cursor: self.cursor,
      remaining_sec: self.remaining_sec,
      recorded: self.artifacts.len(),
      last_error: self.last_error.clone(),
    });
  }
}

fn countdown_ticker() -> Interval {
  let period = Duration::from_millis(config::COUNTDOWN_TICK_MS);
  let mut ticker = time::interval_at(Instant::now() + period, period);
  ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
  ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
  match ticker {
    Some(t) => {
      t.tick().await;
    }
    None => std::future::pending().await,
  }
}
