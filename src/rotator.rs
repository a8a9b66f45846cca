//! Background wallpaper rotation.
//!
//! Owns the [`Dispatcher`] on a dedicated thread and runs a cycle on three
//! triggers: startup, the recurring timer and manual requests from the UI.
//! Results go back to the UI thread over an [`mpsc`] channel.
//!
//! ## For contributors
//!
//! Requests are handled one at a time. Rotation requests that pile up while
//! a cycle is running are collapsed into nothing once it finishes; the user
//! asked for new wallpapers and just got them. Pause changes and shutdown
//! are never dropped.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::dispatch::{CycleOutcome, CycleReport, Dispatcher};

/// Rotation interval when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// How long to block while the timer is paused; only shutdown checks care.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Timer,
    Manual,
    Reapply,
}

impl Trigger {
    pub fn label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Timer => "timer",
            Self::Manual => "manual",
            Self::Reapply => "re-apply",
        }
    }
}

/// Messages sent from the rotator thread to the UI thread.
#[derive(Debug)]
pub enum RotateMsg {
    /// A cycle began.
    Started(Trigger),
    /// A cycle finished and changed (or deliberately left) the wallpaper.
    Rotated { trigger: Trigger, report: CycleReport },
    /// A cycle failed; the next one runs normally.
    Failed {
        trigger: Trigger,
        kind: &'static str,
        message: String,
    },
    /// When the timer fires next; `None` while paused.
    Schedule { next: Option<Instant>, interval: Duration },
}

#[derive(Debug)]
enum Request {
    Rotate,
    Reapply,
    SetPaused(bool),
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
pub struct RotatorOptions {
    pub interval: Duration,
    /// Start with the timer stopped.
    pub paused: bool,
    pub rotate_on_start: bool,
}

impl Default for RotatorOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            paused: false,
            rotate_on_start: true,
        }
    }
}

/// Handle held by the UI thread.
pub struct Rotator {
    requests: Sender<Request>,
    pub messages: Receiver<RotateMsg>,
    handle: Option<JoinHandle<()>>,
}

impl Rotator {
    /// Spawn the rotation thread.
    pub fn spawn(dispatcher: Arc<Dispatcher>, options: RotatorOptions) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (msg_tx, msg_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("rotator".into())
            .spawn(move || Worker::new(dispatcher, options, request_rx, msg_tx).run());
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!("could not start the rotation thread: {err}");
                None
            }
        };

        Self {
            requests: request_tx,
            messages: msg_rx,
            handle,
        }
    }

    pub fn rotate_now(&self) {
        self.send(Request::Rotate);
    }

    pub fn reapply(&self) {
        self.send(Request::Reapply);
    }

    pub fn set_paused(&self, paused: bool) {
        self.send(Request::SetPaused(paused));
    }

    /// Stop the thread after any cycle in progress and wait for it.
    pub fn shutdown(mut self) {
        self.send(Request::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("rotation thread panicked");
            }
        }
    }

    fn send(&self, request: Request) {
        // The thread only goes away on shutdown; nothing left to tell it then.
        let _ = self.requests.send(request);
    }
}

struct Worker {
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    paused: bool,
    rotate_on_start: bool,
    next: Option<Instant>,
    requests: Receiver<Request>,
    messages: Sender<RotateMsg>,
    quit: bool,
}

impl Worker {
    fn new(
        dispatcher: Arc<Dispatcher>,
        options: RotatorOptions,
        requests: Receiver<Request>,
        messages: Sender<RotateMsg>,
    ) -> Self {
        Self {
            dispatcher,
            interval: options.interval,
            paused: options.paused,
            rotate_on_start: options.rotate_on_start,
            next: None,
            requests,
            messages,
            quit: false,
        }
    }

    fn run(mut self) {
        if self.rotate_on_start {
            self.cycle(Trigger::Startup);
        } else {
            self.restart_timer();
        }

        while !self.quit {
            let wait = match self.next {
                Some(next) => next.saturating_duration_since(Instant::now()),
                None => IDLE_WAIT,
            };
            match self.requests.recv_timeout(wait) {
                Ok(Request::Rotate) => self.cycle(Trigger::Manual),
                Ok(Request::Reapply) => self.cycle(Trigger::Reapply),
                Ok(Request::SetPaused(paused)) => self.set_paused(paused),
                Ok(Request::Shutdown) | Err(RecvTimeoutError::Disconnected) => self.quit = true,
                Err(RecvTimeoutError::Timeout) => {
                    if self.next.is_some_and(|next| Instant::now() >= next) {
                        self.cycle(Trigger::Timer);
                    }
                }
            }
        }
        debug!("rotation thread stopped");
    }

    fn cycle(&mut self, trigger: Trigger) {
        self.emit(RotateMsg::Started(trigger));
        let result = match trigger {
            Trigger::Reapply => self.dispatcher.reapply(),
            _ => self.dispatcher.rotate(),
        };
        self.coalesce_pending();
        self.restart_timer();

        let msg = match result {
            Ok(CycleOutcome::Completed(report)) => {
                info!(trigger = trigger.label(), elapsed = ?report.elapsed, "cycle finished");
                RotateMsg::Rotated { trigger, report }
            }
            Ok(CycleOutcome::Skipped) => {
                debug!(trigger = trigger.label(), "dispatcher busy, cycle skipped");
                return;
            }
            Err(err) => {
                error!(trigger = trigger.label(), kind = err.kind(), "cycle failed: {err}");
                RotateMsg::Failed {
                    trigger,
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };
        self.emit(msg);
    }

    /// Drop rotation requests queued during the last cycle.
    fn coalesce_pending(&mut self) {
        let mut dropped = 0;
        while let Ok(request) = self.requests.try_recv() {
            match request {
                Request::Rotate | Request::Reapply => dropped += 1,
                Request::SetPaused(paused) => self.paused = paused,
                Request::Shutdown => self.quit = true,
            }
        }
        if dropped > 0 {
            debug!(dropped, "coalesced rotation requests");
        }
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        info!(paused, "timed rotation toggled");
        self.restart_timer();
    }

    fn restart_timer(&mut self) {
        self.next = (!self.paused).then(|| Instant::now() + self.interval);
        self.emit(RotateMsg::Schedule {
            next: self.next,
            interval: self.interval,
        });
    }

    fn emit(&self, msg: RotateMsg) {
        // A closed channel means the UI is gone; shutdown follows shortly.
        let _ = self.messages.send(msg);
    }
}
