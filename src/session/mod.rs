//! Run-session state machine.
//!
//! A single tokio task owns all transient session state (elapsed time,
//! shuttle count, accumulated distance, last fix) and is the only writer to
//! it. Presentation layers send intents over an mpsc channel and read
//! snapshots from a watch channel; they never touch session state directly.
//!
//! Two cooperating activities exist per running period: a 10ms elapsed-time
//! poller and the ~1Hz location-fix stream. Both are gated on the running
//! state and torn down together on pause, finish, and reset.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::geo::haversine_m;
use crate::location::{Fix, FixStream, LocationSource};
use crate::model::{format_duration, today_date, NewRun, Run, RunState, SessionSnapshot};
use crate::store::RunStore;

/// Intents accepted by the session task.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Start when stopped, pause when running, resume when paused.
    Toggle,
    /// Persist the run (if any time elapsed) and reset.
    Finish,
    /// Discard all transient state without persisting.
    Reset,
    /// Count one shuttle repetition; ignored unless running.
    Shuttle,
    /// Remove one persisted record.
    DeleteRun(i64),
    /// Tear the session task down.
    Quit,
}

/// Channels connecting a presentation layer to the session task.
pub struct SessionHandle {
    pub cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    pub snapshot_rx: watch::Receiver<SessionSnapshot>,
    pub history_rx: watch::Receiver<Vec<Run>>,
    pub status_rx: mpsc::UnboundedReceiver<String>,
}

/// Spawn the session task. The store is owned by the task; history is
/// observed through the store's watch channel.
pub fn spawn(store: RunStore, source: LocationSource) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let history_rx = store.observe();

    tokio::spawn(run_session(store, source, cmd_rx, snapshot_tx, status_tx));

    SessionHandle {
        cmd_tx,
        snapshot_rx,
        history_rx,
        status_rx,
    }
}

async fn run_session(
    store: RunStore,
    source: LocationSource,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    status_tx: mpsc::UnboundedSender<String>,
) {
    let mut state = RunState::Stopped;
    let mut elapsed_ms: u64 = 0;
    let mut shuttles: u32 = 0;
    let mut distance_m: f64 = 0.0;
    let mut last_fix: Option<Fix> = None;
    // Wall-clock instant the run "would have started" to show the current
    // elapsed time; recomputed on every entry into Running so pause/resume
    // needs no separate offset bookkeeping.
    let mut virtual_start = Instant::now();
    let mut fixes: Option<FixStream> = None;

    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let cmd = match cmd {
                    Some(SessionCommand::Quit) | None => break,
                    Some(cmd) => cmd,
                };
                match cmd {
                    SessionCommand::Toggle => match state {
                        RunState::Stopped | RunState::Paused => {
                            // Stale pre-pause fixes must not contribute a
                            // phantom jump, so the reference is cleared on
                            // both start and resume.
                            last_fix = None;
                            virtual_start = Instant::now() - Duration::from_millis(elapsed_ms);
                            fixes = match source.subscribe().await {
                                Ok(stream) => Some(stream),
                                Err(e) => {
                                    let _ = status_tx.send(format!("Location unavailable: {e:#}"));
                                    None
                                }
                            };
                            state = RunState::Running;
                        }
                        RunState::Running => {
                            elapsed_ms = virtual_start.elapsed().as_millis() as u64;
                            fixes = None;
                            state = RunState::Paused;
                        }
                    },
                    SessionCommand::Finish => {
                        if state == RunState::Running {
                            elapsed_ms = virtual_start.elapsed().as_millis() as u64;
                        }
                        if elapsed_ms > 0 {
                            let run = NewRun {
                                date: today_date(),
                                duration: format_duration(elapsed_ms),
                                shuttles,
                                distance_in_meters: distance_m,
                            };
                            match store.insert(&run) {
                                Ok(saved) => {
                                    let _ = status_tx.send(format!(
                                        "Saved run #{} ({})",
                                        saved.id, saved.duration
                                    ));
                                }
                                Err(e) => {
                                    let _ = status_tx.send(format!("Save failed: {e}"));
                                }
                            }
                        }
                        state = RunState::Stopped;
                        fixes = None;
                        elapsed_ms = 0;
                        shuttles = 0;
                        distance_m = 0.0;
                        last_fix = None;
                    }
                    SessionCommand::Reset => {
                        state = RunState::Stopped;
                        fixes = None;
                        elapsed_ms = 0;
                        shuttles = 0;
                        distance_m = 0.0;
                        last_fix = None;
                    }
                    SessionCommand::Shuttle => {
                        if state == RunState::Running {
                            shuttles += 1;
                        }
                    }
                    SessionCommand::DeleteRun(id) => match store.delete(id) {
                        Ok(true) => {
                            let _ = status_tx.send(format!("Deleted run #{id}"));
                        }
                        Ok(false) => {
                            let _ = status_tx.send(format!("Run #{id} not found"));
                        }
                        Err(e) => {
                            let _ = status_tx.send(format!("Delete failed: {e}"));
                        }
                    },
                    SessionCommand::Quit => unreachable!("handled above"),
                }
            }
            _ = ticker.tick(), if state == RunState::Running => {
                elapsed_ms = virtual_start.elapsed().as_millis() as u64;
            }
            fix = next_fix(&mut fixes) => {
                // A fix only adds distance when running and a prior fix
                // exists within the same running period; the first fix after
                // start/resume just seeds the reference.
                if state == RunState::Running {
                    if let Some(prev) = last_fix {
                        distance_m += haversine_m(&prev, &fix);
                    }
                    last_fix = Some(fix);
                }
            }
        }

        let _ = snapshot_tx.send_replace(SessionSnapshot {
            state,
            elapsed_ms,
            shuttles,
            distance_m,
        });
    }
}

/// Next fix from the active subscription; pends forever when there is none
/// so the select loop never spins.
async fn next_fix(fixes: &mut Option<FixStream>) -> Fix {
    match fixes.as_mut() {
        Some(stream) => stream.next_fix().await,
        None => futures::future::pending().await,
    }
}
