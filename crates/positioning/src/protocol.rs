//! One-move-at-a-time commit protocol for the hexapod.
//!
//! The caller thread claims the state guard (`Idle -> Moving`) and hands the
//! command to a dedicated worker through a queue of capacity one. The worker
//! computes the delta from the current pose, blocks on the actuator, then
//! records the outcome and returns the guard to `Idle` before replying. A
//! second request while a move is in flight is rejected, never queued:
//! interleaved deltas would corrupt the cumulative position.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError, RwLock},
    thread::{self, JoinHandle},
};

use anyhow::anyhow;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::Serialize;
use shared::{domain::Pose, error::PositioningError};
use tracing::{debug, error, info, warn};

use crate::{
    actuator::ActuatorInterface,
    history::{Move, MovementHistory},
    kinematics::KinematicMapper,
};

const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Idle,
    Moving,
    Error,
}

/// Notifications for whoever renders the positioning tab.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitEvent {
    Started { target: Pose },
    Completed(Move),
    Homed(Move),
    Failed { target: Pose, error: PositioningError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitKind {
    GoTo,
    Home,
}

impl CommitKind {
    fn name(&self) -> &'static str {
        match self {
            CommitKind::GoTo => "go_to",
            CommitKind::Home => "home",
        }
    }
}

type CommitOutcome = Result<Move, PositioningError>;

struct CommitCommand {
    kind: CommitKind,
    target: Pose,
    reply: Sender<CommitOutcome>,
}

/// Handle on a dispatched move.
#[derive(Debug)]
pub struct CommitTicket {
    target: Pose,
    reply: Receiver<CommitOutcome>,
}

impl CommitTicket {
    pub fn target(&self) -> Pose {
        self.target
    }

    /// Blocks until the worker reports the outcome of this move.
    pub fn wait(self) -> CommitOutcome {
        self.reply.recv().unwrap_or_else(|_| {
            Err(PositioningError::HardwareUnavailable(
                "commit worker stopped before reporting".to_string(),
            ))
        })
    }

    pub fn wait_timeout(&self, timeout: std::time::Duration) -> Option<CommitOutcome> {
        match self.reply.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(PositioningError::HardwareUnavailable(
                "commit worker stopped before reporting".to_string(),
            ))),
        }
    }
}

/// History and current pose change together, so they share one lock.
struct Session {
    history: MovementHistory,
    current: Pose,
}

struct Shared {
    mapper: KinematicMapper,
    state: Mutex<CommitState>,
    session: RwLock<Session>,
}

impl Shared {
    fn set_state(&self, next: CommitState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn claim(&self) -> Result<(), PositioningError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != CommitState::Idle {
            warn!(state = ?*state, "rejecting commit while a move is in flight");
            return Err(PositioningError::ProtocolBusy);
        }
        *state = CommitState::Moving;
        Ok(())
    }
}

pub struct PositionCommitProtocol {
    shared: Arc<Shared>,
    cmd_tx: Option<Sender<CommitCommand>>,
    events_rx: Receiver<CommitEvent>,
    worker: Option<JoinHandle<()>>,
}

impl PositionCommitProtocol {
    pub fn new(mapper: KinematicMapper, actuator: impl ActuatorInterface + 'static) -> Self {
        let shared = Arc::new(Shared {
            mapper,
            state: Mutex::new(CommitState::Idle),
            session: RwLock::new(Session {
                history: MovementHistory::new(&mapper),
                current: Pose::HOME,
            }),
        });
        let (cmd_tx, cmd_rx) = bounded::<CommitCommand>(1);
        let (events_tx, events_rx) = bounded::<CommitEvent>(EVENT_QUEUE_CAPACITY);

        let worker_shared = shared.clone();
        let actuator: Box<dyn ActuatorInterface> = Box::new(actuator);
        let worker = thread::spawn(move || run_worker(worker_shared, cmd_rx, events_tx, actuator));

        info!(arm_length_mm = mapper.arm_length_mm(), "positioning protocol ready");
        Self {
            shared,
            cmd_tx: Some(cmd_tx),
            events_rx,
            worker: Some(worker),
        }
    }

    pub fn mapper(&self) -> KinematicMapper {
        self.shared.mapper
    }

    pub fn state(&self) -> CommitState {
        *self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_pose(&self) -> Pose {
        self.shared
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
    }

    /// Consistent copy of the trail for display or export.
    pub fn history_snapshot(&self) -> MovementHistory {
        self.shared
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.shared
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .size()
    }

    pub fn events(&self) -> Receiver<CommitEvent> {
        self.events_rx.clone()
    }

    pub fn go_to(&self, target: Pose) -> Result<CommitTicket, PositioningError> {
        validate(&target)?;
        self.shared.claim()?;
        self.dispatch(CommitKind::GoTo, target)
    }

    /// Moves back to the home pose and, once there, resets the trail to its
    /// origin entry instead of appending.
    pub fn home(&self) -> Result<CommitTicket, PositioningError> {
        self.shared.claim()?;
        self.dispatch(CommitKind::Home, Pose::HOME)
    }

    /// Moves to the pose one step before the newest entry. The return trip is
    /// committed like any other move, so it is appended to the trail.
    pub fn go_back(&self) -> Result<CommitTicket, PositioningError> {
        self.shared.claim()?;
        let previous = self
            .shared
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .last_image_pose_before_tip();
        match previous {
            Ok(target) => self.dispatch(CommitKind::GoTo, target),
            Err(err) => {
                self.shared.set_state(CommitState::Idle);
                warn!("no movements to revert");
                Err(err)
            }
        }
    }

    fn dispatch(&self, kind: CommitKind, target: Pose) -> Result<CommitTicket, PositioningError> {
        let Some(cmd_tx) = self.cmd_tx.as_ref() else {
            self.shared.set_state(CommitState::Idle);
            return Err(PositioningError::HardwareUnavailable(
                "commit worker is shut down".to_string(),
            ));
        };
        let (reply_tx, reply_rx) = bounded(1);
        let cmd = CommitCommand {
            kind,
            target,
            reply: reply_tx,
        };
        match cmd_tx.try_send(cmd) {
            Ok(()) => {
                debug!(command = kind.name(), ?target, "queued commit");
                Ok(CommitTicket {
                    target,
                    reply: reply_rx,
                })
            }
            Err(TrySendError::Full(_)) => {
                self.shared.set_state(CommitState::Idle);
                Err(PositioningError::ProtocolBusy)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.set_state(CommitState::Idle);
                error!("commit worker disconnected");
                Err(PositioningError::HardwareUnavailable(
                    "commit worker disconnected".to_string(),
                ))
            }
        }
    }
}

impl Drop for PositionCommitProtocol {
    fn drop(&mut self) {
        // closing the queue ends the worker loop once any in-flight move lands
        self.cmd_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("commit worker panicked");
            }
        }
    }
}

fn validate(target: &Pose) -> Result<(), PositioningError> {
    let fields = [
        ("x", target.x),
        ("y", target.y),
        ("z", target.z),
        ("phi", target.phi),
        ("theta", target.theta),
    ];
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(PositioningError::validation(*name, value.to_string())),
        None => Ok(()),
    }
}

fn run_worker(
    shared: Arc<Shared>,
    cmd_rx: Receiver<CommitCommand>,
    events_tx: Sender<CommitEvent>,
    mut actuator: Box<dyn ActuatorInterface>,
) {
    for cmd in cmd_rx.iter() {
        let outcome = execute(&shared, actuator.as_mut(), &cmd, &events_tx);
        let _ = cmd.reply.send(outcome);
    }
    debug!("commit worker stopped");
}

fn execute(
    shared: &Shared,
    actuator: &mut dyn ActuatorInterface,
    cmd: &CommitCommand,
    events_tx: &Sender<CommitEvent>,
) -> CommitOutcome {
    let origin = shared
        .session
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .current;
    let origin_actuator = shared.mapper.to_actuator(&origin);
    let target_actuator = shared.mapper.to_actuator(&cmd.target);
    let delta = target_actuator - origin_actuator;
    let _ = events_tx.try_send(CommitEvent::Started { target: cmd.target });

    // a panicking driver is a hardware failure like any other; the guard must
    // still end up Idle
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| actuator.move_by(&delta)))
        .unwrap_or_else(|payload| Err(anyhow!("actuator panicked: {}", panic_message(&*payload))));
    if let Err(err) = attempt {
        shared.set_state(CommitState::Error);
        let failure = PositioningError::HardwareUnavailable(format!("{err:#}"));
        error!(command = cmd.kind.name(), target = ?cmd.target, error = %failure, "move failed");
        let _ = events_tx.try_send(CommitEvent::Failed {
            target: cmd.target,
            error: failure.clone(),
        });
        shared.set_state(CommitState::Idle);
        return Err(failure);
    }

    let record = Move {
        target_image_pose: cmd.target,
        target_actuator_pose: target_actuator,
        delta,
    };
    let size = {
        let mut session = shared.session.write().unwrap_or_else(PoisonError::into_inner);
        match cmd.kind {
            CommitKind::GoTo => session.history.push(record.clone()),
            CommitKind::Home => session.history.reset(),
        }
        session.current = cmd.target;
        session.history.size()
    };
    shared.set_state(CommitState::Idle);

    info!(
        command = cmd.kind.name(),
        target = ?cmd.target,
        delta = ?record.delta,
        history = size,
        "move completed"
    );
    let event = match cmd.kind {
        CommitKind::GoTo => CommitEvent::Completed(record.clone()),
        CommitKind::Home => CommitEvent::Homed(record.clone()),
    };
    let _ = events_tx.try_send(event);
    Ok(record)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
