use std::{
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::Duration,
};

use anyhow::{bail, Result};
use tracing::debug;

use crate::kinematics::PoseDelta;

/// The hexapod driver as seen by the positioning core: a single blocking
/// "move by delta" call, run on the commit worker thread. Timeouts belong to
/// the implementation.
pub trait ActuatorInterface: Send {
    fn move_by(&mut self, delta: &PoseDelta) -> Result<()>;
}

impl<F> ActuatorInterface for F
where
    F: FnMut(&PoseDelta) -> Result<()> + Send,
{
    fn move_by(&mut self, delta: &PoseDelta) -> Result<()> {
        self(delta)
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    offline: bool,
    displacement: PoseDelta,
    moves: usize,
}

/// Bench stand-in for the hexapod. Integrates every delta it receives and can
/// be switched offline through its handle to rehearse hardware faults.
#[derive(Debug)]
pub struct SimulatedActuator {
    latency: Duration,
    state: Arc<Mutex<SimulatedState>>,
}

#[derive(Debug, Clone)]
pub struct SimulatedActuatorHandle {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedActuator {
    pub fn new(latency: Duration) -> (Self, SimulatedActuatorHandle) {
        let state = Arc::new(Mutex::new(SimulatedState::default()));
        (
            Self {
                latency,
                state: state.clone(),
            },
            SimulatedActuatorHandle { state },
        )
    }
}

impl ActuatorInterface for SimulatedActuator {
    fn move_by(&mut self, delta: &PoseDelta) -> Result<()> {
        if self.state.lock().unwrap_or_else(PoisonError::into_inner).offline {
            bail!("simulated hexapod is offline");
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.displacement += *delta;
        state.moves += 1;
        debug!(?delta, moves = state.moves, "simulated hexapod moved");
        Ok(())
    }
}

impl SimulatedActuatorHandle {
    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).offline = !online;
    }

    /// Accumulated displacement since the actuator was created.
    pub fn displacement(&self) -> PoseDelta {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .displacement
    }

    pub fn moves(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).moves
    }
}
