use serde::Serialize;
use shared::{domain::Pose, error::PositioningError};
use thiserror::Error;

use crate::kinematics::{ActuatorPose, KinematicMapper, PoseDelta};

/// One committed displacement of the actuator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Move {
    pub target_image_pose: Pose,
    pub target_actuator_pose: ActuatorPose,
    pub delta: PoseDelta,
}

impl Move {
    /// The canonical origin entry: home pose, no displacement.
    pub fn home(mapper: &KinematicMapper) -> Self {
        Self {
            target_image_pose: Pose::HOME,
            target_actuator_pose: mapper.to_actuator(&Pose::HOME),
            delta: PoseDelta::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("delta of move {index} does not match its consecutive targets")]
pub struct DeltaMismatch {
    pub index: usize,
}

/// Session trail of committed moves, newest last.
///
/// Each delta is the difference between its target and the previous target
/// (or the origin for the first entry), so summing deltas from the origin
/// replays the hardware displacement exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovementHistory {
    moves: Vec<Move>,
    #[serde(skip)]
    origin: Move,
}

impl MovementHistory {
    pub fn new(mapper: &KinematicMapper) -> Self {
        Self {
            moves: Vec::new(),
            origin: Move::home(mapper),
        }
    }

    pub fn push(&mut self, record: Move) {
        self.moves.push(record);
    }

    pub fn pop(&mut self) -> Result<Move, PositioningError> {
        self.moves.pop().ok_or(PositioningError::EmptyHistory)
    }

    pub fn size(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn last(&self) -> Option<&Move> {
        self.moves.last()
    }

    pub fn origin(&self) -> &Move {
        &self.origin
    }

    /// Image pose of the newest entry, or home when nothing was committed.
    pub fn last_image_pose(&self) -> Pose {
        self.moves
            .last()
            .map(|record| record.target_image_pose)
            .unwrap_or(Pose::HOME)
    }

    /// Image pose one step before the newest entry. Index 0 is never the tip
    /// being reverted, so at least two entries are required.
    pub fn last_image_pose_before_tip(&self) -> Result<Pose, PositioningError> {
        match self.moves.len() {
            0 | 1 => Err(PositioningError::EmptyHistory),
            len => Ok(self.moves[len - 2].target_image_pose),
        }
    }

    /// Drops the trail and leaves only the canonical origin entry.
    pub fn reset(&mut self) {
        self.moves.clear();
        self.moves.push(self.origin.clone());
    }

    pub fn verify_deltas(&self) -> Result<(), DeltaMismatch> {
        let mut previous = self.origin.target_actuator_pose;
        for (index, record) in self.moves.iter().enumerate() {
            if record.delta != record.target_actuator_pose - previous {
                return Err(DeltaMismatch { index });
            }
            previous = record.target_actuator_pose;
        }
        Ok(())
    }

    /// Actuator positions reached after each move, rebuilt from the origin by
    /// accumulating deltas.
    pub fn replay(&self) -> Vec<ActuatorPose> {
        self.moves
            .iter()
            .scan(self.origin.target_actuator_pose, |position, record| {
                *position = *position + record.delta;
                Some(*position)
            })
            .collect()
    }

    /// Net displacement commanded since the origin.
    pub fn total_displacement(&self) -> PoseDelta {
        let mut total = PoseDelta::default();
        for record in &self.moves {
            total += record.delta;
        }
        total
    }
}

#[cfg(test)]
#[path = "tests/history_tests.rs"]
mod tests;
