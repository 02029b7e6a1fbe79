//! Positioning core: image-space to hexapod-space mapping, the trail of
//! committed moves, and the protocol that drives the actuator one move at a
//! time.

pub mod actuator;
pub mod fields;
pub mod history;
pub mod kinematics;
pub mod protocol;

pub use actuator::{ActuatorInterface, SimulatedActuator, SimulatedActuatorHandle};
pub use fields::{ActuatorPreview, PoseField, PoseForm};
pub use history::{DeltaMismatch, Move, MovementHistory};
pub use kinematics::{to_actuator, ActuatorPose, KinematicMapper, PoseDelta};
pub use protocol::{CommitEvent, CommitState, CommitTicket, PositionCommitProtocol};
