use super::*;
use crate::{
    actuator::SimulatedActuator,
    kinematics::{ActuatorPose, PoseDelta},
};
use anyhow::anyhow;
use std::time::Duration;

const ARM_MM: f64 = 100.0;

fn protocol() -> (PositionCommitProtocol, crate::actuator::SimulatedActuatorHandle) {
    let (actuator, handle) = SimulatedActuator::new(Duration::ZERO);
    (
        PositionCommitProtocol::new(KinematicMapper::new(ARM_MM), actuator),
        handle,
    )
}

/// Actuator that blocks every move until the test releases it.
fn gated() -> (Sender<()>, impl ActuatorInterface + 'static) {
    let (gate_tx, gate_rx) = bounded::<()>(0);
    let actuator = move |_: &PoseDelta| -> anyhow::Result<()> {
        gate_rx.recv().map_err(|_| anyhow!("gate closed"))
    };
    (gate_tx, actuator)
}

fn assert_close(actual: ActuatorPose, expected: [f64; 5]) {
    for (a, e) in actual.components().iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{a} != {e}");
    }
}

#[test]
fn go_to_records_move_and_updates_current_pose() {
    let (protocol, handle) = protocol();
    let target = Pose::at(10.0, 5.0, -2.0);

    let record = protocol.go_to(target).expect("dispatch").wait().expect("move");

    assert_eq!(record.target_image_pose, target);
    assert_close(record.target_actuator_pose, [-90.0, 5.0, -2.0, 0.0, 90.0]);
    assert!((record.delta.dx - 10.0).abs() < 1e-9);
    assert_eq!(protocol.current_pose(), target);
    assert_eq!(protocol.history_len(), 1);
    assert_eq!(protocol.state(), CommitState::Idle);
    assert_eq!(handle.moves(), 1);
}

#[test]
fn deltas_reconstruct_the_path_after_three_commits() {
    let (protocol, handle) = protocol();
    let targets = [
        Pose::new(10.0, 0.0, 0.0, 0.0, 90.0),
        Pose::new(10.0, 20.0, 0.0, 45.0, 60.0),
        Pose::new(-5.0, 3.0, 8.0, 0.0, 30.0),
    ];
    for target in targets {
        protocol.go_to(target).expect("dispatch").wait().expect("move");
    }

    let history = protocol.history_snapshot();
    assert_eq!(history.size(), 3);
    assert_eq!(history.verify_deltas(), Ok(()));

    let moves = history.moves();
    assert_eq!(
        moves[0].delta,
        moves[0].target_actuator_pose - history.origin().target_actuator_pose
    );
    for i in 1..moves.len() {
        assert_eq!(
            moves[i].delta,
            moves[i].target_actuator_pose - moves[i - 1].target_actuator_pose
        );
    }

    let travelled = handle.displacement();
    let expected = moves[2].target_actuator_pose - history.origin().target_actuator_pose;
    for (a, e) in travelled.components().iter().zip(expected.components()) {
        assert!((a - e).abs() < 1e-9);
    }
}

#[test]
fn home_resets_history_to_single_entry() {
    let (protocol, _handle) = protocol();
    for step in 1..=4 {
        protocol
            .go_to(Pose::at(step as f64, 0.0, 0.0))
            .expect("dispatch")
            .wait()
            .expect("move");
    }
    assert_eq!(protocol.history_len(), 4);

    let record = protocol.home().expect("dispatch").wait().expect("home");
    assert!((record.delta.dx + 4.0).abs() < 1e-9);
    assert_eq!(protocol.history_len(), 1);
    assert_eq!(protocol.current_pose(), Pose::HOME);
    assert!(protocol.history_snapshot().moves()[0].delta.is_zero());
}

#[test]
fn commit_while_moving_is_rejected_without_touching_history() {
    let (gate, actuator) = gated();
    let protocol = PositionCommitProtocol::new(KinematicMapper::new(ARM_MM), actuator);

    let in_flight = protocol.go_to(Pose::at(1.0, 0.0, 0.0)).expect("dispatch");
    assert_eq!(protocol.state(), CommitState::Moving);

    assert_eq!(
        protocol.go_to(Pose::at(2.0, 0.0, 0.0)).map(|_| ()),
        Err(PositioningError::ProtocolBusy)
    );
    assert_eq!(protocol.home().map(|_| ()), Err(PositioningError::ProtocolBusy));
    assert_eq!(protocol.go_back().map(|_| ()), Err(PositioningError::ProtocolBusy));
    assert_eq!(protocol.history_len(), 0);

    gate.send(()).expect("release actuator");
    in_flight.wait().expect("first move");
    assert_eq!(protocol.history_len(), 1);
    assert_eq!(protocol.state(), CommitState::Idle);
}

#[test]
fn go_back_on_short_history_fails_and_stays_idle() {
    let (protocol, handle) = protocol();
    assert_eq!(
        protocol.go_back().map(|_| ()),
        Err(PositioningError::EmptyHistory)
    );
    assert_eq!(protocol.state(), CommitState::Idle);

    protocol
        .go_to(Pose::at(3.0, 0.0, 0.0))
        .expect("dispatch")
        .wait()
        .expect("move");
    assert_eq!(
        protocol.go_back().map(|_| ()),
        Err(PositioningError::EmptyHistory)
    );
    assert_eq!(protocol.state(), CommitState::Idle);
    assert_eq!(handle.moves(), 1);
}

#[test]
fn go_back_appends_a_move_to_the_previous_pose() {
    let (protocol, _handle) = protocol();
    let first = Pose::at(3.0, 0.0, 0.0);
    let second = Pose::at(7.0, 1.0, 0.0);
    protocol.go_to(first).expect("dispatch").wait().expect("first");
    protocol.go_to(second).expect("dispatch").wait().expect("second");

    let record = protocol.go_back().expect("dispatch").wait().expect("back");

    assert_eq!(record.target_image_pose, first);
    assert!((record.delta.dx + 4.0).abs() < 1e-9);
    assert_eq!(protocol.current_pose(), first);
    assert_eq!(protocol.history_len(), 3);
    assert_eq!(protocol.history_snapshot().verify_deltas(), Ok(()));
}

#[test]
fn actuator_failure_leaves_session_untouched() {
    let (protocol, handle) = protocol();
    protocol
        .go_to(Pose::at(1.0, 0.0, 0.0))
        .expect("dispatch")
        .wait()
        .expect("move");
    let before = protocol.history_snapshot();
    let events = protocol.events();
    while events.try_recv().is_ok() {}

    handle.set_online(false);
    let err = protocol
        .go_to(Pose::at(9.0, 0.0, 0.0))
        .expect("dispatch")
        .wait()
        .expect_err("offline actuator");

    assert!(matches!(err, PositioningError::HardwareUnavailable(_)));
    assert_eq!(protocol.history_snapshot(), before);
    assert_eq!(protocol.current_pose(), Pose::at(1.0, 0.0, 0.0));
    assert_eq!(protocol.state(), CommitState::Idle);

    let received: Vec<CommitEvent> = events.try_iter().collect();
    assert!(matches!(received.last(), Some(CommitEvent::Failed { .. })));

    handle.set_online(true);
    protocol
        .go_to(Pose::at(9.0, 0.0, 0.0))
        .expect("dispatch")
        .wait()
        .expect("recovered");
    assert_eq!(protocol.history_len(), 2);
}

#[test]
fn non_finite_targets_are_rejected_before_dispatch() {
    let (protocol, handle) = protocol();
    let err = protocol
        .go_to(Pose::new(0.0, f64::INFINITY, 0.0, 0.0, 90.0))
        .expect_err("invalid");
    assert!(matches!(err, PositioningError::Validation { ref field, .. } if field == "y"));
    assert_eq!(protocol.state(), CommitState::Idle);
    assert_eq!(handle.moves(), 0);
}

#[test]
fn events_follow_the_commit_lifecycle() {
    let (protocol, _handle) = protocol();
    let events = protocol.events();
    let target = Pose::at(2.0, 0.0, 0.0);
    protocol.go_to(target).expect("dispatch").wait().expect("move");
    protocol.home().expect("dispatch").wait().expect("home");

    let received: Vec<CommitEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 4);
    assert_eq!(received[0], CommitEvent::Started { target });
    assert!(matches!(received[1], CommitEvent::Completed(ref m) if m.target_image_pose == target));
    assert_eq!(received[2], CommitEvent::Started { target: Pose::HOME });
    assert!(matches!(received[3], CommitEvent::Homed(_)));
}

#[test]
fn ticket_times_out_while_actuator_is_held() {
    let (gate, actuator) = gated();
    let protocol = PositionCommitProtocol::new(KinematicMapper::new(ARM_MM), actuator);
    let ticket = protocol.go_to(Pose::at(1.0, 0.0, 0.0)).expect("dispatch");
    assert_eq!(ticket.target(), Pose::at(1.0, 0.0, 0.0));
    assert!(ticket.wait_timeout(Duration::from_millis(20)).is_none());
    gate.send(()).expect("release");
    assert!(matches!(
        ticket.wait_timeout(Duration::from_secs(5)),
        Some(Ok(_))
    ));
}

#[test]
fn panicking_driver_is_reported_and_protocol_recovers() {
    let mut calls = 0usize;
    let actuator = move |_: &PoseDelta| -> anyhow::Result<()> {
        calls += 1;
        if calls == 1 {
            panic!("driver fault");
        }
        Ok(())
    };
    let protocol = PositionCommitProtocol::new(KinematicMapper::new(ARM_MM), actuator);

    let outcome = protocol
        .go_to(Pose::at(5.0, 0.0, 0.0))
        .expect("dispatch")
        .wait();
    match outcome {
        Err(PositioningError::HardwareUnavailable(message)) => {
            assert!(message.contains("driver fault"), "{message}");
        }
        other => panic!("expected hardware failure, got {other:?}"),
    }
    assert_eq!(protocol.state(), CommitState::Idle);
    assert_eq!(protocol.history_len(), 0);
    assert_eq!(protocol.current_pose(), Pose::HOME);

    let record = protocol
        .go_to(Pose::at(5.0, 0.0, 0.0))
        .expect("dispatch after recovery")
        .wait()
        .expect("second move");
    assert!((record.delta.dx - 5.0).abs() < 1e-9);
    protocol.home().expect("dispatch").wait().expect("home");
    assert_eq!(protocol.history_len(), 1);
}
