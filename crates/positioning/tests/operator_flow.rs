use std::time::Duration;

use positioning::{
    ActuatorPreview, CommitState, KinematicMapper, PoseField, PoseForm, PositionCommitProtocol,
    SimulatedActuator,
};
use shared::{domain::Pose, error::PositioningError};

#[test]
fn typed_target_is_previewed_committed_and_homed() {
    let mapper = KinematicMapper::new(100.0);
    let (actuator, hexapod) = SimulatedActuator::new(Duration::from_millis(1));
    let protocol = PositionCommitProtocol::new(mapper, actuator);

    let mut form = PoseForm::default();
    let preview = ActuatorPreview::attach(mapper, &mut form);
    form.set_text(PoseField::X, "12").expect("x");
    form.set_text(PoseField::Z, "-4").expect("z");
    assert!(form.set_text(PoseField::Y, "twelve").is_err());

    let target = form.pose();
    assert_eq!(target, Pose::new(12.0, 0.0, -4.0, 0.0, 90.0));

    let record = protocol.go_to(target).expect("dispatch").wait().expect("move");
    assert_eq!(record.target_actuator_pose, preview.latest());
    assert_eq!(protocol.current_pose(), target);

    protocol
        .go_to(Pose::at(0.0, 6.0, 0.0))
        .expect("dispatch")
        .wait()
        .expect("second move");
    let back = protocol.go_back().expect("dispatch").wait().expect("back");
    assert_eq!(back.target_image_pose, target);
    assert_eq!(protocol.history_len(), 3);

    protocol.home().expect("dispatch").wait().expect("home");
    assert_eq!(protocol.history_len(), 1);
    assert_eq!(protocol.state(), CommitState::Idle);
    assert_eq!(
        protocol.go_back().map(|_| ()),
        Err(PositioningError::EmptyHistory)
    );

    let net = hexapod.displacement();
    for component in net.components() {
        assert!(component.abs() < 1e-9, "hexapod did not return home: {net:?}");
    }
    assert_eq!(hexapod.moves(), 4);
}
