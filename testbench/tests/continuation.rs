//! A window split into initial + continued runs must land where one
//! uninterrupted run does.

use explorer::{ExploreError, ModelError, ModelUnit, RunMode, SimulationProfile};
use testbench::{RecordingCanvas, batch_controller};

const TOLERANCE: f64 = 1e-8;

#[test]
fn test_split_run_matches_uninterrupted() {
    let mut canvas = RecordingCanvas::default();

    let mut whole = batch_controller().unwrap();
    whole
        .run(RunMode::Initial, Some(10.0), SimulationProfile::Standard, &mut canvas)
        .unwrap();

    let mut split = batch_controller().unwrap();
    split
        .run(RunMode::Initial, Some(5.0), SimulationProfile::Standard, &mut canvas)
        .unwrap();
    let report = split
        .run(RunMode::Continued, Some(5.0), SimulationProfile::Standard, &mut canvas)
        .unwrap();
    assert_eq!((report.start, report.stop), (5.0, 10.0));
    assert_eq!(report.restarts.len(), 3);

    assert_eq!(split.session().previous_final_time, 10.0);
    for name in whole.states().names() {
        let expected = whole.states().get(name).unwrap();
        let actual = split.states().get(name).unwrap();
        assert!(
            (expected - actual).abs() < TOLERANCE,
            "{name}: uninterrupted {expected}, split {actual}"
        );
    }
}

#[test]
fn test_continued_results_start_at_previous_end() {
    let mut canvas = RecordingCanvas::default();
    let mut controller = batch_controller().unwrap();
    controller
        .run(RunMode::Initial, Some(2.0), SimulationProfile::Fast, &mut canvas)
        .unwrap();
    controller
        .run(RunMode::Continued, Some(1.0), SimulationProfile::Fast, &mut canvas)
        .unwrap();

    let latest = controller.diagrams().latest().unwrap();
    assert_eq!(latest.time().first(), Some(&2.0));
    assert_eq!(latest.time().last(), Some(&3.0));
    assert_eq!(controller.model().time(), 3.0);
    assert_eq!(controller.session().time_cursor, 3.0);
    // three curves per run in the time series layout
    assert_eq!(canvas.plots().len(), 6);
}

#[test]
fn test_oversized_window_fails_without_side_effects() {
    let mut canvas = RecordingCanvas::default();
    let mut controller = batch_controller().unwrap();
    controller
        .run(RunMode::Initial, Some(1.0), SimulationProfile::Fast, &mut canvas)
        .unwrap();
    let states_before = controller.states().clone();
    let session_before = *controller.session();

    let err = controller
        .run(RunMode::Continued, Some(1e18), SimulationProfile::Standard, &mut canvas)
        .unwrap_err();
    assert!(matches!(err, ExploreError::Engine(ModelError::SolverFailed { .. })));
    assert_eq!(controller.states(), &states_before);
    assert_eq!(controller.session(), &session_before);
}
