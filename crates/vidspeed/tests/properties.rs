//! Property-based tests for the speed controller
//!
//! Arbitrary command sequences against a one-video page must keep the
//! ladder invariants intact.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use tokio::sync::broadcast;
use vidspeed::page::{MAX_RATE, MIN_RATE};
use vidspeed::{
    Command, MediaElement, Outcome, ReportSink, SimulatedMedia, SimulatedPage, SpeedController,
    SpeedLadder, StatusReport, SPEED_LEVELS,
};

// ===== Strategy definitions =====

/// Any rate a media element accepts
fn rate_strategy() -> impl Strategy<Value = f64> {
    MIN_RATE..=MAX_RATE
}

/// Any command the controller understands
fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::SpeedUp),
        Just(Command::SpeedDown),
        Just(Command::SpeedReset),
        Just(Command::CheckVideo),
        rate_strategy().prop_map(Command::SetSpeed),
    ]
}

fn step_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::SpeedUp),
        Just(Command::SpeedDown),
        Just(Command::SpeedReset),
    ]
}

struct Fixture {
    controller: SpeedController<SimulatedPage>,
    media: SimulatedMedia,
    reports: broadcast::Receiver<StatusReport>,
}

fn fixture() -> Fixture {
    let page = SimulatedPage::new("https://www.bilibili.com/video/prop");
    let media = page.add_media(SimulatedMedia::paused_at(0.0));
    let (tx, reports) = broadcast::channel(256);
    Fixture {
        controller: SpeedController::new(page, ReportSink::new(tx)),
        media,
        reports,
    }
}

fn drain(reports: &mut broadcast::Receiver<StatusReport>) -> Vec<StatusReport> {
    std::iter::from_fn(|| reports.try_recv().ok()).collect()
}

fn drive_to(fixture: &mut Fixture, index: usize) {
    fixture.controller.apply_command(Command::SpeedReset);
    let ladder = SpeedLadder::standard();
    while fixture.controller.current_index() < index {
        fixture.controller.apply_command(Command::SpeedUp);
    }
    while fixture.controller.current_index() > index {
        fixture.controller.apply_command(Command::SpeedDown);
    }
    assert_eq!(fixture.controller.current_speed(), ladder.get(index).unwrap());
}

proptest! {
    /// Speed-up at the top of the ladder changes nothing and reports nothing
    #[test]
    fn prop_speed_up_at_top_is_a_limit(start in 0..SPEED_LEVELS.len()) {
        let mut f = fixture();
        drive_to(&mut f, start);
        let top = SPEED_LEVELS.len() - 1;
        drive_to(&mut f, top);
        drain(&mut f.reports);

        let outcome = f.controller.apply_command(Command::SpeedUp);

        prop_assert!(matches!(outcome, Outcome::LimitReached { .. }), "expected Outcome::LimitReached");
        prop_assert_eq!(f.controller.current_index(), top);
        prop_assert!(drain(&mut f.reports).is_empty());
        prop_assert_eq!(
            f.controller.current_advisory().map(|a| a.text.clone()),
            Some("Maximum playback speed reached".to_string())
        );
    }

    /// Speed-down at the bottom is symmetric
    #[test]
    fn prop_speed_down_at_bottom_is_a_limit(start in 0..SPEED_LEVELS.len()) {
        let mut f = fixture();
        drive_to(&mut f, start);
        drive_to(&mut f, 0);
        drain(&mut f.reports);

        let outcome = f.controller.apply_command(Command::SpeedDown);

        prop_assert!(matches!(outcome, Outcome::LimitReached { .. }), "expected Outcome::LimitReached");
        prop_assert_eq!(f.controller.current_index(), 0);
        prop_assert!(drain(&mut f.reports).is_empty());
    }

    /// Reset always lands on normal speed
    #[test]
    fn prop_reset_always_normal(commands in prop::collection::vec(command_strategy(), 0..30)) {
        let mut f = fixture();
        for command in commands {
            f.controller.apply_command(command);
        }
        f.controller.apply_command(Command::SpeedReset);
        prop_assert_eq!(f.controller.current_speed(), 1.0);
        prop_assert_eq!(f.controller.current_index(), 3);
        prop_assert_eq!(f.media.playback_rate(), 1.0);
    }

    /// Step commands keep speed and ladder position in sync
    #[test]
    fn prop_steps_stay_on_ladder(commands in prop::collection::vec(step_strategy(), 1..40)) {
        let mut f = fixture();
        for command in commands {
            f.controller.apply_command(command);
            let state = f.controller.state();
            prop_assert_eq!(state.current_speed, SPEED_LEVELS[state.current_index]);
        }
    }

    /// set-speed applies any accepted rate and leaves the ladder position alone
    #[test]
    fn prop_set_speed_keeps_index(
        steps in prop::collection::vec(step_strategy(), 0..10),
        rate in rate_strategy(),
    ) {
        let mut f = fixture();
        for command in steps {
            f.controller.apply_command(command);
        }
        let index = f.controller.current_index();

        let outcome = f.controller.apply_command(Command::SetSpeed(rate));

        prop_assert_eq!(outcome, Outcome::Applied { speed: rate });
        prop_assert_eq!(f.controller.current_speed(), rate);
        prop_assert_eq!(f.controller.current_index(), index);

        let expected = SPEED_LEVELS.get(index + 1).copied();
        let next = f.controller.apply_command(Command::SpeedUp);
        match expected {
            Some(speed) => prop_assert_eq!(next, Outcome::Applied { speed }),
            None => prop_assert!(matches!(next, Outcome::LimitReached { .. }), "expected Outcome::LimitReached"),
        }
    }

    /// check-video reports the rate last applied to the element
    #[test]
    fn prop_check_video_roundtrip(commands in prop::collection::vec(command_strategy(), 0..20)) {
        let mut f = fixture();
        for command in commands {
            f.controller.apply_command(command);
        }
        match f.controller.apply_command(Command::CheckVideo) {
            Outcome::Detected(snapshot) => {
                prop_assert_eq!(snapshot.speed, f.media.playback_rate());
                prop_assert_eq!(snapshot.speed, f.controller.current_speed());
            }
            other => prop_assert!(false, "unexpected outcome {other:?}"),
        }
    }
}
