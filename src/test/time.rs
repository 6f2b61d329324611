use std::time::Duration;

use crate::time::{Clock, Deadline, ManualClock, ScaledClock, Timestamp};

#[test]
fn timestamp_conversions() {
    assert_eq!(Timestamp::from_micros(3).0, 3_000);
    assert_eq!(Timestamp::from_millis(2).0, 2_000_000);
    assert_eq!(Timestamp::from_secs(1).0, 1_000_000_000);
    assert_eq!(
        Timestamp::from_duration(Duration::from_millis(1500)),
        Timestamp::from_millis(1500)
    );
    assert_eq!(Timestamp::from_secs(2).as_secs_f64(), 2.0);
}

#[test]
fn since_saturates_at_zero() {
    let early = Timestamp::from_millis(5);
    let late = Timestamp::from_millis(8);
    assert_eq!(late.since(early), Duration::from_millis(3));
    assert_eq!(early.since(late), Duration::ZERO);
}

#[test]
fn deadline_tracks_manual_clock() {
    let clock = ManualClock::new();
    let deadline = Deadline::after(&clock, Duration::from_secs(1));
    assert_eq!(deadline.at(), Timestamp::from_secs(1));
    assert_eq!(deadline.at().since(clock.now()), Duration::from_secs(1));

    clock.sleep(Duration::from_millis(400));
    assert_eq!(deadline.at().since(clock.now()), Duration::from_millis(600));

    clock.sleep(Duration::from_millis(600));
    assert!(clock.now() >= deadline.at());
    assert_eq!(deadline.at().since(clock.now()), Duration::ZERO);
}

#[test]
fn scaled_clock_runs_ahead_of_wall_time() {
    let clock = ScaledClock::start(50);
    let wall = std::time::Instant::now();
    clock.sleep(Duration::from_millis(500));
    // 500 virtual ms is ~10 real ms
    assert!(wall.elapsed() < Duration::from_millis(400));
    assert!(clock.now() >= Timestamp::from_millis(500));
}
