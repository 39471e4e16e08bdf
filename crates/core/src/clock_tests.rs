// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_elapsed_tracks_advance() {
    let clock = FakeClock::new();
    let created = clock.now();
    assert_eq!(clock.elapsed_since(created), Duration::ZERO);

    clock.advance(Duration::from_secs(6));
    assert_eq!(clock.elapsed_since(created), Duration::from_secs(6));
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    let created = clock.now();
    other.advance(Duration::from_secs(30));
    assert_eq!(clock.elapsed_since(created), Duration::from_secs(30));
}

#[test]
fn elapsed_since_future_instant_is_zero() {
    let clock = FakeClock::new();
    let future = clock.now() + Duration::from_secs(10);
    assert_eq!(clock.elapsed_since(future), Duration::ZERO);
}

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let start = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(clock.elapsed_since(start) > Duration::ZERO);
}
