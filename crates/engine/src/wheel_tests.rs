// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn wheel(tick_ms: u64, wheel_size: usize) -> TimerWheel<&'static str> {
    TimerWheel::new(TimerWheelConfig { tick_ms, wheel_size })
}

#[test]
fn fires_after_delay_elapses() {
    let mut w = wheel(10, 64);
    w.add_timeout("t1", 50, "payload");
    assert_eq!(w.len(), 1);

    // 4 ticks: 40ms, not yet due.
    for _ in 0..4 {
        assert!(w.tick().is_empty());
    }
    // 5th tick: due.
    let due = w.tick();
    assert_eq!(due, vec![("t1".to_string(), "payload")]);
    assert!(w.is_empty());
}

#[test]
fn zero_delay_fires_at_earliest_tick() {
    let mut w = wheel(10, 64);
    w.add_timeout("t0", 0, "now");
    let due = w.tick();
    assert_eq!(due.len(), 1);
}

#[test]
fn delay_rounds_up_to_next_tick() {
    let mut w = wheel(10, 64);
    w.add_timeout("t", 11, "p");
    assert!(w.tick().is_empty()); // 10ms
    assert_eq!(w.tick().len(), 1); // 20ms
}

#[test]
fn cancel_prevents_firing() {
    let mut w = wheel(10, 64);
    w.add_timeout("t1", 30, "p");
    assert_eq!(w.remove_timeout("t1"), Some("p"));
    assert!(w.advance(100).is_empty());
    assert!(w.is_empty());
}

#[test]
fn cancel_unknown_is_none() {
    let mut w = wheel(10, 64);
    assert_eq!(w.remove_timeout("ghost"), None);
}

#[test]
fn rescheduling_same_id_replaces_the_task() {
    let mut w = wheel(10, 64);
    w.add_timeout("t", 20, "first");
    w.add_timeout("t", 60, "second");
    assert_eq!(w.len(), 1);

    assert!(w.advance(30).is_empty(), "old deadline must not fire");
    let due = w.advance(40);
    assert_eq!(due, vec![("t".to_string(), "second")]);
}

#[test]
fn multi_lap_tasks_wait_their_laps() {
    // Wheel covers 8 ticks of 10ms; a 250ms task needs 3 laps.
    let mut w = wheel(10, 8);
    w.add_timeout("long", 250, "p");

    assert!(w.advance(240).is_empty());
    let due = w.advance(20);
    assert_eq!(due.len(), 1);
}

#[test]
fn many_tasks_fire_in_their_own_ticks() {
    let mut w = wheel(10, 16);
    w.add_timeout("a", 10, "a");
    w.add_timeout("b", 20, "b");
    w.add_timeout("c", 30, "c");

    assert_eq!(w.tick(), vec![("a".to_string(), "a")]);
    assert_eq!(w.tick(), vec![("b".to_string(), "b")]);
    assert_eq!(w.tick(), vec![("c".to_string(), "c")]);
}

#[test]
fn contains_tracks_liveness() {
    let mut w = wheel(10, 16);
    w.add_timeout("t", 10, "p");
    assert!(w.contains("t"));
    w.tick();
    assert!(!w.contains("t"));
}
