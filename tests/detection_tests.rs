//! Unit tests for the fixed-length detection window.

#[allow(dead_code)]
#[path = "../src/cooldown.rs"]
mod cooldown;
#[path = "../src/token.rs"]
mod token;
#[path = "../src/detection.rs"]
mod detection;

use detection::{
    chase_interval_ms, DetectionWindow, WindowState, CHASE_FAST_MS, CHASE_SLOW_MS,
    DETECTION_WINDOW_MS,
};

// ============================================================================
// Tests for window lifecycle
// ============================================================================

#[test]
fn test_new_window_is_idle() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(DETECTION_WINDOW_MS);
    assert_eq!(window.state(), WindowState::Idle);
    assert!(!window.wants_read());
    assert!(!window.step(0));
}

#[test]
fn test_window_runs_full_duration() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    window.start(1_000);
    assert!(window.step(1_000));
    assert!(window.step(3_999));
    assert!(!window.step(4_000));
    assert_eq!(window.state(), WindowState::Complete);
}

#[test]
fn test_capture_does_not_end_window() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    window.start(0);
    window.offer(0x27CB_1805);
    assert_eq!(window.captured(), 0x27CB_1805);
    // Still running until the full duration passes
    assert!(window.step(2_999));
    assert!(!window.wants_read());
    assert!(!window.step(3_000));
    assert_eq!(window.captured(), 0x27CB_1805);
}

#[test]
fn test_first_non_zero_read_wins() {
    let mut window: DetectionWindow<u32> = DetectionWindow::new(3_000);
    window.start(0);
    window.offer(0);
    window.offer(0);
    window.offer(22171);
    window.offer(20451);
    assert_eq!(window.captured(), 22171);
    assert_eq!(window.attempts(), 3);
}

#[test]
fn test_no_read_leaves_none() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    window.start(0);
    for t in (0..3_000).step_by(10) {
        assert!(window.step(t));
        window.offer(0);
    }
    assert!(!window.step(3_000));
    assert_eq!(window.captured(), 0);
    assert_eq!(window.attempts(), 300);
}

#[test]
fn test_restart_resets_capture() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    window.start(0);
    window.offer(5);
    window.step(3_000);
    window.start(10_000);
    assert_eq!(window.captured(), 0);
    assert_eq!(window.attempts(), 0);
    assert!(window.wants_read());
}

#[test]
fn test_window_across_counter_wrap() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    let start = u32::MAX - 1_000;
    window.start(start);
    assert!(window.step(500));
    assert_eq!(window.elapsed(500), 1_501);
    assert!(!window.step(2_000));
}

// ============================================================================
// Tests for chase speed
// ============================================================================

#[test]
fn test_chase_interval_endpoints() {
    assert_eq!(chase_interval_ms(0, 3_000), CHASE_SLOW_MS);
    assert_eq!(chase_interval_ms(3_000, 3_000), CHASE_FAST_MS);
    assert_eq!(chase_interval_ms(10_000, 3_000), CHASE_FAST_MS);
}

#[test]
fn test_chase_interval_midpoint() {
    // 150 -> 10 over the window, halfway is 80
    assert_eq!(chase_interval_ms(1_500, 3_000), 80);
}

#[test]
fn test_chase_interval_never_increases() {
    let mut previous = CHASE_SLOW_MS;
    for elapsed in (0..=3_000).step_by(25) {
        let interval = chase_interval_ms(elapsed, 3_000);
        assert!(interval <= previous);
        assert!(interval >= CHASE_FAST_MS);
        previous = interval;
    }
}

#[test]
fn test_chase_interval_zero_duration() {
    assert_eq!(chase_interval_ms(0, 0), CHASE_FAST_MS);
}

#[test]
fn test_window_chase_interval_tracks_elapsed() {
    let mut window: DetectionWindow<u64> = DetectionWindow::new(3_000);
    window.start(100);
    assert_eq!(window.chase_interval(100), CHASE_SLOW_MS);
    assert_eq!(window.chase_interval(1_600), 80);
}
