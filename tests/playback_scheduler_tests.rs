// Scheduling properties of the playback cursor and live set.

mod common;

use common::{approx, FakeOutput, Shared, OUTPUT_RATE};
use live_voice_rs::audio::device::AudioOutput;
use live_voice_rs::playback::PlaybackScheduler;

fn fake_output(shared: &Shared) -> Box<dyn AudioOutput> {
    Box::new(FakeOutput::new(shared.clone()))
}

fn samples(seconds: f64) -> Vec<f32> {
    vec![0.1; (seconds * OUTPUT_RATE as f64).round() as usize]
}

fn armed() -> PlaybackScheduler {
    let mut scheduler = PlaybackScheduler::new(OUTPUT_RATE);
    scheduler.arm();
    scheduler
}

#[test]
fn test_units_chain_gaplessly_while_clock_is_behind() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    let durations = [0.25, 0.5, 0.125, 1.0];
    for d in durations {
        let ticket = scheduler.ticket();
        assert!(scheduler.enqueue(ticket, samples(d), output.as_mut()).is_some());
    }

    let starts: Vec<f64> = shared.lock().scheduled.iter().map(|s| s.start).collect();
    let mut expected = 0.0;
    for (start, d) in starts.iter().zip(durations) {
        assert!(approx(*start, expected), "start {} != {}", start, expected);
        expected += d;
    }
    assert!(approx(scheduler.next_start_time(), expected));
    assert_eq!(scheduler.live_count(), durations.len());
}

#[test]
fn test_late_fragment_snaps_forward_to_now() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    let ticket = scheduler.ticket();
    scheduler.enqueue(ticket, samples(0.5), output.as_mut());

    // The device played past the cursor before the next fragment arrived.
    shared.set_clock(0.9);
    let ticket = scheduler.ticket();
    scheduler.enqueue(ticket, samples(0.5), output.as_mut());

    let last = shared.lock().scheduled.last().cloned().unwrap();
    assert!(approx(last.start, 0.9));
    assert!(approx(scheduler.next_start_time(), 1.4));
}

#[test]
fn test_interrupt_clears_everything_regardless_of_backlog() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    for _ in 0..5 {
        let ticket = scheduler.ticket();
        scheduler.enqueue(ticket, samples(0.2), output.as_mut());
    }
    assert!(scheduler.is_remote_speaking());

    scheduler.interrupt(Some(output.as_mut()));

    assert_eq!(shared.lock().stopped.len(), 5);
    assert_eq!(scheduler.live_count(), 0);
    assert!(!scheduler.is_remote_speaking());
    assert!(approx(scheduler.next_start_time(), 0.0));
    assert!(scheduler.is_armed(), "interruption keeps the session playing");
}

#[test]
fn test_decode_ticket_from_before_interrupt_is_discarded() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    let stale = scheduler.ticket();
    scheduler.interrupt(Some(output.as_mut()));

    assert!(!scheduler.is_current(stale));
    assert!(scheduler.enqueue(stale, samples(0.5), output.as_mut()).is_none());
    assert!(shared.lock().scheduled.is_empty());
    assert!(!scheduler.is_remote_speaking());
}

#[test]
fn test_unarmed_scheduler_rejects_fragments() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = PlaybackScheduler::new(OUTPUT_RATE);

    let ticket = scheduler.ticket();
    assert!(scheduler.enqueue(ticket, samples(0.5), output.as_mut()).is_none());

    scheduler.arm();
    scheduler.reset(Some(output.as_mut()));
    let ticket = scheduler.ticket();
    assert!(scheduler.enqueue(ticket, samples(0.5), output.as_mut()).is_none());
}

#[test]
fn test_finish_notifications_for_unknown_units_are_ignored() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    let ticket = scheduler.ticket();
    let a = scheduler.enqueue(ticket, samples(0.5), output.as_mut()).unwrap();
    let b = scheduler.enqueue(ticket, samples(0.5), output.as_mut()).unwrap();

    assert!(!scheduler.on_unit_finished(9999));
    assert!(!scheduler.on_unit_finished(a));
    assert!(!scheduler.on_unit_finished(a));
    assert!(scheduler.on_unit_finished(b));
    assert!(!scheduler.is_remote_speaking());
}

#[test]
fn test_interrupt_without_output_still_resets_bookkeeping() {
    let shared = Shared::default();
    let mut output = fake_output(&shared);
    let mut scheduler = armed();

    let ticket = scheduler.ticket();
    scheduler.enqueue(ticket, samples(0.5), output.as_mut());

    scheduler.interrupt(None);
    assert_eq!(scheduler.live_count(), 0);
    assert!(approx(scheduler.next_start_time(), 0.0));
    assert!(shared.lock().stopped.is_empty());
}
