// Playback timeline for the output device
//
// Holds every scheduled unit with its start frame, sums the overlapping ones
// into each rendered period, adds the keep-alive tone while it is enabled and
// reports the units that ran to completion. Position is counted in frames and
// only moves forward when a period is rendered, so it doubles as the device
// clock.

use std::f32::consts::TAU;
use std::sync::Arc;

use super::device::UnitId;

struct ScheduledUnit {
    id: UnitId,
    start_frame: u64,
    samples: Arc<[f32]>,
}

impl ScheduledUnit {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

struct KeepAliveTone {
    phase: f32,
    step: f32,
    amplitude: f32,
}

pub struct Timeline {
    position: u64,
    units: Vec<ScheduledUnit>,
    tone: KeepAliveTone,
    tone_enabled: bool,
}

impl Timeline {
    pub fn new(sample_rate: u32, tone_frequency: f32, tone_amplitude: f32) -> Self {
        Self {
            position: 0,
            units: Vec::new(),
            tone: KeepAliveTone {
                phase: 0.0,
                step: TAU * tone_frequency / sample_rate as f32,
                amplitude: tone_amplitude,
            },
            tone_enabled: false,
        }
    }

    /// Frames rendered so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Earliest frame a unit scheduled before the next period boundary can
    /// start at. A command that misses this boundary lands on the one after,
    /// which is exactly where the current period ends.
    pub fn commit_horizon(&self, period: usize) -> u64 {
        self.position + period as u64
    }

    /// Add a unit. A start already behind the render position begins now.
    pub fn schedule(&mut self, id: UnitId, start_frame: u64, samples: Arc<[f32]>) {
        let start_frame = start_frame.max(self.position);
        self.units.push(ScheduledUnit {
            id,
            start_frame,
            samples,
        });
    }

    /// Drop a unit immediately. Returns false if it was not (or no longer) scheduled.
    pub fn stop(&mut self, id: UnitId) -> bool {
        let before = self.units.len();
        self.units.retain(|u| u.id != id);
        self.units.len() != before
    }

    pub fn set_tone(&mut self, enabled: bool) {
        self.tone_enabled = enabled;
    }

    pub fn active_units(&self) -> usize {
        self.units.len()
    }

    /// Render the next `out.len()` mono frames and advance the position.
    /// Returns the ids of units that ended inside this period.
    pub fn render(&mut self, out: &mut [f32]) -> Vec<UnitId> {
        out.fill(0.0);
        let period_start = self.position;
        let period_end = period_start + out.len() as u64;

        for unit in &self.units {
            if unit.start_frame >= period_end || unit.end_frame() <= period_start {
                continue;
            }
            let from = unit.start_frame.max(period_start);
            let to = unit.end_frame().min(period_end);
            for frame in from..to {
                let src = (frame - unit.start_frame) as usize;
                let dst = (frame - period_start) as usize;
                out[dst] += unit.samples[src];
            }
        }

        if self.tone_enabled {
            for sample in out.iter_mut() {
                *sample += self.tone.amplitude * self.tone.phase.sin();
                self.tone.phase = (self.tone.phase + self.tone.step) % TAU;
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.position = period_end;

        let mut finished = Vec::new();
        self.units.retain(|u| {
            if u.end_frame() <= period_end {
                finished.push(u.id);
                false
            } else {
                true
            }
        });
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(value: f32, len: usize) -> Arc<[f32]> {
        vec![value; len].into()
    }

    #[test]
    fn test_back_to_back_units_leave_no_gap() {
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        timeline.schedule(1, 0, unit(0.25, 4));
        timeline.schedule(2, 4, unit(0.5, 4));

        let mut out = [0.0f32; 8];
        let finished = timeline.render(&mut out);

        assert_eq!(out, [0.25, 0.25, 0.25, 0.25, 0.5, 0.5, 0.5, 0.5]);
        assert_eq!(finished, vec![1, 2]);
        assert_eq!(timeline.position(), 8);
    }

    #[test]
    fn test_unit_spanning_periods_finishes_once() {
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        timeline.schedule(7, 2, unit(0.1, 6));

        let mut out = [0.0f32; 4];
        assert!(timeline.render(&mut out).is_empty());
        assert_eq!(out, [0.0, 0.0, 0.1, 0.1]);

        assert_eq!(timeline.render(&mut out), vec![7]);
        assert_eq!(out, [0.1, 0.1, 0.1, 0.1]);
        assert_eq!(timeline.active_units(), 0);
    }

    #[test]
    fn test_late_start_snaps_to_position() {
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        let mut out = [0.0f32; 4];
        timeline.render(&mut out);

        timeline.schedule(3, 0, unit(0.2, 2));
        timeline.render(&mut out);
        assert_eq!(out, [0.2, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_stopped_unit_is_silent_and_not_reported() {
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        timeline.schedule(9, 0, unit(0.3, 10));
        let mut out = [0.0f32; 4];
        timeline.render(&mut out);

        assert!(timeline.stop(9));
        assert!(!timeline.stop(9));
        assert!(timeline.render(&mut out).is_empty());
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_overlap_is_clamped() {
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        timeline.schedule(1, 0, unit(0.8, 2));
        timeline.schedule(2, 0, unit(0.8, 2));
        let mut out = [0.0f32; 2];
        timeline.render(&mut out);
        assert_eq!(out, [1.0, 1.0]);
    }

    #[test]
    fn test_units_chained_from_published_clock_never_overlap() {
        const PERIOD: usize = 100;
        let mut timeline = Timeline::new(1000, 40.0, 0.0);
        let mut out = [0.0f32; PERIOD];
        let mut played = Vec::new();
        let mut pending: Vec<(UnitId, u64, Arc<[f32]>)> = Vec::new();

        // Same order as the playback thread: publish, apply, render, write.
        for period in 0..10 {
            let clock = timeline.commit_horizon(PERIOD);
            for (id, start, samples) in pending.drain(..) {
                timeline.schedule(id, start, samples);
            }
            timeline.render(&mut out);
            played.extend_from_slice(&out);

            if period == 2 {
                // Two fragments decoded while the device is blocked writing.
                pending.push((1, clock, unit(0.25, 300)));
                pending.push((2, clock + 300, unit(0.5, 300)));
            }
        }

        assert!(played[..300].iter().all(|s| *s == 0.0));
        assert!(played[300..600].iter().all(|s| *s == 0.25));
        assert!(played[600..900].iter().all(|s| *s == 0.5));
        assert!(played[900..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_keep_alive_tone_is_near_silent() {
        let mut timeline = Timeline::new(24000, 40.0, 0.0005);
        timeline.set_tone(true);
        let mut out = [0.0f32; 1200];
        timeline.render(&mut out);

        assert!(out.iter().any(|s| *s != 0.0));
        assert!(out.iter().all(|s| s.abs() <= 0.0005));
    }
}
