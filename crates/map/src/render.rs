//! Render phase: turn an aligned event list into a type-0 Standard MIDI
//! File, tempo events bracketed by a note-on/note-off sentinel frame.

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::{AlignedEvent, TempoMapError, TICKS_PER_BEAT};
use tempoline_core::{linspace, spb};

const EPS: f64 = 1e-9;
/// Sentinel note used purely to keep the track non-empty of MIDI channel
/// messages; no musical meaning.
const SENTINEL_NOTE: u8 = 60;
const SENTINEL_TAIL_TICKS: u32 = 1;

pub fn render_smf(aligned: &[AlignedEvent], align_beats: f64) -> Result<Vec<u8>, TempoMapError> {
    if aligned.is_empty() {
        return Err(TempoMapError::EmptySequence);
    }

    let schedule = build_schedule(aligned, align_beats);
    let track = build_track(&schedule);

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(u15::from(TICKS_PER_BEAT)),
    };

    let mut bytes = Vec::new();
    Smf {
        header,
        tracks: vec![track],
    }
    .write_std(&mut bytes)?;
    Ok(bytes)
}

/// Absolute (beat, bpm) schedule: one entry per instant the tempo takes
/// effect. Horizontal/vertical segments between consecutive aligned events
/// contribute their endpoint only; sloped segments expand into a
/// whole-cell staircase sampled the same way `TimelineEngine`'s DAW mode
/// samples them, so the emitted tempo map matches the engine's own
/// playback model cell-for-cell.
fn build_schedule(aligned: &[AlignedEvent], align_beats: f64) -> Vec<(f64, f64)> {
    let mut schedule = vec![(aligned[0].beat, aligned[0].bpm)];

    for pair in aligned.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let interval = b.beat - a.beat;

        if interval <= EPS || (a.bpm - b.bpm).abs() < EPS {
            schedule.push((b.beat, b.bpm));
            continue;
        }

        let steps = (interval / align_beats).floor() as usize;
        if steps == 0 {
            schedule.push((b.beat, b.bpm));
            continue;
        }

        let samples = linspace(a.bpm, b.bpm, steps + 1);
        for (k, bpm) in samples.iter().enumerate().take(steps) {
            schedule.push((a.beat + k as f64 * align_beats, *bpm));
        }
        // Closes both the last full cell and any unaligned remainder: the
        // reference behavior carries the segment's final BPM through to
        // `b.beat` rather than computing another partial sample.
        schedule.push((b.beat, b.bpm));
    }

    dedup_consecutive_bpm(schedule)
}

fn dedup_consecutive_bpm(schedule: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(schedule.len());
    for (beat, bpm) in schedule {
        match out.last() {
            Some(&(_, last_bpm)) if (last_bpm - bpm).abs() < EPS => continue,
            _ => out.push((beat, bpm)),
        }
    }
    out
}

fn build_track(schedule: &[(f64, f64)]) -> Vec<TrackEvent<'static>> {
    let mut events = Vec::with_capacity(schedule.len() + 3);

    events.push(TrackEvent {
        delta: u28::from(0u32),
        kind: TrackEventKind::Midi {
            channel: u4::from(0),
            message: MidiMessage::NoteOn {
                key: u7::from(SENTINEL_NOTE),
                vel: u7::from(0),
            },
        },
    });

    let mut prev_tick: u32 = 0;
    for (i, &(beat, bpm)) in schedule.iter().enumerate() {
        let tick = beats_to_ticks(beat);
        let delta = if i == 0 { 0 } else { tick.saturating_sub(prev_tick) };
        events.push(TrackEvent {
            delta: u28::from(delta),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(micros_per_quarter(bpm)))),
        });
        prev_tick = tick;
    }

    events.push(TrackEvent {
        delta: u28::from(SENTINEL_TAIL_TICKS),
        kind: TrackEventKind::Midi {
            channel: u4::from(0),
            message: MidiMessage::NoteOff {
                key: u7::from(SENTINEL_NOTE),
                vel: u7::from(0),
            },
        },
    });
    events.push(TrackEvent {
        delta: u28::from(0u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    events
}

fn beats_to_ticks(beat: f64) -> u32 {
    (beat * TICKS_PER_BEAT as f64).round().max(0.0) as u32
}

fn micros_per_quarter(bpm: f64) -> u32 {
    (60_000_000.0 / bpm).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align_phase;
    use tempoline_core::TempoPoint;

    #[test]
    fn horizontal_segment_uses_spb_not_staircase() {
        // sanity: spb(bpm) still matches the engine's math for a constant
        // tempo, even though the map emitter never calls it directly
        // (tempo, not elapsed time, is what's emitted here).
        assert_eq!(spb(120.0), 0.5);
    }

    #[test]
    fn single_point_schedule_is_one_entry() {
        let aligned = vec![AlignedEvent { beat: 0.0, bpm: 120.0 }];
        let schedule = build_schedule(&aligned, 0.25);
        assert_eq!(schedule, vec![(0.0, 120.0)]);
    }

    #[test]
    fn sloped_segment_staircases_between_endpoints() {
        let aligned = vec![
            AlignedEvent { beat: 0.0, bpm: 60.0 },
            AlignedEvent { beat: 1.0, bpm: 120.0 },
        ];
        let schedule = build_schedule(&aligned, 0.25);
        assert!(schedule.len() > 2);
        assert_eq!(schedule.first().unwrap().1, 60.0);
        assert_eq!(schedule.last().unwrap().1, 120.0);
        for w in schedule.windows(2) {
            assert!(w[1].0 >= w[0].0);
        }
    }

    #[test]
    fn full_pipeline_produces_monotonic_ticks() {
        let mut points = vec![
            TempoPoint::new(0.0, 90.0),
            TempoPoint::new(4.0, 90.0),
            TempoPoint::new(8.0, 150.0),
        ];
        let engine = tempoline_core::TimelineEngine::new(16, false);
        engine.resolve_cache(&mut points);

        let aligned = align_phase(&points, 0.25);
        let schedule = build_schedule(&aligned, 0.25);
        let mut last_tick = 0u32;
        for &(beat, _) in &schedule {
            let tick = beats_to_ticks(beat);
            assert!(tick >= last_tick);
            last_tick = tick;
        }
    }
}
