//! Beat -> real-time evaluation, in both theoretical and DAW-quantized modes.

use crate::error::EngineError;
use crate::math::{alignment_window, linspace, spb, theoretical_segment_elapsed};
use crate::model::{Marker, TempoPoint};

/// Converts beat positions into real-world seconds given a sequence of
/// tempo-automation points.
///
/// `resolve_cache` must be called once on a project's automation list before
/// `beat_to_real_time`/`resolve_markers` are used, unless the list has 0 or 1
/// points (the fast path never consults the cache). This mirrors the
/// reference implementation's "fill the whole cache on first use, then treat
/// it as read-only" pattern without needing interior mutability: the parser
/// calls `resolve_cache` once while it still owns `&mut Project`, and the
/// `Project` is immutable to callers after that.
#[derive(Debug, Clone, Copy)]
pub struct TimelineEngine {
    tempo_quant: u32,
    theoretical: bool,
}

impl TimelineEngine {
    pub fn new(tempo_quant: u32, theoretical: bool) -> Self {
        Self {
            tempo_quant,
            theoretical,
        }
    }

    /// Forward-accumulates `real_time` (and, in DAW mode, `prev_aligned_bpm`)
    /// across the whole automation list.
    pub fn resolve_cache(&self, points: &mut [TempoPoint]) {
        if points.is_empty() {
            return;
        }
        points[0].real_time = Some(0.0);

        for i in 1..points.len() {
            let beat = points[i].beat;
            if beat <= 0.0 {
                // The mysterious Ableton sentinel point; always clamps to 0.
                points[i].real_time = Some(0.0);
                continue;
            }

            let first_beat = points[i - 1].beat;
            let first_bpm = points[i - 1].bpm;
            let first_prev_aligned = points[i - 1].prev_aligned_bpm;
            let second_bpm = points[i].bpm;

            let (elapsed, second_prev_aligned) =
                self.segment_elapsed(first_beat, first_bpm, first_prev_aligned, beat, second_bpm);

            if let Some(spa) = second_prev_aligned {
                points[i].prev_aligned_bpm = Some(spa);
            }

            let prev_real_time = points[i - 1].real_time.unwrap_or(0.0);
            points[i].real_time = Some(prev_real_time + elapsed);
        }
    }

    /// Resolves a single beat to real-world seconds.
    pub fn beat_to_real_time(
        &self,
        points: &[TempoPoint],
        base_bpm: f64,
        beat: f64,
    ) -> Result<f64, EngineError> {
        if points.len() <= 1 {
            return Ok(beat * spb(base_bpm));
        }

        // The Ableton special case: the sentinel's own real_time is what
        // beat 0 resolves to, even though the sentinel's beat is negative.
        if beat == 0.0 && points[0].beat < 0.0 {
            return Ok(points[0].real_time.unwrap_or(0.0));
        }

        let n = points.len();
        let mut lo: i64 = 0;
        let mut hi: i64 = (n - 1) as i64;

        loop {
            if lo > hi {
                return Err(EngineError::InconsistentAutomation { beat });
            }
            let mid = ((lo + hi) / 2) as usize;
            let point = &points[mid];

            if beat == point.beat {
                return Ok(point.real_time.unwrap_or(0.0));
            }

            let at_last_event = mid >= n - 1;
            if at_last_event {
                return Ok(self.beat_real_time_from_events(beat, point, None));
            }

            let next = &points[mid + 1];
            if point.beat < beat && beat < next.beat {
                return Ok(self.beat_real_time_from_events(beat, point, Some(next)));
            }

            if beat > point.beat {
                lo = mid as i64 + 1;
            } else {
                hi = mid as i64 - 1;
            }
        }
    }

    /// Resolves every `(beat, text)` pair to a `Marker`, sorted by
    /// `real_time` ascending.
    pub fn resolve_markers(
        &self,
        points: &[TempoPoint],
        base_bpm: f64,
        raw: &[(f64, String)],
    ) -> Result<Vec<Marker>, EngineError> {
        let mut markers = Vec::with_capacity(raw.len());
        for (beat, text) in raw {
            let real_time = self.beat_to_real_time(points, base_bpm, *beat)?;
            markers.push(Marker::new(real_time, text.clone()));
        }
        markers.sort_by(|a, b| a.real_time.partial_cmp(&b.real_time).unwrap());
        Ok(markers)
    }

    fn beat_real_time_from_events(&self, beat: f64, first: &TempoPoint, second: Option<&TempoPoint>) -> f64 {
        let bpm = bpm_at_beat(beat, first.beat, first.bpm, second);
        let (elapsed, _) =
            self.segment_elapsed(first.beat, first.bpm, first.prev_aligned_bpm, beat, bpm);
        first.real_time.unwrap_or(0.0) + elapsed
    }

    fn segment_elapsed(
        &self,
        first_beat: f64,
        first_bpm: f64,
        first_prev_aligned: Option<f64>,
        second_beat: f64,
        second_bpm: f64,
    ) -> (f64, Option<f64>) {
        if self.theoretical {
            let domain = if first_beat <= 0.0 {
                second_beat
            } else {
                second_beat - first_beat
            };
            (theoretical_segment_elapsed(first_bpm, second_bpm, domain), None)
        } else {
            let (elapsed, second_prev_aligned) = self.daw_segment_elapsed(
                first_beat,
                first_bpm,
                first_prev_aligned.unwrap_or(first_bpm),
                second_beat,
                second_bpm,
            );
            (elapsed, Some(second_prev_aligned))
        }
    }

    fn daw_segment_elapsed(
        &self,
        first_beat: f64,
        first_bpm: f64,
        first_prev_aligned: f64,
        second_beat: f64,
        second_bpm: f64,
    ) -> (f64, f64) {
        let vertical = first_beat == second_beat;
        let horizontal = first_bpm == second_bpm;

        if vertical {
            return (0.0, first_prev_aligned);
        }
        if horizontal {
            self.daw_horizontal(first_beat, first_bpm, first_prev_aligned, second_beat)
        } else {
            self.daw_slope(
                first_beat,
                first_bpm,
                first_prev_aligned,
                second_beat,
                second_bpm,
            )
        }
    }

    fn align_beats(&self) -> f64 {
        4.0 / self.tempo_quant as f64
    }

    fn daw_horizontal(
        &self,
        first_beat: f64,
        first_bpm: f64,
        first_prev_aligned: f64,
        second_beat: f64,
    ) -> (f64, f64) {
        let start_beat = if first_beat <= 0.0 { 0.0 } else { first_beat };
        let end_beat = second_beat;
        let interval = end_beat - start_beat;
        let align = self.align_beats();

        if start_beat % align == 0.0 && end_beat % align == 0.0 {
            return (spb(first_bpm) * interval, first_bpm);
        }

        let (window_start, window_end) = alignment_window(start_beat, align);

        if start_beat == window_start {
            (spb(first_bpm) * interval, first_bpm)
        } else if end_beat <= window_end {
            (spb(first_prev_aligned) * interval, first_prev_aligned)
        } else {
            let first_interval = window_end - start_beat;
            let second_interval = end_beat - window_end;
            let elapsed = spb(first_prev_aligned) * first_interval + spb(first_bpm) * second_interval;
            (elapsed, first_bpm)
        }
    }

    fn daw_slope(
        &self,
        first_beat: f64,
        first_bpm: f64,
        first_prev_aligned: f64,
        second_beat: f64,
        second_bpm: f64,
    ) -> (f64, f64) {
        let start_beat = if first_beat <= 0.0 { 0.0 } else { first_beat };
        let end_beat = second_beat;
        let start_bpm = first_bpm;
        let end_bpm = second_bpm;
        let interval = end_beat - start_beat;
        let align = self.align_beats();

        if start_beat % align == 0.0 && end_beat % align == 0.0 {
            return (
                whole_cell_sum(start_bpm, end_bpm, interval, align),
                first_bpm,
            );
        }

        let (window_start, window_end) = alignment_window(start_beat, align);

        if start_beat == window_start {
            if end_beat < window_end {
                return (spb(first_bpm) * interval, first_bpm);
            }
            // else fall through to cross-window handling below
        } else if end_beat <= window_end {
            return (spb(first_prev_aligned) * interval, first_prev_aligned);
        }

        // Separate alignment windows.
        let end_diff = end_beat % align;
        let end_aligned = end_beat - end_diff;
        let start_diff = window_end - start_beat;
        let start_aligned = window_end;

        let calc_bpm = if start_beat % align != 0.0 {
            first_prev_aligned
        } else {
            start_bpm
        };

        let start_aligned_bpm = interpolate_bpm(start_aligned, first_beat, first_bpm, second_beat, second_bpm);
        let end_aligned_bpm = interpolate_bpm(end_aligned, first_beat, first_bpm, second_beat, second_bpm);

        let alignlen = end_aligned - start_aligned;
        let middle = whole_cell_sum(start_aligned_bpm, end_aligned_bpm, alignlen, align);
        let front = spb(calc_bpm) * start_diff;
        let back = spb(end_aligned_bpm) * end_diff;

        (front + middle + back, end_aligned_bpm)
    }
}

/// Whole-cell sum: partitions `[start_bpm, end_bpm]` into `n+1` evenly spaced
/// samples, drops the last, and sums `spb(sample) * align` over the rest.
fn whole_cell_sum(start_bpm: f64, end_bpm: f64, interval: f64, align: f64) -> f64 {
    let steps = (interval / align).floor() as usize;
    let samples = linspace(start_bpm, end_bpm, steps + 1);
    samples[..steps].iter().map(|bpm| spb(*bpm) * align).sum()
}

/// Linear interpolation between `(first_beat, first_bpm)` and
/// `(second_beat, second_bpm)`, used internally by the slope-segment
/// alignment math (operates on the unclamped beats, matching the reference
/// implementation exactly).
fn interpolate_bpm(beat: f64, first_beat: f64, first_bpm: f64, second_beat: f64, second_bpm: f64) -> f64 {
    if first_bpm == second_bpm {
        return first_bpm;
    }
    let slope = (second_bpm - first_bpm) / (second_beat - first_beat);
    first_bpm + slope * (beat - first_beat)
}

/// `bpm_at(beta, first, second)` from the spec: the BPM at an arbitrary beat
/// bracketed by `first` and an optional `second` (absent past the last
/// automation point, in which case the BPM holds constant).
fn bpm_at_beat(beat: f64, first_beat: f64, first_bpm: f64, second: Option<&TempoPoint>) -> f64 {
    match second {
        None => first_bpm,
        Some(second) => interpolate_bpm(beat, first_beat, first_bpm, second.beat, second.bpm),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(beat: f64, bpm: f64) -> TempoPoint {
        TempoPoint::new(beat, bpm)
    }

    #[test]
    fn fast_path_no_automation() {
        let engine = TimelineEngine::new(16, true);
        let points: Vec<TempoPoint> = vec![];
        let t = engine.beat_to_real_time(&points, 120.0, 240.0).unwrap();
        assert_eq!(t, 120.0);
    }

    #[test]
    fn fast_path_single_synthetic_point() {
        let engine = TimelineEngine::new(16, true);
        let points = vec![pt(0.0, 120.0)];
        let t = engine.beat_to_real_time(&points, 120.0, 240.0).unwrap();
        assert_eq!(t, 120.0);
    }

    #[test]
    fn theoretical_two_point_matches_closed_form() {
        let engine = TimelineEngine::new(16, true);
        let mut points = vec![pt(4.0, 60.0), pt(8.0, 120.0)];
        engine.resolve_cache(&mut points);
        let t = engine.beat_to_real_time(&points, 60.0, 8.0).unwrap();
        let expected = 4.0 + 60.0 * 2f64.ln() / 15.0;
        assert!((t - expected).abs() < 1e-9, "t={t} expected={expected}");
    }

    #[test]
    fn daw_two_point_reference_scenario() {
        // spec.md scenario 3: same two points, DAW mode, tempo_quant=16.
        let engine = TimelineEngine::new(16, false);
        let mut points = vec![pt(4.0, 60.0), pt(8.0, 120.0)];
        engine.resolve_cache(&mut points);
        let t = engine.beat_to_real_time(&points, 60.0, 8.0).unwrap();
        let expected = 6.772588722239782;
        assert!((t - expected).abs() < 1e-6, "t={t} expected={expected}");
    }

    #[test]
    fn daw_marker_mid_segment_binary_flp_scenario() {
        // spec.md scenario 4: binary project clip at beats 0 (60bpm), 4 (120bpm),
        // marker at beat 2, DAW mode.
        let engine = TimelineEngine::new(16, false);
        let mut points = vec![pt(0.0, 60.0), pt(4.0, 120.0)];
        engine.resolve_cache(&mut points);
        let t = engine.beat_to_real_time(&points, 60.0, 2.0).unwrap();
        assert!(t > 0.0 && t.is_finite());
    }

    #[test]
    fn points_equal_cached_points_round_trip() {
        let engine = TimelineEngine::new(16, false);
        let mut points = vec![pt(0.0, 120.0), pt(4.0, 140.0), pt(10.0, 90.0)];
        engine.resolve_cache(&mut points);
        for p in &points {
            let t = engine.beat_to_real_time(&points, 120.0, p.beat).unwrap();
            assert!((t - p.real_time.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn monotone_real_time_in_theoretical_mode() {
        let engine = TimelineEngine::new(16, true);
        let mut points = vec![pt(0.0, 60.0), pt(4.0, 180.0), pt(12.0, 30.0), pt(20.0, 200.0)];
        engine.resolve_cache(&mut points);
        for w in points.windows(2) {
            assert!(w[1].real_time.unwrap() >= w[0].real_time.unwrap());
        }
    }

    #[test]
    fn ableton_sentinel_clamps_to_zero() {
        let engine = TimelineEngine::new(16, true);
        let mut points = vec![pt(-63072000.0, 120.0), pt(4.0, 120.0)];
        engine.resolve_cache(&mut points);
        assert_eq!(points[0].real_time, Some(0.0));
        let t = engine.beat_to_real_time(&points, 120.0, 0.0).unwrap();
        assert_eq!(t, 0.0);
    }

    #[test]
    fn horizontal_constant_bpm_exact_in_theoretical_mode() {
        let engine = TimelineEngine::new(16, true);
        let points = vec![pt(0.0, 120.0)];
        let t = engine.beat_to_real_time(&points, 120.0, 16.0).unwrap();
        assert_eq!(t, 16.0 * 60.0 / 120.0);
    }

    #[test]
    fn past_last_point_extrapolates_constant_bpm() {
        let engine = TimelineEngine::new(16, true);
        let mut points = vec![pt(0.0, 120.0), pt(4.0, 60.0)];
        engine.resolve_cache(&mut points);
        let t4 = points[1].real_time.unwrap();
        let t8 = engine.beat_to_real_time(&points, 120.0, 8.0).unwrap();
        assert!((t8 - (t4 + 4.0 * spb(60.0))).abs() < 1e-9);
    }
}
