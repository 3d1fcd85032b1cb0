//! Align phase: snap every tempo point onto the DAW's quantization grid.

use crate::AlignedEvent;
use tempoline_core::TempoPoint;

const EPS: f64 = 1e-9;

/// Snaps `points` onto the `align`-wide grid.
///
/// On-grid points are kept verbatim. An off-grid point is replaced by a
/// "before" surrogate at the grid boundary preceding it (using its own
/// `prev_aligned_bpm`) and, unless it's the last point, an "after" surrogate
/// at the boundary following it (linearly interpolated between it and the
/// next point). Several off-grid points landing in the same grid cell
/// collapse to a single "before" surrogate, deduped against whatever the
/// previous iteration already emitted at that boundary. The final point is
/// always kept, on-grid or not.
pub fn align_phase(points: &[TempoPoint], align: f64) -> Vec<AlignedEvent> {
    let mut out: Vec<AlignedEvent> = Vec::with_capacity(points.len());
    let n = points.len();

    for (i, p) in points.iter().enumerate() {
        let is_last = i == n - 1;
        let on_grid = is_on_grid(p.beat, align);

        if on_grid {
            push_dedup(&mut out, p.beat, p.bpm);
        } else {
            let cell_start = p.beat - (p.beat % align);
            let before_bpm = p.prev_aligned_bpm.unwrap_or(p.bpm);
            push_dedup(&mut out, cell_start, before_bpm);

            if !is_last {
                let cell_end = cell_start + align;
                let next = &points[i + 1];
                let after_bpm = interpolate_bpm(cell_end, p.beat, p.bpm, next.beat, next.bpm);
                push_dedup(&mut out, cell_end, after_bpm);
            }
        }

        if is_last && !on_grid {
            out.push(AlignedEvent { beat: p.beat, bpm: p.bpm });
        }
    }

    out
}

fn is_on_grid(beat: f64, align: f64) -> bool {
    let rem = beat % align;
    rem.abs() < EPS || (align - rem).abs() < EPS
}

fn push_dedup(out: &mut Vec<AlignedEvent>, beat: f64, bpm: f64) {
    if let Some(last) = out.last() {
        if (last.beat - beat).abs() < EPS {
            return;
        }
    }
    out.push(AlignedEvent { beat, bpm });
}

fn interpolate_bpm(beat: f64, first_beat: f64, first_bpm: f64, second_beat: f64, second_bpm: f64) -> f64 {
    if first_bpm == second_bpm || second_beat == first_beat {
        return first_bpm;
    }
    let slope = (second_bpm - first_bpm) / (second_beat - first_beat);
    first_bpm + slope * (beat - first_beat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(beat: f64, bpm: f64) -> TempoPoint {
        TempoPoint::new(beat, bpm)
    }

    #[test]
    fn on_grid_points_pass_through() {
        let points = vec![pt(0.0, 120.0), pt(4.0, 140.0)];
        let aligned = align_phase(&points, 0.25);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].beat, 0.0);
        assert_eq!(aligned[1].beat, 4.0);
    }

    #[test]
    fn off_grid_point_injects_before_and_after() {
        let mut points = vec![pt(0.0, 100.0), pt(4.1, 140.0), pt(8.0, 140.0)];
        let engine = tempoline_core::TimelineEngine::new(16, false);
        engine.resolve_cache(&mut points);

        let aligned = align_phase(&points, 0.25);
        // 4.1 is off the 0.25-wide grid: expect a "before" at 4.0 and an
        // "after" at 4.25, bracketing the original point.
        assert!(aligned.iter().any(|e| (e.beat - 4.0).abs() < 1e-9));
        assert!(aligned.iter().any(|e| (e.beat - 4.25).abs() < 1e-9));
    }

    #[test]
    fn terminal_off_grid_point_is_kept_verbatim() {
        let mut points = vec![pt(0.0, 100.0), pt(4.1, 140.0)];
        let engine = tempoline_core::TimelineEngine::new(16, false);
        engine.resolve_cache(&mut points);

        let aligned = align_phase(&points, 0.25);
        assert!(aligned.iter().any(|e| (e.beat - 4.1).abs() < 1e-9 && (e.bpm - 140.0).abs() < 1e-9));
    }
}
