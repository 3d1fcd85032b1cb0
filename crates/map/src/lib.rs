//! Turns a unified tempo-automation sequence into an ordered list of
//! abstract "set-tempo" events on a tick timeline, then packs that list into
//! a Standard MIDI File (type 0, one track) for an external sequencer.
//!
//! Two phases, matching the reference behavior: `align` snaps every tempo
//! point onto the DAW's quantization grid (injecting surrogate boundary
//! points where needed), `render` turns the aligned sequence into tempo
//! events plus a bracketing note-on/note-off sentinel frame.

mod align;
mod error;
mod render;

pub use error::TempoMapError;

use tempoline_core::TempoPoint;

/// Ticks per quarter note in the emitted Standard MIDI File. Fixed, not
/// configurable: nothing about the source project's pulses-per-beat or
/// Ableton's beat grid needs to survive into the output resolution.
pub const TICKS_PER_BEAT: u16 = 480;

/// A tempo point snapped onto the alignment grid, ready to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedEvent {
    pub beat: f64,
    pub bpm: f64,
}

/// Aligns `points` to the `align_beats`-wide grid (see
/// `tempoline_core::alignment_window`) and renders a complete type-0 SMF,
/// sentinel note-on/note-off frame included.
///
/// `points` must already have `prev_aligned_bpm` filled, i.e. it must be the
/// output of `TimelineEngine::resolve_cache` run in DAW (non-theoretical)
/// mode: the align phase's "before" boundary is defined in terms of that
/// field, which theoretical-mode resolution never populates.
pub fn emit_tempo_map(points: &[TempoPoint], tempo_quant: u32) -> Result<Vec<u8>, TempoMapError> {
    let align_beats = 4.0 / tempo_quant as f64;
    let clamped = clamp_sentinel(points);
    let aligned = align::align_phase(&clamped, align_beats);
    render::render_smf(&aligned, align_beats)
}

/// The mysterious negative-beat sentinel some sources put at index 0 (see
/// Design Notes §9(c)) is clamped to beat 0 for every other piece of time
/// math in this workspace; the map emitter applies the same clamp so an
/// unclamped sentinel doesn't turn into a multi-million-beat alignment
/// segment.
fn clamp_sentinel(points: &[TempoPoint]) -> Vec<TempoPoint> {
    let mut points = points.to_vec();
    if let Some(first) = points.first_mut() {
        if first.beat < 0.0 {
            first.beat = 0.0;
        }
    }
    points
}
