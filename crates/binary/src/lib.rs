//! Parses FL-Studio-style `.flp` projects: a chunked little-endian binary
//! event stream, read into channels/playlist items/automation channels and
//! then flattened by [`composer`] into the same unified tempo model
//! [`tempoline_xml`] produces.

pub mod composer;
pub mod error;
pub mod events;
pub mod parser;
pub mod reader;
pub mod types;

pub use error::BinaryProjectError;

use tempoline_core::{Marker, RawMarker, TempoPoint, TimelineEngine};
use events::MarkerAction;

/// FL Studio quantizes tempo automation playback to a much finer grid than
/// Ableton's 16th notes; 512 is the empirical constant (Design Notes §9(b)).
pub const TEMPO_QUANT: u32 = 512;

#[derive(Debug, Clone)]
pub struct BinaryProject {
    pub version: Vec<u32>,
    pub pulses_per_beat: u16,
    pub beats_per_min: f64,
    /// Every marker event seen, including the ones whose action isn't
    /// `NONE` (loop points, time-signature overrides, ...). Kept for
    /// introspection; only `NONE`-action markers ever resolve to real
    /// `Marker`s (spec's "Marker filtering" rule).
    pub all_raw_markers: Vec<RawMarker>,
    /// Sorted by beat, flattened by `composer::compose_tempo_automation`.
    /// Empty when the project has no tempo-master automation clips.
    pub tempo_automation_events: Vec<TempoPoint>,
}

impl BinaryProject {
    /// `raw` is the whole `.flp` byte stream.
    pub fn parse(raw: &[u8]) -> Result<Self, BinaryProjectError> {
        let parsed = parser::parse(raw)?;
        let tempo_automation_events = composer::compose_tempo_automation(
            parsed.pulses_per_beat,
            &parsed.channels,
            &parsed.automation_channels,
            &parsed.playlist_items,
        )?;

        Ok(Self {
            version: parsed.version,
            pulses_per_beat: parsed.pulses_per_beat,
            beats_per_min: parsed.beats_per_min,
            all_raw_markers: parsed.raw_markers,
            tempo_automation_events,
        })
    }

    pub fn has_tempo_automation(&self) -> bool {
        self.tempo_automation_events.len() > 1
    }

    /// Only markers whose action tag is `NONE` become resolvable markers;
    /// the rest (loop points, pattern-length overrides, time-signature
    /// changes, punch in/out) are deliberately excluded per spec.
    pub fn plain_markers(&self) -> Vec<(f64, String)> {
        self.all_raw_markers
            .iter()
            .filter(|m| matches!(m.action.map(|a| MarkerAction::from(a as u8)), Some(MarkerAction::None)))
            .map(|m| (m.position, m.text.clone()))
            .collect()
    }

    /// Resolves every plain marker to real-world seconds under `engine`,
    /// sorted by `real_time` ascending.
    pub fn markers(&self, engine: &TimelineEngine) -> Result<Vec<Marker>, BinaryProjectError> {
        let mut points = self.tempo_automation_events.clone();
        engine.resolve_cache(&mut points);
        let raw = self.plain_markers();
        Ok(engine.resolve_markers(&points, self.beats_per_min, &raw)?)
    }
}
