//! Entry point of the workspace: dispatches a raw byte stream to the
//! appropriate format parser by filename extension, resolves every marker
//! and tempo-automation point through `TimelineEngine`, and hands back an
//! immutable `Project`.
//!
//! Per Design Notes §9, the "extension -> parser" registry isn't a runtime
//! dispatch table: the two supported formats are known at compile time, so
//! `load_project` is a plain `match` over the lower-cased extension, and
//! `Project` is a statically-typed variant rather than a trait object.

mod error;

pub use error::ProjectError;

use std::path::Path;

use tempoline_core::{Marker, TempoPoint, TimelineEngine};

/// A fully parsed, fully resolved project. Immutable once returned by
/// [`load_project`]: every marker already carries its real-world seconds
/// and every tempo-automation point already carries its forward-accumulated
/// `real_time` (and, in DAW mode, `prev_aligned_bpm`).
#[derive(Debug, Clone)]
pub struct Project {
    source: String,
    format: ProjectFormat,
    version: Vec<u32>,
    base_bpm: f64,
    tempo_quant: u32,
    theoretical: bool,
    markers: Vec<Marker>,
    tempo_automation_events: Vec<TempoPoint>,
    /// Unresolved copy of the automation list, kept so `emit_tempo_map` can
    /// run its own DAW-mode resolution independent of `theoretical`: the
    /// align phase always needs `prev_aligned_bpm`, which theoretical mode
    /// never fills.
    raw_tempo_points: Vec<TempoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Xml,
    Binary,
}

impl Project {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> ProjectFormat {
        self.format
    }

    /// `[major, minor_a, minor_b, minor_c]` for XML sources; the dot-split
    /// integers from the binary format's `VERSION` event otherwise.
    pub fn version(&self) -> &[u32] {
        &self.version
    }

    pub fn base_bpm(&self) -> f64 {
        self.base_bpm
    }

    pub fn tempo_quant(&self) -> u32 {
        self.tempo_quant
    }

    pub fn theoretical(&self) -> bool {
        self.theoretical
    }

    /// Resolved markers, sorted by `real_time` ascending.
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// The unified tempo sequence, ordered by beat, `real_time` filled.
    pub fn tempo_automation_events(&self) -> &[TempoPoint] {
        &self.tempo_automation_events
    }

    /// Packs the tempo sequence into a type-0 Standard MIDI File via
    /// `tempoline_map`. Always aligns under DAW-mode semantics regardless of
    /// `theoretical`, since the align phase needs `prev_aligned_bpm`.
    pub fn emit_tempo_map(&self) -> Result<Vec<u8>, ProjectError> {
        let daw_engine = TimelineEngine::new(self.tempo_quant, false);
        let mut points = if self.raw_tempo_points.is_empty() {
            vec![TempoPoint::new(0.0, self.base_bpm)]
        } else {
            self.raw_tempo_points.clone()
        };
        daw_engine.resolve_cache(&mut points);
        Ok(tempoline_map::emit_tempo_map(&points, self.tempo_quant)?)
    }
}

/// Dispatches `bytes` (the whole file, not yet decompressed) to the parser
/// registered for `filename`'s extension, then runs every marker and tempo
/// point through a `TimelineEngine` in the requested mode.
pub fn load_project(filename: &str, bytes: &[u8], theoretical: bool) -> Result<Project, ProjectError> {
    match extension_of(filename).as_deref() {
        Some("als") => load_xml(filename, bytes, theoretical),
        Some("flp") => load_binary(filename, bytes, theoretical),
        other => Err(ProjectError::UnknownExtension(
            other.map(str::to_string).unwrap_or_default(),
        )),
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn load_xml(filename: &str, bytes: &[u8], theoretical: bool) -> Result<Project, ProjectError> {
    let parsed = tempoline_xml::XmlProject::parse(bytes)?;
    let tempo_quant = tempoline_xml::TEMPO_QUANT;
    let engine = TimelineEngine::new(tempo_quant, theoretical);

    let mut points = parsed.tempo_automation_events.clone();
    engine.resolve_cache(&mut points);

    let raw: Vec<(f64, String)> = parsed
        .raw_markers
        .iter()
        .map(|m| (m.position, m.text.clone()))
        .collect();
    let markers = engine.resolve_markers(&points, parsed.beats_per_min, &raw)?;

    let version = vec![
        parsed.version.major.as_deref().and_then(|s| s.parse().ok()).unwrap_or(0),
        parsed.version.minor_a.unwrap_or(0),
        parsed.version.minor_b.unwrap_or(0),
        parsed.version.minor_c.unwrap_or(0),
    ];

    Ok(Project {
        source: filename.to_string(),
        format: ProjectFormat::Xml,
        version,
        base_bpm: parsed.beats_per_min,
        tempo_quant,
        theoretical,
        markers,
        tempo_automation_events: points,
        raw_tempo_points: parsed.tempo_automation_events,
    })
}

fn load_binary(filename: &str, bytes: &[u8], theoretical: bool) -> Result<Project, ProjectError> {
    let parsed = tempoline_binary::BinaryProject::parse(bytes)?;
    let tempo_quant = tempoline_binary::TEMPO_QUANT;
    let engine = TimelineEngine::new(tempo_quant, theoretical);

    let mut points = parsed.tempo_automation_events.clone();
    engine.resolve_cache(&mut points);

    let raw = parsed.plain_markers();
    let markers = engine.resolve_markers(&points, parsed.beats_per_min, &raw)?;

    Ok(Project {
        source: filename.to_string(),
        format: ProjectFormat::Binary,
        version: parsed.version.clone(),
        base_bpm: parsed.beats_per_min,
        tempo_quant,
        theoretical,
        markers,
        tempo_automation_events: points,
        raw_tempo_points: parsed.tempo_automation_events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(text.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    fn constant_tempo_doc(bpm: &str, beat: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" MinorVersion="10.0_370" SchemaChangeCount="3">
  <LiveSet>
    <Tracks></Tracks>
    <MasterTrack>
      <DeviceChain>
        <Mixer>
          <Tempo>
            <Manual Value="{bpm}" />
            <AutomationTarget Id="8" />
          </Tempo>
        </Mixer>
      </DeviceChain>
      <AutomationEnvelopes>
        <Envelopes>
        </Envelopes>
      </AutomationEnvelopes>
    </MasterTrack>
    <Locators>
      <Locators>
        <Locator Id="0"><Time Value="{beat}"/><Name Value="Hit"/></Locator>
      </Locators>
    </Locators>
  </LiveSet>
</Ableton>"#
        )
    }

    #[test]
    fn scenario_1_xml_no_automation_marker_at_beat_240() {
        // spec.md scenario 1: base 120 bpm, no automation, marker at beat
        // 240 -> real_time = 120.0s
        let doc = constant_tempo_doc("120", "240");
        let raw = gzip(&doc);

        let project = load_project("song.als", &raw, true).unwrap();
        assert_eq!(project.base_bpm(), 120.0);
        assert_eq!(project.markers().len(), 1);
        assert_eq!(project.markers()[0].real_time, 120.0);
        assert_eq!(project.markers()[0].text, "Hit");
    }

    #[test]
    fn unknown_extension_errors() {
        let err = load_project("song.xyz", b"whatever", false).unwrap_err();
        assert!(matches!(err, ProjectError::UnknownExtension(_)));
    }

    #[test]
    fn non_gzip_als_bubbles_up_format_error() {
        let err = load_project("song.als", b"not gzip data", false).unwrap_err();
        assert!(matches!(err, ProjectError::Xml(_)));
    }

    #[test]
    fn bad_magic_flp_bubbles_up_format_error() {
        let err = load_project("song.flp", b"definitely not flp", false).unwrap_err();
        assert!(matches!(err, ProjectError::Binary(_)));
    }

    #[test]
    fn no_automation_project_emits_single_set_tempo_map() {
        let doc = constant_tempo_doc("100", "16");
        let raw = gzip(&doc);
        let project = load_project("song.als", &raw, false).unwrap();

        let bytes = project.emit_tempo_map().unwrap();
        let smf = midly::Smf::parse(&bytes).unwrap();
        let tempo_events: Vec<_> = smf.tracks[0]
            .iter()
            .filter(|e| matches!(e.kind, midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(_))))
            .collect();
        assert_eq!(tempo_events.len(), 1);
        assert_eq!(tempo_events[0].delta.as_int(), 0);
        if let midly::TrackEventKind::Meta(midly::MetaMessage::Tempo(micros)) = tempo_events[0].kind {
            assert_eq!(micros.as_int(), 600_000);
        } else {
            unreachable!()
        }
    }

    #[test]
    fn parse_is_idempotent_across_fresh_streams() {
        let doc = constant_tempo_doc("128", "64");
        let raw = gzip(&doc);

        let a = load_project("song.als", &raw, true).unwrap();
        let b = load_project("song.als", &raw, true).unwrap();

        assert_eq!(a.markers(), b.markers());
        assert_eq!(a.base_bpm(), b.base_bpm());
    }
}
