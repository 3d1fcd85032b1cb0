//! Parses Ableton Live `.als` project files: gzip-compressed XML, read by
//! byte-slice scanning for the handful of tags that carry tempo automation
//! and locators rather than a full-document parse.
//!
//! Live's save format has shifted where tempo automation lives across three
//! schema generations (8, 9, 10); `parse` branches on `MinorVersion` to
//! handle all three.

mod element;
mod error;
mod tagscan;
mod version;

pub use error::XmlProjectError;
pub use version::AbletonSetVersion;

use std::io::Read;

use flate2::read::GzDecoder;
use log::warn;

use element::{parse_fragment, Element};
use tagscan::find_tag;
use tempoline_core::{Marker, RawMarker, TempoPoint, TimelineEngine};

/// Ableton quantizes tempo automation playback to 16th notes.
pub const TEMPO_QUANT: u32 = 16;

#[derive(Debug, Clone)]
pub struct XmlProject {
    pub version: AbletonSetVersion,
    pub beats_per_min: f64,
    pub raw_markers: Vec<RawMarker>,
    pub tempo_automation_target_id: Option<String>,
    /// Sorted by beat. Always has the mysterious negative-beat sentinel as
    /// its first element once any automation is present; length <= 1 means
    /// no automation at all.
    pub tempo_automation_events: Vec<TempoPoint>,
}

impl XmlProject {
    /// `raw` is the raw (still gzip-compressed) file contents.
    pub fn parse(raw: &[u8]) -> Result<Self, XmlProjectError> {
        let contents = gunzip(raw)?;
        if contents.is_empty() {
            return Err(XmlProjectError::EmptyContents);
        }

        let version = version::parse_version(&contents)?;
        let (beats_per_min, tempo_automation_target_id) = parse_tempo(&contents, &version)?;
        let raw_markers = parse_markers(&contents)?;
        let tempo_automation_events =
            parse_automation(&contents, &version, tempo_automation_target_id.as_deref())?;

        Ok(Self {
            version,
            beats_per_min,
            raw_markers,
            tempo_automation_target_id,
            tempo_automation_events,
        })
    }

    pub fn has_tempo_automation(&self) -> bool {
        self.tempo_automation_events.len() > 1
    }

    /// Resolves every locator to real-world seconds under the given engine
    /// (theoretical or DAW mode, caller's choice), sorted ascending.
    pub fn markers(&self, engine: &TimelineEngine) -> Result<Vec<Marker>, XmlProjectError> {
        let mut points = self.tempo_automation_events.clone();
        engine.resolve_cache(&mut points);
        let raw: Vec<(f64, String)> = self
            .raw_markers
            .iter()
            .map(|m| (m.position, m.text.clone()))
            .collect();
        Ok(engine.resolve_markers(&points, self.beats_per_min, &raw)?)
    }
}

fn gunzip(raw: &[u8]) -> Result<Vec<u8>, XmlProjectError> {
    let mut decoder = GzDecoder::new(raw);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn parse_locators(contents: &[u8]) -> &[u8] {
    // For some reason the first `<Locators>` tag contains another, identical
    // `Locators` tag nested directly inside it; the inner one is the real
    // one and holds the actual `<Locator>` children.
    let Some(outer) = find_tag(contents, "Locators") else {
        return &[];
    };
    if outer.len() <= 1 {
        return &[];
    }
    find_tag(&outer[1..], "Locators").unwrap_or(&[])
}

fn parse_markers(contents: &[u8]) -> Result<Vec<RawMarker>, XmlProjectError> {
    let chunk = parse_locators(contents);
    if chunk.is_empty() {
        return Ok(Vec::new());
    }

    let locators = parse_fragment(chunk)?;
    let mut markers = Vec::with_capacity(locators.children.len());
    for locator in &locators.children {
        let time = locator
            .find("Time")
            .ok_or(XmlProjectError::LocatorMissingField("Time"))?;
        let beat: f64 = time
            .get("Value")
            .ok_or(XmlProjectError::LocatorMissingField("Time/Value"))?
            .parse()?;

        let name = locator
            .find("Name")
            .ok_or(XmlProjectError::LocatorMissingField("Name"))?;
        let text = name
            .get("Value")
            .ok_or(XmlProjectError::LocatorMissingField("Name/Value"))?
            .trim()
            .to_string();

        markers.push(RawMarker::new(beat, text));
    }
    Ok(markers)
}

/// Live 8 and 9 store tempo automation under `Tempo/ArrangerAutomation`.
/// Returns the `Events` element, or `None` if there's no automation at all
/// (which is a normal, warn-worthy-but-not-fatal situation).
fn parse_arranger_automation_events(contents: &[u8]) -> Result<Option<Element>, XmlProjectError> {
    let tempo_chunk = find_tag(contents, "Tempo").ok_or(XmlProjectError::TempoTagNotFound)?;
    let tempo = parse_fragment(tempo_chunk)?;

    let Some(arranger) = tempo.find("ArrangerAutomation") else {
        warn!("no ArrangerAutomation found in Tempo");
        return Ok(None);
    };

    Ok(arranger.find("Events").cloned())
}

fn parse_tempo(
    contents: &[u8],
    version: &AbletonSetVersion,
) -> Result<(f64, Option<String>), XmlProjectError> {
    if version.minor_a == Some(8) {
        let events = parse_arranger_automation_events(contents)?
            .ok_or(XmlProjectError::Ableton8NoAutomationEvents)?;
        let first = events
            .children
            .first()
            .ok_or(XmlProjectError::Ableton8NoAutomationEvents)?;
        let bpm: f64 = first
            .get("Value")
            .ok_or(XmlProjectError::MissingAttribute {
                element: "FloatEvent",
                attribute: "Value",
            })?
            .parse()?;
        // Live 8 has no AutomationTarget id to match against.
        return Ok((bpm, None));
    }

    let tempo_chunk = find_tag(contents, "Tempo").ok_or(XmlProjectError::TempoTagNotFound)?;
    let tempo = parse_fragment(tempo_chunk)?;

    let manual = tempo.find("Manual").ok_or(XmlProjectError::MissingAttribute {
        element: "Tempo",
        attribute: "Manual",
    })?;
    let bpm: f64 = manual
        .get("Value")
        .ok_or(XmlProjectError::MissingAttribute {
            element: "Manual",
            attribute: "Value",
        })?
        .parse()?;

    let target = tempo
        .find("AutomationTarget")
        .ok_or(XmlProjectError::MissingAttribute {
            element: "Tempo",
            attribute: "AutomationTarget",
        })?;
    let target_id = target
        .get("Id")
        .ok_or(XmlProjectError::MissingAttribute {
            element: "AutomationTarget",
            attribute: "Id",
        })?
        .to_string();

    Ok((bpm, Some(target_id)))
}

fn parse_automation(
    contents: &[u8],
    version: &AbletonSetVersion,
    target_id: Option<&str>,
) -> Result<Vec<TempoPoint>, XmlProjectError> {
    let events = if version.minor_a.unwrap_or(0) < 10 {
        parse_arranger_automation_events(contents)?
    } else {
        let master_track_chunk =
            find_tag(contents, "MasterTrack").ok_or(XmlProjectError::MasterTrackTagNotFound)?;
        let master_track = parse_fragment(master_track_chunk)?;

        let Some(auto_envelopes) = master_track.find("AutomationEnvelopes") else {
            warn!("no AutomationEnvelopes found in MasterTrack");
            return Ok(Vec::new());
        };
        let Some(envelopes) = auto_envelopes.find("Envelopes") else {
            warn!("no Envelopes found in AutomationEnvelopes");
            return Ok(Vec::new());
        };

        let mut found = None;
        for env in &envelopes.children {
            let pointee_id = env
                .find("EnvelopeTarget")
                .and_then(|t| t.find("PointeeId"))
                .and_then(|p| p.get("Value"));
            if pointee_id == target_id {
                found = env.find("Automation").and_then(|a| a.find("Events")).cloned();
                break;
            }
        }
        found
    };

    let Some(events) = events else {
        return Ok(Vec::new());
    };

    events.children.iter().map(float_event_to_point).collect()
}

fn float_event_to_point(ev: &Element) -> Result<TempoPoint, XmlProjectError> {
    let time: f64 = ev
        .get("Time")
        .ok_or(XmlProjectError::MissingAttribute {
            element: "FloatEvent",
            attribute: "Time",
        })?
        .parse()?;
    let value: f64 = ev
        .get("Value")
        .ok_or(XmlProjectError::MissingAttribute {
            element: "FloatEvent",
            attribute: "Value",
        })?
        .parse()?;

    let mut point = TempoPoint::new(time, value);

    if let Some(c1x) = ev.get("CurveControl1X") {
        let c1x: f64 = c1x.parse()?;
        let c1y: f64 = ev
            .get("CurveControl1Y")
            .ok_or(XmlProjectError::MissingAttribute {
                element: "FloatEvent",
                attribute: "CurveControl1Y",
            })?
            .parse()?;
        let c2x: f64 = ev
            .get("CurveControl2X")
            .ok_or(XmlProjectError::MissingAttribute {
                element: "FloatEvent",
                attribute: "CurveControl2X",
            })?
            .parse()?;
        let c2y: f64 = ev
            .get("CurveControl2Y")
            .ok_or(XmlProjectError::MissingAttribute {
                element: "FloatEvent",
                attribute: "CurveControl2Y",
            })?
            .parse()?;
        point = point.with_curve_controls(((c1x, c1y), (c2x, c2y)));
    }

    Ok(point)
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

    fn gen10_doc(bpm: &str, locators: &str, automation_events: &str) -> String {
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
          <AutomationEnvelope>
            <EnvelopeTarget>
              <PointeeId Value="8" />
            </EnvelopeTarget>
            <Automation>
              <Events>
                {automation_events}
              </Events>
            </Automation>
          </AutomationEnvelope>
        </Envelopes>
      </AutomationEnvelopes>
    </MasterTrack>
    <Locators>
      <Locators>
        {locators}
      </Locators>
    </Locators>
  </LiveSet>
</Ableton>"#
        )
    }

    fn gen9_doc(bpm: &str, automation_events: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" MinorVersion="9.0_327" SchemaChangeCount="2">
  <LiveSet>
    <MasterTrack>
      <Tempo>
        <Manual Value="{bpm}" />
        <AutomationTarget Id="5" />
        <ArrangerAutomation>
          <Events>
            {automation_events}
          </Events>
        </ArrangerAutomation>
      </Tempo>
    </MasterTrack>
    <Locators>
      <Locators>
      </Locators>
    </Locators>
  </LiveSet>
</Ableton>"#
        )
    }

    fn gen8_doc(bpm: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" MinorVersion="8.0_285" SchemaChangeCount="1">
  <LiveSet>
    <MasterTrack>
      <Tempo>
        <ArrangerAutomation>
          <Events>
            <FloatEvent Id="0" Time="-63072000" Value="{bpm}"/>
          </Events>
        </ArrangerAutomation>
      </Tempo>
    </MasterTrack>
    <Locators>
      <Locators>
      </Locators>
    </Locators>
  </LiveSet>
</Ableton>"#
        )
    }

    #[test]
    fn parses_generation_9_arranger_automation() {
        let events = concat!(
            r#"<FloatEvent Id="0" Time="-63072000" Value="100"/>"#,
            r#"<FloatEvent Id="1" Time="16" Value="140"/>"#,
        );
        let doc = gen9_doc("100", events);
        let raw = gzip(&doc);

        let project = XmlProject::parse(&raw).unwrap();
        assert_eq!(project.beats_per_min, 100.0);
        assert!(project.has_tempo_automation());
        assert_eq!(project.tempo_automation_events.len(), 2);
    }

    #[test]
    fn parses_generation_8_project_with_no_manual_tag() {
        let doc = gen8_doc("128");
        let raw = gzip(&doc);

        let project = XmlProject::parse(&raw).unwrap();
        assert_eq!(project.beats_per_min, 128.0);
        assert!(project.tempo_automation_target_id.is_none());
    }

    #[test]
    fn parses_constant_tempo_project_with_marker() {
        let events = r#"<FloatEvent Id="0" Time="-63072000" Value="120"/>"#;
        let locators = r#"<Locator Id="0"><Time Value="240"/><Name Value=" Drop "/></Locator>"#;
        let doc = gen10_doc("120", locators, events);
        let raw = gzip(&doc);

        let project = XmlProject::parse(&raw).unwrap();
        assert_eq!(project.beats_per_min, 120.0);
        assert!(!project.has_tempo_automation());
        assert_eq!(project.raw_markers.len(), 1);
        assert_eq!(project.raw_markers[0].text, "Drop");

        let engine = TimelineEngine::new(TEMPO_QUANT, true);
        let markers = project.markers(&engine).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].real_time, 120.0);
    }

    #[test]
    fn parses_sloped_tempo_automation() {
        let events = concat!(
            r#"<FloatEvent Id="0" Time="-63072000" Value="60"/>"#,
            r#"<FloatEvent Id="1" Time="4" Value="60"/>"#,
            r#"<FloatEvent Id="2" Time="8" Value="120"/>"#,
        );
        let doc = gen10_doc("60", "", events);
        let raw = gzip(&doc);

        let project = XmlProject::parse(&raw).unwrap();
        assert!(project.has_tempo_automation());
        assert_eq!(project.tempo_automation_events.len(), 3);

        let engine = TimelineEngine::new(TEMPO_QUANT, true);
        let mut points = project.tempo_automation_events.clone();
        engine.resolve_cache(&mut points);
        let t = engine.beat_to_real_time(&points, project.beats_per_min, 8.0).unwrap();
        let expected = 4.0 + 60.0 * 2f64.ln() / 15.0;
        assert!((t - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_locators_tag_yields_no_markers() {
        let events = r#"<FloatEvent Id="0" Time="-63072000" Value="120"/>"#;
        let doc = gen10_doc("120", "", events);
        let raw = gzip(&doc);
        let project = XmlProject::parse(&raw).unwrap();
        assert!(project.raw_markers.is_empty());
    }

    #[test]
    fn non_gzip_input_errors() {
        let err = XmlProject::parse(b"not gzip data").unwrap_err();
        assert!(matches!(err, XmlProjectError::Gzip(_)));
    }
}
