//! The unified tempo-timeline data model shared by every parser.

/// Bezier curve control point pair, kept only for debugging/introspection.
/// The engine never reads this field (linear segments only, see Non-goals).
pub type CurveControls = ((f64, f64), (f64, f64));

/// A point on the piecewise-linear tempo curve.
///
/// `real_time` and `prev_aligned_bpm` start `None` and are filled in place by
/// `TimelineEngine` the first time a timeline is resolved. Because the
/// engine always holds `&mut [TempoPoint]` while filling the cache, no
/// interior mutability is required to get the "lazy cache fill" behavior
/// the reference implementation relies on.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoPoint {
    pub beat: f64,
    pub bpm: f64,
    pub real_time: Option<f64>,
    pub prev_aligned_bpm: Option<f64>,
    /// Source track id, for debugging. Artificial points never carry one.
    pub source_track_id: Option<i64>,
    /// Set for points synthesized by the `ClipComposer` or `TempoMapEmitter`,
    /// never present in the source file.
    pub artificial: bool,
    pub curve_controls: Option<CurveControls>,
}

impl TempoPoint {
    pub fn new(beat: f64, bpm: f64) -> Self {
        Self {
            beat,
            bpm,
            real_time: None,
            prev_aligned_bpm: None,
            source_track_id: None,
            artificial: false,
            curve_controls: None,
        }
    }

    pub fn artificial(beat: f64, bpm: f64) -> Self {
        Self {
            artificial: true,
            ..Self::new(beat, bpm)
        }
    }

    pub fn with_track_id(mut self, track_id: i64) -> Self {
        self.source_track_id = Some(track_id);
        self
    }

    pub fn with_curve_controls(mut self, controls: CurveControls) -> Self {
        self.curve_controls = Some(controls);
        self
    }
}

/// A labelled position in native project units, not yet resolved to
/// real-world seconds. `position` is a beat for XML-sourced projects and a
/// pulse for binary-sourced projects; parsers convert to beats before handing
/// markers to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMarker {
    pub position: f64,
    pub text: String,
    /// Binary-source only: the marker action tag. `None` for XML sources,
    /// where every locator is a plain marker.
    pub action: Option<u32>,
}

impl RawMarker {
    pub fn new(position: f64, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: u32) -> Self {
        self.action = Some(action);
        self
    }
}

/// A marker resolved to real-world seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub real_time: f64,
    pub text: String,
}

impl Marker {
    pub fn new(real_time: f64, text: impl Into<String>) -> Self {
        Self {
            real_time,
            text: text.into(),
        }
    }
}
