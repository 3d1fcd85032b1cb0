//! Event id ranges and specific ids from the chunked `FLdt` event stream.
//! `[0,64)` carries a 1-byte payload, `[64,128)` 2 bytes, `[128,192)` 4
//! bytes, `[192,255]` a VLQ-length-prefixed text/data blob.

pub const BYTE: u8 = 0;
pub const WORD: u8 = 64;
pub const DWORD: u8 = 128;
pub const TEXT: u8 = 192;

pub const CHANNEL_NEW: u8 = 0x40;
/// Never observed in real files; kept recognized so an encounter surfaces a
/// clear error instead of silently misreading the stream.
pub const TEMPO_OLD: u8 = 66;

/// Marker time. High byte is the marker action, low 3 bytes are the pulse.
pub const MARKER_TIME: u8 = DWORD + 20; // 0x94
pub const TEMPO: u8 = DWORD + 28; // 0x9c

/// These DWORD ids carry signed payloads; every other DWORD id is read as
/// unsigned. `UNKNOWN_93` duplicates `UNKNOWN_92`'s value upstream; kept
/// that way rather than "corrected" to 0x93, since an actual 0x93 event
/// would otherwise silently be misread relative to real project files.
pub const UNKNOWN_92: u8 = 0x92;
pub const UNKNOWN_93: u8 = 0x92;
pub const UNKNOWN_9A: u8 = 0x9a;

pub const VERSION: u8 = TEXT + 7; // 0xc7
pub const MARKER_TEXT: u8 = TEXT + 13; // 0xcd
pub const CHANNEL_NAME: u8 = 0xcb;
pub const CHANNEL_SAMPLE_PATH: u8 = 0xc4;

pub const BASIC_CHAN_PARAMS: u8 = 0xdb;
pub const AUTOMATION_DATA: u8 = 0xea;
pub const AUTOMATION_CHANNELS: u8 = 0xe3;
pub const PLAYLIST_ITEMS: u8 = 0xe9;

/// Always 0, right before `PLAYLIST_ITEMS`; recognized but inert.
pub const UNKNOWN_24: u8 = 0x24;
/// A text blob ("Automation"/"Unsorted"), recognized but inert.
pub const UNKNOWN_E7: u8 = 0xe7;
/// Occurs once with the text "Arrangement", right before automation data;
/// recognized but inert.
pub const UNKNOWN_F1: u8 = 0xf1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerAction {
    None,
    Loop,
    Skip,
    Pause,
    LoopAlt,
    Start,
    PatternLength,
    BarOverride,
    TimeSignature,
    PunchIn,
    PunchOut,
    Unknown(u8),
}

impl From<u8> for MarkerAction {
    fn from(value: u8) -> Self {
        match value {
            0 => MarkerAction::None,
            1 => MarkerAction::Loop,
            2 => MarkerAction::Skip,
            3 => MarkerAction::Pause,
            4 => MarkerAction::LoopAlt,
            5 => MarkerAction::Start,
            6 => MarkerAction::PatternLength,
            7 => MarkerAction::BarOverride,
            8 => MarkerAction::TimeSignature,
            9 => MarkerAction::PunchIn,
            10 => MarkerAction::PunchOut,
            other => MarkerAction::Unknown(other),
        }
    }
}
