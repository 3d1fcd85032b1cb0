//! Parses the `FLhd`/`FLdt` chunked binary event stream into a
//! [`crate::BinaryProject`].

use log::warn;

use crate::error::BinaryProjectError;
use crate::events;
use crate::reader::EventReader;
use crate::types::{AutomationChannel, Channel, ChannelAutomationPoint, PlaylistItem};
use tempoline_core::RawMarker;

const MAGIC: &[u8] = b"FLhd";
const DATA_CHUNK_MAGIC: &[u8] = b"FLdt";

pub struct ParsedBinary {
    pub version: Vec<u32>,
    pub pulses_per_beat: u16,
    pub beats_per_min: f64,
    pub num_channels: u16,
    pub channels: Vec<Channel>,
    pub automation_channels: Vec<AutomationChannel>,
    pub playlist_items: Vec<PlaylistItem>,
    pub raw_markers: Vec<RawMarker>,
}

pub fn parse(raw: &[u8]) -> Result<ParsedBinary, BinaryProjectError> {
    let mut reader = EventReader::new(raw);

    if reader.read_bytes(4)? != MAGIC {
        return Err(BinaryProjectError::BadMagic);
    }
    let header_len = reader.read_u32()?;
    if header_len != 6 {
        return Err(BinaryProjectError::UnexpectedHeaderLen(header_len));
    }
    let format_type = reader.read_u16()?;
    if format_type != 0 {
        return Err(BinaryProjectError::UnexpectedFormat(format_type));
    }
    let num_channels = reader.read_u16()?;
    let pulses_per_beat = reader.read_u16()?;

    if reader.read_bytes(4)? != DATA_CHUNK_MAGIC {
        return Err(BinaryProjectError::BadDataChunkHeader);
    }
    let _data_chunk_len = reader.read_u32()?;

    let mut state = ParserState::new(num_channels, pulses_per_beat);
    loop {
        let event_id = match reader.read_u8() {
            Ok(id) => id,
            Err(_) => break,
        };
        state.handle_event(event_id, &mut reader)?;
    }

    state.finish()
}

struct ParserState {
    version: Option<Vec<u32>>,
    pulses_per_beat: u16,
    beats_per_min: f64,
    num_channels: u16,
    channels: Vec<Channel>,
    automation_channels: Vec<AutomationChannel>,
    playlist_items: Vec<PlaylistItem>,
    raw_markers: Vec<RawMarker>,
}

impl ParserState {
    fn new(num_channels: u16, pulses_per_beat: u16) -> Self {
        Self {
            version: None,
            pulses_per_beat,
            beats_per_min: 0.0,
            num_channels,
            channels: Vec::new(),
            automation_channels: Vec::new(),
            playlist_items: Vec::new(),
            raw_markers: Vec::new(),
        }
    }

    fn finish(self) -> Result<ParsedBinary, BinaryProjectError> {
        Ok(ParsedBinary {
            version: self.version.unwrap_or_default(),
            pulses_per_beat: self.pulses_per_beat,
            beats_per_min: self.beats_per_min,
            num_channels: self.num_channels,
            channels: self.channels,
            automation_channels: self.automation_channels,
            playlist_items: self.playlist_items,
            raw_markers: self.raw_markers,
        })
    }

    fn major_version(&self) -> Result<u32, BinaryProjectError> {
        self.version
            .as_ref()
            .and_then(|v| v.first().copied())
            .ok_or(BinaryProjectError::VersionNotYetKnown)
    }

    fn handle_event(
        &mut self,
        event_id: u8,
        reader: &mut EventReader,
    ) -> Result<(), BinaryProjectError> {
        use events::*;

        if (BYTE..WORD).contains(&event_id) {
            let data = reader.read_u8()? as u32;
            self.handle_small_event(event_id, data)
        } else if (WORD..DWORD).contains(&event_id) {
            let data = reader.read_u16()? as u32;
            self.handle_small_event(event_id, data)
        } else if (DWORD..TEXT).contains(&event_id) {
            let data = if matches!(event_id, UNKNOWN_92 | UNKNOWN_93 | UNKNOWN_9A) {
                reader.read_i32()? as u32
            } else {
                reader.read_u32()?
            };
            self.handle_small_event(event_id, data)
        } else {
            let len = reader.read_text_len()?;
            let data = reader.read_bytes(len)?;
            self.handle_blob_event(event_id, &data)
        }
    }

    fn handle_small_event(&mut self, event_id: u8, data: u32) -> Result<(), BinaryProjectError> {
        match event_id {
            events::TEMPO => {
                self.beats_per_min = data as f64 / 1000.0;
            }
            events::CHANNEL_NEW => {
                self.channels.push(Channel::new(data as u16));
            }
            events::MARKER_TIME => {
                let action = (data >> 24) as u8;
                let pulse = data & 0xff_ffff;
                let beat = pulse as f64 / self.pulses_per_beat as f64;
                self.raw_markers
                    .push(RawMarker::new(beat, String::new()).with_action(action as u32));
            }
            events::TEMPO_OLD => {
                return Err(BinaryProjectError::InvalidEventId(event_id));
            }
            events::UNKNOWN_24 => {}
            _ => {}
        }
        Ok(())
    }

    fn handle_blob_event(&mut self, event_id: u8, data: &[u8]) -> Result<(), BinaryProjectError> {
        match event_id {
            events::CHANNEL_NAME => {
                let major = self.major_version()?;
                let Some(chan) = self.channels.last_mut() else {
                    warn!("CHANNEL_NAME before CHANNEL_NEW");
                    return Ok(());
                };
                chan.name = Some(decode_channel_text(data, major));
            }
            events::CHANNEL_SAMPLE_PATH => {
                let major = self.major_version()?;
                let Some(chan) = self.channels.last_mut() else {
                    warn!("CHANNEL_SAMPLE_PATH before CHANNEL_NEW");
                    return Ok(());
                };
                chan.sample_path = Some(decode_channel_text(data, major));
            }
            events::AUTOMATION_CHANNELS => {
                let mut sub = EventReader::new(data);
                let _unk = sub.read_u16()?;
                let channel_index = sub.read_u32()?;
                let _unk2 = sub.read_u16()?;
                let param_id = sub.read_u16()?;
                let dest_id = sub.read_u16()?;
                let _unk3 = sub.read_u32()?;
                let _unk4 = sub.read_u32()?;
                self.automation_channels.push(AutomationChannel {
                    channel_index,
                    param_id,
                    dest_id,
                });
            }
            events::AUTOMATION_DATA => {
                let Some(chan) = self.channels.last_mut() else {
                    warn!("AUTOMATION_DATA with no current channel");
                    return Ok(());
                };
                let mut sub = EventReader::new(data);
                // Header fields of unknown purpose (always 1, always 64,
                // then 3 more fields) precede the point count.
                let _always_1 = sub.read_u32()?;
                let _always_64 = sub.read_u32()?;
                let _unk_byte = sub.read_u8()?;
                let _unk_a = sub.read_u32()?;
                let _unk_b = sub.read_u32()?;
                let num_points = sub.read_u32()?;
                for _ in 0..num_points {
                    let beat_increment = sub.read_f64()?;
                    let value = sub.read_f64()?;
                    let tension = sub.read_f32()?;
                    let _unknown3 = sub.read_bytes(3)?;
                    let direction = sub.read_u8()?;
                    chan.automation_points.push(ChannelAutomationPoint {
                        beat_increment,
                        value,
                        tension,
                        direction,
                    });
                }
            }
            events::PLAYLIST_ITEMS => {
                if self.channels.len() != self.num_channels as usize {
                    warn!("number of channels doesn't match header during PLAYLIST_ITEMS");
                }
                let major = self.major_version()?;
                let mut sub = EventReader::new(data);
                while (sub.position() as usize) < data.len() {
                    let start_pulse = sub.read_i32()?;
                    let _maybe_patbase = sub.read_u16()?;
                    let channel_id = sub.read_u16()?;
                    let len_pulses = sub.read_u32()?;
                    let raw_track_id = sub.read_u32()?;
                    let track_id = normalize_track_id(major, raw_track_id);
                    let _unk = sub.read_u16()?;
                    let flags = sub.read_u16()?;
                    let _uunk = sub.read_u32()?;
                    let _start_offset = sub.read_f32()?;
                    let _end_offset = sub.read_f32()?;

                    self.playlist_items.push(PlaylistItem {
                        start_pulse,
                        channel_id,
                        len_pulses,
                        track_id,
                        flags,
                    });
                }
            }
            events::VERSION => {
                let text = String::from_utf8_lossy(data).replace('\0', "");
                let parts = text
                    .split('.')
                    .map(|p| p.parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| BinaryProjectError::MalformedVersion(text.clone()))?;
                self.version = Some(parts);
            }
            events::MARKER_TEXT => {
                let major = self.major_version()?;
                let text = decode_marker_text(data, major);
                match self.raw_markers.last_mut() {
                    None => {
                        self.raw_markers.push(RawMarker::new(0.0, text));
                    }
                    Some(marker) => {
                        // A marker with text already set here would be odd
                        // (MARKER_TIME always starts one blank); nothing to
                        // do but overwrite.
                        marker.text = text;
                    }
                }
            }
            events::BASIC_CHAN_PARAMS | events::UNKNOWN_E7 | events::UNKNOWN_F1 => {}
            _ => {}
        }
        Ok(())
    }
}

fn normalize_track_id(major_version: u32, raw_track_id: u32) -> i64 {
    if major_version == 20 {
        500 - raw_track_id as i64
    } else {
        199 - raw_track_id as i64
    }
}

fn decode_channel_text(data: &[u8], major_version: u32) -> String {
    if major_version > 11 {
        decode_utf16(data).replace('\0', "")
    } else {
        String::from_utf8_lossy(data).replace('\0', "")
    }
}

/// Same version gate as `decode_channel_text`: UTF-16 for version > 11,
/// ASCII otherwise.
fn decode_marker_text(data: &[u8], major_version: u32) -> String {
    decode_channel_text(data, major_version)
}

fn decode_utf16(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
