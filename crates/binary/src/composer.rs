//! Flattens one or more tempo-automation clips (playlist items referencing
//! an automation channel targeting the master tempo) into a single
//! monotonic global tempo-point sequence.
//!
//! Composition rules, in order of precedence:
//! - clips starting at the exact same beat: the longest (by clip length, not
//!   point count) wins, the rest are dropped entirely
//! - a gap between consecutive clips is bridged with a horizontal line held
//!   at the earlier clip's last BPM
//! - clips starting before the previous clip ends: the later clip wins from
//!   its start point onward (cursor-scrub semantics, not playback semantics
//!   — real playback behavior during an overlap is unspecified upstream)

use crate::error::BinaryProjectError;
use crate::types::{AutomationChannel, Channel, PlaylistItem};
use tempoline_core::TempoPoint;

struct Clip {
    start_beat: f64,
    len: f64,
    points: Vec<TempoPoint>,
}

pub fn compose_tempo_automation(
    pulses_per_beat: u16,
    channels: &[Channel],
    automation_channels: &[AutomationChannel],
    playlist_items: &[PlaylistItem],
) -> Result<Vec<TempoPoint>, BinaryProjectError> {
    let tempo_channels: Vec<&AutomationChannel> = automation_channels
        .iter()
        .filter(|c| c.is_master() && c.param_id == AutomationChannel::PARAM_MASTER_TEMPO)
        .collect();

    if tempo_channels.is_empty() {
        return Ok(Vec::new());
    }

    let mut clips = Vec::new();
    for auto_chan in &tempo_channels {
        let channel = channels
            .get(auto_chan.channel_index as usize)
            .ok_or(BinaryProjectError::MalformedAutomationChannelId(
                auto_chan.channel_index,
            ))?;

        for item in playlist_items
            .iter()
            .filter(|i| i.channel_id == channel.id && !i.muted())
        {
            let points = resolve_playlist_item_points(pulses_per_beat, channel, item);
            if points.is_empty() {
                continue;
            }
            let start_beat = item.start_pulse as f64 / pulses_per_beat as f64;
            let len = item.len_pulses as f64 / pulses_per_beat as f64;
            clips.push(Clip {
                start_beat,
                len,
                points,
            });
        }
    }

    clips.sort_by(|a, b| a.start_beat.partial_cmp(&b.start_beat).unwrap());
    let deduped = dedup_clips(clips);
    render_dedup_clips(&deduped)
}

fn resolve_playlist_item_points(
    pulses_per_beat: u16,
    channel: &Channel,
    item: &PlaylistItem,
) -> Vec<TempoPoint> {
    let mut curr_beat = item.start_pulse as f64 / pulses_per_beat as f64;
    let mut points = Vec::with_capacity(channel.automation_points.len());
    for point in &channel.automation_points {
        curr_beat += point.beat_increment;
        let bpm = convert_point_value_to_bpm(point.value);
        points.push(TempoPoint::new(curr_beat, bpm).with_track_id(item.track_id));
    }
    points
}

/// FL stores automation point values on a `value = bpm/120 - 0.5` scale.
fn convert_point_value_to_bpm(value: f64) -> f64 {
    (value + 0.5) * 120.0
}

/// Keeps the longest clip (by length, not point count) among any group of
/// clips sharing the exact same start beat.
fn dedup_clips(clips: Vec<Clip>) -> Vec<Clip> {
    let mut keep = vec![true; clips.len()];

    let mut i = 0;
    while i < clips.len() {
        let mut group = vec![i];
        let mut j = i + 1;
        while j < clips.len() && clips[j].start_beat == clips[i].start_beat {
            group.push(j);
            j += 1;
        }
        if group.len() > 1 {
            let longest = *group
                .iter()
                .max_by(|&&a, &&b| clips[a].len.partial_cmp(&clips[b].len).unwrap())
                .unwrap();
            for idx in group {
                if idx != longest {
                    keep[idx] = false;
                }
            }
        }
        i = j;
    }

    clips
        .into_iter()
        .zip(keep)
        .filter_map(|(clip, k)| k.then_some(clip))
        .collect()
}

fn render_dedup_clips(clips: &[Clip]) -> Result<Vec<TempoPoint>, BinaryProjectError> {
    let mut out = Vec::new();
    if clips.is_empty() {
        return Ok(out);
    }

    let first_point = &clips[0].points[0];
    if first_point.beat != 0.0 {
        out.push(TempoPoint::artificial(0.0, first_point.bpm));
    }

    for (i, curr) in clips.iter().enumerate() {
        if i == clips.len() - 1 {
            out.extend(curr.points.iter().cloned());
            break;
        }

        let next = &clips[i + 1];
        let curr_last = curr.points.last().expect("clips always have >= 1 point");
        let curr_last_beat = curr_last.beat;

        if next.start_beat == curr_last_beat {
            out.extend(curr.points.iter().cloned());
        } else if next.start_beat > curr_last_beat {
            out.extend(curr.points.iter().cloned());
            out.push(TempoPoint::artificial(next.start_beat, curr_last.bpm));
        } else {
            render_overlap(&mut out, curr, next.start_beat)?;
        }
    }

    Ok(out)
}

fn render_overlap(out: &mut Vec<TempoPoint>, curr: &Clip, overlap_beat: f64) -> Result<(), BinaryProjectError> {
    out.extend(curr.points.iter().filter(|p| p.beat < overlap_beat).cloned());

    let at_overlap: Vec<&TempoPoint> = curr
        .points
        .iter()
        .filter(|p| p.beat == overlap_beat)
        .collect();
    if !at_overlap.is_empty() {
        out.extend(at_overlap.into_iter().cloned());
        return Ok(());
    }

    let bracket = curr
        .points
        .windows(2)
        .find(|w| w[0].beat < overlap_beat && overlap_beat < w[1].beat);
    let [prev_overlap, post_overlap] = bracket
        .ok_or(BinaryProjectError::ClipInvariantViolated(overlap_beat))?
    else {
        unreachable!("windows(2) always yields 2-element slices")
    };

    let bpm = if prev_overlap.bpm == post_overlap.bpm {
        prev_overlap.bpm
    } else {
        interpolate_bpm(
            overlap_beat,
            prev_overlap.beat,
            prev_overlap.bpm,
            post_overlap.beat,
            post_overlap.bpm,
        )
    };
    out.push(TempoPoint::artificial(overlap_beat, bpm));
    Ok(())
}

fn interpolate_bpm(beat: f64, first_beat: f64, first_bpm: f64, second_beat: f64, second_bpm: f64) -> f64 {
    let slope = (second_bpm - first_bpm) / (second_beat - first_beat);
    first_bpm + slope * (beat - first_beat)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan(id: u16, points: Vec<(f64, f64)>) -> Channel {
        let mut c = Channel::new(id);
        c.automation_points = points
            .into_iter()
            .map(|(inc, value)| crate::types::ChannelAutomationPoint {
                beat_increment: inc,
                value,
                tension: 0.0,
                direction: 0,
            })
            .collect();
        c
    }

    fn master_tempo_chan(idx: u32) -> AutomationChannel {
        AutomationChannel {
            channel_index: idx,
            param_id: AutomationChannel::PARAM_MASTER_TEMPO,
            dest_id: AutomationChannel::DEST_MASTER,
        }
    }

    fn item(start: i32, channel_id: u16, len: u32, track_id: i64) -> PlaylistItem {
        PlaylistItem {
            start_pulse: start,
            channel_id,
            len_pulses: len,
            track_id,
            flags: 0,
        }
    }

    // value = bpm/120 - 0.5
    fn bpm_value(bpm: f64) -> f64 {
        bpm / 120.0 - 0.5
    }

    #[test]
    fn single_clip_no_gap_renders_points_verbatim() {
        let channels = vec![chan(0, vec![(0.0, bpm_value(120.0)), (4.0, bpm_value(140.0))])];
        let automation_channels = vec![master_tempo_chan(0)];
        let playlist_items = vec![item(0, 0, 384 * 8, 1)];

        let points =
            compose_tempo_automation(384, &channels, &automation_channels, &playlist_items)
                .unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].beat, 0.0);
        assert!((points[0].bpm - 120.0).abs() < 1e-9);
        assert_eq!(points[1].beat, 4.0);
        assert!((points[1].bpm - 140.0).abs() < 1e-9);
    }

    #[test]
    fn gap_between_clips_inserts_horizontal_hold() {
        let channels = vec![
            chan(0, vec![(0.0, bpm_value(100.0)), (2.0, bpm_value(100.0))]),
            chan(1, vec![(0.0, bpm_value(160.0))]),
        ];
        let automation_channels = vec![master_tempo_chan(0), master_tempo_chan(1)];
        // clip 0: beats [0,2], clip 1 starts at beat 8 (gap).
        let playlist_items = vec![item(0, 0, 384 * 2, 1), item(384 * 8, 1, 384, 2)];

        let points =
            compose_tempo_automation(384, &channels, &automation_channels, &playlist_items)
                .unwrap();
        // 2 real points from clip 0, 1 artificial bridging point at beat 8
        // holding 100bpm, then the real point from clip 1.
        assert_eq!(points.len(), 4);
        assert!(points[2].artificial);
        assert_eq!(points[2].beat, 8.0);
        assert!((points[2].bpm - 100.0).abs() < 1e-9);
    }

    #[test]
    fn same_start_beat_keeps_longest_clip() {
        let channels = vec![
            chan(0, vec![(0.0, bpm_value(90.0)), (1.0, bpm_value(90.0))]),
            chan(1, vec![(0.0, bpm_value(180.0)), (4.0, bpm_value(180.0))]),
        ];
        let automation_channels = vec![master_tempo_chan(0), master_tempo_chan(1)];
        let playlist_items = vec![item(0, 0, 384, 1), item(0, 1, 384 * 4, 2)];

        let points =
            compose_tempo_automation(384, &channels, &automation_channels, &playlist_items)
                .unwrap();
        assert!(points.iter().all(|p| (p.bpm - 180.0).abs() < 1e-9));
    }

    #[test]
    fn no_master_tempo_automation_yields_empty() {
        let points = compose_tempo_automation(384, &[], &[], &[]).unwrap();
        assert!(points.is_empty());
    }
}
