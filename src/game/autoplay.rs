use crate::game::chart::{Chart, LANE_COUNT};
use crate::game::error::LoadError;
use crate::game::gameplay::{self, State};
use crate::game::judgment::ScoreSnapshot;
use crate::game::tails::TailKind;
use log::{info, warn};

pub const FRAME_MS: f32 = 1000.0 / 60.0;
const ROLL_TAP_BEATS: f32 = 0.25;
// 30 minutes of frames
const MAX_FRAMES: u32 = 60 * 60 * 30;

/// Lanes to hold this frame: any hold whose range overlaps the beat span the
/// next update will cover.
fn held_lanes(state: &State) -> [bool; LANE_COUNT] {
    let now = state.current_beat;
    let next = (state.bpm / 60_000.0).mul_add(FRAME_MS, now);
    let mut held = [false; LANE_COUNT];
    for tail in state.tails.iter().filter(|t| t.kind == TailKind::Hold) {
        if next >= tail.beat && now <= tail.end_beat() {
            held[tail.lane.index()] = true;
        }
    }
    held
}

/// Presses every judgeable cell whose beat has been reached.
fn press_due_notes(state: &mut State, cursor: &mut usize) {
    while *cursor < state.notes.len() {
        let note = state.notes[*cursor];
        if note.beat > state.current_beat {
            break;
        }
        if let Some(tracks) = note.tracks() {
            for (lane, position) in tracks.iter() {
                if position.is_judgeable() {
                    gameplay::handle_input(state, lane);
                }
            }
        }
        *cursor += 1;
    }
}

fn tap_rolls(state: &mut State, last_tap: &mut [Option<f32>]) {
    for index in 0..state.tails.len() {
        let tail = state.tails[index];
        if tail.kind != TailKind::Roll || !tail.contains_beat(state.current_beat) {
            continue;
        }
        let Some(head) = state.tail_head_indices[index] else { continue; };
        if !state.note_states[head].lane_hit(tail.lane) {
            continue;
        }
        let due = last_tap[index].is_none_or(|b| state.current_beat - b >= ROLL_TAP_BEATS);
        if due {
            last_tap[index] = Some(state.current_beat);
            gameplay::handle_input(state, tail.lane);
        }
    }
}

/// Plays `level_index` of `chart` perfectly at 60 frames per second: every
/// step and head on its beat, every hold held to its end, every roll tapped
/// each quarter beat. Listeners already registered on `state.events` see
/// the whole run.
pub fn autoplay(state: &mut State, chart: &Chart, level_index: usize) -> Result<ScoreSnapshot, LoadError> {
    gameplay::load_chart(state, chart, level_index)?;
    gameplay::start(state);

    let mut press_cursor = 0usize;
    let mut last_roll_tap = vec![None; state.tails.len()];
    let mut clock_ms = 0.0f64;
    let mut frames = 0u32;

    press_due_notes(state, &mut press_cursor);
    while !gameplay::is_finished(state) {
        if frames >= MAX_FRAMES {
            warn!("Autoplay stopped after {frames} frames at beat {:.2} without finishing.", state.current_beat);
            break;
        }
        let held = held_lanes(state);
        clock_ms += f64::from(FRAME_MS);
        gameplay::update(state, FRAME_MS, clock_ms, &held);
        press_due_notes(state, &mut press_cursor);
        tap_rolls(state, &mut last_roll_tap);
        frames += 1;
    }
    gameplay::stop(state);

    info!("Autoplay ran {frames} frames ({:.1}s).", clock_ms / 1000.0);
    Ok(gameplay::score_snapshot(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::gameplay::{GameConfig, init};
    use crate::game::judgment::Judgment;
    use crate::game::parsing::simfile;
    use std::path::Path;

    const CHART: &str = "\
#TITLE:Auto;
#MUSIC:a.ogg;
#BPMS:0=150,8=90;
#STOPS:4=0.25;
#NOTEDATA:;
#DIFFICULTY:Medium;
#METER:5;
#NOTES:
1000
0100
0010
0001
,
2000
0000
3000
1001
,
0400
0000
0000
0300
;
";

    #[test]
    fn autoplay_is_flawless() {
        let chart = simfile::parse(CHART, Path::new("")).unwrap();
        let mut state = init(GameConfig::default());
        let snap = autoplay(&mut state, &chart, 0).unwrap();

        assert!(gameplay::is_finished(&state));
        assert_eq!(snap.tallies.iter().find(|(j, _)| *j == Judgment::Miss).map(|t| t.1), Some(0));
        assert_eq!(snap.combo, snap.max_combo);
        // 4 steps + hold head + jump (2) + roll head, then roll taps
        assert!(snap.max_combo > 8, "roll taps add to combo, got {}", snap.max_combo);
        assert!(state.note_states.iter().all(|n| !n.is_resolved() || n.hit || n.lanes_hit.is_empty()));
        assert!(state.tail_meta.iter().all(|m| m.is_completed()), "{:?}", state.tail_meta);
    }

    #[test]
    fn bad_level_is_reported() {
        let chart = simfile::parse(CHART, Path::new("")).unwrap();
        let mut state = init(GameConfig::default());
        assert_eq!(
            autoplay(&mut state, &chart, 1),
            Err(LoadError::InvalidLevelIndex { index: 1, available: 1 })
        );
    }
}
