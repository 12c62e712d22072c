use crate::game::chart::{Chart, LANE_COUNT, Lane, Note, NoteKind, Tracks};
use crate::game::error::LoadError;
use crate::game::events::{EngineWarning, EventBus, GameEvent, MissCause, TailMeta};
use crate::game::judgment::{DroppedHoldPolicy, Judgment, ScoreSnapshot, Scoring};
use crate::game::tails::{Tail, TailKind, resolve_tails};
use crate::game::timing_windows::{BASE_BOO_MS, TimingTable};
use bitflags::bitflags;
use log::{debug, info, warn};
use smallvec::SmallVec;

pub const DEFAULT_BPM: f32 = 100.0;
pub const HOLD_SCORE_PER_SECOND: f64 = 10.0;
pub const HOLD_GRACE_BEATS: f32 = 0.1;
const HEARTBEAT_MS: f32 = 1000.0;

// --- Configuration ---

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub timing: TimingTable,
    /// A row this far (ms) behind the current beat is abandoned as missed.
    pub miss_window_ms: f32,
    pub hold_score_per_second: f64,
    /// Beats past a hold's start before letting go counts as a drop.
    pub hold_grace_beats: f32,
    /// Tempo in force until the first SetBpm note is drained.
    pub initial_bpm: f32,
    pub dropped_hold_policy: DroppedHoldPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            timing: TimingTable::standard(),
            miss_window_ms: BASE_BOO_MS,
            hold_score_per_second: HOLD_SCORE_PER_SECOND,
            hold_grace_beats: HOLD_GRACE_BEATS,
            initial_bpm: DEFAULT_BPM,
            dropped_hold_policy: DroppedHoldPolicy::None,
        }
    }
}

// --- Input ---

/// Whether a lane is currently held, sampled once per `update`.
pub trait InputProbe {
    fn is_down(&self, lane: Lane) -> bool;
}

impl InputProbe for [bool; LANE_COUNT] {
    #[inline(always)]
    fn is_down(&self, lane: Lane) -> bool {
        self[lane.index()]
    }
}

impl<F: Fn(Lane) -> bool> InputProbe for F {
    #[inline(always)]
    fn is_down(&self, lane: Lane) -> bool {
        self(lane)
    }
}

// --- Runtime state ---

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LaneMask: u8 {
        const LEFT = 1 << 0;
        const DOWN = 1 << 1;
        const UP = 1 << 2;
        const RIGHT = 1 << 3;
    }
}

impl LaneMask {
    #[inline(always)]
    pub const fn of(lane: Lane) -> Self {
        Self::from_bits_retain(1 << lane.index())
    }

    pub fn judgeable(tracks: &Tracks) -> Self {
        tracks
            .iter()
            .filter(|(_, p)| p.is_judgeable())
            .fold(Self::empty(), |mask, (lane, _)| mask | Self::of(lane))
    }
}

/// Per-note runtime state. `hit` and `missed` are terminal and exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteState {
    pub hit: bool,
    pub missed: bool,
    /// Grade of the first lane hit on this row.
    pub judgment: Option<Judgment>,
    pub lanes_hit: LaneMask,
}

impl NoteState {
    #[inline(always)]
    pub const fn is_resolved(&self) -> bool {
        self.hit || self.missed
    }

    #[inline(always)]
    pub const fn lane_hit(&self, lane: Lane) -> bool {
        self.lanes_hit.contains(LaneMask::of(lane))
    }
}

#[derive(Debug)]
pub struct State {
    pub config: GameConfig,
    pub events: EventBus,
    pub scoring: Scoring,

    // Chart data, read-only once loaded
    pub notes: Vec<Note>,
    pub tails: Vec<Tail>,
    pub level_index: Option<usize>,

    // Index-correlated runtime arrays
    pub note_states: Vec<NoteState>,
    pub tail_meta: Vec<TailMeta>,
    pub tail_head_indices: Vec<Option<usize>>,
    head_tails: Vec<SmallVec<[usize; 2]>>,

    // Clock
    pub current_beat: f32,
    pub bpm: f32,
    next_beat: f32,
    chart_index: usize,
    stop_until_ms: Option<f64>,
    paused: bool,

    next_miss_cursor: usize,
    playing: bool,
    finished: bool,
    log_timer_ms: f32,
}

pub fn init(config: GameConfig) -> State {
    let scoring = Scoring::new(
        config.timing.clone(),
        config.hold_score_per_second,
        config.dropped_hold_policy,
    );
    State {
        bpm: config.initial_bpm,
        config,
        events: EventBus::new(),
        scoring,
        notes: Vec::new(),
        tails: Vec::new(),
        level_index: None,
        note_states: Vec::new(),
        tail_meta: Vec::new(),
        tail_head_indices: Vec::new(),
        head_tails: Vec::new(),
        current_beat: 0.0,
        next_beat: 0.0,
        chart_index: 0,
        stop_until_ms: None,
        paused: false,
        next_miss_cursor: 0,
        playing: false,
        finished: false,
        log_timer_ms: 0.0,
    }
}

#[inline(always)]
pub const fn is_playing(state: &State) -> bool {
    state.playing
}

#[inline(always)]
pub const fn is_finished(state: &State) -> bool {
    state.finished
}

pub fn score_snapshot(state: &State) -> ScoreSnapshot {
    state.scoring.snapshot()
}

/// First row at `beat` whose cell on `lane` is the head kind that opened `tail`.
fn find_head_index(notes: &[Note], tail: &Tail) -> Option<usize> {
    let head = tail.kind.head_position();
    notes
        .iter()
        .position(|n| n.beat == tail.beat && n.tracks().is_some_and(|t| t.get(tail.lane) == head))
}

fn rebuild_runtime(state: &mut State) {
    state.note_states = vec![NoteState::default(); state.notes.len()];
    state.tail_meta = vec![TailMeta::default(); state.tails.len()];
    state.tail_head_indices = state.tails.iter().map(|t| find_head_index(&state.notes, t)).collect();

    state.head_tails = vec![SmallVec::new(); state.notes.len()];
    for (tail_index, head) in state.tail_head_indices.iter().enumerate() {
        match head {
            Some(h) => state.head_tails[*h].push(tail_index),
            None => state.tail_meta[tail_index].active = false,
        }
    }
}

fn clear_clock(state: &mut State) {
    state.playing = false;
    state.finished = false;
    state.current_beat = 0.0;
    state.next_beat = 0.0;
    state.bpm = state.config.initial_bpm;
    state.chart_index = 0;
    state.stop_until_ms = None;
    state.paused = false;
    state.next_miss_cursor = 0;
    state.log_timer_ms = 0.0;
}

fn emit_score_state(state: &State) {
    state.events.emit(&GameEvent::ScoreChange { score: state.scoring.score });
    state.events.emit(&GameEvent::ComboChange {
        combo: state.scoring.combo,
        max_combo: state.scoring.max_combo,
    });
}

fn update_tail(state: &mut State, index: usize, apply: impl FnOnce(&mut TailMeta)) {
    let meta = &mut state.tail_meta[index];
    let before = *meta;
    apply(meta);
    if *meta != before {
        let meta = *meta;
        state.events.emit(&GameEvent::TailUpdate { index, meta });
    }
}

// --- Lifecycle ---

/// Loads one level of `chart`. On an invalid index the previous chart and
/// runtime state are left untouched.
pub fn load_chart(state: &mut State, chart: &Chart, level_index: usize) -> Result<(), LoadError> {
    let Some(level) = chart.level(level_index) else {
        warn!(
            "Level index {level_index} out of range for '{}' ({} levels).",
            chart.title,
            chart.levels.len()
        );
        return Err(LoadError::InvalidLevelIndex { index: level_index, available: chart.levels.len() });
    };

    state.notes = level.timeline();
    state.tails = resolve_tails(&state.notes);
    state.level_index = Some(level_index);
    clear_clock(state);
    state.scoring.reset();
    rebuild_runtime(state);

    for (index, tail) in state.tails.iter().enumerate() {
        if tail.is_unterminated() {
            state.events.emit(&GameEvent::Warning(EngineWarning::UnterminatedTail {
                tail: index,
                lane: tail.lane,
                beat: tail.beat,
            }));
        }
        if state.tail_head_indices[index].is_none() {
            warn!("No head note found for {:?} tail on lane {} at beat {:.3}.", tail.kind, tail.lane, tail.beat);
            state.events.emit(&GameEvent::Warning(EngineWarning::UnmatchedTailHead {
                tail: index,
                lane: tail.lane,
                beat: tail.beat,
            }));
        }
    }

    info!(
        "Loaded '{}' level '{}' [{}]: {} notes, {} tails.",
        chart.title,
        level.label,
        level.meter,
        state.notes.len(),
        state.tails.len()
    );
    Ok(())
}

pub fn start(state: &mut State) {
    state.playing = true;
}

pub fn stop(state: &mut State) {
    state.playing = false;
}

/// Rewinds to beat 0 with fresh note/tail state. The loaded level stays.
pub fn reset(state: &mut State) {
    clear_clock(state);
    state.scoring.reset();
    rebuild_runtime(state);
    emit_score_state(state);
}

// --- Per-frame update ---

/// Advances the simulation by `delta_ms`. `clock_ms` is the caller's wall
/// clock, used only to time STOP pauses.
pub fn update(state: &mut State, delta_ms: f32, clock_ms: f64, input: &impl InputProbe) {
    if !state.playing || state.finished {
        return;
    }

    advance_beat(state, delta_ms, clock_ms);
    apply_time_based_misses(state);
    update_tails(state, delta_ms, input);
    check_finished(state);

    state.log_timer_ms += delta_ms;
    if state.log_timer_ms >= HEARTBEAT_MS {
        info!(
            "Beat: {:.2}, BPM: {:.1}, Combo: {}, Score: {:.1}",
            state.current_beat, state.bpm, state.scoring.combo, state.scoring.score
        );
        state.log_timer_ms -= HEARTBEAT_MS;
    }
}

#[inline(always)]
fn pause_blocks(state: &State, clock_ms: f64) -> bool {
    state.stop_until_ms.is_some_and(|until| until > clock_ms)
}

fn advance_beat(state: &mut State, delta_ms: f32, clock_ms: f64) {
    if pause_blocks(state, clock_ms) {
        state.paused = true;
        state.events.emit(&GameEvent::Pause { active: true });
        return;
    }
    if state.paused {
        state.paused = false;
        state.stop_until_ms = None;
        state.events.emit(&GameEvent::Pause { active: false });
    }

    if state.current_beat >= state.next_beat {
        while let Some(note) = state.notes.get(state.chart_index).copied() {
            state.chart_index += 1;
            match note.kind {
                NoteKind::Offset { value } => state.current_beat += value,
                NoteKind::SetBpm { bpm } => {
                    state.bpm = bpm;
                    debug!("BPM change to {bpm:.3} at beat {:.3}.", note.beat);
                    state.events.emit(&GameEvent::BpmChange { bpm });
                }
                NoteKind::Stop { seconds } => {
                    state.stop_until_ms = Some(f64::from(seconds).mul_add(1000.0, clock_ms));
                }
                NoteKind::TrackValue { value, .. } => {
                    state.next_beat += value;
                    break;
                }
            }
        }
    }

    if pause_blocks(state, clock_ms) {
        state.paused = true;
        state.events.emit(&GameEvent::Pause { active: true });
        return;
    }
    state.current_beat += state.bpm / 60_000.0 * delta_ms;
    state.events.emit(&GameEvent::BeatUpdate { beat: state.current_beat });
}

/// Signed distance in ms from the current beat to `beat` at the current tempo.
#[inline(always)]
fn time_diff_ms(state: &State, beat: f32) -> f32 {
    (beat - state.current_beat) * (60_000.0 / state.bpm)
}

fn apply_time_based_misses(state: &mut State) {
    let miss_window = state.config.miss_window_ms;
    let mut cursor = state.next_miss_cursor;
    while cursor < state.notes.len() {
        let note = state.notes[cursor];
        let Some(tracks) = note.tracks() else {
            cursor += 1;
            continue;
        };
        if state.note_states[cursor].is_resolved() {
            cursor += 1;
            continue;
        }
        if time_diff_ms(state, note.beat) >= -miss_window {
            break;
        }

        let pending = LaneMask::judgeable(tracks).difference(state.note_states[cursor].lanes_hit);
        state.note_states[cursor].missed = true;
        if !pending.is_empty() {
            state.scoring.add_miss();
            debug!("MISSED (time-based): note {cursor} at beat {:.3}, lanes {pending:?}", note.beat);
            state.events.emit(&GameEvent::Miss {
                lane: None,
                note_index: Some(cursor),
                cause: MissCause::Timeout,
            });
            emit_score_state(state);

            let rooted = state.head_tails[cursor].clone();
            for tail_index in rooted {
                if pending.contains(LaneMask::of(state.tails[tail_index].lane)) {
                    update_tail(state, tail_index, |m| m.active = false);
                }
            }
        }
        cursor += 1;
    }
    state.next_miss_cursor = cursor;
}

fn update_tails(state: &mut State, delta_ms: f32, input: &impl InputProbe) {
    for index in 0..state.tails.len() {
        let meta = state.tail_meta[index];
        if meta.is_settled() {
            continue;
        }
        let tail = state.tails[index];
        let Some(head) = state.tail_head_indices[index] else { continue; };
        let head_state = state.note_states[head];
        let head_hit = head_state.lane_hit(tail.lane);

        if head_state.missed && !head_hit {
            update_tail(state, index, |m| m.active = false);
            continue;
        }
        if !head_hit {
            continue;
        }

        if state.current_beat > tail.end_beat() {
            update_tail(state, index, |m| {
                m.holding = false;
                m.available = false;
            });
            debug!("{:?} on lane {} completed at beat {:.3}.", tail.kind, tail.lane, state.current_beat);
            continue;
        }
        if tail.kind != TailKind::Hold {
            continue;
        }

        if tail.contains_beat(state.current_beat) {
            if input.is_down(tail.lane) {
                update_tail(state, index, |m| m.holding = true);
                state.scoring.add_hold_tick(f64::from(delta_ms));
                state.events.emit(&GameEvent::ScoreChange { score: state.scoring.score });
            } else if state.current_beat > tail.beat + state.config.hold_grace_beats {
                update_tail(state, index, |m| {
                    m.holding = false;
                    m.dropped = true;
                    m.active = false;
                });
                state.scoring.dropped_hold();
                debug!("Hold on lane {} dropped at beat {:.3}.", tail.lane, state.current_beat);
                if state.config.dropped_hold_policy != DroppedHoldPolicy::None {
                    emit_score_state(state);
                }
            }
        } else if meta.holding {
            update_tail(state, index, |m| m.holding = false);
        }
    }
}

/// Whether a tail can still change state: its head lane was hit and it is
/// neither completed nor dropped.
fn tail_is_live(state: &State, index: usize) -> bool {
    if state.tail_meta[index].is_settled() {
        return false;
    }
    state.tail_head_indices[index]
        .is_some_and(|h| state.note_states[h].lane_hit(state.tails[index].lane))
}

fn check_finished(state: &mut State) {
    if state.next_miss_cursor < state.notes.len() || state.chart_index < state.notes.len() {
        return;
    }
    if (0..state.tails.len()).any(|i| tail_is_live(state, i)) {
        return;
    }
    state.finished = true;
    info!(
        "Chart finished at beat {:.2}. Score: {:.1}, Max combo: {}",
        state.current_beat, state.scoring.score, state.scoring.max_combo
    );
    state.events.emit(&GameEvent::Finished);
}

// --- Input ---

/// Judges one press on `lane`: a pending note, else a roll tap, else a ghost tap.
pub fn handle_input(state: &mut State, lane: Lane) {
    if !state.playing || state.finished {
        return;
    }
    if judge_a_tap(state, lane) || judge_a_roll_tap(state, lane) {
        return;
    }

    state.scoring.add_miss();
    debug!("Ghost tap on lane {lane} at beat {:.3}.", state.current_beat);
    state.events.emit(&GameEvent::Miss { lane: Some(lane), note_index: None, cause: MissCause::Ghost });
    emit_score_state(state);
}

/// Earliest unresolved row with a judgeable cell on `lane` not yet hit.
fn find_pending_note(state: &State, lane: Lane) -> Option<usize> {
    (state.next_miss_cursor..state.notes.len()).find(|&i| {
        let ns = &state.note_states[i];
        !ns.missed && !ns.lane_hit(lane) && state.notes[i].position(lane).is_judgeable()
    })
}

fn judge_a_tap(state: &mut State, lane: Lane) -> bool {
    let Some(index) = find_pending_note(state, lane) else { return false; };
    let offset_ms = time_diff_ms(state, state.notes[index].beat);
    let Some(judgment) = state.scoring.classify(offset_ms) else { return false; };
    if !state.scoring.table().is_scorable(judgment) {
        return false;
    }

    let judgeable = state.notes[index].tracks().map_or(LaneMask::empty(), LaneMask::judgeable);
    let ns = &mut state.note_states[index];
    ns.lanes_hit |= LaneMask::of(lane);
    ns.hit = ns.lanes_hit.contains(judgeable);
    if ns.judgment.is_none() {
        ns.judgment = Some(judgment);
    }

    state.scoring.add_hit(judgment);
    debug!("HIT {judgment:?} on lane {lane}: note {index}, offset {offset_ms:.2}ms");
    state.events.emit(&GameEvent::Hit { lane, note_index: index, judgment, offset_ms: Some(offset_ms) });
    emit_score_state(state);
    true
}

fn judge_a_roll_tap(state: &mut State, lane: Lane) -> bool {
    let beat = state.current_beat;
    let found = state.tails.iter().enumerate().find_map(|(i, tail)| {
        if tail.kind != TailKind::Roll || tail.lane != lane || !tail.contains_beat(beat) {
            return None;
        }
        let head = state.tail_head_indices[i]?;
        state.note_states[head].lane_hit(lane).then_some(head)
    });
    let Some(head) = found else { return false; };

    let judgment = state.note_states[head]
        .judgment
        .unwrap_or_else(|| state.scoring.table().best());
    state.scoring.add_hit(judgment);
    state.events.emit(&GameEvent::Hit { lane, note_index: head, judgment, offset_ms: None });
    emit_score_state(state);
    true
}
