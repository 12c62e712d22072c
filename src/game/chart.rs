use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const LANE_COUNT: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Lane {
    Left = 0,
    Down = 1,
    Up = 2,
    Right = 3,
}

impl Lane {
    pub const ALL: [Lane; LANE_COUNT] = [Lane::Left, Lane::Down, Lane::Up, Lane::Right];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Down),
            2 => Some(Self::Up),
            3 => Some(Self::Right),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Down => "down",
            Self::Up => "up",
            Self::Right => "right",
        }
    }
}

impl FromStr for Lane {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "down" => Ok(Self::Down),
            "up" => Ok(Self::Up),
            "right" => Ok(Self::Right),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved meaning of one grid cell. `HoldTail`/`RollTail` mark the body
/// rows between a head and its end marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackPosition {
    #[default]
    Empty,
    Step,
    HoldHead,
    HoldTail,
    HoldTailEnd,
    RollHead,
    RollTail,
    RollTailEnd,
    Mine,
}

impl TrackPosition {
    /// Cells a player has to press: steps and hold/roll heads.
    #[inline(always)]
    pub const fn is_judgeable(self) -> bool {
        matches!(self, Self::Step | Self::HoldHead | Self::RollHead)
    }

    #[inline(always)]
    pub const fn is_head(self) -> bool {
        matches!(self, Self::HoldHead | Self::RollHead)
    }

    #[inline(always)]
    pub const fn is_tail_end(self) -> bool {
        matches!(self, Self::HoldTailEnd | Self::RollTailEnd)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "NONE",
            Self::Step => "STEP",
            Self::HoldHead => "HOLD_HEAD",
            Self::HoldTail => "HOLD_TAIL",
            Self::HoldTailEnd => "HOLD_TAIL_END",
            Self::RollHead => "ROLL_HEAD",
            Self::RollTail => "ROLL_TAIL",
            Self::RollTailEnd => "ROLL_TAIL_END",
            Self::Mine => "MINE",
        }
    }
}

impl std::fmt::Display for TrackPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracks(pub [TrackPosition; LANE_COUNT]);

impl Tracks {
    #[inline(always)]
    pub const fn get(&self, lane: Lane) -> TrackPosition {
        self.0[lane.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lane, TrackPosition)> + '_ {
        Lane::ALL.into_iter().map(|lane| (lane, self.get(lane)))
    }

    #[inline(always)]
    pub fn has_judgeable(&self) -> bool {
        self.0.iter().any(|p| p.is_judgeable())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteKind {
    /// Shifts the beat origin by `value` beats.
    Offset { value: f32 },
    SetBpm { bpm: f32 },
    /// Pauses the clock for `seconds`.
    Stop { seconds: f32 },
    /// One playable grid row; `value` is its width in beats (4 / rows in measure).
    TrackValue { value: f32, tracks: Tracks },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub beat: f32,
    #[serde(flatten)]
    pub kind: NoteKind,
}

impl Note {
    #[inline(always)]
    pub fn tracks(&self) -> Option<&Tracks> {
        match &self.kind {
            NoteKind::TrackValue { tracks, .. } => Some(tracks),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn is_control(&self) -> bool {
        !matches!(self.kind, NoteKind::TrackValue { .. })
    }

    /// Position on `lane`, or `Empty` for control notes.
    #[inline(always)]
    pub fn position(&self, lane: Lane) -> TrackPosition {
        self.tracks().map_or(TrackPosition::Empty, |t| t.get(lane))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartLevel {
    pub label: String,
    pub meter: u32,
    pub notes: Vec<Note>,
}

impl ChartLevel {
    /// Control and row notes merged into one ascending-beat timeline.
    /// The sort is stable, so control notes keep their place ahead of rows
    /// that share their beat.
    pub fn timeline(&self) -> Vec<Note> {
        let mut notes = self.notes.clone();
        notes.sort_by(|a, b| a.beat.total_cmp(&b.beat));
        notes
    }

    pub fn row_count(&self) -> usize {
        self.notes.iter().filter(|n| !n.is_control()).count()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub subtitle: Option<String>,
    pub genre: Option<String>,
    pub author: String,
    pub artist: String,
    pub music_path: PathBuf,
    pub background_path: Option<PathBuf>,
    pub banner_path: Option<PathBuf>,
    pub lyrics_path: Option<PathBuf>,
    pub cd_image_path: Option<PathBuf>,
    pub sample_start_ms: f32,
    pub sample_end_ms: f32,
    /// Label of the easiest level.
    pub sample_level: String,
    pub selectable: bool,
    /// Sorted ascending by meter.
    pub levels: Vec<ChartLevel>,
}

impl Chart {
    #[inline(always)]
    pub fn level(&self, index: usize) -> Option<&ChartLevel> {
        self.levels.get(index)
    }
}
