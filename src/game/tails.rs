use crate::game::chart::{Lane, Note, NoteKind, TrackPosition};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TailKind {
    Hold,
    Roll,
}

impl TailKind {
    #[inline(always)]
    pub const fn head_position(self) -> TrackPosition {
        match self {
            Self::Hold => TrackPosition::HoldHead,
            Self::Roll => TrackPosition::RollHead,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TailDiagnostic {
    /// No matching end marker before the chart ran out; `duration` is partial.
    Unterminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tail {
    pub kind: TailKind,
    pub lane: Lane,
    pub beat: f32,
    /// Beats from the head to the end marker.
    pub duration: f32,
    pub diagnostic: Option<TailDiagnostic>,
}

impl Tail {
    #[inline(always)]
    pub fn end_beat(&self) -> f32 {
        self.beat + self.duration
    }

    #[inline(always)]
    pub fn contains_beat(&self, beat: f32) -> bool {
        beat >= self.beat && beat <= self.end_beat()
    }

    #[inline(always)]
    pub const fn is_unterminated(&self) -> bool {
        matches!(self.diagnostic, Some(TailDiagnostic::Unterminated))
    }
}

/// Sums row widths from the head row (inclusive) up to the first row whose
/// cell on `lane` is an end marker, so the result equals end beat minus head
/// beat. Returns `None` as the second value when no end marker exists.
fn find_tail_end(notes: &[Note], lane: Lane, start: usize) -> (f32, Option<usize>) {
    let mut duration = 0.0;
    for (offset, note) in notes[start..].iter().enumerate() {
        let NoteKind::TrackValue { value, tracks } = note.kind else { continue; };
        if tracks.get(lane).is_tail_end() {
            return (duration, Some(start + offset));
        }
        duration += value;
    }
    (duration, None)
}

/// One `Tail` per hold/roll head, in note order then lane order.
///
/// Control notes are skipped, so this can run on parser order or on the
/// merged timeline alike.
pub fn resolve_tails(notes: &[Note]) -> Vec<Tail> {
    let mut tails = Vec::new();
    for (index, note) in notes.iter().enumerate() {
        let Some(tracks) = note.tracks() else { continue; };
        for (lane, position) in tracks.iter() {
            let kind = match position {
                TrackPosition::HoldHead => TailKind::Hold,
                TrackPosition::RollHead => TailKind::Roll,
                _ => continue,
            };
            let (duration, end) = find_tail_end(notes, lane, index);
            let diagnostic = if end.is_none() {
                warn!(
                    "Found unterminated {kind:?} tail on lane {lane} at beat {:.3}; using partial duration {duration:.3}.",
                    note.beat
                );
                Some(TailDiagnostic::Unterminated)
            } else {
                None
            };
            tails.push(Tail { kind, lane, beat: note.beat, duration, diagnostic });
        }
    }
    tails
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::Tracks;
    use crate::game::parsing::notes::parse_note_grid;

    #[test]
    fn duration_sums_rows_between_head_and_end() {
        // 8 rows per measure, 0.5 beat each; hold ends on row 3.
        let notes = parse_note_grid("2000\n0000\n0000\n3000\n0000\n0000\n0000\n0000").unwrap();
        let tails = resolve_tails(&notes);
        assert_eq!(tails.len(), 1);
        let tail = tails[0];
        assert_eq!(tail.kind, TailKind::Hold);
        assert_eq!(tail.lane, Lane::Left);
        assert_eq!(tail.beat, 0.0);
        assert_eq!(tail.duration, 1.5);
        assert!(!tail.is_unterminated());
    }

    #[test]
    fn duration_spans_measures_of_different_density() {
        let notes = parse_note_grid("0040\n0000\n,\n0000\n0000\n0030\n0000").unwrap();
        let tails = resolve_tails(&notes);
        assert_eq!(tails.len(), 1);
        assert_eq!(tails[0].kind, TailKind::Roll);
        assert_eq!(tails[0].lane, Lane::Up);
        // two 2-beat rows, then two 1-beat rows before the end marker
        assert_eq!(tails[0].duration, 6.0);
        assert_eq!(tails[0].end_beat(), 6.0);
    }

    #[test]
    fn control_notes_do_not_add_duration() {
        let mut notes = parse_note_grid("2000\n0000\n3000\n0000").unwrap();
        notes.insert(1, Note { beat: 0.5, kind: NoteKind::SetBpm { bpm: 200.0 } });
        notes.insert(2, Note { beat: 0.5, kind: NoteKind::Stop { seconds: 1.0 } });
        let tails = resolve_tails(&notes);
        assert_eq!(tails[0].duration, 2.0);
    }

    #[test]
    fn every_head_gets_one_tail() {
        let notes = parse_note_grid("2424\n0000\n3333\n0000").unwrap();
        let tails = resolve_tails(&notes);
        let lanes: Vec<Lane> = tails.iter().map(|t| t.lane).collect();
        assert_eq!(lanes, Lane::ALL.to_vec());
        assert!(tails.iter().all(|t| t.duration == 2.0));
        assert_eq!(tails[1].kind, TailKind::Roll);
    }

    #[test]
    fn unterminated_tail_is_flagged_not_fatal() {
        let notes = parse_note_grid("0200\n0000\n0000\n0000").unwrap();
        let tails = resolve_tails(&notes);
        assert_eq!(tails.len(), 1);
        assert!(tails[0].is_unterminated());
        assert_eq!(tails[0].duration, 4.0);
    }

    #[test]
    fn head_on_last_row_keeps_its_own_width() {
        let notes = vec![Note {
            beat: 0.0,
            kind: NoteKind::TrackValue {
                value: 1.0,
                tracks: Tracks([TrackPosition::HoldHead, TrackPosition::Empty, TrackPosition::Empty, TrackPosition::Empty]),
            },
        }];
        let tails = resolve_tails(&notes);
        assert_eq!(tails[0].duration, 1.0);
        assert!(tails[0].is_unterminated());
    }
}
