use crate::game::chart::{LANE_COUNT, Lane, Note, NoteKind, TrackPosition, Tracks};
use crate::game::error::ChartError;
use log::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellError {
    pub code: char,
    pub previous: TrackPosition,
}

/// Per-lane automaton for the grid cell grammar. `0` and `3` are
/// ambiguous on their own; what they mean depends on the last position
/// resolved on the same lane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackCursor {
    last: TrackPosition,
}

impl TrackCursor {
    #[inline(always)]
    pub const fn last(&self) -> TrackPosition {
        self.last
    }

    pub fn feed(&mut self, code: char) -> Result<TrackPosition, CellError> {
        use TrackPosition as P;
        let previous = self.last;
        let hold_open = matches!(previous, P::HoldHead | P::HoldTail);
        let roll_open = matches!(previous, P::RollHead | P::RollTail);
        let next = match code {
            '0' if hold_open => P::HoldTail,
            '0' if roll_open => P::RollTail,
            '0' => P::Empty,
            '1' => P::Step,
            '2' => P::HoldHead,
            '3' if hold_open => P::HoldTailEnd,
            '3' if roll_open => P::RollTailEnd,
            '4' => P::RollHead,
            'M' => P::Mine,
            _ => return Err(CellError { code, previous }),
        };
        self.last = next;
        Ok(next)
    }
}

/// Decodes a `#NOTES:` grid into beat-stamped `TrackValue` rows.
///
/// Measures are comma-separated and span 4 beats each; blank lines are
/// ignored and a measure with no rows is skipped without advancing the beat.
pub fn parse_note_grid(grid: &str) -> Result<Vec<Note>, ChartError> {
    let mut notes = Vec::new();
    let mut cursors = [TrackCursor::default(); LANE_COUNT];
    let mut measure_index = 0usize;

    for (raw_measure_index, measure) in grid.split(',').enumerate() {
        let rows: Vec<&str> = measure
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if rows.is_empty() {
            continue;
        }

        let value = 4.0 / rows.len() as f32;
        for (row_index, row) in rows.iter().enumerate() {
            let cells: Vec<char> = row.chars().take(LANE_COUNT).collect();
            if cells.len() < LANE_COUNT {
                return Err(ChartError::ShortRow {
                    measure: raw_measure_index,
                    row: row_index,
                    len: cells.len(),
                });
            }

            let mut positions = [TrackPosition::Empty; LANE_COUNT];
            for (lane, (&code, cursor)) in Lane::ALL.into_iter().zip(cells.iter().zip(&mut cursors)) {
                positions[lane.index()] = cursor.feed(code).map_err(|e| ChartError::UnknownCellCode {
                    code: e.code,
                    previous: e.previous,
                    measure: raw_measure_index,
                    row: row_index,
                    lane,
                })?;
            }

            let beat = (measure_index as f32).mul_add(4.0, row_index as f32 * value);
            notes.push(Note {
                beat,
                kind: NoteKind::TrackValue { value, tracks: Tracks(positions) },
            });
        }
        measure_index += 1;
    }

    debug!("Decoded {} grid rows across {measure_index} measures.", notes.len());
    Ok(notes)
}

/// Parses a `beat=value` table (BPMS, STOPS). Entries without `=` are
/// ignored, as are entries whose numbers do not parse.
pub fn parse_beat_table(s: &str) -> Vec<(f32, f32)> {
    let mut out = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        let Some((beat_str, value_str)) = part.split_once('=') else { continue; };
        let (Ok(beat), Ok(value)) = (beat_str.trim().parse::<f32>(), value_str.trim().parse::<f32>()) else {
            log::warn!("Skipping unparsable table entry '{part}'.");
            continue;
        };
        out.push((beat, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use TrackPosition as P;

    fn feed_all(codes: &str) -> Result<Vec<TrackPosition>, CellError> {
        let mut cursor = TrackCursor::default();
        codes.chars().map(|c| cursor.feed(c)).collect()
    }

    #[test]
    fn zero_after_open_hold_or_roll_becomes_tail_body() {
        assert_eq!(
            feed_all("2003").unwrap(),
            vec![P::HoldHead, P::HoldTail, P::HoldTail, P::HoldTailEnd]
        );
        assert_eq!(
            feed_all("403").unwrap(),
            vec![P::RollHead, P::RollTail, P::RollTailEnd]
        );
        assert_eq!(feed_all("230").unwrap()[2], P::Empty);
    }

    #[test]
    fn three_without_open_head_is_rejected_with_prior_state() {
        let err = feed_all("13").unwrap_err();
        assert_eq!(err, CellError { code: '3', previous: P::Step });
        let err = feed_all("X").unwrap_err();
        assert_eq!(err, CellError { code: 'X', previous: P::Empty });
    }

    #[test]
    fn mine_and_step_codes() {
        assert_eq!(feed_all("1M0").unwrap(), vec![P::Step, P::Mine, P::Empty]);
    }

    #[test]
    fn grid_rows_are_spaced_across_four_beats_per_measure() {
        let grid = "\n1000\n0000\n0100\n0000\n,\n0010\n0001\n";
        let notes = parse_note_grid(grid).unwrap();
        assert_eq!(notes.len(), 6);
        let beats: Vec<f32> = notes.iter().map(|n| n.beat).collect();
        assert_eq!(beats, vec![0.0, 1.0, 2.0, 3.0, 4.0, 6.0]);
        match notes[5].kind {
            NoteKind::TrackValue { value, tracks } => {
                assert_eq!(value, 2.0);
                assert_eq!(tracks.get(Lane::Right), P::Step);
            }
            _ => panic!("expected a grid row"),
        }
    }

    #[test]
    fn lane_state_carries_across_measures() {
        let grid = "2000\n0000\n,\n3000\n0000";
        let notes = parse_note_grid(grid).unwrap();
        let left: Vec<TrackPosition> = notes.iter().map(|n| n.position(Lane::Left)).collect();
        assert_eq!(left, vec![P::HoldHead, P::HoldTail, P::HoldTailEnd, P::Empty]);
    }

    #[test]
    fn bad_cell_reports_location() {
        let err = parse_note_grid("0000\n0X00").unwrap_err();
        match err {
            ChartError::UnknownCellCode { code, previous, measure, row, lane } => {
                assert_eq!((code, previous, measure, row, lane), ('X', P::Empty, 0, 1, Lane::Down));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            parse_note_grid("000").unwrap_err(),
            ChartError::ShortRow { len: 3, .. }
        ));
    }

    #[test]
    fn beat_table_skips_garbage() {
        let table = parse_beat_table("0.000=120.000,\n4.000=abc, junk ,8=150");
        assert_eq!(table, vec![(0.0, 120.0), (8.0, 150.0)]);
    }
}
