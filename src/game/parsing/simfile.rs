use crate::game::chart::{Chart, ChartLevel, Note, NoteKind};
use crate::game::error::ChartError;
use crate::game::parsing::notes::{parse_beat_table, parse_note_grid};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

// --- Tokenizing ---

/// Raw `#KEY:value;` segments in document order. Keys may repeat; the
/// per-level fields (NOTEDATA, DIFFICULTY, METER, NOTES) appear once per level.
struct Fields<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    fn tokenize(text: &'a str) -> Self {
        let pairs = text
            .split('#')
            .filter_map(|segment| {
                let (key, rest) = segment.split_once(':')?;
                let value = rest.split(';').next().unwrap_or_default();
                Some((key.trim(), value.trim()))
            })
            .collect();
        Self { pairs }
    }

    /// Value of the `index`-th occurrence of `key`; empty values count as absent.
    fn get(&self, key: &str, index: usize) -> Option<&'a str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .nth(index)
            .map(|&(_, v)| v)
            .filter(|v| !v.is_empty())
    }

    #[inline(always)]
    fn first(&self, key: &str) -> Option<&'a str> {
        self.get(key, 0)
    }

    fn count(&self, key: &str) -> usize {
        self.pairs.iter().filter(|(k, _)| k.eq_ignore_ascii_case(key)).count()
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.find("//").map_or(line, |idx| &line[..idx]);
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[inline(always)]
fn parse_f32_or_zero(s: Option<&str>) -> f32 {
    s.and_then(|v| v.parse::<f32>().ok()).unwrap_or(0.0)
}

#[inline(always)]
fn resolve_media(base_path: &Path, file: Option<&str>) -> Option<PathBuf> {
    file.map(|f| base_path.join(f))
}

// --- Levels ---

/// Builds one level's note sequence: the offset note (if any), stops, BPM
/// changes, then the grid rows. Not sorted across kinds; consumers merge.
fn parse_level_notes(grid: &str, bpms: &str, stops: &str, offset: f32) -> Result<Vec<Note>, ChartError> {
    let mut notes = Vec::new();

    if offset != 0.0 {
        notes.push(Note { beat: 0.0, kind: NoteKind::Offset { value: -offset } });
    }
    notes.extend(
        parse_beat_table(stops)
            .into_iter()
            .map(|(beat, seconds)| Note { beat, kind: NoteKind::Stop { seconds } }),
    );
    notes.extend(
        parse_beat_table(bpms)
            .into_iter()
            .map(|(beat, bpm)| Note { beat, kind: NoteKind::SetBpm { bpm } }),
    );
    notes.extend(parse_note_grid(grid)?);
    Ok(notes)
}

fn parse_levels(fields: &Fields<'_>) -> Result<Vec<ChartLevel>, ChartError> {
    let bpms = fields.first("BPMS").ok_or(ChartError::MissingField { field: "BPMS" })?;
    let stops = fields.first("STOPS").unwrap_or_default();
    let offset = parse_f32_or_zero(fields.first("OFFSET"));

    let count = fields.count("NOTEDATA");
    let mut levels = Vec::with_capacity(count);
    for i in 0..count {
        let grid = fields.get("NOTES", i).ok_or(ChartError::MissingField { field: "NOTES" })?;
        let label = fields.get("DIFFICULTY", i).unwrap_or_default().to_string();
        let meter = fields
            .get("METER", i)
            .and_then(|m| m.parse::<u32>().ok())
            .unwrap_or(0);
        let notes = parse_level_notes(grid, bpms, stops, offset)?;
        info!(
            "  Level '{}' [{}] decoded with {} notes.",
            label,
            meter,
            notes.len()
        );
        levels.push(ChartLevel { label, meter, notes });
    }

    if levels.is_empty() {
        return Err(ChartError::MissingField { field: "NOTES" });
    }
    levels.sort_by_key(|level| level.meter);
    Ok(levels)
}

// --- Entry points ---

/// Parses an SSC document. Media references are resolved against `base_path`.
pub fn parse(source: &str, base_path: &Path) -> Result<Chart, ChartError> {
    let text = strip_comments(source);
    let fields = Fields::tokenize(&text);

    let title = fields.first("TITLE").ok_or(ChartError::MissingField { field: "TITLE" })?;
    let music = fields.first("MUSIC").ok_or(ChartError::MissingField { field: "MUSIC" })?;
    let levels = parse_levels(&fields)?;

    let sample_start_ms = parse_f32_or_zero(fields.first("SAMPLESTART")) * 1000.0;
    let sample_end_ms = parse_f32_or_zero(fields.first("SAMPLELENGTH")).mul_add(1000.0, sample_start_ms);

    let chart = Chart {
        title: title.to_string(),
        subtitle: fields.first("SUBTITLE").map(str::to_string),
        genre: fields.first("GENRE").map(str::to_string),
        author: fields.first("CREDIT").unwrap_or_default().to_string(),
        artist: fields.first("ARTIST").unwrap_or_default().to_string(),
        music_path: base_path.join(music),
        background_path: resolve_media(base_path, fields.first("BACKGROUND")),
        banner_path: resolve_media(base_path, fields.first("BANNER")),
        lyrics_path: resolve_media(base_path, fields.first("LYRICSPATH")),
        cd_image_path: resolve_media(base_path, fields.first("CDIMAGE")),
        sample_start_ms,
        sample_end_ms,
        sample_level: levels.first().map(|l| l.label.clone()).unwrap_or_default(),
        selectable: fields.first("SELECTABLE") != Some("NO"),
        levels,
    };

    info!("Parsed chart '{}' with {} levels.", chart.title, chart.levels.len());
    Ok(chart)
}

/// Reads and parses a chart file; media paths resolve against its directory.
pub fn load_chart_file(path: &Path) -> Result<Chart, ChartError> {
    let source = fs::read_to_string(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_path = path.parent().unwrap_or_else(|| Path::new(""));
    parse(&source, base_path)
}
