use crate::game::gameplay::{DEFAULT_BPM, GameConfig, HOLD_GRACE_BEATS, HOLD_SCORE_PER_SECOND};
use crate::game::judgment::{DroppedHoldPolicy, Judgment};
use crate::game::timing_windows::{
    BASE_BOO_MS, BASE_GOOD_MS, BASE_GREAT_MS, BASE_MARVELOUS_MS, BASE_PERFECT_MS, TimingTable,
    TimingWindow,
};
use log::{info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

pub const CONFIG_PATH: &str = "stepsim.ini";

// --- Minimal INI reader ---
#[derive(Debug, Default)]
pub struct SimpleIni {
    sections: HashMap<String, HashMap<String, String>>,
}

impl SimpleIni {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content);
        Ok(())
    }

    pub fn load_str(&mut self, content: &str) {
        self.sections.clear();
        let mut current_section: Option<String> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            // Section header: [SectionName]
            if line.starts_with('[') && line.ends_with(']') && line.len() >= 2 {
                let section = line[1..line.len() - 1].trim().to_string();
                current_section = Some(section.clone());
                self.sections.entry(section).or_default();
                continue;
            }

            // Key/value pair: key=value
            if let Some((key_raw, value_raw)) = line.split_once('=') {
                let key = key_raw.trim();
                if key.is_empty() {
                    continue;
                }
                let section = current_section.clone().unwrap_or_default();
                self.sections
                    .entry(section)
                    .or_default()
                    .insert(key.to_string(), value_raw.trim().to_string());
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section).and_then(|s| s.get(key)).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub marvelous_ms: f32,
    pub perfect_ms: f32,
    pub great_ms: f32,
    pub good_ms: f32,
    pub boo_ms: f32,
    pub miss_window_ms: f32,
    pub hold_score_per_second: f64,
    pub hold_grace_beats: f32,
    pub initial_bpm: f32,
    pub dropped_hold_policy: DroppedHoldPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            marvelous_ms: BASE_MARVELOUS_MS,
            perfect_ms: BASE_PERFECT_MS,
            great_ms: BASE_GREAT_MS,
            good_ms: BASE_GOOD_MS,
            boo_ms: BASE_BOO_MS,
            miss_window_ms: BASE_BOO_MS,
            hold_score_per_second: HOLD_SCORE_PER_SECOND,
            hold_grace_beats: HOLD_GRACE_BEATS,
            initial_bpm: DEFAULT_BPM,
            dropped_hold_policy: DroppedHoldPolicy::None,
        }
    }
}

impl Config {
    /// Engine settings derived from this config. Point values stay fixed;
    /// only the window widths are configurable.
    pub fn game(&self) -> GameConfig {
        let standard = TimingTable::standard();
        let width = |judgment: Judgment| match judgment {
            Judgment::Marvelous => self.marvelous_ms,
            Judgment::Perfect => self.perfect_ms,
            Judgment::Great => self.great_ms,
            Judgment::Good => self.good_ms,
            Judgment::Boo | Judgment::Miss => self.boo_ms,
        };
        let timing = TimingTable::new(
            standard
                .windows()
                .iter()
                .map(|w| TimingWindow { window_ms: width(w.judgment), ..*w })
                .collect(),
        );
        GameConfig {
            timing,
            miss_window_ms: self.miss_window_ms,
            hold_score_per_second: self.hold_score_per_second,
            hold_grace_beats: self.hold_grace_beats,
            initial_bpm: self.initial_bpm,
            dropped_hold_policy: self.dropped_hold_policy,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn default_config_text() -> String {
    let default = Config::default();
    let mut content = String::new();

    content.push_str("[Options]\n");
    content.push_str(&format!("LogLevel={}\n", default.log_level.as_str()));
    content.push('\n');

    // [Timing] section - keys in alphabetical order
    content.push_str("[Timing]\n");
    content.push_str(&format!("BooMs={}\n", default.boo_ms));
    content.push_str(&format!(
        "DroppedHoldPolicy={}\n",
        default.dropped_hold_policy.as_str()
    ));
    content.push_str(&format!("GoodMs={}\n", default.good_ms));
    content.push_str(&format!("GreatMs={}\n", default.great_ms));
    content.push_str(&format!("HoldGraceBeats={}\n", default.hold_grace_beats));
    content.push_str(&format!(
        "HoldScorePerSecond={}\n",
        default.hold_score_per_second
    ));
    content.push_str(&format!("InitialBpm={}\n", default.initial_bpm));
    content.push_str(&format!("MarvelousMs={}\n", default.marvelous_ms));
    content.push_str(&format!("MissWindowMs={}\n", default.miss_window_ms));
    content.push_str(&format!("PerfectMs={}\n", default.perfect_ms));
    content.push('\n');
    content
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    std::fs::write(path, default_config_text())
}

#[inline(always)]
fn positive_f32(conf: &SimpleIni, key: &str) -> Option<f32> {
    conf.get("Timing", key)
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn config_from_ini(conf: &SimpleIni) -> Config {
    let default = Config::default();
    Config {
        log_level: conf
            .get("Options", "LogLevel")
            .and_then(|v| LogLevel::from_str(&v).ok())
            .unwrap_or(default.log_level),
        marvelous_ms: positive_f32(conf, "MarvelousMs").unwrap_or(default.marvelous_ms),
        perfect_ms: positive_f32(conf, "PerfectMs").unwrap_or(default.perfect_ms),
        great_ms: positive_f32(conf, "GreatMs").unwrap_or(default.great_ms),
        good_ms: positive_f32(conf, "GoodMs").unwrap_or(default.good_ms),
        boo_ms: positive_f32(conf, "BooMs").unwrap_or(default.boo_ms),
        miss_window_ms: positive_f32(conf, "MissWindowMs").unwrap_or(default.miss_window_ms),
        hold_score_per_second: conf
            .get("Timing", "HoldScorePerSecond")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.hold_score_per_second),
        hold_grace_beats: conf
            .get("Timing", "HoldGraceBeats")
            .and_then(|v| v.parse::<f32>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(default.hold_grace_beats),
        initial_bpm: positive_f32(conf, "InitialBpm").unwrap_or(default.initial_bpm),
        dropped_hold_policy: conf
            .get("Timing", "DroppedHoldPolicy")
            .and_then(|v| DroppedHoldPolicy::from_str(&v).ok())
            .unwrap_or(default.dropped_hold_policy),
    }
}

/// Reads `path` without touching the global config. Missing or unparsable
/// keys fall back to defaults.
pub fn load_from(path: &Path) -> Result<Config, std::io::Error> {
    let mut conf = SimpleIni::new();
    conf.load(path)?;
    Ok(config_from_ini(&conf))
}

pub fn load() {
    load_path(Path::new(CONFIG_PATH));
}

/// Loads `path` into the global config, creating it with defaults first if
/// it does not exist.
pub fn load_path(path: &Path) {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match load_from(path) {
        Ok(cfg) => {
            *CONFIG.lock().unwrap() = cfg;
            info!("Configuration loaded from '{}'.", path.display());
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}. Using default values.", path.display());
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap()
}
