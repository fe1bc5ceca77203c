use crate::orbit_track::TrackOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::Display;

/// A configuration variable holds a value that cannot be used.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
    OutOfRange { var: &'static str, value: String },
}

impl std::error::Error for ConfigError {}

/// Runtime configuration of the viewer, read from `SATPLOT_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    /// Server root the group index and definitions are fetched from.
    pub base_url: String,
    /// Local directory used instead of the server, if set.
    pub group_dir: Option<PathBuf>,
    pub index_path: String,
    pub workers: usize,
    /// Frames per second of the main tick.
    pub refresh_rate: u32,
    pub hover_interval: Duration,
    pub bounds_refresh_ticks: u64,
    /// Group names displayed at start. Empty means every listed group.
    pub groups: Vec<String>,
    pub stats_interval: Duration,
    pub tracks: TrackOptions,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:3000"),
            group_dir: None,
            index_path: String::from("/groups/index.json"),
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            refresh_rate: 60,
            hover_interval: Duration::from_millis(50),
            bounds_refresh_ticks: 30,
            groups: Vec::new(),
            stats_interval: Duration::from_secs(10),
            tracks: TrackOptions::default(),
        }
    }
}

impl PlotConfig {
    const BASE_URL: &'static str = "SATPLOT_BASE_URL";
    const GROUP_DIR: &'static str = "SATPLOT_GROUP_DIR";
    const INDEX_PATH: &'static str = "SATPLOT_INDEX_PATH";
    const WORKERS: &'static str = "SATPLOT_WORKERS";
    const REFRESH_RATE: &'static str = "SATPLOT_REFRESH_RATE";
    const HOVER_INTERVAL: &'static str = "SATPLOT_HOVER_INTERVAL_MS";
    const BOUNDS_REFRESH: &'static str = "SATPLOT_BOUNDS_REFRESH_TICKS";
    const GROUPS: &'static str = "SATPLOT_GROUPS";
    const STATS_INTERVAL: &'static str = "SATPLOT_STATS_INTERVAL_S";
    const TRACK_COLOR: &'static str = "SATPLOT_TRACK_COLOR";

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|var| std::env::var(var).ok()) }

    /// Reads the configuration through `lookup`, falling back to defaults for unset variables.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, `None` if it is unset.
    ///
    /// # Returns
    /// The configuration, or the first variable whose value is unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let workers = parse_positive(Self::WORKERS, get(Self::WORKERS))?.unwrap_or(defaults.workers);
        let refresh_rate = parse_positive(Self::REFRESH_RATE, get(Self::REFRESH_RATE))?.unwrap_or(defaults.refresh_rate);
        let hover_interval = parse_positive(Self::HOVER_INTERVAL, get(Self::HOVER_INTERVAL))?
            .map_or(defaults.hover_interval, Duration::from_millis);
        let bounds_refresh_ticks =
            parse_positive(Self::BOUNDS_REFRESH, get(Self::BOUNDS_REFRESH))?.unwrap_or(defaults.bounds_refresh_ticks);
        let stats_interval = parse_positive(Self::STATS_INTERVAL, get(Self::STATS_INTERVAL))?
            .map_or(defaults.stats_interval, Duration::from_secs);

        let base_url = get(Self::BASE_URL).unwrap_or(defaults.base_url);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid { var: Self::BASE_URL, value: base_url });
        }
        let mut tracks = defaults.tracks;
        if let Some(color) = get(Self::TRACK_COLOR) {
            if !is_hex_color(&color) {
                return Err(ConfigError::Invalid { var: Self::TRACK_COLOR, value: color });
            }
            tracks.color = color;
        }
        let groups = get(Self::GROUPS)
            .map(|list| list.split(',').map(str::trim).filter(|g| !g.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            base_url,
            group_dir: get(Self::GROUP_DIR).map(PathBuf::from),
            index_path: get(Self::INDEX_PATH).unwrap_or(defaults.index_path),
            workers,
            refresh_rate,
            hover_interval,
            bounds_refresh_ticks,
            groups,
            stats_interval,
            tracks,
        })
    }

    /// Interval between two main ticks.
    pub fn frame_interval(&self) -> Duration { Duration::from_secs(1) / self.refresh_rate }
}

fn parse_positive<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where T: FromStr + PartialOrd + Default {
    let Some(value) = value else { return Ok(None) };
    let parsed = value.parse::<T>().map_err(|_| ConfigError::Invalid { var, value: value.clone() })?;
    if parsed <= T::default() {
        return Err(ConfigError::OutOfRange { var, value });
    }
    Ok(Some(parsed))
}

fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
