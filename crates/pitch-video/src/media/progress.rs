//! Parsing of ffmpeg `-progress pipe:1` output.
//!
//! ffmpeg writes `key=value` lines and ends each block with
//! `progress=continue` or `progress=end`.

use std::sync::LazyLock;

use regex::Regex;

// `out_time_ms` is microseconds too, despite the name.
static RE_OUT_TIME_US: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^out_time_(?:us|ms)=(\d+)$").unwrap());
static RE_OUT_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^out_time=(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").unwrap());
static RE_PROGRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^progress=(continue|end)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Seconds of output produced so far.
    OutTime(f64),
    End,
}

/// Parses one line of progress output. Unknown keys yield `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let line = line.trim();

    if let Some(caps) = RE_OUT_TIME_US.captures(line) {
        let micros: u64 = caps[1].parse().ok()?;
        return Some(ProgressLine::OutTime(micros as f64 / 1_000_000.0));
    }

    if let Some(caps) = RE_OUT_TIME.captures(line) {
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        return Some(ProgressLine::OutTime(hours * 3600.0 + minutes * 60.0 + seconds));
    }

    match RE_PROGRESS.captures(line) {
        Some(caps) if &caps[1] == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Converts output time into a 0-100 completion percentage.
pub fn percent_of(out_time_secs: f64, duration_secs: f64) -> f64 {
    if duration_secs.is_nan() || duration_secs <= 0.0 || !out_time_secs.is_finite() {
        return 0.0;
    }
    (out_time_secs / duration_secs * 100.0).clamp(0.0, 100.0)
}

/// Tracks the highest percentage seen so reports never go backwards.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    duration_secs: f64,
    last_percent: f64,
}

impl ProgressTracker {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            last_percent: 0.0,
        }
    }

    /// Feeds one line; returns a new percentage when it moved forward.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let percent = match parse_progress_line(line)? {
            ProgressLine::OutTime(secs) => percent_of(secs, self.duration_secs),
            ProgressLine::End => 100.0,
        };
        if percent > self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }
}
