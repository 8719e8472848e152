//! Tolerant progress parsing from the tool's diagnostic stream.
//!
//! FFmpeg interleaves `time=HH:MM:SS.cc` status markers with free-form
//! warnings on stderr. The parser scans each line for the marker and
//! silently ignores everything it cannot read; a malformed line must never
//! fail a job.

use std::time::Duration;

use mdeck_models::timestamp::parse_timestamp;

/// One parsed status line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Media time processed so far.
    pub elapsed: Duration,
    /// Completion in `0.0..=1.0` when the total duration is known.
    pub fraction: Option<f64>,
    /// Encoding speed relative to realtime, from the `speed=` field.
    pub speed: Option<f64>,
}

/// Stateless line parser. The only configuration is the expected total
/// duration, used to turn elapsed time into a completion fraction.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    total: Option<Duration>,
}

impl ProgressParser {
    pub fn new(total: Option<Duration>) -> Self {
        Self { total }
    }

    /// Extract a progress update from one diagnostic line, if present.
    pub fn feed(&self, line: &str) -> Option<ProgressUpdate> {
        let idx = line.find("time=")?;
        let rest = &line[idx + "time=".len()..];
        let token = rest.split_whitespace().next()?;
        if token == "N/A" {
            return None;
        }
        let secs = parse_timestamp(token).ok()?;

        let fraction = self.total.map(|total| {
            let total_secs = total.as_secs_f64();
            if total_secs > 0.0 {
                (secs / total_secs).min(1.0)
            } else {
                1.0
            }
        });

        Some(ProgressUpdate {
            elapsed: Duration::from_secs_f64(secs),
            fraction,
            speed: parse_speed(line),
        })
    }
}

fn parse_speed(line: &str) -> Option<f64> {
    let idx = line.find("speed=")?;
    let rest = &line[idx + "speed=".len()..];
    let token = rest.split_whitespace().next()?;
    token.trim_end_matches('x').parse().ok()
}
