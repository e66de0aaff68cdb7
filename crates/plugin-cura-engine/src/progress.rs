//! Engine diagnostic line decoding.
//!
//! Each line is offered to an ordered table of classifiers; the first one
//! that recognises it produces the event. Lines nobody recognises, and
//! recognised lines whose numbers do not parse, are dropped.

use crate::models::{AnalysisFragment, DEFAULT_TOOL, ProgressUpdate};

const FILAMENT_MARKER: &str = "Filament used:";
const PRINT_TIME_MARKER: &str = "Print time:";

/// A structured event recovered from one diagnostic line.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Progress report.
    Progress(ProgressUpdate),
    /// Piece of the final analysis.
    Fragment(AnalysisFragment),
}

struct Classifier {
    name: &'static str,
    extract: fn(&str) -> Option<EngineEvent>,
}

static CLASSIFIERS: &[Classifier] = &[
    Classifier {
        name: "progress",
        extract: progress_line,
    },
    Classifier {
        name: "filament",
        extract: filament_line,
    },
    Classifier {
        name: "print_time",
        extract: print_time_line,
    },
];

/// Decode one line of engine output.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    CLASSIFIERS.iter().find_map(|c| (c.extract)(line))
}

/// Like [`parse_line`], also naming the classifier that matched.
pub fn classify_line(line: &str) -> Option<(&'static str, EngineEvent)> {
    CLASSIFIERS
        .iter()
        .find_map(|c| (c.extract)(line).map(|event| (c.name, event)))
}

fn progress_line(line: &str) -> Option<EngineEvent> {
    let body = line.trim_end().strip_suffix('%')?;
    let token = body
        .rsplit(|c: char| c.is_whitespace() || c == ':')
        .next()?;
    let percent: f64 = token.parse().ok()?;
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return None;
    }
    Some(EngineEvent::Progress(ProgressUpdate {
        fraction: percent / 100.0,
    }))
}

fn filament_line(line: &str) -> Option<EngineEvent> {
    let (_, rest) = line.split_once(FILAMENT_MARKER)?;
    let rest = rest.trim();
    let number = rest
        .strip_suffix(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(rest)
        .trim_end();
    let metres: f64 = number.parse().ok()?;
    if !metres.is_finite() {
        return None;
    }
    Some(EngineEvent::Fragment(AnalysisFragment::FilamentUsed {
        tool: DEFAULT_TOOL.to_string(),
        length_mm: metres * 1000.0,
    }))
}

fn print_time_line(line: &str) -> Option<EngineEvent> {
    let (_, rest) = line.split_once(PRINT_TIME_MARKER)?;
    let seconds: u64 = rest.trim().parse().ok()?;
    Some(EngineEvent::Fragment(AnalysisFragment::PrintTime {
        minutes: seconds / 60,
    }))
}

/// Per-job filter that only lets strictly increasing progress through.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    last: f64,
}

impl ProgressTracker {
    /// Start at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `update` if it is above everything accepted so far.
    pub fn advance(&mut self, update: ProgressUpdate) -> Option<ProgressUpdate> {
        if update.fraction > self.last {
            self.last = update.fraction;
            Some(update)
        } else {
            None
        }
    }

    /// The last accepted fraction.
    pub fn last(&self) -> f64 {
        self.last
    }
}
