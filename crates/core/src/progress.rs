//! Progress estimation from build output.
//!
//! Build tools do not report a percentage, so progress is inferred from two
//! signals in the text stream:
//!
//! - a keyword table: every keyword found in a line (case-insensitive)
//!   maps to a fixed milestone and the highest one counts;
//! - a directory signal: every `make[N]: Entering directory` line bumps a
//!   counter, giving `min(30 + 0.5 * count, 85)`.
//!
//! The estimate is the max of both signals and the reported progress never
//! decreases.

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Keyword milestones.
pub const KEYWORD_MILESTONES: &[(&str, f64)] = &[
    ("checking", 5.0),
    ("downloading", 10.0),
    ("extracting", 15.0),
    ("patching", 20.0),
    ("configuring", 25.0),
    ("building", 30.0),
    ("compiling", 40.0),
    ("installing", 80.0),
    ("packaging", 90.0),
    ("successfully", 95.0),
];

/// Base value of the directory signal.
pub const DIRECTORY_BASE: f64 = 30.0;

/// Progress added per entered directory.
pub const DIRECTORY_STEP: f64 = 0.5;

/// Ceiling of the directory signal.
pub const DIRECTORY_CAP: f64 = 85.0;

/// Upper bound of any progress value.
pub const PROGRESS_MAX: f64 = 100.0;

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Highest milestone among the keywords contained in `line`, if any.
pub fn keyword_progress(line: &str) -> Option<f64> {
    let lower = line.to_lowercase();
    KEYWORD_MILESTONES
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, value)| *value)
        .fold(None, |best: Option<f64>, value| {
            Some(best.map_or(value, |b| b.max(value)))
        })
}

/// `true` for `make[N]: Entering directory '...'` lines.
pub fn is_directory_entry(line: &str) -> bool {
    line.contains("make[")
        && (line.contains("]: Entering directory") || line.contains("] Entering directory"))
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

/// Stateful estimator fed one output line at a time.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    progress: f64,
    directories: u32,
}

impl ProgressEstimator {
    /// Start from an existing progress value (e.g. carried over from a
    /// previous stage).
    pub fn starting_at(progress: f64) -> Self {
        Self {
            progress: progress.clamp(0.0, PROGRESS_MAX),
            directories: 0,
        }
    }

    /// Current progress.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Number of directory entries seen so far.
    pub fn directories(&self) -> u32 {
        self.directories
    }

    /// Raise progress to at least `floor` (stage boundaries). Returns the new
    /// value when it increased.
    pub fn raise_to(&mut self, floor: f64) -> Option<f64> {
        let floor = floor.clamp(0.0, PROGRESS_MAX);
        if floor > self.progress {
            self.progress = floor;
            Some(floor)
        } else {
            None
        }
    }

    /// Feed one line. Returns the new progress when it increased.
    pub fn observe(&mut self, line: &str) -> Option<f64> {
        if is_directory_entry(line) {
            self.directories += 1;
        }

        let directory_signal = if self.directories > 0 {
            (DIRECTORY_BASE + DIRECTORY_STEP * f64::from(self.directories)).min(DIRECTORY_CAP)
        } else {
            0.0
        };
        let estimate = keyword_progress(line)
            .unwrap_or(0.0)
            .max(directory_signal);

        self.raise_to(estimate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(keyword_progress("Checking for gcc..."), Some(5.0));
        assert_eq!(keyword_progress("INSTALLING package"), Some(80.0));
        assert_eq!(keyword_progress("nothing to see"), None);
    }

    #[test]
    fn highest_matching_keyword_wins() {
        assert_eq!(keyword_progress("downloading then compiling"), Some(40.0));
        assert_eq!(keyword_progress("Successfully compiling package"), Some(95.0));
    }

    #[test]
    fn estimator_uses_highest_keyword_in_line() {
        let mut est = ProgressEstimator::default();
        assert_eq!(est.observe("Successfully installed, packaging next"), Some(95.0));
    }

    #[test]
    fn recognises_directory_entries() {
        assert!(is_directory_entry(
            "make[2]: Entering directory '/src/package/base-files'"
        ));
        assert!(!is_directory_entry(
            "make[2]: Leaving directory '/src/package/base-files'"
        ));
        assert!(!is_directory_entry("Entering directory without make"));
    }

    #[test]
    fn directory_signal_grows_and_caps() {
        let mut est = ProgressEstimator::default();
        let line = "make[1]: Entering directory '/src'";
        assert_eq!(est.observe(line), Some(30.5));
        assert_eq!(est.observe(line), Some(31.0));
        for _ in 0..200 {
            est.observe(line);
        }
        assert_eq!(est.progress(), DIRECTORY_CAP);
        assert_eq!(est.directories(), 202);
    }

    #[test]
    fn progress_never_decreases() {
        let mut est = ProgressEstimator::default();
        assert_eq!(est.observe("Compiling foo.c"), Some(40.0));
        assert_eq!(est.observe("Checking bar"), None);
        assert_eq!(est.observe("plain output"), None);
        assert_eq!(est.progress(), 40.0);
        assert_eq!(est.observe("Packaging image"), Some(90.0));
    }

    #[test]
    fn keyword_and_directory_combine_by_max() {
        let mut est = ProgressEstimator::default();
        est.observe("make[1]: Entering directory '/a'");
        assert_eq!(est.progress(), 30.5);
        // Keyword 5 is below the directory signal so nothing changes.
        assert_eq!(est.observe("checking x"), None);
        assert_eq!(est.observe("installing y"), Some(80.0));
    }

    #[test]
    fn raise_to_clamps_and_is_monotonic() {
        let mut est = ProgressEstimator::starting_at(50.0);
        assert_eq!(est.raise_to(20.0), None);
        assert_eq!(est.raise_to(150.0), Some(PROGRESS_MAX));
        assert_eq!(est.progress(), PROGRESS_MAX);
    }
}
