//! User-visible status messages

use crate::error::NoCandidate;
use crate::ocr::Progress;
use std::fmt;
use std::time::{Duration, Instant};

/// How long a status stays on screen unless replaced
pub const DEFAULT_VISIBILITY: Duration = Duration::from_secs(3);

/// A transient status update for the user
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    LoadingEngine { engine: String },
    EngineReady { engine: String },
    EngineFailed { engine: String },
    NoCandidate(NoCandidate),
    Reading,
    Extracting { engine: String },
    Progress(Progress),
    Filled { text: String },
    ExtractedNoDestination,
    NoTextDetected,
    ExtractionFailed,
    Cleared,
}

impl Status {
    /// Whether the status reports a problem rather than progress or success
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Status::EngineFailed { .. } | Status::ExtractionFailed | Status::NoCandidate(_)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::LoadingEngine { engine } => write!(f, "Loading {}...", engine),
            Status::EngineReady { engine } => write!(f, "{} loaded and ready!", engine),
            Status::EngineFailed { engine } => write!(f, "Failed to load {}", engine),
            Status::NoCandidate(NoCandidate::NoSurfaces) => {
                write!(f, "No canvas elements found on this page")
            }
            Status::NoCandidate(NoCandidate::NoneSuitable) => {
                write!(f, "No suitable canvas found for text extraction")
            }
            Status::Reading => write!(f, "Reading text from canvas..."),
            Status::Extracting { engine } => write!(f, "Extracting text with {}...", engine),
            Status::Progress(p) => write!(f, "{} ({}%)", p.status, p.progress),
            Status::Filled { text } => write!(f, "Text filled: \"{}\"", text),
            Status::ExtractedNoDestination => {
                write!(f, "Text extracted! No input field found to fill.")
            }
            Status::NoTextDetected => write!(f, "No text detected in canvas"),
            Status::ExtractionFailed => write!(f, "Error reading canvas text"),
            Status::Cleared => write!(f, "Text cleared."),
        }
    }
}

/// Display for transient status text
///
/// Each new status replaces the previous one.
pub trait StatusSink: Send {
    fn show(&mut self, status: Status);
}

/// Status sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn show(&mut self, status: Status) {
        if status.is_error() {
            tracing::warn!("{}", status);
        } else {
            tracing::info!("{}", status);
        }
    }
}

/// Keeps the latest status visible for a fixed window
///
/// A newer status replaces the current one and restarts the window.
/// Every status is also forwarded to the wrapped sink.
pub struct StatusBoard<S> {
    inner: S,
    visibility: Duration,
    current: Option<(Status, Instant)>,
}

impl<S: StatusSink> StatusBoard<S> {
    pub fn new(inner: S) -> Self {
        Self::with_visibility(inner, DEFAULT_VISIBILITY)
    }

    pub fn with_visibility(inner: S, visibility: Duration) -> Self {
        Self {
            inner,
            visibility,
            current: None,
        }
    }

    /// The status still on screen at `now`, if any
    pub fn visible_at(&self, now: Instant) -> Option<&Status> {
        self.current
            .as_ref()
            .filter(|(_, shown)| now.saturating_duration_since(*shown) < self.visibility)
            .map(|(status, _)| status)
    }

    pub fn visible(&self) -> Option<&Status> {
        self.visible_at(Instant::now())
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: StatusSink> StatusSink for StatusBoard<S> {
    fn show(&mut self, status: Status) {
        self.current = Some((status.clone(), Instant::now()));
        self.inner.show(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text() {
        assert_eq!(
            Status::Filled {
                text: "AB12".to_string()
            }
            .to_string(),
            "Text filled: \"AB12\""
        );
        assert_eq!(
            Status::Progress(Progress {
                progress: 50,
                status: "recognizing text".to_string()
            })
            .to_string(),
            "recognizing text (50%)"
        );
        assert_eq!(
            Status::NoCandidate(NoCandidate::NoSurfaces).to_string(),
            "No canvas elements found on this page"
        );
    }

    #[test]
    fn test_is_error() {
        assert!(Status::ExtractionFailed.is_error());
        assert!(!Status::NoTextDetected.is_error());
        assert!(!Status::Reading.is_error());
    }

    #[derive(Default)]
    struct Collect(Vec<Status>);

    impl StatusSink for Collect {
        fn show(&mut self, status: Status) {
            self.0.push(status);
        }
    }

    #[test]
    fn test_board_last_write_wins() {
        let mut board = StatusBoard::new(Collect::default());
        assert!(board.visible().is_none());

        board.show(Status::Reading);
        board.show(Status::NoTextDetected);
        assert_eq!(board.visible(), Some(&Status::NoTextDetected));
        assert_eq!(
            board.into_inner().0,
            vec![Status::Reading, Status::NoTextDetected]
        );
    }

    #[test]
    fn test_board_hides_after_window() {
        let mut board = StatusBoard::with_visibility(TracingStatus, Duration::from_millis(500));
        board.show(Status::Cleared);
        let shown = Instant::now();
        assert!(board.visible_at(shown).is_some());
        assert!(board.visible_at(shown + Duration::from_secs(1)).is_none());
    }
}
