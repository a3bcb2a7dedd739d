//! Copy-to-clipboard affordance with transient feedback.
//!
//! Writes are fire-and-forget; the button label flips to "Copied!" (or
//! "Copy failed") and reverts after `COPY_FEEDBACK_SECS`.

use std::collections::HashMap;

/// How long the feedback label stays up, in seconds.
pub const COPY_FEEDBACK_SECS: f64 = 2.0;

pub const COPY_IDLE_LABEL: &str = "Copy";
pub const COPY_DONE_LABEL: &str = "Copied!";
pub const COPY_FAILED_LABEL: &str = "Copy failed";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable")]
    Unavailable,
    #[error("clipboard write rejected: {0}")]
    Rejected(String),
}

/// Host clipboard capability.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Flash {
    Copied { until: f64 },
    Failed { until: f64 },
}

/// Per-handle copy feedback state. Time is injected in seconds.
#[derive(Debug, Default)]
pub struct CopyFeedback {
    flashes: HashMap<String, Flash>,
}

impl CopyFeedback {
    /// Copy `handle` and start its feedback window.
    pub fn copy(
        &mut self,
        clipboard: &mut dyn Clipboard,
        handle: &str,
        now: f64,
    ) -> Result<(), ClipboardError> {
        let until = now + COPY_FEEDBACK_SECS;
        let result = clipboard.write_text(handle);
        let flash = match result {
            Ok(()) => Flash::Copied { until },
            Err(_) => Flash::Failed { until },
        };
        self.flashes.insert(handle.to_string(), flash);
        result
    }

    /// Button label for `handle` at time `now`.
    pub fn label(&self, handle: &str, now: f64) -> &'static str {
        match self.flashes.get(handle) {
            Some(Flash::Copied { until }) if now < *until => COPY_DONE_LABEL,
            Some(Flash::Failed { until }) if now < *until => COPY_FAILED_LABEL,
            _ => COPY_IDLE_LABEL,
        }
    }

    /// Transient advisory text, if any handle is still flashing.
    pub fn advisory(&self, now: f64) -> Option<&'static str> {
        self.flashes.values().find_map(|f| match f {
            Flash::Copied { until } if now < *until => Some(COPY_DONE_LABEL),
            Flash::Failed { until } if now < *until => Some(COPY_FAILED_LABEL),
            _ => None,
        })
    }

    /// Drop expired entries. Returns true while anything is still flashing,
    /// so the caller knows to keep repainting.
    pub fn expire(&mut self, now: f64) -> bool {
        self.flashes.retain(|_, f| match f {
            Flash::Copied { until } | Flash::Failed { until } => now < *until,
        });
        !self.flashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingClipboard {
        written: Vec<String>,
        fail: bool,
    }

    impl Clipboard for RecordingClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            if self.fail {
                return Err(ClipboardError::Unavailable);
            }
            self.written.push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn copied_label_reverts_after_two_seconds() {
        let mut clipboard = RecordingClipboard::default();
        let mut feedback = CopyFeedback::default();

        feedback.copy(&mut clipboard, "user3#1003", 10.0).unwrap();
        assert_eq!(clipboard.written, ["user3#1003"]);
        assert_eq!(feedback.label("user3#1003", 10.0), "Copied!");
        assert_eq!(feedback.label("user3#1003", 11.9), "Copied!");
        assert_eq!(feedback.advisory(11.9), Some("Copied!"));
        assert_eq!(feedback.label("user3#1003", 12.0), COPY_IDLE_LABEL);
        assert!(feedback.advisory(12.0).is_none());
        assert!(!feedback.expire(12.0));
    }

    #[test]
    fn failures_surface_then_clear() {
        let mut clipboard = RecordingClipboard {
            fail: true,
            ..Default::default()
        };
        let mut feedback = CopyFeedback::default();
        assert!(feedback.copy(&mut clipboard, "user1#1001", 0.0).is_err());
        assert_eq!(feedback.label("user1#1001", 1.0), "Copy failed");
        assert!(feedback.expire(1.0));
        assert!(!feedback.expire(2.5));
        assert_eq!(feedback.label("user1#1001", 2.5), COPY_IDLE_LABEL);
    }

    #[test]
    fn handles_flash_independently() {
        let mut clipboard = RecordingClipboard::default();
        let mut feedback = CopyFeedback::default();
        feedback.copy(&mut clipboard, "a#1", 0.0).unwrap();
        feedback.copy(&mut clipboard, "b#2", 1.5).unwrap();
        assert_eq!(feedback.label("a#1", 2.5), COPY_IDLE_LABEL);
        assert_eq!(feedback.label("b#2", 2.5), COPY_DONE_LABEL);
    }
}
