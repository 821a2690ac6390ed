//! # Input Controller
//!
//! Owns the draft text and the pending attachment set. Every operation
//! either applies completely or leaves the state untouched and records
//! exactly one warning for the UI to show as a toast.

use std::fmt;

use log::{debug, warn};

use crate::core::attachment::{
    Attachment, AttachmentError, is_pasteable_type, is_picker_type, validate_batch,
};
use crate::core::config::Limits;

/// A rejection at the input boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Attachment(AttachmentError),
    DraftTooLong { max: usize },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Attachment(e) => write!(f, "{e}"),
            ValidationError::DraftTooLong { max } => {
                write!(f, "Messages are limited to {max} characters.")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<AttachmentError> for ValidationError {
    fn from(e: AttachmentError) -> Self {
        ValidationError::Attachment(e)
    }
}

/// One item from a paste.
#[derive(Debug, Clone)]
pub enum ClipboardItem {
    Text(String),
    File(Attachment),
}

/// What the caller should do after [`InputController::add_from_clipboard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteOutcome {
    /// Image items were attached; suppress the default paste.
    Attached(usize),
    /// Image items were present but rejected; suppress the default paste.
    Rejected,
    /// No image items; insert the text as usual.
    FallThrough,
}

#[derive(Debug)]
pub struct InputController {
    draft: String,
    pending: Vec<Attachment>,
    limits: Limits,
    warnings: Vec<String>,
}

impl InputController {
    pub fn new(limits: Limits) -> Self {
        Self {
            draft: String::new(),
            pending: Vec::new(),
            limits,
            warnings: Vec::new(),
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Replaces the draft. Rejected if it exceeds the character cap.
    pub fn set_draft_text(&mut self, text: impl Into<String>) -> Result<(), ValidationError> {
        let text = text.into();
        let len = text.chars().count();
        if len > self.limits.max_draft_chars {
            debug!("Draft rejected: {} chars", len);
            return Err(self.reject(ValidationError::DraftTooLong {
                max: self.limits.max_draft_chars,
            }));
        }
        self.draft = text;
        Ok(())
    }

    /// Merges picker candidates into the pending set.
    pub fn add_files(&mut self, candidates: Vec<Attachment>) -> Result<usize, ValidationError> {
        if let Some(bad) = candidates.iter().find(|a| !is_picker_type(&a.media_type)) {
            return Err(self.reject(AttachmentError::UnsupportedType {
                name: bad.name.clone(),
                media_type: bad.media_type.clone(),
            }));
        }
        self.merge(candidates)
    }

    /// Routes image items from a paste through the pending set.
    pub fn add_from_clipboard(&mut self, items: Vec<ClipboardItem>) -> PasteOutcome {
        let images: Vec<Attachment> = items
            .into_iter()
            .filter_map(|item| match item {
                ClipboardItem::File(a) if is_pasteable_type(&a.media_type) => Some(a),
                _ => None,
            })
            .collect();

        if images.is_empty() {
            return PasteOutcome::FallThrough;
        }
        match self.merge(images) {
            Ok(added) => PasteOutcome::Attached(added),
            Err(_) => PasteOutcome::Rejected,
        }
    }

    /// Removes one pending attachment. Out-of-range indices are ignored.
    pub fn remove_file(&mut self, index: usize) -> Option<Attachment> {
        if index < self.pending.len() {
            Some(self.pending.remove(index))
        } else {
            None
        }
    }

    /// Clears draft and attachments after a submission.
    pub fn reset(&mut self) {
        self.draft.clear();
        self.pending.clear();
    }

    /// Warnings recorded since the last call, oldest first.
    pub fn drain_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// All-or-nothing merge, deduplicating by identity.
    fn merge(&mut self, candidates: Vec<Attachment>) -> Result<usize, ValidationError> {
        let mut fresh: Vec<Attachment> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let seen = self
                .pending
                .iter()
                .chain(fresh.iter())
                .any(|a| a.identity() == candidate.identity());
            if seen {
                debug!("Skipping duplicate attachment {}", candidate.name);
            } else {
                fresh.push(candidate);
            }
        }

        if let Err(e) = validate_batch(self.pending.iter().chain(fresh.iter()), &self.limits) {
            return Err(self.reject(e));
        }

        let added = fresh.len();
        self.pending.extend(fresh);
        Ok(added)
    }

    fn reject(&mut self, error: impl Into<ValidationError>) -> ValidationError {
        let error = error.into();
        warn!("Input rejected: {}", error);
        self.warnings.push(error.to_string());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    fn png(name: &str, size: usize) -> Attachment {
        Attachment::from_bytes(name, "image/png", vec![0; size])
    }

    fn controller() -> InputController {
        InputController::new(Limits::default())
    }

    #[test]
    fn test_add_files_preserves_insertion_order() {
        let mut input = controller();
        let batch: Vec<Attachment> = (0..5).map(|i| png(&format!("{i}.png"), 1024)).collect();
        assert_eq!(input.add_files(batch).unwrap(), 5);
        let names: Vec<&str> = input.pending().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["0.png", "1.png", "2.png", "3.png", "4.png"]);
        assert!(input.drain_warnings().is_empty());
    }

    #[test]
    fn test_six_files_are_all_rejected() {
        let mut input = controller();
        let batch: Vec<Attachment> = (0..6).map(|i| png(&format!("{i}.png"), 3 * MB)).collect();
        let err = input.add_files(batch).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Attachment(AttachmentError::TooManyFiles { max: 5 })
        );
        assert!(input.pending().is_empty());
        assert_eq!(
            input.drain_warnings(),
            vec!["You can select a maximum of 5 files.".to_string()]
        );
    }

    #[test]
    fn test_merge_counts_existing_files() {
        let mut input = controller();
        input
            .add_files((0..3).map(|i| png(&format!("{i}.png"), 10)).collect())
            .unwrap();
        let err = input.add_files((3..6).map(|i| png(&format!("{i}.png"), 10)).collect());
        assert!(err.is_err());
        assert_eq!(input.pending().len(), 3);
        assert_eq!(input.drain_warnings().len(), 1);
    }

    #[test]
    fn test_oversized_file_rejects_batch() {
        let mut input = controller();
        let err = input
            .add_files(vec![png("ok.png", 10), png("big.png", 10 * MB + 1)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The file \"big.png\" exceeds the maximum size of 10MB."
        );
        assert!(input.pending().is_empty());
    }

    #[test]
    fn test_picker_rejects_unsupported_types() {
        let mut input = controller();
        let gif = Attachment::from_bytes("a.gif", "image/gif", vec![0]);
        assert!(input.add_files(vec![gif]).is_err());
        assert_eq!(input.drain_warnings().len(), 1);
    }

    #[test]
    fn test_duplicates_are_merged_once() {
        let mut input = controller();
        let a = png("a.png", 10);
        input.add_files(vec![a.clone(), a.clone()]).unwrap();
        input.add_files(vec![a]).unwrap();
        assert_eq!(input.pending().len(), 1);
    }

    #[test]
    fn test_clipboard_images_attach_and_text_falls_through() {
        let mut input = controller();
        let gif = Attachment::from_bytes("p.gif", "image/gif", vec![0]);
        let outcome = input.add_from_clipboard(vec![
            ClipboardItem::Text("caption".to_string()),
            ClipboardItem::File(gif),
        ]);
        assert_eq!(outcome, PasteOutcome::Attached(1));

        let outcome = input.add_from_clipboard(vec![ClipboardItem::Text("hi".to_string())]);
        assert_eq!(outcome, PasteOutcome::FallThrough);

        let pdf = Attachment::from_bytes("d.pdf", "application/pdf", vec![0]);
        assert_eq!(
            input.add_from_clipboard(vec![ClipboardItem::File(pdf)]),
            PasteOutcome::FallThrough
        );
    }

    #[test]
    fn test_clipboard_over_limit_is_rejected() {
        let mut input = controller();
        input
            .add_files((0..5).map(|i| png(&format!("{i}.png"), 10)).collect())
            .unwrap();
        let outcome = input.add_from_clipboard(vec![ClipboardItem::File(png("x.png", 10))]);
        assert_eq!(outcome, PasteOutcome::Rejected);
        assert_eq!(input.pending().len(), 5);
        assert_eq!(input.drain_warnings().len(), 1);
    }

    #[test]
    fn test_remove_file_keeps_order() {
        let mut input = controller();
        input
            .add_files(vec![png("a.png", 1), png("b.png", 1), png("c.png", 1)])
            .unwrap();
        assert_eq!(input.remove_file(1).map(|a| a.name), Some("b.png".to_string()));
        assert!(input.remove_file(7).is_none());
        let names: Vec<&str> = input.pending().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn test_draft_cap() {
        let mut input = InputController::new(Limits {
            max_draft_chars: 5,
            ..Limits::default()
        });
        input.set_draft_text("héllo").unwrap();
        assert!(input.set_draft_text("héllo!").is_err());
        assert_eq!(input.draft(), "héllo");
        assert_eq!(
            input.drain_warnings(),
            vec!["Messages are limited to 5 characters.".to_string()]
        );
    }

    #[test]
    fn test_reset_clears_draft_and_files() {
        let mut input = controller();
        input.set_draft_text("Hello").unwrap();
        input.add_files(vec![png("a.png", 1)]).unwrap();
        input.reset();
        assert!(input.draft().is_empty());
        assert!(input.pending().is_empty());
    }
}
