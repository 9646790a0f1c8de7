//! Composer state: the input text, the in-flight flag, and what happens when
//! a submission settles.
//!
//! In the browser this state lives in the `content` and `posting` signals.
//! The server rebuilds a [`ComposerState`] from the signals for every
//! submission so the same rules decide whether a create is issued and which
//! effects are sent back.

use chirp_api_types::CreatePostInput;

use crate::application::procedures::ProcedureError;
use crate::domain::posts::CONTENT_FIELD;

pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to post, please try again.";
pub const SUBMIT_KEY: &str = "Enter";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerEffect {
    ClearInput,
    InvalidateFeed,
    Notify(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerState {
    content: String,
    posting: bool,
}

impl ComposerState {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            posting: false,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_posting(&self) -> bool {
        self.posting
    }

    /// Input edits are ignored while a submission is in flight.
    pub fn set_content(&mut self, content: impl Into<String>) {
        if !self.posting {
            self.content = content.into();
        }
    }

    pub fn can_submit(&self) -> bool {
        !self.content.is_empty() && !self.posting
    }

    pub fn shows_submit(&self) -> bool {
        self.can_submit()
    }

    pub fn shows_spinner(&self) -> bool {
        self.posting
    }

    pub fn input_disabled(&self) -> bool {
        self.posting
    }

    pub fn on_key(&mut self, key: &str) -> Option<CreatePostInput> {
        if key != SUBMIT_KEY {
            return None;
        }
        self.begin()
    }

    pub fn on_submit(&mut self) -> Option<CreatePostInput> {
        self.begin()
    }

    /// Start a submission when allowed and return the request to issue.
    pub fn begin(&mut self) -> Option<CreatePostInput> {
        if !self.can_submit() {
            return None;
        }
        self.posting = true;
        Some(CreatePostInput {
            content: self.content.clone(),
        })
    }

    /// Finish the in-flight submission and report the effects to apply.
    pub fn settle<T>(&mut self, outcome: &Result<T, ProcedureError>) -> Vec<ComposerEffect> {
        self.posting = false;
        match outcome {
            Ok(_) => {
                self.content.clear();
                vec![ComposerEffect::ClearInput, ComposerEffect::InvalidateFeed]
            }
            Err(err) => notification_for(err)
                .map(ComposerEffect::Notify)
                .into_iter()
                .collect(),
        }
    }
}

/// Toast text for a rejected submission; `None` for a duplicate that is
/// already being handled.
pub fn notification_for(err: &ProcedureError) -> Option<String> {
    if matches!(err, ProcedureError::Conflict) {
        return None;
    }
    let message = err
        .field_errors()
        .and_then(|errors| errors.first(CONTENT_FIELD))
        .unwrap_or(GENERIC_FAILURE_MESSAGE);
    Some(message.to_string())
}
