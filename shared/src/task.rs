//! Generic single-shot request lifecycle shared by every dashboard feature.
//!
//! ```text
//! Idle ──submit──▶ Loading ──resolve──▶ Success | Error
//!  ▲                                          │
//!  └──────────── reset / set_input ◀──────────┘
//! ```
//!
//! Every submission gets a fresh [`Generation`]. A response is applied only if
//! it carries the generation of the submission still in flight; anything else
//! is stale and dropped. `reset` bumps the generation, so a reset task never
//! sees the answer to a request it no longer owns.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{ValidationError, ValidationRule};
use crate::ApiError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase<R> {
    /// Waiting for input or a submit. `notice` holds the last rejected input's
    /// validation message.
    Idle { notice: Option<ValidationError> },
    Loading,
    Success(R),
    Error(ApiError),
}

impl<R> Default for Phase<R> {
    fn default() -> Self {
        Phase::Idle { notice: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskRejected {
    #[error("a request is already in flight")]
    Busy,

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Work handed to the API client when a task enters `Loading`.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission<I> {
    pub generation: Generation,
    pub input: I,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug, Clone)]
pub struct Task<I, R> {
    input: Option<I>,
    phase: Phase<R>,
    generation: Generation,
}

impl<I, R> Default for Task<I, R> {
    fn default() -> Self {
        Self {
            input: None,
            phase: Phase::default(),
            generation: Generation::default(),
        }
    }
}

impl<I: Clone, R> Task<I, R> {
    /// Replaces the pending input. Any previous result or error is dropped;
    /// an input the rule rejects clears the pending input and leaves a notice.
    pub fn set_input<V>(&mut self, input: I, rule: &V) -> Result<(), TaskRejected>
    where
        V: ValidationRule<I> + ?Sized,
    {
        if self.is_loading() {
            return Err(TaskRejected::Busy);
        }

        match rule.check(input) {
            Ok(accepted) => {
                self.input = Some(accepted);
                self.phase = Phase::Idle { notice: None };
                Ok(())
            }
            Err(e) => {
                self.input = None;
                self.phase = Phase::Idle {
                    notice: Some(e.clone()),
                };
                Err(TaskRejected::Invalid(e))
            }
        }
    }

    /// Starts a request for the pending input. `None` while loading or when
    /// no validated input is present.
    pub fn submit(&mut self) -> Option<Submission<I>> {
        if self.is_loading() {
            return None;
        }
        let input = self.input.clone()?;

        self.generation = self.generation.next();
        self.phase = Phase::Loading;

        Some(Submission {
            generation: self.generation,
            input,
        })
    }

    pub fn resolve(&mut self, generation: Generation, outcome: Result<R, ApiError>) -> Resolution {
        if generation != self.generation || !self.is_loading() {
            return Resolution::Stale;
        }

        self.phase = match outcome {
            Ok(result) => Phase::Success(result),
            Err(error) => Phase::Error(error),
        };
        Resolution::Applied
    }

    pub fn reset(&mut self) {
        self.input = None;
        self.phase = Phase::default();
        self.generation = self.generation.next();
    }
}

impl<I, R> Task<I, R> {
    #[must_use]
    pub fn input(&self) -> Option<&I> {
        self.input.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> &Phase<R> {
        &self.phase
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self.phase {
            Phase::Idle { .. } => TaskStatus::Idle,
            Phase::Loading => TaskStatus::Loading,
            Phase::Success(_) => TaskStatus::Success,
            Phase::Error(_) => TaskStatus::Error,
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    #[must_use]
    pub fn result(&self) -> Option<&R> {
        match &self.phase {
            Phase::Success(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&ApiError> {
        match &self.phase {
            Phase::Error(error) => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn notice(&self) -> Option<&ValidationError> {
        match &self.phase {
            Phase::Idle { notice } => notice.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.input.is_some() && !self.is_loading()
    }

    #[must_use]
    pub fn can_reset(&self) -> bool {
        self.input.is_some() || !matches!(self.phase, Phase::Idle { notice: None })
    }
}
