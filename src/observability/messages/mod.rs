// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging and tracing.
//!
//! Each message type implements:
//!
//! * `Display` - human-readable output
//! * [`StructuredLog`] - machine-readable fields + span creation

pub mod engine;
pub mod planner;

use tracing::Span;

/// Trait for messages that support structured logging and tracing.
///
/// `log()` emits the human-readable message together with the message's
/// fields at the level appropriate to the event; `span()` creates a
/// `tracing` span carrying the same fields as attributes.
pub trait StructuredLog {
    /// Emit a log event with structured fields.
    fn log(&self);

    /// Create a span with this message's fields as attributes.
    fn span(&self, name: &str) -> Span;
}
