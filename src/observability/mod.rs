// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Message types follow a struct-based pattern with a `Display`
//! implementation plus the [`messages::StructuredLog`] trait, keeping
//! diagnostic strings out of the execution code and the fields
//! machine-readable. Messages are organized by subsystem:
//!
//! * `messages::engine` - runner lifecycle and step failures
//! * `messages::planner` - mode selection and fallback transitions
//!
//! Adapter warnings are deliberately absent: downgrades and dropped
//! elements are caller-visible data returned from the adapters, never log
//! output.

pub mod messages;
