// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod adapters;      // dialect import/export
pub mod definition;    // step identity, metadata, shared context
pub mod engine;        // leveler + level-synchronous runner
pub mod errors;        // error taxonomy
pub mod fallback;      // budget monitor + unified fallback runner
pub mod model;         // neutral workflow model + registry
pub mod observability; // structured logging messages
pub mod planner;       // critical path + mode selection
pub mod steps;         // stub and retry step implementations
pub mod storage;       // pipeline store interface
pub mod traits;        // step/hooks/backend seams
