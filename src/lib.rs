//! closedgate library - closed-hours gating for a content site
//!
//! This module exports internal components for integration testing.

pub mod cli;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod gate;
pub mod policy;
pub mod state;
pub mod status;
pub mod ticker;
