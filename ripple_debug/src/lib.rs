// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for ripple
//! diagnostics.
//!
//! This crate provides [`TraceSink`](ripple_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//! - [`log::TracingSink`]: forwards events to the `tracing` ecosystem as
//!   structured events.

pub mod chrome;
pub mod log;
pub mod pretty;
pub mod recorder;
