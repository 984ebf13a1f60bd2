#![deny(missing_docs)]

//! Host-side runner for the MagickWand progress bridge.

/// Dynamic loading of the bridge library.
pub mod bridge_loader;

/// Error types used by the runner.
pub mod error;

/// In-process stand-in for the host runtime's message ports.
pub mod host;

/// Job description parsed from the params file.
pub mod params;

/// Forwarding of posted messages to the console.
pub mod report;

/// MagickWand job execution.
pub mod wand_job;
