#![deny(missing_docs)]

//! Bridge forwarding MagickWand progress events to a host runtime's
//! message ports.
//!
//! The C ABI lives in [`exports`]; Rust callers can use [`progress::install`]
//! with any [`port::MessagePort`] directly.

/// C types shared with MagickWand and the host runtime.
pub mod abi;

/// Environment-driven settings.
pub mod config;

/// Error types used by the bridge.
pub mod error;

/// Functions exported to the host runtime.
pub mod exports;

/// Host runtime API table and host ports.
pub mod host_api;

/// Log subscriber setup.
pub mod logging;

/// Message destinations.
pub mod port;

/// Progress events, monitors and their installation.
pub mod progress;

/// MagickWand library resolution.
pub mod wand;

pub use error::{BridgeError, HostApiError, PostError};
pub use port::{ChannelPort, MessagePort};
pub use progress::{MonitorCell, ProgressEvent, ProgressMonitor};
