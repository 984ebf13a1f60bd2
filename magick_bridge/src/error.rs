use thiserror::Error;

/// Failures of the host API initializer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostApiError {
    /// The initialization blob pointer was null.
    #[error("Host API initialization data is null")]
    NullData,

    /// The table was built for an incompatible major version.
    #[error("Host API major version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this bridge understands.
        expected: i32,
        /// Version announced by the host.
        found: i32,
    },

    /// A required function is absent from the table.
    #[error("Host API table has no `{0}` entry")]
    MissingFunction(&'static str),
}

impl HostApiError {
    /// Status code returned across the C boundary.
    pub fn code(&self) -> isize {
        match self {
            HostApiError::VersionMismatch { .. } => -1,
            HostApiError::NullData => -2,
            HostApiError::MissingFunction(_) => -3,
        }
    }
}

/// Failures of a single non-blocking post.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostError {
    /// `init_host_api` never succeeded in this process.
    #[error("Host API is not initialized")]
    NotInitialized,

    /// The host refused the message (closed or unknown port).
    #[error("Host rejected message for port {0}")]
    Rejected(i64),

    /// The payload cannot be passed as a C string.
    #[error("Message contains an interior NUL byte")]
    InteriorNul,

    /// A bounded channel has no free slot.
    #[error("Channel is full")]
    Full,

    /// The receiving side is gone.
    #[error("Channel is disconnected")]
    Disconnected,
}

/// Bridge-level errors.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Allocating the monitor cell failed.
    #[error("Failed to allocate {0} bytes for the progress monitor")]
    Allocation(usize),

    /// The wand handle was null.
    #[error("Wand handle is null")]
    NullWand,

    /// No MagickWand library exposing `MagickSetProgressMonitor` was found.
    #[error("MagickWand library not found (tried: {0})")]
    WandNotFound(String),

    /// Loading an explicitly named MagickWand library failed.
    #[error("MagickWand load error: {0}")]
    WandLoad(#[from] libloading::Error),
}

impl BridgeError {
    /// Status code reported across the C boundary.
    pub fn code(&self) -> isize {
        match self {
            Self::WandLoad(_) => -1,
            Self::Allocation(_) => -4,
            Self::NullWand => -5,
            Self::WandNotFound(_) => -6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_api_codes() {
        assert_eq!(HostApiError::VersionMismatch { expected: 2, found: 3 }.code(), -1);
        assert_eq!(HostApiError::NullData.code(), -2);
        assert_eq!(HostApiError::MissingFunction("Dart_PostCObject").code(), -3);
    }

    #[test]
    fn bridge_codes_are_distinct_and_negative() {
        let errors = [
            BridgeError::Allocation(16),
            BridgeError::NullWand,
            BridgeError::WandNotFound("libMagickWand-7.Q16HDRI.so".into()),
        ];
        let codes: Vec<isize> = errors.iter().map(BridgeError::code).collect();
        assert_eq!(codes, vec![-4, -5, -6]);
    }

    #[test]
    fn load_failure_maps_to_minus_one() {
        // SAFETY: the path does not exist, so no initializer runs.
        let err = unsafe { libloading::Library::new("/nonexistent/libMagickWand.so") }.unwrap_err();
        assert_eq!(BridgeError::from(err).code(), -1);
    }
}
