use thiserror::Error;

/// Application-level errors produced by the progress runner.
#[derive(Error, Debug)]
pub enum AppError {
    /// Input image file does not exist.
    #[error("Input file does not exist: {0}")]
    MissingInput(String),

    /// Params file does not exist.
    #[error("Params file does not exist: {0}")]
    MissingParams(String),

    /// Bridge dynamic library does not exist.
    #[error("Bridge library does not exist: {0}")]
    MissingBridge(String),

    /// I/O error occurred while reading files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Params file is not a valid job description.
    #[error("Invalid params: {0}")]
    Params(#[from] toml::de::Error),

    /// Error occurred while loading a dynamic library or one of its symbols.
    #[error("Library load error: {0}")]
    Library(#[from] libloading::Error),

    /// The bridge refused the host API table.
    #[error("Host API initialization failed with code {0}")]
    HostInit(isize),

    /// The bridge could not load the requested MagickWand library.
    #[error("Bridge could not load MagickWand library {0}")]
    BridgeWand(String),

    /// The bridge returned no monitor cell.
    #[error("Bridge could not install the progress monitor")]
    MonitorInstall,

    /// A MagickWand call reported failure.
    #[error("MagickWand {operation} failed: {reason}")]
    Wand {
        /// The failing operation.
        operation: &'static str,
        /// Exception text reported by MagickWand.
        reason: String,
    },

    /// A path contains an interior NUL byte.
    #[error("Path contains a NUL byte: {0}")]
    InvalidPathNul(String),

    /// The worker thread running the job panicked.
    #[error("Image job panicked")]
    JobPanicked,
}
