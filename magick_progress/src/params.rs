use serde::Deserialize;

/// MagickWand job read from the params TOML file.
///
/// ```toml
/// quality = 85
///
/// [resize]
/// width = 640
/// height = 480
/// filter = "lanczos"
///
/// [blur]
/// radius = 0.0
/// sigma = 1.5
/// ```
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobParams {
    /// Optional resize step.
    pub resize: Option<Resize>,
    /// Optional blur step, applied after resizing.
    pub blur: Option<Blur>,
    /// Output compression quality (1-100).
    pub quality: Option<u8>,
}

/// `MagickResizeImage` arguments.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Resize {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Resampling filter.
    #[serde(default)]
    pub filter: Filter,
}

/// `MagickBlurImage` arguments.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Blur {
    /// Radius in pixels; 0 lets MagickWand pick one.
    #[serde(default)]
    pub radius: f64,
    /// Gaussian standard deviation.
    pub sigma: f64,
}

/// Subset of MagickWand's `FilterType`.
#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    /// `PointFilter`
    Point,
    /// `BoxFilter`
    Box,
    /// `TriangleFilter`
    Triangle,
    /// `GaussianFilter`
    Gaussian,
    /// `CatromFilter`
    Catrom,
    /// `MitchellFilter`
    Mitchell,
    /// `LanczosFilter`
    #[default]
    Lanczos,
}

impl Filter {
    /// `FilterType` enum value.
    pub fn as_raw(self) -> i32 {
        match self {
            Filter::Point => 1,
            Filter::Box => 2,
            Filter::Triangle => 3,
            Filter::Gaussian => 8,
            Filter::Catrom => 11,
            Filter::Mitchell => 12,
            Filter::Lanczos => 22,
        }
    }
}

impl JobParams {
    /// Parses a params file body. An empty body is a plain read/write job.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
