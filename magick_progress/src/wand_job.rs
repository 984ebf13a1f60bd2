use libloading::Library;
use std::ffi::{CStr, CString, c_void};
use std::os::raw::{c_char, c_int};
use std::path::Path;

use magick_bridge::abi::{MAGICK_FALSE, MagickBooleanType};
use tracing::{debug, info};

use crate::error::AppError;
use crate::params::JobParams;

type GenesisFn = unsafe extern "C" fn();
type TerminusFn = unsafe extern "C" fn();
type NewWandFn = unsafe extern "C" fn() -> *mut c_void;
type DestroyWandFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type PathOpFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> MagickBooleanType;
type ResizeFn = unsafe extern "C" fn(*mut c_void, usize, usize, c_int) -> MagickBooleanType;
type BlurFn = unsafe extern "C" fn(*mut c_void, f64, f64) -> MagickBooleanType;
type QualityFn = unsafe extern "C" fn(*mut c_void, usize) -> MagickBooleanType;
type DimensionFn = unsafe extern "C" fn(*mut c_void) -> usize;
type GetExceptionFn = unsafe extern "C" fn(*mut c_void, *mut c_int) -> *mut c_char;
type RelinquishFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;

/// The slice of the MagickWand C API the runner drives.
///
/// Loading calls `MagickWandGenesis`; dropping calls `MagickWandTerminus`.
pub struct WandApi {
    _lib: Library,
    terminus: TerminusFn,
    new_wand: NewWandFn,
    destroy_wand: DestroyWandFn,
    read_image: PathOpFn,
    write_image: PathOpFn,
    resize_image: ResizeFn,
    blur_image: BlurFn,
    set_quality: QualityFn,
    image_width: DimensionFn,
    image_height: DimensionFn,
    get_exception: GetExceptionFn,
    relinquish: RelinquishFn,
}

impl WandApi {
    /// Loads MagickWand (ImageMagick 7) from `path` and initializes it.
    ///
    /// # SAFETY
    /// `path` must be an ImageMagick 7 MagickWand library; the symbols are
    /// bound with its C signatures.
    pub unsafe fn load(path: &Path) -> Result<Self, libloading::Error> {
        unsafe {
            let lib = Library::new(path)?;
            let genesis = *lib.get::<GenesisFn>(b"MagickWandGenesis")?;
            let terminus = *lib.get::<TerminusFn>(b"MagickWandTerminus")?;
            let new_wand = *lib.get::<NewWandFn>(b"NewMagickWand")?;
            let destroy_wand = *lib.get::<DestroyWandFn>(b"DestroyMagickWand")?;
            let read_image = *lib.get::<PathOpFn>(b"MagickReadImage")?;
            let write_image = *lib.get::<PathOpFn>(b"MagickWriteImage")?;
            let resize_image = *lib.get::<ResizeFn>(b"MagickResizeImage")?;
            let blur_image = *lib.get::<BlurFn>(b"MagickBlurImage")?;
            let set_quality = *lib.get::<QualityFn>(b"MagickSetImageCompressionQuality")?;
            let image_width = *lib.get::<DimensionFn>(b"MagickGetImageWidth")?;
            let image_height = *lib.get::<DimensionFn>(b"MagickGetImageHeight")?;
            let get_exception = *lib.get::<GetExceptionFn>(b"MagickGetException")?;
            let relinquish = *lib.get::<RelinquishFn>(b"MagickRelinquishMemory")?;

            let api = Self {
                _lib: lib,
                terminus,
                new_wand,
                destroy_wand,
                read_image,
                write_image,
                resize_image,
                blur_image,
                set_quality,
                image_width,
                image_height,
                get_exception,
                relinquish,
            };
            genesis();
            Ok(api)
        }
    }

    /// Creates an empty wand.
    pub fn new_wand(&self) -> Wand<'_> {
        // SAFETY: MagickWand is initialized for the lifetime of `self`.
        let raw = unsafe { (self.new_wand)() };
        Wand { api: self, raw }
    }
}

impl Drop for WandApi {
    fn drop(&mut self) {
        // SAFETY: every `Wand` borrows `self`, so none is left alive.
        unsafe { (self.terminus)() };
    }
}

/// An owned `MagickWand*`.
pub struct Wand<'a> {
    api: &'a WandApi,
    raw: *mut c_void,
}

impl Wand<'_> {
    /// Raw handle, for installing the progress monitor.
    pub fn as_ptr(&self) -> *mut c_void {
        self.raw
    }

    /// Reads `input`, applies `params` and writes `output`. Returns the
    /// final image dimensions.
    pub fn run(&self, input: &Path, output: &Path, params: &JobParams) -> Result<(usize, usize), AppError> {
        let input_c = path_cstring(input)?;
        let output_c = path_cstring(output)?;

        // SAFETY: live wand and NUL-terminated path for every call below.
        self.check("read", unsafe { (self.api.read_image)(self.raw, input_c.as_ptr()) })?;
        debug!(width = self.width(), height = self.height(), "image read");

        if let Some(resize) = &params.resize {
            self.check("resize", unsafe {
                (self.api.resize_image)(
                    self.raw,
                    resize.width as usize,
                    resize.height as usize,
                    resize.filter.as_raw(),
                )
            })?;
        }

        if let Some(blur) = &params.blur {
            self.check("blur", unsafe {
                (self.api.blur_image)(self.raw, blur.radius, blur.sigma)
            })?;
        }

        if let Some(quality) = params.quality {
            self.check("set quality", unsafe {
                (self.api.set_quality)(self.raw, usize::from(quality))
            })?;
        }

        self.check("write", unsafe { (self.api.write_image)(self.raw, output_c.as_ptr()) })?;

        let dimensions = (self.width(), self.height());
        info!(width = dimensions.0, height = dimensions.1, "image written");
        Ok(dimensions)
    }

    fn width(&self) -> usize {
        // SAFETY: live wand.
        unsafe { (self.api.image_width)(self.raw) }
    }

    fn height(&self) -> usize {
        // SAFETY: live wand.
        unsafe { (self.api.image_height)(self.raw) }
    }

    fn check(&self, operation: &'static str, status: MagickBooleanType) -> Result<(), AppError> {
        if status != MAGICK_FALSE {
            return Ok(());
        }
        Err(AppError::Wand {
            operation,
            reason: self.exception(),
        })
    }

    fn exception(&self) -> String {
        let mut severity: c_int = 0;
        // SAFETY: live wand; the returned description is ours to relinquish.
        unsafe {
            let text = (self.api.get_exception)(self.raw, &mut severity);
            if text.is_null() {
                return format!("unknown error (severity {severity})");
            }
            let message = CStr::from_ptr(text).to_string_lossy().into_owned();
            (self.api.relinquish)(text.cast());
            message
        }
    }
}

impl Drop for Wand<'_> {
    fn drop(&mut self) {
        // SAFETY: the wand is owned and destroyed exactly once.
        unsafe { (self.api.destroy_wand)(self.raw) };
    }
}

/// Converts a path to a C string for MagickWand.
pub fn path_cstring(path: &Path) -> Result<CString, AppError> {
    let text = path.display().to_string();
    CString::new(text.clone()).map_err(|_| AppError::InvalidPathNul(text))
}
