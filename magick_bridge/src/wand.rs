use std::ffi::{OsStr, OsString, c_void};
use std::sync::OnceLock;

use libloading::Library;
use tracing::{debug, info};

use crate::abi::{MagickProgressMonitor, SetProgressMonitorFn};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::progress::ProgressHook;

#[cfg(target_os = "windows")]
const DEFAULT_LIBRARY_NAMES: &[&str] = &["CORE_RL_MagickWand_.dll", "libMagickWand-7.Q16HDRI-10.dll"];

#[cfg(target_os = "macos")]
const DEFAULT_LIBRARY_NAMES: &[&str] = &[
    "libMagickWand-7.Q16HDRI.dylib",
    "libMagickWand-7.Q16HDRI.10.dylib",
    "libMagickWand-7.Q16.dylib",
    "libMagickWand-6.Q16.dylib",
];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const DEFAULT_LIBRARY_NAMES: &[&str] = &[
    "libMagickWand-7.Q16HDRI.so",
    "libMagickWand-7.Q16HDRI.so.10",
    "libMagickWand-7.Q16.so",
    "libMagickWand-7.Q16.so.10",
    "libMagickWand-6.Q16.so",
    "libMagickWand-6.Q16.so.6",
];

static WAND: OnceLock<WandLibrary> = OnceLock::new();

/// MagickWand library handle with `MagickSetProgressMonitor` resolved.
pub struct WandLibrary {
    _lib: Library,
    set_progress_monitor: SetProgressMonitorFn,
    origin: String,
}

impl std::fmt::Debug for WandLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WandLibrary").field("origin", &self.origin).finish()
    }
}

impl WandLibrary {
    /// Loads the MagickWand library at `path` (a file path or a name the
    /// platform loader searches for).
    ///
    /// # SAFETY
    /// Loading runs the library's initializers, and the library must export
    /// `MagickSetProgressMonitor` with the `SetProgressMonitorFn` signature.
    pub unsafe fn load(path: &OsStr) -> Result<Self, libloading::Error> {
        // SAFETY: forwarded contract.
        let lib = unsafe { Library::new(path)? };
        // SAFETY: forwarded contract.
        unsafe { Self::from_library(lib, path.to_string_lossy().into_owned()) }
    }

    /// Resolves MagickWand from symbols already loaded into the process, as
    /// when the host links ImageMagick itself.
    ///
    /// # SAFETY
    /// Same signature contract as [`WandLibrary::load`].
    #[cfg(unix)]
    pub unsafe fn from_process() -> Result<Self, libloading::Error> {
        let lib: Library = libloading::os::unix::Library::this().into();
        // SAFETY: forwarded contract.
        unsafe { Self::from_library(lib, "<process>".to_string()) }
    }

    /// Resolves MagickWand from symbols already loaded into the process, as
    /// when the host links ImageMagick itself.
    ///
    /// # SAFETY
    /// Same signature contract as [`WandLibrary::load`].
    #[cfg(windows)]
    pub unsafe fn from_process() -> Result<Self, libloading::Error> {
        let lib: Library = libloading::os::windows::Library::this()?.into();
        // SAFETY: forwarded contract.
        unsafe { Self::from_library(lib, "<process>".to_string()) }
    }

    unsafe fn from_library(lib: Library, origin: String) -> Result<Self, libloading::Error> {
        // SAFETY: symbol type is the documented MagickWand signature.
        let set_progress_monitor = unsafe { *lib.get::<SetProgressMonitorFn>(b"MagickSetProgressMonitor")? };
        Ok(Self {
            _lib: lib,
            set_progress_monitor,
            origin,
        })
    }

    /// Where the library was resolved from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Finds MagickWand following `config`: explicit path, then the running
    /// process, then the platform's default library names.
    pub fn locate(config: &BridgeConfig) -> Result<Self, BridgeError> {
        if let Some(path) = &config.wand_library {
            // SAFETY: the configured library is trusted to be MagickWand.
            return Ok(unsafe { Self::load(path.as_os_str())? });
        }

        let mut tried: Vec<String> = Vec::new();

        // SAFETY: a process exporting this symbol name is running MagickWand.
        match unsafe { Self::from_process() } {
            Ok(lib) => return Ok(lib),
            Err(e) => {
                debug!(error = %e, "MagickWand not linked into the process");
                tried.push("<process>".to_string());
            }
        }

        for name in DEFAULT_LIBRARY_NAMES {
            // SAFETY: default names are MagickWand builds.
            match unsafe { Self::load(&OsString::from(name)) } {
                Ok(lib) => return Ok(lib),
                Err(e) => {
                    debug!(library = name, error = %e, "MagickWand candidate rejected");
                    tried.push((*name).to_string());
                }
            }
        }

        Err(BridgeError::WandNotFound(tried.join(", ")))
    }
}

impl ProgressHook for WandLibrary {
    unsafe fn set_progress_monitor(
        &self,
        wand: *mut c_void,
        monitor: MagickProgressMonitor,
        client_data: *mut c_void,
    ) {
        // SAFETY: forwarded contract; the previous monitor is discarded.
        unsafe { (self.set_progress_monitor)(wand, Some(monitor), client_data) };
    }
}

/// Pins the MagickWand library used by [`wand`]. Returns the pinned library,
/// which is the earlier one if a library was already in use.
pub fn pin(library: WandLibrary) -> &'static WandLibrary {
    let origin = library.origin.clone();
    let pinned = WAND.get_or_init(|| library);
    if pinned.origin != origin {
        info!(requested = %origin, active = %pinned.origin, "MagickWand library already in use");
    }
    pinned
}

/// The process-wide MagickWand library, located on first use.
pub fn wand() -> Result<&'static WandLibrary, BridgeError> {
    if let Some(lib) = WAND.get() {
        return Ok(lib);
    }

    let lib = WandLibrary::locate(&BridgeConfig::from_env())?;
    info!(origin = lib.origin(), "MagickWand library located");
    Ok(pin(lib))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn explicit_missing_library_is_a_load_error() {
        let config = BridgeConfig {
            wand_library: Some(PathBuf::from("/nonexistent/libMagickWand-test.so")),
            ..BridgeConfig::default()
        };
        let err = WandLibrary::locate(&config).unwrap_err();
        assert!(matches!(err, BridgeError::WandLoad(_)));
    }

    #[test]
    fn default_names_are_listed() {
        assert!(!DEFAULT_LIBRARY_NAMES.is_empty());
        assert!(DEFAULT_LIBRARY_NAMES.iter().all(|n| n.contains("MagickWand")));
    }
}
