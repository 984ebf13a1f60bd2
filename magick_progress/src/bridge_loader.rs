use libloading::Library;
use std::ffi::{CStr, c_void};
use std::os::raw::c_char;
use std::path::Path;

/// `init_host_api(data) -> status`.
pub type InitHostApiFn = unsafe extern "C" fn(*mut c_void) -> isize;
/// `magick_set_progress_monitor_port(wand, port) -> cell`.
pub type SetMonitorPortFn = unsafe extern "C" fn(*mut c_void, i64) -> *mut c_void;
/// `magick_release_progress_monitor_port(cell)`.
pub type ReleaseMonitorPortFn = unsafe extern "C" fn(*mut c_void);
/// `magick_bridge_use_wand_library(path) -> status`.
pub type UseWandLibraryFn = unsafe extern "C" fn(*const c_char) -> isize;
/// `magick_bridge_init_logging() -> status`.
pub type InitLoggingFn = unsafe extern "C" fn() -> isize;

/// Dynamically loaded progress bridge, resolved the way a host runtime
/// would bind it.
///
/// The function pointers stay valid because `_lib` is kept alive alongside.
pub struct Bridge {
    _lib: Library,
    init_host_api: InitHostApiFn,
    set_monitor_port: SetMonitorPortFn,
    release_monitor_port: ReleaseMonitorPortFn,
    use_wand_library: UseWandLibraryFn,
    init_logging: InitLoggingFn,
}

impl Bridge {
    /// Loads the bridge dynamic library and resolves its exports.
    ///
    /// # SAFETY
    /// The caller must ensure that the library at `path`:
    /// - exports every bridge symbol with the exact ABI declared above,
    /// - remains compatible for the lifetime of the returned `Bridge`.
    pub unsafe fn load(path: &Path) -> Result<Self, libloading::Error> {
        unsafe {
            let lib = Library::new(path)?;
            let init_host_api = *lib.get::<InitHostApiFn>(b"init_host_api")?;
            let set_monitor_port =
                *lib.get::<SetMonitorPortFn>(b"magick_set_progress_monitor_port")?;
            let release_monitor_port =
                *lib.get::<ReleaseMonitorPortFn>(b"magick_release_progress_monitor_port")?;
            let use_wand_library =
                *lib.get::<UseWandLibraryFn>(b"magick_bridge_use_wand_library")?;
            let init_logging = *lib.get::<InitLoggingFn>(b"magick_bridge_init_logging")?;

            Ok(Self {
                _lib: lib,
                init_host_api,
                set_monitor_port,
                release_monitor_port,
                use_wand_library,
                init_logging,
            })
        }
    }

    /// Hands the host API table to the bridge; returns the bridge's status.
    ///
    /// # SAFETY
    /// `table` must satisfy the bridge's table contract and outlive every post.
    pub unsafe fn init_host_api(&self, table: *mut c_void) -> isize {
        unsafe { (self.init_host_api)(table) }
    }

    /// Installs the progress monitor of `wand` for `port`; null on failure.
    ///
    /// # SAFETY
    /// `wand` must be a live `MagickWand*` from the same MagickWand library
    /// the bridge uses.
    pub unsafe fn set_monitor_port(&self, wand: *mut c_void, port: i64) -> *mut c_void {
        unsafe { (self.set_monitor_port)(wand, port) }
    }

    /// Frees a monitor cell.
    ///
    /// # SAFETY
    /// `cell` must come from [`Bridge::set_monitor_port`] and its wand must
    /// be done reporting progress.
    pub unsafe fn release_monitor_port(&self, cell: *mut c_void) {
        unsafe { (self.release_monitor_port)(cell) }
    }

    /// Points the bridge at a MagickWand library.
    pub fn use_wand_library(&self, path: &CStr) -> isize {
        // SAFETY: `path` is a valid C string for the duration of the call.
        unsafe { (self.use_wand_library)(path.as_ptr()) }
    }

    /// Turns on the bridge's own logging.
    pub fn init_logging(&self) -> isize {
        // SAFETY: takes no arguments.
        unsafe { (self.init_logging)() }
    }
}

/// Platform file name of the bridge library (`magick_bridge`).
pub fn lib_filename(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_follows_platform_convention() {
        let name = lib_filename("magick_bridge");
        if cfg!(target_os = "windows") {
            assert_eq!(name, "magick_bridge.dll");
        } else if cfg!(target_os = "macos") {
            assert_eq!(name, "libmagick_bridge.dylib");
        } else {
            assert_eq!(name, "libmagick_bridge.so");
        }
    }

    #[test]
    fn missing_library_fails_to_load() {
        let result = unsafe { Bridge::load(Path::new("/nonexistent/libmagick_bridge.so")) };
        assert!(result.is_err());
    }
}
