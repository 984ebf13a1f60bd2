use std::ffi::{CStr, OsStr, c_void};
use std::os::raw::c_char;
use std::ptr;

use tracing::{error, warn};

use crate::abi::HostPortId;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::host_api::{self, HostPort};
use crate::logging;
use crate::progress::{self, MonitorCell, ProgressMonitor};
use crate::wand::{self, WandLibrary};

/// Initializes the host runtime's native API from its initialization blob.
///
/// Returns `0` on success, `-1` on a major version mismatch, `-2` for a null
/// pointer and `-3` when the table lacks `Dart_PostCObject`.
///
/// # SAFETY
/// `data` must be null or point to the host's API table as described in
/// [`host_api::HostApi::from_table`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn init_host_api(data: *mut c_void) -> isize {
    // SAFETY: forwarded contract.
    match unsafe { host_api::initialize(data) } {
        Ok(_) => 0,
        Err(e) => {
            warn!(error = %e, "host API initialization failed");
            e.code()
        }
    }
}

/// Forwards the progress of `wand` to the host port `send_port`.
///
/// Returns the monitor cell the caller must release with
/// [`magick_release_progress_monitor_port`] once the wand has finished, or
/// null when the wand is null, MagickWand cannot be found or allocation
/// fails.
///
/// # SAFETY
/// `wand` must be null or a live `MagickWand*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn magick_set_progress_monitor_port(
    wand: *mut c_void,
    send_port: HostPortId,
) -> *mut c_void {
    if wand.is_null() {
        warn!(send_port, "refusing to install a progress monitor on a null wand");
        return ptr::null_mut();
    }

    let library = match wand::wand() {
        Ok(library) => library,
        Err(e) => {
            error!(error = %e, code = e.code(), "cannot install progress monitor");
            return ptr::null_mut();
        }
    };

    let monitor = ProgressMonitor::new(HostPort::new(send_port));
    // SAFETY: `wand` is a live MagickWand handle (caller contract) and the
    // cell is handed to the caller, who keeps it alive for the job.
    match unsafe { progress::install(library, wand, monitor) } {
        Ok(cell) => cell.into_raw(),
        Err(e) => {
            error!(error = %e, code = e.code(), send_port, "cannot install progress monitor");
            ptr::null_mut()
        }
    }
}

/// Frees a cell returned by [`magick_set_progress_monitor_port`]. Null is
/// ignored.
///
/// # SAFETY
/// `cell` must come from [`magick_set_progress_monitor_port`], be released
/// at most once, and its wand must no longer report progress.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn magick_release_progress_monitor_port(cell: *mut c_void) {
    // SAFETY: forwarded contract.
    drop(unsafe { MonitorCell::<HostPort>::from_raw(cell) });
}

/// Pins the MagickWand library the bridge registers monitors through.
///
/// Returns `0` on success, `-1` when the library cannot be loaded and `-2`
/// for a null or non UTF-8 path.
///
/// # SAFETY
/// `path` must be null or a NUL-terminated C string naming a MagickWand
/// library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn magick_bridge_use_wand_library(path: *const c_char) -> isize {
    if path.is_null() {
        return -2;
    }
    // SAFETY: non-null NUL-terminated string (caller contract).
    let Ok(path) = unsafe { CStr::from_ptr(path) }.to_str() else {
        return -2;
    };

    // SAFETY: the caller names a MagickWand library.
    match unsafe { WandLibrary::load(OsStr::new(path)) } {
        Ok(library) => {
            wand::pin(library);
            0
        }
        Err(e) => {
            let e = BridgeError::from(e);
            error!(library = path, error = %e, "cannot load MagickWand");
            e.code()
        }
    }
}

/// Installs the bridge's log subscriber. Returns `0` when installed and `1`
/// when one was already present.
#[unsafe(no_mangle)]
pub extern "C" fn magick_bridge_init_logging() -> isize {
    if logging::init_tracing(&BridgeConfig::from_env()) {
        0
    } else {
        1
    }
}
