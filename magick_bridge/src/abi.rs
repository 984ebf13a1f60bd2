use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

/// `MagickBooleanType` as MagickWand declares it (a C enum).
pub type MagickBooleanType = c_uint;

/// `MagickFalse`.
pub const MAGICK_FALSE: MagickBooleanType = 0;

/// `MagickTrue`. Returned from a progress monitor it means "continue".
pub const MAGICK_TRUE: MagickBooleanType = 1;

/// MagickWand progress monitor callback.
///
/// Arguments are the stage tag, the tick offset, the total size hint and the
/// client data pointer given at registration.
pub type MagickProgressMonitor =
    unsafe extern "C" fn(*const c_char, i64, u64, *mut c_void) -> MagickBooleanType;

/// `MagickSetProgressMonitor(wand, monitor, client_data)`; returns the
/// previously installed monitor.
pub type SetProgressMonitorFn = unsafe extern "C" fn(
    *mut c_void,
    Option<MagickProgressMonitor>,
    *mut c_void,
) -> Option<MagickProgressMonitor>;

/// Host port identifier (`Dart_Port`).
pub type HostPortId = i64;

/// Major version of the host API table this bridge understands.
pub const HOST_API_MAJOR_VERSION: c_int = 2;

/// Minor version the bridge was written against. Older tables still work.
pub const HOST_API_MINOR_VERSION: c_int = 3;

/// Name of the posting function inside the host API table.
pub const POST_COBJECT_SYMBOL: &str = "Dart_PostCObject";

/// One named function pointer in the host API table.
#[repr(C)]
pub struct HostApiEntry {
    /// NUL-terminated function name; null terminates the table.
    pub name: *const c_char,
    /// Type-erased function pointer.
    pub function: Option<unsafe extern "C" fn()>,
}

/// Initialization blob handed over by the host runtime.
#[repr(C)]
pub struct HostApiTable {
    /// Major version; must equal [`HOST_API_MAJOR_VERSION`].
    pub major: c_int,
    /// Minor version.
    pub minor: c_int,
    /// Null-name terminated array of entries.
    pub functions: *const HostApiEntry,
}

/// Discriminant of a host message envelope (`Dart_CObject_Type`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CObjectType {
    /// `kNull`
    Null = 0,
    /// `kBool`
    Bool = 1,
    /// `kInt32`
    Int32 = 2,
    /// `kInt64`
    Int64 = 3,
    /// `kDouble`
    Double = 4,
    /// `kString`, a NUL-terminated UTF-8 payload.
    String = 5,
}

/// Payload of a host message envelope.
///
/// Only the variants the bridge produces are named; `_layout` keeps the union
/// as large as the host's own definition.
#[repr(C)]
#[derive(Clone, Copy)]
pub union CObjectValue {
    /// Boolean payload.
    pub as_bool: bool,
    /// 32-bit integer payload.
    pub as_int32: i32,
    /// 64-bit integer payload.
    pub as_int64: i64,
    /// Double payload.
    pub as_double: f64,
    /// UTF-8 string payload.
    pub as_string: *const c_char,
    _layout: [u64; 5],
}

/// Host message envelope (`Dart_CObject`).
#[repr(C)]
pub struct CObject {
    /// Which union member is live.
    pub kind: CObjectType,
    /// The payload.
    pub value: CObjectValue,
}

impl CObject {
    /// Envelope carrying a borrowed C string.
    pub fn string(text: *const c_char) -> Self {
        Self {
            kind: CObjectType::String,
            value: CObjectValue { as_string: text },
        }
    }

    /// Envelope carrying a 64-bit integer.
    pub fn int64(value: i64) -> Self {
        Self {
            kind: CObjectType::Int64,
            value: CObjectValue { as_int64: value },
        }
    }
}

/// `Dart_PostCObject(port, message)`; `true` when the host accepted it.
pub type PostCObjectFn = unsafe extern "C" fn(HostPortId, *mut CObject) -> bool;
