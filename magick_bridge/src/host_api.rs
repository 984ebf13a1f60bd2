use std::ffi::{CStr, CString, c_void};
use std::sync::OnceLock;

use tracing::{debug, info, warn};

use crate::abi::{
    CObject, HOST_API_MAJOR_VERSION, HOST_API_MINOR_VERSION, HostApiEntry, HostApiTable,
    HostPortId, POST_COBJECT_SYMBOL, PostCObjectFn,
};
use crate::error::{HostApiError, PostError};
use crate::port::MessagePort;

static HOST_API: OnceLock<HostApi> = OnceLock::new();

/// Functions resolved from the host's API table.
#[derive(Debug, Clone, Copy)]
pub struct HostApi {
    major: i32,
    minor: i32,
    post_cobject: PostCObjectFn,
}

impl HostApi {
    /// Resolves the functions the bridge needs from `table`.
    ///
    /// # SAFETY
    /// `table` must be null or point to a valid [`HostApiTable`] whose
    /// `functions` array is terminated by an entry with a null `name`, and
    /// every non-null name must be a NUL-terminated C string.
    pub unsafe fn from_table(table: *const HostApiTable) -> Result<Self, HostApiError> {
        if table.is_null() {
            return Err(HostApiError::NullData);
        }

        // SAFETY: checked non-null; validity is the caller's contract.
        let table = unsafe { &*table };

        if table.major != HOST_API_MAJOR_VERSION {
            return Err(HostApiError::VersionMismatch {
                expected: HOST_API_MAJOR_VERSION,
                found: table.major,
            });
        }
        if table.minor < HOST_API_MINOR_VERSION {
            warn!(
                found = table.minor,
                expected = HOST_API_MINOR_VERSION,
                "host API minor version is older than expected"
            );
        }

        // SAFETY: same contract as above, forwarded to the entry walk.
        let post = unsafe { find_function(table.functions, POST_COBJECT_SYMBOL) }
            .ok_or(HostApiError::MissingFunction(POST_COBJECT_SYMBOL))?;

        // SAFETY: the host publishes `Dart_PostCObject` with exactly the
        // `PostCObjectFn` signature; the table only erases its type.
        let post_cobject = unsafe { std::mem::transmute::<unsafe extern "C" fn(), PostCObjectFn>(post) };

        Ok(Self {
            major: table.major,
            minor: table.minor,
            post_cobject,
        })
    }

    /// `(major, minor)` announced by the host.
    pub fn version(&self) -> (i32, i32) {
        (self.major, self.minor)
    }

    /// Posts `message` as a string envelope to `port`.
    ///
    /// The host copies the payload before returning, so the C string only
    /// lives for the duration of this call.
    pub fn post_string(&self, port: HostPortId, message: &str) -> Result<(), PostError> {
        let text = CString::new(message).map_err(|_| PostError::InteriorNul)?;
        let mut envelope = CObject::string(text.as_ptr());

        // SAFETY: `post_cobject` came from a validated host table; the
        // envelope and its string outlive the call.
        let accepted = unsafe { (self.post_cobject)(port, &mut envelope) };
        if accepted {
            Ok(())
        } else {
            Err(PostError::Rejected(port))
        }
    }
}

unsafe fn find_function(
    mut entry: *const HostApiEntry,
    name: &str,
) -> Option<unsafe extern "C" fn()> {
    if entry.is_null() {
        return None;
    }

    // SAFETY: the array is terminated by a null name (caller contract).
    unsafe {
        while !(*entry).name.is_null() {
            if CStr::from_ptr((*entry).name).to_bytes() == name.as_bytes() {
                return (*entry).function;
            }
            entry = entry.add(1);
        }
    }
    None
}

/// Initializes the process-wide host API from the host's blob.
///
/// Repeated successful calls keep the first resolved table.
///
/// # SAFETY
/// Same contract as [`HostApi::from_table`] for `data`.
pub unsafe fn initialize(data: *mut c_void) -> Result<&'static HostApi, HostApiError> {
    // SAFETY: forwarded contract.
    let api = unsafe { HostApi::from_table(data.cast_const().cast::<HostApiTable>())? };

    if let Some(existing) = HOST_API.get() {
        debug!("host API already initialized, keeping the first table");
        return Ok(existing);
    }

    let installed = HOST_API.get_or_init(|| api);
    let (major, minor) = installed.version();
    info!(major, minor, "host API initialized");
    Ok(installed)
}

/// The initialized host API, if any.
pub fn get() -> Option<&'static HostApi> {
    HOST_API.get()
}

/// [`MessagePort`] that posts to a host runtime port through the
/// initialized host API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPort {
    id: HostPortId,
}

impl HostPort {
    /// Port identified by `id` in the host's routing table.
    pub fn new(id: HostPortId) -> Self {
        Self { id }
    }

    /// The port identifier.
    pub fn id(&self) -> HostPortId {
        self.id
    }
}

impl MessagePort for HostPort {
    fn post(&self, message: &str) -> Result<(), PostError> {
        get()
            .ok_or(PostError::NotInitialized)?
            .post_string(self.id, message)
    }
}
