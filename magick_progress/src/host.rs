use std::ffi::{CStr, c_void};
use std::ptr;
use std::sync::Mutex;

use crossbeam_channel::{Receiver, Sender, unbounded};
use magick_bridge::abi::{
    CObject, CObjectType, HOST_API_MAJOR_VERSION, HOST_API_MINOR_VERSION, HostApiEntry,
    HostApiTable, PostCObjectFn,
};
use tracing::debug;

static SINK: Mutex<Option<Sender<HostMessage>>> = Mutex::new(None);

/// A string message delivered to one of the host's ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
    /// Destination port.
    pub port: i64,
    /// UTF-8 payload.
    pub payload: String,
}

/// The host side of the bridge: owns the API table handed to
/// `init_host_api` and receives every posted envelope on a channel.
pub struct HostRuntime {
    _entries: Box<[HostApiEntry; 2]>,
    table: Box<HostApiTable>,
    receiver: Receiver<HostMessage>,
}

impl HostRuntime {
    /// Creates the API table and routes posts to a fresh channel. A newer
    /// runtime takes over delivery from an older one.
    pub fn start() -> Self {
        let (sender, receiver) = unbounded();
        *SINK.lock().unwrap_or_else(|e| e.into_inner()) = Some(sender);

        let post: PostCObjectFn = post_cobject;
        let entries = Box::new([
            HostApiEntry {
                name: c"Dart_PostCObject".as_ptr(),
                // SAFETY: the table erases the type; the bridge restores it.
                function: Some(unsafe {
                    std::mem::transmute::<PostCObjectFn, unsafe extern "C" fn()>(post)
                }),
            },
            HostApiEntry {
                name: ptr::null(),
                function: None,
            },
        ]);
        let table = Box::new(HostApiTable {
            major: HOST_API_MAJOR_VERSION,
            minor: HOST_API_MINOR_VERSION,
            functions: entries.as_ptr(),
        });

        Self {
            _entries: entries,
            table,
            receiver,
        }
    }

    /// Initialization blob for `init_host_api`. Valid while `self` lives.
    pub fn api_data(&self) -> *mut c_void {
        ptr::from_ref::<HostApiTable>(&self.table).cast_mut().cast()
    }

    /// Messages posted to any port.
    pub fn messages(&self) -> &Receiver<HostMessage> {
        &self.receiver
    }
}

/// `Dart_PostCObject` implementation: copies string envelopes into the
/// current runtime's channel.
///
/// # SAFETY
/// `message` must be null or point to a valid envelope for the duration of
/// the call.
pub unsafe extern "C" fn post_cobject(port: i64, message: *mut CObject) -> bool {
    if message.is_null() {
        return false;
    }

    // SAFETY: non-null and valid for this call (caller contract).
    let message = unsafe { &*message };
    if message.kind != CObjectType::String {
        debug!(port, kind = ?message.kind, "unsupported envelope");
        return false;
    }

    // SAFETY: `kind` says the string member is live.
    let text = unsafe { message.value.as_string };
    if text.is_null() {
        return false;
    }
    // SAFETY: the bridge posts NUL-terminated strings it owns until we return.
    let payload = unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned();

    let sink = SINK.lock().unwrap_or_else(|e| e.into_inner());
    match sink.as_ref() {
        Some(sender) => sender.send(HostMessage { port, payload }).is_ok(),
        None => false,
    }
}
