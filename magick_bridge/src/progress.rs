use std::alloc::{Layout, alloc, dealloc};
use std::borrow::Cow;
use std::ffi::{CStr, c_void};
use std::os::raw::c_char;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::abi::{MAGICK_TRUE, MagickBooleanType, MagickProgressMonitor};
use crate::error::BridgeError;
use crate::port::MessagePort;

/// One progress tick reported by MagickWand.
///
/// Serialized key order is `info`, `size`, `offset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Processing stage tag, e.g. `"Resize/Image"`.
    pub info: String,
    /// Total size hint.
    pub size: u64,
    /// Tick offset within `size`.
    pub offset: i64,
}

impl ProgressEvent {
    /// Builds an event from the callback arguments.
    pub fn new(info: impl Into<String>, offset: i64, size: u64) -> Self {
        Self {
            info: info.into(),
            size,
            offset,
        }
    }

    /// Compact JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty-printed JSON text; this is what goes to the host.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Progress callback context bound to one destination port.
#[derive(Debug)]
pub struct ProgressMonitor<P> {
    port: P,
}

impl<P: MessagePort> ProgressMonitor<P> {
    /// Monitor that forwards every tick to `port`.
    pub fn new(port: P) -> Self {
        Self { port }
    }

    /// The destination port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Handles one tick. Always returns `true` ("continue"): the consumer
    /// has no way to cancel the running operation.
    pub fn on_progress(&self, info: &str, offset: i64, size: u64) -> bool {
        let event = ProgressEvent::new(info, offset, size);
        match event.to_pretty_json() {
            Ok(json) => {
                if let Err(e) = self.port.post(&json) {
                    warn!(error = %e, info, offset, size, "dropping progress message");
                }
            }
            Err(e) => warn!(error = %e, info, "failed to render progress event"),
        }
        true
    }
}

/// C entry point MagickWand calls for a monitor installed by [`install`].
///
/// # SAFETY
/// `client_data` must be null or the pointer of a live
/// [`MonitorCell<P>`] for the same `P`; `text` must be null or a
/// NUL-terminated C string.
pub unsafe extern "C" fn progress_trampoline<P: MessagePort>(
    text: *const c_char,
    offset: i64,
    size: u64,
    client_data: *mut c_void,
) -> MagickBooleanType {
    if client_data.is_null() {
        return MAGICK_TRUE;
    }

    // SAFETY: client data is the cell registered together with this
    // instantiation of the trampoline (caller contract).
    let monitor = unsafe { &*client_data.cast::<ProgressMonitor<P>>() };
    let info: Cow<'_, str> = if text.is_null() {
        Cow::Borrowed("")
    } else {
        // SAFETY: non-null, NUL-terminated per MagickWand's contract.
        unsafe { CStr::from_ptr(text) }.to_string_lossy()
    };

    if catch_unwind(AssertUnwindSafe(|| monitor.on_progress(&info, offset, size))).is_err() {
        error!(info = %info, "progress monitor panicked");
    }
    MAGICK_TRUE
}

/// The image library's progress-monitor registration hook.
pub trait ProgressHook {
    /// Registers `monitor` on `wand` with `client_data`.
    ///
    /// # SAFETY
    /// `wand` must be a valid handle for the underlying library and
    /// `client_data` must stay valid for as long as `monitor` may be called.
    unsafe fn set_progress_monitor(
        &self,
        wand: *mut c_void,
        monitor: MagickProgressMonitor,
        client_data: *mut c_void,
    );
}

/// Heap cell holding a [`ProgressMonitor`]; its address is the client data
/// handed to the image library.
///
/// Dropping the cell frees the monitor. Keep it alive until the job it was
/// installed on has finished.
#[derive(Debug)]
pub struct MonitorCell<P> {
    ptr: NonNull<ProgressMonitor<P>>,
}

// SAFETY: the cell owns its monitor exclusively; `P: MessagePort` is Send + Sync.
unsafe impl<P: MessagePort> Send for MonitorCell<P> {}
// SAFETY: `&MonitorCell<P>` only hands out `&ProgressMonitor<P>`, which is
// safe to share because `P: MessagePort` is Sync.
unsafe impl<P: MessagePort> Sync for MonitorCell<P> {}

impl<P> MonitorCell<P> {
    /// Layout of one cell. Never zero-sized, so every cell has its own
    /// address even when the port carries no data.
    fn layout() -> Layout {
        let layout = Layout::new::<ProgressMonitor<P>>();
        if layout.size() == 0 {
            Layout::from_size_align(1, layout.align()).unwrap_or(Layout::new::<u8>())
        } else {
            layout
        }
    }

    /// Moves `monitor` into a freshly allocated cell.
    ///
    /// Allocation failure is reported instead of aborting.
    pub fn try_new(monitor: ProgressMonitor<P>) -> Result<Self, BridgeError> {
        let layout = Self::layout();

        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc(layout) }.cast::<ProgressMonitor<P>>();
        let ptr = NonNull::new(raw).ok_or(BridgeError::Allocation(layout.size()))?;
        // SAFETY: freshly allocated, aligned for `ProgressMonitor<P>`, uninitialized.
        unsafe { ptr.as_ptr().write(monitor) };
        Ok(Self { ptr })
    }

    /// Client-data pointer for the C callback.
    pub fn as_client_data(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// The monitor inside the cell.
    pub fn monitor(&self) -> &ProgressMonitor<P> {
        // SAFETY: the cell owns an initialized monitor until dropped.
        unsafe { self.ptr.as_ref() }
    }

    /// Gives up ownership; the caller must hand the pointer back to
    /// [`MonitorCell::from_raw`] to free it.
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.as_client_data();
        std::mem::forget(self);
        raw
    }

    /// Re-owns a cell released with [`MonitorCell::into_raw`].
    ///
    /// # SAFETY
    /// `raw` must come from `into_raw` on a `MonitorCell<P>` of the same `P`
    /// and must not be reclaimed twice. No callback may run on it afterwards
    /// once the returned cell is dropped.
    pub unsafe fn from_raw(raw: *mut c_void) -> Option<Self> {
        NonNull::new(raw.cast::<ProgressMonitor<P>>()).map(|ptr| Self { ptr })
    }
}

impl<P> Drop for MonitorCell<P> {
    fn drop(&mut self) {
        // SAFETY: the cell holds an initialized monitor in memory obtained
        // from `alloc` with `Self::layout()`; both happen exactly once.
        unsafe {
            std::ptr::drop_in_place(self.ptr.as_ptr());
            dealloc(self.ptr.as_ptr().cast(), Self::layout());
        }
    }
}

/// Installs `monitor` as the progress monitor of `wand` through `hook`.
///
/// Every call allocates a new cell; installing twice on the same wand leaves
/// the library calling the latest cell while the earlier one stays valid
/// until dropped.
///
/// # SAFETY
/// `wand` must be null or a valid handle for `hook`'s library, and the
/// returned cell must outlive every progress callback of that wand.
pub unsafe fn install<P, H>(
    hook: &H,
    wand: *mut c_void,
    monitor: ProgressMonitor<P>,
) -> Result<MonitorCell<P>, BridgeError>
where
    P: MessagePort,
    H: ProgressHook + ?Sized,
{
    if wand.is_null() {
        return Err(BridgeError::NullWand);
    }

    let cell = MonitorCell::try_new(monitor)?;
    // SAFETY: forwarded contract; the cell matches the trampoline's `P`.
    unsafe { hook.set_progress_monitor(wand, progress_trampoline::<P>, cell.as_client_data()) };
    debug!(wand = ?wand, cell = ?cell.as_client_data(), "progress monitor installed");
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PostError;
    use crate::port::ChannelPort;
    use crossbeam_channel::unbounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing;

    impl MessagePort for Failing {
        fn post(&self, _message: &str) -> Result<(), PostError> {
            Err(PostError::Rejected(7))
        }
    }

    struct Panicking;

    impl MessagePort for Panicking {
        fn post(&self, _message: &str) -> Result<(), PostError> {
            panic!("port exploded");
        }
    }

    #[derive(Default)]
    struct RecordingHook {
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl ProgressHook for RecordingHook {
        unsafe fn set_progress_monitor(
            &self,
            wand: *mut c_void,
            _monitor: MagickProgressMonitor,
            client_data: *mut c_void,
        ) {
            self.calls
                .lock()
                .unwrap()
                .push((wand as usize, client_data as usize));
        }
    }

    #[test]
    fn keys_are_in_contract_order() {
        let json = ProgressEvent::new("Convert", -1, 1024).to_json().unwrap();
        assert_eq!(json, r#"{"info":"Convert","size":1024,"offset":-1}"#);
    }

    #[test]
    fn empty_event() {
        let json = ProgressEvent::new("", 0, 0).to_json().unwrap();
        assert_eq!(json, r#"{"info":"","size":0,"offset":0}"#);
    }

    #[test]
    fn max_size_keeps_full_magnitude() {
        let event = ProgressEvent::new("Load/Image", i64::MIN, u64::MAX);
        let json = event.to_pretty_json().unwrap();
        assert!(json.contains("18446744073709551615"));
        assert!(json.contains("-9223372036854775808"));

        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn pretty_json_parses_to_exactly_three_fields() {
        let json = ProgressEvent::new("Resize/Image", 12, 480).to_pretty_json().unwrap();
        assert!(json.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["info"], "Resize/Image");
        assert_eq!(object["size"], 480);
        assert_eq!(object["offset"], 12);
    }

    #[test]
    fn monitor_posts_and_continues() {
        let (tx, rx) = unbounded();
        let monitor = ProgressMonitor::new(ChannelPort::new(tx));
        assert!(monitor.on_progress("Blur/Image", 3, 10));

        let parsed: ProgressEvent = serde_json::from_str(&rx.recv().unwrap()).unwrap();
        assert_eq!(parsed, ProgressEvent::new("Blur/Image", 3, 10));
    }

    #[test]
    fn monitor_continues_when_post_fails() {
        let monitor = ProgressMonitor::new(Failing);
        assert!(monitor.on_progress("Save/Image", -5, u64::MAX));
    }

    #[test]
    fn trampoline_always_returns_true() {
        let (tx, rx) = unbounded();
        let cell = MonitorCell::try_new(ProgressMonitor::new(ChannelPort::new(tx))).unwrap();

        let status = unsafe {
            progress_trampoline::<ChannelPort>(c"Convert".as_ptr(), -1, 1024, cell.as_client_data())
        };
        assert_eq!(status, MAGICK_TRUE);

        let status = unsafe {
            progress_trampoline::<ChannelPort>(std::ptr::null(), 0, 0, cell.as_client_data())
        };
        assert_eq!(status, MAGICK_TRUE);

        let status = unsafe {
            progress_trampoline::<ChannelPort>(c"Orphan".as_ptr(), 1, 1, std::ptr::null_mut())
        };
        assert_eq!(status, MAGICK_TRUE);

        let received: Vec<ProgressEvent> = rx
            .try_iter()
            .map(|m| serde_json::from_str(&m).unwrap())
            .collect();
        assert_eq!(
            received,
            vec![ProgressEvent::new("Convert", -1, 1024), ProgressEvent::new("", 0, 0)]
        );
    }

    #[test]
    fn trampoline_swallows_panics() {
        let cell = MonitorCell::try_new(ProgressMonitor::new(Panicking)).unwrap();
        let status = unsafe {
            progress_trampoline::<Panicking>(c"Load".as_ptr(), 0, 1, cell.as_client_data())
        };
        assert_eq!(status, MAGICK_TRUE);
    }

    #[test]
    fn install_rejects_null_wand() {
        let hook = RecordingHook::default();
        let (tx, _rx) = unbounded();
        let result = unsafe {
            install(&hook, std::ptr::null_mut(), ProgressMonitor::new(ChannelPort::new(tx)))
        };
        assert!(matches!(result, Err(BridgeError::NullWand)));
        assert!(hook.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn installing_twice_allocates_distinct_cells() {
        let hook = RecordingHook::default();
        let mut job = 0u8;
        let wand = (&mut job as *mut u8).cast::<c_void>();
        let (tx, _rx) = unbounded();

        let first =
            unsafe { install(&hook, wand, ProgressMonitor::new(ChannelPort::new(tx.clone()))) }
                .unwrap();
        let second =
            unsafe { install(&hook, wand, ProgressMonitor::new(ChannelPort::new(tx))) }.unwrap();

        assert_ne!(first.as_client_data(), second.as_client_data());
        let calls = hook.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (wand as usize, first.as_client_data() as usize));
        assert_eq!(calls[1], (wand as usize, second.as_client_data() as usize));
    }

    #[test]
    fn zero_sized_ports_get_distinct_cells() {
        let hook = RecordingHook::default();
        let mut job = 0u8;
        let wand = (&mut job as *mut u8).cast::<c_void>();

        let first = unsafe { install(&hook, wand, ProgressMonitor::new(Failing)) }.unwrap();
        let second = unsafe { install(&hook, wand, ProgressMonitor::new(Failing)) }.unwrap();

        assert_ne!(first.as_client_data(), second.as_client_data());
        let calls = hook.calls.lock().unwrap();
        assert_eq!(calls[0].1, first.as_client_data() as usize);
        assert_eq!(calls[1].1, second.as_client_data() as usize);
    }

    #[test]
    fn zero_sized_monitor_is_dropped_once() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;

        impl MessagePort for Counted {
            fn post(&self, _message: &str) -> Result<(), PostError> {
                Ok(())
            }
        }

        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let cell = MonitorCell::try_new(ProgressMonitor::new(Counted)).unwrap();
        assert_eq!(DROPS.load(Ordering::SeqCst), 0);
        assert!(cell.monitor().on_progress("Load", 0, 1));
        drop(cell);
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);

        let raw = MonitorCell::try_new(ProgressMonitor::new(Counted)).unwrap().into_raw();
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        drop(unsafe { MonitorCell::<Counted>::from_raw(raw) });
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn raw_round_trip_keeps_the_monitor() {
        let (tx, rx) = unbounded();
        let raw = MonitorCell::try_new(ProgressMonitor::new(ChannelPort::new(tx)))
            .unwrap()
            .into_raw();

        let cell = unsafe { MonitorCell::<ChannelPort>::from_raw(raw) }.unwrap();
        assert!(cell.monitor().on_progress("Write", 1, 2));
        assert!(rx.recv().is_ok());
        assert!(unsafe { MonitorCell::<ChannelPort>::from_raw(std::ptr::null_mut()) }.is_none());
    }
}
