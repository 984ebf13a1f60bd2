use std::ffi::{CStr, c_void};
use std::io::Write;
use std::sync::Mutex;

use crossbeam_channel::bounded;
use magick_bridge::ProgressMonitor;
use magick_bridge::abi::{MAGICK_TRUE, MagickProgressMonitor};
use magick_bridge::exports::init_host_api;
use magick_bridge::host_api::HostPort;
use magick_bridge::progress::{self, ProgressHook};
use magick_bridge::ProgressEvent;
use magick_progress::error::AppError;
use magick_progress::host::HostRuntime;
use magick_progress::params::{Filter, JobParams};
use magick_progress::report;

#[derive(Default)]
struct ScriptedWand {
    registered: Mutex<Option<(MagickProgressMonitor, usize)>>,
}

impl ScriptedWand {
    fn run(&self, ticks: &[(&CStr, i64, u64)]) {
        let (monitor, client_data) = self.registered.lock().unwrap().expect("no monitor");
        for (text, offset, size) in ticks {
            let status = unsafe { monitor(text.as_ptr(), *offset, *size, client_data as *mut c_void) };
            assert_eq!(status, MAGICK_TRUE);
        }
    }
}

impl ProgressHook for ScriptedWand {
    unsafe fn set_progress_monitor(
        &self,
        _wand: *mut c_void,
        monitor: MagickProgressMonitor,
        client_data: *mut c_void,
    ) {
        *self.registered.lock().unwrap() = Some((monitor, client_data as usize));
    }
}

#[test]
fn progress_from_a_worker_thread_reaches_the_host() {
    let host = HostRuntime::start();
    assert_eq!(unsafe { init_host_api(host.api_data()) }, 0);

    let wand = ScriptedWand::default();
    let mut job = 0u64;
    let handle = (&mut job as *mut u64).cast::<c_void>();
    let cell = unsafe { progress::install(&wand, handle, ProgressMonitor::new(HostPort::new(5))) }
        .unwrap();

    let (done_tx, done_rx) = bounded(1);
    let mut seen = Vec::new();

    let result = std::thread::scope(|scope| {
        let wand = &wand;
        scope.spawn(move || {
            wand.run(&[
                (c"Load/Image", 0, 2),
                (c"Load/Image", 1, 2),
                (c"Resize/Image", -1, u64::MAX),
            ]);
            let _ = done_tx.send(Ok::<_, AppError>(()));
        });
        report::pump(host.messages(), &done_rx, 5, |event| seen.push(event))
    });

    assert!(result.is_ok());
    assert_eq!(
        seen,
        vec![
            ProgressEvent::new("Load/Image", 0, 2),
            ProgressEvent::new("Load/Image", 1, 2),
            ProgressEvent::new("Resize/Image", -1, u64::MAX),
        ]
    );
    drop(cell);
}

#[test]
fn params_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "quality = 70\n[resize]\nwidth = 32\nheight = 16\nfilter = \"catrom\"").unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let params = JobParams::parse(&text).unwrap();

    assert_eq!(params.quality, Some(70));
    let resize = params.resize.unwrap();
    assert_eq!((resize.width, resize.height), (32, 16));
    assert_eq!(resize.filter, Filter::Catrom);
    assert_eq!(resize.filter.as_raw(), 11);
    assert!(params.blur.is_none());
}
