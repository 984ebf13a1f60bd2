use clap::Parser;
use crossbeam_channel::bounded;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use magick_progress::bridge_loader::{Bridge, lib_filename};
use magick_progress::error::AppError;
use magick_progress::host::HostRuntime;
use magick_progress::params::JobParams;
use magick_progress::report;
use magick_progress::wand_job::WandApi;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "magick_progress")]
struct Args {
    /// path to input image
    #[arg(long)]
    input: String,

    /// path to output image (format follows the extension)
    #[arg(long)]
    output: String,

    /// path to a TOML file describing resize/blur/quality steps
    #[arg(long)]
    params: Option<String>,

    /// MagickWand library (e.g. /usr/lib/x86_64-linux-gnu/libMagickWand-7.Q16HDRI.so)
    #[arg(long)]
    wand_lib: String,

    /// directory with the bridge library (default target/debug)
    #[arg(long, default_value = "target/debug")]
    bridge_path: String,

    /// host port progress messages are posted to
    #[arg(long, default_value_t = 1)]
    port: i64,
}

fn main() -> Result<(), AppError> {
    init_tracing();

    let args = Args::parse();

    if !Path::new(&args.input).exists() {
        return Err(AppError::MissingInput(args.input));
    }
    let params = match &args.params {
        Some(path) if !Path::new(path).exists() => {
            return Err(AppError::MissingParams(path.clone()));
        }
        Some(path) => JobParams::parse(&std::fs::read_to_string(path)?)?,
        None => JobParams::default(),
    };

    let mut bridge_path = PathBuf::from(&args.bridge_path);
    bridge_path.push(lib_filename("magick_bridge"));

    if !bridge_path.exists() {
        return Err(AppError::MissingBridge(bridge_path.display().to_string()));
    }

    // SAFETY:
    // - We only load from a path we constructed and checked exists.
    // - If the library does not export the bridge symbols with the declared
    //   signatures, calling through them would be Undefined Behavior.
    let bridge = unsafe { Bridge::load(&bridge_path)? };
    bridge.init_logging();

    let wand_lib_c = CString::new(args.wand_lib.clone())
        .map_err(|_| AppError::InvalidPathNul(args.wand_lib.clone()))?;
    if bridge.use_wand_library(&wand_lib_c) != 0 {
        return Err(AppError::BridgeWand(args.wand_lib));
    }

    let host = HostRuntime::start();
    // SAFETY: the table lives in `host`, which outlives every post below.
    let status = unsafe { bridge.init_host_api(host.api_data()) };
    if status != 0 {
        return Err(AppError::HostInit(status));
    }

    // SAFETY: the user names an ImageMagick 7 MagickWand library; the bridge
    // was pointed at the same file, so both share one library instance.
    let wand_api = unsafe { WandApi::load(Path::new(&args.wand_lib))? };

    tracing::info!(
        input_file = args.input,
        bridge = bridge_path.display().to_string(),
        port = args.port,
        "image processing.."
    );

    let (done_tx, done_rx) = bounded(1);
    let (width, height) = std::thread::scope(|scope| {
        let (bridge, wand_api, params, args) = (&bridge, &wand_api, &params, &args);
        scope.spawn(move || {
            let result = run_job(bridge, wand_api, args, params);
            let _ = done_tx.send(result);
        });

        report::pump(host.messages(), &done_rx, args.port, |event| {
            match event.to_json() {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "cannot print progress event"),
            }
        })
    })?;

    tracing::info!(output_file = args.output, width, height, "output file saved");

    Ok(())
}

fn run_job(
    bridge: &Bridge,
    wand_api: &WandApi,
    args: &Args,
    params: &JobParams,
) -> Result<(usize, usize), AppError> {
    let wand = wand_api.new_wand();

    // SAFETY: `wand` is a live MagickWand from the library the bridge uses.
    let cell = unsafe { bridge.set_monitor_port(wand.as_ptr(), args.port) };
    if cell.is_null() {
        return Err(AppError::MonitorInstall);
    }

    let result = wand.run(Path::new(&args.input), Path::new(&args.output), params);

    // The wand reports progress until it is destroyed; release the cell after.
    drop(wand);
    // SAFETY: `cell` came from `set_monitor_port` and its wand is gone.
    unsafe { bridge.release_monitor_port(cell) };

    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
