use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use evrelay::config::{DEFAULT_SOURCE_ID, DEFAULT_UINPUT_PATH, parse_code};
use evrelay::{
    CancelToken, CapabilityKind, EventFilter, HangupWatch, RecoveryPolicy, Relay, RelayConfig,
    RelayOutcome, SourceDevice, UsbId, VirtualDevice, VirtualDeviceDescriptor,
    cancel_on_interrupt, find_by_usb_id, mirror,
};

/// Descriptor a parent process may hand over as the source device.
const SOURCE_FD: i32 = 3;
/// Descriptor a parent process may hand over as the uinput control node.
const UINPUT_FD: i32 = 4;

/// Mirror an input device under a different USB vendor/product id.
///
/// Creates a virtual device through uinput with the source's capabilities
/// and relays its events until interrupted. With no source given, an
/// already-open descriptor 3 (and optionally 4 for uinput) is used.
#[derive(Parser, Debug)]
#[command(name = "evrelay", version, about)]
struct Cli {
    /// Source event device, e.g. /dev/input/event16.
    source: Option<PathBuf>,

    /// uinput control node [default: /dev/uinput].
    uinput: Option<PathBuf>,

    /// Source event device (alternative to the positional argument).
    #[arg(long, short, conflicts_with = "source")]
    device: Option<PathBuf>,

    /// Find the source by USB id (28de:11fc unless --usbid is given).
    #[arg(long, short)]
    auto: bool,

    /// USB id to search for, VVVV:PPPP in hex. Implies --auto.
    #[arg(long, value_name = "VVVV:PPPP")]
    usbid: Option<UsbId>,

    /// Path to configuration file (TOML).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Halt when the source disappears instead of waiting for it to return.
    #[arg(long)]
    no_recover: bool,

    /// Drop this button code instead of relaying it (BTN_MODE if no code
    /// is given; pass a code as --filter-code=CODE).
    #[arg(
        long,
        value_name = "CODE",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "0x13c",
        value_parser = parse_code
    )]
    filter_code: Option<u16>,

    /// Take exclusive access to the source device.
    #[arg(long)]
    grab: bool,

    /// Halt when standard input is closed (default when the source is
    /// inherited descriptor 3).
    #[arg(long, overrides_with = "no_watch_stdin")]
    watch_stdin: bool,

    /// Keep running when standard input is closed.
    #[arg(long, overrides_with = "watch_stdin")]
    no_watch_stdin: bool,

    /// Name of the virtual device.
    #[arg(long)]
    name: Option<String>,

    /// USB vendor id of the virtual device.
    #[arg(long, value_parser = parse_code)]
    vendor: Option<u16>,

    /// USB product id of the virtual device.
    #[arg(long, value_parser = parse_code)]
    product: Option<u16>,

    /// Only log warnings and errors.
    #[arg(long, short, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug details.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(outcome) => {
            let stats = outcome.stats;
            log::info!(
                "relay stopped: {} ({} relayed, {} filtered, {} dropped, {} reconnects)",
                outcome.reason,
                stats.relayed,
                stats.filtered,
                stats.dropped,
                stats.reconnects
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load config from file and apply CLI overrides.
fn load_and_merge_config(cli: &Cli) -> Result<RelayConfig> {
    let mut cfg = match &cli.config {
        Some(path) => RelayConfig::load(path)?,
        None => RelayConfig::default(),
    };

    if let Some(device) = cli.device.as_ref().or(cli.source.as_ref()) {
        cfg.device = Some(device.clone());
        cfg.scan = None;
    } else if cli.auto || cli.usbid.is_some() {
        cfg.device = None;
        cfg.scan = Some(cli.usbid.unwrap_or(DEFAULT_SOURCE_ID));
    }
    if let Some(uinput) = &cli.uinput {
        cfg.uinput = Some(uinput.clone());
    }
    if cli.no_recover {
        cfg.recovery = RecoveryPolicy::Disabled;
    }
    if let Some(code) = cli.filter_code {
        cfg.filter_code = Some(code);
    }
    cfg.grab |= cli.grab;
    if cli.watch_stdin {
        cfg.watch_stdin = Some(true);
    } else if cli.no_watch_stdin {
        cfg.watch_stdin = Some(false);
    }
    if let Some(name) = &cli.name {
        cfg.name = name.clone();
    }
    if let Some(vendor) = cli.vendor {
        cfg.identity.vendor = vendor;
    }
    if let Some(product) = cli.product {
        cfg.identity.product = product;
    }

    Ok(cfg)
}

/// Source from an explicit path, discovery, or inherited descriptor 3.
fn open_source(cfg: &RelayConfig) -> Result<SourceDevice> {
    let path = match (&cfg.device, cfg.scan) {
        (Some(path), _) => path.clone(),
        (None, Some(id)) => find_by_usb_id(id).context("source discovery failed")?,
        (None, None) => {
            // SAFETY: nothing else in this process claims descriptor 3.
            return unsafe { SourceDevice::from_inherited(SOURCE_FD) }
                .context("no source device given");
        }
    };
    Ok(SourceDevice::open(path)?)
}

/// uinput node from an explicit path, inherited descriptor 4 (only when
/// the source was inherited too), or the default path.
fn open_uinput(cfg: &RelayConfig, source_inherited: bool) -> Result<VirtualDevice> {
    if let Some(path) = &cfg.uinput {
        return Ok(VirtualDevice::open(path)?);
    }
    if source_inherited {
        // SAFETY: nothing else in this process claims descriptor 4.
        match unsafe { VirtualDevice::from_inherited(UINPUT_FD) } {
            Ok(device) => return Ok(device),
            Err(e) => log::debug!("{e}, falling back to {DEFAULT_UINPUT_PATH}"),
        }
    }
    Ok(VirtualDevice::open(DEFAULT_UINPUT_PATH)?)
}

fn grab_source(source: &SourceDevice) {
    if let Err(e) = source.grab() {
        log::warn!("cannot grab source device: {e}");
    }
}

fn run(cli: &Cli) -> Result<RelayOutcome> {
    let cfg = load_and_merge_config(cli)?;

    let source = open_source(&cfg)?;
    match source.path() {
        Some(path) => println!("relay: {}", path.display()),
        None => println!("relay: descriptor {SOURCE_FD}"),
    }
    match source.usb_id() {
        Ok(id) => log::info!("source \"{}\" ({id})", source.name().unwrap_or_default()),
        Err(e) => log::debug!("cannot read source id: {e}"),
    }
    if cfg.grab {
        grab_source(&source);
    }

    let mut device = open_uinput(&cfg, source.path().is_none())?;
    let mut descriptor = VirtualDeviceDescriptor::new(&cfg.name, cfg.identity);
    let caps = mirror(&source, &mut device, &mut descriptor)
        .context("mirroring source capabilities")?;
    log::debug!(
        "mirrored {} event types, {} axes, {} keys",
        caps.count(CapabilityKind::EventType),
        caps.count(CapabilityKind::Axis),
        caps.count(CapabilityKind::Key)
    );
    device
        .activate(&descriptor)
        .context("activating virtual device")?;

    let cancel = CancelToken::new();
    cancel_on_interrupt(&cancel)?;

    let source_path = source.path().map(Path::to_path_buf);
    let source_inherited = source_path.is_none();
    let mut relay = Relay::new(source, device, cancel)
        .with_filter(EventFilter::from(cfg.filter_code))
        .with_policy(cfg.recovery);
    if let Some(path) = source_path {
        let grab = cfg.grab;
        relay = relay.with_reopen(path, move |path: &Path| {
            let source = SourceDevice::reopen(path)?;
            if grab {
                grab_source(&source);
            }
            Ok(source)
        });
    }
    if cfg.watches_stdin(source_inherited) {
        match HangupWatch::stdin() {
            Ok(watch) => relay = relay.with_hangup_watch(watch),
            Err(e) => log::warn!("cannot watch standard input: {e}"),
        }
    }

    let outcome = relay.run();

    let mut device = relay.into_sink();
    if let Err(e) = device.deactivate() {
        log::warn!("{e}");
    }
    println!("Done.");
    Ok(outcome)
}
