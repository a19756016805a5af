// src/main.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser};
use eframe::egui;
use log::info;

use spikeraster::config::RasterConfig;
use spikeraster::drivers::{Endpoint, DEFAULT_SERIAL_BAUD};
use spikeraster::engine::SpikeEngine;
use spikeraster::gui::RasterApp;
use spikeraster::network::{load_neuron_aliases, parse_selection};
use spikeraster::types::{ChannelId, IntWidth, WireFormat};

/// Live spike-raster viewer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("network").required(true).args(["filename", "neuron_count"])))]
struct Args {
    /// JSON network file whose node ids name the channels
    #[arg(short, long)]
    filename: Option<PathBuf>,

    /// Number of channels, named 0..N-1
    #[arg(short, long)]
    neuron_count: Option<u32>,

    /// Server address; without it, --port names a serial device
    #[arg(short, long)]
    address: Option<String>,

    /// TCP port number or serial device path
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long, default_value_t = DEFAULT_SERIAL_BAUD)]
    baud: u32,

    /// Channel ids to plot, comma-separated, or "all"
    #[arg(short, long, default_value = "all")]
    ids: String,

    /// Show each channel's count as a legend
    #[arg(short, long)]
    display_counts: bool,

    /// Show legend counts as ln(count + 1)
    #[arg(short, long)]
    logarithmic: bool,

    /// Time span of the window in milliseconds
    #[arg(short, long)]
    window_ms: Option<u32>,

    /// Frames name the single channel that fired
    #[arg(long)]
    one_hot: bool,

    /// Bytes per integer on the wire (1, 2 or 4)
    #[arg(long)]
    int_width: Option<usize>,

    /// Use a synthetic source instead of a server or serial port
    #[arg(long)]
    simulate: bool,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a PNG of the last raster on exit
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Window title
    #[arg(short, long)]
    title: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,
}

fn build_config(args: &Args) -> Result<RasterConfig> {
    let mut config = match &args.config {
        Some(path) => RasterConfig::from_json_file(path)?,
        None => RasterConfig::default(),
    };
    if let Some(ms) = args.window_ms {
        config.window_span_ms = ms;
    }
    if let Some(bytes) = args.int_width {
        config.int_width = IntWidth::from_bytes(bytes)
            .ok_or_else(|| anyhow!("integer width must be 1, 2 or 4 bytes, got {bytes}"))?;
    }
    if args.one_hot {
        config.wire_format = WireFormat::OneHot;
    }
    if args.display_counts {
        config.show_legend = true;
    }
    if args.logarithmic {
        config.logarithmic = true;
    }
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    Ok(config)
}

/// Bluetooth MAC, e.g. "00:1A:7D:DA:71:13".
fn looks_like_mac(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

fn build_endpoint(args: &Args) -> Result<Endpoint> {
    if args.simulate {
        return Ok(Endpoint::Simulated {
            sample_period: Duration::from_millis(100),
            max_rate: 60,
        });
    }
    let port = args
        .port
        .as_deref()
        .ok_or_else(|| anyhow!("--port is required unless --simulate is given"))?;
    match &args.address {
        Some(address) if looks_like_mac(address) => {
            bail!("Bluetooth address {address} given, but RFCOMM sources are not supported")
        }
        Some(address) => Ok(Endpoint::Tcp {
            host: address.clone(),
            port: port
                .parse()
                .with_context(|| format!("bad TCP port {port:?}"))?,
        }),
        None => Ok(Endpoint::Serial {
            path: port.to_owned(),
            baud: args.baud,
        }),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if args.verbose {
        "debug"
    } else {
        "info"
    }))
    .init();

    let aliases: Vec<ChannelId> = match (&args.filename, args.neuron_count) {
        (Some(path), _) => load_neuron_aliases(path)?,
        (None, Some(count)) => (0..count).collect(),
        (None, None) => bail!("either --filename or --neuron-count is required"),
    };
    let selection = parse_selection(&args.ids, &aliases)?;
    let config = build_config(&args)?;
    let endpoint = build_endpoint(&args)?;

    // 通道校验失败直接退出, 不连接数据源
    let mut engine = SpikeEngine::configure(&aliases, &selection, config)?;
    info!("Source: {}", endpoint.describe());
    engine.start_endpoint(endpoint)?;

    let title = engine.config().title.clone();
    let rows = selection.len().clamp(1, 8) as f32;
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([900.0, 120.0 + rows * 100.0])
        .with_title(title.as_str());
    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };
    let snapshot = args.snapshot.clone();
    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Box::new(RasterApp::new(engine, snapshot))),
    )
    .map_err(|e| anyhow!("display failed: {e}"))
}
