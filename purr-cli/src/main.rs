//! Purr CLI Tool
//!
//! Command-line interface for inspecting, extracting and playing animated GIFs.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use purr_assets::{AssetRegistry, AssetState, AutoTransport, HttpConfig, RegistryConfig, Transport};
use purr_core::Container;
use purr_decoder::DecoderConfig;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "purr")]
#[command(about = "purr - Decode and play animated GIFs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Options {
    /// HTTP request timeout in seconds
    #[arg(long, global = true, default_value = "10")]
    timeout_secs: u64,

    /// Largest accepted HTTP response body in bytes
    #[arg(long, global = true, default_value = "33554432")]
    max_bytes: u64,

    /// Declared delays below this many milliseconds use the default delay
    #[arg(long, global = true, default_value = "20")]
    min_delay_ms: u64,

    /// Delay in milliseconds used for frames that declare a too short one
    #[arg(long, global = true, default_value = "100")]
    default_delay_ms: u64,

    /// Fill the canvas with the background color instead of transparency
    #[arg(long, global = true)]
    opaque_background: bool,
}

impl Options {
    fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_body_bytes: self.max_bytes,
        }
    }

    fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            min_delay: Duration::from_millis(self.min_delay_ms),
            default_delay: Duration::from_millis(self.default_delay_ms),
            opaque_background: self.opaque_background,
            ..DecoderConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show container and per-frame information
    Info {
        /// File path or http(s) URL
        source: String,

        /// Print the parsed container as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode every frame and write it as a PNG file
    Extract {
        /// File path or http(s) URL
        source: String,

        /// Output directory for frames
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Load through the asset registry and report frame changes over time
    Play {
        /// File path or http(s) URL
        source: String,

        /// How long to play, in milliseconds
        #[arg(long, default_value = "3000")]
        duration_ms: u64,

        /// Render tick interval in milliseconds
        #[arg(long, default_value = "10")]
        tick_ms: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { source, json } => show_info(&source, json, &cli.options)?,
        Commands::Extract { source, output } => extract_frames(&source, output, &cli.options)?,
        Commands::Play {
            source,
            duration_ms,
            tick_ms,
        } => play(&source, duration_ms, tick_ms, &cli.options)?,
    }

    Ok(())
}

fn fetch(source: &str, options: &Options) -> Result<Vec<u8>> {
    let transport = AutoTransport::new(options.http_config());
    let bytes = transport
        .fetch(source)
        .with_context(|| format!("Failed to fetch {}", source))?;
    debug!("Fetched {} bytes", bytes.len());
    Ok(bytes)
}

fn show_info(source: &str, json: bool, options: &Options) -> Result<()> {
    let bytes = fetch(source, options)?;
    let container = Container::parse(&bytes).context("Failed to parse GIF container")?;

    if json {
        let text =
            serde_json::to_string_pretty(&container).context("Failed to serialize container")?;
        println!("{}", text);
        return Ok(());
    }

    let config = options.decoder_config();
    let header = &container.header;

    println!("=== GIF Information ===");
    println!("Source: {}", source);
    println!("Version: {:?}", header.version);
    println!("Canvas: {}x{}", header.width, header.height);
    match &header.global_palette {
        Some(palette) => println!("Global palette: {} colors", palette.len()),
        None => println!("Global palette: none"),
    }
    println!("Background index: {}", header.background_index);
    println!("Pixel aspect: {}", header.pixel_aspect);
    match header.loop_count {
        Some(0) => println!("Loop count: forever"),
        Some(count) => println!("Loop count: {}", count),
        None => println!("Loop count: not set"),
    }
    println!("Frames: {}", container.frames.len());
    println!("Declared duration: {} ms", container.declared_duration_ms());

    println!("\n=== Frames ===");
    for frame in &container.frames {
        let region = frame.region;
        let mut line = format!(
            "  [{}] {}x{} at ({}, {}), delay {} ms (plays {} ms), disposal {:?}",
            frame.index,
            region.width,
            region.height,
            region.left,
            region.top,
            frame.delay_ms,
            config.effective_delay(frame.delay_ms).as_millis(),
            frame.disposal
        );
        if frame.interlaced {
            line.push_str(", interlaced");
        }
        if let Some(index) = frame.transparent_index {
            line.push_str(&format!(", transparent index {}", index));
        }
        if let Some(palette) = &frame.local_palette {
            line.push_str(&format!(", local palette {} colors", palette.len()));
        }
        println!("{}", line);
    }

    Ok(())
}

fn extract_frames(source: &str, output: PathBuf, options: &Options) -> Result<()> {
    println!("Decoding: {}", source);

    let bytes = fetch(source, options)?;
    let animation =
        purr_decoder::decode(&bytes, &options.decoder_config()).context("Failed to decode GIF")?;

    std::fs::create_dir_all(&output).context("Failed to create output directory")?;
    println!(
        "Extracting {} frames of {}x{} to {}",
        animation.frame_count(),
        animation.width(),
        animation.height(),
        output.display()
    );

    for (i, frame) in animation.frames().iter().enumerate() {
        let frame_path = output.join(format!("frame_{:06}.png", i));
        frame
            .image()
            .save(&frame_path)
            .with_context(|| format!("Failed to save {}", frame_path.display()))?;

        if (i + 1) % 10 == 0 {
            println!("Extracted {} / {} frames", i + 1, animation.frame_count());
        }
    }

    println!(
        "Successfully extracted all frames ({} ms per loop)",
        animation.total_duration().as_millis()
    );

    Ok(())
}

fn play(source: &str, duration_ms: u64, tick_ms: u64, options: &Options) -> Result<()> {
    let config = RegistryConfig {
        decoder: options.decoder_config(),
    };
    let registry = AssetRegistry::with_config(AutoTransport::new(options.http_config()), config);
    registry.request_load(source, source);

    let start = Instant::now();
    let end = start + Duration::from_millis(duration_ms);
    let tick = Duration::from_millis(tick_ms.max(1));
    let mut shown: Option<usize> = None;
    let mut changes = 0usize;

    while Instant::now() < end {
        let now = Instant::now();
        match registry.state(source) {
            AssetState::Failed => {
                if let Some(err) = registry.failure(source) {
                    let err = anyhow::Error::new(err);
                    return Err(err.context(format!("Failed to load {}", source)));
                }
            }
            AssetState::Loaded => {
                registry.advance(source, now);
                if let Some(frame) = registry.current_frame(source) {
                    if shown.is_none() {
                        println!(
                            "Loaded {}x{}, {} frames after {} ms",
                            frame.width(),
                            frame.height(),
                            frame.animation().frame_count(),
                            now.duration_since(start).as_millis()
                        );
                    }
                    if shown != Some(frame.index()) {
                        println!(
                            "  {:>6} ms  frame {} ({} ms)",
                            now.duration_since(start).as_millis(),
                            frame.index(),
                            frame.delay().as_millis()
                        );
                        shown = Some(frame.index());
                        changes += 1;
                    }
                }
            }
            AssetState::Absent | AssetState::Loading => {}
        }
        thread::sleep(tick);
    }

    match shown {
        Some(_) => println!("Displayed {} frames in {} ms", changes, duration_ms),
        None => println!("{} did not finish loading within {} ms", source, duration_ms),
    }

    Ok(())
}
