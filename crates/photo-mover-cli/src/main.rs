use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use photo_mover_core::media::format_size;
use photo_mover_core::{
    scan_device, BatchEvent, BatchOrchestrator, CancellationToken, DateResolver, DuplicateMode,
    LocalFilesystem, MediaMetadataExtractor, MonitorSettings, MountedDevice, SortConfiguration,
    SortMode, TransferOutcome, CONFIG_FILENAME, DEFAULT_MAX_DEPTH,
};

#[derive(Parser)]
#[command(
    name = "photo-mover",
    version,
    about = "Copy photos and videos off a phone into date folders"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List media on a device with the date each item would be filed under
    Scan {
        /// Folder the device storage is mounted at
        device: PathBuf,

        /// Folder levels below the device root to descend
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        depth: usize,
    },
    /// Copy media off a device into date folders
    Import {
        /// Folder the device storage is mounted at
        device: PathBuf,

        /// Only import these filenames (default: everything found)
        #[arg(long = "only", value_name = "FILENAME")]
        only: Vec<String>,

        /// Folder level granularity
        #[arg(long)]
        sort_mode: Option<SortModeArg>,

        /// What to do when a file with the same name is already there
        #[arg(long)]
        duplicate_mode: Option<DuplicateModeArg>,

        /// Root of the dated folders
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Folder for items without a date
        #[arg(long)]
        unknown: Option<PathBuf>,

        /// Seconds to wait for one file to finish copying
        #[arg(long, default_value_t = 120)]
        timeout: u64,

        /// Folder levels below the device root to descend
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        depth: usize,

        /// Write the effective settings back to the configuration file
        #[arg(long)]
        save_config: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortModeArg {
    MonthYear,
    DateMonthYear,
}

impl From<SortModeArg> for SortMode {
    fn from(arg: SortModeArg) -> Self {
        match arg {
            SortModeArg::MonthYear => SortMode::MonthYear,
            SortModeArg::DateMonthYear => SortMode::DateMonthYear,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DuplicateModeArg {
    Overwrite,
    KeepBoth,
    Skip,
}

impl From<DuplicateModeArg> for DuplicateMode {
    fn from(arg: DuplicateModeArg) -> Self {
        match arg {
            DuplicateModeArg::Overwrite => DuplicateMode::Overwrite,
            DuplicateModeArg::KeepBoth => DuplicateMode::KeepBoth,
            DuplicateModeArg::Skip => DuplicateMode::Skip,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SortConfiguration::load(&cli.config);
    match cli.command {
        Command::Config => {
            println!("{}", config.to_pretty_json().context("failed to render configuration")?);
            Ok(())
        }
        Command::Scan { device, depth } => scan(device, depth),
        Command::Import {
            device,
            only,
            sort_mode,
            duplicate_mode,
            output,
            unknown,
            timeout,
            depth,
            save_config,
        } => {
            let mut config = config;
            if let Some(mode) = sort_mode {
                config.sort_mode = mode.into();
            }
            if let Some(mode) = duplicate_mode {
                config.duplicate_mode = mode.into();
            }
            if let Some(path) = output {
                config.output_base_path = path;
            }
            if let Some(path) = unknown {
                config.unknown_folder_path = path;
            }
            config.validate()?;
            if save_config {
                config.save(&cli.config)?;
                info!(path = %cli.config.display(), "configuration saved");
            }

            let settings = MonitorSettings {
                timeout: Duration::from_secs(timeout),
                ..MonitorSettings::default()
            };
            import(device, only, depth, config, settings)
        }
    }
}

fn scan(mount: PathBuf, depth: usize) -> anyhow::Result<()> {
    let device = MountedDevice::new(mount);
    let resolver = DateResolver::new(Arc::new(MediaMetadataExtractor));
    let result = scan_device(&device, &resolver, depth)?;

    for item in &result.items {
        let size = item.size_hint.map(format_size).unwrap_or_else(|| "Unknown".to_string());
        let (date, source) = match item.inferred_date {
            Some(d) => (d.date.to_string(), format!("{:?}", d.source)),
            None => ("Unknown".to_string(), String::new()),
        };
        println!(
            "{:<40} {:>6} {:>10}  {:<10} {}",
            item.filename, item.extension, size, date, source
        );
    }
    eprintln!("{} media files found", result.items.len());
    for failure in &result.failures {
        warn!("{}", failure);
    }
    Ok(())
}

fn import(
    mount: PathBuf,
    only: Vec<String>,
    depth: usize,
    config: SortConfiguration,
    settings: MonitorSettings,
) -> anyhow::Result<()> {
    let device = MountedDevice::new(mount);
    let extractor = Arc::new(MediaMetadataExtractor);
    let resolver = DateResolver::new(extractor.clone());

    eprintln!("Scanning: {}", device.mount_point().display());
    let mut items = scan_device(&device, &resolver, depth)?.items;
    if !only.is_empty() {
        for item in &mut items {
            item.selected = only.contains(&item.filename);
        }
    }
    let selected = items.iter().filter(|item| item.selected).count();
    if selected == 0 {
        eprintln!("No media files selected. Nothing to do.");
        return Ok(());
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling after the current file...");
        handler_token.cancel();
    })
    .context("failed to install Ctrl-C handler")?;

    let pb = ProgressBar::new(selected as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {msg}")
            .context("invalid progress template")?,
    );

    let t_total = std::time::Instant::now();
    let summary = std::thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let sink = |event: &BatchEvent<'_>| match event {
                BatchEvent::ItemStarted { filename, .. } => pb.set_message(filename.to_string()),
                BatchEvent::StillCopying { filename, waited } => {
                    pb.set_message(format!("{} (still copying, {}s)", filename, waited.as_secs()))
                }
                BatchEvent::ItemFinished { filename, outcome, .. } => {
                    if let TransferOutcome::Failed { detail } = outcome {
                        pb.println(format!("error: {}: {}", filename, detail));
                    }
                    pb.inc(1);
                }
                BatchEvent::Finished { .. } => pb.finish_and_clear(),
                _ => {}
            };
            BatchOrchestrator::new(&device, &LocalFilesystem, extractor, &sink)
                .with_monitor(settings)
                .with_cancel_token(token.clone())
                .run(items, config)
        });
        worker.join()
    })
    .map_err(|_| anyhow::anyhow!("batch worker panicked"))?;

    println!("{}", summary);
    eprintln!("Done in {:.2}s", t_total.elapsed().as_secs_f64());

    if summary.cancelled {
        anyhow::bail!("import cancelled");
    }
    Ok(())
}
