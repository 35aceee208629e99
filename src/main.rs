use clap::{Parser, Subcommand};
use soilmask_ratio::process::{self, ProcessError, ProcessOptions};
use soilmask_ratio::types::{ResultRecord, TransformerInfo};
use soilmask_ratio::{config, output, scan};
use std::path::PathBuf;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "soilmask")]
#[command(about = "Soil masks images through green:red ratio comparison")]
#[command(long_about = "\
Soil masks images through green:red ratio comparison

Every pixel whose green/red ratio reaches the threshold is kept as plant;
all other pixels have their colour bands set to 0. Georeferencing is
carried over to the output.

  soilmask mask field.tif                    # → ./field_mask.tif
  soilmask mask orthos/ --ratio 1.1          # every .tif/.png under orthos/
  soilmask mask field.tif --out-file m.tif   # → ./m.tif

A result.json describing the outputs is written to the working folder.

Run 'soilmask gen-config' to generate a documented soilmask.toml.")]
#[command(version)]
struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct MaskArgs {
    /// Raster files or directories to mask
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Minimum green/red ratio for a plant pixel (e.g. 0.75 or 1.2)
    #[arg(long)]
    ratio: Option<f64>,

    /// Output file; a bare name is placed in the working folder
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Folder for outputs and result.json
    #[arg(long, default_value = ".")]
    working_folder: PathBuf,

    /// Config file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the binary mask as <stem>_mask_bin.png
    #[arg(long)]
    write_mask: bool,

    /// Write uncompressed TIFF output
    #[arg(long)]
    no_compress: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Mask soil out of one or more rasters
    Mask(MaskArgs),
    /// List the inputs a mask run would process, without masking
    Check {
        /// Raster files or directories
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a stock soilmask.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Mask(args) => {
            let working_folder = args.working_folder.clone();
            let record = match run_mask(args) {
                Ok(record) => record,
                Err(e) => {
                    error!(error = %e, "Masking failed");
                    ResultRecord::failure(e.result_code(), e.to_string())
                }
            };
            let path = process::write_result_record(&record, &working_folder)?;
            println!("{}", serde_json::to_string(&record)?);
            info!(path = %path.display(), code = record.code, "Wrote result record");
            if let Some(message) = record.error {
                return Err(message.into());
            }
        }
        Command::Check { files } => {
            scan::check_continue(&files)?;
            let result = scan::scan(&files)?;
            output::print_scan_output(&result);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_mask(args: MaskArgs) -> Result<ResultRecord, ProcessError> {
    scan::check_continue(&args.files)?;

    let mut settings = config::load_config(args.config.as_deref())?;
    if let Some(ratio) = args.ratio {
        settings.mask.ratio = ratio;
    }
    if args.write_mask {
        settings.output.write_mask = true;
    }
    if args.no_compress {
        settings.output.compress = false;
    }

    let mut options = ProcessOptions::from_config(&settings, &args.working_folder)?;
    options.out_file = args.out_file;
    info!(ratio = options.threshold.value(), "Masking with green/red threshold");

    let inputs = scan::scan(&args.files)?;
    for missing in &inputs.missing {
        warn!(path = %missing.display(), "Input does not exist, skipping");
    }
    for unsupported in &inputs.unsupported {
        warn!(path = %unsupported.display(), "Unsupported file type, skipping");
    }

    init_thread_pool(&settings.processing);
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(&inputs.inputs, &options, Some(tx));
    printer.join().ok();
    let result = result?;

    output::print_process_summary(&result);
    Ok(result.to_record(&TransformerInfo::soilmask()))
}

/// Install the global tracing subscriber. Logs go to stderr so stdout stays
/// readable as the run report.
fn init_tracing(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; users can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
