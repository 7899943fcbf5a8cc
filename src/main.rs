use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use photostamp::{
    Config, WatermarkKind, WatermarkSettings,
    batch::{self, BatchError},
    templates::{DEFAULT_TEMPLATES_FILE, TemplateStore},
    watermark::Watermarker,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch watermark photos with their capture date, text or a logo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "photostamp.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watermark a file or a directory of photos
    Run(RunArgs),

    /// Manage saved watermark templates
    Template {
        /// Path to the templates file
        #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
        templates_file: PathBuf,

        #[command(subcommand)]
        action: TemplateCommands,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// File or directory to process
    #[arg(long)]
    path: PathBuf,

    /// Recurse into subdirectories
    #[arg(long)]
    recursive: bool,

    /// Comma-separated extensions to include (e.g. .jpg,.png)
    #[arg(long, value_delimiter = ',')]
    include_ext: Option<Vec<String>>,

    /// Only use EXIF capture dates, skip files without one
    #[arg(long)]
    exif_only: bool,

    /// Do not fall back to the file modification time
    #[arg(long)]
    no_fallback_mtime: bool,

    /// List files and dates without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Apply a saved template before the other flags
    #[arg(long)]
    template: Option<String>,

    /// Path to the templates file
    #[arg(long, default_value = DEFAULT_TEMPLATES_FILE)]
    templates_file: PathBuf,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Anchor code: tl, tc, tr, cl, cc, cr, bl, bc, br
    #[arg(long)]
    position: Option<String>,

    /// Font size in pixels
    #[arg(long)]
    font_size: Option<f32>,

    /// Fixed watermark text instead of the capture date
    #[arg(long)]
    text: Option<String>,

    /// Image to use as the watermark
    #[arg(long)]
    watermark_image: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List saved templates
    List,
    /// Print a template as JSON
    Show {
        name: String,
    },
    /// Save the current configuration and flags under a name
    Save {
        name: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Delete a template
    Delete {
        name: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {}", e);
    }

    let result = match cli.command {
        Commands::Run(args) => run(&cli.config, args).await,
        Commands::Template {
            templates_file,
            action,
        } => handle_template_command(&cli.config, &templates_file, action).await,
    };

    match result {
        Ok(code) => code,
        Err(BatchError::PathNotFound(path)) => {
            eprintln!("Path does not exist or not accessible: {}", path.display());
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn apply_style(settings: &mut WatermarkSettings, style: &StyleArgs) {
    if let Some(position) = &style.position {
        settings.position = position.clone();
        settings.manual_position = None;
    }
    if let Some(font_size) = style.font_size {
        settings.font_size = font_size;
    }
    if let Some(text) = &style.text {
        settings.text = text.clone();
        settings.kind = WatermarkKind::Text;
    }
    if let Some(image) = &style.watermark_image {
        settings.image_path = Some(image.clone());
        settings.kind = WatermarkKind::Image;
    }
}

async fn run(config_path: &Path, args: RunArgs) -> Result<ExitCode, BatchError> {
    let mut config = Config::load(config_path)?;

    if let Some(name) = &args.template {
        let store = TemplateStore::load_or_default(&args.templates_file).await?;
        let template = store
            .get(name)
            .ok_or_else(|| BatchError::TemplateNotFound(name.clone()))?;
        info!("Using template '{}'", name);
        config.watermark = template.clone();
    }

    apply_style(&mut config.watermark, &args.style);
    config.batch.recursive |= args.recursive;
    config.batch.exif_only |= args.exif_only;
    if args.no_fallback_mtime {
        config.batch.fallback_mtime = false;
    }
    if let Some(extensions) = args.include_ext {
        config.batch.include_extensions = extensions;
    }
    if let Some(output) = args.output {
        config.output.directory = Some(output);
    }

    if args.dry_run {
        let entries = batch::dry_run(&config, &args.path)?;
        println!("DRY RUN: {} file(s) would be processed", entries.len());
        for entry in &entries {
            println!("{}", entry);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let summary = batch::run_batch(&config, &args.path, Watermarker::default()).await?;
    println!("{}", summary);

    if summary.failed == 0 && summary.skipped == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn handle_template_command(
    config_path: &Path,
    templates_file: &Path,
    cmd: TemplateCommands,
) -> Result<ExitCode, BatchError> {
    match cmd {
        TemplateCommands::List => {
            let store = TemplateStore::load_or_default(templates_file).await?;
            let mut any = false;
            for name in store.names() {
                println!("{}", name);
                any = true;
            }
            if !any {
                println!("No templates in {}", templates_file.display());
            }
        }
        TemplateCommands::Show { name } => {
            let store = TemplateStore::load_or_default(templates_file).await?;
            let template = store
                .get(&name)
                .ok_or_else(|| BatchError::TemplateNotFound(name.clone()))?;
            println!("{}", serde_json::to_string_pretty(template)?);
        }
        TemplateCommands::Save { name, style } => {
            let config = Config::load(config_path)?;
            let mut settings = config.watermark;
            apply_style(&mut settings, &style);
            // Reject settings that could never render
            settings.to_placement()?;
            settings.to_text_style()?;

            let mut store = TemplateStore::load_or_default(templates_file).await?;
            let replaced = store.insert(name.clone(), settings).is_some();
            store.save_to_file(templates_file).await?;
            if replaced {
                println!("Updated template '{}'", name);
            } else {
                println!("Saved template '{}'", name);
            }
        }
        TemplateCommands::Delete { name } => {
            let mut store = TemplateStore::load_or_default(templates_file).await?;
            if store.remove(&name).is_none() {
                return Err(BatchError::TemplateNotFound(name));
            }
            store.save_to_file(templates_file).await?;
            println!("Deleted template '{}'", name);
        }
    }

    Ok(ExitCode::SUCCESS)
}
