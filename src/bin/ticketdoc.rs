use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketdoc::{
    AssetLocator, AssetMigrator, AssetReference, BackendConfig, BackendSelector,
    BookingDocumentRequest, Branding, DEFAULT_DOCUMENT_FOLDER, GenerationThreading,
    TicketDocumentGenerator,
};

#[derive(Parser, Debug)]
#[command(name = "ticketdoc", version)]
struct Cli {
    /// Storage config JSON. `TICKETDOC_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the ticket document for a booking.
    Render(RenderArgs),
    /// Store a file through the configured backend.
    Upload(UploadArgs),
    /// Delete a stored asset by reference.
    Delete(DeleteArgs),
    /// Copy local assets to the configured remote backend.
    Migrate(MigrateArgs),
    /// Print the effective configuration with secrets masked.
    Config,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Booking request JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PDF path.
    #[arg(long, required_unless_present = "store")]
    out: Option<PathBuf>,

    /// Store the document through the backend selector and print its reference.
    #[arg(long)]
    store: bool,

    /// Folder used with `--store`.
    #[arg(long, default_value = DEFAULT_DOCUMENT_FOLDER)]
    folder: String,

    /// Branding JSON (title, logo, disclaimer, footer lines, currency).
    #[arg(long)]
    branding: Option<PathBuf>,

    /// Resolve QR codes one at a time.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct UploadArgs {
    /// File to store.
    file: PathBuf,

    /// Destination folder (e.g. `events/posters`).
    #[arg(long, default_value = "general")]
    folder: String,
}

#[derive(Parser, Debug)]
struct DeleteArgs {
    /// Stored reference (local path or URL).
    reference: String,
}

#[derive(Parser, Debug)]
struct MigrateArgs {
    /// References to migrate.
    references: Vec<String>,

    /// File with one reference per line.
    #[arg(long)]
    from_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketdoc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.cmd {
        Command::Render(args) => cmd_render(&config, args),
        Command::Upload(args) => cmd_upload(&config, args),
        Command::Delete(args) => cmd_delete(&config, args),
        Command::Migrate(args) => cmd_migrate(&config, args),
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<BackendConfig> {
    let mut config = match path {
        Some(p) => BackendConfig::from_path(p)?,
        None => BackendConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

fn cmd_render(config: &BackendConfig, args: RenderArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("read request '{}'", args.in_path.display()))?;
    let request = BookingDocumentRequest::from_json_str(&text)?;
    let branding = match &args.branding {
        Some(p) => Branding::from_path(p)?,
        None => Branding::default(),
    };

    let generator = TicketDocumentGenerator::new(AssetLocator::new(config)?, branding)
        .with_threading(GenerationThreading {
            parallel: !args.sequential,
            threads: args.threads,
        });

    if let Some(out) = &args.out {
        generator.generate_to_file(&request, out)?;
        eprintln!("wrote {}", out.display());
    }
    if args.store {
        let selector = BackendSelector::new(config);
        let reference = generator.generate_and_store(&request, &selector, &args.folder)?;
        println!("{reference}");
    }
    Ok(())
}

fn cmd_upload(config: &BackendConfig, args: UploadArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("read '{}'", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("'{}' has no usable file name", args.file.display()))?;

    let selector = BackendSelector::new(config);
    let reference = selector.put(name, &bytes, &args.folder)?;
    println!("{reference}");
    Ok(())
}

fn cmd_delete(config: &BackendConfig, args: DeleteArgs) -> anyhow::Result<()> {
    let reference = AssetReference::parse(&args.reference)?;
    let selector = BackendSelector::new(config);
    if selector.delete(&reference)? {
        println!("deleted {reference}");
    } else {
        println!("not found {reference}");
    }
    Ok(())
}

fn cmd_migrate(config: &BackendConfig, args: MigrateArgs) -> anyhow::Result<()> {
    let mut raw = args.references;
    if let Some(path) = &args.from_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read reference list '{}'", path.display()))?;
        raw.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    let references = raw
        .iter()
        .map(|r| AssetReference::parse(r))
        .collect::<Result<Vec<_>, _>>()?;

    let selector = BackendSelector::new(config);
    let locator = AssetLocator::new(config)?;
    let report = AssetMigrator::new(&selector, &locator).migrate(&references)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
