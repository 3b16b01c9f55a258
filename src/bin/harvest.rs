use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use dataset_harvest::app::{App, RetrievalResult};
use dataset_harvest::config::{
    ConfigLoader, DEFAULT_MAX_SIZE_MB, DEFAULT_OUTPUT_DIR, KaggleRequest, OpenmlRequest,
};
use dataset_harvest::domain::{IdRange, KaggleRef, PageRange};
use dataset_harvest::error::HarvestError;
use dataset_harvest::kaggle::{
    KaggleCandidate, KaggleClient, KaggleCredentials, KaggleHttpClient, KaggleSession,
};
use dataset_harvest::openml::{DatasetContent, OpenmlClient, OpenmlDataset, OpenmlHttpClient};
use dataset_harvest::output::{JsonOutput, LineOutput, OutputMode};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Harvest Kaggle and OpenML datasets into a deduplicated local catalog")]
#[command(version)]
struct Cli {
    /// Print results as JSON instead of status lines
    #[arg(long, global = true)]
    json: bool,

    /// Output folder holding the catalog and downloaded datasets
    #[arg(long, short, global = true)]
    output: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the output folder layout and an empty catalog")]
    Init,
    #[command(about = "Search Kaggle and download new matching datasets")]
    Kaggle(KaggleArgs),
    #[command(about = "Fetch OpenML datasets by id range")]
    Openml(OpenmlArgs),
    #[command(about = "Run every source configured in harvest.json")]
    Run(RunArgs),
    #[command(about = "List catalog rows")]
    List,
}

#[derive(Args)]
struct KaggleArgs {
    /// Search keyword, repeatable
    #[arg(long = "search", short, required = true)]
    search_terms: Vec<String>,

    /// Allowed license name, repeatable; none means no filtering
    #[arg(long = "license", short)]
    allowed_licenses: Vec<String>,

    /// Maximum dataset size in MB
    #[arg(long, default_value_t = DEFAULT_MAX_SIZE_MB)]
    max_size: u64,

    /// Listing pages to scan, e.g. `1..5`
    #[arg(long, default_value = "1..2")]
    pages: PageRange,

    /// Extract archives instead of keeping them compressed
    #[arg(long)]
    unzip: bool,

    /// Path to kaggle.json, overriding the default lookup
    #[arg(long)]
    credentials: Option<PathBuf>,
}

#[derive(Args)]
struct OpenmlArgs {
    /// Dataset ids to fetch, e.g. `50..60`
    #[arg(long)]
    ids: IdRange,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    credentials: Option<PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HarvestError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HarvestError) -> u8 {
    match error {
        HarvestError::MissingConfig
        | HarvestError::ConfigRead(_)
        | HarvestError::ConfigParse(_)
        | HarvestError::KaggleCredentials(_) => 2,
        HarvestError::KaggleHttp(_)
        | HarvestError::KaggleStatus { .. }
        | HarvestError::OpenmlHttp(_)
        | HarvestError::OpenmlStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Lines
    };
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));

    match cli.command {
        Commands::Init => {
            let app = App::new(output, NopKaggle, NopOpenml);
            app.init()?;
            if matches!(mode, OutputMode::Lines) {
                println!("initialized {}", app.layout().catalog_path());
            }
            Ok(())
        }
        Commands::Kaggle(args) => {
            let kaggle = kaggle_client(args.credentials.as_deref())?;
            let app = App::new(output, kaggle, NopOpenml);
            let request = KaggleRequest {
                search_terms: args.search_terms,
                allowed_licenses: args.allowed_licenses,
                max_size_mb: args.max_size,
                pages: args.pages,
                unzip: args.unzip,
            };
            let result = match mode {
                OutputMode::Json => app.retrieve_kaggle(&request, &JsonOutput),
                OutputMode::Lines => app.retrieve_kaggle(&request, &LineOutput),
            }?;
            print_retrieval(&result, mode)
        }
        Commands::Openml(args) => {
            let openml = OpenmlHttpClient::new()?;
            let app = App::new(output, NopKaggle, openml);
            let request = OpenmlRequest { ids: args.ids };
            let result = match mode {
                OutputMode::Json => app.retrieve_openml(&request, &JsonOutput),
                OutputMode::Lines => app.retrieve_openml(&request, &LineOutput),
            }?;
            print_retrieval(&result, mode)
        }
        Commands::Run(args) => run_configured(args, cli.output, mode),
        Commands::List => {
            let app = App::new(output, NopKaggle, NopOpenml);
            match mode {
                OutputMode::Json => {
                    let result = app.list(&JsonOutput)?;
                    JsonOutput::print_list(&result).into_diagnostic()
                }
                OutputMode::Lines => {
                    let result = app.list(&LineOutput)?;
                    LineOutput::print_list(&result).into_diagnostic()
                }
            }
        }
    }
}

fn run_configured(
    args: RunArgs,
    output: Option<Utf8PathBuf>,
    mode: OutputMode,
) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    let output = output.unwrap_or(resolved.output);

    if let Some(request) = &resolved.kaggle {
        let kaggle = kaggle_client(args.credentials.as_deref())?;
        let app = App::new(output.clone(), kaggle, NopOpenml);
        let result = match mode {
            OutputMode::Json => app.retrieve_kaggle(request, &JsonOutput),
            OutputMode::Lines => app.retrieve_kaggle(request, &LineOutput),
        }?;
        print_retrieval(&result, mode)?;
    }

    if let Some(request) = &resolved.openml {
        let openml = OpenmlHttpClient::new()?;
        let app = App::new(output, NopKaggle, openml);
        let result = match mode {
            OutputMode::Json => app.retrieve_openml(request, &JsonOutput),
            OutputMode::Lines => app.retrieve_openml(request, &LineOutput),
        }?;
        print_retrieval(&result, mode)?;
    }

    if resolved.kaggle.is_none() && resolved.openml.is_none() {
        tracing::warn!("config has neither a kaggle nor an openml section");
    }
    Ok(())
}

fn kaggle_client(credentials: Option<&Path>) -> miette::Result<KaggleHttpClient> {
    let credentials = match credentials {
        Some(path) => KaggleCredentials::from_file(path),
        None => KaggleCredentials::discover(),
    }?;
    let session = KaggleSession::authenticate(credentials)?;
    tracing::info!(username = session.username(), "Kaggle session ready");
    Ok(KaggleHttpClient::new(session)?)
}

fn print_retrieval(result: &RetrievalResult, mode: OutputMode) -> miette::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_retrieval(result).into_diagnostic(),
        OutputMode::Lines => LineOutput::print_retrieval(result).into_diagnostic(),
    }
}

struct NopKaggle;
struct NopOpenml;

impl KaggleClient for NopKaggle {
    fn list_datasets(
        &self,
        _search: &str,
        _page: u32,
        _max_size_bytes: Option<u64>,
    ) -> Result<Vec<KaggleCandidate>, HarvestError> {
        Err(HarvestError::KaggleHttp(
            "Kaggle client not configured".to_string(),
        ))
    }

    fn download_dataset(
        &self,
        _reference: &KaggleRef,
        _destination_dir: &Path,
        _unzip: bool,
    ) -> Result<PathBuf, HarvestError> {
        Err(HarvestError::KaggleHttp(
            "Kaggle client not configured".to_string(),
        ))
    }
}

impl OpenmlClient for NopOpenml {
    fn fetch_metadata(&self, _id: u32) -> Result<OpenmlDataset, HarvestError> {
        Err(HarvestError::OpenmlHttp(
            "OpenML client not configured".to_string(),
        ))
    }

    fn fetch_content(
        &self,
        _dataset: &OpenmlDataset,
        _target: Option<&str>,
    ) -> Result<DatasetContent, HarvestError> {
        Err(HarvestError::OpenmlHttp(
            "OpenML client not configured".to_string(),
        ))
    }
}
