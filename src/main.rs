use casedex::chunker::Chunker;
use casedex::cli::{Cli, Commands, ConfigAction};
use casedex::config::{Config, ConfigValidator};
use casedex::document::Document;
use casedex::embedding::create_provider;
use casedex::error::{CasedexError, Result};
use casedex::ingest::{IngestOptions, Ingestor};
use casedex::retrieval::Retriever;
use casedex::store::{CaseRepository, StoreState};
use std::io::Read;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest {
            case,
            files,
            stdin,
            name,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_ingest(&config, &case, files, stdin.then_some(name).flatten(), json)?;
        }
        Commands::Query {
            case,
            query,
            top_k,
            json,
        } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_query(&config, &case, &query, top_k, json)?;
        }
        Commands::Cases { json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_cases(&config, json)?;
        }
        Commands::Stats { case, json } => {
            let config = load_config(cli.config, cli.profile)?;
            cmd_stats(&config, &case, json)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, cli.profile, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "casedex=debug" } else { "casedex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_ingest(
    config: &Config,
    case: &str,
    files: Vec<PathBuf>,
    stdin_name: Option<String>,
    json: bool,
) -> Result<()> {
    let documents = match stdin_name {
        Some(name) => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| CasedexError::Io {
                    source: e,
                    context: "Failed to read document from stdin".to_string(),
                })?;
            vec![Document::new(name, text)]
        }
        None => files
            .iter()
            .map(|path| read_document(path))
            .collect::<Result<Vec<_>>>()?,
    };

    let provider = create_provider(&config.embedding)?;
    let repository = CaseRepository::new(config.data_dir())?;
    let chunker = Chunker::new(config.chunking.window_size, config.chunking.overlap)?;
    let ingestor = Ingestor::new(provider, repository, chunker, IngestOptions::from(config));

    let report = ingestor.ingest(case, &documents)?;

    if json {
        println!("{}", to_json(&report)?);
    } else {
        println!("✓ Ingested into case '{}'", report.namespace);
        println!(
            "  Documents: {} new, {} skipped",
            report.documents_ingested, report.documents_skipped
        );
        println!("  Chunks added: {}", report.chunks_added);
        println!("  Total vectors: {}", report.total_vectors);
        println!("  Took: {}ms", report.duration_ms);
    }

    Ok(())
}

fn read_document(path: &std::path::Path) -> Result<Document> {
    let text = std::fs::read_to_string(path).map_err(|e| CasedexError::Io {
        source: e,
        context: format!("Failed to read {}", path.display()),
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(filename, text))
}

fn cmd_query(
    config: &Config,
    case: &str,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let repository = CaseRepository::new(config.data_dir())?;

    if repository.state(case)? == StoreState::Absent {
        tracing::warn!("Case '{}' has no indexed documents", case);
    }

    let provider = create_provider(&config.embedding)?;
    let retriever = Retriever::new(provider, repository);

    if json {
        let hits = retriever.search(query, case, top_k)?;
        println!("{}", to_json(&hits)?);
    } else {
        let context = retriever.retrieve(query, case, top_k)?;
        println!("{}", context);
    }

    Ok(())
}

fn cmd_cases(config: &Config, json: bool) -> Result<()> {
    let repository = CaseRepository::new(config.data_dir())?;
    let cases = repository.list_cases()?;

    if json {
        println!("{}", to_json(&cases)?);
        return Ok(());
    }

    if cases.is_empty() {
        println!("No cases found in {}", repository.root().display());
        return Ok(());
    }

    for case in &cases {
        println!(
            "{}  ({} vectors, {} documents, updated {})",
            case.namespace,
            case.vectors,
            case.documents,
            case.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn cmd_stats(config: &Config, case: &str, json: bool) -> Result<()> {
    let repository = CaseRepository::new(config.data_dir())?;
    let summary = repository.stats(case)?;

    if json {
        println!("{}", to_json(&summary)?);
        return Ok(());
    }

    match summary {
        None => println!("Case '{}': absent (nothing ingested yet)", case),
        Some(summary) => {
            println!("Case '{}': populated", summary.namespace);
            println!("  Directory: {}", repository.case_dir(case).display());
            println!("  Generation: {}", summary.generation);
            println!("  Dimension: {}", summary.dimension);
            println!("  Vectors: {}", summary.vectors);
            println!("  Documents: {}", summary.documents);
            if let Some(model) = &summary.embedding_model {
                println!("  Embedding model: {}", model);
            }
            println!(
                "  Updated: {}",
                summary.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}

fn cmd_config(
    config_path: Option<PathBuf>,
    profile: Option<String>,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path, profile)?;
            let toml = toml::to_string_pretty(&config)?;
            println!("{}", toml);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = match profile {
                Some(profile) => Config::load_with_profile(&path, &profile)?,
                None => Config::load(&path)?,
            };
            ConfigValidator::validate(&config)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            let mut config = Config::default();
            if let Ok(data_dir) = Config::default_data_dir() {
                config.storage.data_dir = data_dir;
            }
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn load_config(config_path: Option<PathBuf>, profile: Option<String>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'casedex config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    match profile {
        Some(profile) => Config::load_with_profile(&path, &profile),
        None => Config::load(&path),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CasedexError::Json {
        source: e,
        context: "Failed to serialize output".to_string(),
    })
}
