use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use retailrec_api::RestApi;
use retailrec_core::popular::{self, DEFAULT_GLOBAL_LIMIT, DEFAULT_PER_GROUP_LIMIT};
use retailrec_core::{RecommenderConfig, ReducerConfig};
use retailrec_session::{LoadOptions, Recommendation, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Product recommendations and popularity views over retail transactions
#[derive(Parser, Debug)]
#[command(name = "retailrec")]
#[command(about = "Product recommendations from a retail transactions spreadsheet", long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API
    Serve {
        /// Spreadsheet to load at startup
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// HTTP API port
        #[arg(long, default_value_t = 8080)]
        port: u16,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Recommend products similar to a free-text query
    Recommend {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(short, long)]
        query: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Print the popularity views
    Popular {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        json: bool,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// Reduced dimensions (clamped to the corpus)
    #[arg(long, default_value_t = 50)]
    components: usize,

    /// Seed for the random projection and for sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Minimum fuzzy score (0-100) a query must reach
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    threshold: u8,

    /// Number of recommendations
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Keep only this fraction of the uploaded rows, e.g. 0.2
    #[arg(long)]
    sample: Option<f64>,

    /// Rebuild derived structures on every request
    #[arg(long)]
    no_cache: bool,
}

impl EngineArgs {
    fn recommender_config(&self) -> RecommenderConfig {
        RecommenderConfig {
            reducer: ReducerConfig {
                n_components: self.components,
                seed: self.seed,
                ..ReducerConfig::default()
            },
            match_threshold: self.threshold,
            n_recommendations: self.limit,
            cache_derived: !self.no_cache,
            ..RecommenderConfig::default()
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sample_fraction: self.sample,
            seed: self.seed,
        }
    }

    fn session(&self) -> anyhow::Result<Session> {
        Ok(Session::new(self.recommender_config())?.with_load_options(self.load_options()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Command::Serve { file, port, engine } => serve(file, port, &engine).await,
        Command::Recommend {
            file,
            query,
            json,
            engine,
        } => {
            let session = engine.session()?;
            session
                .upload_path(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            let recommendation = session.recommend(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                println!("{}", recommendation);
            }
            if let Recommendation::Unavailable { reason } = recommendation {
                anyhow::bail!(reason);
            }
            Ok(())
        }
        Command::Popular { file, json, engine } => {
            let session = engine.session()?;
            session
                .upload_path(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            print_popular(&session, json)
        }
    }
}

async fn serve(file: Option<PathBuf>, port: u16, engine: &EngineArgs) -> anyhow::Result<()> {
    info!("Starting retailrec v{}", env!("CARGO_PKG_VERSION"));

    let session = Arc::new(engine.session()?);
    if let Some(path) = file {
        let loader = session.clone();
        let report = tokio::task::spawn_blocking(move || loader.upload_path(&path)).await??;
        info!(
            records = report.records,
            descriptions = report.unique_descriptions,
            "Catalog loaded"
        );
    } else {
        info!("No catalog loaded; upload one with POST /catalog");
    }

    let session_http = session.clone();
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(session_http, port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}

fn print_popular(session: &Session, json: bool) -> anyhow::Result<()> {
    let catalog = session.catalog()?;
    let global = popular::top_products(&catalog, DEFAULT_GLOBAL_LIMIT);
    let by_country = popular::top_products_by_country(&catalog, DEFAULT_PER_GROUP_LIMIT);
    let by_month = popular::top_products_by_month(&catalog, DEFAULT_PER_GROUP_LIMIT);
    let countries = popular::top_countries(&catalog, DEFAULT_PER_GROUP_LIMIT);

    if json {
        let views = serde_json::json!({
            "top_products": global,
            "by_country": by_country,
            "by_month": by_month,
            "top_countries": countries,
        });
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    println!("Top {} products", DEFAULT_GLOBAL_LIMIT);
    for product in &global {
        println!("  {:>6}  {}", product.count, product.description);
    }

    println!("\nTop products by country");
    for group in &by_country {
        println!("  {}", group.country);
        for product in &group.products {
            println!("    {:>6}  {}", product.count, product.description);
        }
    }

    println!("\nTop products by month");
    for group in &by_month {
        println!("  {:02}", group.month);
        for product in &group.products {
            println!("    {:>6}  {}", product.count, product.description);
        }
    }

    println!("\nTop countries");
    for country in &countries {
        println!("  {:>6}  {}", country.count, country.country);
    }
    Ok(())
}
