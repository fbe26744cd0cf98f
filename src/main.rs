use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use gig_scraper::browser::{Browser, FixtureSource, StaticBrowser, WebDriverBrowser};
use gig_scraper::config::scaffold::{inject_defaults, slugify, template};
use gig_scraper::config::{load_config, parse_config, ActionConfig, ScraperConfig};
use gig_scraper::logging::init_logging;
use gig_scraper::output::persist_gigs;
use gig_scraper::settings::EngineSettings;
use gig_scraper::{ScraperEngine, ScraperError};

#[derive(Parser)]
#[command(name = "gig_scraper")]
#[command(about = "Configuration-driven scraper for live-music venue listings")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect, validate and scaffold site configs
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Scrape one or more sites; each config runs as an independent job
    Scrape(ScrapeArgs),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// List the configs in the config directory
    List {
        /// Directory to scan (defaults to the configured config directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Show workflow and validation details
        #[arg(long)]
        detailed: bool,
    },
    /// Validate a config file against the schema
    Validate {
        file: PathBuf,
        /// Inject missing browser/rateLimit/validation blocks and write a .fixed.json sibling
        #[arg(long)]
        fix: bool,
    },
    /// Scaffold a config with placeholder selectors
    Create {
        site_name: String,
        base_url: String,
        /// Source id (defaults to a slug of the site name)
        #[arg(long)]
        source: Option<String>,
    },
}

#[derive(Args)]
struct ScrapeArgs {
    /// Config files to run
    #[arg(required = true)]
    configs: Vec<PathBuf>,
    /// WebDriver endpoint (defaults to the configured one)
    #[arg(long, conflicts_with_all = ["static_pages", "fixtures"])]
    webdriver: Option<String>,
    /// Fetch pages over plain HTTP instead of driving a browser
    #[arg(long = "static", conflicts_with = "fixtures")]
    static_pages: bool,
    /// Replay saved HTML snapshots from this directory
    #[arg(long)]
    fixtures: Option<PathBuf>,
    /// Where result files are written (defaults to the configured output directory)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone)]
enum BrowserChoice {
    WebDriver(String),
    Http,
    Fixtures(PathBuf),
}

impl BrowserChoice {
    fn build(&self, config: &ScraperConfig) -> gig_scraper::Result<Box<dyn Browser>> {
        let browser: Box<dyn Browser> = match self {
            BrowserChoice::WebDriver(url) => Box::new(WebDriverBrowser::new(url.clone())),
            BrowserChoice::Http => Box::new(StaticBrowser::http(&config.browser)?),
            BrowserChoice::Fixtures(dir) => {
                Box::new(StaticBrowser::fixtures(FixtureSource::from_dir(dir)?))
            }
        };
        Ok(browser)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = EngineSettings::load().context("Failed to load engine settings")?;
    init_logging(&settings.log_dir).context("Failed to initialise logging")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::List { dir, detailed } => {
                list_configs(&dir.unwrap_or_else(|| settings.config_dir.clone()), detailed)
            }
            ConfigCommands::Validate { file, fix } => {
                if !validate_config(&file, fix)? {
                    std::process::exit(1);
                }
                Ok(())
            }
            ConfigCommands::Create {
                site_name,
                base_url,
                source,
            } => create_config(&settings.config_dir, &site_name, &base_url, source.as_deref()),
        },
        Commands::Scrape(args) => scrape(args, &settings).await,
    }
}

fn config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read config directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
        .filter(|path| !path.to_string_lossy().ends_with(".fixed.json"))
        .collect();
    files.sort();
    Ok(files)
}

fn list_configs(dir: &Path, detailed: bool) -> Result<()> {
    let files = config_files(dir)?;
    if files.is_empty() {
        println!("No configs found in {}", dir.display());
        return Ok(());
    }

    println!("📋 {} config(s) in {}:", files.len(), dir.display());
    for path in files {
        match load_config(&path) {
            Ok(config) => {
                println!(
                    "   {} ({}) - {}",
                    config.site.name, config.site.source, config.site.base_url
                );
                if detailed {
                    let steps: Vec<&str> = config.workflow.iter().map(ActionConfig::kind).collect();
                    println!("      file: {}", path.display());
                    println!("      workflow: {}", steps.join(" -> "));
                    println!(
                        "      timezone: {}",
                        config.site.timezone.as_deref().unwrap_or("(UTC)")
                    );
                    println!(
                        "      expected events: {} - {}",
                        config
                            .validation
                            .min_events_expected
                            .map_or("-".to_string(), |n| n.to_string()),
                        config
                            .validation
                            .max_events_expected
                            .map_or("-".to_string(), |n| n.to_string())
                    );
                    println!("      required: {}", config.validation.required.join(", "));
                }
            }
            Err(e) => println!("   ⚠️  {}: {}", path.display(), e),
        }
    }
    Ok(())
}

fn print_problems(err: &ScraperError) {
    match err {
        ScraperError::ConfigValidation { errors } => {
            for problem in errors {
                println!("   - {}", problem);
            }
        }
        other => println!("   - {}", other),
    }
}

/// `Ok(true)` when the file (or, with `--fix`, its fixed sibling) is valid.
fn validate_config(file: &Path, fix: bool) -> Result<bool> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let err = match parse_config(&content) {
        Ok(config) => {
            println!("✅ {} is valid ({})", file.display(), config.site.source);
            return Ok(true);
        }
        Err(e) => e,
    };
    println!("❌ {} is invalid:", file.display());
    print_problems(&err);

    if !fix {
        return Ok(false);
    }

    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&content) else {
        println!("   Cannot fix a file that is not valid JSON");
        return Ok(false);
    };
    let added = inject_defaults(&mut value);
    let fixed_path = file.with_extension("fixed.json");
    fs::write(&fixed_path, serde_json::to_string_pretty(&value)?)
        .with_context(|| format!("Failed to write {}", fixed_path.display()))?;
    println!(
        "🔧 Wrote {} (added: {})",
        fixed_path.display(),
        if added.is_empty() { "nothing".to_string() } else { added.join(", ") }
    );

    match parse_config(&value.to_string()) {
        Ok(_) => {
            println!("✅ Fixed config is valid");
            Ok(true)
        }
        Err(e) => {
            println!("❌ Fixed config is still invalid:");
            print_problems(&e);
            Ok(false)
        }
    }
}

fn create_config(dir: &Path, site_name: &str, base_url: &str, source: Option<&str>) -> Result<()> {
    let config = template(site_name, base_url, source);
    let stem = source.map(str::to_string).unwrap_or_else(|| slugify(site_name));
    let path = dir.join(format!("{stem}.json"));
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    fs::create_dir_all(dir)?;
    fs::write(&path, serde_json::to_string_pretty(&config)?)?;
    println!("✨ Created {}", path.display());
    println!("   Replace the placeholder selectors, then run `gig_scraper config validate {}`", path.display());
    Ok(())
}

async fn scrape(args: ScrapeArgs, settings: &EngineSettings) -> Result<()> {
    let choice = match (&args.fixtures, args.static_pages, &args.webdriver) {
        (Some(dir), _, _) => BrowserChoice::Fixtures(dir.clone()),
        (None, true, _) => BrowserChoice::Http,
        (None, false, url) => {
            BrowserChoice::WebDriver(url.clone().unwrap_or_else(|| settings.webdriver_url.clone()))
        }
    };
    let output_dir = args.output.unwrap_or_else(|| settings.output_dir.clone());

    let mut jobs = JoinSet::new();
    for path in args.configs {
        let choice = choice.clone();
        let output_dir = output_dir.clone();
        let debug_dir = settings.debug_dir.clone();
        jobs.spawn(async move {
            let label = path.display().to_string();
            let result = run_site(&path, &choice, &output_dir, debug_dir).await;
            (label, result)
        });
    }

    let mut failures = 0usize;
    while let Some(joined) = jobs.join_next().await {
        match joined {
            Ok((label, Ok(file))) => {
                info!("{} finished", label);
                println!("💾 {} -> {}", label, file.display());
            }
            Ok((label, Err(e))) => {
                failures += 1;
                error!("{} failed: {:#}", label, e);
                println!("❌ {}: {:#}", label, e);
            }
            Err(e) => {
                failures += 1;
                error!("Scrape job panicked: {}", e);
            }
        }
    }

    if failures > 0 {
        warn!("{} scrape job(s) failed", failures);
        anyhow::bail!("{failures} scrape job(s) failed");
    }
    Ok(())
}

async fn run_site(
    path: &Path,
    choice: &BrowserChoice,
    output_dir: &Path,
    debug_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    let engine = ScraperEngine::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_debug_dir(debug_dir);
    let browser = choice.build(engine.config())?;

    println!("🚀 Scraping {}", engine.config().site.name);
    let gigs = engine.run(browser.as_ref()).await?;
    println!("✅ {}: {} gig(s)", engine.config().site.name, gigs.len());

    let file = persist_gigs(&gigs, &engine.config().site.source, output_dir)?;
    Ok(file)
}
