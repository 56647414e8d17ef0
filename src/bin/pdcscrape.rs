use std::process;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use pdcscrape::{Panels, PdcScraper, Query, ScraperError};

#[derive(Parser)]
#[command(name = "pdcscrape")]
#[command(about = "A pseudomonas.com feature page scraper", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(long, help = "Strain to search in (default: sbw25)", conflicts_with = "organism")]
    strain: Option<String>,

    #[arg(long, help = "Organism to search in")]
    organism: Option<String>,

    #[arg(long, help = "Feature name or locus tag to look up")]
    feature: Option<String>,

    #[arg(
        long,
        value_name = "JSON",
        help = "Query as a JSON object with 'strain', 'feature' and/or 'organism' keys",
        conflicts_with_all = ["strain", "organism", "feature"]
    )]
    query: Option<String>,

    #[arg(
        long,
        default_value = pdcscrape::BASE_URL,
        help = "Base URL of the genome database"
    )]
    base_url: String,

    #[arg(
        long = "section",
        value_name = "NAME",
        help = "Only print these sections (repeatable)"
    )]
    sections: Vec<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn build_query(cli: &Cli) -> Result<Option<Query>, ScraperError> {
    if let Some(json) = &cli.query {
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Query is not valid JSON: {}", e);
                process::exit(1);
            }
        };
        return Ok(Some(Query::from_value(&value)?));
    }

    if cli.strain.is_none() && cli.organism.is_none() && cli.feature.is_none() {
        return Ok(None);
    }

    let strain = match (&cli.strain, &cli.organism) {
        (None, None) => Some(pdcscrape::query::DEFAULT_STRAIN),
        (strain, _) => strain.as_deref(),
    };
    Ok(Some(Query::new(
        strain,
        cli.feature.as_deref(),
        cli.organism.as_deref(),
    )?))
}

fn print_panels(panels: &Panels, sections: &[String], format: &OutputFormat) {
    let selected: Panels = panels
        .iter()
        .filter(|(name, _)| sections.is_empty() || sections.iter().any(|s| s == *name))
        .map(|(name, table)| (name.clone(), table.clone()))
        .collect();

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&selected) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Error serializing to JSON: {}", e);
                process::exit(1);
            }
        },
        OutputFormat::Text => {
            for (name, table) in &selected {
                println!("── {}", name);
                println!("{}", table);
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let query = build_query(&cli).unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });

    let mut scraper = PdcScraper::with_base_url(&cli.base_url, query).unwrap_or_else(|e| {
        log::error!("Error creating scraper: {}", e);
        process::exit(1);
    });

    if let Err(e) = scraper.connect() {
        log::error!("{}", e);
        process::exit(1);
    }

    log::info!("Running query: {}", scraper.query());
    let panels = scraper.run_query(None).unwrap_or_else(|e| {
        log::error!("Error running query: {}", e);
        process::exit(1);
    });

    for (name, table) in &panels {
        if table.is_empty() {
            log::debug!("Section '{}' is empty", name);
        }
    }

    print_panels(&panels, &cli.sections, &cli.format);
}
