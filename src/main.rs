use hep_harvester::config::HarvesterConfig;
use hep_harvester::harvest::{FileFeed, LastRunStore, OaiPmhClient};
use hep_harvester::normalize::HindawiParser;
use hep_harvester::{parse_feed, HarvestExecutor, NormalizedRecord};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn write_records(out: &mut dyn Write, records: &[NormalizedRecord]) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Records go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hep_harvester=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: hep-harvester <config.toml>")?;
    let config = HarvesterConfig::load(&config_path)?;

    let mut out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let client = Arc::new(OaiPmhClient::new());
    let mut failures = 0usize;

    for source in &config.oaipmh {
        let store = LastRunStore::new(&config.last_runs_path, &source.name);
        let parser = Arc::new(HindawiParser::with_name(&source.name));
        let executor = HarvestExecutor::new(store, client.clone(), parser);

        match executor.harvest(source.window()).await {
            Ok(result) => write_records(&mut out, &result.records)?,
            Err(e) => {
                error!(source = %source.name, url = %source.url, error = %e, "Harvest failed");
                failures += 1;
            }
        }
    }

    for feed in &config.feeds {
        let parser = HindawiParser::with_name(&feed.name);
        match parse_feed(&FileFeed::new(&feed.path), &parser).await {
            Ok(records) => write_records(&mut out, &records)?,
            Err(e) => {
                error!(source = %feed.name, path = %feed.path.display(), error = %e, "Feed parsing failed");
                failures += 1;
            }
        }
    }

    out.flush()?;

    if failures > 0 {
        return Err(format!("{failures} source(s) failed").into());
    }
    info!("All sources harvested");
    Ok(())
}
