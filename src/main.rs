//! src/main.rs
//!
//! Entry point for the linkcheck binary.
//!
//! Responsibilities:
//!   1) Parse CLI arguments (`args::Args`).
//!   2) Load and resolve the config, applying CLI overrides.
//!   3) Read the hyperlink source file.
//!   4) Build the shared HTTP client and run the checker.
//!   5) Write `output.txt`/`output.json` and set the process exit code.

use std::process::ExitCode;

use clap::Parser;
use linkcheck::args::Args;
use linkcheck::config::{Config, OutputPaths, RawConfig};
use linkcheck::{input, report, HyperlinkAvailabilityChecker, LinkcheckError};
use reqwest::Client;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "linkcheck failed");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode, LinkcheckError> {
    let args = Args::parse();

    let config = load_config(&args)?;
    let hyperlinks = input::read_hyperlinks(&args.input)?;
    tracing::info!(count = hyperlinks.len(), "loaded hyperlinks");

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(std::time::Duration::from_secs(5))
        .danger_accept_invalid_certs(!config.tls_verify);

    if let Some(cacerts_path) = &config.tls_cacerts {
        let pem = std::fs::read(cacerts_path)?;
        let cert = reqwest::Certificate::from_pem(&pem)?;
        builder = builder.add_root_certificate(cert);
    }

    let client = builder.build()?;

    let checker = HyperlinkAvailabilityChecker::new(client, config);
    let results = checker.check(hyperlinks, None).await;

    let paths = OutputPaths { dir: args.out_dir.clone() };
    let mut writer = report::Writer::create(&paths)?;
    for result in &results {
        writer.write_result(result)?;
    }
    let broken_or_timeout_count = writer.finish()?;

    tracing::info!(total = results.len(), broken_or_timeout_count, "linkcheck complete");
    Ok(ExitCode::from(report::exit_code_for(broken_or_timeout_count) as u8))
}

fn load_config(args: &Args) -> Result<Config, LinkcheckError> {
    let mut raw = RawConfig::load(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        raw.workers = Some(workers);
    }
    if let Some(timeout) = args.timeout {
        raw.timeout_secs = Some(timeout);
    }
    if let Some(retries) = args.retries {
        raw.retries = Some(retries);
    }
    if let Some(anchors) = args.anchors {
        raw.anchors = Some(anchors);
    }
    raw.resolve()
}
