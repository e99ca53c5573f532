//! Runs one fill request from a JSON file through the autofill pipeline.
//!
//! ```text
//! autofill-core <request.json> [config.yaml]
//! ```
//!
//! The request file holds `request` (a `FillRequest`), `entries` and an
//! optional `device` (build facts). The outcome is printed as JSON, followed
//! by the metrics report on stderr.

use std::fs;

use anyhow::Context;
use autofill::{
    AutofillConfig, AutofillService, BuildInfo, CredentialEntry, DeviceProfile, FillRequest,
    StaticDeviceProvider,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RequestFile {
    request: FillRequest,
    #[serde(default)]
    entries: Vec<CredentialEntry>,
    #[serde(default)]
    device: Option<BuildInfo>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut args = std::env::args().skip(1);
    let request_path = args
        .next()
        .context("usage: autofill-core <request.json> [config.yaml]")?;
    let config = match args.next() {
        Some(path) => AutofillConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => AutofillConfig::default(),
    };

    let raw = fs::read_to_string(&request_path)
        .with_context(|| format!("reading request from {request_path}"))?;
    let file: RequestFile = serde_json::from_str(&raw).context("parsing request file")?;

    let device = file
        .device
        .as_ref()
        .map(DeviceProfile::detect)
        .unwrap_or_else(|| DeviceProfile::stock(34));
    let service = AutofillService::new(&config, &StaticDeviceProvider(device))?;

    let outcome = service.handle(&file.request, &file.entries).await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    eprintln!("{}", service.metrics().formatted_stats());
    Ok(())
}
