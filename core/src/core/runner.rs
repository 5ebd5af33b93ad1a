use log::debug;
use thiserror::Error;

use super::matcher;
use super::Finding;
use crate::error::ScanError;
use crate::http::{HttpClient, HttpRequest};
use crate::module::Module;

/// A module run that stopped early.
///
/// Carries the findings produced for the paths that completed before the
/// failing one; later paths were never attempted.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunError {
    pub findings: Vec<Finding>,
    #[source]
    pub error: ScanError,
}

/// Runs every path of `module` against `base_url`, one after the other.
///
/// The first failure at any stage stops the run.
pub async fn run_module(
    module: &Module,
    base_url: &str,
    client: &HttpClient,
) -> Result<Vec<Finding>, RunError> {
    let mut findings = Vec::new();

    for path in module.paths() {
        match run_path(module, base_url, path, client).await {
            Ok(finding) => findings.push(finding),
            Err(error) => return Err(RunError { findings, error }),
        }
    }

    Ok(findings)
}

async fn run_path(
    module: &Module,
    base_url: &str,
    path: &str,
    client: &HttpClient,
) -> Result<Finding, ScanError> {
    let request = HttpRequest::from_module(module, base_url, path)?;
    debug!("{} {} ({})", request.method, request.target, module.name);

    let response = client.send_request(&request).await?;
    matcher::evaluate(module, &response)
}
