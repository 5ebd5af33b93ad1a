pub mod core;
pub mod error;
pub mod http;
pub mod module;

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;

pub use crate::core::engine::Scanner;
pub use crate::core::result_aggregator::ResultAggregator;
pub use crate::core::semaphore::{Slot, SlotPool};
pub use crate::core::Finding;
pub use crate::error::{Result, ScanError};
pub use crate::http::HttpClient;
pub use crate::module::loader::{discover_modules, load_module, load_modules, DEFAULT_MODULE_DIR};
pub use crate::module::Module;

/// Scan settings shared by the CLI and library callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub verbose: bool,
    pub timeout: u64,
    pub proxy: String,
    pub keep_alive: bool,
    pub output: String,
    pub module_paths: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            verbose: false,
            timeout: 10,
            proxy: String::new(),
            keep_alive: false,
            output: String::new(),
            module_paths: Vec::new(),
        }
    }
}

impl ScanConfig {
    pub fn proxy_ref(&self) -> Option<&str> {
        if self.proxy.is_empty() { None } else { Some(&self.proxy) }
    }

    pub fn output_ref(&self) -> Option<&str> {
        if self.output.is_empty() { None } else { Some(&self.output) }
    }

    pub fn build_client(&self) -> Result<HttpClient> {
        HttpClient::new(self.timeout, self.proxy_ref(), self.keep_alive)
    }
}

/// Output abstraction for the scan pipeline.
///
/// `on_finding` is called with every finding, hits and misses alike.
pub trait ScanEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_finding(&self, finding: &Finding);
}

pub type SinkRef = Arc<dyn ScanEventSink>;

/// Terminal sink: prints hits to stdout, log lines to stderr.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl ScanEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        let colored = match level {
            "success" => message.green().to_string(),
            "error" => message.red().to_string(),
            "warn" => message.yellow().to_string(),
            _ => message.to_string(),
        };
        eprintln!("{}", colored);
    }

    fn on_finding(&self, finding: &Finding) {
        use colored::*;
        if finding.hit {
            println!("finding: {}", finding.message.as_str().green().bold());
        }
    }
}

/// Keeps everything it is given, for callers that want the findings back
/// as a collection.
#[derive(Default)]
pub struct CollectingSink {
    findings: Mutex<Vec<Finding>>,
    logs: Mutex<Vec<(String, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn hits(&self) -> Vec<Finding> {
        self.findings().into_iter().filter(|f| f.hit).collect()
    }

    pub fn logs(&self) -> Vec<(String, String)> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl ScanEventSink for CollectingSink {
    fn on_log(&self, level: &str, message: &str) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push((level.to_string(), message.to_string()));
        }
    }

    fn on_finding(&self, finding: &Finding) {
        if let Ok(mut findings) = self.findings.lock() {
            findings.push(finding.clone());
        }
    }
}

/// Runs `modules` against every base URL read from `reader` and reports
/// through `sink`. Returns the hits once all work has drained.
pub async fn run_scan<R>(
    config: &ScanConfig,
    modules: Vec<Module>,
    reader: R,
    sink: SinkRef,
) -> anyhow::Result<Vec<Finding>>
where
    R: AsyncBufRead + Unpin,
{
    let client = Arc::new(config.build_client()?);
    let scanner = Scanner::new(modules, client, config.concurrency);
    let (tx, rx) = mpsc::channel::<Finding>(100);

    let (dispatched, hits) = tokio::join!(
        scanner.scan_lines(reader, tx),
        ResultAggregator::run(rx, Arc::clone(&sink), config.output_ref())
    );
    let dispatched = dispatched?;
    log::debug!("{} unit(s) completed", dispatched);

    Ok(hits)
}
