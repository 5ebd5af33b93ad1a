use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::core::runner::run_module;
use crate::core::semaphore::SlotPool;
use crate::core::Finding;
use crate::http::HttpClient;
use crate::module::Module;

/// Dispatches every (module, target URL) pair as its own task.
///
/// At most `concurrency` pairs run at a time. Modules and the client are
/// shared read-only; findings leave through the channel handed to each call.
pub struct Scanner {
    modules: Vec<Arc<Module>>,
    client: Arc<HttpClient>,
    pool: SlotPool,
}

impl Scanner {
    pub fn new(modules: Vec<Module>, client: Arc<HttpClient>, concurrency: usize) -> Self {
        Self {
            modules: modules.into_iter().map(Arc::new).collect(),
            client,
            pool: SlotPool::new(concurrency),
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn concurrency(&self) -> usize {
        self.pool.capacity()
    }

    /// Starts one task per module against `base_url` and returns once all of
    /// them have been dispatched, not once they finish.
    ///
    /// A unit that fails reports nothing: findings gathered before the
    /// failure are dropped along with it.
    pub async fn scan_target(&self, base_url: &str, tx: &mpsc::Sender<Finding>) -> usize {
        for module in &self.modules {
            debug!("running {} against {}", module.file, base_url);

            let slot = self.pool.acquire().await;
            let module = Arc::clone(module);
            let client = Arc::clone(&self.client);
            let base_url = base_url.to_string();
            let tx = tx.clone();

            tokio::spawn(async move {
                let _slot = slot;

                match run_module(&module, &base_url, &client).await {
                    Ok(findings) => {
                        for finding in findings {
                            let _ = tx.send(finding).await;
                        }
                    }
                    Err(e) => {
                        debug!("request error: {}", e);
                        if !e.findings.is_empty() {
                            debug!(
                                "discarding {} finding(s) from {} against {}",
                                e.findings.len(),
                                module.name,
                                base_url
                            );
                        }
                    }
                }
            });
        }

        self.modules.len()
    }

    /// Reads one base URL per line and scans each as soon as it is read.
    ///
    /// Lines are raw bytes; invalid UTF-8 is replaced rather than rejected,
    /// and blank lines are skipped. Returns after the input ends and every
    /// dispatched unit has finished, with the number of units run. A read
    /// error stops the input but is only returned once that drain is done.
    pub async fn scan_lines<R>(
        &self,
        mut reader: R,
        tx: mpsc::Sender<Finding>,
    ) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut buf = Vec::new();
        let mut dispatched = 0;
        let mut read_error = None;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("stopped reading targets: {}", e);
                    read_error = Some(e);
                    break;
                }
            }

            let line = String::from_utf8_lossy(&buf);
            let base_url = line.trim();
            if base_url.is_empty() {
                continue;
            }
            dispatched += self.scan_target(base_url, &tx).await;
        }

        self.wait().await;
        match read_error {
            Some(e) => Err(e),
            None => Ok(dispatched),
        }
    }

    /// Blocks until every dispatched unit has completed.
    pub async fn wait(&self) {
        self.pool.wait().await;
    }
}
