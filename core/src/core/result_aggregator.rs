use std::fs::File;
use std::io::Write;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::core::Finding;
use crate::SinkRef;

/// Collects findings from the workers and reports them.
pub struct ResultAggregator;

impl ResultAggregator {
    /// Drains the channel until every sender is gone.
    ///
    /// Each finding, hit or not, goes to the sink. Hits are appended to
    /// `output_path` as JSON lines when given, and returned.
    pub async fn run(
        mut receiver: mpsc::Receiver<Finding>,
        sink: SinkRef,
        output_path: Option<&str>,
    ) -> Vec<Finding> {
        let mut file = match output_path.map(open_output).transpose() {
            Ok(f) => f,
            Err(e) => {
                sink.on_log("error", &format!("{:#}", e));
                None
            }
        };

        let mut hits = Vec::new();

        while let Some(finding) = receiver.recv().await {
            sink.on_finding(&finding);

            if !finding.hit {
                continue;
            }

            if let Some(ref mut f) = file {
                if let Err(e) = write_hit(f, &finding) {
                    sink.on_log("error", &format!("{:#}", e));
                }
            }

            hits.push(finding);
        }

        hits
    }

    pub fn report_summary(hits: &[Finding], sink: &SinkRef) {
        if hits.is_empty() {
            sink.on_log("info", "no findings");
        } else {
            sink.on_log("success", &format!("{} finding(s)", hits.len()));
        }
    }
}

fn write_hit<W: Write>(out: &mut W, finding: &Finding) -> anyhow::Result<()> {
    let line = serde_json::to_string(finding)
        .with_context(|| format!("failed to serialize finding for {}", finding.url))?;
    writeln!(out, "{}", line)
        .with_context(|| format!("failed to write finding for {}", finding.url))?;
    Ok(())
}

fn open_output(path: &str) -> anyhow::Result<File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open output file '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectingSink;
    use std::io;
    use std::sync::Arc;

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn finding(module: &str, hit: bool) -> Finding {
        Finding {
            module: module.to_string(),
            url: format!("http://example.com/{}", module),
            matches: usize::from(hit),
            hit,
            message: format!("{} at http://example.com/{}", module, module),
        }
    }

    #[tokio::test]
    async fn test_every_finding_reaches_sink_and_hits_are_returned() {
        let sink = Arc::new(CollectingSink::new());
        let (tx, rx) = mpsc::channel(8);

        tx.send(finding("a", true)).await.unwrap();
        tx.send(finding("b", false)).await.unwrap();
        tx.send(finding("c", true)).await.unwrap();
        drop(tx);

        let hits = ResultAggregator::run(rx, sink.clone(), None).await;
        assert_eq!(hits.len(), 2);
        assert_eq!(sink.findings().len(), 3);
        assert_eq!(sink.hits().len(), 2);
    }

    #[tokio::test]
    async fn test_hits_written_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hits.jsonl");
        let out_str = out.to_str().unwrap().to_string();

        let (tx, rx) = mpsc::channel(8);
        tx.send(finding("a", true)).await.unwrap();
        tx.send(finding("b", false)).await.unwrap();
        drop(tx);

        ResultAggregator::run(rx, Arc::new(CollectingSink::new()), Some(&out_str)).await;

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: Finding = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, finding("a", true));
    }

    #[tokio::test]
    async fn test_unwritable_output_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("missing").join("hits.jsonl");
        let bad_str = bad.to_str().unwrap().to_string();
        let sink = Arc::new(CollectingSink::new());

        let (tx, rx) = mpsc::channel(8);
        tx.send(finding("a", true)).await.unwrap();
        drop(tx);

        let hits = ResultAggregator::run(rx, sink.clone(), Some(&bad_str)).await;
        assert_eq!(hits.len(), 1);
        assert!(sink.logs().iter().any(|(level, _)| level == "error"));
    }

    #[test]
    fn test_write_hit_reports_write_failure() {
        let err = write_hit(&mut FullDisk, &finding("a", true)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to write finding for http://example.com/a"));
        assert!(message.contains("no space left on device"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_write_is_logged_and_hit_kept() {
        let sink = Arc::new(CollectingSink::new());
        let (tx, rx) = mpsc::channel(8);
        tx.send(finding("a", true)).await.unwrap();
        drop(tx);

        let hits = ResultAggregator::run(rx, sink.clone(), Some("/dev/full")).await;
        assert_eq!(hits.len(), 1);
        let logs = sink.logs();
        assert!(logs
            .iter()
            .any(|(level, msg)| level == "error" && msg.contains("failed to write finding")));
    }
}
