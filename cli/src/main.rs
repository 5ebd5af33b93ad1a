use clap::Parser;
use colored::*;
use log::info;
use std::path::Path;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};

use ugly_duckling_core::{
    discover_modules, load_modules, run_scan, ConsoleSink, ResultAggregator, ScanConfig,
    DEFAULT_MODULE_DIR,
};

#[derive(Parser, Debug)]
#[command(
    name = "ugly-duckling",
    version,
    about = "Run vulnerability detection modules against URLs provided on stdin",
    override_usage = "ugly-duckling [options] [<modulepaths>]",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  All modules in ./modules:       cat urls.txt | ugly-duckling
  Specific modules, 20 workers:   cat urls.txt | ugly-duckling -c 20 modules/git.json modules/env.json
  Through Burp:                   cat urls.txt | ugly-duckling --proxy http://127.0.0.1:8080
  Save hits as JSON lines:        cat urls.txt | ugly-duckling -o hits.jsonl"
)]
pub struct Args {
    #[arg(help = "Module files to load (default: modules/*.json)")]
    pub modules: Vec<String>,

    #[arg(short = 'c', long, default_value_t = 1, help = "Concurrency level")]
    pub concurrency: usize,

    #[arg(short = 'v', long, default_value_t = false, help = "Print debug messages etc")]
    pub verbose: bool,

    #[arg(long, default_value_t = 10, help = "Request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, help = "Proxy URL (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(long, default_value_t = false, help = "Reuse connections between requests")]
    pub keep_alive: bool,

    #[arg(short = 'o', long, help = "Append hits to this file as JSON lines")]
    pub output: Option<String>,

    #[arg(long, help = "List what would be run without sending requests")]
    pub dry_run: bool,
}

impl Args {
    fn to_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency,
            verbose: self.verbose,
            timeout: self.timeout,
            proxy: self.proxy.clone().unwrap_or_default(),
            keep_alive: self.keep_alive,
            output: self.output.clone().unwrap_or_default(),
            module_paths: self.modules.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    init_logger(args.verbose);

    if let Err(e) = run(&args).await {
        eprintln!("{}", format!("[!] {:#}", e).red());
        process::exit(1);
    }
}

/// `-v` turns on debug output for this tool only; RUST_LOG overrides it.
fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = format!("warn,ugly_duckling={0},ugly_duckling_core={0}", level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let config = args.to_config();

    let files = discover_modules(&config.module_paths, Path::new(DEFAULT_MODULE_DIR))?;
    let modules = load_modules(&files);
    if modules.is_empty() {
        anyhow::bail!("no modules loaded");
    }
    info!("{} module(s) loaded, concurrency {}", modules.len(), config.concurrency);

    let mut stdin = BufReader::new(tokio::io::stdin());

    if args.dry_run {
        let mut buf = Vec::new();
        while stdin.read_until(b'\n', &mut buf).await? > 0 {
            let line = String::from_utf8_lossy(&buf).into_owned();
            buf.clear();
            let target = line.trim();
            if target.is_empty() {
                continue;
            }
            for module in &modules {
                println!("[DRY RUN] Would run {} against {}", module.name, target);
            }
        }
        return Ok(());
    }

    let sink = ConsoleSink::new_ref();
    let hits = run_scan(&config, modules, stdin, sink.clone()).await?;

    if config.verbose {
        ResultAggregator::report_summary(&hits, &sink);
    }

    Ok(())
}
