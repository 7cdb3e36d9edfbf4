// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::HttpRuntime;
use simwatch_app::{JobId, Session, SimulationStatus};
use simwatch_client::Client;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `simwatch --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    if options.jobs.is_empty() {
        bail!("no simulation ids given; pass one or more ids, for example `simwatch 12 13`");
    }

    let base_url = options.base_url.as_deref().unwrap_or(config.base_url());
    let client = Client::new(base_url, config.timeout()?).with_context(|| {
        format!(
            "invalid server settings in {}; fix [server].base_url or pass --url",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        let statuses = client.fetch_statuses(true, &options.jobs)?;
        print!("{}", check_report(client.base_url(), &statuses));
        return Ok(());
    }

    let _log_guard = logging::init(&config)?;
    tracing::info!(
        base_url = client.base_url(),
        jobs = options.jobs.len(),
        "starting dashboard"
    );

    let page_size = options.page_size.unwrap_or_else(|| config.page_size());
    let mut session = Session::new(options.jobs, config.poll_policy()?, page_size);
    let mut runtime = HttpRuntime::new(client);
    let result = simwatch_tui::run_app(&mut session, &mut runtime);
    tracing::info!(ok = result.is_ok(), "dashboard closed");
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    base_url: Option<String>,
    page_size: Option<usize>,
    jobs: Vec<JobId>,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        base_url: None,
        page_size: None,
        jobs: Vec::new(),
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--url requires a server or page URL"))?;
                options.base_url = Some(value.as_ref().to_owned());
            }
            "--page-size" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--page-size requires a number"))?;
                let size = value
                    .as_ref()
                    .parse::<usize>()
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| {
                        anyhow!(
                            "--page-size must be a positive number, got {:?}",
                            value.as_ref()
                        )
                    })?;
                options.page_size = Some(size);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown if unknown.starts_with('-') => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
            ids => {
                for raw in ids.split(',').filter(|raw| !raw.trim().is_empty()) {
                    let job = JobId::parse(raw).ok_or_else(|| {
                        anyhow!("invalid simulation id {raw:?}; ids are positive integers")
                    })?;
                    if !options.jobs.contains(&job) {
                        options.jobs.push(job);
                    }
                }
            }
        }
    }

    Ok(options)
}

fn check_report(base_url: &str, statuses: &[SimulationStatus]) -> String {
    let mut report = format!("server {base_url} answered for {} job(s)\n", statuses.len());
    for status in statuses {
        report.push_str(&format!(
            "{:>8}  {:<8}  {}\n",
            status.id.get(),
            status.status.as_str(),
            status.progress_text
        ));
    }
    report
}

fn print_help() {
    println!("simwatch: watch cardiac simulation jobs and plot their results");
    println!("usage: simwatch [options] <id>[,<id>...] [<id>...]");
    println!("  --config <path>          Use a specific config path");
    println!("  --url <url>              Server root or any page URL under it");
    println!("  --page-size <n>          Jobs per page (overrides [ui].page_size)");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and query job statuses once");
    println!("  --help                   Show this help");
}
