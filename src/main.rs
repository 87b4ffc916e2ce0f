use clap::{Arg, ArgAction, ArgMatches, Command};
use l10n_ledger::config::PROJECT_FILE;
use l10n_ledger::{
    Config, Context, Driver, L10nError, Manager, ProjectConfig, PullOptions, PushOptions, Registry,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn cli() -> Command {
    let dryrun = Arg::new("dryrun")
        .long("dryrun")
        .help("Show what would happen without calling providers or writing anything")
        .action(ArgAction::SetTrue);

    Command::new("l10n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Continuous localization: push source strings to translation providers and pull results into the TM")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .short('l')
                .global(true)
                .help("Restrict to one target language"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("Project file (default: l10n.json in the current directory or an ancestor)"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .help("More logging (-vv for trace); RUST_LOG takes precedence")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("regression")
                .long("regression")
                .global(true)
                .help("Freeze the clock and derive job GUIDs deterministically")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("status").about("Translation progress per target language"))
        .subcommand(Command::new("jobs").about("Unfinished jobs per target language"))
        .subcommand(Command::new("analyze").about("Report parse issues and unreadable resources"))
        .subcommand(
            Command::new("push")
                .about("Send translation work to providers")
                .arg(
                    Arg::new("driver")
                        .long("driver")
                        .short('d')
                        .help("untranslated, source, tm or job:<guid>")
                        .default_value("untranslated"),
                )
                .arg(
                    Arg::new("leverage")
                        .long("leverage")
                        .help("Send repeated strings once")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("refresh")
                        .long("refresh")
                        .help("Refresh done jobs instead of pushing new work")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .short('p')
                        .help("Comma separated providers to use, in order")
                        .value_delimiter(','),
                )
                .arg(
                    Arg::new("instructions")
                        .long("instructions")
                        .short('i')
                        .help("Instructions passed along with the job"),
                )
                .arg(dryrun.clone()),
        )
        .subcommand(
            Command::new("job")
                .about("Inspect, resubmit or delete a job")
                .arg(
                    Arg::new("operation")
                        .help("req, res, pairs, push or delete")
                        .required(true)
                        .value_parser(["req", "res", "pairs", "push", "delete"])
                        .index(1),
                )
                .arg(
                    Arg::new("job-guid")
                        .long("job-guid")
                        .short('g')
                        .help("GUID of the job")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("pull")
                .about("Fetch results of pending jobs")
                .arg(
                    Arg::new("partial")
                        .long("partial")
                        .help("Merge translations delivered before the job completes")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("snap").about("Print every source TU"))
        .subcommand(
            Command::new("translate")
                .about("Generate target resources from the TM")
                .arg(dryrun),
        )
        .subcommand(Command::new("tmexport").about("Print translation memories"))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    // Logs go to stderr, stdout carries the JSON output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<Config, L10nError> {
    let path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => {
            let cwd = std::env::current_dir()?;
            ProjectConfig::find(&cwd).ok_or_else(|| {
                L10nError::Configuration(format!(
                    "No {} found in {} or its parents",
                    PROJECT_FILE,
                    cwd.display()
                ))
            })?
        }
    };
    let base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    debug!(config = %path.display(), base_dir = %base_dir.display(), "Loading project");

    let context = Context::new(base_dir).with_regression(matches.get_flag("regression"));
    ProjectConfig::load(&path)?.into_config(&Registry::with_builtins(), context)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: &str, sub: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Manager::new(load_config(sub)?);
    let lang = sub.get_one::<String>("lang").cloned();

    match command {
        "status" => print_json(&manager.status(lang.as_deref()).await?),
        "jobs" => print_json(&manager.jobs(lang.as_deref()).await?),
        "analyze" => print_json(&manager.analyze().await?),
        "push" => {
            let driver = sub
                .get_one::<String>("driver")
                .map(|d| d.parse::<Driver>())
                .transpose()?
                .unwrap_or_default();
            let options = PushOptions {
                lang,
                driver,
                leverage: sub.get_flag("leverage"),
                refresh: sub.get_flag("refresh"),
                providers: sub
                    .get_many::<String>("provider")
                    .map(|names| names.cloned().collect()),
                instructions: sub.get_one::<String>("instructions").cloned(),
                dryrun: sub.get_flag("dryrun"),
            };
            print_json(&manager.push(options).await?)
        }
        "job" => {
            let job_guid = sub
                .get_one::<String>("job-guid")
                .ok_or("Missing --job-guid")?;
            let operation = sub
                .get_one::<String>("operation")
                .map(String::as_str)
                .unwrap_or_default();
            match operation {
                "req" => print_json(&manager.job_request(job_guid).await?),
                "res" => print_json(&manager.job_response(job_guid).await?),
                "pairs" => print_json(&manager.job_pairs(job_guid).await?),
                "push" => print_json(&manager.job_push(job_guid).await?),
                "delete" => {
                    manager.job_delete(job_guid).await?;
                    print_json(&serde_json::json!({ "deleted": job_guid }))
                }
                other => Err(format!("Unknown job operation '{}'", other).into()),
            }
        }
        "pull" => {
            let options = PullOptions {
                lang,
                partial: sub.get_flag("partial"),
            };
            print_json(&manager.pull(options).await?)
        }
        "snap" => print_json(&manager.snap().await?),
        "translate" => {
            print_json(&manager.translate(lang.as_deref(), sub.get_flag("dryrun")).await?)
        }
        "tmexport" => print_json(&manager.tm_export(lang.as_deref()).await?),
        other => Err(format!("Unknown command '{}'", other).into()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    // Global options end up in the subcommand's matches wherever they were given
    let Some((command, sub)) = matches.subcommand() else {
        return ExitCode::FAILURE;
    };
    init_tracing(sub.get_count("verbose"));

    match run(command, sub).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
