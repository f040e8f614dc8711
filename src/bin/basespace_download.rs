use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use basespace_download::api::{AccessToken, BaseSpaceHttpClient};
use basespace_download::app::{App, DownloadOptions};
use basespace_download::config::{ConfigLoader, ConfigOverrides};
use basespace_download::domain::DownloadRequest;
use basespace_download::error::{BsError, ErrorKind};
use basespace_download::output::{JsonOutput, OutputMode, TerminalOutput};

#[derive(Parser)]
#[command(name = "basespace-download")]
#[command(about = "Download every file of a BaseSpace sample or project")]
#[command(version)]
struct Cli {
    #[arg(short = 't', long, env = "BASESPACE_APP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(short = 's', long, value_name = "ID")]
    sample: Option<String>,

    #[arg(short = 'p', long, value_name = "ID")]
    project: Option<String>,

    #[arg(long, visible_alias = "dr")]
    dry_run: bool,

    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<Utf8PathBuf>,

    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    #[arg(long, value_name = "N")]
    retries: Option<usize>,

    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<BsError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BsError) -> u8 {
    match error.kind() {
        ErrorKind::Usage => 2,
        ErrorKind::Fetch => 3,
        ErrorKind::Decode => 4,
        ErrorKind::Io | ErrorKind::Cancelled => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let request = DownloadRequest::from_selection(cli.sample.as_deref(), cli.project.as_deref())?;
    let token = AccessToken::new(cli.token.unwrap_or_default())?;
    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        ConfigOverrides {
            api_url: cli.api_url,
            max_retries: cli.retries,
            output_dir: cli.output_dir,
        },
    )?;

    let client = BaseSpaceHttpClient::new(token, &config)?;
    let app = App::new(client, config.output_dir.clone());
    let options = DownloadOptions {
        dry_run: cli.dry_run,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(&request, options, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let sink = TerminalOutput::new();
            app.run(&request, options, &sink)?;
        }
    }
    Ok(())
}
