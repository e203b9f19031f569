//! `towerline` application entry point.
//!
//! This binary launches and follows Controller jobs from a build pipeline. It
//! uses `eyre` for opaque error handling at the application boundary,
//! converting domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/towerline/config.toml` or path from `TOWERLINE_CONFIG_PATH`)
//! 3. Environment variables (`TOWERLINE_*`)
//! 4. Command-line arguments

use std::process::ExitCode;

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use mockable::DefaultEnv;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use towerline::config::{AppConfig, Cli, Commands, LogsConfig, OutputArgs, RunArgs, load_config};
use towerline::controller::LaunchParams;
use towerline::error::Result as TowerlineResult;
use towerline::secrets::ConfigCredentialProvider;
use towerline::session::{
    ControllerSession, EnvExpander, FollowOptions, LogSink, OperationReport, RunRequest,
    SyncRequest, connect,
};

/// Writes each emitted line to standard output.
struct StdoutSink;

impl LogSink for StdoutSink {
    fn emit(&mut self, lines: &[String]) {
        print_lines(lines);
    }
}

/// Application entry point.
///
/// Loads configuration with layered precedence via `OrthoConfig`, installs
/// the tracing subscriber, then dispatches to the subcommand on a Tokio
/// runtime. Ctrl-C cancels the running operation.
fn main() -> EyreResult<ExitCode> {
    let cli = Cli::parse();

    // Load configuration with layered precedence: defaults < file < env < CLI.
    let config = load_config(&cli).map_err(Report::from)?;
    init_tracing(&cli, &config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let success = runtime
        .block_on(run(&cli, &config))
        .map_err(Report::from)?;

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verbose(command: &Commands) -> bool {
    match command {
        Commands::Run(args) => args.output.verbose,
        Commands::Sync(args) => args.output.verbose,
        Commands::Revision(args) => args.verbose,
        Commands::TestConnection => false,
    }
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise a server with `debug = true` logs at
/// `debug`, `--verbose` at `info`, and everything else at `warn`.
fn init_tracing(cli: &Cli, config: &AppConfig) {
    let server_debug = config
        .server(cli.server.as_deref())
        .is_ok_and(|(_, server)| server.debug);
    let default_level = if server_debug {
        "debug"
    } else if verbose(&cli.command) {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute the CLI command, returning domain-specific errors.
///
/// Keeps semantic errors inside the run loop so the CLI boundary owns
/// conversion to `eyre::Report`. Returns whether the operation succeeded.
async fn run(cli: &Cli, config: &AppConfig) -> TowerlineResult<bool> {
    let provider = ConfigCredentialProvider::new(&config.credentials);
    let connection = connect(
        config,
        cli.server.as_deref(),
        cli.credentials.as_deref(),
        &provider,
    )
    .await?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let mut session = ControllerSession::new(
        connection,
        config.polling.clone(),
        StdoutSink,
        EnvExpander::new(DefaultEnv::new()),
    )
    .with_cancellation(token);

    match &cli.command {
        Commands::Run(args) => {
            let request = run_request(args, &config.logs);
            let report = session.run_template(&request).await?;
            Ok(print_report(&report))
        }
        Commands::Sync(args) => {
            let request = SyncRequest {
                project: args.project.clone(),
                follow: follow_options(&args.output, &config.logs, false, false),
            };
            let report = session.sync_project(&request).await?;
            Ok(print_report(&report))
        }
        Commands::Revision(args) => {
            let applied = session.update_revision(&args.project, &args.revision).await?;
            print_lines(&[format!("REVISION_UPDATED={applied}")]);
            Ok(applied)
        }
        Commands::TestConnection => {
            session.test_connection().await?;
            print_lines(&[String::from("Connection successful")]);
            Ok(true)
        }
    }
}

fn follow_options(
    output: &OutputArgs,
    logs: &LogsConfig,
    full_logs: bool,
    workflow_child_logs: bool,
) -> FollowOptions {
    FollowOptions {
        import_logs: output.import_logs || logs.import,
        remove_color: logs.remove_color && !output.keep_color,
        full_logs: full_logs || logs.full_logs,
        workflow_child_logs: workflow_child_logs || logs.workflow_child_logs,
        detach: output.detach,
    }
}

fn run_request(args: &RunArgs, logs: &LogsConfig) -> RunRequest {
    RunRequest {
        template: args.template.clone(),
        template_type: args.template_type.clone(),
        params: LaunchParams {
            extra_vars: args.extra_vars.clone(),
            limit: args.limit.clone(),
            job_tags: args.job_tags.clone(),
            skip_tags: args.skip_job_tags.clone(),
            job_type: args.job_type.clone(),
            inventory: args.inventory.clone(),
            credential: args.credential.clone(),
            scm_branch: args.scm_branch.clone(),
        },
        follow: follow_options(
            &args.output,
            logs,
            args.full_logs,
            args.workflow_child_logs,
        ),
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

/// Prints the result bag as `KEY=value` lines and reports success.
fn print_report(report: &OperationReport) -> bool {
    let lines: Vec<String> = report
        .results
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    print_lines(&lines);
    debug!(status = ?report.status, "operation finished");
    report.status.is_success()
}
