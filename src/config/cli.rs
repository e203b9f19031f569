//! Command-line argument definitions for towerline.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for towerline.
#[derive(Debug, Parser)]
#[command(name = "towerline")]
#[command(
    author,
    version,
    about = "Launch and follow automation Controller jobs from a build pipeline"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Name of the Controller server definition to use.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Credentials identifier overriding the server's configured one.
    #[arg(long, global = true)]
    pub credentials: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch a job, workflow or slice template and follow it.
    Run(RunArgs),

    /// Update a project from source control and follow the update.
    Sync(SyncArgs),

    /// Change the source control branch or revision of a project.
    Revision(RevisionArgs),

    /// Check that the configured server and credentials work.
    TestConnection,
}

/// Output handling shared by the following subcommands.
#[derive(Debug, Clone, Default, Args)]
pub struct OutputArgs {
    /// Stream job output while waiting.
    #[arg(long)]
    pub import_logs: bool,

    /// Keep ANSI colour sequences in streamed output.
    #[arg(long)]
    pub keep_color: bool,

    /// Return as soon as the Controller accepts the request.
    #[arg(long = "async")]
    pub detach: bool,

    /// Print progress messages as well as job output.
    #[arg(long)]
    pub verbose: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Template name or numeric identifier.
    #[arg(long, required = true)]
    pub template: String,

    /// Template type: job, workflow or slice.
    #[arg(long, default_value = "job")]
    pub template_type: String,

    /// Extra variables in YAML or JSON form.
    #[arg(long)]
    pub extra_vars: Option<String>,

    /// Host pattern limiting the run.
    #[arg(long)]
    pub limit: Option<String>,

    /// Tags to run.
    #[arg(long)]
    pub job_tags: Option<String>,

    /// Tags to skip.
    #[arg(long)]
    pub skip_job_tags: Option<String>,

    /// Job type, `run` or `check`.
    #[arg(long)]
    pub job_type: Option<String>,

    /// Inventory name or numeric identifier.
    #[arg(long)]
    pub inventory: Option<String>,

    /// Comma-separated credential names or identifiers.
    #[arg(long)]
    pub credential: Option<String>,

    /// Source control branch to run from.
    #[arg(long)]
    pub scm_branch: Option<String>,

    /// Stream the output of each workflow child job.
    #[arg(long)]
    pub workflow_child_logs: bool,

    /// Prefer task result messages over raw event output.
    #[arg(long)]
    pub full_logs: bool,

    /// Output handling.
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `sync` subcommand.
#[derive(Debug, Parser)]
pub struct SyncArgs {
    /// Project name or numeric identifier.
    #[arg(long, required = true)]
    pub project: String,

    /// Output handling.
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments for the `revision` subcommand.
#[derive(Debug, Parser)]
pub struct RevisionArgs {
    /// Project name or numeric identifier.
    #[arg(long, required = true)]
    pub project: String,

    /// Branch, tag or commit to record on the project.
    #[arg(long, required = true)]
    pub revision: String,

    /// Print progress messages.
    #[arg(long)]
    pub verbose: bool,
}
