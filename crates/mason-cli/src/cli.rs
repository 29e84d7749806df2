//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// SQLMason - compile templated SQL models into a dependency graph and run
/// them against a warehouse
#[derive(Parser, Debug)]
#[command(name = "mason")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Target profile to load from profiles.yml
    #[arg(long, global = true, default_value = "default")]
    pub profile: String,

    /// Number of worker threads for execution
    #[arg(long, global = true, default_value_t = 1)]
    pub threads: usize,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile every node to runnable SQL under target/compiled
    Compile(CompileArgs),

    /// List nodes in dependency order
    Ls(LsArgs),

    /// Execute models and archives against the configured warehouse
    Run(RunArgs),

    /// Run schema and data tests
    Test(TestArgs),
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: LsOutput,
}

/// List output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsOutput {
    /// One node per line with its dependencies
    Table,
    /// Full node records as JSON
    Json,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// List what would run, in order, without executing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the test command
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Run only schema tests
    #[arg(long)]
    pub schema: bool,

    /// Run only data tests
    #[arg(long)]
    pub data: bool,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
