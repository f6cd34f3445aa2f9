use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "musicdb",
    version,
    about = "Provision the music database, load its tables and write the report files",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    pub fn config_args(&self) -> &ConfigArgs {
        match &self.command {
            Some(Commands::Run(args)) => &args.config,
            Some(Commands::Status(args)) => &args.config,
            None => &self.run.config,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline (the default when no subcommand is given).
    Run(RunArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,

    /// JSON file overriding the default resource layout.
    #[arg(long = "config")]
    pub config_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long, value_enum, default_value_t = RunMode::Full)]
    pub mode: RunMode,

    #[arg(long, value_enum, default_value_t = FailurePolicy::Continue)]
    pub on_failure: FailurePolicy,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RunMode {
    Setup,
    Full,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Full => "full",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum FailurePolicy {
    Continue,
    HaltOnSetup,
    HaltOnAny,
}

impl FailurePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::HaltOnSetup => "halt-on-setup",
            Self::HaltOnAny => "halt-on-any",
        }
    }

    pub fn halts_after(self, setup_step: bool) -> bool {
        match self {
            Self::Continue => false,
            Self::HaltOnSetup => setup_step,
            Self::HaltOnAny => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Commands, FailurePolicy, RunMode};

    #[test]
    fn bare_invocation_runs_the_full_pipeline_in_the_current_directory() {
        let cli = Cli::try_parse_from(["musicdb"]).expect("no-argument invocation should parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.run.mode, RunMode::Full);
        assert_eq!(cli.run.on_failure, FailurePolicy::Continue);
        assert_eq!(cli.config_args().project_root.to_str(), Some("."));
    }

    #[test]
    fn status_subcommand_carries_its_own_config_args() {
        let cli = Cli::try_parse_from(["musicdb", "status", "--project-root", "/srv/music"])
            .expect("status invocation should parse");
        assert!(matches!(cli.command, Some(Commands::Status(_))));
        assert_eq!(cli.config_args().project_root.to_str(), Some("/srv/music"));
    }

    #[test]
    fn halt_policies_differ_on_operation_failures() {
        assert!(!FailurePolicy::Continue.halts_after(true));
        assert!(FailurePolicy::HaltOnSetup.halts_after(true));
        assert!(!FailurePolicy::HaltOnSetup.halts_after(false));
        assert!(FailurePolicy::HaltOnAny.halts_after(false));
    }
}
