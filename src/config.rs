use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process settings. Every flag falls back to its `CLASSROOMD_*` variable,
/// and a `.env` file in the working directory is loaded before parsing.
#[derive(Debug, Parser, Clone)]
#[command(name = "classroomd", version, about = "Classroom gradebook sidecar")]
pub struct Config {
    /// Workspace directory opened at startup. Without it the client must send
    /// `workspace.select` first.
    #[arg(long, env = "CLASSROOMD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[arg(long, env = "CLASSROOMD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "CLASSROOMD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}
