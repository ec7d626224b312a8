use std::str::FromStr;
use std::time::Duration;

use clap::Parser;

/// `schedula` -- a deferred HTTP callback scheduler.
#[derive(Parser, Debug)]
#[command(name = "schedula", version, about = "A deferred HTTP callback scheduler")]
pub struct Cli {
    /// Bind address for the admission API, metrics, and health routes.
    #[arg(short = 'b', long = "bind", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port.
    #[arg(short = 'p', long = "port", default_value_t = 8080)]
    pub port: u16,

    /// Workers per destination host.
    #[arg(short = 'w', long = "workers-per-host", default_value_t = 5)]
    pub workers_per_host: usize,

    /// Repository backend. Only "in-memory" is implemented.
    #[arg(long = "repo-type", default_value = "in-memory")]
    pub repo_type: String,

    /// Scheduler backend. Only "ticker" is implemented.
    #[arg(long = "sched-type", default_value = "ticker")]
    pub sched_type: String,

    /// Per-attempt executor timeout, e.g. "5s", "500ms".
    #[arg(long = "timeout", default_value = "5s")]
    pub timeout: CliDuration,
}

impl Cli {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A `Duration` parsed from a human-readable CLI flag (`"5s"`, `"500ms"`),
/// the CLI-flag counterpart to how `hook_worker::config::EnvMsDuration`
/// parses a millisecond count from an environment variable -- a flag is
/// read by humans more than an env var is, so this accepts units instead.
#[derive(Debug, Clone, Copy)]
pub struct CliDuration(pub Duration);

impl FromStr for CliDuration {
    type Err = humantime::DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        humantime::parse_duration(s).map(CliDuration)
    }
}
