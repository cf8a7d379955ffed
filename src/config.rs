use anyhow::{bail, Result};
use std::fmt;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::logger::Level;

/// Soft limit on the number of honeypotted ports. Each port costs one open
/// file descriptor and one entry in the readiness set; anything past this is
/// almost certainly a typo in the invocation.
pub const MAX_PORTS: usize = 50;

/// Listen backlog handed to the OS for every honeypot socket. Pending
/// connections past this queue are the kernel's problem, not ours.
pub const DEFAULT_BACKLOG: i32 = 50;

/// Address family applied to every listener in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => write!(f, "IPv4"),
            Family::V6 => write!(f, "IPv6"),
        }
    }
}

/// Process configuration, constructed once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct Config {
    pub ports: Vec<u16>,
    pub family: Family,
    pub backlog: i32,
    pub log_file: Option<PathBuf>,
    pub log_level: Level,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            ports: cli.ports,
            family: if cli.ipv6 { Family::V6 } else { Family::V4 },
            backlog: DEFAULT_BACKLOG,
            log_file: cli.log_file,
            log_level: cli.log_level,
        }
    }
}

impl Config {
    /// Validate configuration before any socket is created.
    ///
    /// The CLI layer already rejects most of this, but the config is also
    /// constructible programmatically and the checks are cheap.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            bail!("missing port number; at least one port is required");
        }
        if self.ports.len() > MAX_PORTS {
            bail!(
                "too many ports; you must specify at most {} ports",
                MAX_PORTS
            );
        }
        if self.ports.contains(&0) {
            bail!("port 0 is outside the valid range 1-65535");
        }
        Ok(())
    }
}
