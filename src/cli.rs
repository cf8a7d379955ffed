use clap::Parser;
use std::path::PathBuf;

use crate::logger::Level;

#[derive(Parser, Debug)]
#[command(name = "tcptrap")]
#[command(version)]
#[command(about = "Minimal TCP honeypot that logs and refuses connection attempts", long_about = None)]
pub struct Cli {
    #[arg(
        short = 'p',
        long = "port",
        value_name = "PORT",
        required = true,
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Listen on the specified port; may be given multiple times (up to 50 ports)"
    )]
    pub ports: Vec<u16>,

    #[arg(
        short = 'l',
        long = "log-file",
        value_name = "PATH",
        help = "Path to the log file; if omitted, log output goes to stderr"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        short = '4',
        long = "ipv4",
        conflicts_with = "ipv6",
        help = "Listen for IPv4 connections on any address; this is the default"
    )]
    pub ipv4: bool,

    #[arg(
        short = '6',
        long = "ipv6",
        help = "Listen for IPv6 connections on any address"
    )]
    pub ipv6: bool,

    #[arg(
        long = "log-level",
        value_enum,
        value_name = "LEVEL",
        default_value = "info",
        help = "Minimum severity to record"
    )]
    pub log_level: Level,
}
