use std::net::IpAddr;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use dutylink_transport::DEFAULT_PORT;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod console;
pub mod get;
pub mod plan;
pub mod serve;
pub mod set;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a motor node.
    Serve(ServeArgs),
    /// Print a node's current duty.
    Get(GetArgs),
    /// Fade a node to a new duty.
    Set(SetArgs),
    /// Show how a transition would be executed, without a node.
    Plan(PlanArgs),
    /// Interactive operator console.
    Console(ConsoleArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Get(args) => get::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Plan(args) => plan::run(args, format),
        Command::Console(args) => console::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DriverKind {
    /// In-memory driver that logs fades.
    Sim,
    /// Raspberry Pi hardware PWM (PWM0 positive, PWM1 negative).
    Rpi,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "DUTYLINK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Port to listen on.
    #[arg(long, short = 'p', env = "DUTYLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Minimum fade time per percent of duty change.
    #[arg(long, env = "DUTYLINK_MIN_MS_PER_PERCENT", default_value_t = dutylink_motor::MIN_MS_PER_PERCENT)]
    pub min_ms_per_percent: u32,
    /// PWM driver backing the motor.
    #[arg(long, value_enum, default_value_t = DriverKind::Sim)]
    pub driver: DriverKind,
    /// Complete simulated fades immediately instead of waiting them out.
    #[arg(long)]
    pub instant: bool,
    /// Leave TCP keep-alive off on accepted connections.
    #[arg(long)]
    pub no_keepalive: bool,
}

/// Where to reach a node.
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    /// Node host name or address.
    pub host: String,
    /// Node port.
    #[arg(long, short = 'p', env = "DUTYLINK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// How long to wait for a reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl NodeArgs {
    /// `host:port`, bracketing bare IPv6 literals.
    pub fn label(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub node: NodeArgs,
    /// Target duty in percent, -100..=100.
    #[arg(allow_negative_numbers = true)]
    pub duty: i64,
    /// Requested fade time in milliseconds.
    #[arg(long, short = 'f', default_value_t = 0)]
    pub fade: u32,
    /// Minimum fade rate the node enforces; sizes the confirm timeout.
    #[arg(long, env = "DUTYLINK_MIN_MS_PER_PERCENT", default_value_t = dutylink_motor::MIN_MS_PER_PERCENT)]
    pub min_ms_per_percent: u32,
    /// Do not query the node after sending.
    #[arg(long)]
    pub no_confirm: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Starting duty in percent.
    #[arg(allow_negative_numbers = true)]
    pub from: i64,
    /// Target duty in percent.
    #[arg(allow_negative_numbers = true)]
    pub to: i64,
    /// Requested fade time in milliseconds.
    #[arg(long, short = 'f', default_value_t = 0)]
    pub fade: u32,
    /// Minimum fade time per percent of duty change.
    #[arg(long, env = "DUTYLINK_MIN_MS_PER_PERCENT", default_value_t = dutylink_motor::MIN_MS_PER_PERCENT)]
    pub min_ms_per_percent: u32,
}

#[derive(Args, Debug)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_label_brackets_ipv6() {
        let node = |host: &str| NodeArgs {
            host: host.to_string(),
            port: 3333,
            timeout: "5s".to_string(),
        };
        assert_eq!(node("motor.local").label(), "motor.local:3333");
        assert_eq!(node("::1").label(), "[::1]:3333");
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
