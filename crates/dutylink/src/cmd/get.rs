use std::time::Duration;

use dutylink_node::{connect_with_config, ClientConfig, MotorClient};

use crate::cmd::{parse_duration, GetArgs, NodeArgs};
use crate::exit::{node_error, CliResult, SUCCESS};
use crate::output::{print_duty, OutputFormat};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = open(&args.node, Some(Duration::ZERO))?;
    let duty = client
        .get_duty()
        .map_err(|err| node_error("get failed", err))?;

    print_duty(&args.node.label(), duty, format);
    Ok(SUCCESS)
}

/// Connect to the node named by `args`.
///
/// `fade_allowance` extends the reply timeout for gets queued behind a fade;
/// `None` waits for replies without a limit.
pub fn open(args: &NodeArgs, fade_allowance: Option<Duration>) -> CliResult<MotorClient> {
    let timeout = parse_duration(&args.timeout)?;
    let config = ClientConfig {
        response_timeout: fade_allowance.map(|extra| timeout + extra),
        write_timeout: Some(timeout),
    };
    let label = args.label();
    connect_with_config(label.as_str(), &config)
        .map_err(|err| node_error(&format!("connect to {label} failed"), err))
}
