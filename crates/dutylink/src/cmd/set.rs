use std::time::Duration;

use dutylink_motor::Duty;
use tracing::warn;

use crate::cmd::{get, SetArgs};
use crate::exit::{motor_error, node_error, CliResult, SUCCESS};
use crate::output::{print_duty, OutputFormat};

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let target = Duty::new(args.duty).map_err(|err| motor_error("invalid duty", err))?;

    let allowance = fade_allowance(args.fade, args.min_ms_per_percent);
    let mut client = get::open(&args.node, Some(allowance))?;
    client
        .set_duty(target, args.fade)
        .map_err(|err| node_error("set failed", err))?;

    if args.no_confirm {
        return Ok(SUCCESS);
    }

    // Sets are not acknowledged and a get is only answered after the fade
    // completes, so this reports the duty the node actually reached.
    let applied = client
        .get_duty()
        .map_err(|err| node_error("confirm failed", err))?;
    if applied != target {
        warn!(requested = %target, applied = %applied, "node did not reach the requested duty");
    }

    print_duty(&args.node.label(), applied, format);
    Ok(SUCCESS)
}

/// Longest the confirm reply can wait on the fade: the requested time, or a
/// full -100 to 100 reversal at the node's minimum rate.
fn fade_allowance(fade_ms: u32, min_ms_per_percent: u32) -> Duration {
    let reversal = 200 * u64::from(min_ms_per_percent);
    Duration::from_millis(u64::from(fade_ms).max(reversal))
}
