use dutylink_motor::{ControllerConfig, Duty, FadePlan};

use crate::cmd::PlanArgs;
use crate::exit::{motor_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_plan, OutputFormat};

pub fn run(args: PlanArgs, format: OutputFormat) -> CliResult<i32> {
    let plan = build(&args)?;
    print_plan(&plan, format);
    Ok(SUCCESS)
}

fn build(args: &PlanArgs) -> CliResult<FadePlan> {
    if args.min_ms_per_percent == 0 {
        return Err(CliError::new(USAGE, "--min-ms-per-percent must be at least 1"));
    }
    let from = Duty::new(args.from).map_err(|err| motor_error("invalid starting duty", err))?;
    let to = Duty::new(args.to).map_err(|err| motor_error("invalid target duty", err))?;
    let config = ControllerConfig {
        min_ms_per_percent: args.min_ms_per_percent,
        ..ControllerConfig::default()
    };
    Ok(FadePlan::compute(from, to, args.fade, &config))
}
