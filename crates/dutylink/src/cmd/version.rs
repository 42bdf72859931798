use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("dutylink {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!(
        "target: {}",
        option_env!("DUTYLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("DUTYLINK_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("protocol: text, port {}", dutylink_transport::DEFAULT_PORT);
    println!("max_frame_size: {}", dutylink_frame::MAX_FRAME_SIZE);
    println!(
        "min_ms_per_percent: {}",
        dutylink_motor::MIN_MS_PER_PERCENT
    );
    println!("drivers: sim{}", if cfg!(feature = "rpi") { ", rpi" } else { "" });

    Ok(SUCCESS)
}
