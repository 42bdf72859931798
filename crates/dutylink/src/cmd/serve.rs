use std::net::SocketAddr;

use dutylink_motor::{ControllerConfig, DutyController, PwmChannelDriver, SimulatedDriver};
use dutylink_node::{MotorServer, ServerConfig, ShutdownHandle};
use dutylink_transport::KeepaliveConfig;
use tracing::info;

use crate::cmd::{DriverKind, ServeArgs};
use crate::exit::{node_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

type BoxedDriver = Box<dyn PwmChannelDriver>;

pub fn run(args: ServeArgs) -> CliResult<i32> {
    if args.min_ms_per_percent == 0 {
        return Err(CliError::new(USAGE, "--min-ms-per-percent must be at least 1"));
    }

    let controller_config = ControllerConfig {
        min_ms_per_percent: args.min_ms_per_percent,
        ..ControllerConfig::default()
    };
    let driver = open_driver(args.driver, args.instant)?;
    let controller = DutyController::with_config(driver, controller_config);

    let config = ServerConfig {
        bind: SocketAddr::new(args.bind, args.port),
        keepalive: KeepaliveConfig {
            enabled: !args.no_keepalive,
            ..KeepaliveConfig::default()
        },
        ..ServerConfig::default()
    };

    let mut server =
        MotorServer::with_config(config, controller).map_err(|err| node_error("bind failed", err))?;
    install_ctrlc_handler(server.shutdown_handle())?;

    info!(
        addr = %server.local_addr(),
        driver = ?args.driver,
        min_ms_per_percent = args.min_ms_per_percent,
        "motor node ready"
    );

    server.serve().map_err(|err| node_error("serve failed", err))?;
    Ok(SUCCESS)
}

fn open_driver(kind: DriverKind, instant: bool) -> CliResult<BoxedDriver> {
    match kind {
        DriverKind::Sim => Ok(Box::new(SimulatedDriver::new().with_realtime(!instant))),
        DriverKind::Rpi => open_rpi_driver(),
    }
}

#[cfg(feature = "rpi")]
fn open_rpi_driver() -> CliResult<BoxedDriver> {
    let driver = dutylink_motor::RppalDriver::with_default_channels()
        .map_err(|err| crate::exit::driver_error("pwm setup failed", err))?;
    Ok(Box::new(driver))
}

#[cfg(not(feature = "rpi"))]
fn open_rpi_driver() -> CliResult<BoxedDriver> {
    Err(CliError::new(
        USAGE,
        "this build has no Raspberry Pi support; rebuild with --features rpi",
    ))
}

fn install_ctrlc_handler(shutdown: ShutdownHandle) -> CliResult<()> {
    ctrlc::set_handler(move || shutdown.trigger()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
