use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dutylink_frame::FrameConfig;
use dutylink_motor::{Duty, DutyController, PwmChannelDriver};
use dutylink_transport::{KeepaliveConfig, LinkStream, TcpTransport, DEFAULT_PORT};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::handler::{ConnectionHandler, SessionSummary};

/// Server-side configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address. Default: `0.0.0.0:3333`.
    pub bind: SocketAddr,
    pub keepalive: KeepaliveConfig,
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            keepalive: KeepaliveConfig::default(),
            frame: FrameConfig::default(),
        }
    }
}

/// Serves one client at a time against a single motor.
///
/// The controller outlives every connection, so the duty left by the closing
/// stop is what the next client observes.
pub struct MotorServer<D> {
    transport: TcpTransport,
    controller: DutyController<D>,
    frame_config: FrameConfig,
    shutdown: ShutdownHandle,
    sessions: u64,
}

impl<D: PwmChannelDriver> MotorServer<D> {
    /// Bind with default configuration on `addr`.
    pub fn bind(addr: SocketAddr, controller: DutyController<D>) -> Result<Self> {
        Self::with_config(
            ServerConfig {
                bind: addr,
                ..ServerConfig::default()
            },
            controller,
        )
    }

    pub fn with_config(config: ServerConfig, controller: DutyController<D>) -> Result<Self> {
        let transport = TcpTransport::bind(config.bind)?.with_keepalive(config.keepalive);
        let shutdown = ShutdownHandle::new(transport.local_addr());
        Ok(Self {
            transport,
            controller,
            frame_config: config.frame,
            shutdown,
            sessions: 0,
        })
    }

    /// Accept one client and serve it until it disconnects.
    pub fn serve_one(&mut self) -> Result<SessionSummary> {
        let stream = self.transport.accept()?;
        self.serve_stream(stream)
    }

    /// Serve clients one after another until [`ShutdownHandle::trigger`].
    ///
    /// Returns the number of sessions served.
    pub fn serve(&mut self) -> Result<u64> {
        while !self.shutdown.is_triggered() {
            let stream = match self.transport.accept() {
                Ok(stream) => stream,
                Err(err) if self.shutdown.is_triggered() => {
                    debug!(error = %err, "accept interrupted by shutdown");
                    break;
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                    return Err(err.into());
                }
            };
            if self.shutdown.is_triggered() {
                stream.shutdown();
                break;
            }
            match self.serve_stream(stream) {
                Ok(summary) => {
                    debug!(peer = ?summary.peer, stats = ?summary.stats, "session finished")
                }
                Err(err) => warn!(error = %err, "session setup failed; still accepting"),
            }
        }

        info!(sessions = self.sessions, "server stopped");
        Ok(self.sessions)
    }

    fn serve_stream(&mut self, stream: LinkStream) -> Result<SessionSummary> {
        let peer = stream.peer_addr();
        self.sessions += 1;
        info!(%peer, session = self.sessions, "client connected");

        self.shutdown.track(&stream);
        let summary = ConnectionHandler::for_link(stream, &self.frame_config, &mut self.controller)
            .map(|handler| handler.run());
        if summary.is_err() {
            // The handler never ran, so its closing stop did not either.
            if let Err(fault) = self.controller.apply(Duty::ZERO, 0) {
                warn!(error = %fault, "failed to stop motor after setup failure");
            }
        }
        self.shutdown.untrack();
        summary
    }

    /// Handle that stops [`MotorServer::serve`] from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn controller(&self) -> &DutyController<D> {
        &self.controller
    }

    /// Number of clients accepted so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    pub fn into_controller(self) -> DutyController<D> {
        self.controller
    }
}

/// Stops a running server.
///
/// Triggering closes the active connection, which stops the motor through
/// the normal disconnect path, then wakes the blocked accept.
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    active: Arc<Mutex<Option<LinkStream>>>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    fn new(local_addr: SocketAddr) -> Self {
        let wake_ip = match local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(None)),
            wake_addr: SocketAddr::new(wake_ip, local_addr.port()),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutdown requested");

        if let Ok(mut active) = self.active.lock() {
            if let Some(stream) = active.take() {
                stream.shutdown();
            }
        }
        if let Err(err) = TcpTransport::connect(self.wake_addr) {
            debug!(error = %err, "wake connection failed");
        }
    }

    fn track(&self, stream: &LinkStream) {
        let clone = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                warn!(error = %err, "session cannot be interrupted by shutdown");
                return;
            }
        };
        if let Ok(mut active) = self.active.lock() {
            *active = Some(clone);
        }
        // A trigger that raced the accept must still end this session.
        if self.is_triggered() {
            stream.shutdown();
        }
    }

    fn untrack(&self) {
        if let Ok(mut active) = self.active.lock() {
            active.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use dutylink_motor::SimulatedDriver;

    use super::*;
    use crate::connector::connect;
    use crate::handler::CloseReason;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn server() -> MotorServer<SimulatedDriver> {
        MotorServer::bind(loopback(), DutyController::new(SimulatedDriver::new()))
            .expect("server should bind")
    }

    #[test]
    fn serves_get_and_set() {
        let mut server = server();
        let addr = server.local_addr();

        let client = thread::spawn(move || {
            let mut client = connect(addr).expect("client should connect");
            client
                .set_duty(Duty::new(40).unwrap(), 0)
                .expect("set should send");
            client.get_duty().expect("get should answer")
        });

        let summary = server.serve_one().expect("session should run");
        assert_eq!(client.join().unwrap(), Duty::new(40).unwrap());
        assert_eq!(summary.close_reason, CloseReason::PeerClosed);
        assert_eq!(summary.stats.sets, 1);
        assert_eq!(summary.stats.gets, 1);
        assert_eq!(server.controller().query(), Duty::ZERO);
    }

    #[test]
    fn duty_persists_until_disconnect_only() {
        let mut server = server();
        let addr = server.local_addr();

        let clients = thread::spawn(move || {
            let mut first = connect(addr).expect("first client should connect");
            first.set_duty(Duty::new(-70).unwrap(), 0).unwrap();
            assert_eq!(first.get_duty().unwrap().percent(), -70);
            drop(first);

            let mut second = connect(addr).expect("second client should connect");
            second.get_duty().unwrap()
        });

        server.serve_one().expect("first session should run");
        server.serve_one().expect("second session should run");
        assert_eq!(clients.join().unwrap(), Duty::ZERO);
        assert_eq!(server.sessions(), 2);

        // set, stop, then the second client's stop
        let driver = server.into_controller().into_driver();
        assert_eq!(driver.completed_fades(), 3);
    }

    #[test]
    fn accepted_connections_have_keepalive() {
        let transport = TcpTransport::bind(loopback()).unwrap();
        let addr = transport.local_addr();
        let connector = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let stream = transport.accept().unwrap();
        let _client = connector.join().unwrap();

        #[cfg(unix)]
        assert_eq!(stream.keepalive_enabled(), Some(true));
        #[cfg(not(unix))]
        let _ = stream;
    }

    #[test]
    fn shutdown_ends_active_session_and_loop() {
        let mut server = server();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();

        let runner = thread::spawn(move || {
            let served = server.serve().expect("serve should stop cleanly");
            (served, server.controller().query())
        });

        let mut client = connect(addr).expect("client should connect");
        client.set_duty(Duty::new(25).unwrap(), 0).unwrap();
        assert_eq!(client.get_duty().unwrap().percent(), 25);

        handle.trigger();
        let (served, duty) = runner.join().unwrap();
        assert_eq!(served, 1);
        assert_eq!(duty, Duty::ZERO);
    }

    #[test]
    fn setup_failure_stops_motor_and_keeps_serving() {
        let mut controller = DutyController::new(SimulatedDriver::new());
        controller.apply(Duty::new(30).unwrap(), 0).unwrap();
        let config = ServerConfig {
            bind: loopback(),
            // A zero read timeout is rejected by the socket, so setup fails.
            frame: FrameConfig {
                read_timeout: Some(Duration::ZERO),
                ..FrameConfig::default()
            },
            ..ServerConfig::default()
        };
        let mut server = MotorServer::with_config(config, controller).unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();

        let runner = thread::spawn(move || {
            let served = server.serve().expect("setup failure should not end serve");
            (served, server.controller().query())
        });

        let mut client = connect(addr).expect("client should connect");
        assert!(client.get_duty().is_err(), "failed session should be closed");

        handle.trigger();
        let (served, duty) = runner.join().unwrap();
        assert_eq!(served, 1);
        assert_eq!(duty, Duty::ZERO);
    }

    #[test]
    fn shutdown_while_idle() {
        let mut server = server();
        let handle = server.shutdown_handle();
        let runner = thread::spawn(move || server.serve().expect("serve should stop cleanly"));

        thread::sleep(Duration::from_millis(20));
        handle.trigger();
        assert_eq!(runner.join().unwrap(), 0);
    }
}
