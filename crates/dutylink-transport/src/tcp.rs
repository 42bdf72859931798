use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::LinkStream;

/// Port the node listens on by default.
pub const DEFAULT_PORT: u16 = 3333;

/// TCP keep-alive tuning applied to accepted connections.
///
/// Keep-alive is the only way a silently vanished client is noticed, since
/// reads carry no timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    /// Idle seconds before the first probe (Linux only).
    pub idle_secs: u32,
    /// Seconds between probes (Linux only).
    pub interval_secs: u32,
    /// Unanswered probes before the connection is dropped (Linux only).
    pub probes: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_secs: 5,
            interval_secs: 5,
            probes: 3,
        }
    }
}

/// TCP listener that hands out one [`LinkStream`] per accepted client.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    keepalive: KeepaliveConfig,
}

impl TcpTransport {
    /// Bind and listen on `addr`.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
            keepalive: KeepaliveConfig::default(),
        })
    }

    /// Override keep-alive tuning for subsequently accepted connections.
    pub fn with_keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        if self.keepalive.enabled {
            if let Err(source) = set_keepalive(&stream, &self.keepalive) {
                let err = TransportError::SocketOption { peer, source };
                warn!(error = %err, "keep-alive not applied");
            }
        }
        debug!(%peer, "accepted connection");
        Ok(LinkStream::from_tcp(stream, peer))
    }

    /// Connect to a node (blocking), trying each resolved address in turn.
    pub fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<LinkStream> {
        let label = addr.to_string();
        let candidates = addr.to_socket_addrs().map_err(|e| TransportError::Connect {
            addr: label.clone(),
            source: e,
        })?;

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect(candidate) {
                Ok(stream) => {
                    debug!(peer = %candidate, "connected over tcp");
                    return Ok(LinkStream::from_tcp(stream, candidate));
                }
                Err(err) => {
                    debug!(peer = %candidate, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(source) => Err(TransportError::Connect {
                addr: label,
                source,
            }),
            None => Err(TransportError::Unresolved(label)),
        }
    }

    /// The bound local address (with the real port when bound to port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl LinkStream {
    /// Whether `SO_KEEPALIVE` is set, or `None` where it cannot be queried.
    #[cfg(unix)]
    pub fn keepalive_enabled(&self) -> Option<bool> {
        use std::os::fd::AsRawFd;

        let fd = self.as_tcp().as_raw_fd();
        let mut value: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

        // SAFETY: `value` and `len` are valid writable pointers for the provided
        // sizes, and `fd` is an open TCP socket owned by this stream.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_KEEPALIVE,
                (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
                &mut len,
            )
        };

        (rc == 0).then_some(value != 0)
    }

    #[cfg(not(unix))]
    pub fn keepalive_enabled(&self) -> Option<bool> {
        None
    }
}

#[cfg(unix)]
fn set_keepalive(stream: &TcpStream, config: &KeepaliveConfig) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;

    #[cfg(target_os = "linux")]
    {
        setsockopt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, to_c_int(config.idle_secs))?;
        setsockopt_int(
            fd,
            libc::IPPROTO_TCP,
            libc::TCP_KEEPINTVL,
            to_c_int(config.interval_secs),
        )?;
        setsockopt_int(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, to_c_int(config.probes))?;
    }
    #[cfg(not(target_os = "linux"))]
    let _ = config;

    Ok(())
}

#[cfg(not(unix))]
fn set_keepalive(_stream: &TcpStream, _config: &KeepaliveConfig) -> io::Result<()> {
    Ok(())
}

#[cfg(target_os = "linux")]
fn to_c_int(value: u32) -> libc::c_int {
    libc::c_int::try_from(value).unwrap_or(libc::c_int::MAX)
}

#[cfg(unix)]
fn setsockopt_int(
    fd: libc::c_int,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    // SAFETY: `value` lives for the duration of the call and the length matches
    // its size; `fd` is an open socket borrowed from a live `TcpStream`.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
