use std::fmt::Display;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use dutylink_frame::{Command, FrameConfig, FrameError, FrameReader, FrameWriter};
use dutylink_motor::Duty;
use dutylink_transport::{LinkStream, TcpTransport};
use tracing::debug;

use crate::error::{NodeError, Result};

/// Client-side configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for a get response. Default: 5 s.
    pub response_timeout: Option<Duration>,
    /// Write timeout for requests. Default: 5 s.
    pub write_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Connect to a motor node with default configuration.
pub fn connect(addr: impl ToSocketAddrs + Display) -> Result<MotorClient> {
    connect_with_config(addr, &ClientConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(
    addr: impl ToSocketAddrs + Display,
    config: &ClientConfig,
) -> Result<MotorClient> {
    let stream = TcpTransport::connect(addr)?;
    let peer = stream.peer_addr();
    let reader_stream = stream.try_clone()?;

    let frame_config = FrameConfig {
        read_timeout: config.response_timeout,
        write_timeout: config.write_timeout,
        ..FrameConfig::default()
    };

    let reader = FrameReader::with_config_link(reader_stream, frame_config.clone())?;
    let writer = FrameWriter::with_config_link(stream, frame_config)?;
    debug!(%peer, "connected to motor node");

    Ok(MotorClient {
        reader,
        writer,
        peer,
    })
}

/// Operator side of a node connection.
///
/// The node stops the motor when this connection closes, so a client must
/// stay connected for as long as the motor should keep running.
pub struct MotorClient {
    reader: FrameReader<LinkStream>,
    writer: FrameWriter<LinkStream>,
    peer: SocketAddr,
}

impl MotorClient {
    /// Query the node's current duty.
    pub fn get_duty(&mut self) -> Result<Duty> {
        self.writer.send_command(&Command::Get)?;
        self.reader.read_duty().map_err(|err| match err {
            FrameError::ConnectionClosed => NodeError::Disconnected(self.peer.to_string()),
            other => other.into(),
        })
    }

    /// Request a fade to `target`. The node does not acknowledge sets.
    pub fn set_duty(&mut self, target: Duty, fade_ms: u32) -> Result<()> {
        self.writer
            .send_command(&Command::set(target, fade_ms))
            .map_err(Into::into)
    }

    /// Request an immediate stop.
    pub fn stop(&mut self) -> Result<()> {
        self.set_duty(Duty::ZERO, 0)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Close the connection; the node stops the motor.
    pub fn close(self) {
        self.writer.get_ref().shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn node_stub(
        script: impl FnOnce(FrameReader<LinkStream>, FrameWriter<LinkStream>) + Send + 'static,
    ) -> (SocketAddr, thread::JoinHandle<()>) {
        let transport = TcpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = transport.local_addr();
        let handle = thread::spawn(move || {
            let stream = transport.accept().unwrap();
            let reader = FrameReader::new(stream.try_clone().unwrap());
            script(reader, FrameWriter::new(stream));
        });
        (addr, handle)
    }

    #[test]
    fn get_sends_query_and_decodes_reply() {
        let (addr, node) = node_stub(|mut reader, mut writer| {
            assert_eq!(reader.read_command().unwrap(), Command::Get);
            writer.send_duty(Duty::new(-12).unwrap()).unwrap();
        });

        let mut client = connect(addr).expect("client should connect");
        assert_eq!(client.get_duty().unwrap().percent(), -12);
        node.join().unwrap();
    }

    #[test]
    fn set_and_stop_are_fire_and_forget() {
        let (addr, node) = node_stub(|mut reader, _writer| {
            assert_eq!(
                reader.read_command().unwrap(),
                Command::set(Duty::new(55).unwrap(), 900)
            );
            assert_eq!(reader.read_command().unwrap(), Command::set(Duty::ZERO, 0));
        });

        let mut client = connect(addr).unwrap();
        client.set_duty(Duty::new(55).unwrap(), 900).unwrap();
        client.stop().unwrap();
        node.join().unwrap();
    }

    #[test]
    fn get_reports_disconnect() {
        let (addr, node) = node_stub(|mut reader, writer| {
            let _ = reader.read_frame();
            writer.get_ref().shutdown();
        });

        let mut client = connect(addr).unwrap();
        let err = client.get_duty().unwrap_err();
        assert!(matches!(err, NodeError::Disconnected(_)));
        node.join().unwrap();
    }

    #[test]
    fn get_times_out_without_reply() {
        let (addr, node) = node_stub(|mut reader, _writer| {
            let _ = reader.read_frame();
            let _ = reader.read_frame();
        });

        let config = ClientConfig {
            response_timeout: Some(Duration::from_millis(20)),
            ..ClientConfig::default()
        };
        let mut client = connect_with_config(addr, &config).unwrap();
        let err = client.get_duty().unwrap_err();
        assert!(matches!(err, NodeError::Frame(FrameError::Io(_))));
        client.close();
        node.join().unwrap();
    }

    #[test]
    fn connect_refused_is_transport_error() {
        let transport = TcpTransport::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = transport.local_addr();
        drop(transport);

        let err = connect(addr).err().expect("connect should fail");
        assert!(matches!(err, NodeError::Transport(_)));
    }
}
