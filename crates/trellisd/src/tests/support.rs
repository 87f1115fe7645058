//! Shared doubles and a scripted switch for the behavioural suites.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::Receiver;
use ortho_config::{OrthoConfig, OrthoError};

use trellis_config::{Config, ListenEndpoint};
use trellis_wire::{HEADER_LEN, Header, MessageType};

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::handler::Handler;
use crate::health::HealthReporter;
use crate::message::Message;
use crate::process::{ShutdownError, ShutdownSignal};
use crate::session::SessionReport;
use crate::writer::Writer;

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `condition` for up to two seconds.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Builds an OpenFlow 1.3 frame with a correct length field.
pub(crate) fn frame(message_type: MessageType, xid: u32, body: &[u8]) -> Vec<u8> {
    let len = u16::try_from(HEADER_LEN + body.len()).expect("test frame fits");
    let mut frame = vec![0x04, message_type.0];
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&xid.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

pub(crate) fn features_reply(datapath_id: u64) -> Vec<u8> {
    let mut body = datapath_id.to_be_bytes().to_vec();
    body.extend_from_slice(&256_u32.to_be_bytes());
    body.extend_from_slice(&[254, 0, 0, 0]);
    body.extend_from_slice(&0x4f_u32.to_be_bytes());
    body.extend_from_slice(&[0; 4]);
    frame(MessageType::FEATURES_REPLY, 2, &body)
}

pub(crate) fn error_frame(error_type: u16, code: u16) -> Vec<u8> {
    let mut body = error_type.to_be_bytes().to_vec();
    body.extend_from_slice(&code.to_be_bytes());
    frame(MessageType::ERROR, 7, &body)
}

/// Client end of a switch connection, driven step by step.
pub(crate) struct FakeSwitch {
    stream: TcpStream,
}

impl FakeSwitch {
    pub(crate) fn connect(addr: SocketAddr) -> Self {
        Self::new(TcpStream::connect(addr).expect("connect fake switch"))
    }

    pub(crate) fn new(stream: TcpStream) -> Self {
        stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .expect("set read timeout");
        Self { stream }
    }

    pub(crate) fn send(&mut self, frame: &[u8]) {
        self.stream.write_all(frame).expect("send frame");
    }

    /// Half-closes the connection so the controller sees end of stream.
    pub(crate) fn stop_sending(&self) {
        self.stream
            .shutdown(Shutdown::Write)
            .expect("half-close switch socket");
    }

    /// Reads one frame; `None` once the controller has closed the socket.
    pub(crate) fn receive(&mut self) -> Option<(Header, Vec<u8>)> {
        let mut header = [0_u8; HEADER_LEN];
        match self.stream.read_exact(&mut header) {
            Ok(()) => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                ) =>
            {
                return None;
            }
            Err(error) => panic!("reading frame header: {error}"),
        }
        let parsed = Header::parse(&header).expect("controller sent a valid header");
        let mut frame = header.to_vec();
        frame.resize(parsed.frame_len(), 0);
        if let Some(body) = frame.get_mut(HEADER_LEN..) {
            self.stream.read_exact(body).expect("read frame body");
        }
        Some((parsed, frame))
    }

    /// Reads frames until the controller closes the connection.
    pub(crate) fn receive_all(&mut self) -> Vec<(Header, Vec<u8>)> {
        std::iter::from_fn(|| self.receive()).collect()
    }
}

/// Handler recording every message, optionally answering packet-ins with a
/// barrier request or panicking on them.
#[derive(Debug, Default)]
pub(crate) struct RecordingHandler {
    messages: Mutex<Vec<Message>>,
    answer_packet_ins: bool,
    panic_on_packet_ins: bool,
}

impl RecordingHandler {
    pub(crate) fn answering() -> Self {
        Self {
            answer_packet_ins: true,
            ..Self::default()
        }
    }

    pub(crate) fn panicking() -> Self {
        Self {
            panic_on_packet_ins: true,
            ..Self::default()
        }
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl Handler for RecordingHandler {
    fn handle(&self, writer: &Writer, message: Message) {
        let is_packet_in = message.message_type == MessageType::PACKET_IN;
        assert!(
            !(self.panic_on_packet_ins && is_packet_in),
            "handler rejects packet-ins"
        );
        if self.answer_packet_ins && is_packet_in {
            writer
                .write_bytes(frame(MessageType::BARRIER_REQUEST, 0, &[]))
                .expect("queue barrier request");
        }
        self.messages.lock().expect("messages lock").push(message);
    }
}

/// Handler answering the first packet-in with back-to-back 60 KB frames
/// until the session stops accepting them.
#[derive(Debug, Default)]
pub(crate) struct FloodingHandler;

impl Handler for FloodingHandler {
    fn handle(&self, writer: &Writer, message: Message) {
        if message.message_type != MessageType::PACKET_IN {
            return;
        }
        for _ in 0..10_000 {
            if writer
                .write_bytes(frame(MessageType::PACKET_OUT, 0, &[0; 60_000]))
                .is_err()
            {
                return;
            }
        }
    }
}

/// Health events captured for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ListenerStarted(Option<SocketAddr>),
    SessionOpened,
    SessionClosed {
        datapath_id: Option<u64>,
        clean: bool,
    },
}

#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub(crate) fn listener_addr(&self) -> Option<SocketAddr> {
        self.events().into_iter().find_map(|event| match event {
            HealthEvent::ListenerStarted(addr) => addr,
            _ => None,
        })
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn listener_started(&self, _endpoint: &ListenEndpoint, local_addr: Option<SocketAddr>) {
        self.record(HealthEvent::ListenerStarted(local_addr));
    }

    fn session_opened(&self, _peer: Option<SocketAddr>) {
        self.record(HealthEvent::SessionOpened);
    }

    fn session_closed(&self, report: &SessionReport) {
        self.record(HealthEvent::SessionClosed {
            datapath_id: report.datapath_id.map(|id| id.0),
            clean: report.is_clean(),
        });
    }
}

/// Loader binding an ephemeral loopback port.
pub(crate) struct LoopbackConfigLoader;

impl ConfigLoader for LoopbackConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen: ListenEndpoint::tcp("127.0.0.1", 0),
            log_filter: "warn".to_owned(),
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unsupported listen scheme.
pub(crate) struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("trellisd"),
            OsString::from("--listen"),
            OsString::from("udp://127.0.0.1:6653"),
        ])
    }
}

/// Shutdown signal fired by the test through a channel.
pub(crate) struct ChannelShutdown {
    requests: Receiver<()>,
}

impl ChannelShutdown {
    pub(crate) const fn new(requests: Receiver<()>) -> Self {
        Self { requests }
    }
}

impl ShutdownSignal for ChannelShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        if self.requests.recv().is_err() {
            return Err(ShutdownError::Install {
                source: io::Error::other("shutdown channel closed"),
            });
        }
        Ok(())
    }
}
