//! Behavioural tests for a session served over a loopback socket.

use std::cell::RefCell;
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use trellis_wire::{DatapathId, Header, MessageType};

use super::support::{
    FakeSwitch, FloodingHandler, RecordingHandler, error_frame, eventually, features_reply, frame,
};
use crate::buffer_pool::ReadBufferPool;
use crate::handler::Handler;
use crate::session::{Session, SessionError, SessionOptions, SessionReport};

#[derive(Default)]
struct SessionWorld {
    switch: Option<FakeSwitch>,
    handler: Arc<RecordingHandler>,
    session: Option<JoinHandle<SessionReport>>,
    report: Option<SessionReport>,
    received: Vec<(Header, Vec<u8>)>,
}

impl SessionWorld {
    fn start(&mut self, concurrency: usize, handler: RecordingHandler) {
        self.handler = Arc::new(handler);
        let handler: Arc<dyn Handler> = self.handler.clone();
        let options = SessionOptions {
            concurrency,
            ..SessionOptions::default()
        };
        self.start_with(options, handler);
    }

    fn start_with(&mut self, options: SessionOptions, handler: Arc<dyn Handler>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind loopback listener");
        let addr = listener.local_addr().expect("loopback address");
        let switch = FakeSwitch::connect(addr);
        let (stream, _) = listener.accept().expect("accept switch");

        let pool = ReadBufferPool::new(4, 64);
        self.session = Some(thread::spawn(move || {
            Session::new(stream, options, pool).serve(&handler)
        }));
        self.switch = Some(switch);
    }

    fn switch(&mut self) -> &mut FakeSwitch {
        self.switch.as_mut().expect("switch connected")
    }

    fn receive(&mut self) -> (Header, Vec<u8>) {
        let received = self.switch().receive().expect("controller sent a frame");
        self.received.push(received.clone());
        received
    }

    fn finish(&mut self) -> &SessionReport {
        if let Some(session) = self.session.take() {
            self.report = Some(session.join().expect("session thread"));
        }
        self.report.as_ref().expect("session finished")
    }
}

impl Drop for SessionWorld {
    fn drop(&mut self) {
        self.switch = None;
        if let Some(session) = self.session.take() {
            drop(session.join());
        }
    }
}

#[fixture]
fn world() -> RefCell<SessionWorld> {
    RefCell::new(SessionWorld::default())
}

#[given("a session serving a recording handler")]
fn given_session(world: &RefCell<SessionWorld>) {
    world.borrow_mut().start(1, RecordingHandler::default());
}

#[given("a session with {workers} workers serving a recording handler")]
fn given_session_with_workers(world: &RefCell<SessionWorld>, workers: usize) {
    world.borrow_mut().start(workers, RecordingHandler::default());
}

#[given("a session whose handler answers every packet-in")]
fn given_answering_session(world: &RefCell<SessionWorld>) {
    world.borrow_mut().start(1, RecordingHandler::answering());
}

#[given("a session whose handler panics on packet-ins")]
fn given_panicking_session(world: &RefCell<SessionWorld>) {
    world.borrow_mut().start(1, RecordingHandler::panicking());
}

#[given("a session with a {millis} ms write deadline whose handler floods the switch")]
fn given_flooding_session(world: &RefCell<SessionWorld>, millis: u64) {
    let options = SessionOptions {
        write_timeout: Some(Duration::from_millis(millis)),
        ..SessionOptions::default()
    };
    let handler: Arc<dyn Handler> = Arc::new(FloodingHandler);
    world.borrow_mut().start_with(options, handler);
}

#[when("the switch reads the handshake")]
fn when_switch_reads_handshake(world: &RefCell<SessionWorld>) {
    let mut state = world.borrow_mut();
    state.receive();
    state.receive();
}

#[when("the switch sends a features reply for datapath {datapath_id}")]
fn when_switch_sends_features(world: &RefCell<SessionWorld>, datapath_id: u64) {
    world.borrow_mut().switch().send(&features_reply(datapath_id));
}

#[when("the switch sends an echo request")]
fn when_switch_sends_echo(world: &RefCell<SessionWorld>) {
    world
        .borrow_mut()
        .switch()
        .send(&[0x04, MessageType::ECHO_REQUEST.0, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);
}

#[when("the switch sends an error of type {error_type} and code {code}")]
fn when_switch_sends_error(world: &RefCell<SessionWorld>, error_type: u16, code: u16) {
    world
        .borrow_mut()
        .switch()
        .send(&error_frame(error_type, code));
}

#[when("the switch sends {count} packet-ins")]
fn when_switch_sends_packet_ins(world: &RefCell<SessionWorld>, count: u32) {
    let mut state = world.borrow_mut();
    for xid in 1..=count {
        state
            .switch()
            .send(&frame(MessageType::PACKET_IN, xid, &[]));
    }
}

#[when("the switch stops sending")]
fn when_switch_stops_sending(world: &RefCell<SessionWorld>) {
    world.borrow_mut().switch().stop_sending();
}

fn assert_next_frame(world: &RefCell<SessionWorld>, expected: MessageType, xid: u32) -> Vec<u8> {
    let (header, payload) = world.borrow_mut().receive();
    assert_eq!(header.message_type, expected);
    assert_eq!(header.xid, xid);
    payload
}

#[then("the switch receives a hello with xid {xid}")]
fn then_switch_receives_hello(world: &RefCell<SessionWorld>, xid: u32) {
    assert_next_frame(world, MessageType::HELLO, xid);
}

#[then("the switch receives a features request with xid {xid}")]
fn then_switch_receives_features_request(world: &RefCell<SessionWorld>, xid: u32) {
    let payload = assert_next_frame(world, MessageType::FEATURES_REQUEST, xid);
    assert_eq!(payload.len(), 8);
}

#[then("the switch receives an echo reply with xid {xid}")]
fn then_switch_receives_echo_reply(world: &RefCell<SessionWorld>, xid: u32) {
    let payload = assert_next_frame(world, MessageType::ECHO_REPLY, xid);
    let mut expected = vec![0x04, MessageType::ECHO_REPLY.0, 0x00, 0x08];
    expected.extend_from_slice(&xid.to_be_bytes());
    assert_eq!(payload, expected);
}

#[then("the handler receives a features reply from datapath {datapath_id}")]
fn then_handler_receives_features(world: &RefCell<SessionWorld>, datapath_id: u64) {
    let handler = Arc::clone(&world.borrow().handler);
    assert!(
        eventually(|| !handler.messages().is_empty()),
        "handler saw no messages"
    );
    let messages = handler.messages();
    let first = messages.first().expect("one message");
    assert_eq!(first.message_type, MessageType::FEATURES_REPLY);
    assert_eq!(first.datapath_id, Some(DatapathId(datapath_id)));
    assert_eq!(first.payload, features_reply(datapath_id));
}

#[then("the handler has received {count} messages")]
fn then_handler_received(world: &RefCell<SessionWorld>, count: usize) {
    let mut state = world.borrow_mut();
    state.finish();
    let messages = state.handler.messages();
    assert_eq!(messages.len(), count);
    let distinct: HashSet<_> = messages.iter().filter_map(|message| message.xid()).collect();
    assert_eq!(distinct.len(), count);
}

#[then("the switch receives {count} replies before the connection closes")]
fn then_switch_receives_replies(world: &RefCell<SessionWorld>, count: usize) {
    let mut state = world.borrow_mut();
    let rest = state.switch().receive_all();
    let replies = rest
        .iter()
        .filter(|(header, _)| header.message_type == MessageType::BARRIER_REQUEST)
        .count();
    assert_eq!(replies, count);
    state.received.extend(rest);
}

#[then("transaction ids on the wire count up from 1")]
fn then_xids_count_up(world: &RefCell<SessionWorld>) {
    let state = world.borrow();
    let xids: Vec<u32> = state.received.iter().map(|(header, _)| header.xid).collect();
    let expected: Vec<u32> = (1..).take(xids.len()).collect();
    assert_eq!(xids, expected);
}

#[then("the session ends cleanly")]
fn then_session_ends_cleanly(world: &RefCell<SessionWorld>) {
    let mut state = world.borrow_mut();
    let report = state.finish();
    assert!(report.is_clean(), "unexpected error: {:?}", report.error);
}

#[then("the session ends with a switch error of type {error_type} and code {code}")]
fn then_session_ends_with_error(world: &RefCell<SessionWorld>, error_type: u16, code: u16) {
    let mut state = world.borrow_mut();
    let closed = state.switch().receive_all();
    assert!(closed.is_empty(), "no frames expected after the error");
    match &state.finish().error {
        Some(SessionError::Protocol(error)) => {
            assert_eq!((error.error_type, error.code), (error_type, code));
        }
        other => panic!("expected a switch error, got {other:?}"),
    }
}

#[then("the session fails because its handler panicked")]
fn then_session_fails_on_panic(world: &RefCell<SessionWorld>) {
    let mut state = world.borrow_mut();
    let report = state.finish();
    assert!(!report.is_clean(), "a handler panic must not look clean");
    assert!(
        matches!(
            report.error,
            Some(SessionError::WorkersStopped | SessionError::HandlerPanicked { .. })
        ),
        "unexpected error: {:?}",
        report.error
    );
}

#[then("the session fails writing to the switch")]
fn then_session_fails_writing(world: &RefCell<SessionWorld>) {
    let mut state = world.borrow_mut();
    let report = state.finish();
    assert!(
        matches!(report.error, Some(SessionError::Io(_))),
        "unexpected error: {:?}",
        report.error
    );
}

#[then("the session reports datapath {datapath_id}")]
fn then_session_reports_datapath(world: &RefCell<SessionWorld>, datapath_id: u64) {
    let mut state = world.borrow_mut();
    assert_eq!(state.finish().datapath_id, Some(DatapathId(datapath_id)));
}

#[scenario(
    path = "tests/features/session.feature",
    name = "The controller greets a new switch"
)]
fn greeting(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "A features reply identifies the switch"
)]
fn identification(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Keepalives are answered without reaching the handler"
)]
fn keepalive(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "A switch error ends the session"
)]
fn switch_error(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Replies drain before the socket closes"
)]
fn drain_before_close(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "Several workers handle each message once"
)]
fn concurrent_workers(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "A handler panic fails the session"
)]
fn handler_panic(world: RefCell<SessionWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/session.feature",
    name = "A switch that stops reading trips the write deadline"
)]
fn write_deadline(world: RefCell<SessionWorld>) {
    drop(world);
}
