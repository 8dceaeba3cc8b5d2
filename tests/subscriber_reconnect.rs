//! Subscriber lifecycle tests
//!
//! A scripted in-memory transport stands in for the websocket; the tokio
//! clock is paused so reconnect and keep-alive timings are exact.

use async_trait::async_trait;
use hub_relay::client::protocol::RECORD_SEPARATOR;
use hub_relay::client::{
    ClientError, ClientState, HubConnection, HubEndpoint, ReconnectPolicy, Subscriber, SubscriberHandler, Transport,
};
use hub_relay::error::RelayError;
use hub_relay::negotiate::{ConnectionDescriptor, NegotiateReply, Negotiator};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// What the next connect call does
enum Plan {
    Refuse,
    Accept { frames: Vec<String>, hang: bool },
}

#[derive(Default)]
struct ScriptedTransport {
    plans: Mutex<VecDeque<Plan>>,
    connects: Arc<Mutex<Vec<Instant>>>,
    sent: Arc<Mutex<Vec<String>>>,
    close_fails: bool,
}

impl ScriptedTransport {
    fn new(plans: Vec<Plan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, endpoint: &HubEndpoint) -> Result<Box<dyn HubConnection>, ClientError> {
        self.connects.lock().unwrap().push(Instant::now());

        match self.plans.lock().unwrap().pop_front().unwrap_or(Plan::Refuse) {
            Plan::Refuse => Err(ClientError::Connect {
                url: endpoint.url.clone(),
                source: "connection refused".into(),
            }),
            Plan::Accept { frames, hang } => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                hang,
                sent: Arc::clone(&self.sent),
                close_fails: self.close_fails,
            })),
        }
    }
}

struct ScriptedConnection {
    frames: VecDeque<String>,
    hang: bool,
    sent: Arc<Mutex<Vec<String>>>,
    close_fails: bool,
}

#[async_trait]
impl HubConnection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, ClientError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        None
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        if self.close_fails {
            return Err(ClientError::Transport("socket already gone".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingHandler {
    opens: AtomicUsize,
    closes: AtomicUsize,
    errors: AtomicUsize,
    messages: Mutex<Vec<Vec<Value>>>,
    on_message: Arc<Notify>,
}

impl SubscriberHandler for CountingHandler {
    fn on_open(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&self, arguments: &[Value]) {
        self.messages.lock().unwrap().push(arguments.to_vec());
        self.on_message.notify_one();
    }

    fn on_error(&self, _error: &ClientError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn record(body: &str) -> String {
    format!("{body}{RECORD_SEPARATOR}")
}

fn handshake_ok() -> String {
    record("{}")
}

fn endpoint() -> HubEndpoint {
    HubEndpoint {
        url: "wss://demo.service.signalr.net/client/?hub=agentsHub".to_string(),
        access_token: "tok".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn drop_triggers_five_reconnects_at_fixed_interval_then_gives_up() {
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![handshake_ok()],
        hang: false,
    }]);
    let connects = Arc::clone(&transport.connects);
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());
    let mut state = subscriber.state();

    let result = subscriber.serve(endpoint(), std::future::pending()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, ClientError::ReconnectExhausted { attempts: 5 }));

    let connects = connects.lock().unwrap();
    assert_eq!(connects.len(), 6, "initial connect plus five reconnection attempts");
    for pair in connects.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            gap >= Duration::from_secs(5) && gap < Duration::from_secs(6),
            "reconnect gap was {gap:?}"
        );
    }

    let handler = subscriber.handler();
    assert_eq!(handler.opens.load(Ordering::SeqCst), 1);
    assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    // five refused attempts plus the final exhaustion
    assert_eq!(handler.errors.load(Ordering::SeqCst), 6);
    let last = *state.borrow_and_update();
    assert_eq!(last, ClientState::Closed);
    assert!(last.is_terminal());
}

#[tokio::test(start_paused = true)]
async fn reconnect_resumes_message_delivery() {
    let invocation = record(r#"{"type":1,"target":"newMessage","arguments":[{"id":"order-1"}]}"#);
    let transport = ScriptedTransport::new(vec![
        Plan::Accept {
            frames: vec![handshake_ok()],
            hang: false,
        },
        Plan::Refuse,
        Plan::Accept {
            frames: vec![handshake_ok(), invocation],
            hang: true,
        },
    ]);
    let connects = Arc::clone(&transport.connects);
    let handler = CountingHandler::default();
    let delivered = Arc::clone(&handler.on_message);
    let subscriber = Subscriber::new(transport, handler, ReconnectPolicy::default());

    let started = Instant::now();
    let result = subscriber
        .serve(endpoint(), async move { delivered.notified().await })
        .await;

    assert!(result.is_ok());
    assert_eq!(connects.lock().unwrap().len(), 3);
    assert!(started.elapsed() >= Duration::from_secs(10));

    let handler = subscriber.handler();
    assert_eq!(handler.opens.load(Ordering::SeqCst), 2);
    assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    assert_eq!(*handler.messages.lock().unwrap(), vec![vec![json!({ "id": "order-1" })]]);
}

#[tokio::test(start_paused = true)]
async fn keep_alive_pings_while_connected() {
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![handshake_ok()],
        hang: true,
    }]);
    let sent = Arc::clone(&transport.sent);
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());
    let state = subscriber.state();

    let result = subscriber
        .serve(endpoint(), async move {
            tokio::time::sleep(Duration::from_secs(35)).await;
            assert!(state.borrow().is_connected(), "still connected after 35s");
        })
        .await;
    assert!(result.is_ok());
    assert!(subscriber.state().borrow().is_terminal());

    let sent = sent.lock().unwrap();
    assert!(sent[0].starts_with(r#"{"protocol":"json","version":1}"#));
    let pings = sent.iter().filter(|f| f.starts_with(r#"{"type":6}"#)).count();
    assert_eq!(pings, 3, "pings at 10s, 20s and 30s");
}

#[tokio::test(start_paused = true)]
async fn messages_in_handshake_frame_and_other_targets() {
    let frame = format!(
        "{}{}{}",
        handshake_ok(),
        record(r#"{"type":1,"target":"somethingElse","arguments":[1]}"#),
        record(r#"{"type":1,"target":"newMessage","arguments":["Ana"]}"#),
    );
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![frame],
        hang: true,
    }]);
    let handler = CountingHandler::default();
    let delivered = Arc::clone(&handler.on_message);
    let subscriber = Subscriber::new(transport, handler, ReconnectPolicy::default());

    let result = subscriber
        .serve(endpoint(), async move { delivered.notified().await })
        .await;
    assert!(result.is_ok());
    assert_eq!(*subscriber.handler().messages.lock().unwrap(), vec![vec![json!("Ana")]]);
}

#[tokio::test(start_paused = true)]
async fn garbled_record_reports_error_without_disconnecting() {
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![
            handshake_ok(),
            record("not json"),
            record(r#"{"type":1,"target":"newMessage","arguments":["still here"]}"#),
        ],
        hang: true,
    }]);
    let connects = Arc::clone(&transport.connects);
    let handler = CountingHandler::default();
    let delivered = Arc::clone(&handler.on_message);
    let subscriber = Subscriber::new(transport, handler, ReconnectPolicy::default());

    subscriber
        .serve(endpoint(), async move { delivered.notified().await })
        .await
        .unwrap();

    assert_eq!(connects.lock().unwrap().len(), 1);
    assert_eq!(subscriber.handler().errors.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn server_close_without_reconnect_stops_cleanly() {
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![handshake_ok(), record(r#"{"type":7,"error":"hub deleted"}"#)],
        hang: true,
    }]);
    let connects = Arc::clone(&transport.connects);
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());

    assert!(subscriber.serve(endpoint(), std::future::pending()).await.is_ok());
    assert_eq!(connects.lock().unwrap().len(), 1);
    assert_eq!(subscriber.handler().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_close_after_server_close_still_ends_cleanly() {
    let transport = ScriptedTransport {
        close_fails: true,
        ..ScriptedTransport::new(vec![Plan::Accept {
            frames: vec![handshake_ok(), record(r#"{"type":7}"#)],
            hang: true,
        }])
    };
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());

    assert!(subscriber.serve(endpoint(), std::future::pending()).await.is_ok());

    let handler = subscriber.handler();
    assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    // close failures are logged, not reported as subscriber errors
    assert_eq!(handler.errors.load(Ordering::SeqCst), 0);
    assert!(subscriber.state().borrow().is_terminal());
}

#[tokio::test(start_paused = true)]
async fn rejected_handshake_fails_initial_connect() {
    let transport = ScriptedTransport::new(vec![Plan::Accept {
        frames: vec![record(r#"{"error":"Requested protocol 'json' is not available."}"#)],
        hang: true,
    }]);
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());

    let err = subscriber.serve(endpoint(), std::future::pending()).await.unwrap_err();
    assert!(matches!(err, ClientError::Handshake(_)));
    assert_eq!(subscriber.handler().opens.load(Ordering::SeqCst), 0);
}

/// Negotiator replaying a fixed provider reply
struct ReplyNegotiator(NegotiateReply);

#[async_trait]
impl Negotiator for ReplyNegotiator {
    async fn issue(&self, hub: &str) -> Result<ConnectionDescriptor, RelayError> {
        ConnectionDescriptor::from_reply(self.0.clone(), hub, 0)
    }
}

#[tokio::test(start_paused = true)]
async fn negotiation_failure_never_connects() {
    let transport = ScriptedTransport::default();
    let connects = Arc::clone(&transport.connects);
    let subscriber = Subscriber::new(transport, CountingHandler::default(), ReconnectPolicy::default());
    let negotiator = ReplyNegotiator(NegotiateReply {
        url: Some("https://demo.service.signalr.net/client/?hub=agentsHub".to_string()),
        access_token: None,
    });

    let err = subscriber
        .run(&negotiator, "agentsHub", std::future::pending())
        .await
        .unwrap_err();

    assert!(err.is_negotiation_failure());
    assert!(connects.lock().unwrap().is_empty());
    assert_eq!(*subscriber.state().borrow(), ClientState::Closed);
}

#[tokio::test(start_paused = true)]
async fn negotiated_endpoint_is_threaded_into_connect() {
    struct UrlRecorder(Arc<Mutex<Vec<HubEndpoint>>>);

    #[async_trait]
    impl Transport for UrlRecorder {
        async fn connect(&self, endpoint: &HubEndpoint) -> Result<Box<dyn HubConnection>, ClientError> {
            self.0.lock().unwrap().push(endpoint.clone());
            Err(ClientError::ConnectionClosed)
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let subscriber = Subscriber::new(
        UrlRecorder(Arc::clone(&seen)),
        CountingHandler::default(),
        ReconnectPolicy::default(),
    );
    let negotiator = ReplyNegotiator(NegotiateReply {
        url: Some("https://demo.service.signalr.net/client/?hub=agentsHub".to_string()),
        access_token: Some("tok".to_string()),
    });

    let err = subscriber
        .run(&negotiator, "agentsHub", std::future::pending())
        .await
        .unwrap_err();

    // Initial connect failures are terminal; no reconnection loop
    assert!(matches!(err, ClientError::ConnectionClosed));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![HubEndpoint {
            url: "wss://demo.service.signalr.net/client/?hub=agentsHub".to_string(),
            access_token: "tok".to_string(),
        }]
    );
}
