//! Analytics events over HTTP
//!
//! Events are merged with default properties and handed to a background
//! sender thread, so recording never blocks the frame. With telemetry
//! disabled nothing is queued and no thread is started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::{build_type, platform_name};
use crate::core::TelemetryConfig;

/// Capture host used when the config leaves the endpoint empty
pub const DEFAULT_ENDPOINT: &str = "https://us.i.posthog.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);

static SESSION_ID: OnceLock<String> = OnceLock::new();

/// Process-wide session id, created on first use
pub fn session_id() -> &'static str {
    SESSION_ID.get_or_init(|| uuid::Uuid::new_v4().simple().to_string())
}

/// `<host>/capture/` for an endpoint, tolerating trailing slashes and an
/// endpoint that already names the capture path
pub fn capture_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let host = if trimmed.is_empty() { DEFAULT_ENDPOINT } else { trimmed };
    if host.ends_with("/capture") {
        format!("{}/", host)
    } else {
        format!("{}/capture/", host)
    }
}

/// Telemetry failures
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The HTTP request failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The sender thread is gone
    #[error("Telemetry worker stopped")]
    WorkerStopped,
}

/// Delivers one event body; swapped out in tests
pub trait TelemetryTransport: Send + 'static {
    /// POST `body` to `url`
    fn send(&self, url: &str, body: &Value) -> Result<(), TelemetryError>;
}

/// Blocking `ureq` transport with the capture timeouts
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Agent with 3 s connect / 7 s total timeouts
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("game_core/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryTransport for UreqTransport {
    fn send(&self, url: &str, body: &Value) -> Result<(), TelemetryError> {
        self.agent
            .post(url)
            .send_json(body)
            .map(|_| ())
            .map_err(|e| TelemetryError::Transport(e.to_string()))
    }
}

enum Job {
    Send { url: String, body: Value },
    Flush(Sender<()>),
    Shutdown,
}

/// Telemetry client
pub struct Telemetry {
    config: TelemetryConfig,
    url: String,
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    session_end_sent: AtomicBool,
}

impl Telemetry {
    /// Client using the real HTTP transport
    pub fn new(config: TelemetryConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }

    /// Client that never sends anything
    pub fn disabled() -> Self {
        Self::with_transport(TelemetryConfig::default(), UreqTransport::new())
    }

    /// Client with a caller-supplied transport
    pub fn with_transport(config: TelemetryConfig, transport: impl TelemetryTransport) -> Self {
        let url = capture_url(&config.endpoint);
        log::info!("[telemetry] configured: enabled={}, endpoint='{}'", config.enabled, url);

        let (sender, worker) = if config.enabled {
            let (tx, rx) = crossbeam_channel::unbounded();
            let spawned = std::thread::Builder::new()
                .name("telemetry".to_string())
                .spawn(move || run_worker(&rx, &transport));
            match spawned {
                Ok(handle) => (Some(tx), Some(handle)),
                Err(e) => {
                    log::error!("[telemetry] failed to start sender thread: {}", e);
                    (None, None)
                }
            }
        } else {
            (None, None)
        };

        Self {
            config,
            url,
            sender,
            worker,
            session_end_sent: AtomicBool::new(false),
        }
    }

    /// Whether events are sent
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.sender.is_some()
    }

    /// Normalized capture URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configured distinct id, or `anonymous`
    pub fn distinct_id(&self) -> &str {
        if self.config.distinct_id.is_empty() {
            "anonymous"
        } else {
            &self.config.distinct_id
        }
    }

    /// Properties attached to every event
    pub fn default_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("platform".into(), json!(platform_name()));
        props.insert("build_id".into(), json!(self.build_id()));
        props.insert("build_type".into(), json!(build_type()));
        props.insert("session_id".into(), json!(session_id()));
        props.insert("distinct_id".into(), json!(self.distinct_id()));
        props
    }

    /// Full request body for an event
    pub fn event_body(&self, name: &str, properties: &Value) -> Value {
        let mut merged = self.default_properties();
        if let Value::Object(extra) = properties {
            for (key, value) in extra {
                merged.insert(key.clone(), value.clone());
            }
        }
        json!({
            "api_key": self.config.api_key,
            "event": name,
            "properties": merged,
            "distinct_id": self.distinct_id(),
        })
    }

    /// Queue an event; no-op when disabled
    pub fn record_event(&self, name: &str, properties: Value) {
        let Some(sender) = &self.sender else {
            return;
        };
        let body = self.event_body(name, &properties);
        if sender
            .send(Job::Send {
                url: self.url.clone(),
                body,
            })
            .is_err()
        {
            log::warn!("[telemetry] dropped '{}': {}", name, TelemetryError::WorkerStopped);
        }
    }

    /// Wait up to `timeout` for queued events to go out.
    ///
    /// Returns true when the queue drained in time; always true when disabled.
    pub fn flush(&self, timeout: Duration) -> bool {
        let Some(sender) = &self.sender else {
            return true;
        };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if sender.send(Job::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Send `session_end` once per process lifetime of this client
    pub fn send_session_end(&self) -> bool {
        if !self.is_enabled() || self.session_end_sent.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.record_event("session_end", json!({}));
        true
    }

    fn build_id(&self) -> &str {
        if self.config.build_id.is_empty() {
            "dev-local"
        } else {
            &self.config.build_id
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Job::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(rx: &Receiver<Job>, transport: &impl TelemetryTransport) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Send { url, body } => {
                if let Err(e) = transport.send(&url, &body) {
                    log::warn!("[telemetry] send failed: {}", e);
                }
            }
            Job::Flush(ack) => {
                let _ = ack.send(());
            }
            Job::Shutdown => break,
        }
    }
}
