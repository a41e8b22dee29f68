use std::{
    sync::mpsc::{self, Receiver, SyncSender, TrySendError},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::bail;
use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::Serialize;
use strum_macros::Display;
use tracing::{debug, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api2.amplitude.com/2/httpapi";
const ANONYMOUS_USER: &str = "anonymous";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Serialize)]
pub enum EventType {
    #[strum(serialize = "go")]
    #[serde(rename = "go")]
    Go,
    #[strum(serialize = "Not Found")]
    #[serde(rename = "Not Found")]
    NotFound,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Event {
    pub event_type: EventType,
    pub source: String,
    pub destination: Option<String>,
    pub ip: Option<String>,
    pub request_id: Option<String>,
}

impl Event {
    pub fn go(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Go,
            source: source.into(),
            destination: Some(destination.into()),
            ip: None,
            request_id: None,
        }
    }

    pub fn not_found(source: impl Into<String>) -> Self {
        Self {
            event_type: EventType::NotFound,
            source: source.into(),
            destination: None,
            ip: None,
            request_id: None,
        }
    }

    pub fn with_client(mut self, ip: Option<&str>, request_id: Option<&str>) -> Self {
        self.ip = ip.map(str::to_owned);
        self.request_id = request_id.map(str::to_owned);
        self
    }
}

/// Out-of-band event delivery. `track` must return without waiting on delivery.
pub trait Telemetry: Send + Sync {
    fn track(&self, event: Event);
}

pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn track(&self, _: Event) {}
}

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeout: Duration::from_secs(5),
            capacity: 1024,
        }
    }
}

impl TelemetryConfig {
    /// Enabled exactly when an api key is given.
    pub fn with_api_key(api_key: Option<String>) -> Self {
        match api_key {
            Some(api_key) if !api_key.is_empty() => Self {
                enabled: true,
                api_key,
                ..Self::default()
            },
            _ => Self::default(),
        }
    }

    pub fn build(&self) -> anyhow::Result<Box<dyn Telemetry>> {
        if !self.enabled {
            info!("telemetry disabled");
            return Ok(Box::new(NoopTelemetry));
        }
        info!("telemetry enabled: {}", self.endpoint);
        Ok(Box::new(HttpTelemetry::spawn(self)?))
    }
}

/// Queues events for a worker thread that posts them one at a time.
///
/// A full queue drops the event. Dropping the sender side lets the worker
/// drain what is queued and exit.
pub struct HttpTelemetry {
    sender: Option<SyncSender<Event>>,
    worker: Option<JoinHandle<()>>,
}

impl HttpTelemetry {
    pub fn spawn(config: &TelemetryConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let (sender, receiver) = mpsc::sync_channel(config.capacity);
        let endpoint = config.endpoint.clone();
        let api_key = config.api_key.clone();

        let worker = thread::Builder::new()
            .name("telemetry".to_owned())
            .spawn(move || deliver_all(&client, &endpoint, &api_key, receiver))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl Telemetry for HttpTelemetry {
    fn track(&self, event: Event) {
        let Some(sender) = &self.sender else { return };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("telemetry queue full, dropping {} event", event.event_type)
            }
            Err(TrySendError::Disconnected(_)) => warn!("telemetry worker gone"),
        }
    }
}

impl Drop for HttpTelemetry {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("telemetry worker panicked");
            }
        }
    }
}

fn deliver_all(client: &Client, endpoint: &str, api_key: &str, receiver: Receiver<Event>) {
    for event in receiver {
        match deliver(client, endpoint, api_key, &event) {
            Ok(()) => debug!("delivered {} event", event.event_type),
            Err(err) => warn!(?err, "telemetry delivery failed"),
        }
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    api_key: &'a str,
    events: [AmplitudeEvent<'a>; 1],
}

#[derive(Serialize)]
struct AmplitudeEvent<'a> {
    event_type: EventType,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_properties: Option<UserProperties<'a>>,
    event_properties: EventProperties<'a>,
}

/// Edge routing details carried in request ids shaped like
/// `cdg1::iad1::abcde-1700000000000-0123456789ab`.
#[derive(Serialize, Debug, Eq, PartialEq)]
struct UserProperties<'a> {
    regions: &'a str,
    #[serde(rename = "podId")]
    pod_id: &'a str,
}

impl<'a> UserProperties<'a> {
    fn from_request_id(request_id: &'a str) -> Option<Self> {
        let (regions, rest) = request_id.rsplit_once("::")?;
        let pod_id = rest.split_once('-').map_or(rest, |(pod_id, _)| pod_id);
        Some(Self { regions, pod_id })
    }
}

#[derive(Serialize)]
struct EventProperties<'a> {
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<&'a str>,
}

impl<'a> From<&'a Event> for AmplitudeEvent<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            event_type: event.event_type,
            user_id: event.request_id.as_deref().unwrap_or(ANONYMOUS_USER),
            ip: event.ip.as_deref(),
            user_properties: event
                .request_id
                .as_deref()
                .and_then(UserProperties::from_request_id),
            event_properties: EventProperties {
                source: &event.source,
                destination: event.destination.as_deref(),
            },
        }
    }
}

fn deliver(client: &Client, endpoint: &str, api_key: &str, event: &Event) -> anyhow::Result<()> {
    let payload = Payload {
        api_key,
        events: [AmplitudeEvent::from(event)],
    };
    let resp = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .body(serde_json::to_vec(&payload)?)
        .send()?;

    if !resp.status().is_success() {
        bail!("telemetry endpoint answered {}", resp.status());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        net::TcpListener,
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    use serde_json::json;

    use crate::{
        request::Request, response_writer::ResponseWriter, server::Server,
        status_code_registry::ReasonPhrase,
    };

    use super::{
        AmplitudeEvent, Event, EventType, HttpTelemetry, Telemetry, TelemetryConfig,
        UserProperties,
    };

    fn config(endpoint: String) -> TelemetryConfig {
        TelemetryConfig {
            enabled: true,
            api_key: "key".to_owned(),
            endpoint,
            timeout: Duration::from_secs(2),
            capacity: 16,
        }
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::Go.to_string(), "go");
        assert_eq!(EventType::NotFound.to_string(), "Not Found");
    }

    #[test]
    fn test_user_properties_from_request_id() {
        let tests = [
            (
                "cdg1::iad1::abcde-1700000000000-0123456789ab",
                Some(("cdg1::iad1", "abcde")),
            ),
            ("iad1::xyz", Some(("iad1", "xyz"))),
            ("req-12345", None),
            ("", None),
        ];

        for (request_id, want) in tests {
            let want = want.map(|(regions, pod_id)| UserProperties { regions, pod_id });
            assert_eq!(UserProperties::from_request_id(request_id), want, "{}", request_id);
        }
    }

    #[test]
    fn test_amplitude_event_user_properties() {
        let event = Event::not_found("/x")
            .with_client(None, Some("sfo1::p7k2m-1700000000000-ab12"));
        let got = serde_json::to_value(AmplitudeEvent::from(&event)).unwrap();
        assert_eq!(
            got,
            json!({
                "event_type": "Not Found",
                "user_id": "sfo1::p7k2m-1700000000000-ab12",
                "user_properties": { "regions": "sfo1", "podId": "p7k2m" },
                "event_properties": { "source": "/x" },
            })
        );
    }

    #[test]
    fn test_with_api_key() {
        assert!(!TelemetryConfig::with_api_key(None).enabled);
        assert!(!TelemetryConfig::with_api_key(Some(String::new())).enabled);

        let config = TelemetryConfig::with_api_key(Some("key".to_owned()));
        assert!(config.enabled);
        assert_eq!(config.api_key, "key");
    }

    #[test]
    fn test_http_telemetry_delivers() {
        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        let bodies = Arc::new(Mutex::new(vec![]));
        let clone = Arc::clone(&bodies);
        thread::spawn(move || {
            server.run(move |w: &mut ResponseWriter, r: &Request| {
                let body = r.get_body().unwrap_or_default().to_vec();
                clone.lock().unwrap().push((r.get_path().to_owned(), body));
                w.set_reason_phrase(ReasonPhrase::OK);
            });
        });

        let telemetry = HttpTelemetry::spawn(&config(format!("http://{}/2/httpapi", addr))).unwrap();
        telemetry.track(Event::go("/me", "https://github.com/ThewBear").with_client(
            Some("10.0.0.1"),
            Some("req-12345"),
        ));
        telemetry.track(Event::not_found("/nope"));
        drop(telemetry);

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);

        let (path, body) = &bodies[0];
        assert_eq!(path, "/2/httpapi");
        let got: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(
            got,
            json!({
                "api_key": "key",
                "events": [{
                    "event_type": "go",
                    "user_id": "req-12345",
                    "ip": "10.0.0.1",
                    "event_properties": {
                        "source": "/me",
                        "destination": "https://github.com/ThewBear",
                    },
                }],
            })
        );

        let got: serde_json::Value = serde_json::from_slice(&bodies[1].1).unwrap();
        assert_eq!(
            got,
            json!({
                "api_key": "key",
                "events": [{
                    "event_type": "Not Found",
                    "user_id": "anonymous",
                    "event_properties": { "source": "/nope" },
                }],
            })
        );
    }

    #[test]
    fn test_http_telemetry_unreachable_endpoint() {
        let addr = {
            let listener = TcpListener::bind("localhost:0").unwrap();
            listener.local_addr().unwrap()
        };

        let telemetry = HttpTelemetry::spawn(&config(format!("http://{}/", addr))).unwrap();
        telemetry.track(Event::not_found("/x"));
        drop(telemetry);
    }
}
