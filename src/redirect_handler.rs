use std::str::FromStr;

use strum::IntoEnumIterator;
use tracing::warn;

use crate::{
    redirect::{normalize_path, MatchOutcome, RedirectEngine},
    request::Request,
    response_writer::ResponseWriter,
    server::{Handler, HttpMethod},
    status_code_registry::ReasonPhrase,
    telemetry::{Event, Telemetry},
};

const NOT_FOUND_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Serves redirects for every request path and reports each outcome to telemetry.
pub struct RedirectService {
    engine: RedirectEngine,
    telemetry: Box<dyn Telemetry>,
}

impl RedirectService {
    pub fn new(engine: RedirectEngine, telemetry: Box<dyn Telemetry>) -> Self {
        Self { engine, telemetry }
    }

    fn track(&self, r: &Request, event: Event) {
        let headers = r.get_headers();
        self.telemetry
            .track(event.with_client(headers.get_real_ip(), headers.get_request_id()));
    }
}

impl Handler for RedirectService {
    fn handle(&self, w: &mut ResponseWriter, r: &Request) {
        let Ok(http_method) = HttpMethod::from_str(r.get_http_method()) else {
            warn!("unsupported method: {}", r.get_http_method());
            w.set_reason_phrase(ReasonPhrase::MethodNotAllowed);
            w.add_allow_header(&HttpMethod::iter().collect::<Vec<_>>());
            return;
        };

        let path = r.get_path();
        let source = normalize_path(path);

        match self.engine.resolve(Some(path), r.get_query()) {
            MatchOutcome::Redirect {
                status,
                destination,
            } => {
                if let Err(err) = w.redirect(status, &destination) {
                    warn!(%err, "refusing redirect to {:?}", destination);
                    w.set_reason_phrase(ReasonPhrase::BadRequest);
                    return;
                }
                self.track(r, Event::go(source, destination.as_str()));
            }
            MatchOutcome::NotFound => {
                self.track(r, Event::not_found(source));
                w.set_reason_phrase(ReasonPhrase::NotFound);
                w.set_body(
                    self.engine.not_found_page().as_bytes().to_vec(),
                    NOT_FOUND_CONTENT_TYPE,
                );
            }
        }

        if http_method == HttpMethod::Head {
            w.omit_body();
        }
    }
}
