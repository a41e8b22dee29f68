use thiserror::Error;

use crate::{
    server::HttpMethod,
    status_code_registry::{self, ReasonPhrase},
};

#[derive(Error, Debug, Eq, PartialEq)]
#[error("header value contains control characters")]
pub struct InvalidHeaderValue;

#[derive(Debug)]
pub struct ResponseWriter {
    status_code: Option<u16>,
    reason_phrase: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    omit_body: bool,
}

impl ResponseWriter {
    pub fn new_empty() -> Self {
        Self {
            status_code: None,
            reason_phrase: None,
            headers: vec![],
            body: vec![],
            omit_body: false,
        }
    }

    #[cfg(test)]
    pub fn get_status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = Some(status_code);
        self.reason_phrase =
            status_code_registry::get_reason_phrase(status_code).map(|r| r.to_string());
    }

    pub fn set_reason_phrase(&mut self, reason_phrase: ReasonPhrase) {
        self.status_code = Some(status_code_registry::get_status_code(reason_phrase));
        self.reason_phrase = Some(reason_phrase.to_string());
    }

    fn add_header(&mut self, k: &str, v: String) {
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|entry| entry.0.eq_ignore_ascii_case(k))
        {
            entry.1 = v;
        } else {
            self.headers.push((k.to_owned(), v));
        }
    }

    #[cfg(test)]
    pub fn get_header(&self, k: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|entry| entry.0.eq_ignore_ascii_case(k))
            .map(|(_, v)| v.as_str())
    }

    pub fn add_allow_header(&mut self, http_methods: &[HttpMethod]) {
        let http_methods = http_methods
            .iter()
            .map(|m| m.to_string().to_uppercase())
            .collect::<Vec<_>>()
            .join(", ");
        self.add_header("Allow", http_methods);
    }

    pub fn add_connection_close_header(&mut self) {
        self.add_header("Connection", "close".to_owned());
    }

    /// Sets a redirect status pointing at `location`.
    ///
    /// A location that would break the header block is refused and leaves the
    /// writer untouched.
    pub fn redirect(&mut self, status_code: u16, location: &str) -> Result<(), InvalidHeaderValue> {
        if location.chars().any(char::is_control) {
            return Err(InvalidHeaderValue);
        }
        self.set_status_code(status_code);
        self.add_header("Location", location.to_owned());
        Ok(())
    }

    pub fn set_body(&mut self, body: Vec<u8>, content_type: &str) {
        self.body = body;
        self.add_header("Content-Type", content_type.to_owned());
    }

    /// Keeps the headers of the full response but sends no body, as for `HEAD`.
    pub fn omit_body(&mut self) {
        self.omit_body = true;
    }

    pub fn write(mut self) -> Vec<u8> {
        let status_code = self.status_code.unwrap_or(500);
        let mut status_line = format!("HTTP/1.1 {}", status_code);
        if let Some(reason_phrase) = &self.reason_phrase {
            status_line = format!("{} {}", status_line, reason_phrase);
        }
        status_line.push_str("\r\n");

        self.add_header("Content-Length", self.body.len().to_string());
        let mut headers = self
            .headers
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect::<String>();
        headers.push_str("\r\n");

        let mut resp = vec![];
        resp.extend(status_line.bytes());
        resp.extend(headers.bytes());
        if !self.omit_body {
            resp.extend(self.body);
        }
        resp
    }
}
