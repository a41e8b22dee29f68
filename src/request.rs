use std::io::{ErrorKind, Read};

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
    headers::Headers,
    multi_map::MultiMap,
    stream_reader::{LineTooLong, StreamReader},
};

pub use crate::stream_reader::EndOfFile;

const REQUEST_LINE_LIMIT: u64 = 1024;
const HEADERS_LIMIT: u64 = 8 * 1024;
const BODY_LIMIT: usize = 8 * 1024;

#[derive(Debug)]
struct RequestLine<'a> {
    line: &'a str,
}

impl<'a> RequestLine<'a> {
    fn new(line: &'a str) -> Self {
        Self { line }
    }

    fn part(&self, idx: usize) -> &'a str {
        self.line.split(' ').nth(idx).unwrap_or_default()
    }

    fn http_method(&self) -> &'a str {
        self.part(0)
    }

    fn request_target(&self) -> &'a str {
        self.part(1)
    }

    fn http_version(&self) -> &'a str {
        self.part(2)
    }
}

#[derive(Debug)]
pub struct Request {
    request_line: String,
    url: Url,
    query: MultiMap<String, String>,
    headers: Headers,
    body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(
        request_line: String,
        headers: Headers,
        body: Option<Vec<u8>>,
    ) -> Result<Self, InvalidRequest> {
        let line = RequestLine::new(&request_line);
        if request_line.split(' ').count() != 3 || !line.http_version().starts_with("HTTP/") {
            return Err(InvalidRequest);
        }
        let url = parse_target(line.request_target())?;
        let query = url.query_pairs().into_owned().collect();

        Ok(Self {
            request_line,
            url,
            query,
            headers,
            body,
        })
    }

    pub fn get_http_method(&self) -> &str {
        RequestLine::new(&self.request_line).http_method()
    }

    pub fn get_request_target(&self) -> &str {
        RequestLine::new(&self.request_line).request_target()
    }

    #[cfg(test)]
    pub fn get_http_version(&self) -> &str {
        RequestLine::new(&self.request_line).http_version()
    }

    /// Path of the target, still percent-encoded.
    pub fn get_path(&self) -> &str {
        self.url.path()
    }

    /// Percent-decoded query parameters.
    pub fn get_query(&self) -> &MultiMap<String, String> {
        &self.query
    }

    pub fn get_headers(&self) -> &Headers {
        &self.headers
    }

    pub fn get_body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Accepts origin-form targets only.
fn parse_target(target: &str) -> Result<Url, InvalidRequest> {
    if !target.starts_with('/') {
        return Err(InvalidRequest);
    }
    Url::parse(&format!("http://localhost{}", target)).map_err(|_| InvalidRequest)
}

#[derive(Error, Debug)]
#[error("invalid request")]
pub struct InvalidRequest;

#[derive(Error, Debug)]
#[error("request line too long")]
pub struct RequestLineTooLong;

#[derive(Error, Debug)]
#[error("request header fields too large")]
pub struct HeadersTooLarge;

pub struct RequestReader<R> {
    stream_reader: StreamReader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            stream_reader: StreamReader::new(r),
        }
    }

    pub fn read(&mut self) -> anyhow::Result<Request> {
        let request_line = match self.stream_reader.read_crlf_line(REQUEST_LINE_LIMIT) {
            Ok(line) => line,
            Err(err) if err.is::<LineTooLong>() => Err(RequestLineTooLong)?,
            Err(err) => return Err(err),
        };
        info!(?request_line);

        let mut headers = MultiMap::new_empty();
        let mut remaining = HEADERS_LIMIT;
        loop {
            if remaining == 0 {
                Err(HeadersTooLarge)?
            }
            let line = match self.stream_reader.read_crlf_line(remaining) {
                Ok(line) => line,
                Err(err) if err.is::<LineTooLong>() => Err(HeadersTooLarge)?,
                Err(err) => return Err(err),
            };
            remaining -= line.len() as u64 + 2;

            if line.is_empty() {
                break;
            }
            let (k, v) = line.split_once(':').ok_or(InvalidRequest)?;
            headers.insert_scalar(k.trim().to_lowercase(), v.trim().to_owned());
        }
        let headers = Headers::new(headers);

        let body = match headers.get_content_length().map_err(|_| InvalidRequest)? {
            Some(0) | None => None,
            Some(length) if length > BODY_LIMIT => Err(InvalidRequest)?,
            Some(length) => {
                let mut buf = vec![0; length];
                if let Err(err) = self.stream_reader.read_exact(&mut buf, length as u64) {
                    if err.kind() == ErrorKind::UnexpectedEof {
                        Err(InvalidRequest)?
                    } else {
                        Err(err)?
                    }
                }
                Some(buf)
            }
        };

        Ok(Request::new(request_line, headers, body)?)
    }
}
