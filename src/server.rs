use std::{
    io::{self, Write},
    net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use strum_macros::{Display, EnumIter, EnumString};
use tracing::{error, info, span, Level, Span};

use crate::{
    request::{EndOfFile, HeadersTooLarge, Request, RequestLineTooLong, RequestReader},
    response_writer::ResponseWriter,
    status_code_registry::ReasonPhrase,
};

const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, EnumIter, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn new(addr: impl ToSocketAddrs) -> anyhow::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn run(&self, handler: impl Handler) {
        thread::scope(|s| {
            for stream in self.listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(err) => {
                        error!(?err);
                        continue;
                    }
                };

                let handler = &handler;
                s.spawn(move || {
                    let span = create_conn_span(&stream);
                    let _guard = span.enter();
                    info!("new conn");

                    if let Err(err) = handle_connection(stream, Some(READ_TIMEOUT), handler) {
                        error!(?err);
                    }

                    info!("conn end");
                });
            }
        });
    }
}

#[derive(Debug)]
enum ConnCtrl {
    KeepAlive,
    Close,
}

fn handle_connection(
    stream: TcpStream,
    read_timeout: Option<Duration>,
    handler: &impl Handler,
) -> anyhow::Result<()> {
    let (reader, writer) = (&stream, &stream);
    reader.set_read_timeout(read_timeout)?;
    let mut request_reader = RequestReader::new(reader);

    loop {
        match handle_request(&mut request_reader, writer, handler)? {
            ConnCtrl::KeepAlive => continue,
            ConnCtrl::Close => return Ok(()),
        }
    }
}

fn handle_request(
    request_reader: &mut RequestReader<&TcpStream>,
    mut writer: &TcpStream,
    handler: &impl Handler,
) -> anyhow::Result<ConnCtrl> {
    let r = match request_reader.read() {
        Ok(r) => r,
        Err(err) => {
            if err.downcast_ref::<EndOfFile>().is_some() {
                return Ok(ConnCtrl::Close);
            }
            if err.is::<io::Error>() {
                return Err(err);
            }

            error!(?err);
            let reason_phrase = if err.is::<RequestLineTooLong>() {
                ReasonPhrase::URITooLong
            } else if err.is::<HeadersTooLarge>() {
                ReasonPhrase::RequestHeaderFieldsTooLarge
            } else {
                ReasonPhrase::BadRequest
            };
            let mut w = ResponseWriter::new_empty();
            w.set_reason_phrase(reason_phrase);
            w.add_connection_close_header();
            writer.write_all(&w.write())?;
            return Ok(ConnCtrl::Close);
        }
    };

    let span = create_req_span(&r);
    let _guard = span.enter();

    let conn_ctrl = match r
        .get_headers()
        .get_connection()
        .map(|mut it| it.any(|val| val.eq_ignore_ascii_case("close")))
    {
        Some(true) => ConnCtrl::Close,
        _ => ConnCtrl::KeepAlive,
    };

    let mut w = ResponseWriter::new_empty();
    handler.handle(&mut w, &r);
    if let ConnCtrl::Close = conn_ctrl {
        w.add_connection_close_header();
    }
    writer.write_all(&w.write())?;
    Ok(conn_ctrl)
}

fn create_conn_span(stream: &TcpStream) -> Span {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr.to_string(),
        Err(err) => {
            error!(?err);
            "unknown".to_owned()
        }
    };

    span!(Level::INFO, "conn", peer_addr)
}

fn create_req_span(r: &Request) -> Span {
    let http_method = r.get_http_method();
    let request_target = r.get_request_target();
    let body_len = r.get_body().map_or(0, <[u8]>::len);
    span!(
        Level::INFO,
        "req",
        method = http_method,
        target = request_target,
        body_len
    )
}

pub trait Handler: Sync {
    fn handle(&self, w: &mut ResponseWriter, r: &Request);
}

impl<T> Handler for T
where
    T: Fn(&mut ResponseWriter, &Request) + Sync,
{
    fn handle(&self, w: &mut ResponseWriter, r: &Request) {
        self(w, r)
    }
}

#[cfg(test)]
pub fn noop_handler() -> impl Handler {
    |_: &mut ResponseWriter, _: &Request| {}
}

#[cfg(test)]
pub mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::{TcpListener, TcpStream},
        str::FromStr,
        thread,
        time::Duration,
    };

    use crate::{
        request::Request, response_writer::ResponseWriter, status_code_registry::ReasonPhrase,
    };

    use super::{handle_connection, noop_handler, HttpMethod, Server};

    #[test]
    fn test_http_method_from_str() {
        assert_eq!(HttpMethod::from_str("GET").unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::from_str("head").unwrap(), HttpMethod::Head);
        assert!(HttpMethod::from_str("BREW").is_err());
        assert_eq!(HttpMethod::Options.to_string(), "Options");
    }

    #[test]
    fn test_request_reader_timeout() {
        let timeout = Some(Duration::from_millis(100));

        let listener = TcpListener::bind("localhost:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server_handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream, timeout, &noop_handler())
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\n").unwrap();

        server_handle.join().unwrap().unwrap_err();
    }

    #[test]
    fn test_persistent_connection() {
        let timeout = Some(Duration::from_millis(100));

        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || {
            server.run(|w: &mut ResponseWriter, _: &Request| {
                w.set_reason_phrase(ReasonPhrase::OK);
            });
        });

        let stream = TcpStream::connect(addr).unwrap();
        let (r, mut writer) = (&stream, &stream);
        r.set_read_timeout(timeout).unwrap();
        let mut reader = BufReader::new(r);

        writer.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        // Read to end tries to read until EOF but cannot do so
        // because the connection is not closed.
        // Instead, the timeout expires and an error is returned.
        let mut buf = vec![];
        let res = reader.read_to_end(&mut buf);
        res.unwrap_err();
    }

    #[test]
    fn test_connection_close() {
        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || {
            server.run(|w: &mut ResponseWriter, _: &Request| {
                w.set_reason_phrase(ReasonPhrase::OK);
            });
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .unwrap();

        let mut resp = String::new();
        stream.read_to_string(&mut resp).unwrap();
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_bad_request_closes_connection() {
        let server = Server::new("localhost:0").unwrap();
        let addr = server.local_addr().unwrap();

        thread::spawn(move || server.run(noop_handler()));

        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        (&stream).write_all(b"GET / HTTP/1.1\r\nbroken\r\n\r\n").unwrap();

        let mut status_line = String::new();
        BufReader::new(&stream).read_line(&mut status_line).unwrap();
        assert_eq!(status_line, "HTTP/1.1 400 Bad Request\r\n");
    }
}
