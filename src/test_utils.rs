use std::{
    io::{self, ErrorKind, Read},
    iter::{self, Chain, Repeat},
    sync::{Arc, Mutex},
};

use crate::telemetry::{Event, Telemetry};

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
// ErrReader
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

pub struct ErrReader<I> {
    it: I,
}

impl<I> ErrReader<I> {
    pub fn new(prefix: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            it: prefix.into_iter(),
        }
    }
}

impl<'a, I: Iterator<Item = &'a u8>> Read for ErrReader<I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(byte) = self.it.next() {
            buf[0] = *byte;
            return Ok(1);
        }
        Err(io::Error::new(ErrorKind::Other, "error"))
    }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
// InfReader
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

pub struct InfReader {
    it: Chain<std::vec::IntoIter<u8>, Repeat<u8>>,
}

impl InfReader {
    pub fn new<'a, I: Iterator<Item = &'a u8>>(
        prefix: impl IntoIterator<IntoIter = I>,
        repeat: u8,
    ) -> Self {
        let prefix = prefix.into_iter().copied().collect::<Vec<_>>();
        Self {
            it: prefix.into_iter().chain(iter::repeat(repeat)),
        }
    }
}

impl Read for InfReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data: Vec<_> = self.it.by_ref().take(buf.len()).collect();
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -
// RecordingTelemetry
// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

#[derive(Clone, Default)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn track(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
