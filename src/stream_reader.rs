use std::io::{self, BufRead, BufReader, Read, Take};

use thiserror::Error;

#[derive(Error, Debug)]
#[error("end of file")]
pub struct EndOfFile;

#[derive(Error, Debug)]
#[error("line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: u64,
}

#[derive(Error, Debug)]
#[error("line is not terminated by CRLF")]
pub struct MissingCrlf;

pub struct StreamReader<R> {
    buf_reader: Take<BufReader<R>>,
}

impl<R: Read> StreamReader<R> {
    pub fn new(r: R) -> Self {
        Self {
            buf_reader: BufReader::new(r).take(u64::MAX),
        }
    }

    /// Reads one CRLF terminated line of at most `limit` bytes, terminator included,
    /// and returns it without the terminator.
    pub fn read_crlf_line(&mut self, limit: u64) -> anyhow::Result<String> {
        self.buf_reader.set_limit(limit);
        let mut line = String::new();
        let n = self.buf_reader.read_line(&mut line)?;
        if n == 0 {
            Err(EndOfFile)?
        }
        match line.strip_suffix("\r\n") {
            Some(stripped) => Ok(stripped.to_owned()),
            None if n as u64 == limit => Err(LineTooLong { limit })?,
            None => Err(MissingCrlf)?,
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8], limit: u64) -> io::Result<()> {
        self.buf_reader.set_limit(limit);
        self.buf_reader.read_exact(buf)
    }
}
