//! Content-Length framed transport.
//!
//! Each message is a header block followed by a payload:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//!
//! The transport is generic over its reader and writer so the same code
//! drives the loopback TCP connection and in-memory buffers in tests.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::TransportError;

/// Largest payload accepted from a peer: 16 MiB.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "content-length";

/// Reads and writes framed messages over a byte stream pair.
#[derive(Debug)]
pub struct FramedTransport<R, W: Write> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
    max_frame: usize,
}

impl FramedTransport<TcpStream, TcpStream> {
    /// Splits a TCP stream into a framed transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream handle cannot be duplicated.
    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        let reader = stream.try_clone()?;
        Ok(Self::new(reader, stream))
    }
}

impl<R: Read, W: Write> FramedTransport<R, W> {
    /// Creates a transport from a reader and writer.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            max_frame: MAX_FRAME_BYTES,
        }
    }

    /// Overrides the largest accepted payload size.
    #[must_use]
    pub const fn with_max_frame(mut self, limit: usize) -> Self {
        self.max_frame = limit;
        self
    }

    /// Sends one framed payload and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::FrameTooLarge`] for payloads over the limit,
    /// or an I/O failure from the writer.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > self.max_frame {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                limit: self.max_frame,
            });
        }
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());
        self.writer.write_all(header.as_bytes())?;
        self.writer.write_all(payload)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Receives one framed payload, blocking until it is complete.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] when the peer closes the
    /// stream, [`TransportError::MissingContentLength`] or
    /// [`TransportError::InvalidHeader`] for bad headers, and
    /// [`TransportError::FrameTooLarge`] for oversized frames.
    pub fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let length = self.read_headers()?;
        if length > self.max_frame {
            return Err(TransportError::FrameTooLarge {
                size: length,
                limit: self.max_frame,
            });
        }
        let mut payload = vec![0_u8; length];
        self.reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Serialises `message` as JSON and sends it.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or sending fails.
    pub fn send_json<T: Serialize>(&mut self, message: &T) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(message)?;
        self.send(&payload)
    }

    /// Receives a frame and decodes its JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if receiving fails or the payload does not decode
    /// as `T`.
    pub fn receive_json<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        let payload = self.receive()?;
        Ok(serde_json::from_slice(&payload)?)
    }

    fn read_headers(&mut self) -> Result<usize, TransportError> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            let (name, value) = trimmed
                .split_once(':')
                .ok_or(TransportError::InvalidHeader)?;
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let parsed = value
                    .trim()
                    .parse()
                    .map_err(|_| TransportError::InvalidHeader)?;
                content_length = Some(parsed);
            }
        }
        content_length.ok_or(TransportError::MissingContentLength)
    }
}
