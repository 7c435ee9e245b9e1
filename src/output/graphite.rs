//! Graphite plaintext protocol sink.

use crate::output::{MetricSink, SinkError};
use std::fmt;
use std::io::{self, Write};
use std::net::TcpStream;
use std::time::SystemTime;
use tracing::debug;

/// Default Carbon plaintext listener port.
pub const DEFAULT_PORT: u16 = 2003;

/// One line of the Graphite plaintext protocol: `path value timestamp`.
#[derive(Debug, PartialEq)]
pub struct Line<'a> {
    pub prefix: &'a str,
    pub name: &'a str,
    pub value: f64,
    pub timestamp: SystemTime,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        if !self.prefix.is_empty() {
            write!(fmt, "{}.", self.prefix)?;
        }
        let seconds = self
            .timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        write!(fmt, "{} {} {}", self.name, self.value, seconds)
    }
}

/// Sends each sample as one plaintext line to `writer`, flushing per sample.
pub struct GraphiteSink<W: Write> {
    writer: W,
    prefix: String,
    clock: fn() -> SystemTime,
}

impl<W: Write> GraphiteSink<W> {
    /// Create a sink prepending `prefix` to every metric name.
    ///
    /// Trailing dots in the prefix are dropped so `home.` and `home` behave
    /// the same.
    pub fn new(writer: W, prefix: &str) -> Self {
        Self {
            writer,
            prefix: prefix.trim_end_matches('.').to_string(),
            clock: SystemTime::now,
        }
    }

    /// Use a fixed clock for timestamps.
    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MetricSink for GraphiteSink<W> {
    fn send(&mut self, name: &str, value: f64) -> Result<(), SinkError> {
        let line = Line {
            prefix: &self.prefix,
            name,
            value,
            timestamp: (self.clock)(),
        };
        debug!(%line, "sending metric");
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| SinkError::Send {
                name: name.to_string(),
                source,
            })
    }
}

/// A TCP stream that connects on first write.
///
/// Lets a sink be configured up front without touching the network when
/// nothing is ever sent (for example in dry-run mode).
#[derive(Debug)]
pub struct LazyTcpStream {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl LazyTcpStream {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                debug!(host = %self.host, port = self.port, "connecting to Graphite");
                TcpStream::connect((self.host.as_str(), self.port))?
            }
        };
        Ok(self.stream.insert(stream))
    }
}

impl Write for LazyTcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::time::Duration;

    fn fixed_clock() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_line_format() {
        let line = Line {
            prefix: "home.basement",
            name: "temperature",
            value: 22.5,
            timestamp: fixed_clock(),
        };
        assert_eq!(line.to_string(), "home.basement.temperature 22.5 1700000000");
    }

    #[test]
    fn test_line_without_prefix() {
        let line = Line {
            prefix: "",
            name: "pressure",
            value: 20.26,
            timestamp: SystemTime::UNIX_EPOCH,
        };
        assert_eq!(line.to_string(), "pressure 20.26 0");
    }

    #[test]
    fn test_line_whole_number() {
        let line = Line {
            prefix: "p",
            name: "carbon_dioxide_level",
            value: 400.0,
            timestamp: fixed_clock(),
        };
        assert_eq!(line.to_string(), "p.carbon_dioxide_level 400 1700000000");
    }

    #[test]
    fn test_graphite_sink() {
        let mut sink = GraphiteSink::new(Vec::new(), "wave.").with_clock(fixed_clock);
        sink.send("humidity", 50.0).unwrap();
        sink.send("temperature", 22.0).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "wave.humidity 50 1700000000\nwave.temperature 22 1700000000\n"
        );
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_graphite_sink_write_error() {
        let mut sink = GraphiteSink::new(BrokenPipe, "wave");
        let err = sink.send("voc_level", 1.0).unwrap_err();
        let SinkError::Send { name, source } = err;
        assert_eq!(name, "voc_level");
        assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_lazy_tcp_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = LazyTcpStream::new("127.0.0.1", port);
        assert!(!stream.is_connected());

        let mut sink = GraphiteSink::new(stream, "wave").with_clock(fixed_clock);
        sink.send("light", 3.0).unwrap();
        assert!(sink.into_inner().is_connected());

        let (conn, _) = listener.accept().unwrap();
        let mut received = String::new();
        BufReader::new(conn).read_line(&mut received).unwrap();
        assert_eq!(received, "wave.light 3 1700000000\n");
    }

    #[test]
    fn test_lazy_tcp_stream_flush() {
        let mut stream = LazyTcpStream::new("192.0.2.1", DEFAULT_PORT);
        stream.flush().unwrap();
        assert!(!stream.is_connected());
    }
}
