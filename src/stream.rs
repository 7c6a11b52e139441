use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr},
    sync::Arc,
    time::Duration,
};

use rand::{TryRngCore, rngs::OsRng};

use crate::{
    config::Config,
    connection::Connection,
    pool::{BufferPool, default_pool},
    state_machine::{RANDOM_LEN, RequestWriter, ResponseReader},
};

/// Blocking obfuscated stream.
///
/// [`ObfuscatedStream`] wraps a transport implementing [`Read`] and [`Write`]
/// and implements the same traits, allowing it to be used in place of the
/// transport (e.g. a [`TcpStream`]). Only the first request and the first
/// response are rewritten; afterwards every call passes through.
///
/// The read and write halves keep separate state. Reads may be issued from
/// one thread and writes from another if the transport allows splitting,
/// but each half expects one caller at a time.
///
/// [`TcpStream`]: std::net::TcpStream
#[derive(Debug)]
pub struct ObfuscatedStream<IO> {
    stream: IO,
    writer: RequestWriter,
    reader: ResponseReader,
}

impl<IO> ObfuscatedStream<IO> {
    /// Creates a new [`ObfuscatedStream`] instance from the underlying
    /// `stream` and the given `config`.
    ///
    /// The `Sec-WebSocket-Key` is drawn from the operating system's secure
    /// random source.
    pub fn with_config_in(config: Config, stream: IO) -> Self {
        let mut random = [0u8; RANDOM_LEN];
        OsRng
            .try_fill_bytes(&mut random)
            .expect("system random source failure");
        Self::with_config_and_random_in(config, random, stream)
    }

    /// Creates a new [`ObfuscatedStream`] instance from the underlying
    /// `stream`, the given `config` and 48 random bytes.
    ///
    /// The first 16 bytes become the `Sec-WebSocket-Key`, and the remaining
    /// 32 bytes seed the generator of the cosmetic `User-Agent` value.
    ///
    /// **Warning**: The `random` parameter must be sourced from a
    /// cryptographically secure entropy source, or the key of every
    /// connection becomes predictable. For general use cases, the
    /// `with_config_in` method is recommended.
    pub fn with_config_and_random_in(config: Config, random: [u8; 48], stream: IO) -> Self {
        Self {
            stream,
            writer: RequestWriter::with_config_and_random(&config, random),
            reader: ResponseReader::with_pool(default_pool()),
        }
    }

    /// Replaces the pool of the temporary buffer used to receive the
    /// response header. By default, a process-wide [`RelayBufferPool`] is
    /// used.
    ///
    /// [`RelayBufferPool`]: crate::RelayBufferPool
    pub fn with_buffer_pool(mut self, pool: Arc<dyn BufferPool>) -> Self {
        self.reader.set_pool(pool);
        self
    }

    /// Returns a reference to the internal stream.
    pub fn inner_stream(&self) -> &IO {
        &self.stream
    }

    /// Returns a mutable reference to the inner stream.
    ///
    /// Reading from or writing to it directly before the first exchange has
    /// completed corrupts the disguise.
    pub fn inner_stream_mut(&mut self) -> &mut IO {
        &mut self.stream
    }

    /// Consumes the [`ObfuscatedStream`], returning the inner stream.
    ///
    /// Buffered writes that were not yet sent and unread response payload
    /// are discarded.
    pub fn into_inner(self) -> IO {
        self.stream
    }

    /// Returns true once the disguised request has been sent and writes
    /// pass through.
    pub fn is_request_sent(&self) -> bool {
        self.writer.is_passthrough()
    }

    /// Returns true once the response header has been stripped, its payload
    /// delivered, and reads pass through.
    pub fn is_response_received(&self) -> bool {
        self.reader.is_passthrough()
    }
}

impl<IO: Read> Read for ObfuscatedStream<IO> {
    /// Reads payload from the underlying stream.
    ///
    /// The first read consumes a single chunk from the underlying stream. If
    /// that chunk does not contain the end of the response header, this
    /// function returns `Ok(0)`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(&mut self.stream, buf)
    }
}

impl<IO: Write> Write for ObfuscatedStream<IO> {
    /// Writes `buf` to the underlying stream.
    ///
    /// The first two calls only buffer `buf` and always succeed. The third
    /// call sends the disguised request carrying all three buffers.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(&mut self.stream, buf)
    }

    /// Flushes the underlying stream. The first two buffered writes are not
    /// sent by a flush.
    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush(&mut self.stream)
    }
}

impl<IO: Connection> Connection for ObfuscatedStream<IO> {
    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_write_timeout(timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}
