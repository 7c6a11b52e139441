//! Httpobfs disguises the first bytes of a proxy session as an ordinary
//! HTTP/1.1 exchange, so that passive traffic inspection sees a WebSocket
//! style upgrade request and a normal response header instead of an opaque
//! handshake. It is the HTTP mode of the `simple-obfs` plugin.
//!
//! Httpobfs is obfuscation, not cryptography. It does not encrypt anything;
//! the protocol layered above it is expected to.
//!
//! ## Quick Start
//!
//! Httpobfs provides two interfaces: [`ObfuscatedStream`] and
//! [`AsyncObfuscatedStream`].
//!
//! * [`ObfuscatedStream`]
//!
//!   A blocking decorator over any transport implementing the [`Read`] and
//!   [`Write`] traits (e.g., [`TcpStream`]). It implements the same traits,
//!   so it can be handed to the proxy protocol in place of the transport.
//!
//! * [`AsyncObfuscatedStream`]
//!
//!   The same decorator for asynchronous transports implementing tokio's
//!   [`AsyncRead`] and [`AsyncWrite`] traits. It requires the
//!   `tokio-stream-impl` feature to be enabled.
//!
//! Both streams behave the same way:
//!
//! 1. The first two writes are buffered and reported as fully accepted.
//!    The third write sends a single `GET / HTTP/1.1` request whose body is
//!    the concatenation of all three. Every later write passes through.
//!
//! 2. The first read takes one chunk from the transport, drops everything up
//!    to and including the first `\r\n\r\n`, and returns the payload after it.
//!    Payload that does not fit in the caller's buffer is returned by the
//!    following reads. After that, every read passes through.
//!
//!    If the first chunk does not contain `\r\n\r\n`, the read returns
//!    `Ok(0)` (end-of-stream), even if the terminator would arrive with the
//!    next chunk.
//!
//! ## Configuration
//!
//! The only configuration is the host and port placed in the `Host` header,
//! passed through the [`Config`] struct. For details, refer to the
//! documentation of the [`config`] module.
//!
//! ## Logging
//!
//! Httpobfs logs through the [`log`] facade and does not install a logger.
//!
//! [`Read`]: std::io::Read
//! [`Write`]: std::io::Write
//! [`TcpStream`]: std::net::TcpStream
//! [`AsyncRead`]: tokio::io::AsyncRead
//! [`AsyncWrite`]: tokio::io::AsyncWrite
//! [`ObfuscatedStream`]: ObfuscatedStream
//! [`AsyncObfuscatedStream`]: AsyncObfuscatedStream
//! [`log`]: log
#![warn(missing_debug_implementations, missing_docs, unreachable_pub)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pool;

mod codec;
mod connection;
mod specification;
mod state_machine;
mod stream;

#[cfg(feature = "tokio-stream-impl")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio-stream-impl")))]
mod tokio_stream_impl;

pub use config::Config;
pub use connection::Connection;
pub use error::Error;
pub use pool::{BufferPool, RelayBufferPool};
pub use stream::ObfuscatedStream;

#[cfg(feature = "tokio-stream-impl")]
pub use tokio_stream_impl::AsyncObfuscatedStream;

#[cfg(test)]
mod test {
    use std::{
        collections::VecDeque,
        io::{self, ErrorKind, Read, Write},
        sync::atomic::{AtomicUsize, Ordering},
    };

    use crate::pool::BufferPool;

    /// A transport that serves scripted read chunks, one per `read`, and
    /// records every `write` separately.
    #[derive(Debug, Default)]
    pub(crate) struct MockStream {
        /// Chunks returned by successive reads. Empty means EOF.
        pub(crate) reads: VecDeque<Vec<u8>>,
        /// Errors returned by reads before any chunk is served.
        pub(crate) read_errors: VecDeque<ErrorKind>,
        /// Every successful write, in order.
        pub(crate) writes: Vec<Vec<u8>>,
        /// Errors returned by writes before any byte is accepted.
        pub(crate) write_errors: VecDeque<ErrorKind>,
        /// Upper bound of bytes accepted by one write.
        pub(crate) max_write: Option<usize>,
        pub(crate) fail_after: Option<(usize, ErrorKind)>,
        pub(crate) flushed: usize,
    }

    impl MockStream {
        /// Fails once with `kind` after `writes` more successful writes.
        pub(crate) fn write_errors_after(&mut self, writes: usize, kind: ErrorKind) {
            self.fail_after = Some((writes, kind));
        }

        /// Returns all written bytes.
        pub(crate) fn written(&self) -> Vec<u8> {
            self.writes.concat()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if let Some(kind) = self.read_errors.pop_front() {
                return Err(kind.into());
            }
            let Some(mut chunk) = self.reads.pop_front() else {
                return Ok(0);
            };
            let n = core::cmp::min(buf.len(), chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.reads.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.write_errors.pop_front() {
                return Err(kind.into());
            }
            match &mut self.fail_after {
                Some((0, kind)) => {
                    let kind = *kind;
                    self.fail_after = None;
                    return Err(kind.into());
                }
                Some((writes, _)) => *writes -= 1,
                None => {}
            }
            let n = core::cmp::min(buf.len(), self.max_write.unwrap_or(usize::MAX));
            if n > 0 {
                self.writes.push(buf[..n].to_vec());
            }
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushed += 1;
            Ok(())
        }
    }

    /// A pool that counts what goes in and out.
    #[derive(Debug, Default)]
    pub(crate) struct CountingPool {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingPool {
        pub(crate) fn acquired(&self) -> usize {
            self.acquired.load(Ordering::SeqCst)
        }

        pub(crate) fn outstanding(&self) -> usize {
            self.acquired() - self.released.load(Ordering::SeqCst)
        }
    }

    impl BufferPool for CountingPool {
        fn acquire(&self) -> Vec<u8> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            vec![0u8; 4096]
        }

        fn release(&self, buf: Vec<u8>) {
            assert_eq!(buf.len(), 4096);
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
