use std::{
    io::{self, ErrorKind, Read, Write},
    sync::Arc,
};

use log::{debug, trace, warn};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    codec::{encode_request, find_header_end, random_user_agent, websocket_key},
    config::Config,
    pool::{BufferPool, PooledBuf},
    specification::{FIRST_REQUEST_FRAGMENTS, HEADER_TERMINATOR, WEBSOCKET_KEY_LEN},
};

/// Length of the random input accepted by the stream constructors:
/// 16 bytes of `Sec-WebSocket-Key` material followed by a 32-byte seed for
/// the generator of the cosmetic header values.
pub(crate) const RANDOM_LEN: usize = WEBSOCKET_KEY_LEN + 32;

/// The write half of the obfuscator.
///
/// The first two writes are held back, and the third is sent together with
/// them as the body of a single disguised request. Every later write goes
/// straight to the wire.
///
/// State Transition Diagram
/// ```text
///
///        |
///        V
///    Collecting (0, 1 or 2 fragments)
///        |
///        V
///     Flushing
///        |
///        V
///    Passthrough
///
/// ```
#[derive(Debug)]
pub(crate) struct RequestWriter {
    state: WriteState,
    host_header: String,
    key_material: [u8; WEBSOCKET_KEY_LEN],
    rng: StdRng,
}

#[derive(Debug)]
enum WriteState {
    Collecting {
        fragments: Vec<Vec<u8>>,
    },
    Flushing {
        request: Vec<u8>,
        n: usize,
        accepted: usize,
    },
    Passthrough,
}

impl RequestWriter {
    pub(crate) fn with_config_and_random(config: &Config, random: [u8; RANDOM_LEN]) -> Self {
        Self {
            state: WriteState::Collecting {
                fragments: Vec::with_capacity(FIRST_REQUEST_FRAGMENTS),
            },
            host_header: config.host_header(),
            key_material: random[..WEBSOCKET_KEY_LEN].try_into().unwrap(),
            rng: StdRng::from_seed(random[WEBSOCKET_KEY_LEN..].try_into().unwrap()),
        }
    }

    pub(crate) fn is_passthrough(&self) -> bool {
        matches!(self.state, WriteState::Passthrough)
    }

    /// Accepts `buf` from the caller, returning how many bytes were accepted.
    ///
    /// If the wire returns `WouldBlock` while the request is being sent, the
    /// request is kept and the next call resumes sending it. Such a call must
    /// pass the same `buf` again; it completes with that buffer's length.
    /// Any other error is returned once and the writer passes through from
    /// then on; the collected fragments are dropped.
    pub(crate) fn write(&mut self, wire: &mut dyn Write, buf: &[u8]) -> io::Result<usize> {
        loop {
            match &mut self.state {
                WriteState::Collecting { fragments } if fragments.len() < FIRST_REQUEST_FRAGMENTS => {
                    fragments.push(buf.to_vec());
                    return Ok(buf.len());
                }
                WriteState::Collecting { fragments } => {
                    let mut body = fragments.concat();
                    body.extend_from_slice(buf);
                    let request = encode_request(
                        &self.host_header,
                        &random_user_agent(&mut self.rng),
                        &websocket_key(&self.key_material),
                        &body,
                    );
                    debug!(
                        "sending obfuscated request to {} with {} bytes of payload",
                        self.host_header,
                        body.len()
                    );
                    self.state = WriteState::Flushing {
                        request,
                        n: 0,
                        accepted: buf.len(),
                    };
                }
                WriteState::Flushing { request, n, .. } if *n < request.len() => {
                    match send(wire, &request[*n..]) {
                        Ok(sent) => *n += sent,
                        Err(e) => return Err(self.abandon(e)),
                    }
                }
                WriteState::Flushing { accepted, .. } => {
                    let accepted = core::cmp::min(*accepted, buf.len());
                    self.state = WriteState::Passthrough;
                    trace!("request sent, writes pass through");
                    return Ok(accepted);
                }
                WriteState::Passthrough => return wire.write(buf),
            }
        }
    }

    /// Sends what is left of a partially sent request, then flushes the wire.
    ///
    /// Fragments that are still being collected are not sent.
    pub(crate) fn flush(&mut self, wire: &mut dyn Write) -> io::Result<()> {
        while let WriteState::Flushing { request, n, .. } = &mut self.state {
            if *n == request.len() {
                break;
            }
            match send(wire, &request[*n..]) {
                Ok(sent) => *n += sent,
                Err(e) => return Err(self.abandon(e)),
            }
        }
        wire.flush()
    }

    /// Gives up on the request unless `e` only asks to retry later.
    fn abandon(&mut self, e: io::Error) -> io::Error {
        if e.kind() != ErrorKind::WouldBlock {
            warn!("failed to send obfuscated request: {}", e);
            self.state = WriteState::Passthrough;
        }
        e
    }
}

/// Writes once, mapping a zero-length write to `WriteZero` and retrying
/// interrupted writes.
fn send(wire: &mut dyn Write, buf: &[u8]) -> io::Result<usize> {
    loop {
        match wire.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    ErrorKind::WriteZero,
                    "failed to write the obfuscated request",
                ));
            }
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// The read half of the obfuscator.
///
/// The first read from the wire must contain a complete response header.
/// The header is dropped, and the payload after it is handed to the caller,
/// holding back whatever does not fit. Every later read goes straight to the
/// wire.
///
/// State Transition Diagram
/// ```text
///
///           |
///           V
///    AwaitingHeader -------------+
///           |                    |
///           V                    |
///    DrainingHoldover            |
///           |                    |
///           V                    |
///      Passthrough <-------------+
///
/// ```
#[derive(Debug)]
pub(crate) struct ResponseReader {
    state: ReadState,
    pool: Arc<dyn BufferPool>,
}

#[derive(Debug)]
enum ReadState {
    AwaitingHeader,
    DrainingHoldover {
        buf: PooledBuf,
        offset: usize,
        end: usize,
    },
    Passthrough,
}

impl ResponseReader {
    pub(crate) fn with_pool(pool: Arc<dyn BufferPool>) -> Self {
        Self {
            state: ReadState::AwaitingHeader,
            pool,
        }
    }

    pub(crate) fn set_pool(&mut self, pool: Arc<dyn BufferPool>) {
        self.pool = pool;
    }

    pub(crate) fn is_passthrough(&self) -> bool {
        matches!(self.state, ReadState::Passthrough)
    }

    /// Reads payload into `buf`, returning how many bytes were read.
    ///
    /// Returns `Ok(0)` if the first chunk read from the wire does not contain
    /// the whole response header, even when the rest of it would follow.
    pub(crate) fn read(&mut self, wire: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            ReadState::DrainingHoldover {
                buf: holdover,
                offset,
                end,
            } => {
                let k = core::cmp::min(buf.len(), *end - *offset);
                buf[..k].copy_from_slice(&holdover[*offset..*offset + k]);
                *offset += k;
                if *offset == *end {
                    // Dropping the holdover gives it back to the pool.
                    self.state = ReadState::Passthrough;
                    trace!("response holdover drained, reads pass through");
                }
                Ok(k)
            }
            ReadState::AwaitingHeader => {
                let mut chunk = PooledBuf::acquire_from(&self.pool);
                let n = wire.read(&mut chunk)?;
                let Some(idx) = find_header_end(&chunk[..n]) else {
                    if n > 0 {
                        warn!("no response header terminator in the first {} bytes", n);
                    }
                    return Ok(0);
                };

                let start = idx + HEADER_TERMINATOR.len();
                debug!("stripped {} bytes of response header", start);
                if start == n {
                    // `Ok(0)` would read as end-of-stream; wait for payload.
                    drop(chunk);
                    self.state = ReadState::Passthrough;
                    return wire.read(buf);
                }

                let k = core::cmp::min(buf.len(), n - start);
                buf[..k].copy_from_slice(&chunk[start..start + k]);
                if start + k < n {
                    self.state = ReadState::DrainingHoldover {
                        buf: chunk,
                        offset: start + k,
                        end: n,
                    };
                } else {
                    self.state = ReadState::Passthrough;
                }
                Ok(k)
            }
            ReadState::Passthrough => wire.read(buf),
        }
    }
}
