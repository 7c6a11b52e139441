use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};
use std::{
    io::{ErrorKind, Read, Write},
    sync::Arc,
};

use pin_project_lite::pin_project;
use rand::{TryRngCore, rngs::OsRng};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::{
    config::Config,
    pool::{BufferPool, default_pool},
    state_machine::{RANDOM_LEN, RequestWriter, ResponseReader},
};

pin_project! {
    /// Asynchronous obfuscated stream based on `Tokio` runtime.
    ///
    /// [`AsyncObfuscatedStream`] implements the [`AsyncRead`] and
    /// [`AsyncWrite`] traits, allowing it to be used similarly to a
    /// [`TcpStream`]. It rewrites the first request and the first response
    /// exactly like [`ObfuscatedStream`].
    ///
    /// If the third write returns `Poll::Pending` while the disguised request
    /// is being sent, it must be polled again with the same buffer, as the
    /// [`AsyncWrite`] contract requires.
    ///
    /// [`TcpStream`]: tokio::net::TcpStream
    /// [`ObfuscatedStream`]: crate::ObfuscatedStream
    #[derive(Debug)]
    pub struct AsyncObfuscatedStream<IO> {
        stream: IO,
        writer: RequestWriter,
        reader: ResponseReader,
    }
}

impl<IO> AsyncObfuscatedStream<IO> {
    /// Creates a new [`AsyncObfuscatedStream`] instance from the underlying
    /// `stream` and the given `config`.
    pub fn with_config_in(config: Config, stream: IO) -> Self {
        let mut random = [0u8; RANDOM_LEN];
        OsRng
            .try_fill_bytes(&mut random)
            .expect("system random source failure");
        Self::with_config_and_random_in(config, random, stream)
    }

    /// Creates a new [`AsyncObfuscatedStream`] instance from the underlying
    /// `stream`, the given `config` and 48 random bytes.
    ///
    /// The first 16 bytes become the `Sec-WebSocket-Key`, and the remaining
    /// 32 bytes seed the generator of the cosmetic `User-Agent` value.
    ///
    /// **Warning**: The `random` parameter must be sourced from a
    /// cryptographically secure entropy source. For general use cases, the
    /// `with_config_in` method is recommended.
    pub fn with_config_and_random_in(config: Config, random: [u8; 48], stream: IO) -> Self {
        Self {
            stream,
            writer: RequestWriter::with_config_and_random(&config, random),
            reader: ResponseReader::with_pool(default_pool()),
        }
    }

    /// Replaces the pool of the temporary buffer used to receive the
    /// response header.
    pub fn with_buffer_pool(mut self, pool: Arc<dyn BufferPool>) -> Self {
        self.reader.set_pool(pool);
        self
    }

    /// Returns a reference to the internal stream.
    pub fn inner_stream(&self) -> &IO {
        &self.stream
    }

    /// Returns a mutable reference to the inner stream.
    pub fn inner_stream_mut(&mut self) -> &mut IO {
        &mut self.stream
    }

    /// Consumes the [`AsyncObfuscatedStream`], returning the inner stream.
    pub fn into_inner(self) -> IO {
        self.stream
    }

    /// Returns true once the disguised request has been sent.
    pub fn is_request_sent(&self) -> bool {
        self.writer.is_passthrough()
    }

    /// Returns true once the response header has been stripped and its
    /// payload delivered.
    pub fn is_response_received(&self) -> bool {
        self.reader.is_passthrough()
    }
}

impl<IO> AsyncRead for AsyncObfuscatedStream<IO>
where
    IO: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let me = self.project();
        let mut reader = SyncReadAdapter { io: me.stream, cx };
        match me.reader.read(&mut reader, buf.initialize_unfilled()) {
            Ok(n) => {
                buf.advance(n);
                Poll::Ready(Ok(()))
            }

            // Wait for more data, pending.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Poll::Pending,

            // general I/O error.
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl<IO> AsyncWrite for AsyncObfuscatedStream<IO>
where
    IO: AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        let me = self.project();
        let mut writer = SyncWriteAdapter { io: me.stream, cx };
        match me.writer.write(&mut writer, buf) {
            Ok(n) => Poll::Ready(Ok(n)),

            // pending, wait for I/O.
            Err(e) if e.kind() == ErrorKind::WouldBlock => Poll::Pending,

            // I/O error from the writer.
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        let me = self.project();
        let mut writer = SyncWriteAdapter { io: me.stream, cx };
        match me.writer.flush(&mut writer) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        ready!(self.as_mut().poll_flush(cx))?;
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// An adapter that implements a [`Read`] interface for [`AsyncRead`] types and an
/// associated [`Context`].
///
/// Turns `Poll::Pending` into `WouldBlock`.
///
/// The credit goes to the [futures-rustls](https://github.com/rustls/futures-rustls)
/// project for this adapter.
struct SyncReadAdapter<'a, 'b, T> {
    io: &'a mut T,
    cx: &'a mut Context<'b>,
}

impl<T: AsyncRead + Unpin> Read for SyncReadAdapter<'_, '_, T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut buf = ReadBuf::new(buf);
        match Pin::new(&mut self.io).poll_read(self.cx, &mut buf) {
            Poll::Ready(Ok(())) => Ok(buf.filled().len()),
            Poll::Ready(Err(err)) => Err(err),
            Poll::Pending => Err(ErrorKind::WouldBlock.into()),
        }
    }
}

/// An adapter that implements a [`Write`] interface for [`AsyncWrite`] types and an
/// associated [`Context`].
///
/// Turns `Poll::Pending` into `WouldBlock`.
struct SyncWriteAdapter<'a, 'b, T> {
    io: &'a mut T,
    cx: &'a mut Context<'b>,
}

impl<T: AsyncWrite + Unpin> Write for SyncWriteAdapter<'_, '_, T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match Pin::new(&mut self.io).poll_write(self.cx, buf) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(ErrorKind::WouldBlock.into()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match Pin::new(&mut self.io).poll_flush(self.cx) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(ErrorKind::WouldBlock.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt, duplex},
        net::{TcpListener, TcpStream},
        spawn,
    };

    use super::*;
    use crate::test::CountingPool;

    const RESPONSE_HEAD: &[u8] =
        b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n";

    /// Reads a request head from `stream`, returning the head and the body
    /// bytes that arrived with it.
    async fn read_request_head<S: AsyncRead + Unpin>(stream: &mut S) -> (String, Vec<u8>) {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before the request head");
            received.extend_from_slice(&buf[..n]);
            if let Some(idx) = received.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8(received[..idx].to_vec()).unwrap();
                return (head, received[idx + 4..].to_vec());
            }
        }
    }

    fn content_length(head: &str) -> usize {
        head.split("\r\n")
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_async_handshake_over_small_pipe() {
        // A 16-byte pipe forces the request out in many pending writes.
        let (client_inner, mut server) = duplex(16);
        let pool = Arc::new(CountingPool::default());
        let mut client = AsyncObfuscatedStream::with_config_and_random_in(
            Config::builder_with_host("example.com").with_port("8080"),
            [1; 48],
            client_inner,
        )
        .with_buffer_pool(pool.clone());

        let server_task = spawn(async move {
            let (head, mut body) = read_request_head(&mut server).await;
            assert!(head.starts_with("GET / HTTP/1.1\r\nHost: example.com:8080\r\n"));
            let len = content_length(&head);
            let mut rest = vec![0u8; len - body.len()];
            server.read_exact(&mut rest).await.unwrap();
            body.extend_from_slice(&rest);
            assert_eq!(body, b"ivaddresspayload");
            server
        });

        client.write_all(b"iv").await.unwrap();
        client.write_all(b"address").await.unwrap();
        assert!(!client.is_request_sent());
        client.write_all(b"payload").await.unwrap();
        client.flush().await.unwrap();
        assert!(client.is_request_sent());
        let mut server = server_task.await.unwrap();

        // A first chunk without the header terminator reads as end-of-stream,
        // even though the rest of the header would follow.
        server.write_all(&RESPONSE_HEAD[..16]).await.unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        assert!(!client.is_response_received());
        assert_eq!(pool.acquired(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_async_read_write_echo() {
        const DATA_LEN: usize = 65536 * 4;
        let data: Vec<u8> = (0..DATA_LEN).map(|i| i as u8).collect();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_task = spawn(async move {
            let (mut server, _) = listener.accept().await.unwrap();
            let (head, mut body) = read_request_head(&mut server).await;
            let len = content_length(&head);
            let mut rest = vec![0u8; len - body.len()];
            server.read_exact(&mut rest).await.unwrap();
            body.extend_from_slice(&rest);
            assert_eq!(body, b"ivaddrhello");

            // Response header and the first payload in one segment.
            let mut response = RESPONSE_HEAD.to_vec();
            response.extend_from_slice(b"welcome");
            server.write_all(&response).await.unwrap();

            // Plain echo afterwards.
            let mut buf = vec![0u8; DATA_LEN];
            server.read_exact(&mut buf).await.unwrap();
            server.write_all(&buf).await.unwrap();
        });

        let client_inner = TcpStream::connect(addr).await.unwrap();
        let mut client = AsyncObfuscatedStream::with_config_in(
            Config::builder_with_host("www.bing.com").with_default_port(),
            client_inner,
        );
        client.write_all(b"iv").await.unwrap();
        client.write_all(b"addr").await.unwrap();
        client.write_all(b"hello").await.unwrap();

        let mut welcome = [0u8; 7];
        client.read_exact(&mut welcome[..3]).await.unwrap();
        client.read_exact(&mut welcome[3..]).await.unwrap();
        assert_eq!(&welcome, b"welcome");
        assert!(client.is_response_received());

        client.write_all(&data).await.unwrap();
        let mut echoed = vec![0u8; DATA_LEN];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(echoed, data);

        client.shutdown().await.unwrap();
        server_task.await.unwrap();
    }
}
