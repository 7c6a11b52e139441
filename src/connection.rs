use std::{
    io,
    net::{Shutdown, SocketAddr, TcpStream},
    time::Duration,
};

/// Connection control beyond reading and writing: closing, deadlines and
/// addresses.
///
/// [`ObfuscatedStream`] forwards every call to the stream it wraps, so a
/// decorated [`TcpStream`] can still be closed or given timeouts.
///
/// [`ObfuscatedStream`]: crate::ObfuscatedStream
pub trait Connection {
    /// Shuts down the read, write, or both halves of the connection.
    fn shutdown(&self, how: Shutdown) -> io::Result<()>;

    /// Sets the timeout of blocking reads. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Sets the timeout of blocking writes. `None` blocks indefinitely.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Returns the local address of the connection.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Returns the remote address of the connection.
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Closes both halves of the connection.
    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

impl Connection for TcpStream {
    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }
}
