use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Read, Write},
    mem,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use rustls::{ClientConnection, StreamOwned};

use super::{mock::MockStream, tls::TlsParameters};
use crate::error::{self, Error};

/// A network stream
pub struct NetworkStream {
    inner: InnerNetworkStream,
}

/// Represents the different types of underlying network streams
// usually only one TLS backend at a time is going to be enabled,
// so clippy::large_enum_variant doesn't make sense here
#[allow(clippy::large_enum_variant)]
enum InnerNetworkStream {
    /// Plain TCP stream
    Tcp(TcpStream),
    /// Encrypted TCP stream
    RustlsTls(Box<StreamOwned<ClientConnection, TcpStream>>),
    /// Mock stream
    Mock(MockStream),
    /// Can't be built
    None,
}

impl NetworkStream {
    fn new(inner: InnerNetworkStream) -> Self {
        NetworkStream { inner }
    }

    /// Wraps an in-memory stream
    pub fn new_mock(mock: MockStream) -> Self {
        Self::new(InnerNetworkStream::Mock(mock))
    }

    /// Returns peer's address
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.peer_addr(),
            InnerNetworkStream::RustlsTls(ref s) => s.get_ref().peer_addr(),
            InnerNetworkStream::Mock(_) => Ok(SocketAddr::from(([127, 0, 0, 1], 80))),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }

    /// Shutdowns the connection
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref s) => s.shutdown(how),
            InnerNetworkStream::RustlsTls(ref s) => s.get_ref().shutdown(how),
            InnerNetworkStream::Mock(_) | InnerNetworkStream::None => Ok(()),
        }
    }

    /// Opens a plain TCP connection to `server:port`
    ///
    /// Every resolved address is tried in turn, each one bounded by `timeout`.
    pub fn connect(
        server: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<NetworkStream, Error> {
        fn try_connect(addr: &SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
            match timeout {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            }
        }

        let addrs = (server, port)
            .to_socket_addrs()
            .map_err(error::connection)?;

        let mut last_err = None;
        for addr in addrs {
            match try_connect(&addr, timeout) {
                Ok(tcp_stream) => return Ok(Self::new(InnerNetworkStream::Tcp(tcp_stream))),
                Err(err) => last_err = Some(err),
            }
        }

        Err(match last_err {
            Some(last_err) => error::connection(last_err),
            None => error::connection("could not resolve to any address"),
        })
    }

    /// Switches a plain TCP stream to TLS, completing the handshake
    ///
    /// Already encrypted and mock streams are left as they are.
    pub fn upgrade_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        match mem::replace(&mut self.inner, InnerNetworkStream::None) {
            InnerNetworkStream::Tcp(tcp_stream) => {
                self.inner = Self::upgrade_tls_impl(tcp_stream, tls_parameters)?;
            }
            other => self.inner = other,
        }
        Ok(())
    }

    fn upgrade_tls_impl(
        mut tcp_stream: TcpStream,
        tls_parameters: &TlsParameters,
    ) -> Result<InnerNetworkStream, Error> {
        let server_name = tls_parameters.server_name()?;
        let mut connection = ClientConnection::new(Arc::clone(&tls_parameters.config), server_name)
            .map_err(error::tls)?;

        while connection.is_handshaking() {
            connection.complete_io(&mut tcp_stream).map_err(error::tls)?;
        }

        Ok(InnerNetworkStream::RustlsTls(Box::new(StreamOwned::new(
            connection, tcp_stream,
        ))))
    }

    /// Tells if the stream is encrypted
    pub fn is_encrypted(&self) -> bool {
        matches!(self.inner, InnerNetworkStream::RustlsTls(_))
    }

    /// Set read timeout for IO calls
    pub fn set_read_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut stream) => stream.set_read_timeout(duration),
            InnerNetworkStream::RustlsTls(ref mut stream) => {
                stream.get_ref().set_read_timeout(duration)
            }
            InnerNetworkStream::Mock(_) => Ok(()),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }

    /// Set write timeout for IO calls
    pub fn set_write_timeout(&mut self, duration: Option<Duration>) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut stream) => stream.set_write_timeout(duration),
            InnerNetworkStream::RustlsTls(ref mut stream) => {
                stream.get_ref().set_write_timeout(duration)
            }
            InnerNetworkStream::Mock(_) => Ok(()),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "stream lost during tls upgrade")
}

impl Debug for NetworkStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self.inner {
            InnerNetworkStream::Tcp(_) => "NetworkStream(Tcp)",
            InnerNetworkStream::RustlsTls(_) => "NetworkStream(RustlsTls)",
            InnerNetworkStream::Mock(_) => "NetworkStream(Mock)",
            InnerNetworkStream::None => "NetworkStream(None)",
        })
    }
}

impl Read for NetworkStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.read(buf),
            InnerNetworkStream::RustlsTls(ref mut s) => s.read(buf),
            InnerNetworkStream::Mock(ref mut s) => s.read(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}

impl Write for NetworkStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.write(buf),
            InnerNetworkStream::RustlsTls(ref mut s) => s.write(buf),
            InnerNetworkStream::Mock(ref mut s) => s.write(buf),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner {
            InnerNetworkStream::Tcp(ref mut s) => s.flush(),
            InnerNetworkStream::RustlsTls(ref mut s) => s.flush(),
            InnerNetworkStream::Mock(ref mut s) => s.flush(),
            InnerNetworkStream::None => Err(not_connected()),
        }
    }
}
