//! UDP receive socket for scanner telegrams
//!
//! Thin wrapper over a bound `UdpSocket` with a one-second read timeout so
//! the daemon loop can poll its shutdown flag between datagrams. The
//! receive buffer is allocated once and reused.

use crate::error::Result;
use std::net::UdpSocket;
use std::time::Duration;

/// Read timeout so the caller's loop stays responsive
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Bound UDP socket with a reusable receive buffer
pub struct UdpListener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpListener {
    /// Bind to `listen_address` with the given receive buffer size
    pub fn bind(listen_address: &str, recv_buffer_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(listen_address)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        log::info!("Listening for scanner telegrams on {}", listen_address);
        Ok(Self {
            socket,
            buf: vec![0u8; recv_buffer_size],
        })
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive one datagram
    ///
    /// Returns `None` on timeout; receive errors are logged and also
    /// yield `None` so the caller's loop just continues.
    pub fn recv(&mut self) -> Option<&[u8]> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((len, addr)) => {
                log::trace!("Received {} bytes from {}", len, addr);
                Some(&self.buf[..len])
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                None
            }
            Err(e) => {
                log::error!("Receive error: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receives_datagram() {
        let mut listener = UdpListener::bind("127.0.0.1:0", 1024).unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"hello scanner", addr).unwrap();

        let data = listener.recv().expect("datagram should arrive");
        assert_eq!(data, b"hello scanner");
    }

    #[test]
    fn test_truncates_to_datagram_length() {
        let mut listener = UdpListener::bind("127.0.0.1:0", 1024).unwrap();
        let addr = listener.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[0xAA; 5], addr).unwrap();

        let data = listener.recv().unwrap();
        assert_eq!(data.len(), 5);
    }
}
