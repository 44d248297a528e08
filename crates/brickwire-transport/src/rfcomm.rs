//! Bluetooth RFCOMM (serial port profile) transport for Linux.
//!
//! EV3 bricks expose their direct-command interface on RFCOMM channel 1.
//! The socket is opened through `AF_BLUETOOTH` directly so no BlueZ D-Bus
//! client is needed; pairing must already have happened (out of scope).

use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{BrickStream, Transport};

const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc` from `<bluetooth/rfcomm.h>`.
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// A Bluetooth device address, stored in display order (`00:16:53:..`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr([u8; 6]);

impl BdAddr {
    /// Create an address from display-order octets.
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Display-order octets.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Kernel `bdaddr_t` layout (least significant octet first).
    fn to_wire(self) -> [u8; 6] {
        let mut wire = self.0;
        wire.reverse();
        wire
    }
}

impl FromStr for BdAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// A connected RFCOMM socket.
#[derive(Debug)]
pub struct RfcommStream {
    fd: OwnedFd,
}

impl RfcommStream {
    /// Open and connect an RFCOMM socket (blocking).
    pub fn connect(addr: BdAddr, channel: u8) -> io::Result<Self> {
        // SAFETY: plain socket(2) call; the result is checked before use.
        let raw = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let sockaddr = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: addr.to_wire(),
            rc_channel: channel,
        };
        // SAFETY: `sockaddr` is a valid `sockaddr_rc` for the duration of the call
        // and the length passed matches its size.
        let rc = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                (&sockaddr as *const SockaddrRc).cast::<libc::sockaddr>(),
                std::mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd })
    }

    fn set_timeout(&self, option: libc::c_int, timeout: Option<Duration>) -> io::Result<()> {
        let tv = match timeout {
            Some(d) if d.is_zero() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot set a zero timeout",
                ));
            }
            Some(d) => libc::timeval {
                tv_sec: d.as_secs() as libc::time_t,
                tv_usec: d.subsec_micros() as libc::suseconds_t,
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        // SAFETY: `tv` is a valid timeval and the length matches its size.
        let rc = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                (&tv as *const libc::timeval).cast::<libc::c_void>(),
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Read for RfcommStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
        let n = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
                0,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }
}

impl Write for RfcommStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: `buf` is valid for reads of `buf.len()` bytes.
        let n = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                libc::MSG_NOSIGNAL,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BrickStream for RfcommStream {
    fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            fd: self.fd.try_clone()?,
        })
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.set_timeout(libc::SO_RCVTIMEO, timeout)?)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.set_timeout(libc::SO_SNDTIMEO, timeout)?)
    }

    fn shutdown(&self) -> Result<()> {
        // SAFETY: the descriptor is owned by `self` and still open.
        let rc = unsafe { libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RDWR) };
        if rc < 0 {
            return crate::traits::ignore_not_connected(Err(io::Error::last_os_error()));
        }
        Ok(())
    }
}

/// Bluetooth RFCOMM transport.
#[derive(Debug)]
pub struct RfcommTransport {
    addr: BdAddr,
    channel: u8,
    active: Option<RfcommStream>,
}

impl RfcommTransport {
    /// RFCOMM channel the EV3 firmware listens on.
    pub const DEFAULT_CHANNEL: u8 = 1;

    /// Create a transport for a paired brick. Nothing is opened until `connect`.
    pub fn new(addr: BdAddr) -> Self {
        Self {
            addr,
            channel: Self::DEFAULT_CHANNEL,
            active: None,
        }
    }

    /// Override the RFCOMM channel.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    /// The device address.
    pub fn addr(&self) -> BdAddr {
        self.addr
    }

    /// The RFCOMM channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }
}

impl Transport for RfcommTransport {
    type Stream = RfcommStream;

    fn connect(&mut self) -> Result<RfcommStream> {
        let stream =
            RfcommStream::connect(self.addr, self.channel).map_err(|e| TransportError::Connect {
                target: format!("{}/{}", self.addr, self.channel),
                source: e,
            })?;
        self.active = Some(stream.try_clone()?);
        info!(addr = %self.addr, channel = self.channel, "connected over rfcomm");
        Ok(stream)
    }

    fn disconnect(&mut self) -> Result<()> {
        match self.active.take() {
            Some(stream) => {
                debug!(addr = %self.addr, "disconnecting rfcomm transport");
                stream.shutdown()
            }
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "rfcomm"
    }
}
