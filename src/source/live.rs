use std::ffi::CString;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use log::{debug, info};

use super::{FrameSource, SourceEvent};
use crate::error::SourceError;
use crate::frame::{Frame, Timestamp};

const RECV_BUF_LEN: usize = 65536;

/// Raw AF_PACKET socket bound to one interface, receiving every EtherType.
pub struct LiveSource {
    fd: OwnedFd,
    iface: String,
    buf: Vec<u8>,
}

impl LiveSource {
    pub fn open(iface: &str, read_timeout: Duration) -> Result<Self, SourceError> {
        let protocol = (libc::ETH_P_ALL as u16).to_be();
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                protocol as libc::c_int,
            )
        };
        if fd < 0 {
            return Err(open_error(iface, io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let ifname = CString::new(iface).map_err(|_| SourceError::InterfaceUnavailable {
            iface: iface.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"),
        })?;
        let ifindex = unsafe { libc::if_nametoindex(ifname.as_ptr()) };
        if ifindex == 0 {
            return Err(open_error(iface, io::Error::last_os_error()));
        }

        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = ifindex as libc::c_int;

        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const _ as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(open_error(iface, io::Error::last_os_error()));
        }

        let timeout = libc::timeval {
            tv_sec: read_timeout.as_secs() as libc::time_t,
            tv_usec: read_timeout.subsec_micros() as libc::suseconds_t,
        };
        let rc = unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &timeout as *const _ as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(open_error(iface, io::Error::last_os_error()));
        }

        info!("bound raw socket to {iface} (ifindex {ifindex})");
        Ok(Self {
            fd,
            iface: iface.to_string(),
            buf: vec![0u8; RECV_BUF_LEN],
        })
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Result<SourceEvent, SourceError> {
        // MSG_TRUNC makes recv report the wire length even when it exceeds the buffer.
        let n = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                self.buf.as_mut_ptr() as *mut libc::c_void,
                self.buf.len(),
                libc::MSG_TRUNC,
            )
        };
        let timestamp = Timestamp::now();

        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                    Ok(SourceEvent::Idle)
                }
                _ => Err(SourceError::Read(err)),
            };
        }

        let wire_len = n as usize;
        let captured = wire_len.min(self.buf.len());
        if wire_len > captured {
            debug!("frame of {wire_len} bytes truncated to {captured}");
        }

        Ok(SourceEvent::Frame(Frame::with_orig_len(
            self.buf[..captured].to_vec(),
            timestamp,
            wire_len,
        )))
    }

    fn is_live(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("interface {}", self.iface)
    }
}

fn open_error(iface: &str, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => SourceError::PermissionDenied {
            what: format!("interface {iface}"),
        },
        _ => SourceError::InterfaceUnavailable {
            iface: iface.to_string(),
            source: err,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface_is_rejected() {
        // Without CAP_NET_RAW the socket call fails first; either way it is an error.
        let result = LiveSource::open("no-such-iface0", Duration::from_millis(10));
        assert!(matches!(
            result,
            Err(SourceError::InterfaceUnavailable { .. }) | Err(SourceError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_open_error_maps_permission() {
        let err = open_error("eth0", io::Error::from_raw_os_error(libc::EPERM));
        assert!(matches!(err, SourceError::PermissionDenied { .. }));
    }
}
