use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ClientError, DeliveryRequest, ReportClient};

/// How submissions map onto sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// One connected socket shared across all operations.
    Shared,
    /// A fresh socket per submission.
    PerRequest,
}

/// Unix datagram client for a locally running collector.
///
/// The blocking toggle is global: it applies to the shared socket right away
/// and to every per-request socket opened afterwards, mirroring the client
/// library's process-wide blocking mode.
#[derive(Debug)]
pub struct SocketClient {
    path: PathBuf,
    shared: Option<UnixDatagram>,
    blocking: AtomicBool,
}

impl SocketClient {
    /// Connect a shared blocking socket. The harness treats a failure here
    /// as fatal; every later send error is merely counted.
    pub fn connect(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let socket = open(&path, true)?;
        Ok(Self {
            path,
            shared: Some(socket),
            blocking: AtomicBool::new(true),
        })
    }

    pub fn set_blocking(&self, blocking: bool) -> Result<(), ClientError> {
        self.blocking.store(blocking, Ordering::Relaxed);
        if let Some(socket) = &self.shared {
            socket.set_nonblocking(!blocking)?;
        }
        Ok(())
    }

    /// Switch between the shared socket and fresh per-request sockets.
    pub fn set_mode(&mut self, mode: ConnectionMode) -> Result<(), ClientError> {
        match mode {
            ConnectionMode::Shared => {
                if self.shared.is_none() {
                    self.shared = Some(open(&self.path, self.blocking.load(Ordering::Relaxed))?);
                }
            }
            ConnectionMode::PerRequest => self.shared = None,
        }
        Ok(())
    }

    pub fn mode(&self) -> ConnectionMode {
        if self.shared.is_some() {
            ConnectionMode::Shared
        } else {
            ConnectionMode::PerRequest
        }
    }
}

fn open(path: &Path, blocking: bool) -> Result<UnixDatagram, ClientError> {
    let socket = UnixDatagram::unbound()?;
    socket.connect(path)?;
    socket.set_nonblocking(!blocking)?;
    Ok(socket)
}

impl ReportClient for SocketClient {
    fn submit(&self, report: &DeliveryRequest) -> Result<(), ClientError> {
        let payload = report.to_wire()?;
        match &self.shared {
            Some(socket) => {
                socket.send(&payload)?;
            }
            None => {
                let socket = open(&self.path, self.blocking.load(Ordering::Relaxed))?;
                socket.send(&payload)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FinalResult, PolicyBlock, PolicyType};

    fn request() -> DeliveryRequest {
        let mut req = DeliveryRequest::new("test-0.example.com", "v=TLSRPTv1");
        req.push_policy(
            PolicyBlock::new(PolicyType::Sts, Some("company-y.example"))
                .policy_string("version: STSv1")
                .finish(FinalResult::Success),
        );
        req
    }

    fn bound_receiver() -> (tempfile::TempDir, UnixDatagram, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.socket");
        let receiver = UnixDatagram::bind(&path).unwrap();
        (dir, receiver, path)
    }

    #[test]
    fn shared_socket_delivers_datagrams() {
        let (_dir, receiver, path) = bound_receiver();
        let client = SocketClient::connect(&path).unwrap();
        assert_eq!(client.mode(), ConnectionMode::Shared);

        client.submit(&request()).unwrap();

        let mut buf = [0u8; 65536];
        let n = receiver.recv(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf[..n]).unwrap();
        assert_eq!(value["d"], "test-0.example.com");
    }

    #[test]
    fn per_request_mode_reconnects_every_send() {
        let (_dir, receiver, path) = bound_receiver();
        let mut client = SocketClient::connect(&path).unwrap();
        client.set_mode(ConnectionMode::PerRequest).unwrap();
        assert_eq!(client.mode(), ConnectionMode::PerRequest);

        client.submit(&request()).unwrap();
        client.submit(&request()).unwrap();

        let mut buf = [0u8; 65536];
        assert!(receiver.recv(&mut buf).unwrap() > 0);
        assert!(receiver.recv(&mut buf).unwrap() > 0);
    }

    #[test]
    fn missing_endpoint_is_an_errno_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SocketClient::connect(dir.path().join("nowhere.socket")).unwrap_err();
        assert!(!err.is_internal());
        assert!(err.os_error().is_some());
    }

    #[test]
    fn blocking_toggle_applies_to_the_shared_socket() {
        let (_dir, _receiver, path) = bound_receiver();
        let client = SocketClient::connect(&path).unwrap();
        client.set_blocking(false).unwrap();
        client.set_blocking(true).unwrap();
    }
}
