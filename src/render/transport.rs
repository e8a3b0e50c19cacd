//! Transport seam between the engine and the host HTTP server.
//!
//! The engine never listens or binds; it writes through this trait and
//! observes peer disconnects through [`CloseSignal`]. Writes are async so a
//! slow client never blocks other in-flight requests.

use std::io;
use tokio::sync::watch;

/// Signal that resolves when the peer closes the connection.
///
/// Backed by a watch channel; if the notifier is dropped without firing, the
/// signal never resolves.
#[derive(Debug, Clone)]
pub struct CloseSignal(watch::Receiver<bool>);

/// Host-side handle that fires the paired [`CloseSignal`].
#[derive(Debug)]
pub struct CloseNotifier(watch::Sender<bool>);

impl CloseSignal {
    pub fn pair() -> (CloseNotifier, CloseSignal) {
        let (tx, rx) = watch::channel(false);
        (CloseNotifier(tx), CloseSignal(rx))
    }

    /// Wait for the peer to go away.
    pub async fn closed(mut self) {
        if self.0.wait_for(|closed| *closed).await.is_err() {
            // Notifier dropped without closing: stay pending forever.
            std::future::pending::<()>().await;
        }
    }
}

impl CloseNotifier {
    pub fn close(&self) {
        let _ = self.0.send(true);
    }
}

/// Outbound side of one request.
pub trait Transport: Send {
    /// Write a provisional block (Early Hints) straight to the socket,
    /// before the main status line.
    fn write_raw(&mut self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Commit status and headers. Called at most once per request.
    fn write_head(
        &mut self,
        status: u16,
        headers: &[(String, String)],
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Write one body chunk.
    fn write_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Complete the response.
    fn finish(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Close signal for this connection.
    fn close_signal(&self) -> CloseSignal;
}

/// Handle that fires a transport's close signal from outside.
///
/// Mirrors a peer that stopped reading: the connection is reported closed,
/// while already-accepted writes still land in the local buffer.
#[derive(Debug, Clone)]
pub struct PeerHandle(std::sync::Arc<CloseNotifier>);

impl PeerHandle {
    pub fn disconnect(&self) {
        self.0.close();
    }
}

/// In-memory transport for tests and embedded hosts.
#[derive(Debug)]
pub struct MemoryTransport {
    pub raw: Vec<u8>,
    pub head: Option<(u16, Vec<(String, String)>)>,
    pub body: Vec<u8>,
    pub finished: bool,
    notifier: std::sync::Arc<CloseNotifier>,
    signal: CloseSignal,
    peer_gone: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (notifier, signal) = CloseSignal::pair();
        Self {
            raw: Vec::new(),
            head: None,
            body: Vec::new(),
            finished: false,
            notifier: std::sync::Arc::new(notifier),
            signal,
            peer_gone: false,
        }
    }

    /// Handle for signalling a disconnect while the engine holds the
    /// transport.
    pub fn peer(&self) -> PeerHandle {
        PeerHandle(std::sync::Arc::clone(&self.notifier))
    }

    /// Simulate a hard disconnect; later writes fail.
    pub fn close_peer(&mut self) {
        self.peer_gone = true;
        self.notifier.close();
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn status(&self) -> Option<u16> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.as_ref().and_then(|(_, headers)| {
            headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    fn check_peer(&self) -> io::Result<()> {
        if self.peer_gone {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer disconnected",
            ));
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    async fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.check_peer()?;
        self.raw.extend_from_slice(bytes);
        Ok(())
    }

    async fn write_head(&mut self, status: u16, headers: &[(String, String)]) -> io::Result<()> {
        self.check_peer()?;
        self.head = Some((status, headers.to_vec()));
        Ok(())
    }

    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.check_peer()?;
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }

    fn close_signal(&self) -> CloseSignal {
        self.signal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_records_writes() {
        let mut transport = MemoryTransport::new();
        transport
            .write_head(200, &[("content-type".into(), "text/html".into())])
            .await
            .unwrap();
        transport.write_chunk(b"<html>").await.unwrap();
        transport.finish().await.unwrap();

        assert_eq!(transport.status(), Some(200));
        assert_eq!(transport.header("Content-Type"), Some("text/html"));
        assert_eq!(transport.body_str(), "<html>");
        assert!(transport.finished);
    }

    #[tokio::test]
    async fn test_close_signal_fires() {
        let mut transport = MemoryTransport::new();
        let signal = transport.close_signal();
        transport.close_peer();

        signal.closed().await;
        assert!(transport.write_chunk(b"x").await.is_err());
    }
}
