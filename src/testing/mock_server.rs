//! TCP server speaking the transport framing, for tests.

use crate::error::{NetworkError, Result};
use crate::network::rpc::{
    decode_message, frame_message, CacheRequest, CacheResponse, ClientResponse, Message,
};
use crate::types::Endpoint;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Handler for incoming cache requests.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a request and produce its response.
    fn handle(&self, request: CacheRequest) -> CacheResponse;
}

/// A cluster node stand-in listening on an OS-assigned local port.
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Bind and start serving in the background.
    pub async fn start(handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(NetworkError::Io)?;
        let addr = listener.local_addr().map_err(NetworkError::Io)?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let requests = Arc::new(AtomicUsize::new(0));

        info!(addr = %addr, "Mock server listening");

        let task = tokio::spawn(Self::run(listener, handler, requests.clone(), shutdown_rx));

        Ok(Self {
            addr,
            requests,
            shutdown_tx,
            task,
        })
    }

    /// Endpoint clients should connect to.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.ip().to_string(), self.addr.port())
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }

    async fn run(
        listener: TcpListener,
        handler: Arc<dyn RequestHandler>,
        requests: Arc<AtomicUsize>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!(peer = %peer_addr, "Accepted connection");
                            let handler = handler.clone();
                            let requests = requests.clone();
                            tokio::spawn(async move {
                                let result =
                                    Self::handle_connection(stream, handler, requests).await;
                                if let Err(e) = result {
                                    debug!(error = %e, "Connection handler error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Mock server shutting down");
                    break;
                }
            }
        }
    }

    async fn handle_connection(
        mut stream: TcpStream,
        handler: Arc<dyn RequestHandler>,
        requests: Arc<AtomicUsize>,
    ) -> Result<()> {
        loop {
            let mut len_buf = [0u8; 4];
            match stream.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(NetworkError::Io(e).into()),
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            let mut data = vec![0u8; len];
            stream.read_exact(&mut data).await.map_err(NetworkError::Io)?;

            let Message::Request(req) = decode_message(&data)? else {
                return Err(NetworkError::ReceiveFailed("expected a request".to_string()).into());
            };

            requests.fetch_add(1, Ordering::SeqCst);
            let response = handler.handle(req.request);

            let framed = frame_message(&Message::Response(ClientResponse {
                request_id: req.request_id,
                response,
            }))?;
            stream.write_all(&framed).await.map_err(NetworkError::Io)?;
        }
    }
}
