//! HTTP/1 boundary.
//!
//! The server owns the only I/O of the system: it collects each request,
//! runs the [`Dispatcher`] on tokio's blocking pool and writes the
//! [`Outcome`] back. Connections are not kept alive; one connection carries
//! one transaction.
//!
//! Asset bytes travel from the blocking pool to hyper through a bounded
//! channel. When the client goes away hyper drops the receiving end, which
//! the streamer observes as a disconnect.
//!
//! # Example
//!
//! ```rust,no_run
//! use syme_config::SymeConfig;
//! use syme_core::Response;
//! use syme_server::{Application, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = Application::new(SymeConfig::default());
//!     app.get("home", "/", |r: Response| r.write("hello").clone())?;
//!
//!     Server::from_config(app.build()).await?.run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use syme_core::Request;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::assets::{AssetDelivery, AssetSink};
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::ServerError;
use crate::shutdown::{InFlight, ShutdownSignal};
use crate::transport;

/// Body type of every response.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// The HTTP response type.
pub type HttpResponse = http::Response<ResponseBody>;

/// Chunks buffered between the streamer and the socket.
const ASSET_CHANNEL_DEPTH: usize = 4;

/// How long shutdown waits for open connections.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// A bound listener serving one [`Dispatcher`].
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Binds `addr`.
    pub async fn bind(addr: SocketAddr, dispatcher: Dispatcher) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        tracing::info!(addr = %addr, "listening");
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Binds the address named by the dispatcher's `server` configuration.
    pub async fn from_config(dispatcher: Dispatcher) -> Result<Self, ServerError> {
        let addr = dispatcher.config().server.socket_addr()?;
        Self::bind(addr, dispatcher).await
    }

    /// The address actually bound, useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.serve_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Serves until `shutdown` fires, then waits for open connections.
    pub async fn serve_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let in_flight = InFlight::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let guard = in_flight.enter();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, remote_addr, dispatcher).await {
                                tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                            }
                            drop(guard);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                () = shutdown.recv() => break,
            }
        }

        tracing::info!(open = in_flight.active(), "draining connections");
        if tokio::time::timeout(DRAIN_TIMEOUT, in_flight.drained())
            .await
            .is_err()
        {
            tracing::warn!(open = in_flight.active(), "drain timeout reached");
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |req: http::Request<Incoming>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { Ok::<_, Infallible>(handle(req, remote_addr, dispatcher).await) }
    });

    http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await
}

async fn handle(
    req: http::Request<Incoming>,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> HttpResponse {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::warn!(remote = %remote_addr, error = %e, "failed to read request body");
            return bare(400);
        }
    };

    let transport = transport::from_parts(parts, body, Some(remote_addr), dispatcher.config()).await;
    let dispatched = tokio::task::spawn_blocking(move || {
        let request = Request::from_transport(transport);
        dispatcher.dispatch(&request)
    })
    .await;

    match dispatched {
        Ok(Ok(outcome)) => render(outcome),
        // Already logged by the dispatcher.
        Ok(Err(_)) => bare(500),
        Err(e) => {
            tracing::error!(error = %e, "dispatch task panicked");
            bare(500)
        }
    }
}

/// Converts an outcome into a hyper response.
///
/// Asset outcomes start a transfer on the blocking pool; the returned body
/// yields its chunks.
pub fn render(outcome: Outcome) -> HttpResponse {
    let status = outcome.status();
    let headers = outcome.headers();

    let body = match outcome {
        Outcome::Send(negotiated) | Outcome::NotModified(negotiated) => {
            Full::new(negotiated.body).boxed_unsync()
        }
        Outcome::Asset(delivery) => stream_asset(delivery),
        _ => Empty::new().boxed_unsync(),
    };

    let mut builder = http::Response::builder().status(status);
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "response headers rejected");
        bare(500)
    })
}

struct ChannelSink {
    sender: mpsc::Sender<Bytes>,
}

impl AssetSink for ChannelSink {
    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }

    fn write_chunk(&mut self, chunk: Bytes) -> bool {
        self.sender.blocking_send(chunk).is_ok()
    }
}

fn stream_asset(delivery: AssetDelivery) -> ResponseBody {
    let (sender, receiver) = mpsc::channel::<Bytes>(ASSET_CHANNEL_DEPTH);

    tokio::task::spawn_blocking(move || {
        let path = delivery.path().to_path_buf();
        if let Err(e) = delivery.stream(&mut ChannelSink { sender }) {
            tracing::error!(path = %path.display(), error = %e, "asset transfer failed");
        }
    });

    let frames = futures_util::stream::unfold(receiver, |mut receiver| async move {
        receiver
            .recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Frame::data(chunk)), receiver))
    });
    StreamBody::new(frames).boxed_unsync()
}

fn bare(status: u16) -> HttpResponse {
    let mut response = http::Response::new(Empty::new().boxed_unsync());
    *response.status_mut() =
        http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use syme_config::{AssetsConfig, SymeConfigBuilder};
    use syme_core::Response;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::app::Application;

    async fn raw_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await.unwrap();
        String::from_utf8_lossy(&reply).into_owned()
    }

    fn application(assets: &TempDir) -> Application {
        Application::new(
            SymeConfigBuilder::new()
                .assets(AssetsConfig {
                    path: assets.path().to_path_buf(),
                    packet_size: 8,
                    packet_multiplier: 2,
                })
                .build(),
        )
    }

    #[tokio::test]
    async fn test_serve_with_immediate_shutdown() {
        let dir = TempDir::new().unwrap();
        let server = Server::bind("127.0.0.1:0".parse().unwrap(), application(&dir).build())
            .await
            .unwrap();

        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), server.serve_with_shutdown(shutdown))
            .await
            .expect("server should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let dir = TempDir::new().unwrap();
        let hundred: Vec<u8> = (b'a'..=b'z').cycle().take(100).collect();
        fs::write(dir.path().join("letters.txt"), &hundred).unwrap();

        let mut app = application(&dir);
        app.get("hello", "/hello/{name}", |attrs: syme_core::Attributes, r: Response| {
            let name = attrs.get("name").map(ToString::to_string).unwrap_or_default();
            r.write(&format!("hi {name}")).clone()
        })
        .unwrap();

        let server = Server::bind("127.0.0.1:0".parse().unwrap(), app.build())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(server.serve_with_shutdown(shutdown.clone()));

        let reply = raw_request(addr, "GET /hello/ada HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"), "{reply}");
        assert!(reply.to_ascii_lowercase().contains("vary: if-none-match"));
        assert!(reply.ends_with("hi ada"));

        let reply = raw_request(addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 404"), "{reply}");

        let reply = raw_request(
            addr,
            "GET /letters.txt HTTP/1.1\r\nHost: localhost\r\nRange: bytes=10-20\r\n\r\n",
        )
        .await;
        assert!(reply.starts_with("HTTP/1.1 206"), "{reply}");
        assert!(reply.to_ascii_lowercase().contains("content-range: bytes 10-20/100"));
        let expected = String::from_utf8(hundred[10..=20].to_vec()).unwrap();
        assert!(reply.ends_with(&expected), "{reply}");

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_render_bare_outcomes() {
        assert_eq!(render(Outcome::NotFound).status(), 404);
        assert_eq!(render(Outcome::NotImplemented).status(), 501);
        assert_eq!(render(Outcome::BadRequest).status(), 400);
        assert_eq!(render(Outcome::ServerError).status(), 500);

        let redirect = render(Outcome::Redirect {
            location: "/login".into(),
            status: 303,
        });
        assert_eq!(redirect.status(), 303);
        assert_eq!(redirect.headers()["location"], "/login");
    }
}
