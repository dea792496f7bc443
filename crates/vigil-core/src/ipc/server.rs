//! TCP IPC server exposing a dispatcher to other processes.
//!
//! Binds a loopback address (by default with an OS-assigned port) and serves
//! one task per monitoring client. Each frame holds one JSON-RPC request and
//! is answered with one response frame, in order.

use super::protocol::{read_frame, write_frame, IpcRequest, IpcResponse};
use crate::config::IpcConfig;
use crate::Result;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Serves JSON-RPC method calls for the IPC server and the HTTP agent.
///
/// Implemented by [`Dispatcher`](crate::Dispatcher).
#[async_trait::async_trait]
pub trait IpcDispatch: Send + Sync + 'static {
    /// Run `method` with `params` and return its JSON result.
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value>;
}

/// A running IPC server. Dropping the handle stops it.
pub struct IpcServerHandle {
    pub addr: SocketAddr,
    pub port: u16,
    stop: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl IpcServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting clients and close every open connection.
    pub fn shutdown(&mut self) {
        if self.stop.send_replace(true) {
            return;
        }
        info!("IPC server on {} stopping", self.addr);
    }
}

impl Drop for IpcServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Entry points for starting an IPC server.
pub struct IpcServer;

impl IpcServer {
    /// Serve `dispatch` on [`IpcConfig::IPC_BIND_ADDR`].
    pub async fn start<D: IpcDispatch>(dispatch: Arc<D>) -> Result<IpcServerHandle> {
        Self::bind(IpcConfig::IPC_BIND_ADDR, dispatch).await
    }

    /// Serve `dispatch` on `addr`.
    pub async fn bind<D: IpcDispatch>(addr: &str, dispatch: Arc<D>) -> Result<IpcServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = watch::channel(false);
        let slots = Arc::new(Semaphore::new(IpcConfig::MAX_IPC_CONNECTIONS));

        info!("IPC server listening on {}", addr);
        let accept_task = tokio::spawn(accept_clients(listener, dispatch, stopped, slots));

        Ok(IpcServerHandle {
            addr,
            port: addr.port(),
            stop,
            accept_task: Some(accept_task),
        })
    }
}

async fn accept_clients<D: IpcDispatch>(
    listener: TcpListener,
    dispatch: Arc<D>,
    mut stopped: watch::Receiver<bool>,
    slots: Arc<Semaphore>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = stopped.wait_for(|stop| *stop) => return,
            accepted = listener.accept() => match accepted {
                Ok(client) => client,
                Err(e) => {
                    error!("IPC accept error: {}", e);
                    continue;
                }
            },
        };

        // Over the limit the stream is dropped, which the client sees as EOF.
        let Ok(permit) = slots.clone().try_acquire_owned() else {
            warn!(
                "Rejecting IPC client {}: {} connections open",
                peer,
                IpcConfig::MAX_IPC_CONNECTIONS
            );
            continue;
        };

        debug!("IPC client {} connected", peer);
        tokio::spawn(serve_client(
            stream,
            peer,
            dispatch.clone(),
            stopped.clone(),
            permit,
        ));
    }
}

async fn serve_client<D: IpcDispatch>(
    mut stream: TcpStream,
    peer: SocketAddr,
    dispatch: Arc<D>,
    mut stopped: watch::Receiver<bool>,
    _permit: OwnedSemaphorePermit,
) {
    let (mut reader, mut writer) = stream.split();
    loop {
        let frame = tokio::select! {
            _ = stopped.wait_for(|stop| *stop) => break,
            frame = read_frame(&mut reader) => frame,
        };
        let payload = match frame {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                debug!("IPC client {} sent an unreadable frame: {}", peer, e);
                break;
            }
        };

        let response = answer(dispatch.as_ref(), &payload).await;
        let written = match serde_json::to_vec(&response) {
            Ok(bytes) => write_frame(&mut writer, &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            debug!("IPC client {} dropped: {}", peer, e);
            break;
        }
    }
    debug!("IPC client {} disconnected", peer);
}

/// Produce the response to one request frame.
async fn answer<D: IpcDispatch>(dispatch: &D, payload: &[u8]) -> IpcResponse {
    let request: IpcRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => return IpcResponse::error(None, -32700, format!("Parse error: {}", e)),
    };
    if !request.has_supported_version() {
        return IpcResponse::error(
            request.id,
            -32600,
            format!("Invalid Request: unsupported jsonrpc version {}", request.jsonrpc),
        );
    }

    let params = request.params.unwrap_or_else(|| Value::Object(Default::default()));
    match dispatch.dispatch(&request.method, params).await {
        Ok(result) => IpcResponse::success(request.id, result),
        Err(e) => {
            debug!("IPC method {} failed: {}", request.method, e);
            IpcResponse::failure(request.id, &e)
        }
    }
}
