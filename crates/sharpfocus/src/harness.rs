//! The generic server harness: client handle, initialize handshake and the
//! hand-off into a driver's main loop.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use log::{info, warn};
use lsp_server::{Connection, Message, Response};
use lsp_types::InitializedParams;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;

type ReqQueue = lsp_server::ReqQueue<(String, Instant), ()>;

/// A handle to the editor on the other end of the connection.
///
/// Clones share one request queue and one outgoing channel, so any worker
/// thread may respond or notify. The channel slot is emptied when the
/// connection drops; late senders only log.
pub struct LspClient {
    sender: Arc<RwLock<Option<Sender<Message>>>>,
    req_queue: Arc<Mutex<ReqQueue>>,
}

impl Clone for LspClient {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            req_queue: self.req_queue.clone(),
        }
    }
}

impl LspClient {
    /// Wraps the outgoing half of a connection.
    pub fn new(sender: Arc<RwLock<Option<Sender<Message>>>>) -> Self {
        Self {
            sender,
            req_queue: Arc::new(Mutex::new(ReqQueue::default())),
        }
    }

    /// Records an incoming request so its response can be paired up later.
    pub fn register_request(&self, request: &lsp_server::Request, received: Instant) {
        let mut req_queue = self.req_queue.lock();
        info!("handling {} - ({})", request.method, request.id);
        req_queue
            .incoming
            .register(request.id.clone(), (request.method.clone(), received));
    }

    /// Sends the response of a previously registered request. Responding
    /// twice for one id is a no-op.
    pub fn respond(&self, response: Response) {
        let mut req_queue = self.req_queue.lock();
        let Some((method, received)) = req_queue.incoming.complete(&response.id) else {
            warn!("response for unregistered request: {}", response.id);
            return;
        };
        drop(req_queue);

        info!(
            "handled  {method} - ({}) in {:0.2?}",
            response.id,
            received.elapsed()
        );
        self.send(response.into());
    }

    /// Sends a server-initiated notification.
    pub fn send_notification<N: lsp_types::notification::Notification>(&self, params: N::Params) {
        self.send(lsp_server::Notification::new(N::METHOD.to_owned(), params).into());
    }

    fn send(&self, message: Message) {
        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            warn!("connection closed, dropping a message");
            return;
        };
        if let Err(err) = sender.send(message) {
            warn!("failed to send message: {err:?}");
        }
    }
}

/// A server ready to be initialized over a connection.
pub trait LspDriver {
    /// The deserialized initialize params.
    type InitParams: DeserializeOwned;
    /// The serialized initialize result.
    type InitResult: Serialize;
    /// The server state the driver initializes into.
    type InitializedSelf: InitializedLspDriver;

    /// Consumes the initialize params, producing the running state and the
    /// response to the initialize request.
    fn initialize(
        self,
        client: LspClient,
        params: Self::InitParams,
    ) -> (
        Self::InitializedSelf,
        Result<Self::InitResult, lsp_server::ResponseError>,
    );
}

/// An initialized server, ready to pump messages.
pub trait InitializedLspDriver {
    /// Receives the client's `initialized` notification.
    fn initialized(&mut self, params: InitializedParams);

    /// Runs until the client disconnects or asks to exit.
    fn main_loop(&mut self, inbox: crossbeam_channel::Receiver<Message>) -> anyhow::Result<()>;
}

/// Performs the LSP lifecycle around a driver: the initialize handshake,
/// the `initialized` notification and the main loop.
pub fn lsp_harness<D: LspDriver>(driver: D, connection: Connection) -> anyhow::Result<()> {
    let (initialize_id, initialize_params) = connection.initialize_start()?;
    let received = Instant::now();
    log::trace!("InitializeParams: {initialize_params}");

    let sender = Arc::new(RwLock::new(Some(connection.sender)));
    let client = LspClient::new(sender.clone());
    let _close_on_drop = CloseSender(sender);

    let request =
        lsp_server::Request::new(initialize_id, "initialize".to_owned(), initialize_params);
    client.register_request(&request, received);
    let initialize_params = serde_json::from_value::<D::InitParams>(request.params)
        .map_err(|err| anyhow::anyhow!("invalid InitializeParams: {err}"))?;

    let (mut service, initialize_result) = driver.initialize(client.clone(), initialize_params);
    client.respond(match initialize_result {
        Ok(result) => Response::new_ok(request.id, result),
        Err(err) => Response::new_err(request.id, err.code, err.message),
    });

    match connection.receiver.recv() {
        Ok(Message::Notification(n)) if n.method == "initialized" => {}
        Ok(message) => {
            anyhow::bail!("expected the initialized notification, got: {message:?}")
        }
        Err(err) => anyhow::bail!("connection closed before initialized: {err}"),
    }

    service.initialized(InitializedParams {});
    service.main_loop(connection.receiver)
}

/// Drops the outgoing channel when the harness unwinds, so worker threads
/// stop queueing into a dead connection.
struct CloseSender(Arc<RwLock<Option<Sender<Message>>>>);

impl Drop for CloseSender {
    fn drop(&mut self) {
        self.0.write().take();
    }
}
