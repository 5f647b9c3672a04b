//! The language server: dispatch tables, the main loop and document sync.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use lsp_server::{ErrorCode, Message, Notification, Request, RequestId, Response};
use lsp_types::notification::Notification as NotificationTrait;
use lsp_types::{
    CancelParams, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, InitializedParams, NumberOrString,
    TextDocumentPositionParams, Url,
};
use rustc_hash::FxHashMap;
use serde_json::Value as JsonValue;
use sharpfocus_query::semantics::SemanticModel;
use sharpfocus_query::{
    AnalysisCache, AnalysisContext, BackwardSliceRequest, DocumentSnapshot, FlowAnalysisRequest,
    FocusModeRequest, FocusRequest, ForwardSliceRequest, SemanticRequest,
};

use crate::harness::{InitializedLspDriver, LspClient};
use crate::init::ConstConfig;
use crate::task::{spawn_query, RunningRequests};
use crate::LspResult;

/// Returns `Ok(Some(()))` when the handler already responded, `Ok(None)`
/// when the dispatcher should respond `null`.
type LspRawHandler = fn(&mut SharpFocusLanguageServer, RequestId, JsonValue) -> LspResult<Option<()>>;
type NotifyHandler = fn(&mut SharpFocusLanguageServer, JsonValue) -> anyhow::Result<()>;

type RegularCmdMap = FxHashMap<&'static str, LspRawHandler>;
type NotifyCmdMap = FxHashMap<&'static str, NotifyHandler>;

macro_rules! request_fn {
    ($desc: ty, Self::$method: ident) => {
        (<$desc as lsp_types::request::Request>::METHOD, {
            const E: LspRawHandler = |this, req_id, params| {
                let params: <$desc as lsp_types::request::Request>::Params =
                    match serde_json::from_value(params) {
                        Ok(params) => params,
                        Err(err) => {
                            this.client.respond(Response::new_err(
                                req_id,
                                ErrorCode::InvalidParams as i32,
                                err.to_string(),
                            ));
                            return Ok(Some(()));
                        }
                    };
                this.$method(req_id, params)
            };
            E
        })
    };
}

macro_rules! notify_fn {
    ($desc: ty, Self::$method: ident) => {
        (<$desc>::METHOD, {
            const E: NotifyHandler = |this, params| {
                let params: <$desc as lsp_types::notification::Notification>::Params =
                    serde_json::from_value(params)
                        .map_err(|err| anyhow::anyhow!("invalid notification params: {err}"))?;
                this.$method(params)
            };
            E
        })
    };
}

/// The running language server.
pub struct SharpFocusLanguageServer {
    /// The editor on the other end.
    pub client: LspClient,
    const_config: ConstConfig,
    shutdown_requested: bool,

    documents: FxHashMap<Url, DocumentSnapshot>,
    model: Arc<dyn SemanticModel>,
    cache: Arc<AnalysisCache>,
    running: RunningRequests,

    regular_cmds: RegularCmdMap,
    notify_cmds: NotifyCmdMap,
}

impl SharpFocusLanguageServer {
    /// Creates a server bound to a client and a semantic model.
    pub fn new(client: LspClient, const_config: ConstConfig, model: Arc<dyn SemanticModel>) -> Self {
        Self {
            client,
            const_config,
            shutdown_requested: false,
            documents: FxHashMap::default(),
            model,
            cache: Arc::new(AnalysisCache::new()),
            running: RunningRequests::new(),
            regular_cmds: Self::get_regular_cmds(),
            notify_cmds: Self::get_notify_cmds(),
        }
    }

    /// The process-wide analysis cache.
    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    #[rustfmt::skip]
    fn get_regular_cmds() -> RegularCmdMap {
        use lsp_types::request::Shutdown;
        use sharpfocus_query::lsp_features::*;
        RegularCmdMap::from_iter([
            request_fn!(Shutdown, Self::shutdown),
            request_fn!(Focus, Self::focus),
            request_fn!(FocusMode, Self::focus_mode),
            request_fn!(FlowAnalysis, Self::flow_analysis),
            request_fn!(BackwardSlice, Self::backward_slice),
            request_fn!(ForwardSlice, Self::forward_slice),
        ])
    }

    fn get_notify_cmds() -> NotifyCmdMap {
        use lsp_types::notification::*;
        NotifyCmdMap::from_iter([
            notify_fn!(DidOpenTextDocument, Self::did_open),
            notify_fn!(DidChangeTextDocument, Self::did_change),
            notify_fn!(DidCloseTextDocument, Self::did_close),
            notify_fn!(DidSaveTextDocument, Self::did_save),
            notify_fn!(Cancel, Self::cancel_request),
        ])
    }
}

impl InitializedLspDriver for SharpFocusLanguageServer {
    fn initialized(&mut self, _params: InitializedParams) {
        info!("server initialized");
    }

    fn main_loop(&mut self, inbox: Receiver<Message>) -> anyhow::Result<()> {
        for message in &inbox {
            if matches!(
                &message,
                Message::Notification(n) if n.method == lsp_types::notification::Exit::METHOD
            ) {
                if !self.shutdown_requested {
                    warn!("exit received before the shutdown request");
                }
                self.cache.clear();
                return Ok(());
            }
            self.handle_message(message)?;
        }
        warn!("client disconnected without the shutdown sequence");
        Ok(())
    }
}

impl SharpFocusLanguageServer {
    fn handle_message(&mut self, message: Message) -> anyhow::Result<()> {
        let start = Instant::now();
        match message {
            Message::Request(req) => self.on_request(start, req),
            Message::Notification(not) => self.on_notification(start, not)?,
            Message::Response(resp) => {
                warn!("unexpected response message: {:?}", resp.id);
            }
        }
        Ok(())
    }

    fn on_request(&mut self, received: Instant, req: Request) {
        self.client.register_request(&req, received);

        if self.shutdown_requested {
            self.client.respond(Response::new_err(
                req.id.clone(),
                ErrorCode::InvalidRequest as i32,
                "shutdown already requested".to_owned(),
            ));
            return;
        }

        let Some(handler) = self.regular_cmds.get(req.method.as_str()) else {
            warn!("unhandled request: {}", req.method);
            self.client.respond(Response::new_err(
                req.id,
                ErrorCode::MethodNotFound as i32,
                "method not found".to_owned(),
            ));
            return;
        };

        let id = req.id.clone();
        match handler(self, req.id, req.params) {
            Ok(Some(())) => {}
            Ok(None) => self.client.respond(Response::new_ok(id, JsonValue::Null)),
            Err(err) => self.client.respond(Response::new_err(id, err.code, err.message)),
        }
    }

    fn on_notification(&mut self, received: Instant, not: Notification) -> anyhow::Result<()> {
        debug!("notified {} at {received:?}", not.method);
        let Some(handler) = self.notify_cmds.get(not.method.as_str()) else {
            warn!("unhandled notification: {}", not.method);
            return Ok(());
        };
        handler(self, not.params)
    }
}

/// Lifecycle and document synchronization.
impl SharpFocusLanguageServer {
    fn shutdown(&mut self, req_id: RequestId, _params: ()) -> LspResult<Option<()>> {
        self.shutdown_requested = true;
        self.client.respond(Response::new_ok(req_id, JsonValue::Null));
        Ok(Some(()))
    }

    fn cancel_request(&mut self, params: CancelParams) -> anyhow::Result<()> {
        let id: RequestId = match params.id {
            NumberOrString::Number(id) => id.into(),
            NumberOrString::String(id) => id.into(),
        };
        self.running.cancel(&id);
        Ok(())
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) -> anyhow::Result<()> {
        let doc = params.text_document;
        self.documents.insert(
            doc.uri.clone(),
            DocumentSnapshot::new(doc.uri, doc.text, doc.version),
        );
        Ok(())
    }

    fn did_change(&mut self, params: DidChangeTextDocumentParams) -> anyhow::Result<()> {
        let uri = params.text_document.uri;
        // Full sync: the last change carries the whole document.
        let Some(change) = params.content_changes.into_iter().last() else {
            return Ok(());
        };
        self.cache.invalidate_document(&uri);
        self.documents.insert(
            uri.clone(),
            DocumentSnapshot::new(uri, change.text, params.text_document.version),
        );
        Ok(())
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> anyhow::Result<()> {
        let uri = params.text_document.uri;
        self.documents.remove(&uri);
        self.cache.invalidate_document(&uri);
        Ok(())
    }

    fn did_save(&mut self, params: DidSaveTextDocumentParams) -> anyhow::Result<()> {
        debug!("saved {}", params.text_document.uri);
        Ok(())
    }
}

/// Slicing requests.
impl SharpFocusLanguageServer {
    fn focus(&mut self, req_id: RequestId, params: TextDocumentPositionParams) -> LspResult<Option<()>> {
        let position = params.position;
        self.spawn(req_id, params, FocusRequest { position })
    }

    fn focus_mode(
        &mut self,
        req_id: RequestId,
        params: TextDocumentPositionParams,
    ) -> LspResult<Option<()>> {
        let position = params.position;
        self.spawn(req_id, params, FocusModeRequest { position })
    }

    fn flow_analysis(
        &mut self,
        req_id: RequestId,
        params: TextDocumentPositionParams,
    ) -> LspResult<Option<()>> {
        let position = params.position;
        self.spawn(req_id, params, FlowAnalysisRequest { position })
    }

    fn backward_slice(
        &mut self,
        req_id: RequestId,
        params: TextDocumentPositionParams,
    ) -> LspResult<Option<()>> {
        let position = params.position;
        self.spawn(req_id, params, BackwardSliceRequest { position })
    }

    fn forward_slice(
        &mut self,
        req_id: RequestId,
        params: TextDocumentPositionParams,
    ) -> LspResult<Option<()>> {
        let position = params.position;
        self.spawn(req_id, params, ForwardSliceRequest { position })
    }

    fn spawn<R>(
        &mut self,
        req_id: RequestId,
        params: TextDocumentPositionParams,
        request: R,
    ) -> LspResult<Option<()>>
    where
        R: SemanticRequest + Send + 'static,
        R::Response: serde::Serialize,
    {
        let uri = params.text_document.uri;
        let Some(doc) = self.documents.get(&uri).cloned() else {
            debug!("request against an unopened document: {uri}");
            return Ok(None);
        };

        let token = self.running.register(req_id.clone());
        let ctx = AnalysisContext::new(
            doc,
            self.model.clone(),
            self.cache.clone(),
            self.const_config.position_encoding,
            token,
        );
        spawn_query(self.client.clone(), self.running.clone(), req_id, ctx, request);
        Ok(Some(()))
    }
}
