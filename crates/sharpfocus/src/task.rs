//! Offloading requests from the main loop, with cancellation.

use std::sync::Arc;

use lsp_server::{ErrorCode, RequestId, Response};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use sharpfocus_query::{AnalysisContext, AnalysisError, SemanticRequest};
use tokio_util::sync::CancellationToken;

use crate::harness::LspClient;

/// The cancellation registry of in-flight requests.
///
/// The main loop registers a token per request id before offloading; a
/// `$/cancelRequest` notification cancels it; the worker drops the slot when
/// it responds.
#[derive(Clone, Default)]
pub struct RunningRequests {
    tokens: Arc<Mutex<FxHashMap<RequestId, CancellationToken>>>,
}

impl RunningRequests {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for a request.
    pub fn register(&self, id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.tokens.lock().insert(id, token.clone());
        token
    }

    /// Cancels the request with the given id, if it is still running.
    pub fn cancel(&self, id: &RequestId) {
        if let Some(token) = self.tokens.lock().get(id) {
            token.cancel();
        }
    }

    /// Forgets a finished request.
    pub fn finish(&self, id: &RequestId) {
        self.tokens.lock().remove(id);
    }
}

/// Runs a query off the main loop and responds when it settles.
///
/// Not-applicable answers become a JSON `null`; cancellation becomes
/// `RequestCanceled`; engine contract violations fail this request alone
/// with `InternalError`.
pub fn spawn_query<R>(
    client: LspClient,
    running: RunningRequests,
    req_id: RequestId,
    ctx: AnalysisContext,
    request: R,
) where
    R: SemanticRequest + Send + 'static,
    R::Response: Serialize,
{
    rayon::spawn(move || {
        let response = match request.request(&ctx) {
            Ok(Some(value)) => Response::new_ok(req_id.clone(), value),
            Ok(None) => Response::new_ok(req_id.clone(), serde_json::Value::Null),
            Err(AnalysisError::Cancelled) => Response::new_err(
                req_id.clone(),
                ErrorCode::RequestCanceled as i32,
                "the request was cancelled".to_owned(),
            ),
            Err(err @ AnalysisError::InvalidState(_)) => {
                log::error!("analysis failed: {err}");
                Response::new_err(req_id.clone(), ErrorCode::InternalError as i32, err.to_string())
            }
        };
        running.finish(&req_id);
        client.respond(response);
    });
}
