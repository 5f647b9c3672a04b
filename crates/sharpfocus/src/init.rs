//! The initialize handshake: negotiated constants and server capabilities.

use std::sync::Arc;

use lsp_server::ResponseError;
use lsp_types::{
    InitializeParams, InitializeResult, PositionEncodingKind, ServerCapabilities, ServerInfo,
    TextDocumentSyncCapability, TextDocumentSyncKind,
};
use sharpfocus_query::semantics::SemanticModel;
use sharpfocus_query::PositionEncoding;

use crate::harness::{LspClient, LspDriver};
use crate::server::SharpFocusLanguageServer;

/// Configuration fixed at initialize time.
#[derive(Debug, Clone, Copy)]
pub struct ConstConfig {
    /// The negotiated position encoding.
    pub position_encoding: PositionEncoding,
}

impl From<&InitializeParams> for ConstConfig {
    fn from(params: &InitializeParams) -> Self {
        let encodings = params
            .capabilities
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_deref())
            .unwrap_or(&[]);

        let position_encoding = if encodings.contains(&PositionEncodingKind::UTF8) {
            PositionEncoding::Utf8
        } else {
            PositionEncoding::Utf16
        };
        Self { position_encoding }
    }
}

/// The driver that turns initialize params into a running server.
pub struct Init {
    /// The semantic layer supplying members and their graphs.
    pub model: Arc<dyn SemanticModel>,
}

impl LspDriver for Init {
    type InitParams = InitializeParams;
    type InitResult = InitializeResult;
    type InitializedSelf = SharpFocusLanguageServer;

    fn initialize(
        self,
        client: LspClient,
        params: Self::InitParams,
    ) -> (
        Self::InitializedSelf,
        Result<Self::InitResult, ResponseError>,
    ) {
        let const_config = ConstConfig::from(&params);
        let server = SharpFocusLanguageServer::new(client, const_config, self.model);

        let encoding = match const_config.position_encoding {
            PositionEncoding::Utf8 => PositionEncodingKind::UTF8,
            PositionEncoding::Utf16 => PositionEncodingKind::UTF16,
        };
        let capabilities = ServerCapabilities {
            position_encoding: Some(encoding),
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::FULL,
            )),
            ..ServerCapabilities::default()
        };
        let result = InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: "sharpfocus".to_owned(),
                version: Some(env!("CARGO_PKG_VERSION").to_owned()),
            }),
            offset_encoding: None,
        };
        (server, Ok(result))
    }
}
