//! # sharpfocus
//!
//! The language server shell around [`sharpfocus-query`]: stdio transport,
//! the initialize handshake, request dispatch and document tracking. All
//! slicing logic lives in the query crate; this crate only moves protocol
//! messages and owns the process-wide analysis cache.
//!
//! [`sharpfocus-query`]: sharpfocus_query

pub mod args;
pub mod harness;
pub mod init;
pub mod server;
pub mod task;
pub mod transport;

pub use init::Init;
pub use server::SharpFocusLanguageServer;

/// The result type of request handlers.
pub type LspResult<T> = Result<T, lsp_server::ResponseError>;
