//! Translation of browse and edit requests into driver operations
//!
//! Functions here borrow a client for exactly one operation. Input is parsed
//! and validated before any client is requested, so a malformed request
//! never touches the connection cache.

mod operations;
mod parse;

pub use operations::{
    CollectionStats, CollectionSummary, DatabaseSummary, DeleteOutcome, DocumentPage,
    UpdateOutcome, delete_document, find_documents, list_collections, list_databases, ping,
    update_document,
};
pub use parse::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageLimits, is_system_database, parse_document_id,
    parse_filter, parse_update,
};
