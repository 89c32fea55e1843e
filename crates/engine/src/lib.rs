pub mod audit;
pub mod error;
pub mod reconcile;
pub mod render;
pub mod reply;
pub mod search;
pub mod service;

pub use audit::{AuditEvent, AuditKind, AuditLevel, AuditSink, Fanout, TracingSink};
pub use error::EngineError;
pub use reconcile::{FieldDiff, Reconciler, UpsertOutcome, UpsertRequest};
pub use render::{SvgRenderer, TableRenderer};
pub use reply::{Attachment, Reply};
pub use search::{ColumnSelector, SearchQuery, SearchResult, search};
pub use service::MemberService;
