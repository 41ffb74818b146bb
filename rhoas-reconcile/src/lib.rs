//! Declarative reconciliation core for managed Kafka instances, topics,
//! service accounts and ACLs.
//!
//! The core consumes an authenticated [`RemoteFacade`] and never performs
//! transport, authentication or persistence itself. A [`ReconcilePass`]
//! takes declared resources plus the records of the previous pass and
//! returns the new records together with every diagnostic produced.

pub mod context;
pub mod datasource;
pub mod diagnostics;
pub mod error;
pub mod facade;
pub mod identity;
pub mod normalize;
pub mod pass;
pub mod reconciler;
pub mod resource;
pub mod schema;

pub use context::{CallContext, CancelHandle};
pub use datasource::{DataRead, DataSource, DataSourceReader};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, translate};
pub use error::{ApiError, ReconcileError, Result};
pub use facade::{ListFilter, RemoteFacade, RemoteKind, Response, ResponseBody, TransportMeta};
pub use identity::IdentityAllocator;
pub use normalize::{ListPage, Lookup, normalize};
pub use pass::{PassReport, PassSummary, ReconcilePass};
pub use reconciler::{Outcome, Reconciler, ReconcilerOptions, Registry, schemas};
pub use resource::{DeclaredResource, Lifecycle, Record, Resolve, ResourceKind};
pub use schema::{Field, FieldMode, FieldType, REDACTED, Schema};
