pub mod clock;
pub mod config;
pub mod document;
pub mod error;
pub mod middleware;
pub mod model;
pub mod query;
pub mod record;
pub mod schema;
pub mod storage;
pub mod store;
pub mod testing;
pub mod validation;
pub mod value;
pub mod virtuals;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{StorageConfig, StoreConfig};
pub use document::{Document, ToPlainOptions};
pub use error::{Error, Result};
pub use middleware::{CancelHandle, HookPhase, HookScope, OperationKind};
pub use model::{Model, SaveOptions};
pub use query::{Filter, Found, QueryContext, QueryOptions, QueryResult, UpdateOutcome, UpdatePayload};
pub use record::{RawRecord, ID_FIELD};
pub use schema::{FieldType, Schema, SchemaDefinition, SchemaOptions};
pub use store::Store;
pub use value::FieldDefinition;
pub use virtuals::VirtualDefinition;
