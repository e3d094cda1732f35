//! Remote data gateway for the content tables.
//!
//! Every outbound call goes through [`Gateway`], which applies the retry
//! policy to idempotent operations and exposes change subscriptions.
//! [`LiveView`] builds the refresh-on-change lists the content modules serve.

pub mod backend;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod postgrest;
pub mod query;
pub mod retry;
pub mod view;

pub use backend::{TableBackend, TableSpec};
pub use error::{classify_http_status, DataError, ErrorKind};
pub use gateway::{decode, Gateway};
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;
pub use query::{Embed, Filter, Order, Relation, Row, Select};
pub use retry::{with_retry, with_retry_notify, RetryPolicy};
pub use view::{fetcher, Fetcher, LiveView, ViewSnapshot, ViewState};

pub use vitrina_events::{ChangeKind, ChannelSpec, EventFilter, Subscription};
