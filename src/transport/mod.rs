mod http_transport;
mod retry_policy;

pub use http_transport::{CallDeadline, HttpTransport, UpstreamResponse};
pub(crate) use http_transport::with_deadline;
pub use retry_policy::{retry_with_backoff, RetryPolicy};
