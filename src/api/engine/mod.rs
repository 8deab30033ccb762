pub mod pipeline;
pub mod probe;

pub use pipeline::{chat_document, chat_stream, complete, complete_entry, Completion};
pub use probe::{probe_providers, ProbeStatus, ProviderStatus};
