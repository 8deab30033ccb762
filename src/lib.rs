pub mod api;
pub mod cancel;
pub mod config;
pub mod error;
pub mod json_scan;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod state;
pub mod stream;
pub mod transport;
pub mod upstream;

mod util;
