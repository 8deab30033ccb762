pub mod engine;
pub mod health;
pub mod ingress;
pub mod models;
pub mod status;

pub use ingress::{chat, images};
