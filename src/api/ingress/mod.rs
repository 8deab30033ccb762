pub mod chat;
pub mod images;

pub use images::ImageOperation;
