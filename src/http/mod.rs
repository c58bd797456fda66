mod client;

pub use client::{ClientSettings, classify_error, create_client};
