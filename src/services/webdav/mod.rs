// WebDAV client modules organized by functionality

pub mod config;
pub mod connection;
pub mod service;

// Re-export main types for convenience
pub use config::WebDavConfig;
pub use connection::WebDavConnection;
pub use service::{Download, ServerCapabilities, WebDavClient};
