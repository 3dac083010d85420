pub mod errors;
pub mod models;
pub mod paths;
pub mod services;
pub mod session;
pub mod webdav_xml_parser;

pub use errors::{RequestFailure, WebDavError};
pub use models::DirectoryEntry;
pub use services::webdav::{Download, ServerCapabilities, WebDavClient, WebDavConfig};
pub use session::{ConnectionState, NullSink, Session, StatusSink};
