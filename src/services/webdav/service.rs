use std::collections::HashSet;

use futures_util::StreamExt;
use reqwest::{Body, Method, Response};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::config::WebDavConfig;
use super::connection::WebDavConnection;
use crate::errors::{RequestFailure, WebDavError};
use crate::models::DirectoryEntry;
use crate::webdav_xml_parser::parse_propfind_response;

/// Property request body sent with every PROPFIND.
const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:displayname/>
        <D:getcontentlength/>
        <D:getcontenttype/>
        <D:getlastmodified/>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

/// WebDAV protocol client.
///
/// Translates file-management operations into WebDAV wire requests and
/// wire responses into [`DirectoryEntry`] values or typed errors. Holds at
/// most one server connection; `set_credentials` replaces it wholesale.
pub struct WebDavClient {
    connection: Option<WebDavConnection>,
}

impl WebDavClient {
    pub fn new() -> Self {
        Self { connection: None }
    }

    /// Stores the credential triple and rebuilds the transport. Calling it
    /// again replaces the previous server entirely, which is how a caller
    /// reconnects somewhere else.
    pub fn set_credentials(
        &mut self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> Result<(), WebDavError> {
        let config = WebDavConfig::new(server_url, username, password);
        self.connection = Some(WebDavConnection::new(config)?);
        Ok(())
    }

    fn connection(&self) -> Result<&WebDavConnection, WebDavError> {
        self.connection
            .as_ref()
            .ok_or_else(|| WebDavError::Validation("credentials not set".to_string()))
    }

    /// OPTIONS against the base URL; `false` on any failure, including
    /// when no credentials have been set.
    pub async fn test_connection(&self) -> bool {
        match self.connection.as_ref() {
            Some(connection) => connection.test_connection().await,
            None => false,
        }
    }

    /// Lists the immediate children of `path` (PROPFIND, `Depth: 1`).
    ///
    /// The queried collection is excluded from its own listing and the
    /// result is sorted directories-first, then by name.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<DirectoryEntry>, WebDavError> {
        let connection = self.connection()?;

        let mut url = connection.url_for_path(path);
        if path != "/" && !url.ends_with('/') {
            url.push('/');
        }
        debug!("PROPFIND {} (Depth: 1)", url);

        let response = connection
            .authenticated_request(
                extension_method(b"PROPFIND")?,
                &url,
                Some(PROPFIND_BODY.into()),
                &[("Depth", "1"), ("Content-Type", "application/xml")],
            )
            .await
            .map_err(|source| WebDavError::Listing {
                path: path.to_string(),
                source,
            })?;

        let body = response.text().await.map_err(|e| WebDavError::Listing {
            path: path.to_string(),
            source: e.into(),
        })?;

        let mut entries = parse_propfind_response(&body, Some(path))?;
        dedup_entries(&mut entries);
        sort_entries(&mut entries);

        info!("📁 listed {} entries under {}", entries.len(), path);
        Ok(entries)
    }

    /// GET on `path`, returning a streaming [`Download`] handle.
    pub async fn download_file(&self, path: &str) -> Result<Download, WebDavError> {
        let connection = self.connection()?;
        let url = connection.url_for_path(path);
        debug!("⬇️ GET {}", url);

        let response = connection
            .authenticated_request(Method::GET, &url, None, &[])
            .await
            .map_err(|source| WebDavError::Download {
                path: path.to_string(),
                source,
            })?;

        Ok(Download {
            path: path.to_string(),
            response,
        })
    }

    /// PUT `body` at `path`. The caller owns whatever resource backs the
    /// body and closes it on every exit path.
    pub async fn upload_file(&self, path: &str, body: impl Into<Body>) -> Result<(), WebDavError> {
        let connection = self.connection()?;
        let url = connection.url_for_path(path);
        debug!("⬆️ PUT {}", url);

        connection
            .authenticated_request(Method::PUT, &url, Some(body.into()), &[])
            .await
            .map_err(|source| WebDavError::Upload {
                path: path.to_string(),
                source,
            })?;

        Ok(())
    }

    /// PUT with the body streamed out of an async reader.
    pub async fn upload_reader<R>(&self, path: &str, reader: R) -> Result<(), WebDavError>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let stream = ReaderStream::new(reader);
        self.upload_file(path, Body::wrap_stream(stream)).await
    }

    /// MKCOL at `path`. The target URL always ends with `/`. Fails when
    /// the collection already exists, like any other non-success status.
    pub async fn create_directory(&self, path: &str) -> Result<(), WebDavError> {
        let connection = self.connection()?;

        let mut url = connection.url_for_path(path);
        if !url.ends_with('/') {
            url.push('/');
        }
        debug!("MKCOL {}", url);

        connection
            .authenticated_request(extension_method(b"MKCOL")?, &url, None, &[])
            .await
            .map_err(|source| WebDavError::Create {
                path: path.to_string(),
                source,
            })?;

        Ok(())
    }

    /// DELETE at `path`; removes files and collections alike.
    pub async fn delete(&self, path: &str) -> Result<(), WebDavError> {
        let connection = self.connection()?;
        let url = connection.url_for_path(path);
        debug!("DELETE {}", url);

        connection
            .authenticated_request(Method::DELETE, &url, None, &[])
            .await
            .map_err(|source| WebDavError::Delete {
                path: path.to_string(),
                source,
            })?;

        Ok(())
    }

    /// MOVE from `source_path` to `dest_path`, overwriting any existing
    /// destination (`Overwrite: T`).
    pub async fn move_item(&self, source_path: &str, dest_path: &str) -> Result<(), WebDavError> {
        let connection = self.connection()?;
        let source_url = connection.url_for_path(source_path);
        let dest_url = connection.url_for_path(dest_path);
        debug!("MOVE {} -> {}", source_url, dest_url);

        connection
            .authenticated_request(
                extension_method(b"MOVE")?,
                &source_url,
                None,
                &[("Destination", dest_url.as_str()), ("Overwrite", "T")],
            )
            .await
            .map_err(|source| WebDavError::Move {
                source_path: source_path.to_string(),
                dest_path: dest_path.to_string(),
                source,
            })?;

        Ok(())
    }

    /// Fetches the properties of a single resource (PROPFIND, `Depth: 0`).
    pub async fn get_metadata(&self, path: &str) -> Result<DirectoryEntry, WebDavError> {
        let connection = self.connection()?;
        let url = connection.url_for_path(path);
        debug!("PROPFIND {} (Depth: 0)", url);

        let response = connection
            .authenticated_request(
                extension_method(b"PROPFIND")?,
                &url,
                Some(PROPFIND_BODY.into()),
                &[("Depth", "0"), ("Content-Type", "application/xml")],
            )
            .await
            .map_err(|source| WebDavError::Listing {
                path: path.to_string(),
                source,
            })?;

        let body = response.text().await.map_err(|e| WebDavError::Listing {
            path: path.to_string(),
            source: e.into(),
        })?;

        // Depth 0 answers with the resource itself, so nothing is excluded.
        parse_propfind_response(&body, None)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                WebDavError::Parse("multi-status response contained no resources".to_string())
            })
    }

    /// Whether a resource exists at `path`. Status failures (404 and
    /// friends) mean "no"; transport failures still propagate.
    pub async fn exists(&self, path: &str) -> Result<bool, WebDavError> {
        match self.get_metadata(path).await {
            Ok(_) => Ok(true),
            Err(WebDavError::Listing {
                source: RequestFailure::Status(_),
                ..
            }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Reads the server's advertised WebDAV capabilities from an OPTIONS
    /// response.
    pub async fn server_capabilities(&self) -> Result<ServerCapabilities, WebDavError> {
        let connection = self.connection()?;
        let url = connection.config().base_url().to_string();

        let response = connection
            .authenticated_request(Method::OPTIONS, &url, None, &[])
            .await
            .map_err(|source| WebDavError::Connection(source.to_string()))?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        Ok(ServerCapabilities {
            dav_compliance: header("dav"),
            allowed_methods: header("allow"),
            server_software: response
                .headers()
                .get("server")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
        })
    }
}

impl Default for WebDavClient {
    fn default() -> Self {
        Self::new()
    }
}

/// A streaming download. Dropping it without consuming releases the
/// connection back to the pool.
#[derive(Debug)]
pub struct Download {
    path: String,
    response: Response,
}

impl Download {
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
    }

    /// Buffers the whole body in memory.
    pub async fn bytes(self) -> Result<Vec<u8>, WebDavError> {
        let path = self.path;
        let content = self
            .response
            .bytes()
            .await
            .map_err(|e| WebDavError::Download {
                path: path.clone(),
                source: e.into(),
            })?;
        debug!("✅ downloaded {} bytes from {}", content.len(), path);
        Ok(content.to_vec())
    }

    /// Streams the body into `sink`, returning the bytes copied. The sink
    /// is flushed but not closed; closing it is the caller's job.
    pub async fn write_to<W>(self, sink: &mut W) -> Result<u64, WebDavError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let path = self.path;
        let mut stream = self.response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WebDavError::Download {
                path: path.clone(),
                source: e.into(),
            })?;
            sink.write_all(&chunk)
                .await
                .map_err(|e| WebDavError::Download {
                    path: path.clone(),
                    source: e.into(),
                })?;
            written += chunk.len() as u64;
        }

        sink.flush().await.map_err(|e| WebDavError::Download {
            path: path.clone(),
            source: e.into(),
        })?;

        debug!("✅ downloaded {} bytes from {}", written, path);
        Ok(written)
    }
}

/// Server capabilities advertised on OPTIONS.
#[derive(Debug, Clone)]
pub struct ServerCapabilities {
    pub dav_compliance: String,
    pub allowed_methods: String,
    pub server_software: Option<String>,
}

fn extension_method(name: &'static [u8]) -> Result<Method, WebDavError> {
    Method::from_bytes(name)
        .map_err(|e| WebDavError::Validation(format!("invalid HTTP method: {}", e)))
}

/// Drops later duplicates so a listing is unique by `full_path`.
fn dedup_entries(entries: &mut Vec<DirectoryEntry>) {
    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.full_path.clone()));
}

/// Directories first, then byte-wise lexicographic by name. Stable, so
/// equal names keep their server order.
fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
}
