use chrono::{DateTime, Utc};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use std::str;
use tracing::debug;

use crate::errors::WebDavError;
use crate::models::DirectoryEntry;

/// Accumulator for one `<response>` element while the reader walks it.
#[derive(Debug, Default)]
struct RawResponse {
    href: String,
    displayname: Option<String>,
    content_length: Option<u64>,
    last_modified: Option<String>,
    content_type: Option<String>,
    is_collection: bool,
    has_prop: bool,
}

/// Parses a PROPFIND multi-status body into directory entries.
///
/// Elements are matched by local name, so any prefix bound to the `DAV:`
/// namespace works. Only the first `propstat/prop` block of each response
/// is read; a response without a `prop` is dropped. When `exclude_path` is
/// given, the entry whose decoded href names that path (trailing slashes
/// ignored) is skipped, so a collection never lists itself.
///
/// Missing or unparsable `getcontentlength`/`getlastmodified` values fall
/// back to 0 and `None`; a body that is not a multi-status document fails
/// with `WebDavError::Parse` and no partial results.
pub fn parse_propfind_response(
    xml_text: &str,
    exclude_path: Option<&str>,
) -> Result<Vec<DirectoryEntry>, WebDavError> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<RawResponse> = None;
    let mut current_element = String::new();
    let mut saw_multistatus = false;
    let mut propstat_count = 0u32;
    let mut in_prop = false;
    let mut in_resourcetype = false;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e)?;
                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "response" => {
                        current = Some(RawResponse::default());
                        propstat_count = 0;
                    }
                    "propstat" => propstat_count += 1,
                    "prop" => {
                        // Properties are read from the first propstat only.
                        if propstat_count == 1 {
                            in_prop = true;
                            if let Some(ref mut resp) = current {
                                resp.has_prop = true;
                            }
                        }
                    }
                    "resourcetype" if in_prop => in_resourcetype = true,
                    "collection" if in_resourcetype => {
                        if let Some(ref mut resp) = current {
                            resp.is_collection = true;
                        }
                    }
                    _ => current_element = name,
                }
            }
            Ok(Event::Empty(e)) => {
                // Self-closing elements have no children, so the container
                // states above are never entered for them.
                let name = local_name(&e)?;
                match name.as_str() {
                    "multistatus" => saw_multistatus = true,
                    "prop" if propstat_count == 1 => {
                        if let Some(ref mut resp) = current {
                            resp.has_prop = true;
                        }
                    }
                    "collection" if in_resourcetype => {
                        if let Some(ref mut resp) = current {
                            resp.is_collection = true;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| WebDavError::Parse(e.to_string()))?;
                let text = text.trim();
                if text.is_empty() {
                    buf.clear();
                    continue;
                }

                if let Some(ref mut resp) = current {
                    if current_element == "href" {
                        resp.href = text.to_string();
                    } else if in_prop {
                        match current_element.as_str() {
                            "displayname" => resp.displayname = Some(text.to_string()),
                            "getcontentlength" => resp.content_length = text.parse().ok(),
                            "getlastmodified" => resp.last_modified = Some(text.to_string()),
                            "getcontenttype" => resp.content_type = Some(text.to_string()),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = local_name_from_end(&e)?;
                match name.as_str() {
                    "response" => {
                        if let Some(resp) = current.take() {
                            if let Some(entry) = finish_response(resp, exclude_path) {
                                entries.push(entry);
                            }
                        }
                        propstat_count = 0;
                    }
                    "prop" => in_prop = false,
                    "resourcetype" => in_resourcetype = false,
                    _ => {}
                }
                current_element.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(WebDavError::Parse(format!("XML parsing error: {}", e))),
            _ => {}
        }

        buf.clear();
    }

    if !saw_multistatus {
        return Err(WebDavError::Parse(
            "response body is not a multi-status document".to_string(),
        ));
    }

    Ok(entries)
}

/// Turns one accumulated response into an entry, or drops it.
fn finish_response(resp: RawResponse, exclude_path: Option<&str>) -> Option<DirectoryEntry> {
    if !resp.has_prop {
        debug!("dropping response without <prop>: {}", resp.href);
        return None;
    }
    if resp.href.is_empty() {
        return None;
    }

    let decoded = urlencoding::decode(&resp.href)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| resp.href.clone());

    if let Some(queried) = exclude_path {
        if decoded.trim_end_matches('/') == queried.trim_end_matches('/') {
            return None;
        }
    }

    let name = match resp.displayname {
        Some(ref display) if !display.is_empty() => display.clone(),
        _ => decoded
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    Some(DirectoryEntry {
        name,
        full_path: decoded,
        is_directory: resp.is_collection,
        size: resp.content_length.unwrap_or(0),
        last_modified: resp.last_modified.as_deref().and_then(parse_http_date),
        content_type: resp.content_type.unwrap_or_default(),
    })
}

fn local_name(e: &BytesStart) -> Result<String, WebDavError> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| WebDavError::Parse(format!("invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

fn local_name_from_end(e: &BytesEnd) -> Result<String, WebDavError> {
    let qname = e.name();
    let local = qname.local_name();
    let name = str::from_utf8(local.as_ref())
        .map_err(|e| WebDavError::Parse(format!("invalid UTF-8 in element name: {}", e)))?;
    Ok(name.to_string())
}

fn parse_http_date(date_str: &str) -> Option<DateTime<Utc>> {
    if date_str.is_empty() {
        return None;
    }

    // RFC 2822 is what WebDAV servers emit for getlastmodified.
    DateTime::parse_from_rfc2822(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            DateTime::parse_from_rfc3339(date_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(date_str, "%a, %d %b %Y %H:%M:%S GMT")
                .ok()
                .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_propfind() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/test.pdf</d:href>
                <d:propstat>
                    <d:prop>
                        <d:displayname>test.pdf</d:displayname>
                        <d:getcontentlength>1024</d:getcontentlength>
                        <d:getlastmodified>Mon, 01 Jan 2024 12:00:00 GMT</d:getlastmodified>
                        <d:getcontenttype>application/pdf</d:getcontenttype>
                        <d:resourcetype/>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);

        let entry = &entries[0];
        assert_eq!(entry.name, "test.pdf");
        assert_eq!(entry.full_path, "/test.pdf");
        assert_eq!(entry.size, 1024);
        assert_eq!(entry.content_type, "application/pdf");
        assert!(entry.last_modified.is_some());
        assert!(!entry.is_directory);
    }

    #[test]
    fn test_parse_propfind_with_directory() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/Documents/</d:href>
                <d:propstat>
                    <d:prop>
                        <d:displayname>Documents</d:displayname>
                        <d:resourcetype>
                            <d:collection/>
                        </d:resourcetype>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>
            <d:response>
                <d:href>/Documents/file.txt</d:href>
                <d:propstat>
                    <d:prop>
                        <d:displayname>file.txt</d:displayname>
                        <d:getcontentlength>256</d:getcontentlength>
                        <d:getcontenttype>text/plain</d:getcontenttype>
                        <d:resourcetype/>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 2);

        let dir = &entries[0];
        assert!(dir.is_directory);
        assert_eq!(dir.name, "Documents");
        assert_eq!(dir.full_path, "/Documents/");

        let file = &entries[1];
        assert!(!file.is_directory);
        assert_eq!(file.size, 256);
    }

    #[test]
    fn test_queried_collection_excluded_from_its_own_listing() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/Documents/</d:href>
                <d:propstat>
                    <d:prop>
                        <d:resourcetype><d:collection/></d:resourcetype>
                    </d:prop>
                </d:propstat>
            </d:response>
            <d:response>
                <d:href>/Documents/file.txt</d:href>
                <d:propstat>
                    <d:prop>
                        <d:getcontentlength>10</d:getcontentlength>
                        <d:resourcetype/>
                    </d:prop>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/Documents")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "file.txt");

        // Without an exclusion path the collection itself is kept.
        let all = parse_propfind_response(xml, None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_parse_url_encoded_hrefs() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/File%20with%20spaces.pdf</d:href>
                <d:propstat>
                    <d:prop>
                        <d:getcontentlength>1024</d:getcontentlength>
                        <d:resourcetype/>
                    </d:prop>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].full_path, "/File with spaces.pdf");
        assert_eq!(entries[0].name, "File with spaces.pdf");
    }

    #[test]
    fn test_displayname_falls_back_to_last_path_segment() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/photos/summer/</d:href>
                <d:propstat>
                    <d:prop>
                        <d:resourcetype><d:collection/></d:resourcetype>
                    </d:prop>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "summer");
    }

    #[test]
    fn test_missing_length_and_date_fall_back() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/nosize.bin</d:href>
                <d:propstat>
                    <d:prop>
                        <d:displayname>nosize.bin</d:displayname>
                        <d:getcontentlength>not-a-number</d:getcontentlength>
                        <d:getlastmodified>yesterday-ish</d:getlastmodified>
                        <d:resourcetype/>
                    </d:prop>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[0].last_modified, None);
        assert_eq!(entries[0].content_type, "");
    }

    #[test]
    fn test_response_without_prop_is_dropped() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/ghost.txt</d:href>
                <d:propstat>
                    <d:status>HTTP/1.1 404 Not Found</d:status>
                </d:propstat>
            </d:response>
            <d:response>
                <d:href>/real.txt</d:href>
                <d:propstat>
                    <d:prop>
                        <d:getcontentlength>5</d:getcontentlength>
                        <d:resourcetype/>
                    </d:prop>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "real.txt");
    }

    #[test]
    fn test_second_propstat_is_ignored() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
            <d:response>
                <d:href>/partial.txt</d:href>
                <d:propstat>
                    <d:prop>
                        <d:getcontentlength>7</d:getcontentlength>
                        <d:resourcetype/>
                    </d:prop>
                    <d:status>HTTP/1.1 200 OK</d:status>
                </d:propstat>
                <d:propstat>
                    <d:prop>
                        <d:getcontentlength>9999</d:getcontentlength>
                    </d:prop>
                    <d:status>HTTP/1.1 404 Not Found</d:status>
                </d:propstat>
            </d:response>
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 7);
    }

    #[test]
    fn test_empty_multistatus() {
        let xml = r#"<?xml version="1.0"?>
        <d:multistatus xmlns:d="DAV:">
        </d:multistatus>"#;

        let entries = parse_propfind_response(xml, Some("/")).unwrap();
        assert_eq!(entries.len(), 0);
    }

    #[test]
    fn test_non_multistatus_body_is_a_parse_error() {
        let result = parse_propfind_response("<html><body>login page</body></html>", Some("/"));
        assert!(matches!(result, Err(WebDavError::Parse(_))));

        let result = parse_propfind_response("not xml at all", Some("/"));
        assert!(matches!(result, Err(WebDavError::Parse(_))));
    }

    #[test]
    fn test_parse_http_date_formats() {
        assert!(parse_http_date("Mon, 01 Jan 2024 12:00:00 GMT").is_some());
        assert!(parse_http_date("2024-01-01T12:00:00Z").is_some());
        assert!(parse_http_date("").is_none());
        assert!(parse_http_date("last tuesday").is_none());
    }
}
