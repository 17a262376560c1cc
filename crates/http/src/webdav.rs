//! Minimal WebDAV directory listing
//!
//! Recursive downloads need to know what lives under a directory. Origins
//! answer `PROPFIND` with `Depth: 1`, returning a multistatus document with
//! one `<response>` per child.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::reader::Reader;
use sc_core::{Error, Result};
use url::Url;

use crate::client::{format_reqwest_error, status_error};

/// One child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavEntry {
    /// Decoded absolute path of the entry, without a trailing slash
    pub path: String,
    pub is_dir: bool,
}

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:"><D:prop><D:resourcetype/></D:prop></D:propfind>"#;

/// List the immediate children of `path` on `host`
pub async fn list(
    client: &reqwest::Client,
    host: &str,
    path: &str,
    token: Option<&str>,
) -> Result<Vec<DavEntry>> {
    let mut url = Url::parse(host).map_err(|e| Error::Config(format!("Invalid dir list host '{host}': {e}")))?;
    url.set_path(path);

    let method = reqwest::Method::from_bytes(b"PROPFIND")
        .map_err(|e| Error::Network(e.to_string()))?;
    let mut request = client
        .request(method, url.clone())
        .header("Depth", "1")
        .header("Content-Type", "application/xml")
        .body(PROPFIND_BODY);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Network(format_reqwest_error(&e)))?;
    if !response.status().is_success() {
        return Err(status_error(&url, response.status()));
    }
    let body = response
        .text()
        .await
        .map_err(|e| Error::Network(format_reqwest_error(&e)))?;

    let own = normalize(path);
    Ok(parse_multistatus(&body)?
        .into_iter()
        .filter(|entry| entry.path != own)
        .collect())
}

/// Extract entries from a multistatus body
pub fn parse_multistatus(body: &str) -> Result<Vec<DavEntry>> {
    let mut reader = Reader::from_str(body);

    let mut entries = Vec::new();
    let mut in_href = false;
    let mut href_buf = String::new();
    let mut href: Option<String> = None;
    let mut is_dir = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"response" => {
                    href = None;
                    is_dir = false;
                }
                b"href" => {
                    href_buf.clear();
                    in_href = true;
                }
                b"collection" => is_dir = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"collection" {
                    is_dir = true;
                }
            }
            Ok(Event::Text(text)) if in_href => {
                let raw = text
                    .decode()
                    .map_err(|e| Error::Network(format!("Invalid listing: {e}")))?;
                href_buf.push_str(&raw);
            }
            Ok(Event::GeneralRef(reference)) if in_href => {
                resolve_reference(&reference, &mut href_buf)?;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"href" => {
                    in_href = false;
                    href = Some(href_buf.trim().to_string());
                }
                b"response" => {
                    if let Some(h) = href.take() {
                        entries.push(DavEntry {
                            path: href_to_path(&h),
                            is_dir,
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Network(format!(
                    "Invalid listing at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(entries)
}

/// Append the text an entity or character reference stands for
fn resolve_reference(reference: &BytesRef<'_>, buf: &mut String) -> Result<()> {
    let invalid = |e: &dyn std::fmt::Display| Error::Network(format!("Invalid listing: {e}"));
    if let Some(ch) = reference.resolve_char_ref().map_err(|e| invalid(&e))? {
        buf.push(ch);
        return Ok(());
    }
    let name = reference.decode().map_err(|e| invalid(&e))?;
    match resolve_predefined_entity(&name) {
        Some(text) => {
            buf.push_str(text);
            Ok(())
        }
        None => Err(Error::Network(format!(
            "Invalid listing: unknown entity '&{name};'"
        ))),
    }
}

/// Hrefs may be absolute URLs or paths, and are percent-encoded
fn href_to_path(href: &str) -> String {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.to_string(),
    };
    let decoded = urlencoding::decode(&path)
        .map(|p| p.into_owned())
        .unwrap_or(path);
    normalize(&decoded)
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
