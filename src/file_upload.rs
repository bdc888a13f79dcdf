//! Request decoding for file uploads.
//!
//! An upload body is either the raw file or a `multipart/form-data` message
//! whose first file part is the file. The stored name comes from, in order,
//! the `X-File-Name` header, the `fileName` query parameter, the file part's
//! content-disposition, and finally a generated `file-<hex>` name.

use std::convert::Infallible;

use axum::http::{header, HeaderMap};
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use tracing::debug;
use uuid::Uuid;

use crate::http_objects::ApiError;

pub const FILE_NAME_HEADER: &str = "x-file-name";

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

#[derive(Debug)]
pub struct FileUpload {
    pub file_name: String,
    pub data: Bytes,
}

pub fn generate_file_name() -> String {
    format!("file-{}", Uuid::new_v4().simple())
}

pub async fn read_file_upload(
    headers: &HeaderMap,
    query_file_name: Option<&str>,
    body: Bytes,
) -> Result<FileUpload, ApiError> {
    let header_name = headers
        .get(FILE_NAME_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()));
    let requested_name = header_name
        .as_deref()
        .and_then(non_blank)
        .or_else(|| query_file_name.and_then(non_blank));

    let content_type = headers
        .get_all(header::CONTENT_TYPE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join(";");

    let (part_name, data) = if content_type
        .to_ascii_lowercase()
        .contains(MULTIPART_FORM_DATA)
    {
        let boundary = multer::parse_boundary(&content_type)
            .ok()
            .filter(|boundary| !boundary.trim().is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing multipart boundary."))?;
        let part = read_first_file_part(body, boundary).await?;
        (part.file_name, part.data)
    } else {
        if body.is_empty() {
            return Err(ApiError::bad_request("Request body is empty."));
        }
        (None, body)
    };

    let file_name = requested_name
        .or_else(|| part_name.as_deref().and_then(non_blank))
        .map(str::to_string)
        .unwrap_or_else(generate_file_name);

    Ok(FileUpload { file_name, data })
}

struct FilePart {
    file_name: Option<String>,
    data: Bytes,
}

async fn read_first_file_part(body: Bytes, boundary: String) -> Result<FilePart, ApiError> {
    let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(&format!("Malformed multipart body: {}", e)))?
    {
        let disposition = field
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_file_disposition);
        let Some(disposition) = disposition else {
            debug!("skipping multipart part without a file disposition");
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(&format!("Malformed multipart body: {}", e)))?;
        return Ok(FilePart {
            file_name: disposition.file_name,
            data,
        });
    }

    Err(ApiError::bad_request(
        "No file found in multipart/form-data parts.",
    ))
}

#[derive(Debug, PartialEq)]
struct FileDisposition {
    file_name: Option<String>,
}

/// Parses a `form-data` content-disposition. Returns `None` unless it
/// carries a `filename` or `filename*` parameter. `filename` is preferred,
/// `filename*` is decoded from its `charset'lang'percent-encoded` form.
fn parse_file_disposition(value: &str) -> Option<FileDisposition> {
    let mut params = split_params(value).into_iter();
    let disposition_type = params.next()?.trim();
    if !disposition_type.eq_ignore_ascii_case("form-data") {
        return None;
    }

    let mut file_name = None;
    let mut file_name_star = None;
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("filename") {
            file_name = Some(unquote(value.trim()));
        } else if key.eq_ignore_ascii_case("filename*") {
            file_name_star = Some(decode_ext_value(&unquote(value.trim())));
        }
    }

    if file_name.is_none() && file_name_star.is_none() {
        return None;
    }
    Some(FileDisposition {
        file_name: file_name.or(file_name_star),
    })
}

// Splits on ';' outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '\\' if in_quotes && !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        escaped = false;
    }
    parts.push(&value[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return value.to_string();
    };
    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                unquoted.push(next);
            }
        } else {
            unquoted.push(c);
        }
    }
    unquoted
}

fn decode_ext_value(value: &str) -> String {
    let encoded = match value.splitn(3, '\'').collect::<Vec<_>>().as_slice() {
        [_charset, _language, encoded] => *encoded,
        _ => value,
    };
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
