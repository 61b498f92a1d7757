//! HTTP middleware: permissive CORS and MIME-filtered response compression.

use std::sync::Arc;

use axum::http::{header, Extensions, HeaderMap, StatusCode, Version};
use tower_http::compression::{CompressionLayer, Predicate};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CompressionSection;

/// Compressed by default; `application/octet-stream` is added on top of the
/// usual text/script/json set.
pub const DEFAULT_COMPRESSIBLE_MIME_TYPES: &[&str] = &[
    "text/plain",
    "text/css",
    "application/javascript",
    "text/javascript",
    "text/html",
    "application/xml",
    "text/xml",
    "application/json",
    "text/json",
    "application/wasm",
    "application/octet-stream",
];

/// Any origin, any method, any header. Not a security boundary.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Content types eligible for compression.
#[derive(Debug, Clone)]
pub struct MimeAllowList {
    types: Arc<[String]>,
}

impl MimeAllowList {
    pub fn new(extra: &[String]) -> Self {
        let types: Vec<String> = DEFAULT_COMPRESSIBLE_MIME_TYPES
            .iter()
            .map(|s| s.to_string())
            .chain(extra.iter().map(|s| s.trim().to_ascii_lowercase()))
            .collect();
        Self {
            types: types.into(),
        }
    }

    /// Match on the essence of `content-type` (parameters ignored).
    pub fn allows(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.types.iter().any(|t| *t == essence)
    }

    pub fn allows_headers(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| self.allows(ct))
            .unwrap_or(false)
    }
}

pub fn compression_layer(cfg: &CompressionSection) -> CompressionLayer<impl Predicate> {
    let allow = MimeAllowList::new(&cfg.extra_mime_types);
    CompressionLayer::new().compress_when(
        move |_status: StatusCode, _version: Version, headers: &HeaderMap, _ext: &Extensions| {
            allow.allows_headers(headers)
        },
    )
}
