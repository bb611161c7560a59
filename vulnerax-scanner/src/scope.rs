// Scope filtering and URL canonicalization

use tracing::debug;
use url::{Origin, Url};

/// Path extensions treated as static assets and never crawled.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "avif",
    "woff", "woff2", "ttf", "otf", "eot",
];

/// Reason a discovered reference was not accepted. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    Malformed,
    UnsupportedScheme,
    OffOrigin,
    StaticAsset,
}

/// Resolve `href` against `base` into a canonical absolute URL.
///
/// Fragments are dropped and a trailing slash on a non-root path is
/// removed. Anything that is not http(s) after resolution, or that fails to
/// parse, is rejected.
pub fn normalize(base: &Url, href: &str) -> Result<Url, Skip> {
    let href = href.trim();
    // Skip empty, fragment-only, javascript:, mailto:, tel:, data:
    if href.is_empty() || href.starts_with('#') {
        return Err(Skip::Malformed);
    }
    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return Err(Skip::UnsupportedScheme);
    }

    let resolved = base.join(href).map_err(|_| Skip::Malformed)?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(Skip::UnsupportedScheme);
    }
    Ok(canonicalize(resolved))
}

/// Canonical form of an already absolute URL.
pub fn canonicalize(mut url: Url) -> Url {
    url.set_fragment(None);
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = normalize_path(path);
        url.set_path(&trimmed);
    }
    url
}

/// Registry key for a URL: its path without query, trailing slash removed.
pub fn canonical_path(url: &Url) -> String {
    normalize_path(url.path())
}

/// Normalize a raw path string into a registry key.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Whether the last path segment carries a static-asset extension.
pub fn is_static_asset(path: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or_default();
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            STATIC_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Decides whether a URL belongs to the scan.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    origin: Origin,
    same_origin_only: bool,
}

impl ScopeFilter {
    pub fn new(root: &Url, same_origin_only: bool) -> Self {
        Self {
            origin: root.origin(),
            same_origin_only,
        }
    }

    /// Filter re-anchored on `final_url` when the root redirected to another
    /// origin on the same host, such as `http://host` to `https://host`.
    pub fn rebased_on(&self, final_url: &Url) -> Option<ScopeFilter> {
        let Origin::Tuple(_, host, _) = &self.origin else {
            return None;
        };
        let same_host = final_url.host().is_some_and(|h| h.to_owned() == *host);
        (same_host && final_url.origin() != self.origin)
            .then(|| ScopeFilter::new(final_url, self.same_origin_only))
    }

    pub fn check(&self, url: &Url) -> Result<(), Skip> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Skip::UnsupportedScheme);
        }
        if self.same_origin_only && url.origin() != self.origin {
            return Err(Skip::OffOrigin);
        }
        if is_static_asset(url.path()) {
            return Err(Skip::StaticAsset);
        }
        Ok(())
    }

    /// Normalize `href` found on `base` and apply the scope rules.
    pub fn accept(&self, base: &Url, href: &str) -> Option<Url> {
        let result = normalize(base, href).and_then(|url| self.check(&url).map(|_| url));
        match result {
            Ok(url) => Some(url),
            Err(reason) => {
                debug!("Skipping {} ({:?})", href, reason);
                None
            }
        }
    }
}
