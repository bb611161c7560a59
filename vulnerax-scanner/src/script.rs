//! Static heuristics over inline script text.
//!
//! Nothing is executed. Patterns look for:
//!
//! - `fetch("/api/users", { method: "DELETE" })` and other calls that name
//!   their verb explicitly (`xhr.open("POST", ...)`, `$.ajax({url, type})`)
//! - `axios.post("/api/users")` style verb-named client methods
//! - `url: "/api/..."`, `endpoint = "/api/..."` style API path literals
//!
//! URLs built at runtime are invisible to these patterns.

use crate::registry::ApiCallObservation;
use crate::scope;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use url::Url;

/// Verbs accepted from markup and scripts; anything else is not an HTTP method.
pub(crate) const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Strategy for pulling API calls out of an inline script.
pub trait ScriptExtractor: Send + Sync {
    /// Observations found in `script`, absolutized against `page_url`.
    fn extract(&self, script: &str, page_url: &Url) -> Vec<ApiCallObservation>;
}

struct ScriptPattern {
    name: &'static str,
    regex: Regex,
    url_group: usize,
    method: MethodSource,
}

enum MethodSource {
    /// Capture group holding the verb
    Group(usize),
    Unknown,
}

static PATTERNS: LazyLock<Vec<ScriptPattern>> = LazyLock::new(|| {
    let pattern = |name: &'static str, re: &str, url_group: usize, method: MethodSource| ScriptPattern {
        name,
        regex: Regex::new(re).expect("built-in script pattern must compile"),
        url_group,
        method,
    };

    vec![
        // fetch("/api/users", { headers: {...}, method: "POST" }), one level of nesting
        pattern(
            "fetch_with_method",
            r#"fetch\s*\(\s*["'`]([^"'`]+)["'`]\s*,\s*\{(?:[^{}]|\{[^{}]*\})*?\bmethod\s*:\s*["'`](\w+)["'`]"#,
            1,
            MethodSource::Group(2),
        ),
        // xhr.open("POST", "/api/users")
        pattern(
            "xhr_open",
            r#"\.open\s*\(\s*["'](\w+)["']\s*,\s*["'`]([^"'`]+)["'`]"#,
            2,
            MethodSource::Group(1),
        ),
        // $.ajax({ url: "/api/users", type: "POST" }) and axios({ url, method })
        pattern(
            "config_object",
            r#"(?:\$\.ajax|axios)\s*\(\s*\{(?:[^{}]|\{[^{}]*\})*?\burl\s*:\s*["'`]([^"'`]+)["'`](?:[^{}]|\{[^{}]*\})*?\b(?:type|method)\s*:\s*["'`](\w+)["'`]"#,
            1,
            MethodSource::Group(2),
        ),
        // axios.get("/api/users"), $http.delete(...), api.patch(...)
        pattern(
            "client_verb",
            r#"[\w$]+\s*\.\s*(get|post|put|delete|patch)\s*\(\s*["'`]([^"'`]+)["'`]"#,
            2,
            MethodSource::Group(1),
        ),
        // fetch("/api/users") with no visible method
        pattern(
            "fetch",
            r#"fetch\s*\(\s*["'`]([^"'`]+)["'`]"#,
            1,
            MethodSource::Unknown,
        ),
        // url: "/api/users", endpoint = "https://host/api/users"
        pattern(
            "api_literal",
            r#"\b(?i:url|endpoint|api)["']?\s*[:=]\s*["'`]((?:https?://[^/"'`\s]+)?/api/[^"'`\s]*)["'`]"#,
            1,
            MethodSource::Unknown,
        ),
    ]
});

/// Default extractor built on the regex patterns above.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexScriptExtractor;

impl RegexScriptExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Names of the built-in patterns, in evaluation order.
    pub fn pattern_names() -> Vec<&'static str> {
        PATTERNS.iter().map(|p| p.name).collect()
    }
}

impl ScriptExtractor for RegexScriptExtractor {
    fn extract(&self, script: &str, page_url: &Url) -> Vec<ApiCallObservation> {
        let mut found = BTreeSet::new();

        for pattern in PATTERNS.iter() {
            for cap in pattern.regex.captures_iter(script) {
                let Some(literal) = cap.get(pattern.url_group).map(|m| m.as_str()) else {
                    continue;
                };
                let Some(url) = absolutize(page_url, literal) else {
                    continue;
                };
                let method = match pattern.method {
                    MethodSource::Group(group) => cap
                        .get(group)
                        .map(|m| m.as_str().to_uppercase())
                        .filter(|m| HTTP_VERBS.contains(&m.as_str())),
                    MethodSource::Unknown => None,
                };
                found.insert(ApiCallObservation::new(url, method.as_deref()));
            }
        }

        found.into_iter().collect()
    }
}

/// Resolve a script literal against the page, if it plausibly is a URL.
fn absolutize(page_url: &Url, literal: &str) -> Option<String> {
    let literal = literal.trim();
    // Template literals with substitutions cannot be resolved statically
    if literal.contains("${") || literal.chars().any(char::is_whitespace) {
        return None;
    }
    let looks_like_url = literal.starts_with('/')
        || literal.starts_with("./")
        || literal.starts_with("../")
        || literal.starts_with("http://")
        || literal.starts_with("https://");
    if !looks_like_url {
        return None;
    }
    scope::normalize(page_url, literal).ok().map(String::from)
}
