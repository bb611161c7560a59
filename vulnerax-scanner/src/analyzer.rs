use crate::registry::{ApiCallObservation, DEFAULT_FIELD_TYPE, FormField};
use crate::scope;
use crate::script::{HTTP_VERBS, RegexScriptExtractor, ScriptExtractor};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use url::Url;

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static FORM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static FIELD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, textarea, select").unwrap());
static OPTION_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

/// Input types that submit or reset a form rather than carry data.
const NON_DATA_INPUTS: &[&str] = &["submit", "button", "reset", "image"];

/// A form as it appears on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FormDescriptor {
    /// Absolute action URL, the page itself when the form has none
    pub action: Url,
    /// Uppercased, GET by default
    pub method: String,
    pub fields: Vec<FormField>,
}

/// Everything extracted from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct PageAnalysis {
    /// Absolute links in document order; not yet scope filtered
    pub links: Vec<Url>,
    pub forms: Vec<FormDescriptor>,
    pub api_calls: Vec<ApiCallObservation>,
    pub inline_scripts: usize,
    /// Named inputs that sit outside any form
    pub standalone_fields: Vec<FormField>,
}

/// Extracts links, forms and inline-script API calls from markup.
#[derive(Clone)]
pub struct PageAnalyzer {
    extractor: Arc<dyn ScriptExtractor>,
}

impl PageAnalyzer {
    pub fn new(extractor: Arc<dyn ScriptExtractor>) -> Self {
        Self { extractor }
    }

    /// Analyze `html` served at `page_url`. Malformed markup yields whatever
    /// structure the parser could recover.
    pub fn analyze(&self, html: &str, page_url: &Url) -> PageAnalysis {
        let document = Html::parse_document(html);

        let links = extract_links(&document, page_url);
        let forms = extract_forms(&document, page_url);
        let standalone_fields = extract_standalone_fields(&document);

        let mut api_calls = Vec::new();
        let mut inline_scripts = 0;
        for script in document.select(&SCRIPT_SELECTOR) {
            // External bundles are not fetched
            if script.value().attr("src").is_some() {
                continue;
            }
            let text: String = script.text().collect();
            if text.trim().is_empty() {
                continue;
            }
            inline_scripts += 1;
            api_calls.extend(self.extractor.extract(&text, page_url));
        }

        debug!(
            "Analyzed {}: {} links, {} forms, {} api calls",
            page_url,
            links.len(),
            forms.len(),
            api_calls.len()
        );

        PageAnalysis {
            links,
            forms,
            api_calls,
            inline_scripts,
            standalone_fields,
        }
    }
}

impl Default for PageAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(RegexScriptExtractor::new()))
    }
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| scope::normalize(page_url, href).ok())
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect()
}

fn extract_forms(document: &Html, page_url: &Url) -> Vec<FormDescriptor> {
    document
        .select(&FORM_SELECTOR)
        .map(|form| {
            let element = form.value();
            // A missing, empty or script-only action submits to the page itself
            let action = element
                .attr("action")
                .and_then(|action| scope::normalize(page_url, action).ok())
                .unwrap_or_else(|| scope::canonicalize(page_url.clone()));

            // method="dialog" and typos submit nothing over HTTP; browsers fall back to GET
            let method = element
                .attr("method")
                .map(|m| m.trim().to_uppercase())
                .filter(|m| HTTP_VERBS.contains(&m.as_str()))
                .unwrap_or_else(|| "GET".to_string());

            let fields = form.select(&FIELD_SELECTOR).filter_map(form_field).collect();

            FormDescriptor {
                action,
                method,
                fields,
            }
        })
        .collect()
}

fn extract_standalone_fields(document: &Html) -> Vec<FormField> {
    document
        .select(&FIELD_SELECTOR)
        .filter(|field| !inside_form(field))
        .filter_map(form_field)
        .collect()
}

fn inside_form(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "form")
}

/// Build a field from an input, textarea or select element.
fn form_field(element: ElementRef) -> Option<FormField> {
    let node = element.value();
    let name = node.attr("name").map(str::trim).filter(|n| !n.is_empty())?;

    let field_type = match node.name() {
        "input" => {
            let input_type = node
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_FIELD_TYPE.to_string());
            if NON_DATA_INPUTS.contains(&input_type.as_str()) {
                return None;
            }
            input_type
        }
        tag => tag.to_string(),
    };

    let mut field = FormField::new(name, field_type).required(node.attr("required").is_some());

    if let Some(placeholder) = node.attr("placeholder").filter(|p| !p.trim().is_empty()) {
        field = field.with_placeholder(placeholder);
    }

    if node.name() == "select" {
        let options: Vec<&str> = element
            .select(&OPTION_SELECTOR)
            .filter_map(|opt| opt.value().attr("value"))
            .filter(|value| !value.is_empty())
            .collect();
        if !options.is_empty() {
            field = field.with_options(options);
        }
    }

    Some(field)
}
