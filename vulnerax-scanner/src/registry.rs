//! Canonical attack-surface store.
//!
//! Every observation made during a crawl is folded into an
//! [`EndpointRegistry`] through [`EndpointRecord::merge`]. The merge only
//! ever grows a record, and it is commutative, associative and idempotent,
//! so the registry a crawl ends up with does not depend on the order in
//! which concurrent fetches complete.

use crate::scope::normalize_path;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Method recorded for an API call whose verb could not be inferred.
pub const UNKNOWN_METHOD: &str = "unknown";

/// Field type used when an `<input>` carries no `type` attribute.
pub const DEFAULT_FIELD_TYPE: &str = "text";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeSet<String>>,
}

impl FormField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required: false,
            placeholder: None,
            options: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Fold another occurrence of the same field into this one.
    ///
    /// `required` is OR-ed and absent values are filled in. When both sides
    /// carry a different value the winner is chosen by a fixed order: a
    /// specific type beats the `text` default, placeholders and types
    /// otherwise resolve to the lexicographically smaller value, and option
    /// sets are unioned.
    pub fn merge(&mut self, other: &FormField) {
        debug_assert_eq!(self.name, other.name);

        self.required |= other.required;

        if type_rank(&other.field_type) > type_rank(&self.field_type) {
            self.field_type = other.field_type.clone();
        }

        match (&self.placeholder, &other.placeholder) {
            (None, Some(incoming)) => self.placeholder = Some(incoming.clone()),
            (Some(current), Some(incoming)) if incoming < current => {
                self.placeholder = Some(incoming.clone())
            }
            _ => {}
        }

        if let Some(incoming) = &other.options {
            self.options
                .get_or_insert_with(BTreeSet::new)
                .extend(incoming.iter().cloned());
        }
    }
}

fn type_rank(field_type: &str) -> (bool, Reverse<&str>) {
    (field_type != DEFAULT_FIELD_TYPE, Reverse(field_type))
}

/// A URL literal found in an inline script, with the verb it is called with.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiCallObservation {
    pub url: String,
    pub method: String,
}

impl ApiCallObservation {
    pub fn new(url: impl Into<String>, method: Option<&str>) -> Self {
        Self {
            url: url.into(),
            method: method
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| UNKNOWN_METHOD.to_string()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.method == UNKNOWN_METHOD
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub path: String,
    pub methods: BTreeSet<String>,
    #[serde(default, with = "field_list")]
    pub form_fields: BTreeMap<String, FormField>,
    #[serde(default)]
    pub api_endpoints: BTreeSet<ApiCallObservation>,
}

impl EndpointRecord {
    /// New record for `path` seen with `method`. The path is normalized.
    pub fn new(path: &str, method: &str) -> Self {
        let mut methods = BTreeSet::new();
        methods.insert(method.to_uppercase());
        Self {
            path: normalize_path(path),
            methods,
            form_fields: BTreeMap::new(),
            api_endpoints: BTreeSet::new(),
        }
    }

    /// Record for a page that was fetched with GET.
    pub fn page(path: &str) -> Self {
        Self::new(path, "GET")
    }

    pub fn add_method(&mut self, method: &str) {
        self.methods.insert(method.to_uppercase());
    }

    pub fn add_field(&mut self, field: FormField) {
        match self.form_fields.get_mut(&field.name) {
            Some(existing) => existing.merge(&field),
            None => {
                self.form_fields.insert(field.name.clone(), field);
            }
        }
    }

    pub fn add_api_call(&mut self, observation: ApiCallObservation) {
        self.api_endpoints.insert(observation);
        collapse_by_url(&mut self.api_endpoints);
    }

    pub fn with_fields<I: IntoIterator<Item = FormField>>(mut self, fields: I) -> Self {
        for field in fields {
            self.add_field(field);
        }
        self
    }

    pub fn with_api_call(mut self, observation: ApiCallObservation) -> Self {
        self.add_api_call(observation);
        self
    }

    /// Union `other` into `self`. Both records must share a path.
    pub fn merge(&mut self, other: EndpointRecord) {
        debug_assert_eq!(self.path, other.path);

        self.methods.extend(other.methods);
        for field in other.form_fields.into_values() {
            self.add_field(field);
        }
        self.api_endpoints.extend(other.api_endpoints);
        collapse_by_url(&mut self.api_endpoints);
    }

    pub fn merged(mut self, other: EndpointRecord) -> Self {
        self.merge(other);
        self
    }
}

/// Keep one observation per URL.
///
/// A known verb beats `unknown`; two known verbs resolve to the
/// lexicographically smaller one.
fn collapse_by_url(observations: &mut BTreeSet<ApiCallObservation>) {
    let mut best: BTreeMap<String, ApiCallObservation> = BTreeMap::new();
    for observation in std::mem::take(observations) {
        let replace = best
            .get(&observation.url)
            .is_none_or(|current| method_rank(&observation.method) > method_rank(&current.method));
        if replace {
            best.insert(observation.url.clone(), observation);
        }
    }
    observations.extend(best.into_values());
}

fn method_rank(method: &str) -> (bool, Reverse<&str>) {
    (method != UNKNOWN_METHOD, Reverse(method))
}

/// Mapping from canonical path to record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointRegistry {
    records: BTreeMap<String, EndpointRecord>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `record` into the entry for its (normalized) path.
    pub fn merge(&mut self, mut record: EndpointRecord) {
        record.path = normalize_path(&record.path);
        match self.records.get_mut(&record.path) {
            Some(existing) => existing.merge(record),
            None => {
                self.records.insert(record.path.clone(), record);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&EndpointRecord> {
        self.records.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ordered by path.
    pub fn records(&self) -> impl Iterator<Item = &EndpointRecord> {
        self.records.values()
    }

    pub fn into_records(self) -> Vec<EndpointRecord> {
        self.records.into_values().collect()
    }
}

impl FromIterator<EndpointRecord> for EndpointRegistry {
    fn from_iter<I: IntoIterator<Item = EndpointRecord>>(iter: I) -> Self {
        let mut registry = EndpointRegistry::new();
        for record in iter {
            registry.merge(record);
        }
        registry
    }
}

impl Serialize for EndpointRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}

impl<'de> Deserialize<'de> for EndpointRegistry {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<EndpointRecord>::deserialize(deserializer)?;
        Ok(records.into_iter().collect())
    }
}

/// Form fields travel as a list, keyed by name in memory.
mod field_list {
    use super::FormField;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        fields: &BTreeMap<String, FormField>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(fields.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, FormField>, D::Error> {
        let list = Vec::<FormField>::deserialize(deserializer)?;
        let mut fields: BTreeMap<String, FormField> = BTreeMap::new();
        for field in list {
            match fields.get_mut(&field.name) {
                Some(existing) => existing.merge(&field),
                None => {
                    fields.insert(field.name.clone(), field);
                }
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login_record() -> EndpointRecord {
        EndpointRecord::new("/login", "post")
            .with_fields([
                FormField::new("email", "email").required(true),
                FormField::new("password", "password"),
            ])
            .with_api_call(ApiCallObservation::new("https://example.com/api/session", None))
    }

    fn login_variant() -> EndpointRecord {
        EndpointRecord::page("/login/")
            .with_fields([
                FormField::new("email", "text").with_placeholder("you@example.com"),
                FormField::new("remember", "checkbox"),
                FormField::new("locale", "select").with_options(["en", "fr"]),
            ])
            .with_api_call(ApiCallObservation::new(
                "https://example.com/api/session",
                Some("delete"),
            ))
    }

    fn settings_variant() -> EndpointRecord {
        EndpointRecord::new("/login", "PUT").with_fields([
            FormField::new("email", "email").with_placeholder("admin@example.com"),
            FormField::new("password", "password").required(true),
            FormField::new("locale", "select").with_options(["de"]),
        ])
    }

    #[test]
    fn test_new_record_normalizes() {
        let record = EndpointRecord::new("/api/users/?page=1", "post");
        assert_eq!(record.path, "/api/users");
        assert_eq!(record.methods.iter().collect::<Vec<_>>(), vec!["POST"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let record = login_record();
        assert_eq!(record.clone().merged(record.clone()), record);

        let variant = login_variant();
        assert_eq!(variant.clone().merged(variant.clone()), variant);
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = login_record();
        let b = EndpointRecord {
            path: "/login".to_string(),
            ..login_variant()
        };
        assert_eq!(a.clone().merged(b.clone()), b.merged(a));
    }

    #[test]
    fn test_merge_is_associative() {
        let a = login_record();
        let b = EndpointRecord {
            path: "/login".to_string(),
            ..login_variant()
        };
        let c = settings_variant();

        let left = a.clone().merged(b.clone()).merged(c.clone());
        let right = a.merged(b.merged(c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_is_monotonic() {
        let mut record = login_record();
        record.merge(EndpointRecord::page("/login"));

        assert!(record.methods.contains("POST"));
        assert!(record.methods.contains("GET"));
        assert_eq!(record.form_fields.len(), 2);
        assert_eq!(record.api_endpoints.len(), 1);
    }

    #[test]
    fn test_field_merge_rules() {
        let mut record = login_record();
        record.merge(settings_variant());

        let email = &record.form_fields["email"];
        assert!(email.required);
        assert_eq!(email.field_type, "email");
        assert_eq!(email.placeholder.as_deref(), Some("admin@example.com"));

        // required is sticky once observed
        let password = &record.form_fields["password"];
        assert!(password.required);

        let mut field = FormField::new("email", "email").with_placeholder("b");
        field.merge(&FormField::new("email", "text").with_placeholder("a"));
        assert_eq!(field.field_type, "email");
        assert_eq!(field.placeholder.as_deref(), Some("a"));
    }

    #[test]
    fn test_select_options_union() {
        let mut field = FormField::new("locale", "select").with_options(["en", "fr"]);
        field.merge(&FormField::new("locale", "select").with_options(["de", "en"]));
        let options: Vec<_> = field.options.unwrap().into_iter().collect();
        assert_eq!(options, vec!["de", "en", "fr"]);
    }

    #[test]
    fn test_api_method_upgrade_never_downgrades() {
        let url = "https://example.com/api/users";
        let mut record = EndpointRecord::page("/dashboard")
            .with_api_call(ApiCallObservation::new(url, None));
        record.add_api_call(ApiCallObservation::new(url, Some("delete")));

        assert_eq!(record.api_endpoints.len(), 1);
        assert_eq!(record.api_endpoints.iter().next().unwrap().method, "DELETE");

        record.add_api_call(ApiCallObservation::new(url, None));
        assert_eq!(record.api_endpoints.len(), 1);
        assert_eq!(record.api_endpoints.iter().next().unwrap().method, "DELETE");
    }

    #[test]
    fn test_api_calls_deduplicated_by_url() {
        let url = "https://example.com/api/users";
        let record = EndpointRecord::page("/dashboard")
            .with_api_call(ApiCallObservation::new(url, Some("POST")))
            .with_api_call(ApiCallObservation::new(url, Some("GET")))
            .with_api_call(ApiCallObservation::new("https://example.com/api/teams", Some("PUT")));

        assert_eq!(record.api_endpoints.len(), 2);
        let users: Vec<_> = record.api_endpoints.iter().filter(|o| o.url == url).collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].method, "GET");

        // Same winner whichever side is merged first
        let post = EndpointRecord::page("/dashboard")
            .with_api_call(ApiCallObservation::new(url, Some("POST")));
        let get = EndpointRecord::page("/dashboard")
            .with_api_call(ApiCallObservation::new(url, Some("GET")));
        assert_eq!(post.clone().merged(get.clone()), get.merged(post));
    }

    #[test]
    fn test_registry_single_record_per_path() {
        let mut registry = EndpointRegistry::new();
        registry.merge(EndpointRecord::page("/login"));
        registry.merge(EndpointRecord::new("/login/", "POST"));
        registry.merge(EndpointRecord::page("/login?next=/home"));

        assert_eq!(registry.len(), 1);
        let record = registry.get("/login/").unwrap();
        assert_eq!(record.methods.len(), 2);
    }

    #[test]
    fn test_registry_order_independent() {
        let records = vec![login_record(), login_variant(), settings_variant(), EndpointRecord::page("/")];

        let forward: EndpointRegistry = records.clone().into_iter().collect();
        let backward: EndpointRegistry = records.into_iter().rev().collect();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_record_json_shape() {
        let record = EndpointRecord::new("/authenticate", "POST").with_fields([
            FormField::new("password", "password"),
            FormField::new("email", "email").required(true),
        ]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "/authenticate",
                "methods": ["POST"],
                "form_fields": [
                    {"name": "email", "type": "email", "required": true},
                    {"name": "password", "type": "password", "required": false}
                ],
                "api_endpoints": []
            })
        );

        let back: EndpointRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_registry_serializes_as_list() {
        let registry: EndpointRegistry =
            vec![EndpointRecord::page("/b"), EndpointRecord::page("/a")].into_iter().collect();
        let json = serde_json::to_value(&registry).unwrap();
        let paths: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["path"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(paths, vec!["/a", "/b"]);
    }
}
