//! Ordered procedure-call parameters with naming-convention translation.
//!
//! The server expects camelCase configuration keys; the client API speaks
//! snake_case. Translation happens once, at insertion, and is pure,
//! deterministic, and idempotent. `None`/`Null` values are omitted entirely
//! so that server-side defaults apply — a key is either present with a
//! concrete value or absent.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::Value;

/// Translate a snake_case name to camelCase.
///
/// Names without underscores pass through unchanged, which makes the
/// transform idempotent: translating an already-translated name is a no-op.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Translate a camelCase name back to snake_case, recovering the original
/// spelling for display purposes. Inverse of [`snake_to_camel`] for names
/// that follow the usual lowercase-word convention.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn translate_value(value: Value) -> Value {
    match value {
        Value::Map(m) => Value::Map(
            m.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (snake_to_camel(&k), translate_value(v)))
                .collect(),
        ),
        Value::List(l) => Value::List(l.into_iter().map(translate_value).collect()),
        other => other,
    }
}

/// An insertion-ordered parameter map for a single procedure call.
///
/// Order matters: the Cypher envelope binds parameters positionally
/// (`CALL name($a, $b, $c)`), so the first inserted entry is the first
/// positional argument on the wire. Never persisted beyond one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParameters {
    entries: IndexMap<String, Value>,
}

impl CallParameters {
    pub fn new() -> Self {
        Self { entries: IndexMap::new() }
    }

    /// Insert a parameter. The key is translated to camelCase; `Null`
    /// values are dropped so the server default applies; nested maps are
    /// translated recursively.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() {
            return;
        }
        self.entries.insert(snake_to_camel(&key.into()), translate_value(value));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Look up a parameter. The key is translated the same way as on
    /// insertion, so `get("graph_name")` and `get("graphName")` agree.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(snake_to_camel(key).as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// The positional placeholder list for the Cypher call envelope,
    /// e.g. `"$graphName, $nodeSpec, $config"`.
    pub fn placeholder_string(&self) -> String {
        self.entries
            .keys()
            .map(|k| format!("${k}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The entries as a plain map, for transports that bind by name.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CallParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CallParameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
