//! # Contexto de Render
//! src/templates/context.rs
//!
//! Valores que consulta el motor de plantillas. Un valor es un string, un
//! booleano o una lista de mapas (string → string) que alimenta los
//! `{% for %}`.
//!
//! ```
//! use app_server::templates::Context;
//!
//! let ctx = Context::from_json(r#"{
//!     "title": "Inicio",
//!     "show": true,
//!     "items": [{"field": "uno"}, {"field": "dos"}]
//! }"#).unwrap();
//!
//! assert_eq!(ctx.lookup("title").as_deref(), Some("Inicio"));
//! assert_eq!(ctx.lookup("items.field").as_deref(), Some("uno"));
//! assert!(ctx.is_truthy("show"));
//! ```

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;

/// Elemento de una lista de loop
pub type Row = HashMap<String, String>;

/// Valor de una variable de plantilla
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Bool(bool),
    List(Vec<Row>),
}

impl Value {
    /// Booleanos por sí mismos; strings y listas si no están vacíos
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(rows) => !rows.is_empty(),
        }
    }

    /// Texto que produce `{{ var }}`
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::Str(s) => Cow::Borrowed(s),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::List(_) => Cow::Borrowed("[object]"),
        }
    }

    pub fn as_list(&self) -> Option<&[Row]> {
        match self {
            Value::List(rows) => Some(rows),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Row>> for Value {
    fn from(rows: Vec<Row>) -> Self {
        Value::List(rows)
    }
}

/// Mapa nombre → valor
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsea un objeto JSON (strings, booleanos o arrays de objetos)
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Versión builder de `insert`
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::templates::Context;
    ///
    /// let ctx = Context::new().with("name", "world").with("show", true);
    /// assert_eq!(ctx.len(), 2);
    /// ```
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resuelve un nombre a texto
    ///
    /// Primero la clave exacta; si no existe y el nombre es `padre.hijo`,
    /// busca `hijo` en el primer elemento de la lista `padre`.
    pub fn lookup(&self, name: &str) -> Option<Cow<'_, str>> {
        if let Some(value) = self.values.get(name) {
            return Some(value.render());
        }

        let (parent, child) = name.split_once('.')?;
        self.values
            .get(parent)?
            .as_list()?
            .first()?
            .get(child)
            .map(|s| Cow::Borrowed(s.as_str()))
    }

    /// Veracidad de un nombre; los ausentes son falsos
    pub fn is_truthy(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(value) => value.is_truthy(),
            None => self.lookup(name).is_some_and(|s| !s.is_empty()),
        }
    }

    /// Lista asociada a `name`, si el valor es una lista
    pub fn list(&self, name: &str) -> Option<&[Row]> {
        self.values.get(name)?.as_list()
    }

    /// Hash SHA-256 (hex) del contexto, independiente del orden de inserción
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();

        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();

        for name in names {
            hash_field(&mut hasher, name.as_bytes());
            match &self.values[name] {
                Value::Str(s) => {
                    hasher.update(b"s");
                    hash_field(&mut hasher, s.as_bytes());
                }
                Value::Bool(b) => {
                    hasher.update(if *b { b"t" } else { b"f" });
                }
                Value::List(rows) => {
                    hasher.update(b"l");
                    hasher.update((rows.len() as u64).to_le_bytes());
                    for row in rows {
                        let mut pairs: Vec<(&String, &String)> = row.iter().collect();
                        pairs.sort();
                        hasher.update((pairs.len() as u64).to_le_bytes());
                        for (key, value) in pairs {
                            hash_field(&mut hasher, key.as_bytes());
                            hash_field(&mut hasher, value.as_bytes());
                        }
                    }
                }
            }
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Campo con prefijo de longitud, para que `("ab","c")` ≠ `("a","bc")`
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Construye una fila de loop a partir de pares
pub fn row<const N: usize>(pairs: [(&str, &str); N]) -> Row {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
