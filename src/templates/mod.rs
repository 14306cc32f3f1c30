//! # Plantillas
//! src/templates/mod.rs
//!
//! Motor de plantillas de texto con la sintaxis:
//!
//! ```text
//! {{ nombre }}  {{ nombre|upper }}  {{ item.campo|escape }}
//! {% if VAR %} … {% else %} … {% endif %}
//! {% for it in lista %} … {% endfor %}
//! {% include "parcial.html" %}
//! {% extends "base.html" %}  {% block nombre %} … {% endblock %}
//! {# comentario #}
//! ```
//!
//! `TemplateLoader` llena el motor desde un directorio y opcionalmente lo
//! mantiene actualizado con un hilo de hot reload.

pub mod cache;
pub mod context;
pub mod engine;
pub mod filters;
pub mod loader;

pub use cache::IncludeCache;
pub use context::{row, Context, Row, Value};
pub use engine::TemplateEngine;
pub use loader::{HotReloader, TemplateLoader, DEFAULT_RELOAD_INTERVAL};
