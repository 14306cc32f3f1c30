//! # Filtros
//! src/templates/filters.rs
//!
//! `{{ name|upper }}`, `{{ name|lower }}`, `{{ name|escape }}`. Se aplican
//! de izquierda a derecha; un filtro desconocido deja el valor igual.

/// Escapa `<`, `>`, `&` y `"`
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Aplica un filtro por nombre
pub fn apply_filter(value: &str, filter: &str) -> String {
    match filter {
        "upper" => value.to_uppercase(),
        "lower" => value.to_lowercase(),
        "escape" => escape_html(value),
        _ => value.to_string(),
    }
}

/// Aplica una cadena de filtros en orden
///
/// # Ejemplo
/// ```
/// use app_server::templates::filters::apply_filters;
///
/// assert_eq!(apply_filters("<B>", ["lower", "escape"]), "&lt;b&gt;");
/// ```
pub fn apply_filters<'a, I>(value: &str, filters: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    filters
        .into_iter()
        .fold(value.to_string(), |acc, filter| apply_filter(&acc, filter))
}
