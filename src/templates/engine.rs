//! # Motor de Plantillas
//! src/templates/engine.rs
//!
//! Orden del render (cada paso trabaja sobre el texto completo del anterior):
//!
//! 1. `{% extends "base" %}` + `{% block x %}…{% endblock %}`
//! 2. Comentarios `{# … #}`
//! 3. `{% include "parcial" %}` (con cache)
//! 4. `{% if VAR %}…{% else %}…{% endif %}`
//! 5. `{% for it in lista %}…{% endfor %}`
//! 6. `{{ nombre|filtro }}`
//!
//! Los includes y condicionales que están dentro de un `for` no se tocan en
//! los pasos 3 y 4: se resuelven en cada iteración, con las variables del
//! loop disponibles. Una construcción sin cerrar queda tal cual en la
//! salida.

use super::cache::IncludeCache;
use super::context::Context;
use super::filters::apply_filters;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Profundidad máxima de includes anidados
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Niveles máximos de herencia
pub const MAX_EXTENDS_DEPTH: usize = 16;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{%\s*([A-Za-z]+)\b\s*(.*?)\s*%\}").expect("tag regex is valid")
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{#.*?#\}").expect("comment regex is valid"));

static VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("variable regex is valid"));

static EXTENDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*\{%\s*extends\s+"([^"]*)"\s*%\}"#).expect("extends regex is valid")
});

/// Motor de plantillas thread-safe
///
/// # Ejemplo
/// ```
/// use app_server::templates::{Context, TemplateEngine};
///
/// let engine = TemplateEngine::new();
/// engine.set_template("hello.html", "Hello {{ name|upper }}");
///
/// let ctx = Context::new().with("name", "world");
/// assert_eq!(engine.render("hello.html", &ctx), "Hello WORLD");
/// assert_eq!(engine.render("nope.html", &ctx), "Template not found: nope.html");
/// ```
#[derive(Debug, Default)]
pub struct TemplateEngine {
    templates: RwLock<HashMap<String, String>>,
    cache: IncludeCache,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instala (o reemplaza) una plantilla e invalida el cache de includes
    pub fn set_template(&self, name: &str, source: &str) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), source.to_string());
        self.cache.invalidate();
        debug!(template = name, bytes = source.len(), "Template installed");
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.read_templates().contains_key(name)
    }

    /// Nombres instalados, ordenados
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read_templates().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read_templates().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cache(&self) -> &IncludeCache {
        &self.cache
    }

    /// Renderiza una plantilla instalada
    pub fn render(&self, name: &str, ctx: &Context) -> String {
        match self.source(name) {
            Some(source) => self.render_source(&source, ctx, 0),
            None => format!("Template not found: {}", name),
        }
    }

    fn read_templates(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.templates.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn source(&self, name: &str) -> Option<String> {
        self.read_templates().get(name).cloned()
    }

    fn render_source(&self, source: &str, ctx: &Context, depth: usize) -> String {
        let merged = self.resolve_extends(source);
        self.render_content(&merged, ctx, depth)
    }

    /// Pasos 2 a 6
    fn render_content(&self, text: &str, ctx: &Context, depth: usize) -> String {
        let text = COMMENT_RE.replace_all(text, "");
        let text = self.expand_includes(&text, ctx, depth);
        let text = expand_conditionals(&text, ctx);
        let text = self.expand_loops(&text, ctx, depth);
        interpolate(&text, ctx)
    }

    // ---- extends ----

    fn resolve_extends(&self, source: &str) -> String {
        let mut current = source.to_string();
        let mut overrides: HashMap<String, String> = HashMap::new();

        for _ in 0..MAX_EXTENDS_DEPTH {
            let Some(parent_name) = extends_target(&current) else {
                return strip_blocks(&current);
            };
            let Some(parent) = self.source(&parent_name) else {
                warn!(parent = %parent_name, "Parent template not found");
                return strip_blocks(&current);
            };

            collect_blocks(&current, &mut overrides);
            current = apply_overrides(&parent, &overrides, &mut Vec::new());
        }

        warn!(limit = MAX_EXTENDS_DEPTH, "Template inheritance chain too deep");
        strip_blocks(&current)
    }

    // ---- include ----

    fn expand_includes(&self, text: &str, ctx: &Context, depth: usize) -> String {
        let mut out = text.to_string();
        let mut cursor = 0;
        let mut digest = None;

        while let Some((start, end, args)) = next_top_level_tag(&out, cursor, "include") {
            let rendered = quoted(&args)
                .and_then(|name| self.render_include(name, ctx, &mut digest, depth));

            match rendered {
                Some(rendered) => {
                    out.replace_range(start..end, &rendered);
                    cursor = start + rendered.len();
                }
                None => cursor = end,
            }
        }

        out
    }

    /// `None` deja el tag tal cual (plantilla desconocida o límite de anidamiento)
    fn render_include(
        &self,
        name: &str,
        ctx: &Context,
        digest: &mut Option<String>,
        depth: usize,
    ) -> Option<String> {
        if depth >= MAX_INCLUDE_DEPTH {
            warn!(template = name, limit = MAX_INCLUDE_DEPTH, "Include depth limit reached");
            return None;
        }

        let digest = digest.get_or_insert_with(|| ctx.digest());
        if let Some(hit) = self.cache.get(name, digest) {
            return Some(hit);
        }

        let generation = self.cache.generation();
        let source = self.source(name)?;
        let rendered = self.render_source(&source, ctx, depth + 1);
        self.cache.insert(generation, name, digest, rendered.clone());
        Some(rendered)
    }

    // ---- for ----

    fn expand_loops(&self, text: &str, ctx: &Context, depth: usize) -> String {
        let mut out = text.to_string();
        let mut cursor = 0;

        while let Some(scan) = next_loop(&out, cursor) {
            match scan {
                LoopScan::Skip(end) => cursor = end,
                LoopScan::Loop {
                    start,
                    end,
                    var,
                    list,
                    body,
                } => {
                    let mut rendered = String::new();
                    for row in ctx.list(&list).unwrap_or_default() {
                        let mut scope = ctx.clone();
                        for (key, value) in row {
                            scope.insert(&format!("{}.{}", var, key), value.as_str());
                        }
                        rendered.push_str(&self.render_content(&body, &scope, depth));
                    }
                    out.replace_range(start..end, &rendered);
                    cursor = start + rendered.len();
                }
            }
        }

        out
    }
}

/// Un `{% … %}` encontrado en el texto
#[derive(Debug, Clone, Copy)]
struct Tag<'t> {
    start: usize,
    end: usize,
    name: &'t str,
    args: &'t str,
}

fn scan_tags(text: &str) -> Vec<Tag<'_>> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Tag {
                start: whole.start(),
                end: whole.end(),
                name: caps.get(1)?.as_str(),
                args: caps.get(2).map_or("", |m| m.as_str()),
            })
        })
        .collect()
}

/// Índice del tag que cierra `tags[open]`, contando anidamiento
fn matching_close(tags: &[Tag<'_>], open: usize, close_name: &str) -> Option<usize> {
    let open_name = tags[open].name;
    let mut depth = 0usize;
    for (i, tag) in tags.iter().enumerate().skip(open + 1) {
        if tag.name == open_name {
            depth += 1;
        } else if tag.name == close_name {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// Rangos de los `{% for %}…{% endfor %}` más externos
fn loop_regions(tags: &[Tag<'_>]) -> Vec<(usize, usize)> {
    let mut regions = Vec::new();
    let mut i = 0;
    while i < tags.len() {
        if tags[i].name == "for" {
            if let Some(close) = matching_close(tags, i, "endfor") {
                regions.push((tags[i].start, tags[close].end));
                i = close + 1;
                continue;
            }
        }
        i += 1;
    }
    regions
}

fn in_regions(regions: &[(usize, usize)], pos: usize) -> bool {
    regions.iter().any(|&(start, end)| pos >= start && pos < end)
}

/// Primer tag `name` desde `cursor` que no esté dentro de un loop
fn next_top_level_tag(text: &str, cursor: usize, name: &str) -> Option<(usize, usize, String)> {
    let tags = scan_tags(text);
    let regions = loop_regions(&tags);
    tags.iter()
        .find(|tag| tag.name == name && tag.start >= cursor && !in_regions(&regions, tag.start))
        .map(|tag| (tag.start, tag.end, tag.args.to_string()))
}

/// Contenido de `"nombre"`
fn quoted(args: &str) -> Option<&str> {
    let args = args.trim();
    args.strip_prefix('"')?.strip_suffix('"')
}

// ---- if ----

fn expand_conditionals(text: &str, ctx: &Context) -> String {
    let mut out = text.to_string();
    let mut cursor = 0;

    while let Some(scan) = next_conditional(&out, cursor) {
        match scan {
            IfScan::Unclosed(end) => cursor = end,
            IfScan::Block {
                start,
                end,
                condition,
                then_branch,
                else_branch,
            } => {
                let chosen = if ctx.is_truthy(&condition) {
                    out[then_branch].to_string()
                } else {
                    else_branch.map(|range| out[range].to_string()).unwrap_or_default()
                };
                out.replace_range(start..end, &chosen);
                // La rama elegida puede traer otros `if`
                cursor = start;
            }
        }
    }

    out
}

enum IfScan {
    Unclosed(usize),
    Block {
        start: usize,
        end: usize,
        condition: String,
        then_branch: std::ops::Range<usize>,
        else_branch: Option<std::ops::Range<usize>>,
    },
}

fn next_conditional(text: &str, cursor: usize) -> Option<IfScan> {
    let tags = scan_tags(text);
    let regions = loop_regions(&tags);
    let open = tags
        .iter()
        .position(|tag| tag.name == "if" && tag.start >= cursor && !in_regions(&regions, tag.start))?;

    let Some(close) = matching_close(&tags, open, "endif") else {
        return Some(IfScan::Unclosed(tags[open].end));
    };

    let mut depth = 0usize;
    let mut else_tag = None;
    for (i, tag) in tags.iter().enumerate().take(close).skip(open + 1) {
        match tag.name {
            "if" => depth += 1,
            "endif" => depth = depth.saturating_sub(1),
            "else" if depth == 0 => {
                else_tag = Some(i);
                break;
            }
            _ => {}
        }
    }

    let (open_tag, close_tag) = (tags[open], tags[close]);
    let (then_branch, else_branch) = match else_tag {
        Some(i) => (
            open_tag.end..tags[i].start,
            Some(tags[i].end..close_tag.start),
        ),
        None => (open_tag.end..close_tag.start, None),
    };

    Some(IfScan::Block {
        start: open_tag.start,
        end: close_tag.end,
        condition: open_tag.args.trim().to_string(),
        then_branch,
        else_branch,
    })
}

// ---- for ----

enum LoopScan {
    Skip(usize),
    Loop {
        start: usize,
        end: usize,
        var: String,
        list: String,
        body: String,
    },
}

fn next_loop(text: &str, cursor: usize) -> Option<LoopScan> {
    let tags = scan_tags(text);
    let open = tags
        .iter()
        .position(|tag| tag.name == "for" && tag.start >= cursor)?;
    let open_tag = tags[open];

    let parts: Vec<&str> = open_tag.args.split_whitespace().collect();
    let [var, "in", list] = parts.as_slice() else {
        return Some(LoopScan::Skip(open_tag.end));
    };

    let Some(close) = matching_close(&tags, open, "endfor") else {
        return Some(LoopScan::Skip(open_tag.end));
    };
    let close_tag = tags[close];

    Some(LoopScan::Loop {
        start: open_tag.start,
        end: close_tag.end,
        var: var.to_string(),
        list: list.to_string(),
        body: text[open_tag.end..close_tag.start].to_string(),
    })
}

// ---- variables ----

fn interpolate(text: &str, ctx: &Context) -> String {
    VAR_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let mut parts = caps[1].split('|').map(str::trim);
            let name = parts.next().unwrap_or_default();
            let value = ctx.lookup(name).unwrap_or_default();
            apply_filters(&value, parts.filter(|filter| !filter.is_empty()))
        })
        .into_owned()
}

// ---- blocks ----

fn extends_target(text: &str) -> Option<String> {
    EXTENDS_RE.captures(text).map(|caps| caps[1].to_string())
}

fn block_name(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

/// Bloques definidos en `text`; el primero que aparece gana
fn collect_blocks(text: &str, overrides: &mut HashMap<String, String>) {
    let tags = scan_tags(text);
    for (i, tag) in tags.iter().enumerate() {
        if tag.name != "block" {
            continue;
        }
        let (Some(name), Some(close)) = (block_name(tag.args), matching_close(&tags, i, "endblock"))
        else {
            continue;
        };
        overrides
            .entry(name.to_string())
            .or_insert_with(|| text[tag.end..tags[close].start].to_string());
    }
}

/// Reemplaza el contenido de cada bloque de `parent` por su override,
/// manteniendo los tags para el siguiente nivel de herencia
fn apply_overrides(
    parent: &str,
    overrides: &HashMap<String, String>,
    active: &mut Vec<String>,
) -> String {
    let tags = scan_tags(parent);
    let mut out = String::with_capacity(parent.len());
    let mut last = 0;
    let mut i = 0;

    while i < tags.len() {
        let tag = tags[i];
        let block = (tag.name == "block")
            .then(|| block_name(tag.args).zip(matching_close(&tags, i, "endblock")))
            .flatten();

        let Some((name, close)) = block else {
            i += 1;
            continue;
        };
        let close_tag = tags[close];

        let inner = match overrides.get(name) {
            Some(child) if !active.iter().any(|a| a == name) => child.as_str(),
            _ => &parent[tag.end..close_tag.start],
        };

        out.push_str(&parent[last..tag.end]);
        active.push(name.to_string());
        out.push_str(&apply_overrides(inner, overrides, active));
        active.pop();
        out.push_str(&parent[close_tag.start..close_tag.end]);

        last = close_tag.end;
        i = close + 1;
    }

    out.push_str(&parent[last..]);
    out
}

/// Quita los pares `{% block %}`/`{% endblock %}` conservando su contenido
fn strip_blocks(text: &str) -> String {
    let tags = scan_tags(text);
    let mut remove = vec![false; tags.len()];
    let mut open = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        match tag.name {
            "block" => open.push(i),
            "endblock" => {
                if let Some(start) = open.pop() {
                    remove[start] = true;
                    remove[i] = true;
                }
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (tag, _) in tags.iter().zip(&remove).filter(|(_, removed)| **removed) {
        out.push_str(&text[last..tag.start]);
        last = tag.end;
    }
    out.push_str(&text[last..]);
    out
}
