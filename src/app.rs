//! # Aplicación de Demostración
//! src/app.rs
//!
//! Rutas que muestran cada capacidad del servidor: herencia, includes y
//! loops de plantillas, formularios, parámetros de ruta, JSON, errores,
//! cookies y hot reload.

use crate::http::{CookieOptions, Request, Response, SameSite};
use crate::router::{HandlerResult, Router};
use crate::templates::{row, Context, TemplateEngine};
use std::sync::Arc;

/// Registra las rutas de la demo en `router`
pub fn register_routes(router: &Router, engine: &Arc<TemplateEngine>) {
    let templates = Arc::clone(engine);
    router.route("/", move |_req| Ok(Response::html(&templates.render("main.html", &home_context()))));

    let templates = Arc::clone(engine);
    router.route("/form", move |_req| Ok(Response::html(&templates.render("form.html", &Context::new()))));

    router.route("/submit", submit);

    let templates = Arc::clone(engine);
    router.route_param("/user/<id>", move |req| {
        let ctx = Context::new().with("userId", req.route_param("id").unwrap_or_default());
        Ok(Response::html(&templates.render("user.html", &ctx)))
    });

    let templates = Arc::clone(engine);
    router.route_param("/extend", move |_req| {
        let ctx = Context::new()
            .with("title", "Página con Herencia")
            .with("show", true)
            .with("message", "Esta página hereda la plantilla base.");
        Ok(Response::html(&templates.render("extend.html", &ctx)))
    });

    router.route("/api/data", |_req| {
        let body = serde_json::json!({ "status": "ok", "message": "Hello from JSON!" });
        Ok(Response::json(&body.to_string()))
    });

    router.route("/error", |_req| Err("Error de prueba".into()));

    router.route("/set_cookie", set_cookie);
    router.route("/get_cookie", get_cookie);
    router.route("/delete_cookie", |_req| {
        Ok(Response::html("<h1>Cookie Deleted</h1><p>Cookie 'User' eliminada.</p>")
            .with_deleted_cookie("User", "/"))
    });

    let templates = Arc::clone(engine);
    router.route("/hot_reload", move |_req| {
        Ok(Response::html(&templates.render("hot_reload_test.html", &Context::new())))
    });
}

/// Contexto de la portada
fn home_context() -> Context {
    Context::new()
        .with("title", "Bienvenido")
        .with("show", true)
        .with("message", "<b>¡Hola, mundo!</b>")
        .with(
            "items",
            vec![
                row([("field", "Elemento 1")]),
                row([("field", "Elemento 2")]),
                row([("field", "Elemento 3")]),
            ],
        )
        .with("note", "Nota desde la plantilla parcial.")
}

fn submit(req: &Request) -> HandlerResult {
    let user = req.form_param("username").unwrap_or_default();
    Ok(Response::html(&format!(
        "<h1>Hola, {}!</h1><a href=\"/\">Volver</a>",
        crate::templates::filters::escape_html(user)
    )))
}

fn set_cookie(_req: &Request) -> HandlerResult {
    let session = CookieOptions::default()
        .secure(true)
        .same_site(Some(SameSite::Strict));

    Ok(Response::html("<h1>Cookie Set</h1><p>Cookie 'User' guardada.</p>")
        .with_cookie("User", "JohnDoe", &CookieOptions::default())
        .with_cookie("SessionID", "abc123", &session))
}

fn get_cookie(req: &Request) -> HandlerResult {
    let mut body = String::from("<h1>Get Cookie</h1>");
    match req.cookie("User") {
        Some(user) => body.push_str(&format!("<p>Cookie 'User' = {}</p>", user)),
        None => body.push_str("<p>Cookie 'User' no encontrada.</p>"),
    }
    Ok(Response::html(&body))
}
