use log::info;
use std::sync::Arc;

use actix_web::{HttpResponse, Responder, guard, http::Method, web};
use serde::Serialize;

use crate::coordinator::Coordinator;
use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

#[derive(Debug, Serialize)]
struct RelayStatus {
    on: bool,
}

impl AppState {
    pub fn api_scope(&self, base_path: &str) -> actix_web::Scope {
        web::scope(base_path)
            .service(
                web::resource("/on")
                    .route(web::get().to(power_on))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/off")
                    .route(web::get().to(power_off))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/state")
                    .route(web::get().to(relay_state))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
    }
}

async fn power_on(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    info!("on received; powering up");
    state.coordinator.set_state(true)?;

    Ok(ok_response())
}

async fn power_off(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    info!("off received; shutting down");
    state.coordinator.set_state(false)?;

    Ok(ok_response())
}

async fn relay_state(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let on = state.coordinator.get_state();

    Ok(web::Json(RelayStatus { on }))
}

fn ok_response() -> HttpResponse {
    HttpResponse::Ok().content_type("text/html").body("OK")
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
