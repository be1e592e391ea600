use std::sync::Arc;

use actix_web::{App, test, web};
use hevo_power::{
    AppConfig, AppState, Coordinator, GpioBackend, MockGpioBackend, MockLine, OutputDriver,
};
use serde_json::Value;

fn relay(cfg: &AppConfig) -> (Arc<MockLine>, AppState) {
    let backend = MockGpioBackend::default();
    let line = backend
        .request_output(&cfg.ssr)
        .expect("ssr line available");
    let driver = OutputDriver::configure(line).expect("ssr configured");
    let state = AppState {
        coordinator: Arc::new(Coordinator::new(driver)),
    };
    (backend.line(&cfg.ssr.chip, cfg.ssr.line), state)
}

#[actix_rt::test]
async fn on_switches_relay_and_answers_ok() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);
    let coordinator = state.coordinator.clone();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    let req = test::TestRequest::get().uri("/hevo/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/html"
    );
    let body = test::read_body(resp).await;
    assert_eq!(body, "OK");

    assert!(coordinator.get_state());
    assert!(ssr.level());
    assert_eq!(ssr.written(), vec![false, true]);
}

#[actix_rt::test]
async fn off_after_on_costs_exactly_one_write() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);
    let coordinator = state.coordinator.clone();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    coordinator.set_state(true).unwrap();
    let writes = ssr.write_count();

    let req = test::TestRequest::get().uri("/hevo/off").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert_eq!(body, "OK");

    assert!(!coordinator.get_state());
    assert_eq!(ssr.write_count(), writes + 1);
}

#[actix_rt::test]
async fn repeated_on_still_writes() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get().uri("/hevo/on").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
    assert_eq!(ssr.written(), vec![false, true, true]);
}

#[actix_rt::test]
async fn state_reports_relay() {
    let cfg = AppConfig::default();
    let (_ssr, state) = relay(&cfg);
    let coordinator = state.coordinator.clone();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    let req = test::TestRequest::get().uri("/hevo/state").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["on"], false);

    coordinator.toggle().unwrap();

    let req = test::TestRequest::get().uri("/hevo/state").to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["on"], true);
}

#[actix_rt::test]
async fn unknown_path_returns_404_without_touching_relay() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    for uri in ["/hevo/toggle", "/hevo", "/index.html"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404, "{uri}");
    }
    assert_eq!(ssr.write_count(), 1);
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    let req = test::TestRequest::post().uri("/hevo/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
    assert!(!ssr.level());
}

#[actix_rt::test]
async fn failed_write_returns_500_and_keeps_state() {
    let cfg = AppConfig::default();
    let (ssr, state) = relay(&cfg);
    let coordinator = state.coordinator.clone();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    ssr.set_fail_writes(true);
    let req = test::TestRequest::get().uri("/hevo/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("GPIO error"));

    assert!(!coordinator.get_state());
}

#[actix_rt::test]
async fn custom_base_path() {
    let cfg = AppConfig::from_json(r#"{ "http": { "path": "/power" } }"#).unwrap();
    let (ssr, state) = relay(&cfg);

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(state.api_scope(&cfg.http.path)),
    )
    .await;

    let req = test::TestRequest::get().uri("/power/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    assert!(ssr.level());

    let req = test::TestRequest::get().uri("/hevo/on").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}
