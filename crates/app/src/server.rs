//! Actix Web server exposing the dashboard page, the view data, and the
//! per-viewer selection sessions.
//!
//! The server runs on a dedicated thread so the CLI thread only has to watch
//! for Ctrl+C. The listener is bound before the thread starts so an occupied
//! port fails startup instead of surfacing later as a log line.

use std::{net::TcpListener, sync::Arc, thread::JoinHandle};

use actix_web::{App, HttpResponse, HttpServer, Responder, web};
use anyhow::{Context, Result};
use dashboard::{DashboardViews, UserEvent};
use tokio::sync::oneshot;
use tracing::{error, info_span, warn};
use uuid::Uuid;

use crate::{html::dashboard::DASHBOARD_HTML, registry::SessionRegistry, telemetry};

/// Shared state backing HTTP handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) views: Arc<DashboardViews>,
    pub(crate) registry: SessionRegistry,
}

/// Handle for the dashboard server thread.
#[derive(Default)]
pub(crate) struct DashboardServer {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DashboardServer {
    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(self) {
        if let Some(tx) = self.shutdown {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle {
            let _ = handle.join();
        }
    }
}

/// Bind `bind:port` and spawn the server thread.
pub(crate) fn spawn_dashboard_server(
    state: AppState,
    bind: &str,
    port: u16,
) -> Result<DashboardServer> {
    let listener = TcpListener::bind((bind, port))
        .with_context(|| format!("Failed to bind dashboard server to {bind}:{port}"))?;
    let data = web::Data::new(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = std::thread::Builder::new()
        .name("dashboard-server".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new().app_data(data.clone()).configure(configure)
                })
                .listen(listener)?
                .run();

                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn dashboard server thread")?;
    Ok(DashboardServer {
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Register every dashboard route on `cfg`.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_route))
        .route("/api/views", web::get().to(views_handler))
        .route("/api/sessions", web::post().to(create_session_handler))
        .route("/api/sessions/{id}", web::get().to(snapshot_handler))
        .route("/api/sessions/{id}", web::delete().to(delete_session_handler))
        .route("/api/sessions/{id}/events", web::post().to(event_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

async fn index_route() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(DASHBOARD_HTML)
}

async fn views_handler(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.views.as_ref())
}

async fn create_session_handler(state: web::Data<AppState>) -> HttpResponse {
    match state.registry.create() {
        Some(created) => HttpResponse::Created().json(created),
        None => {
            warn!("Session registry lock poisoned; refusing new viewer session");
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn snapshot_handler(path: web::Path<Uuid>, state: web::Data<AppState>) -> HttpResponse {
    match state.registry.snapshot(&path.into_inner()) {
        Some(snapshot) => HttpResponse::Ok().json(snapshot),
        None => HttpResponse::NotFound().finish(),
    }
}

async fn event_handler(
    path: web::Path<Uuid>,
    event: web::Json<UserEvent>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let id = path.into_inner();
    let event = event.into_inner();
    let _span = info_span!("dashboard.request", session = %id, kind = event.kind()).entered();
    match state.registry.apply(&id, event) {
        Some(snapshot) => HttpResponse::Ok().json(snapshot),
        None => HttpResponse::NotFound().finish(),
    }
}

async fn delete_session_handler(path: web::Path<Uuid>, state: web::Data<AppState>) -> HttpResponse {
    if state.registry.remove(&path.into_inner()) {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::NotFound().finish()
    }
}

async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};
    use dashboard::SelectionLinks;
    use serde_json::{Value, json};
    use som_core::{GeometryTable, PipelineConfig, TrainingParams, run_table};

    use super::*;

    fn app_state() -> AppState {
        let features: Vec<_> = (0..24)
            .map(|idx| {
                let (x, y) = ((idx % 6) as f64, (idx / 6) as f64);
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
                    },
                    "properties": {
                        "income": if idx < 12 { 10.0 + (idx % 3) as f64 } else { 40.0 + (idx % 4) as f64 },
                        "age": (idx % 7) as f64
                    }
                })
            })
            .collect();
        let text = json!({ "type": "FeatureCollection", "features": features }).to_string();
        let table = GeometryTable::parse("memory.geojson", &text).unwrap();
        let config = PipelineConfig {
            training: TrainingParams {
                x_dim: 4,
                y_dim: 4,
                iterations: 200,
                ..TrainingParams::default()
            },
            n_clusters: 3,
            ..PipelineConfig::default()
        };
        let output = run_table(table, &config).unwrap();
        let views = DashboardViews::build(&output);
        let links = Arc::new(SelectionLinks::from_views(&views));
        AppState {
            views: Arc::new(views),
            registry: SessionRegistry::new(links),
        }
    }

    #[actix_web::test]
    async fn serves_page_and_views() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let views: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/views").to_request())
                .await;
        assert_eq!(views["nodes"]["records"].as_array().map(Vec::len), Some(16));
        assert_eq!(views["regions"]["records"].as_array().map(Vec::len), Some(24));
        assert_eq!(views["buttons"].as_array().map(Vec::len), Some(3));
    }

    #[actix_web::test]
    async fn session_round_trip() {
        let state = app_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/sessions").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["snapshot"]["color_mode"], "cluster");
        assert_eq!(state.registry.len(), 1);

        let snap: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/sessions/{id}/events"))
                .set_json(json!({ "kind": "node_selection", "indices": [5] }))
                .to_request(),
        )
        .await;
        assert_eq!(snap["nodes"], json!([5]));
        assert!(snap["table"].as_array().unwrap().len() <= 1);

        let snap: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/sessions/{id}/events"))
                .set_json(json!({ "kind": "toggle_umatrix", "active": true }))
                .to_request(),
        )
        .await;
        assert_eq!(snap["color_mode"], "umatrix");
        assert_eq!(snap["umatrix_legend_visible"], true);
        assert_eq!(snap["cluster_legend_visible"], false);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/api/sessions/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.registry.len(), 0);
    }

    #[actix_web::test]
    async fn unknown_session_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;

        let id = Uuid::new_v4();
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/sessions/{id}/events"))
                .set_json(json!({ "kind": "cluster_button", "cluster": 0 }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/sessions/{id}"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
