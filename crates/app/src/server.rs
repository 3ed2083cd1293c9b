//! Actix Web proxy serving the browser map.
//!
//! Browsers cannot reach arbitrary mask services directly, so catalog and
//! mask requests are relayed through here. The proxy also hands out the
//! geometry presets and the client configuration the map shell needs.

use std::path::Path;

use actix_web::{App, HttpResponse, HttpServer, http::StatusCode, web};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use snorkel_core::{GeometryPresets, JsonTransport};
use tracing::info;

use crate::config::ServeConfig;
use crate::proxy::{Relayed, Upstream, relay};
use crate::telemetry;
use crate::transport::ReqwestTransport;

/// Shared state backing HTTP handlers.
pub(crate) struct ProxyState<T> {
    pub(crate) transport: T,
    pub(crate) default_host: String,
    pub(crate) api_key: String,
    /// Presets file contents, served as-is.
    pub(crate) geometries: Value,
}

#[derive(Deserialize)]
struct CatalogBody {
    #[serde(rename = "catalogUrl")]
    catalog_url: Option<String>,
}

#[derive(Deserialize)]
struct MaskBody {
    #[serde(rename = "maskUrl")]
    mask_url: Option<String>,
    payload: Option<Value>,
}

/// Bind the proxy and serve until the process is stopped.
pub(crate) fn run(config: ServeConfig) -> Result<()> {
    telemetry::init_metrics_recorder()?;
    let geometries = load_geometries(config.geometries.as_deref())?;
    let transport = ReqwestTransport::new(config.upstream.timeout)?;
    let state = web::Data::new(ProxyState {
        transport,
        default_host: config.upstream.host.clone(),
        api_key: config.api_key,
        geometries,
    });

    info!(
        bind = %config.bind,
        default_host = %config.upstream.host,
        "starting snorkel proxy"
    );
    let bind = config.bind;
    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(routes::<ReqwestTransport>)
        })
        .bind(bind)
        .with_context(|| format!("Failed to bind proxy to {bind}"))?
        .run()
        .await
        .context("HTTP server error")
    })
}

pub(crate) fn routes<T: JsonTransport + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/catalog", web::post().to(catalog_route::<T>))
        .route("/mask", web::post().to(mask_route::<T>))
        .route("/geometries", web::get().to(geometries_route::<T>))
        .route("/config", web::get().to(config_route::<T>))
        .route("/metrics", web::get().to(metrics_route));
}

/// Read the presets file, or serve `{}` when none is configured.
pub(crate) fn load_geometries(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(json!({}));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometries file {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Geometries file {} is not valid JSON", path.display()))?;
    if !value.is_object() {
        bail!("Geometries file {} must hold a JSON object", path.display());
    }
    let presets = GeometryPresets::from_value(value.clone())?;
    info!(
        presets = presets.names().count(),
        path = %path.display(),
        "loaded geometry presets"
    );
    Ok(value)
}

fn relayed_response(relayed: Relayed) -> HttpResponse {
    let status = StatusCode::from_u16(relayed.status).unwrap_or(StatusCode::BAD_GATEWAY);
    HttpResponse::build(status).json(relayed.body)
}

/// Fetch `catalogUrl` on behalf of the browser.
async fn catalog_route<T: JsonTransport + 'static>(
    state: web::Data<ProxyState<T>>,
    body: web::Json<CatalogBody>,
) -> HttpResponse {
    let relayed = relay(
        &state.transport,
        "catalog",
        body.catalog_url.as_deref(),
        Upstream::Get,
    )
    .await;
    relayed_response(relayed)
}

/// POST `payload` to `maskUrl` on behalf of the browser.
async fn mask_route<T: JsonTransport + 'static>(
    state: web::Data<ProxyState<T>>,
    body: web::Json<MaskBody>,
) -> HttpResponse {
    let MaskBody { mask_url, payload } = body.into_inner();
    let payload = payload.unwrap_or_else(|| json!({}));
    let relayed = relay(
        &state.transport,
        "mask",
        mask_url.as_deref(),
        Upstream::Post(payload),
    )
    .await;
    relayed_response(relayed)
}

async fn geometries_route<T: JsonTransport + 'static>(
    state: web::Data<ProxyState<T>>,
) -> HttpResponse {
    metrics::counter!("snorkel_proxy_requests_total", "route" => "geometries").increment(1);
    HttpResponse::Ok().json(&state.geometries)
}

async fn config_route<T: JsonTransport + 'static>(
    state: web::Data<ProxyState<T>>,
) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "default_host": state.default_host,
        "api_key": state.api_key,
    }))
}

/// Prometheus text exposition of the proxy counters.
async fn metrics_route() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().body("metrics recorder not installed"),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test as actix_test;
    use snorkel_core::{JsonReply, TransportError};

    use super::*;
    use crate::proxy::testing::StubTransport;

    fn state(transport: StubTransport) -> web::Data<ProxyState<StubTransport>> {
        web::Data::new(ProxyState {
            transport,
            default_host: "http://mask.example".into(),
            api_key: "key-123".into(),
            geometries: json!({"farm": {"type": "Point", "coordinates": [178.0, -38.6]}}),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            actix_test::init_service(
                App::new()
                    .app_data($state.clone())
                    .configure(routes::<StubTransport>),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn catalog_is_relayed() {
        let catalog = json!({"ndvi": {"versions": ["2019", "2020"]}});
        let state = state(
            StubTransport::default().with("http://up/v2/catalog", Ok(JsonReply::ok(catalog.clone()))),
        );
        let app = app!(state);

        let req = actix_test::TestRequest::post()
            .uri("/catalog")
            .set_json(json!({"catalogUrl": "http://up/v2/catalog"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body, catalog);
    }

    #[actix_web::test]
    async fn catalog_without_url_is_empty() {
        let state = state(StubTransport::default());
        let app = app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/catalog")
            .set_json(json!({}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({}));
    }

    #[actix_web::test]
    async fn upstream_error_maps_to_error_body() {
        let state = state(StubTransport::default().with(
            "http://up/v2/ndvi/mask",
            Ok(JsonReply::new(
                404,
                "Not Found",
                Some(json!({"message": "layer not found"})),
            )),
        ));
        let app = app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/mask")
            .set_json(json!({
                "maskUrl": "http://up/v2/ndvi/mask",
                "payload": {"version": "2020"},
            }))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body, json!({"error": "Server returned an error: 404"}));
    }

    #[actix_web::test]
    async fn mask_payload_is_forwarded() {
        let state = state(StubTransport::default().with(
            "http://up/mask",
            Ok(JsonReply::ok(json!({"image": "data:,", "bounds": [0, 0, 1, 1]}))),
        ));
        let app = app!(state);
        let payload = json!({
            "raster": "ndvi",
            "version": "2020",
            "geometry": {"type": "Point", "coordinates": [1, 2]},
        });
        let req = actix_test::TestRequest::post()
            .uri("/mask")
            .set_json(json!({"maskUrl": "http://up/mask", "payload": payload}))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["bounds"], json!([0, 0, 1, 1]));
        assert_eq!(
            state.transport.posted(),
            vec![("http://up/mask".to_string(), payload)]
        );
    }

    #[actix_web::test]
    async fn unreachable_upstream_is_bad_gateway() {
        let state = state(StubTransport::default().with(
            "http://down/mask",
            Err(TransportError::Timeout {
                url: "http://down/mask".into(),
            }),
        ));
        let app = app!(state);
        let req = actix_test::TestRequest::post()
            .uri("/mask")
            .set_json(json!({"maskUrl": "http://down/mask"}))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = actix_test::read_body_json(resp).await;
        assert_eq!(body["error"], "request to http://down/mask timed out");
    }

    #[actix_web::test]
    async fn config_and_geometries_are_served() {
        let state = state(StubTransport::default());
        let app = app!(state);

        let req = actix_test::TestRequest::get().uri("/config").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            json!({"default_host": "http://mask.example", "api_key": "key-123"})
        );

        let req = actix_test::TestRequest::get().uri("/geometries").to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["farm"]["type"], "Point");
    }

    #[test]
    fn missing_geometries_file_is_an_error() {
        assert_eq!(load_geometries(None).unwrap(), json!({}));
        assert!(load_geometries(Some(Path::new("/nonexistent/geometries.json"))).is_err());
    }
}
