use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use relay_api::{now_ms, ErrorBody, IngestAck, IngestRequest, RecordMeta, SnapshotResponse};
use relay_engine::{is_fresh, FRESH_THRESHOLD_MINUTES};

use super::AppState;

const MISSING_FIELDS: &str = "Missing required fields: record_type and payload are required";

// ═══════════════════════════════════════════════════════════════
//  ApiError
// ═══════════════════════════════════════════════════════════════

/// Ошибки boundary. Все восстанавливаются здесь, ни одна не
/// уходит за границу запроса.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    /// Невалидное тело ingest → 400. Запрос всё равно учтён.
    #[error("{0}")]
    Validation(String),

    /// Неподдерживаемый verb → 405.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Любой неожиданный сбой → 500. В wire уходит generic
    /// сообщение, деталь — только в лог.
    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(msg) => {
                tracing::warn!(error = %msg, "rejected ingest");
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Verb state machine: OPTIONS / POST / GET / 405
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_simulation_data(
    State(state): State<AppState>,
    method: axum::http::Method,
    body: Bytes,
) -> Response {
    // Ровно один инкремент на вызов, до любого ветвления.
    state.relay.record_request().await;

    let result = match method.as_str() {
        // CORS preflight: пустой 200.
        "OPTIONS" => Ok(StatusCode::OK.into_response()),
        "POST" => handle_ingest(&state, &body).await,
        "GET" => handle_snapshot(&state).await,
        _ => Err(ApiError::MethodNotAllowed),
    };

    let response = result.unwrap_or_else(IntoResponse::into_response);
    apply_cors(response)
}

// ═══════════════════════════════════════════════════════════════
//  Ingest path (POST)
// ═══════════════════════════════════════════════════════════════

async fn handle_ingest(state: &AppState, body: &Bytes) -> Result<Response, ApiError> {
    let req: IngestRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("request body is not valid JSON: {e}")))?;

    let record_type = match req.record_type.as_deref() {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Err(ApiError::Validation(MISSING_FIELDS.into())),
    };
    // Явный null трактуется как отсутствие payload; прочие falsy
    // JSON-значения (0, "", false) — валидный payload.
    let payload = match req.payload {
        Some(p) if !p.is_null() => p,
        _ => return Err(ApiError::Validation(MISSING_FIELDS.into())),
    };

    let meta = RecordMeta {
        sim_timestamp: req.sim_timestamp,
        real_timestamp: req.real_timestamp,
    };
    let record = state.relay.ingest(&record_type, payload, meta).await;
    tracing::info!(record_type = %record.record_type, "received record");

    let ack = IngestAck {
        success: true,
        message: format!("{} data received", record.record_type),
        timestamp: now_ms(),
    };
    let value = serde_json::to_value(&ack).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(value).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  Read path (GET)
// ═══════════════════════════════════════════════════════════════

async fn handle_snapshot(state: &AppState) -> Result<Response, ApiError> {
    let snap = state.relay.snapshot().await;
    let now = now_ms();

    // Один `now` на все вердикты.
    let data_freshness = snap
        .data
        .iter()
        .map(|(t, record)| (t.clone(), is_fresh(record.as_ref(), now, FRESH_THRESHOLD_MINUTES)))
        .collect();

    let response = SnapshotResponse {
        success: true,
        data: snap.data,
        connection_stats: snap.stats,
        data_freshness,
        last_updated: now,
    };
    let value = serde_json::to_value(&response).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(value).into_response())
}

// ═══════════════════════════════════════════════════════════════
//  CORS
// ═══════════════════════════════════════════════════════════════

/// Permissive CORS на каждом ответе, успешном и ошибочном:
/// API должен быть вызываем с любого origin.
fn apply_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use axum::Router;
    use tower::ServiceExt;

    use relay_engine::Relay;

    const URI: &str = "/api/simulation-data";

    fn app() -> Router {
        crate::router(Arc::new(Relay::new()))
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(URI)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get() -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(URI)
            .body(Body::empty())
            .unwrap()
    }

    fn verb(method: Method) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(URI)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn assert_cors(response: &Response) {
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN.as_str()], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS.as_str()],
            "GET, POST, OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS.as_str()],
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn options_is_empty_200_with_cors() {
        let response = app().oneshot(verb(Method::OPTIONS)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_cors(&response);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn post_then_get_round_trip() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post(
                r#"{"record_type": "weather_data", "payload": {"temperature_c": 10}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_cors(&response);
        let ack = body_json(response).await;
        assert_eq!(ack["success"], true);
        assert_eq!(ack["message"], "weather_data data received");

        let response = app.oneshot(get()).await.unwrap();
        assert_eq!(response.status(), 200);
        let snap = body_json(response).await;
        assert_eq!(snap["success"], true);
        assert_eq!(snap["data"]["weather_data"]["payload"]["temperature_c"], 10);
        assert_eq!(snap["data_freshness"]["weather_data"], true);
        assert_eq!(snap["connection_stats"]["total_requests"], 2);
        assert_eq!(snap["connection_stats"]["successful_posts"], 1);
    }

    #[tokio::test]
    async fn get_before_any_post() {
        let response = app().oneshot(get()).await.unwrap();
        assert_eq!(response.status(), 200);
        let snap = body_json(response).await;

        for t in relay_api::KNOWN_RECORD_TYPES {
            assert!(snap["data"][t].is_null(), "{t} must be absent");
            assert_eq!(snap["data_freshness"][t], false);
        }
        assert_eq!(snap["connection_stats"]["successful_posts"], 0);
        assert!(snap["connection_stats"]["last_foundry_connection"].is_null());
    }

    #[tokio::test]
    async fn post_missing_payload_is_400_and_changes_nothing() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post(r#"{"record_type": "weather_data"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert_cors(&response);
        let err = body_json(response).await;
        assert_eq!(
            err["error"],
            "Missing required fields: record_type and payload are required"
        );

        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert!(snap["data"]["weather_data"].is_null());
        assert_eq!(snap["connection_stats"]["successful_posts"], 0);
        // Отклонённый POST всё равно учтён.
        assert_eq!(snap["connection_stats"]["total_requests"], 2);
    }

    #[tokio::test]
    async fn post_missing_record_type_is_400() {
        let response = app()
            .oneshot(post(r#"{"payload": {"x": 1}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn post_empty_record_type_is_400() {
        let response = app()
            .oneshot(post(r#"{"record_type": "", "payload": 1}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn post_null_payload_is_400() {
        let response = app()
            .oneshot(post(r#"{"record_type": "weather_data", "payload": null}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn post_falsy_but_defined_payload_is_accepted() {
        let response = app()
            .oneshot(post(r#"{"record_type": "system_status", "payload": 0}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn post_malformed_json_is_400() {
        let response = app().oneshot(post("{not json")).await.unwrap();
        assert_eq!(response.status(), 400);
        assert_cors(&response);
    }

    #[tokio::test]
    async fn unknown_record_type_is_stored() {
        let app = app();
        let response = app
            .clone()
            .oneshot(post(r#"{"record_type": "pigeon_census", "payload": {"count": 7}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert_eq!(snap["data"]["pigeon_census"]["payload"]["count"], 7);
        assert_eq!(snap["data_freshness"]["pigeon_census"], true);
    }

    #[tokio::test]
    async fn unsupported_verb_is_405_and_counted() {
        let app = app();

        let response = app.clone().oneshot(verb(Method::DELETE)).await.unwrap();
        assert_eq!(response.status(), 405);
        assert_cors(&response);
        let err = body_json(response).await;
        assert_eq!(err["error"], "Method not allowed");

        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert_eq!(snap["connection_stats"]["total_requests"], 2);
    }

    #[tokio::test]
    async fn every_verb_bumps_total_requests() {
        let app = app();
        for method in [Method::OPTIONS, Method::DELETE, Method::PUT, Method::GET] {
            app.clone().oneshot(verb(method)).await.unwrap();
        }
        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert_eq!(snap["connection_stats"]["total_requests"], 5);
    }

    #[tokio::test]
    async fn second_post_supersedes_first() {
        let app = app();
        for temp in [10, 12] {
            let body = format!(
                r#"{{"record_type": "weather_data", "payload": {{"temperature_c": {temp}}}}}"#
            );
            app.clone().oneshot(post(&body)).await.unwrap();
        }
        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert_eq!(snap["data"]["weather_data"]["payload"]["temperature_c"], 12);
        assert_eq!(snap["connection_stats"]["successful_posts"], 2);
    }

    #[tokio::test]
    async fn meta_timestamps_are_passed_through() {
        let app = app();
        app.clone()
            .oneshot(post(
                r#"{"record_type": "events_data", "payload": [], "sim_timestamp": "day 3 14:00"}"#,
            ))
            .await
            .unwrap();
        let snap = body_json(app.oneshot(get()).await.unwrap()).await;
        assert_eq!(snap["data"]["events_data"]["sim_timestamp"], "day 3 14:00");
        assert!(snap["data"]["events_data"]["received_at"].is_i64());
    }
}
