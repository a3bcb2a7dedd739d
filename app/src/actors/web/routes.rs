//! REST endpoint handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use tokio::sync::broadcast;

use super::WebState;
use crate::state::config::{PlayermapConfig, generate_id};
use playermap::{
    ConfigAction, ConfigCommand, DeviceInfo, ErrorResponse, LocationApiError, LocationResponse,
    LocationUpdate, NearbyParams, NearbyResponse, PlayermapEvent, PostSettingsResponse,
    PresenceEvent, StatusResponse, UserLocationRecord,
};

/// A location API error rendered as status + `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError(pub LocationApiError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

impl From<LocationApiError> for ApiError {
    fn from(e: LocationApiError) -> Self {
        Self(e)
    }
}

/// GET / -- shown when no UI bundle is being served.
pub async fn get_index() -> Html<&'static str> {
    Html(
        "<!doctype html><title>playermap</title>\
         <p>playermap API is running. Start with <code>--ui-dir</code> \
         pointing at a built web UI to serve the map here.</p>",
    )
}

/// GET /api/status
pub async fn get_status(State(state): State<Arc<WebState>>) -> Json<StatusResponse> {
    let actors = state.actors.read().await.clone();
    let (locations, online) = state.root.locations.counts();
    Json(StatusResponse {
        actors,
        locations,
        online,
    })
}

// ---------------------------------------------------------------------------
// Location API
// ---------------------------------------------------------------------------

fn device_info(headers: &HeaderMap) -> DeviceInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    DeviceInfo {
        user_agent: header_str(header::USER_AGENT.as_str()),
        platform: header_str("sec-ch-ua-platform"),
    }
}

/// POST /api/location -- upsert the caller's location.
///
/// The record is built here so it can be returned immediately; the store
/// write happens when `SystemActor` sees the `Recorded` event.
pub async fn post_location(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
    body: Result<Json<LocationUpdate>, JsonRejection>,
) -> Result<Json<LocationResponse>, ApiError> {
    let Json(update) = body.map_err(|e| {
        tracing::debug!("location: rejected body: {e}");
        LocationApiError::InvalidBody
    })?;
    let report = update.validate()?;

    let existing = state.root.locations.get(&report.user_id);
    let record = UserLocationRecord::merge(
        existing.as_ref(),
        report,
        Some(device_info(&headers)),
        Utc::now(),
    );
    tracing::debug!("location: '{}' reported {}", record.user_id, record.game);

    state.publish(PresenceEvent::Recorded {
        record: Box::new(record.clone()),
    });
    Ok(Json(LocationResponse {
        success: true,
        data: record,
    }))
}

/// GET /api/location?lat&lng&maxDistance&game&onlineOnly
pub async fn get_location(
    State(state): State<Arc<WebState>>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let query = params.parse()?;
    Ok(Json(NearbyResponse::new(state.root.locations.near(&query))))
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// GET /api/settings -- the full persisted config.
pub async fn get_settings(State(state): State<Arc<WebState>>) -> Json<PlayermapConfig> {
    Json(state.root.system.snapshot())
}

/// POST /api/settings -- replace the config via bus request-reply.
///
/// Emits a `ConfigCommand`, then waits for the `ConfigOutcome` carrying the
/// same `request_id`. `SystemActor` persists and reconciles actors.
pub async fn post_settings(
    State(state): State<Arc<WebState>>,
    Json(new_config): Json<PlayermapConfig>,
) -> Json<PostSettingsResponse> {
    let request_id = generate_id();
    let mut bus_rx = state.bus_tx.subscribe();

    state.publish(ConfigCommand {
        request_id: Some(request_id.clone()),
        action: ConfigAction::ReplaceAll {
            config: Box::new(new_config),
        },
    });

    let result = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match bus_rx.recv().await {
                Ok(msg) => {
                    if let PlayermapEvent::ConfigOutcome(r) = msg.event
                        && r.request_id == request_id
                    {
                        return Some(r);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    })
    .await;

    match result {
        Ok(Some(r)) => Json(PostSettingsResponse {
            restarted: r.restarted,
            stopped: r.stopped,
            started: r.started,
        }),
        _ => {
            tracing::warn!("config update: timed out waiting for ConfigOutcome");
            Json(PostSettingsResponse::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use playermap::{Coordinate, PlayermapMessage};

    use super::*;
    use crate::actors::system::apply_presence;
    use crate::actors::web::test_web_state;

    fn update_body(user_id: &str) -> LocationUpdate {
        LocationUpdate {
            user_id: Some(user_id.into()),
            username: Some("GameMaster".into()),
            game: Some("Apex Legends".into()),
            location: Some(Coordinate::new(40.7150, -74.0100)),
            is_online: None,
            level: Some(37),
            achievements: None,
        }
    }

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0 (X11)"));
        h.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Linux\""));
        h
    }

    fn next_presence(rx: &mut broadcast::Receiver<PlayermapMessage>) -> PresenceEvent {
        loop {
            let msg = rx.try_recv().unwrap();
            if let PlayermapEvent::Presence(event) = msg.event {
                assert_eq!(msg.source, "webserver.0");
                return event;
            }
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn post_location_records_and_publishes() {
        let (state, writer) = test_web_state();
        let mut rx = state.bus_tx.subscribe();

        let Json(resp) = post_location(
            State(Arc::clone(&state)),
            headers(),
            Ok(Json(update_body("u1"))),
        )
        .await
        .unwrap();
        assert!(resp.success);
        assert!(resp.data.is_online);
        assert_eq!(resp.data.level, 37);
        assert_eq!(resp.data.device_info.user_agent, "Mozilla/5.0 (X11)");
        assert_eq!(resp.data.device_info.platform, "\"Linux\"");

        let event = next_presence(&mut rx);
        assert!(matches!(&event, PresenceEvent::Recorded { record } if record.user_id == "u1"));
        apply_presence(&writer, &event);
        assert_eq!(state.root.locations.counts(), (1, 1));
    }

    #[tokio::test]
    async fn post_location_rejects_missing_fields() {
        let (state, _writer) = test_web_state();
        let mut body = update_body("u1");
        body.location = None;
        let err = post_location(State(state), headers(), Ok(Json(body)))
            .await
            .unwrap_err();
        assert_eq!(err.0, LocationApiError::MissingFields);

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "error": "Missing required fields" })
        );
    }

    #[tokio::test]
    async fn get_location_requires_coordinates() {
        let (state, _writer) = test_web_state();
        let params = NearbyParams {
            lng: Some("-74.0".into()),
            ..Default::default()
        };
        let err = get_location(State(state), Query(params)).await.unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({ "error": "Latitude and longitude are required" })
        );
    }

    #[tokio::test]
    async fn get_location_returns_nearby_records() {
        let (state, writer) = test_web_state();
        let mut rx = state.bus_tx.subscribe();
        for id in ["u1", "u2"] {
            post_location(State(Arc::clone(&state)), headers(), Ok(Json(update_body(id))))
                .await
                .unwrap();
            apply_presence(&writer, &next_presence(&mut rx));
        }

        let params = NearbyParams {
            lat: Some("40.7128".into()),
            lng: Some("-74.0060".into()),
            max_distance: Some("5".into()),
            game: Some("all".into()),
            online_only: Some("true".into()),
        };
        let Json(resp) = get_location(State(Arc::clone(&state)), Query(params.clone()))
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(resp.count, 2);
        assert!(resp.data[0].last_seen >= resp.data[1].last_seen);

        let far = NearbyParams {
            lat: Some("51.5074".into()),
            lng: Some("-0.1278".into()),
            ..params
        };
        let Json(resp) = get_location(State(state), Query(far)).await.unwrap();
        assert_eq!(resp.count, 0);
    }

    #[tokio::test]
    async fn status_reports_store_counts() {
        let (state, writer) = test_web_state();
        let mut rx = state.bus_tx.subscribe();
        post_location(State(Arc::clone(&state)), headers(), Ok(Json(update_body("u1"))))
            .await
            .unwrap();
        apply_presence(&writer, &next_presence(&mut rx));

        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.locations, 1);
        assert_eq!(status.online, 1);
        assert!(status.actors.contains_key("webserver.0"));
    }
}
