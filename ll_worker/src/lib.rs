#![warn(missing_docs)]

//! Cloudflare worker.

use axum::extract::State;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use futures::future::join_all;
use http::{header, HeaderValue, Method, StatusCode};
use ll_macro::local_async;
use ludo_league::availability::MaintenanceSettings;
use ludo_league::notification::{NotificationOptions, PushPayload};
use tower::Service;
use tower_http::cors::CorsLayer;
use wasm_bindgen::prelude::wasm_bindgen;
use worker::{
    event, Context, Env, Error, HttpRequest, MessageBatch, MessageExt, Result, ScheduleContext,
    ScheduledEvent,
};

use crate::auth::JwtKey;
use crate::db::D1Store;
use crate::error::ApiError;
use crate::init::{AppState, LocalTime};

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod init;
pub mod local_future;
pub mod util;
pub mod webjob;

/// Optional `Authorization: Bearer ...` header.
pub type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

fn bearer_token(header: &BearerHeader) -> Option<&str> {
    header.as_ref().map(|TypedHeader(auth)| auth.token())
}

/// Cloudflare queue handler.
#[event(queue)]
pub async fn queue(
    message_batch: MessageBatch<webjob::Task>,
    env: Env,
    _ctx: Context,
) -> Result<()> {
    util::init_logging();
    let state = init::get_appstate(&env)?;

    let futures = message_batch.messages()?.into_iter().map(|msg| {
        log::info!("Handling webjob task: `{:?}`.", msg.body());
        webjob::handle(&state.db, msg)
    });
    let results = join_all(futures).await;
    let errors = results
        .into_iter()
        .filter_map(|result| result.map(|msg| msg.ack()).err())
        .collect::<Vec<_>>();

    log::info!("Handling webjob task complete. Errors: {:?}", errors);
    errors
        .is_empty()
        .then_some(())
        .ok_or(Error::RustError(format!("{:?}", errors)))
}

/// Cloudflare cron handler. Enqueues the periodic retention cleanup.
#[event(scheduled)]
pub async fn scheduled(event: ScheduledEvent, env: Env, _ctx: ScheduleContext) {
    util::init_logging();
    log::info!("Cron `{}` triggered.", event.cron());

    let result = async {
        let state = init::get_appstate(&env)?;
        let task = webjob::Task::RetentionCleanup {
            months: state.webjob_config.retention_months,
        };
        env.queue(init::BINDING_QUEUE_WEBJOB)?.send(&task).await?;
        log::info!("Enqueued webjob task: `{:?}`.", task);
        Result::Ok(())
    }
    .await;
    if let Err(e) = result {
        log::error!("Failed to enqueue retention cleanup: {}", e);
    }
}

/// Cloudflare fetch request handler.
#[event(fetch)]
pub async fn fetch(
    req: HttpRequest,
    env: Env,
    _ctx: Context,
) -> Result<axum::http::Response<axum::body::Body>> {
    util::init_logging();
    log::info!("{} {}", req.method(), req.uri().path());

    let state = init::get_appstate(&env)?;
    let mut router = router(state)?;
    router.call(req).await.map_err(|infallible| match infallible {})
}

/// All routes.
pub fn router(state: AppState) -> Result<Router> {
    let origin = state.pages_origin.0.origin().ascii_serialization();
    let cors = CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(&origin)
                .map_err(|e| format!("Invalid CORS origin `{}`: {}", origin, e))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/set-claim", post(set_claim_post))
        .route("/api/make-admin", post(make_admin_post))
        .route("/api/availability", get(availability_get))
        .route("/api/settings", get(settings_get))
        .route("/api/settings/maintenance", put(settings_maintenance_put))
        .route("/api/cleanup", post(cleanup_post))
        .route("/api/token/refresh", post(token_refresh_post))
        .route("/api/wallet", get(wallet_get))
        .layer(cors)
        .with_state(state))
}

/// `POST /api/set-claim`
#[local_async("POST /api/set-claim")]
pub async fn set_claim_post(
    State(db): State<&'static D1Store>,
    State(jwt_key): State<&'static JwtKey>,
    bearer: BearerHeader,
    body: api::JsonBody<api::SetClaimRequest>,
) -> std::result::Result<Json<api::MessageResponse>, ApiError> {
    let request = api::json_body(body);
    api::set_claim(db, jwt_key, util::now(), bearer_token(&bearer), request)
        .await
        .map(Json)
}

/// `POST /api/make-admin`
///
/// Needs no bearer token. 400 if `email` does not match the user's recorded email, 404 if the user
/// does not exist.
#[local_async("POST /api/make-admin")]
pub async fn make_admin_post(
    State(db): State<&'static D1Store>,
    body: api::JsonBody<api::MakeAdminRequest>,
) -> std::result::Result<Json<api::MessageResponse>, ApiError> {
    api::make_admin(db, api::json_body(body)).await.map(Json)
}

/// `GET /api/availability`
#[local_async("GET /api/availability")]
pub async fn availability_get(
    State(db): State<&'static D1Store>,
    State(local_time): State<&'static LocalTime>,
) -> std::result::Result<Json<api::AvailabilityResponse>, ApiError> {
    let now = util::local_minute_of_day(util::now(), local_time.utc_offset_minutes);
    api::availability(db, now).await.map(Json)
}

/// `GET /api/settings`
#[local_async("GET /api/settings")]
pub async fn settings_get(
    State(db): State<&'static D1Store>,
) -> std::result::Result<Json<api::SettingsResponse>, ApiError> {
    api::settings(db).await.map(Json)
}

/// `PUT /api/settings/maintenance`
#[local_async("PUT /api/settings/maintenance")]
pub async fn settings_maintenance_put(
    State(db): State<&'static D1Store>,
    State(jwt_key): State<&'static JwtKey>,
    bearer: BearerHeader,
    body: api::JsonBody<MaintenanceSettings>,
) -> std::result::Result<Json<api::MessageResponse>, ApiError> {
    let settings = api::json_body(body);
    api::put_maintenance(db, jwt_key, util::now(), bearer_token(&bearer), settings)
        .await
        .map(Json)
}

/// `POST /api/cleanup`
#[local_async("POST /api/cleanup")]
pub async fn cleanup_post(
    State(db): State<&'static D1Store>,
    State(jwt_key): State<&'static JwtKey>,
    bearer: BearerHeader,
    body: api::JsonBody<api::CleanupRequest>,
) -> std::result::Result<(StatusCode, Json<api::CleanupResponse>), ApiError> {
    let request = api::json_body(body);
    let (status, response) =
        api::cleanup(db, jwt_key, util::now(), bearer_token(&bearer), request).await?;
    Ok((status, Json(response)))
}

/// `POST /api/token/refresh`
#[local_async("POST /api/token/refresh")]
pub async fn token_refresh_post(
    State(db): State<&'static D1Store>,
    State(jwt_key): State<&'static JwtKey>,
    bearer: BearerHeader,
) -> std::result::Result<Json<api::TokenResponse>, ApiError> {
    api::refresh_token(db, jwt_key, util::now(), bearer_token(&bearer))
        .await
        .map(Json)
}

/// `GET /api/wallet`
#[local_async("GET /api/wallet")]
pub async fn wallet_get(
    State(db): State<&'static D1Store>,
    State(jwt_key): State<&'static JwtKey>,
    bearer: BearerHeader,
) -> std::result::Result<Json<api::WalletResponse>, ApiError> {
    api::wallet(db, jwt_key, util::now(), bearer_token(&bearer))
        .await
        .map(Json)
}

/// For the push service worker: maps a background message payload (JSON) to the options
/// (JSON) for `registration.showNotification`.
#[wasm_bindgen(js_name = pushNotificationOptions)]
pub fn push_notification_options(payload: &str) -> String {
    let payload = serde_json::from_str::<PushPayload>(payload).unwrap_or_else(|e| {
        log::warn!("Malformed push payload: {}", e);
        PushPayload::default()
    });
    serde_json::to_string(&NotificationOptions::from(payload)).unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_push_notification_options() {
        let options = push_notification_options(
            r#"{"notification":{"title":"Match joined","body":"Your opponent is ready."}}"#,
        );
        assert_eq!(
            serde_json::json!({
                "title": "Match joined",
                "body": "Your opponent is ready.",
                "icon": "/logo.png",
            }),
            serde_json::from_str::<serde_json::Value>(&options).unwrap()
        );

        let fallback: serde_json::Value =
            serde_json::from_str(&push_notification_options("not json")).unwrap();
        assert_eq!("Ludo League", fallback["title"]);
    }
}
