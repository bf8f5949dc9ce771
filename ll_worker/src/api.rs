//! Request handling behind each `/api` route, independent of axum extraction.

use std::time::SystemTime;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use http::StatusCode;
use ludo_league::availability::{Availability, Gate, MaintenanceSettings, MinuteOfDay};
use ludo_league::retention::{self, CleanupReport, RetentionError};
use ludo_league::role;
use ludo_league::store::Store;
use ludo_league::wallet;

use crate::auth::{self, JwtKey};
use crate::error::ApiError;

/// `POST /api/set-claim` body.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetClaimRequest {
    /// Target user.
    pub uid: Option<String>,
    /// `superadmin`, `deposit_admin`, `match_admin` or `user`.
    pub new_role: Option<String>,
}

/// `POST /api/make-admin` body.
#[derive(Debug, Default, serde::Deserialize)]
pub struct MakeAdminRequest {
    /// Target user.
    pub uid: Option<String>,
    /// Target user's email, as a sanity check.
    pub email: Option<String>,
}

/// `POST /api/cleanup` body.
#[derive(Debug, Default, serde::Deserialize)]
pub struct CleanupRequest {
    /// Age threshold.
    pub months: Option<u32>,
}

/// Generic success body.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// `GET /api/availability` body.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub struct AvailabilityResponse {
    /// [`Gate::App`].
    pub app: Availability,
    /// [`Gate::Matches`].
    pub matches: Availability,
}

/// `GET /api/settings` body.
#[derive(Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    /// UPI ID for deposits.
    pub active_upi_id: Option<String>,
    /// Referral commission percentage.
    pub commission_percentage: Option<f64>,
}

/// `POST /api/cleanup` body.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum CleanupResponse {
    /// Job ran to completion.
    Success {
        /// Always `true`.
        success: bool,
        /// Counts.
        #[serde(flatten)]
        report: CleanupReport,
    },
    /// Job failed part way.
    Failure {
        /// Always `false`.
        success: bool,
        /// Store failure message.
        message: String,
    },
}

/// `POST /api/token/refresh` body.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Fresh ID token.
    pub id_token: String,
}

/// `GET /api/wallet` body.
#[derive(Debug, PartialEq, Eq, serde::Serialize)]
pub struct WalletResponse {
    /// Derived from completed transactions.
    pub balance: i64,
}

/// JSON request body as extracted by axum. Rejections are reported by the route itself, after the
/// bearer token is checked, instead of as axum's plain-text 415/422.
pub type JsonBody<T> = Result<Json<T>, JsonRejection>;

/// Unwraps a [`JsonBody`], mapping rejections to [`ApiError::BadRequest`].
pub fn json_body<T>(body: JsonBody<T>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(ApiError::from)
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing required field `{}`.", name)))
}

/// `POST /api/set-claim`
pub async fn set_claim<S: Store>(
    store: &S,
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
    request: Result<SetClaimRequest, ApiError>,
) -> Result<MessageResponse, ApiError> {
    let caller = auth::authenticate(key, now, bearer)?;
    let request = request?;
    let uid = required(request.uid, "uid")?;
    let new_role = required(request.new_role, "newRole")?;

    let role = role::assign_role(store, &caller.claims, &uid, &new_role).await?;
    Ok(MessageResponse {
        message: format!("Role `{}` assigned to user `{}`.", role, uid),
    })
}

/// `POST /api/make-admin`
pub async fn make_admin<S: Store>(
    store: &S,
    request: Result<MakeAdminRequest, ApiError>,
) -> Result<MessageResponse, ApiError> {
    let request = request?;
    let uid = required(request.uid, "uid")?;
    let email = required(request.email, "email")?;

    role::make_admin(store, &uid, &email).await?;
    Ok(MessageResponse {
        message: format!("User `{}` is now a superadmin.", uid),
    })
}

/// `GET /api/availability`
pub async fn availability<S: Store>(
    store: &S,
    now: MinuteOfDay,
) -> Result<AvailabilityResponse, ApiError> {
    let settings = store.maintenance_settings().await?;
    Ok(AvailabilityResponse {
        app: settings.check(Gate::App, now),
        matches: settings.check(Gate::Matches, now),
    })
}

/// `GET /api/settings`
pub async fn settings<S: Store>(store: &S) -> Result<SettingsResponse, ApiError> {
    let upi = store.upi_configuration().await?.unwrap_or_default();
    let referral = store.referral_configuration().await?.unwrap_or_default();
    Ok(SettingsResponse {
        active_upi_id: upi.active_upi_id,
        commission_percentage: referral.commission_percentage,
    })
}

/// `PUT /api/settings/maintenance`
pub async fn put_maintenance<S: Store>(
    store: &S,
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
    settings: Result<MaintenanceSettings, ApiError>,
) -> Result<MessageResponse, ApiError> {
    let caller = auth::authenticate(key, now, bearer)?;
    caller.require_superadmin()?;
    let settings = settings?;

    let windows = [
        (settings.app_start_time.as_deref(), "appStartTime"),
        (settings.app_end_time.as_deref(), "appEndTime"),
        (settings.match_start_time.as_deref(), "matchStartTime"),
        (settings.match_end_time.as_deref(), "matchEndTime"),
    ];
    for (time, field) in windows {
        if let Some(time) = time.filter(|t| MinuteOfDay::parse(t).is_none()) {
            return Err(ApiError::BadRequest(format!(
                "`{}` must be a 24-hour \"HH:MM\" time, got {:?}.",
                field, time
            )));
        }
    }

    store.put_maintenance_settings(&settings).await?;
    log::info!("Maintenance settings updated by `{}`.", caller.uid);
    Ok(MessageResponse {
        message: "Maintenance settings saved.".to_owned(),
    })
}

/// `POST /api/cleanup`
///
/// Store failures are reported as a [`CleanupResponse::Failure`] body with a 500 status.
pub async fn cleanup<S: Store>(
    store: &S,
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
    request: Result<CleanupRequest, ApiError>,
) -> Result<(StatusCode, CleanupResponse), ApiError> {
    let caller = auth::authenticate(key, now, bearer)?;
    caller.require_superadmin()?;
    let months = request?
        .months
        .ok_or_else(|| ApiError::BadRequest("Missing required field `months`.".to_owned()))?;

    log::info!("Cleanup of {} months requested by `{}`.", months, caller.uid);
    match retention::run(store, now, months).await {
        Ok(report) => Ok((
            StatusCode::OK,
            CleanupResponse::Success {
                success: true,
                report,
            },
        )),
        Err(RetentionError::Store(e)) => {
            log::error!("Cleanup failed: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                CleanupResponse::Failure {
                    success: false,
                    message: e.to_string(),
                },
            ))
        }
        Err(e @ RetentionError::InvalidMonths(_)) => Err(e.into()),
    }
}

/// `POST /api/token/refresh`
pub async fn refresh_token<S: Store>(
    store: &S,
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
) -> Result<TokenResponse, ApiError> {
    let caller = auth::authenticate(key, now, bearer)?;
    let user = store
        .user(&caller.uid)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user `{}`.", caller.uid)))?;
    let id_token = auth::create_id_token(key, now, &user.uid, user.custom_claims)?;
    Ok(TokenResponse { id_token })
}

/// `GET /api/wallet`
pub async fn wallet<S: Store>(
    store: &S,
    key: &JwtKey,
    now: SystemTime,
    bearer: Option<&str>,
) -> Result<WalletResponse, ApiError> {
    let caller = auth::authenticate(key, now, bearer)?;
    let transactions = store.transactions_for_user(&caller.uid).await?;
    Ok(WalletResponse {
        balance: wallet::derive_balance(&transactions),
    })
}
