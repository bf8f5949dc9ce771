//! Application state, read from the worker environment once per isolate.

use std::sync::OnceLock;

use hmac::Mac;
use ll_macro::FromRefStatic;
use secrecy::ExposeSecret;
use url::Url;
use worker::{Env, Error, Result};

use crate::auth::JwtKey;
use crate::db::D1Store;
use crate::util::{envvar, secret};
use crate::webjob::WebjobConfig;

/// D1 binding name.
pub const BINDING_D1_DB: &str = "BINDING_D1_DB";
/// Webjob queue binding name.
pub const BINDING_QUEUE_WEBJOB: &str = "BINDING_QUEUE_WEBJOB";

/// `AppState`. Static reference to [`AppStateOwned`] to avoid cloning in Axum.
pub type AppState = &'static AppStateOwned;
/// State for the application, used as the Axum router state.
#[derive(FromRefStatic)]
pub struct AppStateOwned {
    /// Database.
    pub db: D1Store,
    /// HMAC for signing and verifying ID tokens.
    pub jwt_key: JwtKey,
    /// Origin of the static site, allowed by CORS.
    pub pages_origin: PagesOrigin,
    /// Timezone for availability windows.
    pub local_time: LocalTime,
    /// See [`crate::webjob::Task::RetentionCleanup`].
    pub webjob_config: WebjobConfig,
}

/// Get the AppState, initializing it if needed.
pub fn get_appstate(env: &Env) -> Result<AppState> {
    static ONCE: OnceLock<AppStateOwned> = OnceLock::new();
    if let Some(state) = ONCE.get() {
        return Ok(state);
    }
    let state = create_appstate(env)?;
    Ok(ONCE.get_or_init(|| state))
}

fn create_appstate(env: &Env) -> Result<AppStateOwned> {
    let db = D1Store(env.d1(BINDING_D1_DB)?);
    let jwt_key = {
        let secret = secret(env, "HMAC_SECRET")?;
        let secret = base64::decode_config(secret.expose_secret(), base64::URL_SAFE_NO_PAD)
            .map_err(|e| format!("Failed to decode `HMAC_SECRET`: {}", e))?;
        if secret.len() < 32 {
            return Result::Err(Error::RustError(format!(
                "`HMAC_SECRET` is too short, len: {}",
                secret.len(),
            )));
        }
        JwtKey::new_from_slice(&secret).map_err(|e| format!("Failed to create hmac: {}", e))?
    };
    let pages_origin = PagesOrigin(
        Url::parse(&envvar(env, "PAGES_ORIGIN")?)
            .map_err(|e| format!("Invalid url in `PAGES_ORIGIN`: {}", e))?,
    );
    let local_time = LocalTime {
        utc_offset_minutes: parse_var(env, "LOCAL_UTC_OFFSET_MINUTES")?,
    };
    if local_time.utc_offset_minutes.abs() >= 24 * 60 {
        return Result::Err(Error::RustError(format!(
            "`LOCAL_UTC_OFFSET_MINUTES` out of range: {}",
            local_time.utc_offset_minutes,
        )));
    }
    let webjob_config = WebjobConfig {
        retention_months: parse_var(env, "RETENTION_MONTHS")?,
    };
    log::info!(
        "App state initialized: origin {}, {:?}, {:?}.",
        pages_origin.0,
        local_time,
        webjob_config
    );
    Ok(AppStateOwned {
        db,
        jwt_key,
        pages_origin,
        local_time,
        webjob_config,
    })
}

fn parse_var<T>(env: &Env, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    envvar(env, name)?.trim().parse().map_err(|e| {
        Error::RustError(format!(
            "Env var `{}` should be an integer string: {}",
            name, e
        ))
    })
}

/// Wraper to distinguish Axum states.
pub struct PagesOrigin(pub Url);

/// Local timezone, as a fixed offset from UTC.
#[derive(Clone, Copy, Debug)]
pub struct LocalTime {
    /// E.g. `330` for IST.
    pub utc_offset_minutes: i32,
}
