//! Helper utilities.

use std::sync::Once;
use std::time::SystemTime;

use ludo_league::availability::MinuteOfDay;
use secrecy::SecretString;
use web_sys::console;
use worker::{console_error, console_log, Env, Result};

/// Initialize [`log`] logging into Cloudflare's [`console`] logging system, if not already
/// initialized.
pub fn init_logging() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        {
            fn hook(info: &std::panic::PanicInfo) {
                console_error!("{}", info);
            }
            std::panic::set_hook(Box::new(hook));
            console_log!("[panic hook set]");
        }
        {
            struct ConsoleLog;
            static LOG: ConsoleLog = ConsoleLog;
            impl log::Log for ConsoleLog {
                fn enabled(&self, metadata: &log::Metadata) -> bool {
                    metadata.level() <= log::max_level()
                }

                fn log(&self, record: &log::Record) {
                    if !self.enabled(record.metadata()) {
                        return;
                    }
                    let method = match record.level() {
                        log::Level::Error => console::error_1,
                        log::Level::Warn => console::warn_1,
                        log::Level::Info => console::info_1,
                        log::Level::Debug => console::debug_1,
                        log::Level::Trace => console::trace_1,
                    };
                    (method)(
                        &format!(
                            "[{} {}] {}",
                            record.level(),
                            record.module_path().unwrap_or("?"),
                            record.args()
                        )
                        .into(),
                    );
                }

                fn flush(&self) {}
            }
            if log::set_logger(&LOG).is_err() {
                console_error!("[logger already set]");
                return;
            }
            log::set_max_level(if cfg!(debug_assertions) {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            });

            log::info!("logger set");
        }
    });
}

/// Current time as a [`std::time::SystemTime`]. `std`'s own `now()` panics on wasm.
pub fn now() -> SystemTime {
    #[cfg(all(target_family = "wasm", target_os = "unknown"))]
    {
        use web_time::web::SystemTimeExt;
        web_time::SystemTime::now().to_std()
    }
    #[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
    {
        web_time::SystemTime::now()
    }
}

/// Current local minute of the day.
pub fn local_minute_of_day(now: SystemTime, utc_offset_minutes: i32) -> MinuteOfDay {
    let unix_millis = now
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64);
    MinuteOfDay::from_unix_millis(unix_millis, utc_offset_minutes)
}

/// Get an env var.
pub fn envvar(env: &Env, name: &str) -> Result<String> {
    env.var(name).map(|v| v.to_string())
}
/// Get an env secret.
pub fn secret(env: &Env, name: &str) -> Result<SecretString> {
    env.secret(name).map(|v| v.to_string().into())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_local_minute_of_day() {
        // 2026-10-19T17:00:00Z, 22:30 in IST.
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_792_429_200);
        assert_eq!("17:00", local_minute_of_day(now, 0).to_string());
        assert_eq!("22:30", local_minute_of_day(now, 330).to_string());
    }
}
