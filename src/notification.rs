//! Push notification payloads, as relayed to the native notification API.

/// Title used when a payload has none.
pub const DEFAULT_TITLE: &str = "Ludo League";
/// Icon shown on every notification.
pub const ICON: &str = "/logo.png";

/// Background push message.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushPayload {
    /// Display part of the message.
    #[serde(default)]
    pub notification: Option<PushNotification>,
}

/// `notification` field of a [`PushPayload`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PushNotification {
    /// Title.
    pub title: Option<String>,
    /// Body text.
    pub body: Option<String>,
}

/// Options passed to `showNotification`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct NotificationOptions {
    /// Title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Icon URL.
    pub icon: &'static str,
}
impl From<PushPayload> for NotificationOptions {
    fn from(payload: PushPayload) -> Self {
        let PushNotification { title, body } = payload.notification.unwrap_or_default();
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            body: body.unwrap_or_default(),
            icon: ICON,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_options() {
        let payload: PushPayload = serde_json::from_str(
            r#"{ "notification": { "title": "Deposit approved", "body": "₹500 added" } }"#,
        )
        .unwrap();
        assert_eq!(
            NotificationOptions {
                title: "Deposit approved".into(),
                body: "₹500 added".into(),
                icon: ICON,
            },
            payload.into()
        );
    }

    #[test]
    fn test_defaults() {
        let payload: PushPayload = serde_json::from_str(r#"{ "data": { "k": "v" } }"#).unwrap();
        let options = NotificationOptions::from(payload);
        assert_eq!(DEFAULT_TITLE, options.title);
        assert_eq!("", options.body);
    }
}
