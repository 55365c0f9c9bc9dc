use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// App metadata as stored by the backend. Only the columns the console
/// reads are typed; the rest pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "appId", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, alias = "publisherId", skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An AdMob publisher account known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(alias = "publisherId")]
    pub publisher_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_app_columns_survive_a_round_trip() {
        let raw = serde_json::json!({
            "id": "a1",
            "appId": "ca-app-pub-1~2",
            "platform": "ANDROID",
            "ecpm": 1.25
        });
        let app: AppInfo = serde_json::from_value(raw).unwrap();

        assert_eq!(app.app_id.as_deref(), Some("ca-app-pub-1~2"));
        assert_eq!(app.extra["ecpm"], 1.25);
        assert_eq!(serde_json::to_value(&app).unwrap()["ecpm"], 1.25);
    }
}
