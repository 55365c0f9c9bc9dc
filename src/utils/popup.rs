/// Page served to the account-linking popup once Google has redirected back.
/// It hands the linked identity to the window that opened it and closes.
use serde::Serialize;

pub const LINK_MESSAGE_TYPE: &str = "ADD_GOOGLE_ACCOUNT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPayload {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: LinkPayload,
    /// Echo of the nonce the opener passed to `/auth/google/login`, so it
    /// can drop messages from flows it did not start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl LinkMessage {
    pub fn new(name: impl Into<String>, email: impl Into<String>, nonce: Option<String>) -> Self {
        Self {
            kind: LINK_MESSAGE_TYPE,
            payload: LinkPayload {
                name: name.into(),
                email: email.into(),
            },
            nonce,
        }
    }
}

/// JSON that is safe to drop inside a `<script>` element.
fn script_json(message: &LinkMessage) -> String {
    let json = serde_json::to_string(message).unwrap_or_else(|_| "null".to_string());
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// The message only goes to an opener on our own origin; without an opener
/// the page just closes.
pub fn render_link_page(message: &LinkMessage, close_delay_ms: u64) -> String {
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Account linked</title></head>
<body>
<p>Account linked. This window will close shortly.</p>
<script>
(function () {{
  var message = {message};
  try {{
    if (window.opener && !window.opener.closed) {{
      window.opener.postMessage(message, window.location.origin);
    }}
  }} catch (e) {{}}
  setTimeout(function () {{ window.close(); }}, {delay});
}})();
</script>
</body>
</html>
"#,
        message = script_json(message),
        delay = close_delay_ms,
    )
}
