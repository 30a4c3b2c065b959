#![allow(dead_code)]

use httpmock::prelude::*;
use leadcheck::AppConfig;
use serde_json::json;

/// Configuration pointing both services at the mock server, without pacing.
pub fn config_for(server: &MockServer, upload_dir: &str, static_dir: Option<&str>) -> AppConfig {
    let static_line = static_dir
        .map(|dir| format!("static_dir = '{}'", dir))
        .unwrap_or_default();

    let content = format!(
        r#"
[server]
upload_dir = '{upload_dir}'
{static_line}

[jornaya]
endpoint = '{jornaya}'
lac = "TEST-LAC"
timeout_seconds = 5

[trustedform]
endpoint = '{trustedform}'
username = "ops@example.com"
password = "secret"
timeout_seconds = 5

[pacing]
delay_ms = 0
"#,
        jornaya = server.url("/Authenticate"),
        trustedform = server.base_url(),
    );

    AppConfig::from_toml_str(&content).unwrap()
}

/// Registers a LeadID answer for `token` (`authentic` 1 or 0).
pub fn mock_jornaya<'a>(server: &'a MockServer, token: &str, authentic: u8) -> httpmock::Mock<'a> {
    let token = token.to_string();
    server.mock(move |when, then| {
        when.method(GET)
            .path("/Authenticate")
            .query_param("lac", "TEST-LAC")
            .query_param("id", token.as_str());
        then.status(200).json_body(json!({
            "authenticate": {"authentic": authentic, "token": token},
            "transid": format!("trans-{}", token)
        }));
    })
}
