mod common;

use cm_spins::{
    collect_all, obtain_token, AccessToken, ChartmetricApi, ChartmetricClient, ChartmetricError,
    ClientConfig, Credential, RunConfig,
};
use common::{fast_pagination, Canned, ScriptedHttpClient};
use serde_json::json;
use std::time::Duration;

const BASE: &str = "https://api.test.invalid/api";

fn config() -> ClientConfig {
    ClientConfig::with_base_url(format!("{BASE}/"))
}

fn client(http: &ScriptedHttpClient) -> ChartmetricClient {
    ChartmetricClient::new(Box::new(http.clone()), config(), AccessToken::new("test-token"))
}

#[tokio::test]
async fn test_token_exchange() {
    let http = ScriptedHttpClient::new(vec![Canned::json(200, json!({"token": "abc123", "expires_in": 3600}))]);
    let credential = Credential::new("refresh-xyz").unwrap();

    let token = obtain_token(&http, &config(), &credential).await.unwrap();
    assert_eq!(token.as_str(), "abc123");

    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, format!("{BASE}/token"));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body, json!({"refreshtoken": "refresh-xyz"}));
}

#[tokio::test]
async fn test_env_base_url_with_trailing_slash() {
    let run_config = RunConfig::from_lookup(|key| match key {
        "CM_REFRESH_TOKEN" => Some("refresh-xyz".to_string()),
        "CM_API_BASE_URL" => Some(format!("{BASE}/")),
        _ => None,
    })
    .unwrap();

    let http = ScriptedHttpClient::new(vec![
        Canned::json(200, json!({"token": "abc123"})),
        Canned::json(200, json!({"obj": []})),
    ]);
    let client =
        ChartmetricClient::login(Box::new(http.clone()), run_config.client_config(), &run_config.credential)
            .await
            .unwrap();
    client.get_json("/track/list/filter", &[]).await.unwrap();

    let urls: Vec<String> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls[0], format!("{BASE}/token"));
    assert!(urls[1].starts_with(&format!("{BASE}/track/list/filter")));
}

#[tokio::test]
async fn test_token_exchange_failures_are_auth_errors() {
    let credential = Credential::new("refresh-xyz").unwrap();
    let cases = vec![
        Canned::json(401, json!({"error": "invalid refresh token"})),
        Canned::json(200, json!({"message": "no token here"})),
        Canned::json(200, json!({"token": ""})),
        Canned::text(200, "<html>maintenance</html>"),
        Canned::json(200, json!({"token": "late"})).delayed(Duration::from_millis(200)),
    ];

    for canned in cases {
        let http = ScriptedHttpClient::new(vec![canned.clone()]);
        let mut config = config();
        config.request_timeout = Duration::from_millis(50);

        let err = obtain_token(&http, &config, &credential).await.unwrap_err();
        assert!(matches!(err, ChartmetricError::Auth(_)), "{canned:?} gave {err:?}");
        assert!(err.is_fatal_setup());
        assert_eq!(http.requests().len(), 1);
    }
}

#[tokio::test]
async fn test_login_threads_token_into_requests() {
    let http = ScriptedHttpClient::new(vec![
        Canned::json(200, json!({"token": "fresh"})),
        Canned::json(200, json!({"obj": []})),
    ]);
    let credential = Credential::new("refresh-xyz").unwrap();

    let client = ChartmetricClient::login(Box::new(http.clone()), config(), &credential)
        .await
        .unwrap();
    client.get_json("/siriusxm/stations", &[]).await.unwrap();

    let requests = http.requests();
    assert_eq!(requests[1].authorization.as_deref(), Some("Bearer fresh"));
    assert_eq!(requests[1].url, format!("{BASE}/siriusxm/stations"));
}

#[tokio::test]
async fn test_get_json_sends_query_and_auth() {
    let http = ScriptedHttpClient::new(vec![Canned::json(200, json!({"obj": [{"id": 1}]}))]);
    let client = client(&http);

    let params = vec![
        ("artists[]".to_string(), "127473".to_string()),
        ("since".to_string(), "2020-01-01".to_string()),
    ];
    let body = client.get_json("/track/list/filter", &params).await.unwrap();
    assert_eq!(body["obj"][0]["id"], 1);

    let request = &http.requests()[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    assert!(request.url.starts_with(&format!("{BASE}/track/list/filter?")));
    assert!(request.url.contains("artists%5B%5D=127473"));
    assert!(request.url.contains("since=2020-01-01"));
}

#[tokio::test]
async fn test_status_mapping() {
    let http = ScriptedHttpClient::new(vec![
        Canned::text(429, "slow down").header("Retry-After", "7"),
        Canned::text(429, "slow down"),
        Canned::text(404, "Not Found"),
        Canned::text(200, "not json"),
    ]);
    let client = client(&http);

    match client.get_json("/a", &[]).await {
        Err(ChartmetricError::RateLimit { retry_after }) => {
            assert_eq!(retry_after, Duration::from_secs(7))
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    match client.get_json("/b", &[]).await {
        Err(ChartmetricError::RateLimit { retry_after }) => {
            assert_eq!(retry_after, cm_spins::client::DEFAULT_RETRY_AFTER)
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    match client.get_json("/c", &[]).await {
        Err(ChartmetricError::Remote { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Not Found");
        }
        other => panic!("expected remote error, got {other:?}"),
    }
    assert!(matches!(
        client.get_json("/d", &[]).await,
        Err(ChartmetricError::Parse(_))
    ));
}

#[tokio::test]
async fn test_request_timeout_is_http_error() {
    let http = ScriptedHttpClient::new(vec![
        Canned::json(200, json!({"obj": []})).delayed(Duration::from_millis(500)),
    ]);
    let mut config = config();
    config.request_timeout = Duration::from_millis(20);
    let client = ChartmetricClient::new(Box::new(http), config, AccessToken::new("t"));

    let err = client.get_json("/slow", &[]).await.unwrap_err();
    assert!(matches!(err, ChartmetricError::Http(ref msg) if msg.contains("timed out")));
}

#[test_log::test(tokio::test)]
async fn test_collect_all_over_http() {
    let page = |n: usize, start: usize| {
        let items: Vec<_> = (start..start + n)
            .map(|i| json!({"cm_track": i, "name": format!("T{i}"), "latest": {"siriusxm_streams": 2}}))
            .collect();
        json!({ "obj": items })
    };
    let http = ScriptedHttpClient::new(vec![
        Canned::json(200, page(100, 0)),
        Canned::text(429, "").header("Retry-After", "0"),
        Canned::json(200, json!({"obj": {"data": page(100, 100)["obj"].clone()}})),
        Canned::json(200, page(37, 200)),
    ]);
    let client = client(&http);

    let collection = collect_all(
        &client,
        "/track/list/filter",
        vec![("artists[]".to_string(), "127473".to_string())],
        fast_pagination(100),
    )
    .await;

    assert!(collection.is_complete());
    assert_eq!(collection.items.len(), 237);
    assert_eq!(collection.items[236].id(), "236");

    let urls: Vec<String> = http.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls.len(), 4);
    assert!(urls[0].ends_with("limit=100&offset=0"));
    assert!(urls[1].ends_with("limit=100&offset=100"));
    assert!(urls[2].ends_with("limit=100&offset=100"));
    assert!(urls[3].ends_with("limit=100&offset=200"));
}
