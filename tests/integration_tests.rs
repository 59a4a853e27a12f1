//! Integration tests using wiremock to simulate HTTP servers.

use chainreq::retry::{RetryOn5xx, RetryOnRateLimit};
use chainreq::{
    Client, Context, Cookie, Error, File, Files, Form, Headers, Request, Response, RetryPolicy,
    RetryStrategy,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, ReadBuf};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct TestData {
    id: u32,
    name: String,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn linear(attempts: usize, delay_ms: u64) -> RetryPolicy {
    RetryPolicy::new(RetryStrategy::Linear {
        attempts,
        delay: Duration::from_millis(delay_ms),
    })
}

#[tokio::test]
async fn test_successful_get_request() {
    let mock_server = MockServer::start().await;

    let response_data = TestData {
        id: 1,
        name: "Test".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response_data))
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .get(format!("{}/test", mock_server.uri()))
        .send()
        .await;

    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.attempts(), 1);
    assert!(!response.was_retried());
    assert_eq!(response.json::<TestData>().await.unwrap(), response_data);
}

#[tokio::test]
async fn test_default_client_helpers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/items/7"))
        .and(header("user-agent", chainreq::DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = chainreq::put(format!("{}/items/7", mock_server.uri()))
        .send()
        .await
        .ensure_status(StatusCode::NO_CONTENT);
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_request_header_overrides_client_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ref"))
        .and(header("referer", "B"))
        .and(header("x-client", "yes"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .headers(Headers::new().with("Referer", "A").with("X-Client", "yes"))
        .build();

    let response = client
        .get(format!("{}/ref", mock_server.uri()))
        .referer("B")
        .send()
        .await
        .ensure_status_ok();
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_bearer_token_overrides_client_basic_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder().basic_auth("user", "pass").build();
    let response = client
        .get(format!("{}/auth", mock_server.uri()))
        .bearer_token("tok")
        .send()
        .await
        .ensure_status_ok();
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_client_and_request_cookies_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/cookies"))
        .and(header("cookie", "a=1; b=2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder().cookies([Cookie::new("a", "1")]).build();
    let response = client
        .get(format!("{}/cookies", mock_server.uri()))
        .cookie(Cookie::new("b", "2"))
        .send()
        .await
        .ensure_status_ok();
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_jar_cookies_sent_alongside_explicit_cookies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("cookie", "session=abc; lang=en"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let login = client
        .post(format!("{}/login", mock_server.uri()))
        .send()
        .await
        .ensure_status_ok();
    assert!(login.error().is_none());

    let response = client
        .get(format!("{}/me", mock_server.uri()))
        .cookie(Cookie::new("lang", "en"))
        .send()
        .await
        .ensure_status_ok();
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_retry_until_success_keeps_server_cookie() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First four requests fail with 500, the fifth succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 4 {
                ResponseTemplate::new(500).set_body_string("Server error")
            } else {
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=abc; Path=/")
                    .set_body_string("ok")
            }
        })
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let mut response = client
        .get(format!("{}/flaky", mock_server.uri()))
        .retry(linear(5, 10).condition(RetryOn5xx))
        .send()
        .await;

    assert_eq!(response.attempts(), 5);
    assert!(response.was_retried());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 5);
    assert_eq!(response.cookie("session").unwrap().value, "abc");
    assert_eq!(response.text().await.unwrap(), "ok");

    let url = format!("{}/flaky", mock_server.uri());
    assert_eq!(client.filter_cookie(&url, "session").unwrap().value, "abc");
    assert!(matches!(
        client.filter_cookie(&url, "other"),
        Err(Error::JarNamedCookieNotPresent)
    ));
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let response = Client::builder()
        .retry(linear(3, 5).condition(RetryOn5xx))
        .build()
        .get(format!("{}/down", mock_server.uri()))
        .send()
        .await;

    assert_eq!(response.attempts(), 3);
    assert_eq!(response.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_request_retry_none_disables_client_policy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/once"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .retry(linear(4, 5).condition(RetryOn5xx))
        .build();
    let response = client
        .get(format!("{}/once", mock_server.uri()))
        .retry(RetryStrategy::None)
        .send()
        .await;

    assert_eq!(response.attempts(), 1);
}

#[tokio::test]
async fn test_custom_condition_stops_on_first_false() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teapot"))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = Client::new()
        .get(format!("{}/teapot", mock_server.uri()))
        .retry(linear(3, 5).condition(|resp: &Response| {
            resp.status() == Some(StatusCode::SERVICE_UNAVAILABLE)
        }))
        .send()
        .await;

    assert_eq!(response.attempts(), 1);
    assert_eq!(response.status(), Some(StatusCode::IM_A_TEAPOT));
}

#[tokio::test]
async fn test_later_conditions_skipped_once_one_matches() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let consulted = Arc::new(AtomicUsize::new(0));
    let counter = consulted.clone();
    let response = Client::new()
        .get(mock_server.uri())
        .retry(
            linear(3, 5)
                .condition(|_: &Response| true)
                .condition(move |_: &Response| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                }),
        )
        .send()
        .await;

    assert_eq!(response.attempts(), 3);
    assert_eq!(consulted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_deadline_wins_over_retry() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(30)))
        .mount(&mock_server)
        .await;

    let ctx = Context::background().with_timeout(Duration::from_millis(150));
    let mut response = Client::new()
        .get(format!("{}/slow", mock_server.uri()))
        .context(ctx)
        .retry(linear(1000, 10).condition(|_: &Response| true))
        .send()
        .await;

    assert!(matches!(response.error(), Some(Error::DeadlineExceeded)));
    assert!(matches!(response.text().await, Err(Error::DeadlineExceeded)));
    assert!(response.attempts() > 1);
}

#[tokio::test]
async fn test_canceled_context_sends_nothing_useful() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/canceled"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let ctx = Context::background().with_cancel();
    let canceler = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceler.cancel();
    });

    let start = Instant::now();
    let response = Client::new()
        .get(format!("{}/canceled", mock_server.uri()))
        .context(ctx)
        .send()
        .await;

    assert!(matches!(response.error(), Some(Error::Canceled)));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/timeout"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let response = Client::new()
        .get(format!("{}/timeout", mock_server.uri()))
        .timeout(Duration::from_millis(50))
        .send()
        .await;

    assert!(matches!(response.error(), Some(Error::DeadlineExceeded)));
}

#[tokio::test]
async fn test_retry_max_duration_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/budget"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = Client::new()
        .get(format!("{}/budget", mock_server.uri()))
        .retry(
            linear(5, 200)
                .condition(RetryOn5xx)
                .max_duration(Duration::from_millis(100)),
        )
        .send()
        .await;

    assert!(matches!(
        response.error(),
        Some(Error::RetryMaxDurationExceeded)
    ));
    assert_eq!(response.attempts(), 1);
}

#[tokio::test]
async fn test_rate_limit_with_retry_after_seconds() {
    init_tracing();
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First request returns 429 with Retry-After, second succeeds
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "1")
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_string("Rate limited")
            } else {
                ResponseTemplate::new(200).set_body_string("ok")
            }
        })
        .mount(&mock_server)
        .await;

    let start = Instant::now();
    let response = Client::new()
        .get(format!("{}/limited", mock_server.uri()))
        .retry(
            linear(3, 10)
                .condition(RetryOnRateLimit)
                .respect_rate_limit(Duration::from_secs(5)),
        )
        .send()
        .await
        .ensure_status_ok();

    assert!(response.error().is_none());
    assert_eq!(response.attempts(), 2);
    // Should have waited approximately 1 second for rate limit
    assert!(start.elapsed() >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_ensure_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fine"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes"))
        .mount(&mock_server)
        .await;

    let client = Client::new();

    let mut forbidden = client
        .get(format!("{}/forbidden", mock_server.uri()))
        .send()
        .await
        .ensure_status_ok();
    let err = forbidden.text().await.unwrap_err();
    assert!(matches!(err, Error::BadStatus(StatusCode::FORBIDDEN)));
    assert!(err.to_string().contains("403"));

    let mut fine = client
        .get(format!("{}/fine", mock_server.uri()))
        .send()
        .await
        .ensure_status_2xx();
    assert_eq!(fine.text().await.unwrap(), "yes");
}

#[tokio::test]
async fn test_nil_context_is_a_build_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = Client::new()
        .get(format!("{}/never", mock_server.uri()))
        .context(None)
        .send()
        .await;
    let err = response.error().unwrap();
    assert!(matches!(err, Error::Request { cause: "context", .. }));
    assert!(matches!(err.root_cause(), Error::NilContext));

    let client = Client::builder().context(None).build();
    let response = client
        .get(format!("{}/never", mock_server.uri()))
        .send()
        .await;
    let err = response.error().unwrap();
    assert!(matches!(err, Error::Client { cause: "context", .. }));
    assert!(matches!(err.root_cause(), Error::NilContext));
}

#[tokio::test]
async fn test_prebuilt_transport_rejects_reconfiguration() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .transport(reqwest::Client::new())
        .disable_redirect()
        .build();
    let mut response = client.get(mock_server.uri()).send().await;

    let err = response.text().await.unwrap_err();
    assert!(matches!(err, Error::Client { cause: "redirect", .. }));
    assert!(matches!(err.root_cause(), Error::UnexpectedTransport));
}

#[tokio::test]
async fn test_request_interceptor_aborts_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .request_interceptor(|_req: &mut Request| -> chainreq::Result<()> {
            Err(Error::msg("blocked"))
        })
        .build();
    let response = client.get(mock_server.uri()).send().await;

    assert_eq!(response.error().unwrap().to_string(), "blocked");
    assert_eq!(response.status(), None);
}

#[tokio::test]
async fn test_request_interceptors_stop_at_first_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let calls = Arc::new(Mutex::new(Vec::new()));
    let (first, second, third) = (calls.clone(), calls.clone(), calls.clone());
    let client = Client::builder()
        .request_interceptor(move |_req: &mut Request| -> chainreq::Result<()> {
            first.lock().unwrap().push("first");
            Ok(())
        })
        .request_interceptor(move |_req: &mut Request| -> chainreq::Result<()> {
            second.lock().unwrap().push("second");
            Err(Error::msg("denied"))
        })
        .request_interceptor(move |_req: &mut Request| -> chainreq::Result<()> {
            third.lock().unwrap().push("third");
            Ok(())
        })
        .build();
    let response = client.get(mock_server.uri()).send().await;

    assert_eq!(response.error().unwrap().to_string(), "denied");
    assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_request_interceptor_can_modify_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("x-trace", "t-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .request_interceptor(|req: &mut Request| -> chainreq::Result<()> {
            req.header_map_mut()
                .insert("x-trace", http::HeaderValue::from_static("t-1"));
            Ok(())
        })
        .build();
    let response = client.get(mock_server.uri()).send().await.ensure_status_ok();
    assert!(response.error().is_none());
}

#[tokio::test]
async fn test_response_interceptor_error_is_sticky() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("body"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = seen.clone();
    let client = Client::builder()
        .response_interceptor(|_resp: &mut Response| -> chainreq::Result<()> {
            Err(Error::msg("rejected"))
        })
        .response_interceptor(move |_resp: &mut Response| -> chainreq::Result<()> {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();
    let mut response = client.get(mock_server.uri()).send().await;

    assert_eq!(response.status(), Some(StatusCode::OK));
    assert_eq!(response.text().await.unwrap_err().to_string(), "rejected");
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let mock_server = MockServer::start().await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello gzip").unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "GZIP")
                .set_body_bytes(compressed),
        )
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .get(format!("{}/gz", mock_server.uri()))
        .send()
        .await;
    assert_eq!(response.text().await.unwrap(), "hello gzip");
}

#[tokio::test]
async fn test_text_decodes_declared_charsets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/latin1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain; charset=ISO-8859-1")
                .set_body_bytes(b"caf\xe9".to_vec()),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gbk"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/plain")
                .set_body_bytes(b"\xc4\xe3\xba\xc3".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let mut latin1 = Client::new()
        .get(format!("{}/latin1", mock_server.uri()))
        .send()
        .await;
    assert_eq!(latin1.text().await.unwrap(), "caf\u{e9}");

    let mut gbk = Client::new()
        .get(format!("{}/gbk", mock_server.uri()))
        .send()
        .await;
    assert_eq!(gbk.text_with_charset("gbk").await.unwrap(), "\u{4f60}\u{597d}");
}

#[tokio::test]
async fn test_body_is_cached_across_decoders() {
    let mock_server = MockServer::start().await;

    let response_data = TestData {
        id: 3,
        name: "Cached".to_string(),
    };

    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response_data))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .get(format!("{}/cached", mock_server.uri()))
        .send()
        .await;

    let text = response.text().await.unwrap();
    assert_eq!(response.json::<TestData>().await.unwrap(), response_data);
    assert_eq!(response.h().await.unwrap().get_str("name"), Some("Cached"));

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("body.json");
    response.save(&file).await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), text);
}

#[tokio::test]
async fn test_save_streams_unread_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(ResponseTemplate::new(200).set_body_string("file contents"))
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .get(format!("{}/download", mock_server.uri()))
        .send()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("download.txt");
    response.save(&file).await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), "file contents");
    assert_eq!(response.text().await.unwrap(), "file contents");
}

#[tokio::test]
async fn test_deserialization_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bad-json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .get(format!("{}/bad-json", mock_server.uri()))
        .send()
        .await;

    match response.json::<TestData>().await {
        Err(Error::DeserializationFailed {
            raw_response,
            status,
            ..
        }) => {
            assert_eq!(raw_response, "not json");
            assert_eq!(status, StatusCode::OK);
        }
        other => panic!("Expected DeserializationFailed, got {:?}", other),
    }
    // Decode errors leave the body usable
    assert_eq!(response.text().await.unwrap(), "not json");
}

#[tokio::test]
async fn test_form_and_json_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/form"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(|req: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_bytes(req.body.clone())
        })
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .and(header("content-type", "application/json"))
        .respond_with(|req: &wiremock::Request| {
            ResponseTemplate::new(200).set_body_bytes(req.body.clone())
        })
        .mount(&mock_server)
        .await;

    let client = Client::new();

    let mut form = client
        .post(format!("{}/form", mock_server.uri()))
        .form(Form::new().with("b", "2 3").with("a", vec![1, 2]))
        .send()
        .await;
    assert_eq!(form.text().await.unwrap(), "a=1&a=2&b=2+3");

    let data = TestData {
        id: 9,
        name: "<b>".to_string(),
    };
    let mut json = client
        .post(format!("{}/json", mock_server.uri()))
        .json(&data)
        .send()
        .await;
    assert_eq!(json.text().await.unwrap(), r#"{"id":9,"name":"<b>"}"#);
}

#[tokio::test]
async fn test_multipart_upload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(|req: &wiremock::Request| {
            let content_type = req
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            ResponseTemplate::new(200)
                .insert_header("x-seen-content-type", content_type.as_str())
                .set_body_bytes(req.body.clone())
        })
        .mount(&mock_server)
        .await;

    let files = Files::new().with("doc", File::from_bytes("notes.txt", "hello upload"));
    let mut response = Client::new()
        .post(format!("{}/upload", mock_server.uri()))
        .multipart(files, Form::new().with("title", "report"))
        .send()
        .await;

    let content_type = response.header("x-seen-content-type").unwrap().to_string();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap()
        .to_string();
    let body = response.text().await.unwrap();

    let doc = body
        .find("Content-Disposition: form-data; name=\"doc\"; filename=\"notes.txt\"")
        .unwrap();
    let title = body
        .find("Content-Disposition: form-data; name=\"title\"")
        .unwrap();
    assert!(doc < title, "files precede fields");
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.contains("Content-Type: text/plain; charset=utf-8\r\n\r\nhello upload\r\n"));
    assert!(body.contains("\r\n\r\nreport\r\n"));
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));
}

struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut TaskContext<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::other("disk gone")))
    }
}

#[tokio::test]
async fn test_multipart_encoder_error_wins_over_cancel() {
    init_tracing();
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    // a declared MIME type skips sniffing, so the read fails mid-upload
    let files = Files::new().with(
        "broken",
        File::from_reader(FailingReader)
            .with_filename("broken.bin")
            .with_mime("application/octet-stream"),
    );
    let response = Client::new()
        .post(format!("{}/upload", mock_server.uri()))
        .multipart(files, Form::new())
        .send()
        .await;

    let err = response.error().unwrap();
    assert!(matches!(err, Error::Request { cause: "multipart", .. }));
    assert!(matches!(err.root_cause(), Error::Io(_)));
}

#[tokio::test]
async fn test_multipart_sniff_failure_skips_sending() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let files = Files::new().with(
        "broken",
        File::from_reader(FailingReader).with_filename("broken.bin"),
    );
    let response = Client::new()
        .post(format!("{}/upload", mock_server.uri()))
        .multipart(files, Form::new())
        .send()
        .await;

    let err = response.error().unwrap();
    assert!(matches!(err, Error::Request { cause: "multipart", .. }));
    assert!(matches!(err.root_cause(), Error::Io(_)));
}

#[tokio::test]
async fn test_cookie_helpers_report_missing_cookies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let no_jar = Client::builder().disable_session().build();
    assert!(matches!(
        no_jar.filter_cookies(&mock_server.uri()),
        Err(Error::NilCookieJar)
    ));

    let client = Client::new();
    assert!(matches!(
        client.filter_cookies(&mock_server.uri()),
        Err(Error::JarCookiesNotPresent)
    ));
    assert!(matches!(
        client.filter_cookies("not a url"),
        Err(Error::InvalidUrl(_))
    ));

    let response = client.get(mock_server.uri()).send().await;
    assert!(matches!(
        response.cookies(),
        Err(Error::ResponseCookiesNotPresent)
    ));
}

#[tokio::test]
async fn test_verbose_trace() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/echo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&mock_server)
        .await;

    let mut response = Client::new()
        .post(format!("{}/echo?x=1", mock_server.uri()))
        .text("ping")
        .send()
        .await;

    let mut out = Vec::new();
    response.verbose(&mut out).await.unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("> POST /echo?x=1 HTTP/1.1\r\n"));
    assert!(out.contains("\r\nping\r\n"));
    assert!(out.contains("< HTTP/1.1 200 OK\r\n"));
    assert!(out.ends_with("\r\n<\r\npong\r\n"));
    assert_eq!(response.text().await.unwrap(), "pong");
}
