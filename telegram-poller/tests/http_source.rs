//! Integration tests for the HTTP update source
//!
//! A mockito server stands in for the Bot API so the request shape and the
//! mapping of every response class onto `PollError` can be checked.

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use rstest::rstest;
use telegram_poller::{
    ErrorKind, HttpUpdateSource, PollError, PollingOptions, UpdateSource, UpdatesRequest,
};

const TOKEN: &str = "123456:TEST-token";
const PATH: &str = "/bot123456:TEST-token/getUpdates";

fn options_for(server: &ServerGuard) -> PollingOptions {
    PollingOptions::new()
        .with_api_url(server.url())
        .with_timeout(Duration::ZERO)
        .with_request_grace(Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetches_batch_with_expected_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "7".into()),
            Matcher::UrlEncoded("timeout".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"ok":true,"result":[
                {"update_id":7,"message":{"message_id":10,"text":"first"}},
                {"update_id":8,"callback_query":{"id":"abc","data":"x"}}
            ]}"#,
        )
        .create_async()
        .await;

    let options = options_for(&server).with_limit(2);
    let source = HttpUpdateSource::new(TOKEN, &options).unwrap();
    let updates = source
        .get_updates(&UpdatesRequest::after(6, &options))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].update_id, 7);
    assert_eq!(updates[0].get("message").unwrap()["text"], "first");
    assert_eq!(updates[1].update_id, 8);
    assert_eq!(updates[1].kind(), Some("callback_query"));
}

#[tokio::test]
async fn test_limit_is_omitted_when_unset() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", PATH)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("offset".into(), "1".into()),
            Matcher::UrlEncoded("timeout".into(), "0".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":[]}"#)
        .create_async()
        .await;

    let options = options_for(&server);
    let source = HttpUpdateSource::new(TOKEN, &options).unwrap();
    let updates = source
        .get_updates(&UpdatesRequest::after(0, &options))
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(updates.is_empty());
}

#[rstest]
#[case(500, "Internal Server Error", ErrorKind::Protocol)]
#[case(502, "<html>Bad Gateway</html>", ErrorKind::Protocol)]
#[case(
    401,
    r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
    ErrorKind::Protocol
)]
#[case(
    200,
    r#"{"ok":false,"error_code":409,"description":"Conflict: terminated by other getUpdates request"}"#,
    ErrorKind::Application
)]
#[case(200, "not json at all", ErrorKind::Protocol)]
#[case(200, r#"{"ok":true}"#, ErrorKind::Protocol)]
#[tokio::test]
async fn test_response_classification(
    #[case] status: usize,
    #[case] body: &str,
    #[case] expected: ErrorKind,
) {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", PATH)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_body(body)
        .create_async()
        .await;

    let options = options_for(&server);
    let source = HttpUpdateSource::new(TOKEN, &options).unwrap();
    let err = source
        .get_updates(&UpdatesRequest::after(0, &options))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), expected, "unexpected error: {err}");
    if let PollError::Status { status: code, .. } = err {
        assert_eq!(code as usize, status);
    }
}

#[tokio::test]
async fn test_api_error_fields() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
        .create_async()
        .await;

    let options = options_for(&server);
    let source = HttpUpdateSource::new(TOKEN, &options).unwrap();
    let err = source
        .get_updates(&UpdatesRequest::after(0, &options))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PollError::Api {
            error_code: 401,
            description: "Unauthorized".to_string(),
        }
    );
}

#[tokio::test]
async fn test_connection_refused_is_transport_error_without_token() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let options = PollingOptions::new()
        .with_api_url(format!("http://127.0.0.1:{port}"))
        .with_timeout(Duration::ZERO)
        .with_request_grace(Duration::from_secs(2));
    let source = HttpUpdateSource::new(TOKEN, &options).unwrap();
    let err = source
        .get_updates(&UpdatesRequest::after(0, &options))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(!err.to_string().contains("TEST-token"));
}

#[test]
fn test_rejects_empty_token() {
    let err = HttpUpdateSource::new("", &PollingOptions::default()).unwrap_err();
    assert!(err.to_string().contains("token"));
}
