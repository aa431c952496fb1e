//! Share links against a local stand-in for the link shortener.

use std::collections::HashMap;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use rill_playground::{ShareConfig, ShareLinks, decode_share_link};

async fn spawn_shortener(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/create.php")
}

fn links(shortener_url: String) -> ShareLinks {
    ShareLinks::new(ShareConfig {
        base_url: "https://play.example/".to_string(),
        shortener_url: Some(shortener_url),
        timeout: Duration::from_secs(2),
    })
}

#[tokio::test]
async fn shortener_response_is_used() {
    let app = Router::new().route(
        "/create.php",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("format").map(String::as_str), Some("simple"));
            assert!(params["url"].starts_with("https://play.example/?code="));
            "https://is.gd/abc123\n"
        }),
    );
    let links = links(spawn_shortener(app).await);

    let link = links.share("print(1)").await;
    assert!(link.shortened);
    assert_eq!(link.url, "https://is.gd/abc123");
}

#[tokio::test]
async fn shortener_error_falls_back_to_long_link() {
    let app = Router::new().route(
        "/create.php",
        get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "Error: rate limited") }),
    );
    let links = links(spawn_shortener(app).await);

    let link = links.share("let x = 1").await;
    assert!(!link.shortened);
    assert_eq!(decode_share_link(&link.url).unwrap(), "let x = 1");
}

#[tokio::test]
async fn unreachable_shortener_falls_back_to_long_link() {
    // Bind and drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let links = links(format!("http://{addr}/create.php"));
    let link = links.share("print(2)").await;
    assert!(!link.shortened);
    assert_eq!(link.url, links.long_link("print(2)"));
}

#[tokio::test]
async fn non_url_body_falls_back_to_long_link() {
    let app = Router::new().route("/create.php", get(|| async { "Error: bad url" }));
    let links = links(spawn_shortener(app).await);

    let link = links.share("1").await;
    assert!(!link.shortened);
}
