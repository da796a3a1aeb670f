//! Mock HTTP tests for article context extraction.

use reelgen::extract::{context_client, fetch_and_extract, gather_context, script_input};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = "<html><head><title>x</title><script>track()</script></head>\
<body><nav>Menu</nav><article><p>Lava is molten rock.</p></article>\
<footer>Copyright</footer></body></html>";

#[tokio::test]
async fn test_fetch_and_extract_returns_article_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/story"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = context_client().unwrap();
    let text = fetch_and_extract(&client, &format!("{}/story", mock_server.uri())).await;
    assert!(text.contains("Lava is molten rock."));
    assert!(!text.contains("track()"));
    assert!(!text.contains("Menu"));
    assert!(!text.contains("Copyright"));
}

#[tokio::test]
async fn test_failed_fetch_yields_empty_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = context_client().unwrap();
    let text = fetch_and_extract(&client, &format!("{}/gone", mock_server.uri())).await;
    assert!(text.is_empty());
}

#[tokio::test]
async fn test_gather_context_dedupes_and_skips_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>First page.</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Third page.</p>"))
        .mount(&mock_server)
        .await;

    let base = mock_server.uri();
    let urls = vec![
        format!("{}/a", base),
        format!("{}/a", base),
        format!("{}/b", base),
        format!("{}/c", base),
    ];
    let client = context_client().unwrap();
    let context = gather_context(&client, &urls).await;
    assert_eq!(context, "First page.\n\nThird page.");

    let input = script_input("lava", &context);
    assert!(input.starts_with("Topic: lava\nContext: First page."));
}
