//! Article text extraction for script context.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

/// User agent sent when fetching context pages.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; reelgen/0.1; +https://github.com/reelgen)";

/// Per-page fetch timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(12);

/// Longest text kept from one page, in characters.
pub const MAX_CHARS: usize = 20_000;

/// Most pages read for one script.
pub const MAX_URLS: usize = 6;

static BOILERPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<(script|style|nav|footer|header|aside|noscript)\b[^>]*>.*?</(script|style|nav|footer|header|aside|noscript)\s*>",
    )
    .expect("valid regex")
});

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex")
});

fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "mdash" => '-',
        "ndash" => '-',
        "hellip" => return Some("...".to_string()),
        "rsquo" | "lsquo" => '\'',
        "rdquo" | "ldquo" => '"',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse().ok()?
            } else {
                return None;
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

/// Reduce an HTML page to its readable text.
///
/// Drops script, style and page-chrome elements, strips the remaining tags,
/// decodes common entities and collapses whitespace.
pub fn extract_from_html(html: &str) -> String {
    let text = COMMENT.replace_all(html, " ");
    let text = BOILERPLATE.replace_all(&text, " ");
    let text = TAG.replace_all(&text, " ");
    let text = ENTITY.replace_all(&text, |caps: &regex::Captures| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}

/// HTTP client for context fetching.
pub fn context_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
}

/// Fetch a page and extract its text.
///
/// Any failure (network, non-2xx status, body read) yields an empty string;
/// context is best effort.
pub async fn fetch_and_extract(client: &reqwest::Client, url: &str) -> String {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            log::warn!("Failed to fetch {}: {}", url, e);
            return String::new();
        }
    };
    if !response.status().is_success() {
        log::warn!("Failed to fetch {}: status {}", url, response.status());
        return String::new();
    }
    match response.text().await {
        Ok(html) => truncate_chars(extract_from_html(&html), MAX_CHARS),
        Err(e) => {
            log::warn!("Failed to read {}: {}", url, e);
            String::new()
        }
    }
}

/// Fetch up to [`MAX_URLS`] unique pages and join their text with blank lines.
pub async fn gather_context(client: &reqwest::Client, urls: &[String]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for url in urls {
        let url = url.trim();
        if !url.is_empty() && !seen.contains(&url) {
            seen.push(url);
        }
        if seen.len() == MAX_URLS {
            break;
        }
    }

    let mut parts = Vec::new();
    for url in seen {
        log::info!("Extracting context from {}", url);
        let text = fetch_and_extract(client, url).await;
        if !text.is_empty() {
            parts.push(text);
        }
    }
    parts.join("\n\n")
}

/// Compose the script request: topic line, then any extracted context.
pub fn script_input(topic: &str, context: &str) -> String {
    if context.trim().is_empty() {
        format!("Topic: {}", topic.trim())
    } else {
        format!("Topic: {}\nContext: {}", topic.trim(), context.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_strips_chrome_and_tags() {
        let html = r#"<html><head><style>p{color:red}</style><script>var x = "<p>";</script></head>
<body><header>Site Menu</header><nav><a href="/">Home</a></nav>
<article><h1>Big&nbsp;News</h1><p>Robots   learn to
dance &amp; sing.</p></article><!-- tracking -->
<aside>Ads</aside><footer>(c) 2025</footer></body></html>"#;
        assert_eq!(extract_from_html(html), "Big News Robots learn to dance & sing.");
    }

    #[test]
    fn test_extract_decodes_numeric_entities() {
        assert_eq!(extract_from_html("it&#39;s &#x41;I"), "it's AI");
        assert_eq!(extract_from_html("&bogus; stays"), "&bogus; stays");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 2), "hé");
        assert_eq!(truncate_chars("abc".to_string(), 10), "abc");
    }

    #[test]
    fn test_script_input() {
        assert_eq!(script_input(" robots ", ""), "Topic: robots");
        assert_eq!(
            script_input("robots", "They dance."),
            "Topic: robots\nContext: They dance."
        );
    }
}
