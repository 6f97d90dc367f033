//! Blog crawler: sitemap discovery plus page download and cleanup.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::store::ChunkMetadata;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc>\s*(?:<!\[CDATA\[)?\s*(.*?)\s*(?:\]\]>)?\s*</loc>").expect("loc pattern")
});

static NON_CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<link\b[^>]*>",
    )
    .expect("non-content pattern")
});

/// Cleaned text of one page plus its metadata.
#[derive(Debug, Clone)]
pub struct WebPage {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Where ingestion gets its pages from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Page URLs belonging to the blog, in sitemap order.
    async fn discover(&self, blog_url: &str) -> Result<Vec<String>>;

    async fn fetch_page(&self, url: &str) -> Result<WebPage>;
}

pub struct BlogCrawler {
    client: reqwest::Client,
}

impl BlogCrawler {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }
}

#[async_trait]
impl PageSource for BlogCrawler {
    async fn discover(&self, blog_url: &str) -> Result<Vec<String>> {
        let root = blog_url.trim_end_matches('/');
        let sitemap_url = format!("{}/sitemap.xml", root);

        let sitemap = match self.fetch_text(&sitemap_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "sitemap unavailable, crawling blog root only");
                return Ok(vec![blog_url.to_string()]);
            }
        };

        let mut locs = extract_locs(&sitemap);
        if is_sitemap_index(&sitemap) {
            let children = std::mem::take(&mut locs);
            for child in children {
                match self.fetch_text(&child).await {
                    Ok(body) => locs.extend(extract_locs(&body)),
                    Err(e) => warn!(url = %child, error = %e, "skipping child sitemap"),
                }
            }
        }

        let pages = filter_page_urls(locs);
        debug!(count = pages.len(), "sitemap pages discovered");
        if pages.is_empty() {
            return Ok(vec![blog_url.to_string()]);
        }
        Ok(pages)
    }

    async fn fetch_page(&self, url: &str) -> Result<WebPage> {
        let html = self.fetch_text(url).await?;
        Ok(parse_page(url, &html))
    }
}

fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

pub fn extract_locs(xml: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(xml)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().replace("&amp;", "&"))
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn is_image_url(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Drop image links and repeats, keeping first-seen order.
pub fn filter_page_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| !is_image_url(u))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Clean `html` into text and pull the page metadata.
pub fn parse_page(url: &str, html: &str) -> WebPage {
    let cleaned = NON_CONTENT_RE.replace_all(html, "");
    let document = Html::parse_document(&cleaned);

    let title = extract_title(&document).unwrap_or_else(|| title_from_url(url));
    let description = extract_meta(&document, "description").unwrap_or_else(|| title.clone());
    let keywords = extract_meta(&document, "keywords").unwrap_or_default();

    let text = html2text::from_read(cleaned.as_bytes(), 120).unwrap_or_else(|_| {
        document.root_element().text().collect::<Vec<_>>().join(" ")
    });

    WebPage {
        text,
        metadata: ChunkMetadata {
            url: url.to_string(),
            title,
            description,
            keywords,
        },
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;
    document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_meta(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[name=\"{}\"]", name)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// `https://blog/2023/05/scaling/` becomes `2023-05-scaling`.
fn title_from_url(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let title = path.trim_matches('/').replace('/', "-");
    if title.is_empty() {
        url.to_string()
    } else {
        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Kubernetes Scaling Patterns</title>
  <meta name="description" content="How HPA and VPA fit together">
  <meta name="keywords" content="kubernetes, autoscaling">
  <link rel="stylesheet" href="style.css">
  <style>body { color: red; }</style>
  <script>var tracking = "secret";</script>
</head>
<body>
  <h1>Scaling</h1>
  <p>The horizontal pod autoscaler adds replicas.</p>
  <noscript>Enable JavaScript</noscript>
</body>
</html>"#;

    #[test]
    fn parses_text_and_metadata() {
        let page = parse_page("https://technibbana.wordpress.com/k8s/", PAGE);
        assert_eq!(page.metadata.title, "Kubernetes Scaling Patterns");
        assert_eq!(page.metadata.description, "How HPA and VPA fit together");
        assert_eq!(page.metadata.keywords, "kubernetes, autoscaling");
        assert_eq!(page.metadata.url, "https://technibbana.wordpress.com/k8s/");

        assert!(page.text.contains("horizontal pod autoscaler"));
        assert!(!page.text.contains("tracking"));
        assert!(!page.text.contains("color: red"));
        assert!(!page.text.contains("Enable JavaScript"));
    }

    #[test]
    fn metadata_fallbacks() {
        let page = parse_page(
            "https://technibbana.wordpress.com/2023/05/scaling/",
            "<html><body><p>Body only</p></body></html>",
        );
        assert_eq!(page.metadata.title, "2023-05-scaling");
        assert_eq!(page.metadata.description, "2023-05-scaling");
        assert_eq!(page.metadata.keywords, "");
    }

    #[test]
    fn sitemap_locs_are_extracted_and_unescaped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://technibbana.wordpress.com/</loc></url>
  <url><loc> https://technibbana.wordpress.com/?p=1&amp;lang=en </loc></url>
  <url><loc><![CDATA[https://technibbana.wordpress.com/about/]]></loc></url>
</urlset>"#;
        assert_eq!(
            extract_locs(xml),
            vec![
                "https://technibbana.wordpress.com/",
                "https://technibbana.wordpress.com/?p=1&lang=en",
                "https://technibbana.wordpress.com/about/",
            ]
        );
        assert!(!is_sitemap_index(xml));
        assert!(is_sitemap_index("<sitemapindex><sitemap><loc>x</loc></sitemap></sitemapindex>"));
    }

    #[test]
    fn image_links_and_duplicates_are_dropped() {
        let urls = vec![
            "https://blog/a/".to_string(),
            "https://blog/wp-content/uploads/header.JPG".to_string(),
            "https://blog/b/".to_string(),
            "https://blog/a/".to_string(),
            "https://blog/pic.png?w=300".to_string(),
        ];
        assert_eq!(filter_page_urls(urls), vec!["https://blog/a/", "https://blog/b/"]);
    }
}
