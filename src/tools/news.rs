//! Reference tools: Wikipedia summaries, news headlines, stock headlines.
//!
//! These tools handle their own failures: fetch errors come back as text the
//! reasoner can read, never as tool errors. Headlines are read from RSS feeds
//! through [`HeadlineSource`].

use crate::tools::registry::{Tool, ToolRegistry};
use crate::tools::schema::{ParamDef, ParamType, ToolDescriptor};
use crate::types::{Error, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const NPR_FEED: &str = "https://feeds.npr.org/1001/rss.xml";
pub const BBC_FEED: &str = "https://feeds.bbci.co.uk/news/rss.xml";
pub const WIKIPEDIA_API: &str = "https://en.wikipedia.org/api/rest_v1";

const NEWS_LIMIT: usize = 10;
const STOCK_NEWS_LIMIT: usize = 5;

const STOCK_FEED: &str = "https://feeds.finance.yahoo.com/rss/2.0/headline";

fn stock_feed(ticker: &str) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        STOCK_FEED,
        &[("s", ticker), ("region", "US"), ("lang", "en-US")],
    )
    .map_err(|e| Error::internal(format!("stock feed URL: {}", e)))?;
    Ok(url.into())
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headline {
    pub title: String,
    pub link: Option<String>,
    pub published: Option<String>,
}

/// Where headlines come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Fetch at most `limit` headlines from a feed URL, newest first.
    async fn fetch(&self, feed_url: &str, limit: usize) -> Result<Vec<Headline>>;
}

/// RSS-backed headline source over HTTP.
#[derive(Debug, Clone)]
pub struct FeedHeadlines {
    client: reqwest::Client,
}

impl FeedHeadlines {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (toolbridge)")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HeadlineSource for FeedHeadlines {
    async fn fetch(&self, feed_url: &str, limit: usize) -> Result<Vec<Headline>> {
        let body = self
            .client
            .get(feed_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::connection(e.to_string()))?
            .text()
            .await
            .map_err(|e| Error::protocol(e.to_string()))?;
        Ok(parse_rss_items(&body, limit))
    }
}

/// Extract `<item>` titles, links and dates from an RSS document.
///
/// The feed goes through the HTML parser, so character references are
/// decoded and attributes are tolerated. `<link>` is a void element there:
/// its URL ends up in the text node that follows it.
pub fn parse_rss_items(xml: &str, limit: usize) -> Vec<Headline> {
    let (Ok(item_sel), Ok(title_sel), Ok(link_sel), Ok(date_sel)) = (
        Selector::parse("item"),
        Selector::parse("title"),
        Selector::parse("link"),
        Selector::parse("pubdate"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(xml);
    document
        .select(&item_sel)
        .filter_map(|item| {
            let title = item.select(&title_sel).next().and_then(element_text)?;
            Some(Headline {
                title,
                link: item.select(&link_sel).next().and_then(link_target),
                published: item.select(&date_sel).next().and_then(element_text),
            })
        })
        .take(limit)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

fn link_target(link: ElementRef<'_>) -> Option<String> {
    if let Some(href) = link.value().attr("href") {
        return clean_text(href);
    }
    element_text(link).or_else(|| {
        link.next_sibling()
            .and_then(|node| node.value().as_text().and_then(|text| clean_text(text)))
    })
}

/// Trimmed text with any CDATA wrapper removed; `None` when empty.
fn clean_text(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let text = raw
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw)
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// =============================================================================
// get_latest_news
// =============================================================================

/// Top headlines from NPR or BBC.
pub struct LatestNewsTool {
    source: Arc<dyn HeadlineSource>,
}

impl fmt::Debug for LatestNewsTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatestNewsTool").finish_non_exhaustive()
    }
}

impl LatestNewsTool {
    pub fn new(source: Arc<dyn HeadlineSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for LatestNewsTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_latest_news",
            "Fetch the latest news headlines from a supported source ('npr' or 'bbc', \
             case-insensitive). Returns up to 10 headlines, one per line.",
        )
        .param(ParamDef::with_default(
            "source",
            ParamType::String,
            "News source: 'npr' or 'bbc'",
            Value::String("npr".to_string()),
        ))
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
        let source = arguments
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or("npr")
            .to_lowercase();
        let feed = match source.as_str() {
            "npr" => NPR_FEED,
            "bbc" => BBC_FEED,
            _ => return Ok(Value::String("Unsupported news source.".to_string())),
        };

        let text = match self.source.fetch(feed, NEWS_LIMIT).await {
            Ok(headlines) => headlines
                .iter()
                .map(|h| format!("- {}", h.title))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("Error while fetching news: {}", e),
        };
        Ok(Value::String(text))
    }
}

// =============================================================================
// get_stock_news
// =============================================================================

/// Recent headlines about one ticker.
pub struct StockNewsTool {
    source: Arc<dyn HeadlineSource>,
}

impl fmt::Debug for StockNewsTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StockNewsTool").finish_non_exhaustive()
    }
}

impl StockNewsTool {
    pub fn new(source: Arc<dyn HeadlineSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tool for StockNewsTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_stock_news",
            "Get up to 5 recent news headlines for a stock ticker symbol (e.g. 'AAPL'), \
             formatted as 'Timestamp - Headline (URL)'.",
        )
        .param(ParamDef::required(
            "ticker",
            ParamType::String,
            "Stock ticker symbol",
        ))
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
        let ticker = arguments
            .get("ticker")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_arguments("get_stock_news requires a ticker"))?
            .trim()
            .to_uppercase();

        let fetched = match stock_feed(&ticker) {
            Ok(url) => self.source.fetch(&url, STOCK_NEWS_LIMIT).await,
            Err(e) => Err(e),
        };
        let text = match fetched {
            Ok(headlines) => headlines
                .iter()
                .map(|h| {
                    format!(
                        "{} - {} ({})",
                        h.published.as_deref().unwrap_or("unknown time"),
                        h.title,
                        h.link.as_deref().unwrap_or("no link"),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("Error fetching news: {}", e),
        };
        Ok(Value::String(text))
    }
}

// =============================================================================
// get_wikipedia_summary
// =============================================================================

/// First-paragraph summary of a Wikipedia topic.
#[derive(Debug, Clone)]
pub struct WikipediaSummaryTool {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaSummaryTool {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("WikiSummaryAgent/1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn summary(&self, topic: &str) -> Result<String> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::validation(format!("invalid Wikipedia URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::validation("Wikipedia URL cannot take a path"))?
            .pop_if_empty()
            .extend(["page", "summary", topic.replace(' ', "_").as_str()]);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok("Topic not found on Wikipedia.".to_string());
        }
        if !status.is_success() {
            return Ok(format!(
                "Unexpected response from Wikipedia: {}",
                status.as_u16()
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::protocol(e.to_string()))?;
        Ok(body
            .get("extract")
            .and_then(Value::as_str)
            .unwrap_or("No summary available.")
            .to_string())
    }
}

#[async_trait]
impl Tool for WikipediaSummaryTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_wikipedia_summary",
            "Fetch the first paragraph summary of a topic from Wikipedia \
             (e.g. 'machine learning').",
        )
        .param(ParamDef::required(
            "topic",
            ParamType::String,
            "Topic to look up",
        ))
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
        let topic = arguments
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_arguments("get_wikipedia_summary requires a topic"))?;

        let text = match self.summary(topic).await {
            Ok(text) => text,
            Err(e) => format!("Error fetching summary: {}", e),
        };
        Ok(Value::String(text))
    }
}

/// Register the reference tool set.
pub fn register_news_tools(
    registry: &mut ToolRegistry,
    headlines: Arc<dyn HeadlineSource>,
    wikipedia: WikipediaSummaryTool,
) -> Result<()> {
    registry.register(wikipedia)?;
    registry.register(LatestNewsTool::new(headlines.clone()))?;
    registry.register(StockNewsTool::new(headlines))?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
