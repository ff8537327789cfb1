use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::config::TopicsConfig;
use crate::error::Result;
use crate::http::{build_client, ensure_success};

use std::time::Duration;

const NEWSAPI: &str = "NewsAPI";
const LUNARCRUSH: &str = "LunarCrush";

const TOPICS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct CoinList {
    #[serde(default)]
    data: Vec<CoinEntry>,
}

#[derive(Debug, Deserialize)]
struct CoinEntry {
    name: String,
}

/// Topic sources used to seed report prompts
pub struct TopicSources {
    client: Client,
    config: TopicsConfig,
}

impl TopicSources {
    pub fn new(config: TopicsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(TOPICS_TIMEOUT)?,
            config,
        })
    }

    /// NewsAPI `everything` search for the configured query, returned as-is
    pub async fn ai_news(&self, api_key: &str) -> Result<serde_json::Value> {
        let url = format!("{}/v2/everything", self.config.newsapi_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("q", self.config.news_query.as_str()), ("apiKey", api_key)])
            .send()
            .await?;
        let response = ensure_success(NEWSAPI, response).await?;
        let json: serde_json::Value = response.json().await?;

        info!(
            "Fetched {} articles for '{}'",
            json.get("articles").and_then(|a| a.as_array()).map_or(0, |a| a.len()),
            self.config.news_query
        );
        Ok(json)
    }

    /// Coin names ordered by 24h social volume
    pub async fn coin_names(&self, api_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/public/coins/list/v1", self.config.lunarcrush_api_url.trim_end_matches('/'));
        let response = self
            .client
            .get(url)
            .query(&[("sort", "social_volume_24h")])
            .bearer_auth(api_key)
            .send()
            .await?;
        let response = ensure_success(LUNARCRUSH, response).await?;
        let list: CoinList = response.json().await?;
        Ok(list.data.into_iter().map(|coin| coin.name).collect())
    }

    /// Plain-text topic summary page for one coin
    pub async fn coin_topic(&self, api_key: &str, topic: &str) -> Result<String> {
        let url = format!(
            "{}/{}",
            self.config.lunarcrush_topic_url.trim_end_matches('/'),
            topic.trim()
        );
        let response = self.client.get(url).bearer_auth(api_key).send().await?;
        let response = ensure_success(LUNARCRUSH, response).await?;
        Ok(response.text().await?)
    }
}
