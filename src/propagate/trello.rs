use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{extract_card_id, merge_description_block, CardClient};
use crate::breadcrumbs::TrelloCard;
use crate::config::TrelloCredentials;
use crate::error::Error;
use crate::reconcile::timestamp;

const API_BASE: &str = "https://api.trello.com/1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct CardDescription {
    #[serde(default)]
    desc: String,
}

#[derive(Debug, Deserialize)]
struct CardSummary {
    name: Option<String>,
    #[serde(rename = "idBoard")]
    id_board: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardSummary {
    name: Option<String>,
}

fn card_from_summary(
    url: &str,
    card_id: String,
    summary: CardSummary,
    board_name: Option<String>,
    fetched_at: DateTime<Utc>,
) -> TrelloCard {
    TrelloCard {
        url: url.to_string(),
        card_id,
        title: summary.name.unwrap_or_else(|| "Unknown".to_string()),
        board_name,
        last_fetched: Some(timestamp(fetched_at)),
    }
}

/// `CardClient` over the Trello REST API. Reads the current description, merges the
/// breadcrumbs block into it and writes it back. No retries.
pub struct TrelloClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_token: String,
}

impl TrelloClient {
    pub fn new(credentials: &TrelloCredentials) -> Result<Self, Error> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            api_key: credentials.api_key.clone(),
            api_token: credentials.api_token.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn card_url(&self, card_id: &str) -> String {
        format!("{}/cards/{}", self.base_url, card_id)
    }

    fn check_status(status: StatusCode, card_id: &str) -> anyhow::Result<()> {
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => bail!("Unauthorized: invalid API credentials"),
            StatusCode::NOT_FOUND => bail!("Card {} not found", card_id),
            s => bail!("API error: {}", s),
        }
    }

    async fn fetch_description(&self, card_id: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .get(self.card_url(card_id))
            .query(&[
                ("fields", "desc"),
                ("key", self.api_key.as_str()),
                ("token", self.api_token.as_str()),
            ])
            .send()
            .await
            .context("Network error")?;
        Self::check_status(response.status(), card_id)?;

        let card: CardDescription = response
            .json()
            .await
            .context("Failed to parse API response")?;
        Ok(card.desc)
    }

    /// Look up a card's title and board so it can be linked from a project.
    pub async fn fetch_card_details(&self, card_url: &str) -> anyhow::Result<TrelloCard> {
        let card_id = extract_card_id(card_url)
            .with_context(|| format!("Invalid card URL: {}", card_url))?;

        let response = self
            .http
            .get(self.card_url(&card_id))
            .query(&[
                ("fields", "name,idBoard"),
                ("key", self.api_key.as_str()),
                ("token", self.api_token.as_str()),
            ])
            .send()
            .await
            .context("Network error")?;
        Self::check_status(response.status(), &card_id)?;

        let summary: CardSummary = response
            .json()
            .await
            .context("Failed to parse API response")?;
        let board_name = match summary.id_board.as_deref() {
            Some(board_id) => self.fetch_board_name(board_id).await,
            None => None,
        };

        Ok(card_from_summary(card_url, card_id, summary, board_name, Utc::now()))
    }

    /// Board name, if it can be fetched. A failure here never fails the card lookup.
    async fn fetch_board_name(&self, board_id: &str) -> Option<String> {
        let response = self
            .http
            .get(format!("{}/boards/{}", self.base_url, board_id))
            .query(&[
                ("fields", "name"),
                ("key", self.api_key.as_str()),
                ("token", self.api_token.as_str()),
            ])
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => response
                .json::<BoardSummary>()
                .await
                .ok()
                .and_then(|board| board.name),
            Ok(response) => {
                debug!("Board {} lookup returned {}", board_id, response.status());
                None
            }
            Err(err) => {
                debug!("Board {} lookup failed: {}", board_id, err);
                None
            }
        }
    }
}

#[async_trait]
impl CardClient for TrelloClient {
    async fn update_card_description_block(&self, card_id: &str, block: &str) -> anyhow::Result<()> {
        let current = self.fetch_description(card_id).await?;
        let desc = merge_description_block(&current, block);
        if desc == current {
            debug!("Card {} already up to date", card_id);
            return Ok(());
        }

        let response = self
            .http
            .put(self.card_url(card_id))
            .query(&[
                ("key", self.api_key.as_str()),
                ("token", self.api_token.as_str()),
            ])
            .json(&serde_json::json!({ "desc": desc }))
            .send()
            .await
            .context("Network error")?;
        Self::check_status(response.status(), card_id)?;

        debug!("Updated description of card {}", card_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url_uses_base() {
        let creds = TrelloCredentials {
            api_key: "k".to_string(),
            api_token: "t".to_string(),
        };
        let client = TrelloClient::new(&creds)
            .unwrap()
            .with_base_url("http://localhost:9999/1/");
        assert_eq!(client.card_url("abc"), "http://localhost:9999/1/cards/abc");
    }

    #[test]
    fn test_card_details_from_summary() {
        use chrono::TimeZone;

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let summary: CardSummary =
            serde_json::from_str(r#"{"id":"x","name":"Launch edit","idBoard":"b1"}"#).unwrap();
        let card = card_from_summary(
            "https://trello.com/c/AbCd1234/launch",
            "AbCd1234".to_string(),
            summary,
            Some("Productions".to_string()),
            at,
        );
        assert_eq!(card.title, "Launch edit");
        assert_eq!(card.board_name.as_deref(), Some("Productions"));
        assert_eq!(card.last_fetched.as_deref(), Some("2024-03-01T09:00:00Z"));

        let unnamed: CardSummary = serde_json::from_str("{}").unwrap();
        let card = card_from_summary("u", "id".to_string(), unnamed, None, at);
        assert_eq!(card.title, "Unknown");
    }

    #[tokio::test]
    async fn test_invalid_card_url_is_rejected_before_any_request() {
        let creds = TrelloCredentials {
            api_key: "k".to_string(),
            api_token: "t".to_string(),
        };
        let client = TrelloClient::new(&creds)
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = client
            .fetch_card_details("https://example.com/not-a-card")
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid card URL"));
    }

    #[test]
    fn test_status_mapping() {
        assert!(TrelloClient::check_status(StatusCode::OK, "c").is_ok());
        let err = TrelloClient::check_status(StatusCode::UNAUTHORIZED, "c").unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
        let err = TrelloClient::check_status(StatusCode::NOT_FOUND, "c").unwrap_err();
        assert_eq!(err.to_string(), "Card c not found");
    }
}
