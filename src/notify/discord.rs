//! Discord bot sink (REST, no gateway connection)

use async_trait::async_trait;
use serde_json::json;

use crate::config::constants::http_timeout;
use crate::config::DiscordConfig;
use crate::notify::{Notifier, NotifyError, NotifyResult};

const DISCORD_API: &str = "https://discord.com";

/// Discord rejects message content above this many characters
const MAX_MESSAGE_CHARS: usize = 2000;

pub struct DiscordNotifier {
    base_url: String,
    token: String,
    channel_id: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(config: &DiscordConfig) -> NotifyResult<Self> {
        Self::with_base_url(config, DISCORD_API)
    }

    pub fn with_base_url(config: &DiscordConfig, base_url: &str) -> NotifyResult<Self> {
        if config.token.is_empty() || config.channel_id.is_empty() {
            return Err(NotifyError::InvalidSetup(
                "DISCORD_TOKEN and DISCORD_CHANNEL_ID are required".to_string(),
            ));
        }
        let client = reqwest::Client::builder().timeout(http_timeout()).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            channel_id: config.channel_id.clone(),
            client,
        })
    }

    async fn post(&self, channel: &str, content: &str) -> NotifyResult<()> {
        let url = format!("{}/api/v10/channels/{}/messages", self.base_url, channel);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected { status: status.as_u16(), body })
    }
}

/// Split on line boundaries so each part fits one Discord message
pub fn split_message(message: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    for line in message.lines() {
        let mut line = line;
        while line.chars().count() > limit {
            let cut = line
                .char_indices()
                .nth(limit)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            parts.push(line[..cut].to_string());
            line = &line[cut..];
        }
        if !current.is_empty() && current.chars().count() + 1 + line.chars().count() > limit {
            parts.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, destination: &str, message: &str) -> NotifyResult<()> {
        for part in split_message(message, MAX_MESSAGE_CHARS) {
            self.post(destination, &part).await?;
        }
        tracing::debug!(channel = destination, "Discord message sent");
        Ok(())
    }

    fn operator_destination(&self) -> &str {
        &self.channel_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config() -> DiscordConfig {
        DiscordConfig {
            token: "bot-token".to_string(),
            channel_id: "42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_bot_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v10/channels/42/messages")
            .match_header("authorization", "Bot bot-token")
            .match_body(Matcher::Json(json!({ "content": "NULS 17% difference" })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let notifier = DiscordNotifier::with_base_url(&config(), &server.url()).unwrap();
        notifier.send("42", "NULS 17% difference").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v10/channels/7/messages")
            .with_status(403)
            .with_body(r#"{"message":"Missing Access"}"#)
            .create_async()
            .await;

        let notifier = DiscordNotifier::with_base_url(&config(), &server.url()).unwrap();
        let result = notifier.send("7", "hello").await;
        assert!(matches!(result, Err(NotifyError::Rejected { status: 403, .. })));
    }

    #[test]
    fn test_missing_token_is_invalid_setup() {
        let mut cfg = config();
        cfg.token.clear();
        assert!(matches!(DiscordNotifier::new(&cfg), Err(NotifyError::InvalidSetup(_))));
    }

    #[test]
    fn test_operator_destination_is_configured_channel() {
        let notifier = DiscordNotifier::new(&config()).unwrap();
        assert_eq!(notifier.operator_destination(), "42");
    }

    #[test]
    fn test_split_message_on_lines() {
        let parts = split_message("aaaa\nbbbb\ncc", 9);
        assert_eq!(parts, vec!["aaaa\nbbbb".to_string(), "cc".to_string()]);
    }

    #[test]
    fn test_split_message_long_line() {
        let parts = split_message("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }
}
