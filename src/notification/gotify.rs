use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{check_status, NotificationProvider, NotifyError, NotifyResult};
use crate::config::GotifyConfig;

const DEFAULT_PRIORITY: u8 = 5;

#[derive(Debug, Serialize)]
struct GotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    priority: u8,
}

/// Pushes to a Gotify server application
#[derive(Debug, Clone)]
pub struct GotifyProvider {
    client: Client,
    url: String,
    app_token: String,
    priority: u8,
}

impl GotifyProvider {
    pub fn new(client: Client, config: &GotifyConfig) -> Self {
        Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            app_token: config.app_token.clone(),
            priority: config
                .priority
                .filter(|p| (1..=5).contains(p))
                .unwrap_or(DEFAULT_PRIORITY),
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    fn misconfigured(&self, message: &str) -> NotifyError {
        NotifyError::Misconfigured {
            provider: self.name(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl NotificationProvider for GotifyProvider {
    fn name(&self) -> &'static str {
        "gotify"
    }

    async fn send(&self, title: &str, message: &str) -> NotifyResult<()> {
        if self.url.is_empty() {
            return Err(self.misconfigured("gotify URL is required"));
        }
        if self.app_token.is_empty() {
            return Err(self.misconfigured("gotify app token is required"));
        }

        let response = self
            .client
            .post(format!("{}/message", self.url))
            .query(&[("token", self.app_token.as_str())])
            .json(&GotifyMessage {
                title,
                message,
                priority: self.priority,
            })
            .send()
            .await
            .map_err(|source| NotifyError::Request {
                provider: self.name(),
                source,
            })?;

        check_status(self.name(), &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[test]
    fn test_default_priority() {
        let provider = GotifyProvider::new(Client::new(), &GotifyConfig::default());
        assert_eq!(provider.priority(), 5);
    }

    #[tokio::test]
    async fn test_send_posts_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/message")
            .match_query(Matcher::UrlEncoded("token".to_string(), "app123".to_string()))
            .match_body(Matcher::Json(json!({
                "title": "forgesync summary",
                "message": "body",
                "priority": 2
            })))
            .with_status(200)
            .create_async()
            .await;

        let provider = GotifyProvider::new(
            Client::new(),
            &GotifyConfig {
                url: server.url(),
                app_token: "app123".to_string(),
                priority: Some(2),
            },
        );

        provider.send("forgesync summary", "body").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_requires_token() {
        let provider = GotifyProvider::new(
            Client::new(),
            &GotifyConfig {
                url: "https://gotify.example.com".to_string(),
                ..GotifyConfig::default()
            },
        );
        let err = provider.send("t", "m").await.unwrap_err();
        assert_eq!(err.to_string(), "gotify: gotify app token is required");
    }
}
