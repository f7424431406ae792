use async_trait::async_trait;
use reqwest::Client;

use super::{check_status, NotificationProvider, NotifyError, NotifyResult};
use crate::config::NtfyConfig;

const DEFAULT_SERVER: &str = "https://ntfy.sh";
const DEFAULT_PRIORITY: u8 = 3;
const TAG: &str = "forgesync";

/// Publishes to an ntfy topic
#[derive(Debug, Clone)]
pub struct NtfyProvider {
    client: Client,
    server: String,
    topic: String,
    priority: u8,
    tags: Vec<String>,
    credentials: Option<(String, String)>,
}

impl NtfyProvider {
    pub fn new(client: Client, config: &NtfyConfig) -> Self {
        let server = config
            .server
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER)
            .trim_end_matches('/')
            .to_string();

        let priority = config
            .priority
            .filter(|p| (1..=5).contains(p))
            .unwrap_or(DEFAULT_PRIORITY);

        let mut tags = config.tags.clone();
        if !tags.iter().any(|t| t == TAG) {
            tags.push(TAG.to_string());
        }

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.clone(), pass.clone()))
            }
            _ => None,
        };

        Self {
            client,
            server,
            topic: config.topic.clone(),
            priority,
            tags,
            credentials,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.server, self.topic)
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

#[async_trait]
impl NotificationProvider for NtfyProvider {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, title: &str, message: &str) -> NotifyResult<()> {
        if self.topic.is_empty() {
            return Err(NotifyError::Misconfigured {
                provider: self.name(),
                message: "ntfy topic is required".to_string(),
            });
        }

        let mut request = self
            .client
            .post(self.endpoint())
            .header("Title", title)
            .header("Priority", self.priority.to_string())
            .header("Tags", self.tags.join(","))
            .body(message.to_string());

        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(|source| NotifyError::Request {
            provider: self.name(),
            source,
        })?;

        check_status(self.name(), &response)
    }
}
