use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use log::{debug, info};
use reqwest::Client;
use serde_json::{Value, json};

use crate::types::NotificationMessage;

const FCM_API: &str = "https://fcm.googleapis.com/v1/projects";
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

/// Delivers a notification to every subscriber of its topic.
pub trait MessagingGateway {
    fn send(&self, message: &NotificationMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Service account key JSON. Redacted in `Debug` output.
struct ServiceAccountKey(String);

impl ServiceAccountKey {
    fn from_env() -> Result<Self> {
        std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY")
            .map(Self)
            .context("GOOGLE_SERVICE_ACCOUNT_KEY env var not set")
    }

    fn service_account(&self) -> Result<CustomServiceAccount> {
        Ok(CustomServiceAccount::from_json(&self.0)?)
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ServiceAccountKey").field(&"..").finish()
    }
}

/// Firebase Cloud Messaging HTTP v1 client.
pub struct FcmClient {
    token_provider: Arc<dyn TokenProvider>,
    project_id: String,
    client: Client,
}

impl FcmClient {
    pub async fn from_env() -> Result<Self> {
        let service_account = ServiceAccountKey::from_env()?.service_account()?;

        let project_id = match std::env::var("FIREBASE_PROJECT_ID") {
            Ok(project_id) => project_id,
            Err(_) => service_account
                .project_id()
                .map(str::to_owned)
                .context("FIREBASE_PROJECT_ID env var not set and service account has no project")?,
        };
        debug!("Using Firebase project {project_id}");

        Ok(Self {
            token_provider: Arc::new(service_account),
            project_id,
            client: Client::new(),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let token = self.token_provider.token(SCOPES).await?;
        Ok(token.as_str().to_owned())
    }

    async fn send_authenticated(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.access_token().await?;
        Ok(req.bearer_auth(&token).send().await?.error_for_status()?)
    }

    fn send_url(&self) -> String {
        send_url(&self.project_id)
    }
}

impl MessagingGateway for FcmClient {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let response = self
            .send_authenticated(self.client.post(self.send_url()).json(&message_body(message)))
            .await?;
        let sent: Value = response.json().await?;
        debug!("FCM accepted message {}", sent["name"]);
        Ok(())
    }
}

/// Logs messages instead of delivering them.
#[derive(Debug, Default)]
pub struct DryRunGateway;

impl MessagingGateway for DryRunGateway {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        info!("[dry run] {}", message_body(message));
        Ok(())
    }
}

fn send_url(project_id: &str) -> String {
    format!("{}/{}/messages:send", FCM_API, project_id)
}

fn message_body(message: &NotificationMessage) -> Value {
    json!({
        "message": {
            "topic": message.topic,
            "notification": {
                "title": message.title,
                "body": message.body,
            }
        }
    })
}
