//! Outbound SMS through a third-party HTTP gateway.

use serde::{Deserialize, Serialize};

use crate::config::SmsConfig;
use crate::errors::AppError;

/// Longest message accepted (six concatenated GSM segments).
pub const MAX_MESSAGE_LEN: usize = 918;

/// Request body for `POST /sms/send-sms`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    #[serde(alias = "numbers", alias = "phoneNumbers")]
    pub to: Vec<String>,
    pub message: String,
}

/// What the gateway accepted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsReceipt {
    pub recipients: usize,
    /// Raw gateway response body, when it was JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_response: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct GatewayPayload<'a> {
    sender: &'a str,
    to: &'a [String],
    message: &'a str,
}

/// `+` followed by 7 to 15 digits, or just the digits.
pub fn is_valid_phone(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

impl SendSmsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.to.is_empty() {
            return Err("At least one recipient is required".to_string());
        }
        if let Some(bad) = self.to.iter().find(|n| !is_valid_phone(n.trim())) {
            return Err(format!("Invalid phone number '{}'", bad));
        }
        let length = self.message.chars().count();
        if self.message.trim().is_empty() {
            return Err("Message is required".to_string());
        }
        if length > MAX_MESSAGE_LEN {
            return Err(format!(
                "Message is {} characters; the limit is {}",
                length, MAX_MESSAGE_LEN
            ));
        }
        Ok(())
    }
}

/// Thin client for the SMS gateway.
pub struct SmsClient {
    http: reqwest::Client,
    config: SmsConfig,
}

impl SmsClient {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.gateway_url.is_some()
    }

    /// Forward one message to every recipient. Nothing is retried.
    pub async fn send(&self, recipients: &[String], message: &str) -> Result<SmsReceipt, AppError> {
        let Some(url) = self.config.gateway_url.as_deref() else {
            return Err(AppError::Internal(
                "SMS gateway is not configured".to_string(),
            ));
        };

        let to: Vec<String> = recipients.iter().map(|n| n.trim().to_string()).collect();
        let payload = GatewayPayload {
            sender: &self.config.sender_id,
            to: &to,
            message,
        };

        let mut request = self.http.post(url).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("SMS gateway unreachable: {}", e);
            AppError::Upstream("SMS gateway unreachable".to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("SMS gateway returned {}: {}", status, body);
            return Err(AppError::Upstream(format!(
                "SMS gateway rejected the message ({})",
                status
            )));
        }

        let gateway_response = response.json::<serde_json::Value>().await.ok();
        tracing::info!("SMS dispatched to {} recipient(s)", to.len());

        Ok(SmsReceipt {
            recipients: to.len(),
            gateway_response,
        })
    }
}
