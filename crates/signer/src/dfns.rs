//! DFNS wallet signature API client.

use alloy::hex;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::custodial::{CustodialApi, CustodialError, SignatureMaterial};
use crate::poll::RemoteStatus;

/// Credentials and routing for one DFNS wallet.
#[derive(Clone, Deserialize)]
pub struct DfnsCtx {
    pub base_url: Url,
    pub app_id: String,
    pub auth_token: String,
    pub wallet_id: String,
}

impl std::fmt::Debug for DfnsCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfnsCtx")
            .field("base_url", &self.base_url.as_str())
            .field("app_id", &self.app_id)
            .field("auth_token", &"[REDACTED]")
            .field("wallet_id", &self.wallet_id)
            .finish()
    }
}

#[derive(Serialize)]
struct GenerateSignatureBody<'a> {
    kind: &'static str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureResponse {
    id: Option<String>,
    status: String,
    signature: Option<SignatureComponents>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignatureComponents {
    r: String,
    s: String,
}

pub struct DfnsClient {
    client: Client,
    ctx: DfnsCtx,
}

impl std::fmt::Debug for DfnsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DfnsClient")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl DfnsClient {
    pub fn new(ctx: DfnsCtx) -> Self {
        Self {
            client: Client::new(),
            ctx,
        }
    }

    fn signatures_url(&self) -> String {
        format!(
            "{}/wallets/{}/signatures",
            self.ctx.base_url.as_str().trim_end_matches('/'),
            self.ctx.wallet_id
        )
    }

    async fn check(response: Response) -> Result<Response, CustodialError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(CustodialError::Api { status, body })
    }
}

fn classify(response: SignatureResponse) -> Result<RemoteStatus<SignatureMaterial>, CustodialError> {
    match response.status.as_str() {
        "Pending" | "Executing" => Ok(RemoteStatus::Pending),
        "Signed" | "Confirmed" => match response.signature {
            Some(SignatureComponents { r, s }) => {
                Ok(RemoteStatus::Signed(SignatureMaterial::Components { r, s }))
            }
            // Signed but the signature has not been attached yet.
            None => Ok(RemoteStatus::Pending),
        },
        "Failed" | "Rejected" => Ok(RemoteStatus::Failed(
            response.reason.unwrap_or(response.status),
        )),
        other => Err(CustodialError::UnknownStatus(other.to_string())),
    }
}

#[async_trait]
impl CustodialApi for DfnsClient {
    fn provider(&self) -> &'static str {
        "dfns"
    }

    async fn create_signature_request(&self, payload: &[u8]) -> Result<String, CustodialError> {
        let message = format!("0x{}", hex::encode(payload));
        let body = GenerateSignatureBody {
            kind: "Message",
            message: &message,
        };

        let response = self
            .client
            .post(self.signatures_url())
            .bearer_auth(&self.ctx.auth_token)
            .header("x-dfns-appid", &self.ctx.app_id)
            .json(&body)
            .send()
            .await?;

        let created: SignatureResponse = Self::check(response).await?.json().await?;
        let id = created.id.ok_or(CustodialError::MissingRequestId)?;

        debug!(wallet_id = %self.ctx.wallet_id, signature_id = %id, "DFNS signature requested");

        Ok(id)
    }

    async fn signature_status(
        &self,
        request_id: &str,
    ) -> Result<RemoteStatus<SignatureMaterial>, CustodialError> {
        let response = self
            .client
            .get(format!("{}/{request_id}", self.signatures_url()))
            .bearer_auth(&self.ctx.auth_token)
            .header("x-dfns-appid", &self.ctx.app_id)
            .send()
            .await?;

        let status: SignatureResponse = Self::check(response).await?.json().await?;
        classify(status)
    }
}
