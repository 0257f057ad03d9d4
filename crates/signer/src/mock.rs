//! Scripted custodial provider for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::custodial::{CustodialApi, CustodialError, SignatureMaterial};
use crate::poll::RemoteStatus;

/// Replays a fixed sequence of statuses, one per poll.
///
/// Once the script runs out every further poll reports `Pending`.
#[derive(Debug)]
pub struct ScriptedApi {
    script: Mutex<VecDeque<RemoteStatus<SignatureMaterial>>>,
    create_error: Option<String>,
    status_error: Option<(StatusCode, String)>,
    created: Mutex<Vec<Vec<u8>>>,
    status_calls: AtomicU32,
}

impl ScriptedApi {
    pub fn new(script: Vec<RemoteStatus<SignatureMaterial>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            create_error: None,
            status_error: None,
            created: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
        }
    }

    /// Provider whose create call always fails with `message`.
    pub fn failing_create(message: impl Into<String>) -> Self {
        Self {
            create_error: Some(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Provider that accepts requests but answers every status query with
    /// an HTTP error.
    pub fn failing_status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status_error: Some((status, body.into())),
            ..Self::new(Vec::new())
        }
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn created_payloads(&self) -> Vec<Vec<u8>> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CustodialApi for ScriptedApi {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    async fn create_signature_request(&self, payload: &[u8]) -> Result<String, CustodialError> {
        if let Some(message) = &self.create_error {
            return Err(CustodialError::Provider(message.clone()));
        }

        let mut created = self
            .created
            .lock()
            .map_err(|e| CustodialError::Provider(e.to_string()))?;
        created.push(payload.to_vec());

        Ok(format!("scripted-{}", created.len()))
    }

    async fn signature_status(
        &self,
        _request_id: &str,
    ) -> Result<RemoteStatus<SignatureMaterial>, CustodialError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((status, body)) = &self.status_error {
            return Err(CustodialError::Api {
                status: *status,
                body: body.clone(),
            });
        }

        let mut script = self
            .script
            .lock()
            .map_err(|e| CustodialError::Provider(e.to_string()))?;

        Ok(script.pop_front().unwrap_or(RemoteStatus::Pending))
    }
}
