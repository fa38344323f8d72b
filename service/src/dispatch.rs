//! JSON-lines request dispatch
//!
//! Every input line is an envelope `{"id", "kind", "payload"}`. Lines are
//! scored concurrently on the blocking pool (the scorers are CPU-bound)
//! and the replies are written back in input order. A request holds its
//! semaphore permit until its reply is written, so the semaphore bounds
//! running and queued replies together.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;

use senior_ml_core::{ErrorResponse, ScoringService, ServiceError, ServiceResult, VERSION};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Anomaly,
    Health,
    JobRisk,
    Matching,
    Status,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    pub kind: RequestKind,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

impl Reply {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, error: &ServiceError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error.to_response()),
        }
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> ServiceResult<T> {
    serde_json::from_value(payload).map_err(|e| ServiceError::Payload(e.to_string()))
}

fn encode<T: Serialize>(response: &T) -> ServiceResult<Value> {
    serde_json::to_value(response).map_err(|e| ServiceError::Internal(e.to_string()))
}

/// Routes envelopes to the scoring service
#[derive(Debug, Clone)]
pub struct Dispatcher {
    service: Arc<ScoringService>,
    service_name: Arc<str>,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(service: Arc<ScoringService>, settings: &Settings) -> Self {
        Self {
            service,
            service_name: Arc::from(settings.service_name.as_str()),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_requests)),
        }
    }

    fn route(&self, envelope: Envelope) -> ServiceResult<Value> {
        match envelope.kind {
            RequestKind::Anomaly => encode(&self.service.detect_anomalies(&decode(envelope.payload)?)?),
            RequestKind::Health => encode(&self.service.health_score(&decode(envelope.payload)?)?),
            RequestKind::JobRisk => encode(&self.service.job_risk(&decode(envelope.payload)?)?),
            RequestKind::Matching => encode(&self.service.matching_score(&decode(envelope.payload)?)?),
            RequestKind::Status => Ok(json!({
                "status": "ok",
                "service": &*self.service_name,
                "version": VERSION,
            })),
        }
    }

    /// Handle one raw line synchronously
    pub fn handle_line(&self, line: &str) -> Reply {
        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => return Reply::failure(None, &ServiceError::Payload(e.to_string())),
        };
        let id = raw.get("id").cloned().filter(|id| !id.is_null());

        let envelope: Envelope = match decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => return Reply::failure(id, &e),
        };
        debug!("Dispatching {:?} request id={:?}", envelope.kind, id);

        match self.route(envelope) {
            Ok(result) => Reply::success(id, result),
            Err(e) => {
                warn!("Request id={:?} failed with {}: {}", id, e.error_code(), e);
                Reply::failure(id, &e)
            }
        }
    }

    /// Handle one line on the blocking pool; the permit travels with the reply
    fn spawn_line(&self, line: String, permit: OwnedSemaphorePermit) -> JoinHandle<(Reply, OwnedSemaphorePermit)> {
        let dispatcher = self.clone();
        tokio::task::spawn_blocking(move || (dispatcher.handle_line(&line), permit))
    }

    async fn write_reply<W>(
        writer: &mut W,
        joined: Result<(Reply, OwnedSemaphorePermit), tokio::task::JoinError>,
    ) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        // released only once the reply has left
        let (reply, _permit) = match joined {
            Ok((reply, permit)) => (reply, Some(permit)),
            Err(e) => (
                Reply::failure(None, &ServiceError::Internal(format!("request task failed: {}", e))),
                None,
            ),
        };
        let mut line = serde_json::to_vec(&reply).map_err(io::Error::from)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await
    }

    /// Process every line of `reader`, writing replies in input order.
    /// Returns the number of replies written.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut pending: VecDeque<JoinHandle<(Reply, OwnedSemaphorePermit)>> = VecDeque::new();
        let mut written = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            // no free permit: flush the oldest reply to release one
            let permit = loop {
                match Arc::clone(&self.permits).try_acquire_owned() {
                    Ok(permit) => break permit,
                    Err(TryAcquireError::NoPermits) => match pending.pop_front() {
                        Some(handle) => {
                            Self::write_reply(&mut writer, handle.await).await?;
                            written += 1;
                        }
                        None => {
                            break Arc::clone(&self.permits)
                                .acquire_owned()
                                .await
                                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                        }
                    },
                    Err(TryAcquireError::Closed) => {
                        return Err(io::Error::new(io::ErrorKind::Other, "request permits closed"))
                    }
                }
            };
            pending.push_back(self.spawn_line(line, permit));

            while pending.front().map_or(false, |h| h.is_finished()) {
                if let Some(handle) = pending.pop_front() {
                    Self::write_reply(&mut writer, handle.await).await?;
                    written += 1;
                }
            }
        }

        while let Some(handle) = pending.pop_front() {
            Self::write_reply(&mut writer, handle.await).await?;
            written += 1;
        }

        Ok(written)
    }
}
