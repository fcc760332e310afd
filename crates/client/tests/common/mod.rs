//! Scripted transport shared by the pipeline tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tether_client::{Client, ClientConfig, SequentialIds, Transport, TransportError, TransportRequest, TransportResponse};
use tether_core::{Backoff, RetrySettings};

/// What the transport does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    /// JSON response after an optional delay (cut short by cancellation).
    Json { status: u16, body: Value, delay: Duration },
    /// Transport-level failure.
    Fail(String),
    /// Never answers; returns only when the attempt is aborted.
    Hang,
}

impl Step {
    pub fn ok(body: Value) -> Self {
        Step::Json { status: 200, body, delay: Duration::ZERO }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Step::Json { status, body, delay: Duration::ZERO }
    }

    pub fn slow(body: Value, delay: Duration) -> Self {
        Step::Json { status: 200, body, delay }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Plays back steps in order; the last step repeats once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: Mutex<Vec<Call>>,
    aborted: Mutex<usize>,
}

impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into_iter().collect()), ..Default::default() })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn aborted(&self) -> usize {
        *self.aborted.lock()
    }

    fn next_step(&self) -> Step {
        let step = self.steps.lock().pop_front();
        let mut last = self.last.lock();
        match step {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().unwrap_or(Step::Fail("script exhausted".into())),
        }
    }

    fn abort(&self) -> Result<TransportResponse, TransportError> {
        *self.aborted.lock() += 1;
        Err(TransportError::Aborted)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self, request: TransportRequest, cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().push(Call {
            at: Instant::now(),
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.as_ref().map(|b| b.to_vec()),
        });

        match self.next_step() {
            Step::Json { status, body, delay } => {
                if !delay.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => return self.abort(),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Ok(TransportResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    body: body.to_string().into(),
                })
            }
            Step::Fail(message) => Err(TransportError::Network(message)),
            Step::Hang => {
                cancel.cancelled().await;
                self.abort()
            }
        }
    }
}

pub const BASE_URL: &str = "https://api.example.com";

pub fn config(attempts: u32, backoff: Backoff, initial_delay_ms: u64) -> ClientConfig {
    ClientConfig {
        base_url: Some(BASE_URL.into()),
        retry: RetrySettings { attempts, backoff, initial_delay_ms, max_delay_ms: None },
        ..Default::default()
    }
}

/// Client over `transport` with a single attempt and sequential ids.
pub fn client(transport: &Arc<ScriptedTransport>) -> Client {
    Client::builder(config(1, Backoff::Linear, 0))
        .shared_transport(transport.clone())
        .id_generator(SequentialIds::new("req"))
        .build()
        .unwrap()
}
