//! Firebase Realtime Database over its REST and streaming APIs.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::sse::{SseDecoder, SseEvent};
use super::{tree, RemoteStore, StoreError, StoreEvent, StorePath, StoreResult, Subscription};
use crate::auth::AccessTokenSource;
use crate::config::normalize_database_url;
use crate::util::compact_text;

#[derive(Clone)]
pub struct FirebaseRealtimeStore<T> {
    database_url: String,
    client: Client,
    tokens: T,
}

impl<T: AccessTokenSource> FirebaseRealtimeStore<T> {
    pub fn new(database_url: impl Into<String>, tokens: T) -> StoreResult<Self> {
        let database_url =
            normalize_database_url(database_url.into()).map_err(StoreError::InvalidConfiguration)?;
        Ok(Self {
            database_url,
            client: Client::builder().build()?,
            tokens,
        })
    }

    fn url(&self, path: &StorePath) -> String {
        format!("{}/{}.json", self.database_url, path.to_url_path())
    }

    async fn authorized(&self, request: RequestBuilder) -> StoreResult<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request.query(&[("auth", token)]))
    }
}

impl<T: AccessTokenSource> RemoteStore for FirebaseRealtimeStore<T> {
    async fn write(&self, path: &StorePath, value: Value) -> StoreResult<()> {
        let request = self
            .authorized(self.client.put(self.url(path)).json(&value))
            .await?;
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        let request = self.authorized(self.client.delete(self.url(path))).await?;
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> StoreResult<Subscription> {
        let request = self
            .authorized(
                self.client
                    .get(self.url(path))
                    .header(reqwest::header::ACCEPT, "text/event-stream"),
            )
            .await?;
        let response = ensure_success(request.send().await?).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let listened = path.clone();
        let task = tokio::spawn(async move {
            pump_event_stream(response, sender, &listened).await;
        });
        tracing::debug!(path = %path, "Attached realtime listener");
        Ok(Subscription::with_task(path.clone(), receiver, task))
    }
}

/// Reads the event stream until it ends, the receiver goes away, or the
/// server cancels the listener.
async fn pump_event_stream(
    mut response: Response,
    sender: mpsc::UnboundedSender<StoreEvent>,
    path: &StorePath,
) {
    let mut decoder = SseDecoder::new();
    let mut mirror = StreamMirror::default();

    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                tracing::debug!(path = %path, "Realtime stream ended");
                return;
            }
            Err(error) => {
                let _ = sender.send(StoreEvent::Error(error.to_string()));
                return;
            }
        };

        for event in decoder.push(&chunk) {
            match mirror.apply(&event) {
                Ok(Some(snapshot)) => {
                    if sender.send(StoreEvent::Snapshot(snapshot)).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(message) => {
                    let _ = sender.send(StoreEvent::Error(message));
                    return;
                }
            }
        }
    }
}

/// Local copy of the subscribed subtree, rebuilt from `put`/`patch` deltas so
/// every emitted event is a full snapshot.
#[derive(Debug, Default)]
struct StreamMirror {
    root: Value,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

impl StreamMirror {
    fn apply(&mut self, event: &SseEvent) -> Result<Option<Vec<(String, Value)>>, String> {
        match event.event.as_str() {
            "put" | "patch" => {
                let payload: StreamPayload = serde_json::from_str(&event.data)
                    .map_err(|error| format!("malformed {} event: {error}", event.event))?;
                let segments = relative_segments(&payload.path);
                if event.event == "put" {
                    tree::set(&mut self.root, &segments, payload.data);
                } else {
                    match payload.data {
                        Value::Object(children) => tree::merge(&mut self.root, &segments, children),
                        other => tree::set(&mut self.root, &segments, other),
                    }
                }
                Ok(Some(tree::children(&self.root, &[])))
            }
            "cancel" => Err(format!(
                "listener cancelled by server: {}",
                event.data.trim_matches('"')
            )),
            "auth_revoked" => Err("listener auth token was revoked".to_string()),
            _ => Ok(None),
        }
    }
}

fn relative_segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

async fn ensure_success(response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(StoreError::Rejected(message))
    } else {
        Err(StoreError::Api(message))
    }
}

#[derive(Debug, Deserialize)]
struct DatabaseErrorResponse {
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<DatabaseErrorResponse>(body) {
        if let Some(message) = payload.error {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use pretty_assertions::assert_eq;

    fn event(name: &str, data: Value) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    fn keys(snapshot: &[(String, Value)]) -> Vec<&str> {
        snapshot.iter().map(|(key, _)| key.as_str()).collect()
    }

    #[test]
    fn initial_put_yields_full_snapshot() {
        let mut mirror = StreamMirror::default();
        let snapshot = mirror
            .apply(&event(
                "put",
                json!({"path": "/", "data": {"200": {"title": "B"}, "100": {"title": "A"}}}),
            ))
            .unwrap()
            .unwrap();
        assert_eq!(keys(&snapshot), vec!["100", "200"]);
    }

    #[test]
    fn child_put_is_folded_into_full_snapshot() {
        let mut mirror = StreamMirror::default();
        mirror
            .apply(&event("put", json!({"path": "/", "data": {"100": {"title": "A"}}})))
            .unwrap();
        let snapshot = mirror
            .apply(&event("put", json!({"path": "/200", "data": {"title": "B"}})))
            .unwrap()
            .unwrap();
        assert_eq!(keys(&snapshot), vec!["100", "200"]);

        let snapshot = mirror
            .apply(&event("put", json!({"path": "/100", "data": null})))
            .unwrap()
            .unwrap();
        assert_eq!(keys(&snapshot), vec!["200"]);
    }

    #[test]
    fn patch_merges_children() {
        let mut mirror = StreamMirror::default();
        mirror
            .apply(&event("put", json!({"path": "/", "data": {"100": {"title": "A", "body": "a"}}})))
            .unwrap();
        let snapshot = mirror
            .apply(&event("patch", json!({"path": "/100", "data": {"title": "A2"}})))
            .unwrap()
            .unwrap();
        assert_eq!(snapshot[0].1, json!({"title": "A2", "body": "a"}));
    }

    #[test]
    fn empty_location_yields_empty_snapshot() {
        let mut mirror = StreamMirror::default();
        let snapshot = mirror
            .apply(&event("put", json!({"path": "/", "data": null})))
            .unwrap()
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn keep_alive_is_ignored_and_cancel_is_an_error() {
        let mut mirror = StreamMirror::default();
        assert_eq!(mirror.apply(&event("keep-alive", Value::Null)).unwrap(), None);
        let error = mirror
            .apply(&event("cancel", json!("Permission denied")))
            .unwrap_err();
        assert!(error.contains("Permission denied"));
        assert!(mirror.apply(&event("auth_revoked", Value::Null)).is_err());
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let mut mirror = StreamMirror::default();
        let bad = SseEvent {
            event: "put".to_string(),
            data: "not json".to_string(),
        };
        assert!(mirror.apply(&bad).is_err());
    }

    #[test]
    fn parse_api_error_reads_database_error_body() {
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, r#"{"error":"Permission denied"}"#),
            "Permission denied (401)"
        );
        assert_eq!(parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, " "), "HTTP 500");
    }
}
