//! Webhook subscriptions
//!
//! A subscription registers one callback URL for create, update and delete
//! events on a set of objects. The caller picks a `unique_ref`; subscribing
//! twice with the same ref updates the existing webhook instead of creating
//! a second one. The returned [`SubscribeResult`] is all a later delete
//! needs.

use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::jsonquery::JsonQuery;
use crate::template::{render, TemplateContext};
use crate::types::{JsonObject, JsonValue, Method};
use crate::url_builder::UrlBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// Definition
// ============================================================================

fn default_path() -> String {
    "webhooks".to_string()
}

fn default_id_path() -> String {
    "id".to_string()
}

fn default_ref_field() -> String {
    "uniqueRef".to_string()
}

fn default_url_field() -> String {
    "url".to_string()
}

fn default_events_field() -> String {
    "events".to_string()
}

fn default_event_format() -> String {
    "{object}.{event}".to_string()
}

fn default_update_method() -> Method {
    Method::PATCH
}

/// Webhook endpoints of a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WebhookDefinition {
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_id_path")]
    pub id_path: String,
    #[serde(default = "default_update_method")]
    pub update_method: Method,
    /// Key of the webhook array in list responses; a bare array when unset
    #[serde(default)]
    pub list_path: Option<String>,
    #[serde(default = "default_ref_field")]
    pub ref_field: String,
    #[serde(default = "default_url_field")]
    pub url_field: String,
    #[serde(default = "default_events_field")]
    pub events_field: String,
    /// Event name template over `{object}` and `{event}`
    #[serde(default = "default_event_format")]
    pub event_format: String,
    /// Body key for per-object watch fields; watch fields are dropped when unset
    #[serde(default)]
    pub watch_fields_field: Option<String>,
}

impl Default for WebhookDefinition {
    fn default() -> Self {
        Self {
            path: default_path(),
            id_path: default_id_path(),
            update_method: default_update_method(),
            list_path: None,
            ref_field: default_ref_field(),
            url_field: default_url_field(),
            events_field: default_events_field(),
            event_format: default_event_format(),
            watch_fields_field: None,
        }
    }
}

// ============================================================================
// Parameters & Results
// ============================================================================

/// Record change that triggers a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionEvent {
    Create,
    Update,
    Delete,
}

impl SubscriptionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Events wanted for one object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEvents {
    pub events: Vec<SubscriptionEvent>,
    /// Only report updates touching these fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub watch_fields: Vec<String>,
}

impl SubscriptionEvents {
    pub fn new(events: &[SubscriptionEvent]) -> Self {
        Self {
            events: events.to_vec(),
            watch_fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn watch<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.watch_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// Parameters of a subscribe call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeParams {
    pub object_events: BTreeMap<String, SubscriptionEvents>,
    pub webhook_url: String,
    /// Idempotency key chosen by the caller
    pub unique_ref: String,
}

impl SubscribeParams {
    pub fn new(webhook_url: impl Into<String>, unique_ref: impl Into<String>) -> Self {
        Self {
            object_events: BTreeMap::new(),
            webhook_url: webhook_url.into(),
            unique_ref: unique_ref.into(),
        }
    }

    #[must_use]
    pub fn object(mut self, name: impl Into<String>, events: SubscriptionEvents) -> Self {
        self.object_events.insert(name.into(), events);
        self
    }
}

/// Handle of a registered webhook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResult {
    pub id: String,
    pub unique_ref: String,
    pub object_events: BTreeMap<String, SubscriptionEvents>,
    pub raw: JsonValue,
}

// ============================================================================
// Subscriber
// ============================================================================

/// Subscription calls for one module
#[derive(Debug, Clone)]
pub struct Subscriber {
    client: HttpClient,
    base_url: String,
    vars: TemplateContext,
    def: WebhookDefinition,
}

impl Subscriber {
    /// Subscriber over a rendered module base URL
    pub fn new(
        client: HttpClient,
        base_url: impl Into<String>,
        vars: TemplateContext,
        def: WebhookDefinition,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            vars,
            def,
        }
    }

    fn collection_url(&self) -> Result<UrlBuilder> {
        let path = render(&self.def.path, &self.vars)?;
        if UrlBuilder::is_absolute(&path) {
            return UrlBuilder::parse(&path);
        }
        UrlBuilder::new(&self.base_url, &[&path])
    }

    fn webhook_url(&self, id: &str) -> Result<UrlBuilder> {
        let mut url = self.collection_url()?;
        url.push_segment(id)?;
        Ok(url)
    }

    fn body(&self, params: &SubscribeParams) -> Result<JsonValue> {
        let mut events = Vec::new();
        let mut watch = JsonObject::new();
        for (object, wanted) in &params.object_events {
            for event in &wanted.events {
                let vars = TemplateContext::from_strings([
                    ("object", object.as_str()),
                    ("event", event.as_str()),
                ]);
                events.push(JsonValue::String(render(&self.def.event_format, &vars)?));
            }
            if !wanted.watch_fields.is_empty() {
                watch.insert(object.clone(), JsonValue::from(wanted.watch_fields.clone()));
            }
        }

        let mut body = JsonObject::new();
        body.insert(
            self.def.url_field.clone(),
            JsonValue::String(params.webhook_url.clone()),
        );
        body.insert(
            self.def.ref_field.clone(),
            JsonValue::String(params.unique_ref.clone()),
        );
        body.insert(self.def.events_field.clone(), JsonValue::Array(events));
        if let Some(field) = &self.def.watch_fields_field {
            if !watch.is_empty() {
                body.insert(field.clone(), JsonValue::Object(watch));
            }
        }
        Ok(JsonValue::Object(body))
    }

    fn result(&self, params: &SubscribeParams, body: JsonValue, id: Option<&str>) -> Result<SubscribeResult> {
        let id = JsonQuery::new(&body)
            .id_optional(&self.def.id_path)
            .or_else(|| id.map(str::to_string))
            .ok_or_else(|| Error::missing_values("webhook response has no id"))?;
        Ok(SubscribeResult {
            id,
            unique_ref: params.unique_ref.clone(),
            object_events: params.object_events.clone(),
            raw: body,
        })
    }

    fn validate(params: &SubscribeParams) -> Result<()> {
        if params.webhook_url.is_empty() {
            return Err(Error::missing_field("webhook_url"));
        }
        if params.unique_ref.is_empty() {
            return Err(Error::missing_field("unique_ref"));
        }
        if params.object_events.values().all(|e| e.events.is_empty()) {
            return Err(Error::missing_values("no events requested"));
        }
        Ok(())
    }

    /// Find a webhook registered under `unique_ref`
    pub async fn find(&self, unique_ref: &str) -> Result<Option<String>> {
        let response = self
            .client
            .execute(&HttpRequest::get(self.collection_url()?))
            .await?;
        let body = response.json_or_null();
        let hooks = match &self.def.list_path {
            Some(path) => JsonQuery::new(&body).array_required(path)?.clone(),
            None => body.as_array().cloned().unwrap_or_default(),
        };
        Ok(hooks.iter().find_map(|hook| {
            let q = JsonQuery::new(hook);
            let matches = q
                .str_optional(&self.def.ref_field)
                .ok()
                .flatten()
                .is_some_and(|r| r == unique_ref);
            if matches {
                q.id_optional(&self.def.id_path)
            } else {
                None
            }
        }))
    }

    /// Register a webhook, or update the one already holding `unique_ref`
    pub async fn subscribe(&self, params: &SubscribeParams) -> Result<SubscribeResult> {
        Self::validate(params)?;
        if let Some(id) = self.find(&params.unique_ref).await? {
            debug!(id = %id, unique_ref = %params.unique_ref, "Webhook exists, updating");
            return self.update_by_id(params, &id).await;
        }

        let body = self.body(params)?;
        let response = self
            .client
            .execute(&HttpRequest::post(self.collection_url()?, body))
            .await?;
        self.result(params, response.json_or_null(), None)
    }

    /// Replace the events of an existing subscription
    pub async fn update_subscription(
        &self,
        params: &SubscribeParams,
        previous: &SubscribeResult,
    ) -> Result<SubscribeResult> {
        Self::validate(params)?;
        self.update_by_id(params, &previous.id).await
    }

    async fn update_by_id(&self, params: &SubscribeParams, id: &str) -> Result<SubscribeResult> {
        let req = HttpRequest::new(self.def.update_method, self.webhook_url(id)?)
            .with_body(self.body(params)?);
        let response = self.client.execute(&req).await?;
        self.result(params, response.json_or_null(), Some(id))
    }

    /// Remove a webhook; a missing one is `NotFound`
    pub async fn delete_subscription(&self, subscription: &SubscribeResult) -> Result<()> {
        let req = HttpRequest::new(Method::DELETE, self.webhook_url(&subscription.id)?);
        self.client.execute(&req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn subscriber(server: &MockServer) -> Subscriber {
        Subscriber::new(
            HttpClient::new().unwrap(),
            server.uri(),
            TemplateContext::new(),
            WebhookDefinition {
                list_path: Some("webhooks".into()),
                watch_fields_field: Some("watchFields".into()),
                ..Default::default()
            },
        )
    }

    fn params() -> SubscribeParams {
        SubscribeParams::new("https://hooks.example.com/in", "sync-1").object(
            "contacts",
            SubscriptionEvents::new(&[SubscriptionEvent::Create, SubscriptionEvent::Update])
                .watch(["email"]),
        )
    }

    #[tokio::test]
    async fn test_subscribe_creates_when_ref_is_new() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"webhooks": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhooks"))
            .and(body_json(json!({
                "url": "https://hooks.example.com/in",
                "uniqueRef": "sync-1",
                "events": ["contacts.create", "contacts.update"],
                "watchFields": {"contacts": ["email"]},
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let result = subscriber(&server).subscribe(&params()).await.unwrap();
        assert_eq!(result.id, "7");
        assert_eq!(result.unique_ref, "sync-1");
    }

    #[tokio::test]
    async fn test_subscribe_same_ref_updates_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "webhooks": [
                    {"id": "3", "uniqueRef": "other"},
                    {"id": "7", "uniqueRef": "sync-1"},
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/webhooks/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "7"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let result = subscriber(&server).subscribe(&params()).await.unwrap();
        assert_eq!(result.id, "7");
    }

    #[tokio::test]
    async fn test_delete_subscription_missing_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/7"))
            .respond_with(ResponseTemplate::new(204))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/webhooks/7"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sub = subscriber(&server);
        let handle = SubscribeResult {
            id: "7".into(),
            unique_ref: "sync-1".into(),
            object_events: BTreeMap::new(),
            raw: JsonValue::Null,
        };
        sub.delete_subscription(&handle).await.unwrap();
        let err = sub.delete_subscription(&handle).await.unwrap_err();
        assert!(err.is(ErrorKind::NotFound));
    }

    #[test]
    fn test_validate_requires_events() {
        let empty = SubscribeParams::new("https://hooks.example.com/in", "sync-1")
            .object("contacts", SubscriptionEvents::default());
        assert!(Subscriber::validate(&empty).is_err());
        assert!(Subscriber::validate(&SubscribeParams::new("", "r")).is_err());
        assert!(Subscriber::validate(&params()).is_ok());
    }
}
