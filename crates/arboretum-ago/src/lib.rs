//! Async client for the ArcGIS Online sharing REST API, narrowed to what
//! the publisher needs: token authentication, item lookup, and overwriting
//! hosted feature layers from CSV uploads.
//!
//! ArcGIS reports most failures as HTTP 200 with an `error` envelope in the
//! JSON body, so every response runs through the same envelope check.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct AgoConfig {
    pub org_url: String,
    pub username: String,
    pub password: String,
}

impl AgoConfig {
    pub fn new(
        org_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            org_url: org_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AgoError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("item '{0}' not found")]
    ItemNotFound(String),

    #[error("item '{0}' has no related source item to overwrite")]
    MissingSource(String),

    #[error("service error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Portal item metadata, as returned by `/content/items/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub owner: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct AgoClient {
    client: Client,
    org_url: String,
    username: String,
    token: String,
}

impl AgoClient {
    /// Authenticate against the portal and return a ready client. This is
    /// the only constructor, so no layer call can happen without a token.
    pub async fn connect(config: AgoConfig) -> Result<Self, AgoError> {
        for (label, value) in [
            ("org_url", &config.org_url),
            ("username", &config.username),
            ("password", &config.password),
        ] {
            if value.trim().is_empty() {
                return Err(AgoError::Configuration(format!("{label} cannot be empty")));
            }
        }

        let org_url = config.org_url.trim_end_matches('/').to_string();
        let client = Client::new();

        let params = [
            ("username", config.username.as_str()),
            ("password", config.password.as_str()),
            ("referer", org_url.as_str()),
            ("expiration", "60"),
            ("f", "json"),
        ];
        let response = client
            .post(format!("{org_url}/sharing/rest/generateToken"))
            .form(&params)
            .send()
            .await?;
        let body = parse_body(response).await?;

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| AgoError::Auth("generateToken returned no token".to_string()))?
            .to_string();

        info!("authenticated to {org_url} as {}", config.username);

        Ok(Self {
            client,
            org_url,
            username: config.username,
            token,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/sharing/rest{path}", self.org_url)
    }

    async fn get_json(&self, url: &str, extra: &[(&str, &str)]) -> Result<Value, AgoError> {
        let mut params: Vec<(&str, &str)> = vec![("f", "json"), ("token", self.token.as_str())];
        params.extend_from_slice(extra);
        let response = self.client.get(url).query(&params).send().await?;
        parse_body(response).await
    }

    async fn post_form(&self, url: &str, extra: &[(&str, &str)]) -> Result<Value, AgoError> {
        let mut params: Vec<(&str, &str)> = vec![("f", "json"), ("token", self.token.as_str())];
        params.extend_from_slice(extra);
        let response = self.client.post(url).form(&params).send().await?;
        parse_body(response).await
    }

    pub async fn get_item(&self, item_id: &str) -> Result<Item, AgoError> {
        let url = self.rest_url(&format!("/content/items/{item_id}"));
        let body = match self.get_json(&url, &[]).await {
            // The portal answers a missing item with a code-400 envelope.
            Err(AgoError::Api { code: 400, .. }) => {
                return Err(AgoError::ItemNotFound(item_id.to_string()))
            }
            other => other?,
        };
        serde_json::from_value(body)
            .map_err(|err| AgoError::UnexpectedResponse(format!("item {item_id}: {err}")))
    }

    /// The CSV item a hosted layer was published from. Hosted layers keep a
    /// `Service2Data` relationship to their source; the overwrite flow
    /// updates that source and republishes it.
    pub async fn related_source_item(&self, item_id: &str) -> Result<Item, AgoError> {
        let url = self.rest_url(&format!("/content/items/{item_id}/relatedItems"));
        let body = self
            .get_json(&url, &[("relationshipType", "Service2Data"), ("direction", "forward")])
            .await?;

        let related = body
            .get("relatedItems")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| AgoError::MissingSource(item_id.to_string()))?;

        serde_json::from_value(related)
            .map_err(|err| AgoError::UnexpectedResponse(format!("related item: {err}")))
    }

    pub async fn update_item_data(
        &self,
        owner: &str,
        item_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), AgoError> {
        let url = self.rest_url(&format!("/content/users/{owner}/items/{item_id}/update"));
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new()
            .part("file", part)
            .text("filename", file_name.to_string())
            .text("f", "json")
            .text("token", self.token.clone());

        let response = self.client.post(url).multipart(form).send().await?;
        let body = parse_body(response).await?;
        expect_success(&body)
    }

    pub async fn publish_overwrite(
        &self,
        owner: &str,
        source_item_id: &str,
        file_name: &str,
    ) -> Result<(), AgoError> {
        let url = self.rest_url(&format!("/content/users/{owner}/publish"));
        let publish_parameters =
            serde_json::json!({ "name": file_stem(file_name) }).to_string();
        let body = self
            .post_form(
                &url,
                &[
                    ("itemId", source_item_id),
                    ("fileType", "csv"),
                    ("overwrite", "true"),
                    ("publishParameters", publish_parameters.as_str()),
                ],
            )
            .await?;

        // publish answers per-service; a failed service carries its own
        // error object inside an HTTP 200.
        if let Some(error) = body
            .get("services")
            .and_then(Value::as_array)
            .and_then(|services| services.first())
            .and_then(|service| service.get("error"))
        {
            return Err(envelope_error(error));
        }
        Ok(())
    }

    pub async fn service_fields(&self, service_url: &str) -> Result<Vec<String>, AgoError> {
        let url = format!("{}/0", service_url.trim_end_matches('/'));
        let body = self.get_json(&url, &[]).await?;
        let fields = body
            .get("fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|field| field.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(fields)
    }

    /// Enable time on layer 0 of a hosted service, keyed on a time field.
    pub async fn enable_time(&self, service_url: &str, time_field: &str) -> Result<(), AgoError> {
        let admin = admin_layer_url(service_url)?;
        let definition = serde_json::json!({
            "timeInfo": {
                "timeField": time_field,
                "timeFormat": "esriTimeUnitsMinutes",
                "timeExtent": null,
            }
        })
        .to_string();

        let body = self
            .post_form(
                &format!("{admin}/0/updateDefinition"),
                &[("updateDefinition", definition.as_str())],
            )
            .await?;
        expect_success(&body)
    }

    /// Overwrite one hosted feature layer from CSV bytes: resolve the item,
    /// enable time when the layer exposes a `date` field, update the
    /// related source CSV, then republish it over the service.
    pub async fn overwrite_feature_layer(
        &self,
        item_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), AgoError> {
        let item = self.get_item(item_id).await?;

        if let Some(service_url) = item.url.as_deref() {
            if self
                .service_fields(service_url)
                .await?
                .iter()
                .any(|name| name == "date")
            {
                self.enable_time(service_url, "date").await?;
                info!("time enabled on '{}' via its date field", item.title);
            }
        }

        let source = self.related_source_item(item_id).await?;
        self.update_item_data(&item.owner, &source.id, file_name, bytes)
            .await?;
        self.publish_overwrite(&item.owner, &source.id, file_name)
            .await?;

        info!("overwrote '{}' ({item_id}) from {file_name}", item.title);
        Ok(())
    }
}

async fn parse_body(response: reqwest::Response) -> Result<Value, AgoError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgoError::UnexpectedResponse(format!("{status}: {body}")));
    }

    let body: Value = response.json().await?;
    if let Some(error) = body.get("error") {
        return Err(envelope_error(error));
    }
    Ok(body)
}

fn envelope_error(error: &Value) -> AgoError {
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string();

    // 498/499 are the portal's invalid/expired-token codes.
    if code == 498 || code == 499 || message.to_ascii_lowercase().contains("invalid username") {
        AgoError::Auth(message)
    } else {
        AgoError::Api { code, message }
    }
}

fn expect_success(body: &Value) -> Result<(), AgoError> {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(())
    } else {
        Err(AgoError::UnexpectedResponse(body.to_string()))
    }
}

fn admin_layer_url(service_url: &str) -> Result<String, AgoError> {
    const MARKER: &str = "/rest/services/";
    if !service_url.contains(MARKER) {
        return Err(AgoError::UnexpectedResponse(format!(
            "service URL '{service_url}' lacks {MARKER}"
        )));
    }
    Ok(service_url
        .trim_end_matches('/')
        .replacen(MARKER, "/rest/admin/services/", 1))
}

fn file_stem(file_name: &str) -> &str {
    file_name.strip_suffix(".csv").unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_maps_to_api_error() {
        let error = serde_json::json!({"code": 400, "message": "Item does not exist"});
        match envelope_error(&error) {
            AgoError::Api { code, message } => {
                assert_eq!(code, 400);
                assert_eq!(message, "Item does not exist");
            }
            other => panic!("expected Api error, got {other}"),
        }
    }

    #[test]
    fn token_codes_map_to_auth_errors() {
        for code in [498, 499] {
            let error = serde_json::json!({"code": code, "message": "Invalid token"});
            assert!(matches!(envelope_error(&error), AgoError::Auth(_)));
        }
        let error = serde_json::json!({"code": 400, "message": "Invalid username or password."});
        assert!(matches!(envelope_error(&error), AgoError::Auth(_)));
    }

    #[test]
    fn success_flag_is_required() {
        assert!(expect_success(&serde_json::json!({"success": true})).is_ok());
        assert!(expect_success(&serde_json::json!({"success": false})).is_err());
        assert!(expect_success(&serde_json::json!({})).is_err());
    }

    #[test]
    fn admin_url_swaps_in_the_admin_segment() {
        let url = "https://services.arcgis.com/abc123/arcgis/rest/services/TMS_Daily/FeatureServer";
        assert_eq!(
            admin_layer_url(url).unwrap(),
            "https://services.arcgis.com/abc123/arcgis/rest/admin/services/TMS_Daily/FeatureServer"
        );
    }

    #[test]
    fn admin_url_requires_the_services_segment() {
        assert!(admin_layer_url("https://example.org/nope").is_err());
    }

    #[test]
    fn item_deserializes_from_portal_json() {
        let body = serde_json::json!({
            "id": "aaaa1111",
            "title": "Dendrometer Averages",
            "type": "Feature Service",
            "owner": "dashboard_bot",
            "url": "https://services.arcgis.com/abc/arcgis/rest/services/Dendro/FeatureServer"
        });
        let item: Item = serde_json::from_value(body).unwrap();
        assert_eq!(item.item_type, "Feature Service");
        assert!(item.url.is_some());
    }

    #[test]
    fn publish_name_drops_the_csv_suffix() {
        assert_eq!(file_stem("Dendrometer_Average.csv"), "Dendrometer_Average");
        assert_eq!(file_stem("plain"), "plain");
    }
}
