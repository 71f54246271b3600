use std::collections::BTreeMap;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::models::{Profile, User};
use crate::resource::{Draft, Payload, Resource};

// --- Seams ---

/// CRUD calls for one resource kind. Failures surface immediately; nothing
/// here retries.
pub trait ResourceApi<R: Resource> {
    fn list(&self) -> Result<Vec<R>, ApiError>;
    fn get(&self, id: i64) -> Result<R, ApiError>;
    fn create(&self, draft: &R::Draft) -> Result<Value, ApiError>;
    fn update(&self, id: i64, draft: &R::Draft) -> Result<Value, ApiError>;
    fn delete(&self, id: i64) -> Result<(), ApiError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub user: Option<User>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    pub career_goals: String,
}

pub trait AuthApi {
    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisterResponse, ApiError>;
    fn profile(&self) -> Result<Profile, ApiError>;
    fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError>;
}

// --- HTTP client ---

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    errors: Option<Value>,
}

/// Shared HTTP plumbing for every endpoint under one base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jobtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn resource<R: Resource>(&self) -> HttpResource<R> {
        HttpResource {
            api: self.clone(),
            _kind: PhantomData,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| ApiError::NetworkOrServer(e.to_string()))?;
        let status = response.status();
        debug!(url = %response.url(), %status, "api response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let err = error_for_status(status, &body);
        warn!(%status, "api call failed: {err}");
        Err(err)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path)))?;
        decode(response)
    }

    fn with_payload(&self, request: RequestBuilder, payload: &Payload) -> Result<RequestBuilder, ApiError> {
        if payload.is_multipart() {
            Ok(request.multipart(multipart_form(payload)?))
        } else {
            Ok(request.json(&payload.fields))
        }
    }
}

/// Maps a non-success status and its body onto the error taxonomy.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
            let message = parsed
                .as_ref()
                .and_then(|b| b.message.clone().or_else(|| b.error.clone()))
                .unwrap_or_else(|| "The server rejected the submitted data.".to_string());
            let fields = parsed
                .and_then(|b| b.errors)
                .map(field_errors)
                .unwrap_or_default();
            ApiError::ValidationRejected { message, fields }
        }
        _ => ApiError::NetworkOrServer(format!("server responded with {}", status)),
    }
}

/// Accepts `{"field": "reason"}` as well as `[{"field"|"path": .., "message"|"msg": ..}]`.
fn field_errors(errors: Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    match errors {
        Value::Object(map) => {
            for (field, reason) in map {
                let reason = match reason {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                fields.insert(field, reason);
            }
        }
        Value::Array(items) => {
            for item in items {
                let field = item
                    .get("field")
                    .or_else(|| item.get("path"))
                    .and_then(Value::as_str);
                let reason = item
                    .get("message")
                    .or_else(|| item.get("msg"))
                    .and_then(Value::as_str);
                if let (Some(field), Some(reason)) = (field, reason) {
                    fields.insert(field.to_string(), reason.to_string());
                }
            }
        }
        _ => {}
    }
    fields
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json()
        .map_err(|e| ApiError::NetworkOrServer(format!("undecodable response: {}", e)))
}

/// Body of a mutation response; an empty body decodes as `null`.
fn decode_value(response: Response) -> Result<Value, ApiError> {
    let text = response
        .text()
        .map_err(|e| ApiError::NetworkOrServer(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|e| ApiError::NetworkOrServer(format!("undecodable response: {}", e)))
}

fn multipart_form(payload: &Payload) -> Result<multipart::Form, ApiError> {
    let mut form = multipart::Form::new();
    for (name, value) in &payload.fields {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        form = form.text(name.clone(), text);
    }
    for attachment in &payload.attachments {
        form = form.file(attachment.field, &attachment.path).map_err(|e| {
            let mut fields = BTreeMap::new();
            fields.insert(attachment.field.to_string(), e.to_string());
            ApiError::ValidationRejected {
                message: format!("Cannot read {}", attachment.path.display()),
                fields,
            }
        })?;
    }
    Ok(form)
}

/// `ResourceApi` over HTTP for the kind `R`, at `/api/{R::PATH}`.
#[derive(Debug, Clone)]
pub struct HttpResource<R> {
    api: ApiClient,
    _kind: PhantomData<R>,
}

impl<R: Resource> HttpResource<R> {
    fn item_path(id: i64) -> String {
        format!("{}/{}", R::PATH, id)
    }
}

impl<R: Resource> ResourceApi<R> for HttpResource<R> {
    fn list(&self) -> Result<Vec<R>, ApiError> {
        // a null body means an empty collection
        let records: Option<Vec<R>> = self.api.get_json(R::PATH)?;
        Ok(records.unwrap_or_default())
    }

    fn get(&self, id: i64) -> Result<R, ApiError> {
        self.api.get_json(&Self::item_path(id))
    }

    fn create(&self, draft: &R::Draft) -> Result<Value, ApiError> {
        let payload = draft.payload();
        let request = self.api.client.post(self.api.url(R::PATH));
        let response = self.api.send(self.api.with_payload(request, &payload)?)?;
        decode_value(response)
    }

    fn update(&self, id: i64, draft: &R::Draft) -> Result<Value, ApiError> {
        let payload = draft.payload();
        let request = self.api.client.put(self.api.url(&Self::item_path(id)));
        let response = self.api.send(self.api.with_payload(request, &payload)?)?;
        decode_value(response)
    }

    fn delete(&self, id: i64) -> Result<(), ApiError> {
        let request = self.api.client.delete(self.api.url(&Self::item_path(id)));
        self.api.send(request)?;
        Ok(())
    }
}

impl AuthApi for ApiClient {
    // Login and register answer failures with a `{success: false, message}`
    // body, so the body is read whatever the status.
    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .map_err(|e| ApiError::NetworkOrServer(e.to_string()))?;
        read_envelope(response)
    }

    fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisterResponse, ApiError> {
        let response = self
            .client
            .post(self.url("auth/register"))
            .json(&RegisterRequest { name, email, password })
            .send()
            .map_err(|e| ApiError::NetworkOrServer(e.to_string()))?;
        read_envelope(response)
    }

    fn profile(&self) -> Result<Profile, ApiError> {
        self.get_json("users/profile")
    }

    fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let request = self.client.put(self.url("users/updateprofile")).json(update);
        self.send(request)?;
        Ok(())
    }
}

fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| ApiError::NetworkOrServer(e.to_string()))?;
    match serde_json::from_str(&body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if !status.is_success() => Err(error_for_status(status, &body)),
        Err(e) => Err(ApiError::NetworkOrServer(format!("undecodable response: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Company;
    use crate::resource::{ApplicationDraft, CompanyDraft};
    use crate::models::JobApplication;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    struct Captured {
        head: String,
        body: Vec<u8>,
    }

    /// Serves exactly one request with the given status and body, and hands
    /// back what the client sent.
    fn serve_once(status: &str, body: &str) -> (String, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        let status = status.to_string();
        let body = body.to_string();
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(len) = lower.strip_prefix("content-length:") {
                    content_length = len.trim().parse().unwrap_or(0);
                }
                head.push_str(&line);
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap();
            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            tx.send(Captured { head, body: request_body }).unwrap();
        });
        (format!("http://{}", addr), rx)
    }

    #[test]
    fn test_list_sends_bearer_token() {
        let (base, rx) = serve_once("200 OK", r#"[{"id": 1, "name": "Acme"}]"#);
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        let companies = api.resource::<Company>().list().unwrap();
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name, "Acme");

        let captured = rx.recv().unwrap();
        assert!(captured.head.starts_with("GET /api/companies "));
        assert!(captured.head.to_ascii_lowercase().contains("authorization: bearer abc"));
    }

    #[test]
    fn test_null_list_is_empty() {
        let (base, _rx) = serve_once("200 OK", "null");
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        assert!(api.resource::<Company>().list().unwrap().is_empty());
    }

    #[test]
    fn test_unauthorized_maps_to_unauthorized() {
        let (base, _rx) = serve_once("401 Unauthorized", r#"{"message": "jwt expired"}"#);
        let api = ApiClient::new(&base).unwrap().with_token("stale");
        assert_eq!(api.resource::<Company>().list(), Err(ApiError::Unauthorized));
    }

    #[test]
    fn test_not_found_maps_to_not_found() {
        let (base, _rx) = serve_once("404 Not Found", "");
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        assert_eq!(api.resource::<Company>().get(99).unwrap_err(), ApiError::NotFound);
    }

    #[test]
    fn test_server_error_is_catch_all() {
        let (base, _rx) = serve_once("503 Service Unavailable", "");
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        let err = api.resource::<Company>().delete(3).unwrap_err();
        assert!(matches!(err, ApiError::NetworkOrServer(_)));
    }

    #[test]
    fn test_create_without_attachments_sends_json() {
        let (base, rx) = serve_once("201 Created", r#"{"id": 5}"#);
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        let mut draft = CompanyDraft::default();
        draft.name = "Acme".to_string();
        let created = api.resource::<Company>().create(&draft).unwrap();
        assert_eq!(created["id"], 5);

        let captured = rx.recv().unwrap();
        assert!(captured.head.starts_with("POST /api/companies "));
        assert!(captured.head.to_ascii_lowercase().contains("content-type: application/json"));
        let sent: Value = serde_json::from_slice(&captured.body).unwrap();
        assert_eq!(sent["name"], "Acme");
    }

    #[test]
    fn test_update_with_attachment_sends_multipart() {
        let dir = std::env::temp_dir().join(format!("jobtrack-api-multipart-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let resume = dir.join("cv.txt");
        std::fs::write(&resume, "curriculum vitae").unwrap();

        let (base, rx) = serve_once("200 OK", "");
        let api = ApiClient::new(&base).unwrap().with_token("abc");
        let mut draft = ApplicationDraft::blank();
        draft.set("companyName", "Acme".to_string());
        draft.set("resume", resume.display().to_string());
        let body = api.resource::<JobApplication>().update(8, &draft).unwrap();
        assert_eq!(body, Value::Null);

        let captured = rx.recv().unwrap();
        assert!(captured.head.starts_with("PUT /api/job-applications/8 "));
        assert!(captured.head.to_ascii_lowercase().contains("content-type: multipart/form-data"));
        let sent = String::from_utf8_lossy(&captured.body);
        assert!(sent.contains("name=\"resume\""));
        assert!(sent.contains("curriculum vitae"));
        assert!(sent.contains("name=\"companyName\""));
    }

    #[test]
    fn test_missing_attachment_is_rejected_locally() {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap().with_token("abc");
        let mut draft = ApplicationDraft::blank();
        draft.set("resume", "/definitely/not/here.pdf".to_string());
        let err = api.resource::<JobApplication>().create(&draft).unwrap_err();
        assert!(matches!(err, ApiError::ValidationRejected { .. }));
    }

    #[test]
    fn test_login_reads_failure_envelope() {
        let (base, _rx) = serve_once("401 Unauthorized", r#"{"success": false, "message": "Invalid credentials"}"#);
        let api = ApiClient::new(&base).unwrap();
        let response = api.login("ada@example.com", "wrong").unwrap();
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_validation_body_is_parsed() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"message": "Validation failed", "errors": [{"path": "name", "msg": "required"}]}"#,
        );
        match err {
            ApiError::ValidationRejected { message, fields } => {
                assert_eq!(message, "Validation failed");
                assert_eq!(fields.get("name").map(String::as_str), Some("required"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validation_without_body_has_default_message() {
        let err = error_for_status(StatusCode::UNPROCESSABLE_ENTITY, "");
        assert_eq!(
            err,
            ApiError::ValidationRejected {
                message: "The server rejected the submitted data.".to_string(),
                fields: BTreeMap::new(),
            }
        );
    }
}
