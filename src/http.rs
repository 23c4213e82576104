//! HTTP plumbing for requests to the runtime proxy.
//!
//! Client construction, the runtime's header set and the shared
//! non-success status handling live here so both call modes agree on them.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use std::collections::HashMap;
use tracing::warn;

use crate::client::ClientError;
use crate::options::ClientOptions;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const BYO_KEY_HEADER: &str = "x-byo-key";
pub const PURPOSE_HEADER: &str = "x-purpose";

/// Build a configured HTTP client from client options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(options: &ClientOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => warn!(proxy = %proxy_url, error = %err, "ignoring invalid proxy URL"),
        }
    }

    Ok(builder.build()?)
}

/// Headers sent with every runtime request.
///
/// Credential headers are present only when the matching option is set.
pub fn runtime_headers(options: &ClientOptions, request_id: &str) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert(&mut headers, REQUEST_ID_HEADER, request_id)?;

    if let Some(api_key) = &options.api_key {
        insert(&mut headers, API_KEY_HEADER, api_key.expose_secret())?;
    }
    if let Some(byo_key) = &options.byo_key {
        insert(&mut headers, BYO_KEY_HEADER, byo_key.expose_secret())?;
    }
    if let Some(purpose) = &options.purpose {
        insert(&mut headers, PURPOSE_HEADER, purpose)?;
    }

    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), ClientError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| ClientError::Config(format!("invalid value for header {name}")))?;
    if name != REQUEST_ID_HEADER && name != PURPOSE_HEADER {
        value.set_sensitive(true);
    }
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

/// Add extra headers to a request if specified in the options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Pass a successful response through; turn anything else into
/// [`ClientError::Status`].
///
/// The error body is read best-effort: if reading it fails the body is
/// reported as empty and the status error still wins.
pub async fn error_for_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "runtime proxy returned an error status");
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SecretString;
    use std::time::Duration;

    #[test]
    fn test_build_http_client() {
        let options = ClientOptions::new("http://localhost:8080")
            .with_timeout(Duration::from_secs(30))
            .with_proxy("http://proxy.example.com:8080".to_string());

        assert!(build_http_client(&options).is_ok());
    }

    #[test]
    fn test_headers_without_credentials() {
        let options = ClientOptions::new("http://localhost:8080");
        let headers = runtime_headers(&options, "req-1").unwrap();

        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[REQUEST_ID_HEADER], "req-1");
        assert!(!headers.contains_key(API_KEY_HEADER));
        assert!(!headers.contains_key(BYO_KEY_HEADER));
        assert!(!headers.contains_key(PURPOSE_HEADER));
    }

    #[test]
    fn test_headers_with_credentials() {
        let options = ClientOptions {
            api_key: Some(SecretString::from("rk-1")),
            byo_key: Some(SecretString::from("sk-upstream")),
            purpose: Some("regulatory_filing".to_string()),
            ..ClientOptions::new("http://localhost:8080")
        };
        let headers = runtime_headers(&options, "req-2").unwrap();

        assert_eq!(headers[API_KEY_HEADER], "rk-1");
        assert!(headers[API_KEY_HEADER].is_sensitive());
        assert_eq!(headers[BYO_KEY_HEADER], "sk-upstream");
        assert_eq!(headers[PURPOSE_HEADER], "regulatory_filing");
    }

    #[test]
    fn test_invalid_header_value_is_config_error() {
        let options = ClientOptions::new("http://localhost:8080").with_api_key("bad\nkey");
        let err = runtime_headers(&options, "req-3").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
