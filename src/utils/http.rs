// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Longest response excerpt kept in error messages.
const SNIPPET_LEN: usize = 500;

/// Create a configured asynchronous HTTP client.
pub fn create_client(config: &HttpConfig) -> Result<Client> {
    create_client_with_agent(config, &config.user_agent)
}

/// Create a client that announces a specific User-Agent.
pub fn create_client_with_agent(config: &HttpConfig, user_agent: &str) -> Result<Client> {
    let client = Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Turn a non-success status into [`AppError::HttpStatus`].
pub async fn check_status(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::HttpStatus {
        context: context.to_string(),
        status: status.as_u16(),
        snippet: snippet(&body),
    })
}

/// Send a request and parse the body as JSON.
pub async fn fetch_json(request: RequestBuilder, context: &str) -> Result<Value> {
    read_json(request.send().await?, context).await
}

/// Check the status of a received response and parse its body as JSON.
pub async fn read_json(response: Response, context: &str) -> Result<Value> {
    let response = check_status(response, context).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        log::debug!("Undecodable body from {}: {}", context, snippet(&text));
        AppError::Json(e)
    })
}

/// Fetch a page body as text.
///
/// Parsing is left to the caller because [`scraper::Html`] is not `Send`
/// and must not be held across an await point.
pub async fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let response = check_status(client.get(url).send().await?, url).await?;
    Ok(response.text().await?)
}

/// First characters of a body, on a char boundary.
pub fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_LEN).collect()
}
