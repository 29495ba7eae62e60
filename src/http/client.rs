use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use super::request::ResolvedRequest;
use super::response::{RedirectHop, ResponseDescriptor, ResponseSize, ResponseTiming};
use crate::config::Settings;
use crate::error::Result;

/// Sends resolved requests. Failures come back as a degenerate
/// [`ResponseDescriptor`] with `error` set, never as an `Err`.
pub trait Transport {
    fn send(&self, request: &ResolvedRequest) -> impl Future<Output = ResponseDescriptor> + Send;
}

/// `reqwest`-backed transport that follows redirects itself so every hop can
/// be reported.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_redirects: usize,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self> {
        // Cookies set on a redirect hop are sent on the following hops.
        let cookie_jar = Arc::new(Jar::default());
        let mut builder = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .cookie_provider(cookie_jar);

        if let Some(ms) = settings.timeout_ms {
            if ms > 0 {
                builder = builder.timeout(Duration::from_millis(ms));
            }
        }

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            max_redirects: settings.max_redirects,
        })
    }

    async fn send_impl(&self, request: &ResolvedRequest) -> std::result::Result<ResponseDescriptor, String> {
        let method: Method = request.method.into();
        let headers = build_headers(request)?;

        let started = Instant::now();
        let mut current_url = request.url.clone();
        let mut redirect_chain = Vec::new();
        let mut send_body = request.body.is_some();

        for hop in 0..=self.max_redirects {
            let hop_started = Instant::now();
            let mut builder = self
                .client
                .request(method.clone(), &current_url)
                .headers(headers.clone());
            if send_body {
                if let Some(ref body) = request.body {
                    builder = builder.body(body.clone());
                }
            }

            let response = builder
                .send()
                .await
                .map_err(|err| format!("Request failed: {err}"))?;
            let first_byte = elapsed_ms(hop_started);

            let status = response.status();
            let response_headers = collect_headers(response.headers());
            let cookies = collect_set_cookies(response.headers());
            let headers_size = headers_size(response.headers());

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);

                if let Some(location) = location {
                    if hop == self.max_redirects {
                        return Err(format!(
                            "Maximum redirect limit ({}) exceeded. The server might be in a redirect loop.",
                            self.max_redirects
                        ));
                    }

                    let next_url = Url::parse(&current_url)
                        .and_then(|base| base.join(&location))
                        .map_err(|err| format!("Invalid redirect location `{location}`: {err}"))?
                        .to_string();
                    debug!(from = %current_url, to = %next_url, status = status.as_u16(), "Following redirect");

                    redirect_chain.push(RedirectHop {
                        url: current_url,
                        status: status.as_u16(),
                        status_text: status_text(status),
                        headers: response_headers,
                        cookies,
                        timing: Some(ResponseTiming {
                            first_byte: Some(first_byte),
                            total: first_byte,
                            ..Default::default()
                        }),
                        size: Some(ResponseSize::new(headers_size, 0)),
                    });

                    // Only 307/308 replay the body on the next hop.
                    send_body = send_body
                        && matches!(status, StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT);
                    current_url = next_url;
                    continue;
                }
            }

            let download_started = Instant::now();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| format!("Failed to read response: {err}"))?;
            let download = elapsed_ms(download_started);

            let (body, is_base64) = match std::str::from_utf8(&bytes) {
                Ok(text) => (text.to_string(), false),
                Err(_) => (STANDARD.encode(&bytes), true),
            };

            let mut all_cookies: Vec<String> = redirect_chain
                .iter()
                .flat_map(|hop: &RedirectHop| hop.cookies.clone())
                .collect();
            all_cookies.extend(cookies);

            return Ok(ResponseDescriptor {
                status: status.as_u16(),
                status_text: status_text(status),
                headers: response_headers,
                body,
                is_base64,
                redirect_chain,
                cookies: all_cookies,
                timing: Some(ResponseTiming {
                    first_byte: Some(first_byte),
                    download: Some(download),
                    total: elapsed_ms(started),
                    ..Default::default()
                }),
                size: Some(ResponseSize::new(headers_size, bytes.len() as u64)),
                error: None,
            });
        }

        Err("No response received".into())
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &ResolvedRequest) -> ResponseDescriptor {
        info!(method = %request.method, url = %request.url, "Sending request");

        match self.send_impl(request).await {
            Ok(response) => {
                info!(
                    status = response.status,
                    redirects = response.redirect_chain.len(),
                    time_ms = response.response_time(),
                    "Received response"
                );
                response
            }
            Err(message) => {
                warn!(url = %request.url, error = %message, "Request failed");
                ResponseDescriptor::error(message)
            }
        }
    }
}

/// Convert the resolved header map, adding `Content-Type` for a body when the
/// user did not set one explicitly.
fn build_headers(request: &ResolvedRequest) -> std::result::Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();

    for (key, value) in &request.headers {
        if key.is_empty() {
            continue;
        }

        let header_name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| format!("Invalid header name `{key}`: {err}"))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|err| format!("Invalid header value for `{key}`: {err}"))?;
        headers.insert(header_name, header_value);
    }

    if request.body.is_some() && !headers.contains_key(CONTENT_TYPE) {
        if let Some(ref content_type) = request.content_type {
            let value = HeaderValue::from_str(content_type)
                .map_err(|err| format!("Invalid content type `{content_type}`: {err}"))?;
            headers.insert(CONTENT_TYPE, value);
        }
    }

    Ok(headers)
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_str().unwrap_or_default().to_string()))
        .collect()
}

fn collect_set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(String::from)
        .collect()
}

/// Approximate wire size: `name: value\r\n` per header.
fn headers_size(headers: &HeaderMap) -> u64 {
    headers
        .iter()
        .map(|(key, value)| (key.as_str().len() + value.len() + 4) as u64)
        .sum()
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
