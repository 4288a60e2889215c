//! HTTP transport with a response-observer hook and manual redirect following.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Request, RequestBuilder, StatusCode};
use url::Url;

use crate::error::{Error, Result};
use crate::session::HEADER_SESSION;

/// Maximum redirect hops followed.
pub const MAX_REDIRECTS: usize = 5;

/// Upper bound for one request including the body read.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the session cookie issued by the backend.
pub const SESSION_COOKIE: &str = "cinergy_s";

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: StatusCode,
    /// `Location` header, if any.
    pub location: Option<String>,
    /// Value of the session cookie if the response set one.
    pub session_cookie: Option<String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// `Location` of a 3xx response.
    fn redirect_target(&self) -> Option<&str> {
        self.location
            .as_deref()
            .filter(|_| self.status.is_redirection())
    }
}

/// Hook invoked for every response the transport receives.
pub trait ResponseObserver: Send + Sync {
    /// Inspects a response before it is returned to the caller.
    fn observe(&self, response: &HttpResponse);
}

/// Whether a request follows redirects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirects {
    /// Follow up to [`MAX_REDIRECTS`] hops, observing each one.
    Follow,
    /// Return 3xx responses as-is.
    Manual,
}

/// HTTP client whose every response, redirect hops included, passes
/// through one observer.
pub struct Transport {
    /// Client with automatic redirects disabled.
    client: Client,
    /// Observer notified of every response.
    observer: Arc<dyn ResponseObserver>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

impl Transport {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the `reqwest::Client` fails to build.
    pub fn new(user_agent: &str, observer: Arc<dyn ResponseObserver>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, observer })
    }

    /// Client to build requests with.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Sends a request, reads the body and notifies the observer.
    ///
    /// With [`Redirects::Follow`] each 3xx hop is fetched with `GET`,
    /// carrying the original headers and any session cookie a previous hop
    /// set. Non-2xx statuses are not errors here; callers decide from the
    /// body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if a request or body read fails, and
    /// [`Error::Protocol`] if the redirect chain exceeds [`MAX_REDIRECTS`].
    pub async fn send(&self, request: RequestBuilder, redirects: Redirects) -> Result<HttpResponse> {
        let request = request.build()?;
        if redirects == Redirects::Manual {
            return self.execute(request).await;
        }

        let mut url = request.url().clone();
        let mut headers = request.headers().clone();
        headers.remove(CONTENT_TYPE);
        headers.remove(CONTENT_LENGTH);
        let mut response = self.execute(request).await?;
        for _ in 0..MAX_REDIRECTS {
            let Some(location) = response.redirect_target() else {
                return Ok(response);
            };
            url = url.join(location)?;
            if let Some(cookie) = response.session_cookie.as_deref() {
                apply_session_cookie(&mut headers, cookie)?;
            }
            let hop = self.client.get(url.clone()).headers(headers.clone()).build()?;
            response = self.execute(hop).await?;
        }
        if response.redirect_target().is_some() {
            return Err(Error::Protocol(format!("too many redirects at {url}")));
        }
        Ok(response)
    }

    /// Sends one request without following redirects.
    async fn execute(&self, request: Request) -> Result<HttpResponse> {
        let response = self.client.execute(request).await?;

        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let session_cookie = response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| String::from(c.value()));
        tracing::debug!(
            url = %response.url(),
            %status,
            redirected_to = location.as_deref().unwrap_or("-"),
            "Http response"
        );

        let body = response.text().await?;
        let response = HttpResponse {
            status,
            location,
            session_cookie,
            body,
        };
        self.observer.observe(&response);
        Ok(response)
    }

/// Follows redirects by hand and returns the final URL.
    ///
    /// Stops at the first response without a `Location` header, on a
    /// request failure, or after `max_hops` hops, returning the last URL
    /// reached in each case.
    pub async fn follow_redirects(&self, url: &str, max_hops: usize) -> String {
        let mut current = String::from(url);
        for _ in 0..max_hops {
            let response = match self.send(self.client.get(&current), Redirects::Manual).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(url = %current, error = %e, "Redirect probe failed");
                    return current;
                }
            };
            let Some(location) = response.redirect_target() else {
                tracing::debug!(url = %current, "Final url");
                return current;
            };
            current = resolve_location(&current, location);
            tracing::debug!(url = %current, "Redirected");
        }
        current
    }
}

/// Replaces the session cookie in a request's `Cookie` header, and the
/// session header when the request carries one.
fn apply_session_cookie(headers: &mut HeaderMap, cookie: &str) -> Result<()> {
    let prefix = format!("{SESSION_COOKIE}=");
    let mut pairs: Vec<String> = headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty() && !pair.starts_with(&prefix))
        .map(String::from)
        .collect();
    pairs.push(format!("{prefix}{cookie}"));
    headers.insert(COOKIE, HeaderValue::from_str(&pairs.join("; "))?);
    if headers.contains_key(HEADER_SESSION) {
        headers.insert(HEADER_SESSION, HeaderValue::from_str(cookie)?);
    }
    Ok(())
}

/// Resolves a possibly relative `Location` against the URL that produced it.
fn resolve_location(base: &str, location: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(location))
        .map_or_else(|_| String::from(location), String::from)
}
