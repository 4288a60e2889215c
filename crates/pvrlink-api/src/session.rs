//! Session manager: scrape-based login and implicit cookie renewal.
//!
//! Login is a three-step handshake against the web portal: an
//! unauthenticated probe (which may point at the regional portal), a
//! credential form POST, and an authenticated fetch of the portal root whose
//! HTML carries the API key and user id. After that every response that sets
//! the session cookie renews it through [`ResponseObserver`].

use std::sync::{PoisonError, RwLock};

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, REFERER};
use url::Url;

use crate::error::{LoginError, Result};
use crate::transport::{HttpResponse, Redirects, ResponseObserver, SESSION_COOKIE, Transport};

/// Default web portal.
pub const DEFAULT_PORTAL_URL: &str = "https://www.teleboy.ch";

/// Regional portal the default one may redirect to.
pub const DEFAULT_ALTERNATE_PORTAL_URL: &str = "https://t.teleboy.ch";

/// Marker preceding the quoted API key in the portal HTML.
const API_KEY_MARKER: &str = "tvapiKey:";

/// Marker preceding the user id in the portal HTML.
const USER_ID_MARKER: &str = "setId(";

/// Plus-tier marker, searched after the user id.
const PLUS_MEMBER_MARKER: &str = "setIsPlusMember(1";

/// Comfort-tier marker, searched after the user id.
const COMFORT_MEMBER_MARKER: &str = "setIsComfortMember(1";

/// The opening quote must start within this many bytes of the marker.
const API_KEY_QUOTE_WINDOW: usize = 50;

/// Longest accepted API key.
const API_KEY_MAX_LEN: usize = 65;

/// Longest accepted user id.
const USER_ID_MAX_LEN: usize = 15;

/// API key header.
pub const HEADER_API_KEY: &str = "x-teleboy-apikey";
/// Device type header.
pub const HEADER_DEVICE_TYPE: &str = "x-teleboy-device-type";
/// Session header.
pub const HEADER_SESSION: &str = "x-teleboy-session";
/// API version header.
pub const HEADER_VERSION: &str = "x-teleboy-version";
/// Fixed device type.
pub const API_DEVICE_TYPE: &str = "desktop";
/// Fixed API version.
pub const API_VERSION: &str = "1.5";

/// Paid membership tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    /// Plus tier.
    pub plus: bool,
    /// Comfort tier.
    pub comfort: bool,
}

impl Membership {
    /// Whether any paid tier is active.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        self.plus || self.comfort
    }
}

/// Values scraped from the authenticated portal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalCredentials {
    /// Opaque API bearer token.
    pub api_key: String,
    /// Numeric user id as text.
    pub user_id: String,
    /// Membership flags.
    pub membership: Membership,
}

/// Snapshot of an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque API bearer token.
    pub api_key: String,
    /// Current session cookie value.
    pub session_cookie: String,
    /// Numeric user id as text.
    pub user_id: String,
    /// Membership flags.
    pub membership: Membership,
}

/// Portal endpoints used by the login handshake.
#[derive(Debug, Clone)]
pub struct PortalUrls {
    /// Portal probed first.
    pub primary: Url,
    /// Regional portal; a redirect to its origin switches the flow over.
    pub alternate: Url,
}

#[derive(Debug, Default)]
struct SessionState {
    cookie: String,
    credentials: Option<PortalCredentials>,
}

/// Owns the login state shared by foreground callers and scheduler workers.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SessionManager {
    state: RwLock<SessionState>,
}

impl SessionManager {
    /// Creates a manager with no session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the session, or `None` before a successful login.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.credentials.as_ref().map(|c| Session {
            api_key: c.api_key.clone(),
            session_cookie: state.cookie.clone(),
            user_id: c.user_id.clone(),
            membership: c.membership,
        })
    }

    /// Returns the session or [`crate::Error::NotLoggedIn`].
    ///
    /// # Errors
    ///
    /// Fails when no login has succeeded yet.
    pub fn require(&self) -> Result<Session> {
        self.session().ok_or(crate::Error::NotLoggedIn)
    }

    /// Current membership flags (none before login).
    #[must_use]
    pub fn membership(&self) -> Membership {
        self.session().map(|s| s.membership).unwrap_or_default()
    }

    /// Current session cookie (may be set before login completes).
    #[must_use]
    pub fn cookie(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .cookie
            .clone()
    }

    /// Replaces the stored session cookie.
    pub fn set_cookie(&self, cookie: impl Into<String>) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .cookie = cookie.into();
    }

    /// Drops the authenticated session.
    pub fn logout(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.credentials = None;
        state.cookie.clear();
        tracing::info!("Logged out");
    }

    /// Builds the four headers every API call carries.
    ///
    /// # Errors
    ///
    /// Fails when not logged in or a value is not a valid header.
    pub fn auth_headers(&self) -> Result<HeaderMap> {
        let session = self.require()?;
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_API_KEY, HeaderValue::from_str(&session.api_key)?);
        headers.insert(HEADER_DEVICE_TYPE, HeaderValue::from_static(API_DEVICE_TYPE));
        headers.insert(HEADER_SESSION, HeaderValue::from_str(&session.session_cookie)?);
        headers.insert(HEADER_VERSION, HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    /// Performs the login handshake and stores the resulting session.
    ///
    /// Any earlier session is dropped first, so API calls stay blocked
    /// unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns a transport error if a request fails, or a
    /// [`LoginError`] if the portal page cannot be parsed.
    pub async fn login(
        &self,
        transport: &Transport,
        portal: &PortalUrls,
        username: &str,
        password: &str,
    ) -> Result<()> {
        self.clear_credentials();
        let http = transport.client();

        let mut base = portal.primary.clone();
        let probe_url = base.join("login")?;
        let probe = transport
            .send(http.get(probe_url.clone()), Redirects::Manual)
            .await?;
        if let Some(location) = &probe.location
            && probe_url
                .join(location)
                .is_ok_and(|target| target.origin() == portal.alternate.origin())
        {
            tracing::info!(portal = %portal.alternate, "Using regional portal");
            base = portal.alternate.clone();
            transport
                .send(http.get(base.join("login")?), Redirects::Manual)
                .await?;
        }

        let referer = base.join("login")?;
        let mut form = http
            .post(base.join("login_check")?)
            .header(REFERER, referer.as_str())
            .form(&[
                ("login", username),
                ("password", password),
                ("keep_login", "1"),
            ]);
        let cookie = self.cookie();
        if !cookie.is_empty() {
            form = form.header(COOKIE, format!("{SESSION_COOKIE}={cookie}"));
        }
        transport.send(form, Redirects::Manual).await?;

        let mut fetch = http
            .get(base.clone())
            .header(REFERER, referer.as_str());
        let cookie = self.cookie();
        if !cookie.is_empty() {
            fetch = fetch.header(COOKIE, format!("welcomead=1; {SESSION_COOKIE}={cookie}"));
        }
        let page = transport.send(fetch, Redirects::Follow).await?;
        if page.body.is_empty() {
            tracing::error!("Failed to login");
            return Err(LoginError::EmptyPortalBody.into());
        }

        let credentials = parse_portal_page(&page.body).inspect_err(|e| {
            tracing::debug!(body = %page.body, "Rejected portal page");
            tracing::error!(error = %e, "Failed to parse portal page");
        })?;
        tracing::info!(
            user_id = %credentials.user_id,
            plus = credentials.membership.plus,
            comfort = credentials.membership.comfort,
            "Logged in"
        );
        self.set_credentials(credentials);
        Ok(())
    }

    /// Drops the credentials but keeps the cookie.
    fn clear_credentials(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .credentials = None;
    }

    /// Installs scraped credentials as the active session.
    pub(crate) fn set_credentials(&self, credentials: PortalCredentials) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .credentials = Some(credentials);
    }
}

impl ResponseObserver for SessionManager {
    fn observe(&self, response: &HttpResponse) {
        if let Some(cookie) = response.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            tracing::trace!("Session cookie renewed");
            self.set_cookie(cookie);
        }
    }
}

/// Finds `needle` in `haystack` at or after byte offset `from`.
fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack
        .get(from..)
        .and_then(|tail| tail.find(needle))
        .and_then(|i| i.checked_add(from))
}

/// Extracts the API key, user id and membership flags from the portal HTML.
///
/// # Errors
///
/// Returns the [`LoginError`] naming the first marker that is missing or
/// whose value fails the length bound.
pub fn parse_portal_page(html: &str) -> std::result::Result<PortalCredentials, LoginError> {
    let marker = html.find(API_KEY_MARKER).ok_or(LoginError::ApiKeyMarkerMissing)?;
    let key_start = find_from(html, "'", marker)
        .and_then(|quote| quote.checked_add(1))
        .filter(|&start| start <= marker.saturating_add(API_KEY_QUOTE_WINDOW))
        .ok_or(LoginError::ApiKeyMarkerMissing)?;
    let key_end = find_from(html, "'", key_start).ok_or(LoginError::ApiKeyInvalid)?;
    if key_end.saturating_sub(key_start) > API_KEY_MAX_LEN {
        return Err(LoginError::ApiKeyInvalid);
    }
    let api_key = html
        .get(key_start..key_end)
        .ok_or(LoginError::ApiKeyInvalid)?;

    let id_start = html
        .find(USER_ID_MARKER)
        .and_then(|pos| pos.checked_add(USER_ID_MARKER.len()))
        .ok_or(LoginError::UserIdMarkerMissing)?;
    let id_end = find_from(html, ")", id_start).ok_or(LoginError::UserIdInvalid)?;
    let id_len = id_end.saturating_sub(id_start);
    if id_len == 0 || id_len > USER_ID_MAX_LEN {
        return Err(LoginError::UserIdInvalid);
    }
    let user_id = html.get(id_start..id_end).ok_or(LoginError::UserIdInvalid)?;

    Ok(PortalCredentials {
        api_key: String::from(api_key),
        user_id: String::from(user_id),
        membership: Membership {
            plus: find_from(html, PLUS_MEMBER_MARKER, id_end).is_some(),
            comfort: find_from(html, COMFORT_MEMBER_MARKER, id_end).is_some(),
        },
    })
}
