//! `ApiClient` - backend API client implementation.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;
use url::Url;

use crate::api::EpgSource;
use crate::channels::ChannelLineup;
use crate::eligibility::{self, DEFAULT_CATCHUP_WINDOW};
use crate::error::{Error, Result};
use crate::json::{
    BroadcastItem, Items, Page, RecordingItem, StationItem, StreamData, parse_data, parse_success,
};
use crate::params::{
    broadcasts_path, parse_api_datetime, parse_api_datetime_or_epoch, recordings_path,
};
use crate::scheduler::{DEFAULT_REFRESH_INTERVAL, EpgJob, SchedulerState};
use crate::session::{
    DEFAULT_ALTERNATE_PORTAL_URL, DEFAULT_PORTAL_URL, PortalUrls, Session, SessionManager,
};
use crate::sink::PvrSink;
use crate::transport::{MAX_REDIRECTS, Redirects, ResponseObserver, Transport};
use crate::types::{Channel, EpgEntry, Recording, Timer};

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://tv.api.teleboy.ch/";

/// Recording listing type for planned recordings (timers).
pub const RECORDINGS_PLANNED: &str = "planned";

/// Recording listing type for finished recordings.
pub const RECORDINGS_READY: &str = "ready";

/// Time after a timer's end at which a refresh is forced.
const TIMER_REFRESH_GRACE: Duration = Duration::minutes(21);

/// Stream to resolve a playback URL for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// Live stream of a channel.
    Live(i64),
    /// A finished recording.
    Recording(String),
    /// Replay of a past broadcast.
    Replay(i64),
}

impl StreamKind {
    fn path(&self, user_id: &str) -> String {
        match self {
            Self::Live(channel_id) => {
                format!("users/{user_id}/stream/live/{channel_id}?alternative=false")
            }
            Self::Recording(id) => format!("users/{user_id}/stream/recording/{id}"),
            Self::Replay(broadcast_id) => format!("users/{user_id}/stream/replay/{broadcast_id}"),
        }
    }
}

/// Backend API client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ApiClient {
    /// HTTP transport (renews the session cookie on every response).
    transport: Transport,
    /// Login state.
    session: Arc<SessionManager>,
    /// Portal endpoints for login.
    portal: PortalUrls,
    /// API base URL.
    api_url: Url,
    /// Catch-up window for eligibility checks.
    catchup_window: Duration,
    /// Scheduler state whose deadline timers pull forward.
    scheduler: Arc<SchedulerState>,
    /// Channels from the last successful load.
    lineup: RwLock<ChannelLineup>,
}

/// Builder for `ApiClient`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct ApiClientBuilder {
    portal_url: Option<Url>,
    alternate_portal_url: Option<Url>,
    api_url: Option<Url>,
    user_agent: Option<String>,
    catchup_window: Option<Duration>,
    scheduler: Option<Arc<SchedulerState>>,
}

impl ApiClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            portal_url: None,
            alternate_portal_url: None,
            api_url: None,
            user_agent: None,
            catchup_window: None,
            scheduler: None,
        }
    }

    /// Overrides the login portal (for wiremock in tests).
    #[must_use]
    pub fn portal_url(mut self, url: Url) -> Self {
        self.portal_url = Some(url);
        self
    }

    /// Overrides the regional portal.
    #[must_use]
    pub fn alternate_portal_url(mut self, url: Url) -> Self {
        self.alternate_portal_url = Some(url);
        self
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn api_url(mut self, url: Url) -> Self {
        self.api_url = Some(url);
        self
    }

    /// Sets the User-Agent (default: crate name and version).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the catch-up window (default: 7 days).
    #[must_use]
    pub const fn catchup_window(mut self, window: Duration) -> Self {
        self.catchup_window = Some(window);
        self
    }

    /// Shares scheduler state so timer listings can pull its deadline forward.
    #[must_use]
    pub fn scheduler_state(mut self, state: Arc<SchedulerState>) -> Self {
        self.scheduler = Some(state);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - A default URL fails to parse.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<ApiClient> {
        let portal = PortalUrls {
            primary: match self.portal_url {
                Some(url) => url,
                None => Url::parse(DEFAULT_PORTAL_URL)?,
            },
            alternate: match self.alternate_portal_url {
                Some(url) => url,
                None => Url::parse(DEFAULT_ALTERNATE_PORTAL_URL)?,
            },
        };
        let api_url = match self.api_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_API_URL)?,
        };
        let user_agent = self.user_agent.unwrap_or_else(|| {
            String::from(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        });

        let session = Arc::new(SessionManager::new());
        let observer: Arc<dyn ResponseObserver> = session.clone();
        let transport = Transport::new(&user_agent, observer)?;

        Ok(ApiClient {
            transport,
            session,
            portal,
            api_url,
            catchup_window: self.catchup_window.unwrap_or(DEFAULT_CATCHUP_WINDOW),
            scheduler: self.scheduler.unwrap_or_else(|| {
                Arc::new(SchedulerState::new(DEFAULT_REFRESH_INTERVAL, Utc::now()))
            }),
            lineup: RwLock::new(ChannelLineup::default()),
        })
    }
}

impl ApiClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Session manager.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Scheduler state shared with the update workers.
    #[must_use]
    pub const fn scheduler_state(&self) -> &Arc<SchedulerState> {
        &self.scheduler
    }

    /// Logs in through the web portal.
    ///
    /// # Errors
    ///
    /// Returns an error if any handshake step fails.
    #[instrument(skip_all)]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.session
            .login(&self.transport, &self.portal, username, password)
            .await
    }

    /// Drops the session and the loaded lineup.
    pub fn logout(&self) {
        self.session.logout();
        *self.lineup.write().unwrap_or_else(PoisonError::into_inner) = ChannelLineup::default();
    }

    /// Issues an authenticated API request and returns the raw body.
    async fn api_request(
        &self,
        method: Method,
        path: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<String> {
        let headers = self.session.auth_headers()?;
        let url = self.api_url.join(path)?;
        tracing::debug!(%method, %url, "Http-Request");
        let mut request = self.transport.client().request(method, url).headers(headers);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }
        Ok(self.transport.send(request, Redirects::Follow).await?.body)
    }

    /// GETs and unwraps the envelope's `data`.
    async fn api_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.api_request(Method::GET, path, None).await?;
        parse_data(&body)
    }

    /// Walks a paginated listing until the server-reported total is reached,
    /// handing each item to `on_item`. Returns the number of items seen.
    async fn paginate<T, P, F>(&self, mut path_for: P, mut on_item: F) -> Result<usize>
    where
        T: DeserializeOwned,
        P: FnMut(usize) -> String,
        F: FnMut(T),
    {
        let mut total: Option<usize> = None;
        let mut loaded: usize = 0;
        while total.is_none_or(|t| loaded < t) {
            let page: Page<T> = self.api_get(&path_for(loaded)).await?;
            total = Some(page.total);
            if page.items.is_empty() {
                if loaded < page.total {
                    tracing::warn!(loaded, total = page.total, "Empty page before reported total");
                }
                break;
            }
            for item in page.items {
                loaded = loaded.saturating_add(1);
                on_item(item);
            }
            tracing::debug!(loaded, total = page.total, "Page loaded");
        }
        Ok(loaded)
    }

    /// Reloads the station catalog and the user's sort order.
    ///
    /// The lineup is only replaced when both requests succeed. Returns the
    /// number of streamable channels.
    ///
    /// # Errors
    ///
    /// Returns an error if either request or its parsing fails.
    #[instrument(skip_all)]
    pub async fn load_channels(&self) -> Result<usize> {
        let session = self.session.require()?;
        let stations: Items<StationItem> = self
            .api_get("epg/stations?expand=logos&language=de")
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Error loading channels"))?;
        let catalog: Vec<Channel> = stations
            .items
            .into_iter()
            .filter(|s| s.has_stream)
            .map(|s| Channel::new(s.id, s.name))
            .collect();

        let sorted: Items<i64> = self
            .api_get(&format!("users/{}/stations", session.user_id))
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Error loading sorted channels"))?;

        let lineup = ChannelLineup::new(catalog, &sorted.items);
        let count = lineup.count(false);
        *self.lineup.write().unwrap_or_else(PoisonError::into_inner) = lineup;
        tracing::info!(channels = count, "Channels loaded");
        Ok(count)
    }

    /// Number of channels [`Self::list_channels`] emits.
    #[must_use]
    pub fn channel_count(&self, favorites_only: bool) -> usize {
        self.lineup
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .count(favorites_only)
    }

    /// Channel ids in display order.
    #[must_use]
    pub fn channel_ids(&self, favorites_only: bool) -> Vec<i64> {
        self.lineup
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered(favorites_only)
            .into_iter()
            .map(|(c, _)| c.id)
            .collect()
    }

    /// Emits the loaded channels with their display numbers.
    pub fn list_channels(&self, favorites_only: bool, sink: &dyn PvrSink) {
        let lineup = self.lineup.read().unwrap_or_else(PoisonError::into_inner);
        for (channel, number) in lineup.ordered(favorites_only) {
            sink.emit_channel(channel, number);
        }
    }

    /// Lists planned (`kind` starting with `planned`) or finished recordings.
    ///
    /// Each timer pulls the scheduler's refresh deadline forward to its end
    /// plus a grace period. Returns the number of records emitted.
    ///
    /// # Errors
    ///
    /// Returns an error on the first failed page.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn list_recordings(&self, kind: &str, sink: &dyn PvrSink) -> Result<usize> {
        let session = self.session.require()?;
        let planned = kind.starts_with(RECORDINGS_PLANNED);
        self.paginate(
            |skip| recordings_path(&session.user_id, kind, skip),
            |item: RecordingItem| {
                if planned {
                    self.emit_timer(item, sink);
                } else {
                    self.emit_recording(item, sink);
                }
            },
        )
        .await
        .inspect_err(|e| tracing::error!(kind, error = %e, "Error getting recordings"))
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn emit_timer(&self, item: RecordingItem, sink: &dyn PvrSink) {
        let end = parse_api_datetime(&item.end);
        if let Some(end) = end {
            self.scheduler.lower_deadline(end + TIMER_REFRESH_GRACE);
        }
        sink.emit_timer(Timer {
            id: item.id,
            channel_id: item.station_id,
            title: item.title,
            summary: item.subtitle,
            start: parse_api_datetime_or_epoch(&item.begin),
            end: end.unwrap_or(DateTime::UNIX_EPOCH),
        });
    }

    fn emit_recording(&self, item: RecordingItem, sink: &dyn PvrSink) {
        let (channel_name, icon_url) = self
            .lineup
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item.station_id)
            .map(|c| (c.name.clone(), c.logo_url.clone()))
            .unwrap_or_default();
        let start = parse_api_datetime_or_epoch(&item.begin);
        let end = parse_api_datetime_or_epoch(&item.end);
        sink.emit_recording(Recording {
            id: item.id.to_string(),
            channel_id: item.station_id,
            channel_name,
            icon_url,
            title: item.title,
            episode_name: item.subtitle,
            plot: item.description,
            plot_outline: item.short_description,
            recorded_at: start,
            duration_secs: end.signed_duration_since(start).num_seconds(),
            epg_event_id: item.id,
        });
    }

    /// Schedules a recording of a broadcast.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip_all, fields(program_id = program_id))]
    pub async fn record(&self, program_id: i64) -> Result<()> {
        let session = self.session.require()?;
        let payload = json!({ "broadcast": program_id, "alternative": false });
        let body = self
            .api_request(
                Method::POST,
                &format!("users/{}/recordings", session.user_id),
                Some(payload),
            )
            .await?;
        parse_success(&body)
    }

    /// Deletes a recording or timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip_all, fields(recording_id = %recording_id))]
    pub async fn delete_recording(&self, recording_id: &str) -> Result<()> {
        let session = self.session.require()?;
        let body = self
            .api_request(
                Method::DELETE,
                &format!("users/{}/recordings/{recording_id}", session.user_id),
                None,
            )
            .await?;
        parse_success(&body)
    }

    /// Fetches a stream descriptor and follows its redirects to a playable URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor request fails or carries no URL.
    #[instrument(skip_all)]
    pub async fn resolve_stream_url(&self, kind: &StreamKind) -> Result<String> {
        let session = self.session.require()?;
        let data: StreamData = self.api_get(&kind.path(&session.user_id)).await?;
        let url = data
            .stream
            .map(|s| s.url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Protocol(String::from("missing stream url")))?;
        tracing::info!(%url, "Play URL");
        Ok(self.transport.follow_redirects(&url, MAX_REDIRECTS).await)
    }

    /// Whether a guide entry can be replayed now.
    #[must_use]
    pub fn is_playable(&self, entry: &EpgEntry) -> bool {
        eligibility::is_playable(
            entry.start,
            entry.end,
            Utc::now(),
            self.session.membership(),
            self.catchup_window,
        )
    }

    /// Whether a guide entry can be recorded now.
    #[must_use]
    pub fn is_recordable(&self, entry: &EpgEntry) -> bool {
        eligibility::is_recordable(entry.end, Utc::now(), self.catchup_window)
    }

    /// Session snapshot, if logged in.
    #[must_use]
    pub fn current_session(&self) -> Option<Session> {
        self.session.session()
    }
}

/// Maps a broadcast listing item to a guide entry.
fn to_epg_entry(item: BroadcastItem, channel_id: i64) -> EpgEntry {
    EpgEntry {
        broadcast_id: item.id,
        channel_id,
        title: item.title,
        original_title: item.original_title,
        episode_name: item.subtitle,
        plot_outline: item.headline,
        plot: item.short_description,
        genre: item.kind,
        start: parse_api_datetime_or_epoch(&item.begin),
        end: parse_api_datetime_or_epoch(&item.end),
        year: item.year,
        season: item.serie_season,
        episode: item.serie_episode,
    }
}

impl EpgSource for ApiClient {
    #[instrument(skip_all, fields(channel_id = job.channel_id))]
    async fn fetch_epg_window(&self, job: &EpgJob, sink: &dyn PvrSink) -> Result<usize> {
        let session = self.session.require()?;
        self.paginate(
            |skip| broadcasts_path(&session.user_id, job.channel_id, job.start, job.end, skip),
            |item: BroadcastItem| sink.emit_epg_entry(to_epg_entry(item, job.channel_id)),
        )
        .await
        .inspect(|count| {
            tracing::debug!(channel_id = job.channel_id, count, "Loaded epg entries");
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use std::sync::Mutex;

    use chrono::TimeZone;
    use serde_json::Value;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::session::{Membership, PortalCredentials};

    #[derive(Default)]
    struct CollectingSink {
        epg: Mutex<Vec<EpgEntry>>,
        channels: Mutex<Vec<(i64, u32)>>,
        recordings: Mutex<Vec<Recording>>,
        timers: Mutex<Vec<Timer>>,
    }

    impl PvrSink for CollectingSink {
        fn emit_epg_entry(&self, entry: EpgEntry) {
            self.epg.lock().unwrap().push(entry);
        }
        fn emit_channel(&self, channel: &Channel, number: u32) {
            self.channels.lock().unwrap().push((channel.id, number));
        }
        fn emit_recording(&self, recording: Recording) {
            self.recordings.lock().unwrap().push(recording);
        }
        fn emit_timer(&self, timer: Timer) {
            self.timers.lock().unwrap().push(timer);
        }
        fn request_timers_refresh(&self) {}
        fn request_recordings_refresh(&self) {}
    }

    fn ok(data: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
    }

    fn logged_in_client(server: &MockServer, state: Arc<SchedulerState>) -> ApiClient {
        let client = ApiClient::builder()
            .api_url(format!("{}/", server.uri()).parse().unwrap())
            .user_agent("test/0.0.0")
            .scheduler_state(state)
            .build()
            .unwrap();
        client.session.set_cookie("cookie1");
        client.session.set_credentials(PortalCredentials {
            api_key: String::from("KEY"),
            user_id: String::from("42"),
            membership: Membership {
                plus: true,
                comfort: false,
            },
        });
        client
    }

    fn default_state() -> Arc<SchedulerState> {
        Arc::new(SchedulerState::new(DEFAULT_REFRESH_INTERVAL, Utc::now()))
    }

    fn broadcasts(range: std::ops::Range<i64>) -> Vec<Value> {
        range
            .map(|id| {
                json!({
                    "id": id,
                    "title": format!("Show {id}"),
                    "begin": "2024-01-01T20:00:00+0100",
                    "end": "2024-01-01T21:00:00+0100",
                    "type": "Serie",
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_requests_carry_auth_headers() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/42/recordings/77"))
            .and(header("x-teleboy-apikey", "KEY"))
            .and(header("x-teleboy-device-type", "desktop"))
            .and(header("x-teleboy-session", "cookie1"))
            .and(header("x-teleboy-version", "1.5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
            .expect(1)
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());

        // Act & Assert
        client.delete_recording("77").await.unwrap();
    }

    #[tokio::test]
    async fn test_session_cookie_renewed_from_api_response() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/42/recordings/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "cinergy_s=cookie2; Path=/")
                    .set_body_string(r#"{"success": true}"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/users/42/recordings/2"))
            .and(header("x-teleboy-session", "cookie2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
            .expect(1)
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());

        // Act
        client.delete_recording("1").await.unwrap();
        client.delete_recording("2").await.unwrap();

        // Assert
        assert_eq!(client.current_session().unwrap().session_cookie, "cookie2");
    }

    #[tokio::test]
    async fn test_not_logged_in_fails_without_request() {
        // Arrange
        let server = MockServer::start().await;
        let client = ApiClient::builder()
            .api_url(format!("{}/", server.uri()).parse().unwrap())
            .build()
            .unwrap();

        // Act
        let result = client.load_channels().await;

        // Assert
        assert!(matches!(result, Err(Error::NotLoggedIn)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_channels_orders_favorites_first() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/epg/stations"))
            .and(query_param("language", "de"))
            .respond_with(ok(json!({ "items": [
                { "id": 1, "name": "One", "has_stream": true },
                { "id": 2, "name": "Two", "has_stream": true },
                { "id": 4, "name": "NoStream", "has_stream": false },
                { "id": 3, "name": "Three", "has_stream": true },
            ]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/42/stations"))
            .respond_with(ok(json!({ "items": [3, 1, 9] })))
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());
        let sink = CollectingSink::default();

        // Act
        let count = client.load_channels().await.unwrap();
        client.list_channels(false, &sink);

        // Assert
        assert_eq!(count, 3);
        assert_eq!(client.channel_count(true), 2);
        assert_eq!(*sink.channels.lock().unwrap(), vec![(3, 1), (1, 2), (2, 3)]);
    }

    #[tokio::test]
    async fn test_load_channels_requires_both_calls() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/epg/stations"))
            .respond_with(ok(json!({ "items": [{ "id": 1, "name": "One", "has_stream": true }] })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/42/stations"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": false}"#))
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());

        // Act
        let result = client.load_channels().await;

        // Assert
        assert!(matches!(result, Err(Error::Protocol(_))));
        assert_eq!(client.channel_count(false), 0);
    }

    #[tokio::test]
    async fn test_epg_window_paginates_to_reported_total() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42/broadcasts"))
            .and(query_param("station", "303"))
            .and(query_param("limit", "500"))
            .and(query_param("skip", "0"))
            .and(query_param("begin", "2024-01-01 00:00:00"))
            .respond_with(ok(json!({ "total": 650, "items": broadcasts(0..500) })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/42/broadcasts"))
            .and(query_param("skip", "500"))
            .respond_with(ok(json!({ "total": 650, "items": broadcasts(500..650) })))
            .expect(1)
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());
        let sink = CollectingSink::default();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let job = EpgJob::new(303, start, start + Duration::days(1));

        // Act
        let count = client.fetch_epg_window(&job, &sink).await.unwrap();

        // Assert
        let epg = sink.epg.lock().unwrap();
        assert_eq!(count, 650);
        assert_eq!(epg.len(), 650);
        let ids: Vec<i64> = epg.iter().map(|e| e.broadcast_id).collect();
        assert_eq!(ids, (0..650).collect::<Vec<_>>());
        assert_eq!(epg[0].channel_id, 303);
        assert_eq!(epg[0].genre, "Serie");
        assert_eq!(epg[0].start, Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_epg_window_keeps_partial_data_on_failed_page() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42/broadcasts"))
            .and(query_param("skip", "0"))
            .respond_with(ok(json!({ "total": 650, "items": broadcasts(0..500) })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/42/broadcasts"))
            .and(query_param("skip", "500"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>error</html>"))
            .expect(1)
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());
        let sink = CollectingSink::default();
        let now = Utc::now();

        // Act
        let result = client
            .fetch_epg_window(&EpgJob::new(1, now, now + Duration::hours(6)), &sink)
            .await;

        // Assert
        assert!(matches!(result, Err(Error::Json(_))));
        assert_eq!(sink.epg.lock().unwrap().len(), 500);
    }

    #[tokio::test]
    async fn test_planned_recordings_lower_deadline() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42/recordings/planned"))
            .and(query_param("limit", "100"))
            .respond_with(ok(json!({ "total": 2, "items": [
                { "id": 10, "station_id": 1, "title": "Late", "begin": "2030-01-01T22:00:00Z", "end": "2030-01-01T23:00:00Z" },
                { "id": 11, "station_id": 1, "title": "Soon", "subtitle": "Pilot", "begin": "2029-12-31T09:00:00Z", "end": "2029-12-31T10:00:00Z" },
            ]})))
            .mount(&server)
            .await;
        let state = Arc::new(SchedulerState::new(
            Duration::days(36_500),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let client = logged_in_client(&server, Arc::clone(&state));
        let sink = CollectingSink::default();

        // Act
        let count = client.list_recordings(RECORDINGS_PLANNED, &sink).await.unwrap();

        // Assert
        assert_eq!(count, 2);
        let timers = sink.timers.lock().unwrap();
        assert_eq!(timers[1].summary, "Pilot");
        let expected: DateTime<Utc> = Utc.with_ymd_and_hms(2029, 12, 31, 10, 21, 0).unwrap();
        assert_eq!(state.deadline(), expected);
    }

    #[tokio::test]
    async fn test_ready_recordings_use_lineup_names() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42/recordings/ready"))
            .respond_with(ok(json!({ "total": 1, "items": [
                { "id": 5, "station_id": 1, "title": "Doc", "begin": "2024-01-01T20:00:00Z", "end": "2024-01-01T21:30:00Z" },
            ]})))
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());
        *client.lineup.write().unwrap() = ChannelLineup::new([Channel::new(1, "One")], &[]);
        let sink = CollectingSink::default();

        // Act
        client.list_recordings(RECORDINGS_READY, &sink).await.unwrap();

        // Assert
        let recordings = sink.recordings.lock().unwrap();
        assert_eq!(recordings[0].id, "5");
        assert_eq!(recordings[0].channel_name, "One");
        assert_eq!(recordings[0].duration_secs, 5_400);
        assert!(sink.timers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_posts_broadcast() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/42/recordings"))
            .and(body_json(json!({ "broadcast": 1234, "alternative": false })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
            .expect(1)
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());

        // Act & Assert
        client.record(1234).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_live_stream_follows_redirects() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/42/stream/live/303"))
            .and(query_param("alternative", "false"))
            .respond_with(ok(json!({ "stream": { "url": format!("{}/hop", server.uri()) } })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/hop"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/final.m3u8", server.uri())),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/final.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U"))
            .mount(&server)
            .await;
        let client = logged_in_client(&server, default_state());

        // Act
        let url = client.resolve_stream_url(&StreamKind::Live(303)).await.unwrap();

        // Assert
        assert_eq!(url, format!("{}/final.m3u8", server.uri()));
    }

    #[test]
    fn test_stream_paths() {
        // Arrange & Act & Assert
        assert_eq!(
            StreamKind::Recording(String::from("9")).path("42"),
            "users/42/stream/recording/9"
        );
        assert_eq!(StreamKind::Replay(8).path("42"), "users/42/stream/replay/8");
    }
}
