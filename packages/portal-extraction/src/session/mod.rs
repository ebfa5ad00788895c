//! Browser-equivalent portal session.
//!
//! - [`transport`] - single-exchange transport trait + reqwest implementation
//! - [`auth`] - login and response classification
//!
//! `SessionClient` wraps a transport with the run's cookie jar, a fixed
//! browser-identifying header set, manual redirect following, and the
//! inter-request pacing the portal demands. All session state is owned by
//! one engine run and rebuilt from scratch on every invocation;
//! continuations re-authenticate rather than resuming a prior session.

pub mod auth;
pub mod transport;

use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{PortalError, PortalResult};
use transport::{Method, PortalRequest, PortalResponse, PortalTransport};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_AJAX: &str = "application/json, text/javascript, */*; q=0.01";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Redirect chains longer than this are treated as a portal fault.
const MAX_REDIRECT_HOPS: usize = 10;

/// Accumulated session state for one run.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Cookie name -> raw `name=value` pair. Last value wins per name.
    pub cookies: HashMap<String, String>,
    /// Tenant/practice identifier parsed from an authenticated page.
    pub practice_id: Option<String>,
}

impl SessionState {
    /// The `Cookie` request header for the current jar, if any.
    fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn merge_set_cookie(&mut self, raw: &str) {
        let pair = raw.split(';').next().unwrap_or("").trim();
        if let Some((name, _)) = pair.split_once('=') {
            self.cookies.insert(name.trim().to_string(), pair.to_string());
        }
    }
}

/// Session-scoped portal client.
pub struct SessionClient {
    transport: Arc<dyn PortalTransport>,
    state: Mutex<SessionState>,
    limiter: Option<Arc<DefaultRateLimiter>>,
}

impl SessionClient {
    /// Create a client with the given inter-request spacing. A zero spacing
    /// disables pacing (tests).
    pub fn new(transport: Arc<dyn PortalTransport>, request_spacing: Duration) -> Self {
        let limiter = Quota::with_period(request_spacing)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self {
            transport,
            state: Mutex::new(SessionState::default()),
            limiter,
        }
    }

    /// Snapshot of the current session state.
    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    pub fn cookie_count(&self) -> usize {
        self.state.lock().unwrap().cookies.len()
    }

    pub fn practice_id(&self) -> Option<String> {
        self.state.lock().unwrap().practice_id.clone()
    }

    pub fn set_practice_id(&self, id: impl Into<String>) {
        self.state.lock().unwrap().practice_id = Some(id.into());
    }

    /// GET with manual redirect following.
    pub async fn get(&self, url: &str) -> PortalResult<PortalResponse> {
        self.send_following(Method::Get, url, None).await
    }

    /// Form POST with manual redirect following.
    pub async fn post_form(
        &self,
        url: &str,
        form: Vec<(String, String)>,
    ) -> PortalResult<PortalResponse> {
        self.send_following(Method::Post, url, Some(form)).await
    }

    /// Script-originated GET. Never follows redirects; the raw status comes
    /// back so callers can spot a redirect-to-login disguised as data.
    pub async fn ajax_get(&self, url: &str) -> PortalResult<PortalResponse> {
        self.send_once(Method::Get, url, None, true).await
    }

    /// Script-originated form POST, no redirect following.
    pub async fn ajax_post_form(
        &self,
        url: &str,
        form: Vec<(String, String)>,
    ) -> PortalResult<PortalResponse> {
        self.send_once(Method::Post, url, Some(form), true).await
    }

    async fn send_following(
        &self,
        method: Method,
        url: &str,
        form: Option<Vec<(String, String)>>,
    ) -> PortalResult<PortalResponse> {
        let original_url = url.to_string();
        let mut current_url = original_url.clone();
        let mut method = method;
        let mut form = form;

        let mut response = self
            .send_once(method, &current_url, form.clone(), false)
            .await?;
        let mut hops = 0;

        while response.is_redirect() {
            if hops >= MAX_REDIRECT_HOPS {
                return Err(PortalError::TooManyRedirects { url: original_url });
            }
            hops += 1;

            let location = response
                .header("location")
                .ok_or_else(|| PortalError::MissingRedirectTarget {
                    url: current_url.clone(),
                })?
                .to_string();
            let next_url = resolve_location(&current_url, &location)?;
            debug!(from = %current_url, to = %next_url, hop = hops, "following redirect");

            // 307 preserves method and body; everything else degrades to GET.
            if response.status != 307 {
                method = Method::Get;
                form = None;
            }
            current_url = next_url;
            response = self
                .send_once(method, &current_url, form.clone(), false)
                .await?;
        }

        Ok(response)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        form: Option<Vec<(String, String)>>,
        ajax: bool,
    ) -> PortalResult<PortalResponse> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut request = PortalRequest {
            method,
            url: url.to_string(),
            headers: Vec::new(),
            form,
        }
        .with_header("User-Agent", USER_AGENT)
        .with_header("Accept", if ajax { ACCEPT_AJAX } else { ACCEPT_HTML })
        .with_header("Accept-Language", ACCEPT_LANGUAGE);

        if ajax {
            request = request.with_header("X-Requested-With", "XMLHttpRequest");
        }
        if let Some(cookie) = self.state.lock().unwrap().cookie_header() {
            request = request.with_header("Cookie", cookie);
        }

        let response = self.transport.execute(request).await?;

        {
            let mut state = self.state.lock().unwrap();
            for raw in response.set_cookies() {
                state.merge_set_cookie(raw);
            }
        }

        Ok(response)
    }
}

fn resolve_location(current: &str, location: &str) -> PortalResult<String> {
    let base = Url::parse(current).map_err(|_| PortalError::InvalidUrl {
        url: current.to_string(),
    })?;
    let resolved = base.join(location).map_err(|_| PortalError::InvalidUrl {
        url: location.to_string(),
    })?;
    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::transport::PortalResponse;
    use super::*;
    use crate::testing::MockTransport;

    fn client(mock: MockTransport) -> (SessionClient, Arc<MockTransport>) {
        let transport = Arc::new(mock);
        (
            SessionClient::new(transport.clone(), Duration::ZERO),
            transport,
        )
    }

    #[tokio::test]
    async fn cookies_accumulate_and_last_value_wins() {
        let (client, _) = client(
            MockTransport::new()
                .with_response(
                    "/a",
                    PortalResponse::new(200, "")
                        .with_header("Set-Cookie", "session=first; Path=/")
                        .with_header("Set-Cookie", "token=t1"),
                )
                .with_response(
                    "/b",
                    PortalResponse::new(200, "").with_header("Set-Cookie", "session=second"),
                ),
        );

        client.get("https://portal.test/a").await.unwrap();
        client.get("https://portal.test/b").await.unwrap();

        let state = client.state();
        assert_eq!(state.cookies.len(), 2);
        assert_eq!(state.cookies["session"], "session=second");
        assert_eq!(state.cookies["token"], "token=t1");
    }

    #[tokio::test]
    async fn cookie_header_is_attached_to_later_requests() {
        let (client, transport) = client(
            MockTransport::new()
                .with_response(
                    "/login",
                    PortalResponse::new(200, "").with_header("Set-Cookie", "session=abc"),
                )
                .with_page("/next", "ok"),
        );

        client.get("https://portal.test/login").await.unwrap();
        client.get("https://portal.test/next").await.unwrap();

        let calls = transport.calls();
        let cookie = calls[1]
            .headers
            .iter()
            .find(|(name, _)| name == "Cookie")
            .map(|(_, value)| value.clone());
        assert_eq!(cookie.as_deref(), Some("session=abc"));
    }

    #[tokio::test]
    async fn redirects_are_followed_and_post_downgrades_to_get() {
        let (client, transport) = client(
            MockTransport::new()
                .with_response(
                    "/submit",
                    PortalResponse::new(302, "").with_header("Location", "/done"),
                )
                .with_page("/done", "landed"),
        );

        let response = client
            .post_form(
                "https://portal.test/submit",
                vec![("a".into(), "1".into())],
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "landed");

        let calls = transport.calls();
        assert_eq!(calls[0].method, Method::Post);
        assert_eq!(calls[1].method, Method::Get);
        assert!(calls[1].form.is_none());
    }

    #[tokio::test]
    async fn redirect_loops_are_fatal_after_the_hop_bound() {
        let (client, transport) = client(MockTransport::new().with_response(
            "/loop",
            PortalResponse::new(302, "").with_header("Location", "/loop"),
        ));

        let err = client.get("https://portal.test/loop").await.unwrap_err();
        assert!(matches!(err, PortalError::TooManyRedirects { .. }));
        // initial request + 10 followed hops
        assert_eq!(transport.calls().len(), 11);
    }

    #[tokio::test]
    async fn ajax_requests_never_follow_redirects() {
        let (client, transport) = client(MockTransport::new().with_response(
            "/data",
            PortalResponse::new(302, "").with_header("Location", "/login"),
        ));

        let response = client.ajax_get("https://portal.test/data").await.unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(transport.calls().len(), 1);

        let headers = &transport.calls()[0].headers;
        assert!(headers
            .iter()
            .any(|(name, value)| name == "X-Requested-With" && value == "XMLHttpRequest"));
    }

    #[tokio::test]
    async fn redirect_without_location_is_an_error() {
        let (client, _) =
            client(MockTransport::new().with_response("/bad", PortalResponse::new(302, "")));

        let err = client.get("https://portal.test/bad").await.unwrap_err();
        assert!(matches!(err, PortalError::MissingRedirectTarget { .. }));
    }
}
