//! Portal login and response classification.
//!
//! The portal answers its form-encoded login action with a short body
//! rather than a status code: an error marker for rejected or disabled
//! accounts, anything else for success. Classification is case-insensitive
//! over the trimmed, quote-stripped body. A non-success classification is
//! fatal for the run and is never retried within it.

use tracing::{info, warn};

use crate::error::AuthError;
use crate::portal::{parser, EndpointCatalog};
use crate::types::PortalCredentials;

use super::SessionClient;

/// Marker the portal embeds when the username/password pair is wrong.
const INVALID_MARKER: &str = "invalid_credentials";
/// Exact body for an administratively blocked account.
const BLOCKED_MARKER: &str = "blocked";
/// Exact body for a paused (suspended billing) account.
const PAUSED_MARKER: &str = "paused";

/// Log in and prime the session.
///
/// Loads the anonymous entry page to receive the anti-forgery cookies,
/// submits the credentials, classifies the response, and on success parses
/// the practice identifier out of the landing page (best-effort).
pub async fn login(
    client: &SessionClient,
    catalog: &EndpointCatalog,
    credentials: &PortalCredentials,
) -> Result<(), AuthError> {
    client
        .get(&catalog.url(&catalog.entry_page))
        .await
        .map_err(AuthError::Portal)?;

    let form = vec![
        ("username".to_string(), credentials.username.clone()),
        (
            "password".to_string(),
            credentials.password.expose().to_string(),
        ),
    ];
    let response = client
        .post_form(&catalog.url(&catalog.login_action), form)
        .await
        .map_err(AuthError::Portal)?;

    classify(&response.body)?;
    info!(username = %credentials.username, "portal login succeeded");

    match client.get(&catalog.url(&catalog.landing_page)).await {
        Ok(landing) => {
            if let Some(id) = parser::practice_id(&landing.body) {
                client.set_practice_id(id);
            }
        }
        Err(e) => {
            warn!(error = %e, "could not load landing page for practice id");
        }
    }

    Ok(())
}

/// Classify a login response body.
fn classify(body: &str) -> Result<(), AuthError> {
    let verdict = body.trim().trim_matches('"').trim().to_lowercase();

    if verdict == BLOCKED_MARKER {
        return Err(AuthError::Blocked);
    }
    if verdict == PAUSED_MARKER {
        return Err(AuthError::Paused);
    }
    if verdict.contains(INVALID_MARKER) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::PortalResponse;
    use crate::testing::MockTransport;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(login_body: &str) -> (SessionClient, Arc<MockTransport>, EndpointCatalog) {
        let catalog = EndpointCatalog::default();
        let transport = Arc::new(
            MockTransport::new()
                .with_response(
                    "/login",
                    PortalResponse::new(200, "<html><form></form></html>")
                        .with_header("Set-Cookie", "xsrf=seed"),
                )
                .with_response(
                    "/login/validate",
                    PortalResponse::new(200, login_body)
                        .with_header("Set-Cookie", "session=authed"),
                )
                .with_page(
                    "/dashboard",
                    r#"<input type="hidden" name="practiceId" value="PR-12">"#,
                ),
        );
        let client = SessionClient::new(transport.clone(), Duration::ZERO);
        (client, transport, catalog)
    }

    fn credentials() -> PortalCredentials {
        PortalCredentials::new("frontdesk", "hunter2")
    }

    #[tokio::test]
    async fn successful_login_leaves_cookies_and_practice_id() {
        let (client, _, catalog) = setup("welcome");
        login(&client, &catalog, &credentials()).await.unwrap();

        assert!(client.cookie_count() > 0);
        assert_eq!(client.practice_id().as_deref(), Some("PR-12"));
    }

    #[tokio::test]
    async fn invalid_credentials_marker_is_classified() {
        let (client, transport, catalog) = setup(r#""INVALID_CREDENTIALS: try again""#);
        let err = login(&client, &catalog, &credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        // entry page + login action, nothing after the failure
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn blocked_is_exact_match_only() {
        let (client, _, catalog) = setup("  \"Blocked\"  ");
        let err = login(&client, &catalog, &credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::Blocked));

        // a body merely containing the word is a success
        assert!(classify("account not blocked today").is_ok());
    }

    #[tokio::test]
    async fn paused_is_exact_match_only() {
        let (client, _, catalog) = setup("PAUSED");
        let err = login(&client, &catalog, &credentials()).await.unwrap_err();
        assert!(matches!(err, AuthError::Paused));
    }

    #[tokio::test]
    async fn credentials_are_submitted_form_encoded() {
        let (client, transport, catalog) = setup("ok");
        login(&client, &catalog, &credentials()).await.unwrap();

        let calls = transport.calls();
        let form = calls[1].form.clone().unwrap();
        assert!(form.contains(&("username".to_string(), "frontdesk".to_string())));
        assert!(form.contains(&("password".to_string(), "hunter2".to_string())));
    }

    #[test]
    fn classification_table() {
        assert!(classify("anything else").is_ok());
        assert!(classify("").is_ok());
        assert!(matches!(
            classify("invalid_credentials"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(classify("\"blocked\""), Err(AuthError::Blocked)));
        assert!(matches!(classify(" paused \n"), Err(AuthError::Paused)));
    }
}
