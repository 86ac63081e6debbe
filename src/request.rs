use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, Response};

use crate::config::PortalConfig;
use crate::identifier::ProcessIdentifier;
use crate::Result;

/// Requests the result page for one process and returns its HTML.
///
/// Two round trips: the first only collects the session cookie, the second posts the
/// query with it. Each carries its own timeout.
pub(crate) async fn request_process_html(
    client: &Client,
    portal: &PortalConfig,
    id: &ProcessIdentifier,
) -> Result<String> {
    let session = open_session(client, portal).await?;
    tracing::debug!(process = %id, has_session = session.is_some(), "session established");

    let mut req = client
        .post(portal.query_url())
        .timeout(portal.query_timeout())
        .form(&[(portal.query_field.as_str(), id.canonical())]);
    if let Some(cookie) = session {
        req = req.header(COOKIE, cookie);
    }

    let res = req.send().await?.error_for_status()?;
    let html = res.text().await?;
    Ok(html)
}

/// Returns the `Cookie` header value built from the session page's `Set-Cookie`s, if any.
async fn open_session(client: &Client, portal: &PortalConfig) -> Result<Option<String>> {
    let res = client
        .get(portal.session_url())
        .timeout(portal.session_timeout())
        .send()
        .await?
        .error_for_status()?;
    Ok(session_cookie(&res))
}

fn session_cookie(res: &Response) -> Option<String> {
    let pairs: Vec<&str> = res
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}
