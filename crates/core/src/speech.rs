//! Text-to-Speech Forwarding
//!
//! Hands generated replies to an external speech-synthesis server. The
//! outcome only ever reaches the log: a failed or slow TTS server must not
//! delay or fail the chat response.

use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::{Url, form_urlencoded};

/// Forwards text to a `GET <url>?text=...` speech endpoint.
#[derive(Debug, Clone)]
pub struct SpeechForwarder {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl SpeechForwarder {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            timeout,
        }
    }

    /// Parses `url` and builds a forwarder for it.
    pub fn parse(url: &str, timeout: Duration) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, timeout))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Appends `text=<text>` to the configured URL, percent-encoding spaces
    /// as `%20` rather than the form-style `+`.
    fn url_for(&self, text: &str) -> Url {
        let encoded: String = form_urlencoded::byte_serialize(text.as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        let query = match self.url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&text={encoded}"),
            _ => format!("text={encoded}"),
        };
        let mut url = self.url.clone();
        url.set_query(Some(&query));
        url
    }

    /// Sends `text` and reports whether the server accepted it.
    pub async fn forward(&self, text: &str) -> bool {
        if text.is_empty() {
            warn!("TTS: no text provided");
            return false;
        }

        let url = self.url_for(text);
        let preview: String = url.as_str().chars().take(100).collect();
        info!(url = %preview, "Sending text to TTS");

        let result = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        match result {
            Ok(response) => {
                info!(status = response.status().as_u16(), "TTS request succeeded");
                true
            }
            Err(e) => {
                error!(tts_url = %self.url, error = %e, "Error sending text to TTS server");
                false
            }
        }
    }

    /// Runs [`forward`](Self::forward) as a detached task.
    ///
    /// The handle may be dropped; the task still runs to completion.
    pub fn spawn(self: &Arc<Self>, text: String) -> JoinHandle<bool> {
        let forwarder = Arc::clone(self);
        tokio::spawn(async move { forwarder.forward(&text).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn forwarder(base: &str) -> SpeechForwarder {
        SpeechForwarder::parse(&format!("{base}/api/voice"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_rejects_bad_url() {
        assert!(SpeechForwarder::parse("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_text_is_percent_encoded() {
        let plain = forwarder("http://tts.local");
        assert_eq!(
            plain.url_for("a+b c&d").as_str(),
            "http://tts.local/api/voice?text=a%2Bb%20c%26d"
        );

        let with_query =
            SpeechForwarder::parse("http://tts.local/api/voice?speaker=1", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            with_query.url_for("はい").query(),
            Some("speaker=1&text=%E3%81%AF%E3%81%84")
        );
    }

    #[tokio::test]
    async fn test_forward_sends_raw_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/voice")
            .match_query(Matcher::Exact("text=I%20have%20pain%20%26%20fear".into()))
            .with_status(200)
            .create_async()
            .await;

        assert!(forwarder(&server.url()).forward("I have pain & fear").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_encodes_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/voice")
            .match_query(Matcher::UrlEncoded("text".into(), "痛みが あります&".into()))
            .with_status(200)
            .create_async()
            .await;

        assert!(forwarder(&server.url()).forward("痛みが あります&").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_empty_text_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        assert!(!forwarder(&server.url()).forward("").await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forward_non_success_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/voice")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        assert!(!forwarder(&server.url()).forward("hello").await);
    }

    #[tokio::test]
    async fn test_spawn_runs_detached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/voice")
            .match_query(Matcher::UrlEncoded("text".into(), "detached".into()))
            .with_status(204)
            .create_async()
            .await;

        let forwarder = Arc::new(forwarder(&server.url()));
        let handle = forwarder.spawn("detached".to_string());
        assert!(handle.await.unwrap());
        mock.assert_async().await;
    }
}
