//! Filtered statuses stream over HTTP.
//!
//! The handshake is a signed `POST`; the response body is a never-ending
//! sequence of `\r\n`-delimited JSON lines decoded by [`tweetwatch::codec`].

pub mod oauth;

pub use oauth::OAuthCredentials;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::debug;
use tweetwatch::stream::MessageStream;
use tweetwatch::{FilterParams, StreamTransport, TransportError, decode_message};
use url::Url;

use crate::http_client::build_client;
use oauth::Nonce;

/// Filtered stream endpoint.
pub const FILTER_ENDPOINT: &str = "https://stream.twitter.com/1.1/statuses/filter.json";

/// Lines longer than this are skipped.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// [`StreamTransport`] for the provider's filtered stream.
pub struct TwitterTransport {
    client: Client,
    endpoint: Url,
    credentials: OAuthCredentials,
}

impl TwitterTransport {
    pub fn new(credentials: OAuthCredentials) -> crate::Result<Self> {
        Ok(Self {
            client: build_client(None)?,
            endpoint: Url::parse(FILTER_ENDPOINT)?,
            credentials,
        })
    }

    /// Point the transport at another endpoint.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }
}

/// Form body of the filter request. Empty criteria are omitted.
pub fn form_params(filter: &FilterParams) -> Vec<(String, String)> {
    let mut params = Vec::with_capacity(3);
    if !filter.follow.is_empty() {
        params.push(("follow".to_string(), filter.follow.join(",")));
    }
    if !filter.track.is_empty() {
        params.push(("track".to_string(), filter.track.join(",")));
    }
    params.push(("stall_warnings".to_string(), "true".to_string()));
    params
}

#[async_trait]
impl StreamTransport for TwitterTransport {
    async fn connect(&self, filter: &FilterParams) -> Result<MessageStream, TransportError> {
        let params = form_params(filter);
        let authorization = oauth::authorization_header(
            &self.credentials,
            "POST",
            &self.endpoint,
            &params,
            &Nonce::generate(),
        )
        .map_err(|e| TransportError::network(format!("failed to sign request: {e}")))?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, authorization)
            .form(&params)
            .send()
            .await
            .map_err(TransportError::network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::http(status.as_u16(), body.trim()));
        }
        debug!(status = %status, endpoint = %self.endpoint, "Stream handshake accepted");

        let body = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        );

        Ok(lines
            .map(|line| match line {
                Ok(line) => decode_message(&line),
                Err(LinesCodecError::MaxLineLengthExceeded) => Err(TransportError::decode(
                    format!("line longer than {MAX_LINE_LENGTH} bytes"),
                )),
                Err(LinesCodecError::Io(e)) => Err(TransportError::network(e)),
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweetwatch::StreamMessage;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> TwitterTransport {
        let endpoint = Url::parse(&format!("{}/1.1/statuses/filter.json", server.uri())).unwrap();
        TwitterTransport::new(OAuthCredentials::default())
            .unwrap()
            .with_endpoint(endpoint)
    }

    fn filter() -> FilterParams {
        FilterParams {
            follow: vec!["100".into(), "200".into()],
            track: vec!["rust".into()],
        }
    }

    #[test]
    fn test_form_params() {
        assert_eq!(
            form_params(&filter()),
            vec![
                ("follow".to_string(), "100,200".to_string()),
                ("track".to_string(), "rust".to_string()),
                ("stall_warnings".to_string(), "true".to_string()),
            ]
        );
        assert_eq!(form_params(&FilterParams::default()).len(), 1);
    }

    #[tokio::test]
    async fn test_connect_decodes_lines() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"id_str":"1","text":"hello","created_at":"Wed Oct 10 20:19:24 +0000 2018","user":{"id_str":"100","name":"Alice","screen_name":"alice"}}"#,
            "\r\n",
            "\r\n",
            r#"{"limit":{"track":7}}"#,
            "\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/1.1/statuses/filter.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("follow=100%2C200"))
            .and(body_string_contains("stall_warnings=true"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let messages: Vec<_> = transport(&server)
            .connect(&filter())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], Ok(StreamMessage::Post(post)) if post.id == "1"));
        assert_eq!(messages[1], Ok(StreamMessage::KeepAlive));
        assert_eq!(messages[2], Ok(StreamMessage::Limit { undelivered: 7 }));
    }

    #[tokio::test]
    async fn test_connect_reports_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = transport(&server).connect(&filter()).await.err().unwrap();
        assert_eq!(err, TransportError::http(401, "Unauthorized"));
        assert!(err.is_terminal());
    }
}
