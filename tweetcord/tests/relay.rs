//! End-to-end relay against mocked Twitter and Discord endpoints.

use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tweetcord::config::FileConfigSource;
use tweetcord::discord::DiscordClient;
use tweetcord::twitter::{OAuthCredentials, TwitterTransport};
use tweetwatch::{Error, RelayService, StreamError, TransportError};

const PROFILE: &str = r#"
[profiles.default]
follow = ["100"]
track = ["rust"]
feed_channel_id = "42"
"#;

fn stream_body() -> String {
    [
        r#"{"id_str":"1","text":"I love rust","created_at":"Wed Oct 10 20:19:24 +0000 2018","user":{"id_str":"200","name":"Bob","screen_name":"bob"}}"#,
        "",
        r#"{"id_str":"2","text":"Hello world","created_at":"Wed Oct 10 20:19:25 +0000 2018","user":{"id_str":"100","name":"Alice","screen_name":"alice"}}"#,
    ]
    .join("\r\n")
        + "\r\n"
}

async fn service(server: &MockServer, config_path: &std::path::Path) -> RelayService {
    let endpoint = Url::parse(&format!("{}/1.1/statuses/filter.json", server.uri())).unwrap();
    let transport = TwitterTransport::new(OAuthCredentials::default())
        .unwrap()
        .with_endpoint(endpoint);
    let discord = DiscordClient::new("secret", "777")
        .unwrap()
        .with_api_base(server.uri());

    RelayService::new(
        Arc::new(FileConfigSource::new(config_path, "default")),
        Arc::new(discord),
        Arc::new(transport),
    )
}

#[tokio::test]
async fn test_relay_end_to_end() {
    let server = MockServer::start().await;
    let mut config = tempfile::NamedTempFile::new().unwrap();
    config.write_all(PROFILE.as_bytes()).unwrap();

    Mock::given(method("GET"))
        .and(path("/channels/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "guild_id": "777",
            "name": "feed",
        })))
        .expect(1)
        .mount(&server)
        .await;

    // First connection delivers posts, the reconnect is refused for good.
    Mock::given(method("POST"))
        .and(path("/1.1/statuses/filter.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stream_body()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1.1/statuses/filter.json"))
        .respond_with(ResponseTemplate::new(420).set_body_string("Enhance Your Calm"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/channels/42/messages"))
        .and(body_partial_json(json!({
            "embeds": [{
                "title": "Alice just tweeted:",
                "description": "Hello world",
                "url": "https://twitter.com/alice/status/2",
            }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let err = service(&server, config.path())
        .await
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Stream(StreamError::Terminal(TransportError::Http { status: 420, .. }))
    ));
}

#[tokio::test]
async fn test_foreign_channel_never_opens_stream() {
    let server = MockServer::start().await;
    let mut config = tempfile::NamedTempFile::new().unwrap();
    config.write_all(PROFILE.as_bytes()).unwrap();

    Mock::given(method("GET"))
        .and(path("/channels/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "guild_id": "999",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = service(&server, config.path())
        .await
        .run(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChannelResolution { .. }));
}
