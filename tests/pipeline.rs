//! Pipeline orchestration tests
//!
//! Stage ordering and short-circuiting use in-process doubles; the end-to-end
//! cases drive the real HTTP clients against wiremock and the real media
//! stages against shell-script stand-ins for the tools.

use avatar_gateway::{Pipeline, Query, Stage, StageFailure};

mod common;
use common::{CUES, Call, Fakes, MP3, REPLY, SENTIMENT, WAV, unavailable};

fn query(text: &str) -> Query {
    Query::new(text).unwrap()
}

#[tokio::test]
async fn test_stages_run_in_order_with_propagated_values() {
    let fakes = Fakes::default();
    let outcome = fakes.media_pipeline().run(&query("I love this")).await.unwrap();

    assert_eq!(
        fakes.log.calls(),
        vec![
            Call::Sentiment("I love this".to_string()),
            Call::Response {
                query: "I love this".to_string(),
                sentiment: "positive".to_string(),
            },
            Call::Speech(REPLY.to_string()),
            Call::Transcode(MP3.to_vec()),
            Call::LipSync(WAV.to_vec()),
        ]
    );
    assert_eq!(outcome.sentiment, SENTIMENT);
    assert_eq!(outcome.response_text, REPLY);
    assert_eq!(outcome.audio, WAV);
    assert_eq!(outcome.lip_sync.as_deref(), Some(CUES));
}

#[tokio::test]
async fn test_response_generation_called_once_and_feeds_tts() {
    let fakes = Fakes {
        reply: Ok("So happy for you".to_string()),
        ..Fakes::default()
    };
    fakes.pipeline().run(&query("I love this")).await.unwrap();

    let calls = fakes.log.calls();
    let responses: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, Call::Response { .. }))
        .collect();
    assert_eq!(
        responses,
        vec![&Call::Response {
            query: "I love this".to_string(),
            sentiment: "positive".to_string(),
        }]
    );
    assert_eq!(calls.last(), Some(&Call::Speech("So happy for you".to_string())));
}

#[tokio::test]
async fn test_without_media_audio_is_tts_output() {
    let fakes = Fakes::default();
    let outcome = fakes.pipeline().run(&query("hi")).await.unwrap();

    assert_eq!(outcome.audio, MP3);
    assert!(outcome.lip_sync.is_none());
    assert_eq!(fakes.log.calls().len(), 3);
}

#[tokio::test]
async fn test_sentiment_failure_short_circuits() {
    let failure = StageFailure::status(500, "model offline");
    let fakes = Fakes {
        sentiment: Err(failure.clone()),
        ..Fakes::default()
    };

    let err = fakes.media_pipeline().run(&query("hi")).await.unwrap_err();

    assert_eq!(err.stage, Stage::Sentiment);
    assert_eq!(err.failure, failure);
    assert_eq!(fakes.log.calls(), vec![Call::Sentiment("hi".to_string())]);
}

#[tokio::test]
async fn test_response_failure_skips_tts() {
    let fakes = Fakes {
        reply: Err(StageFailure::MissingField("response")),
        ..Fakes::default()
    };

    let err = fakes.pipeline().run(&query("hi")).await.unwrap_err();

    assert_eq!(err.stage, Stage::Response);
    assert!(!fakes.log.calls().iter().any(|c| matches!(c, Call::Speech(_))));
}

#[tokio::test]
async fn test_speech_failure_skips_media() {
    let fakes = Fakes {
        audio: Err(unavailable()),
        ..Fakes::default()
    };

    let err = fakes.media_pipeline().run(&query("hi")).await.unwrap_err();

    assert_eq!(err.stage, Stage::Speech);
    assert_eq!(fakes.log.calls().len(), 3);
}

#[tokio::test]
async fn test_transcode_failure_skips_lip_sync() {
    let fakes = Fakes {
        wav: Err(StageFailure::tool_exit("ffmpeg", Some(1), "Invalid data")),
        ..Fakes::default()
    };

    let err = fakes.media_pipeline().run(&query("hi")).await.unwrap_err();

    assert_eq!(err.stage, Stage::Transcode);
    assert!(!fakes.log.calls().iter().any(|c| matches!(c, Call::LipSync(_))));
}

#[tokio::test]
async fn test_lip_sync_failure_discards_everything() {
    let fakes = Fakes {
        lip_sync: Err(StageFailure::Timeout("rhubarb after 60s".to_string())),
        ..Fakes::default()
    };

    let err = fakes.media_pipeline().run(&query("hi")).await.unwrap_err();

    assert_eq!(err.stage, Stage::LipSync);
    assert_eq!(fakes.log.calls().len(), 5);
}

#[tokio::test]
async fn test_pipelines_are_reusable_across_requests() {
    let fakes = Fakes::default();
    let pipeline: Pipeline = fakes.pipeline();

    pipeline.run(&query("first")).await.unwrap();
    pipeline.run(&query("second")).await.unwrap();

    assert_eq!(fakes.log.calls().len(), 6);
    assert_eq!(fakes.log.calls()[3], Call::Sentiment("second".to_string()));
}

#[cfg(unix)]
mod end_to_end {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use avatar_gateway::Config;
    use avatar_gateway::api::ApiServerBuilder;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::common::tools::{leftover_entries, wav_fixture, write_script};
    use crate::common::{audio_bytes, post_chat};

    const TTS_AUDIO: &[u8] = &[0x49, 0x44, 0x33, 0x04, 0x00, 0xFF, 0xFB];

    /// Mount all three upstream services on one mock server
    async fn mount_upstreams(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({"query": "I love this"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"sentiment": "positive"})),
            )
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/generate-response"))
            .and(body_json(json!({"query": "I love this", "emotion": "positive"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": REPLY})))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_json(json!({"text": REPLY})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(TTS_AUDIO.to_vec()))
            .expect(1)
            .mount(server)
            .await;
    }

    struct Tools {
        _bin: tempfile::TempDir,
        scratch: tempfile::TempDir,
        ffmpeg: PathBuf,
        rhubarb: PathBuf,
        wav: Vec<u8>,
    }

    /// Script tools: ffmpeg copies a real WAV, rhubarb writes fixed cues
    fn tools(rhubarb_body: &str) -> Tools {
        let bin = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let wav = wav_fixture();
        let fixture = bin.path().join("fixture.wav");
        std::fs::write(&fixture, &wav).unwrap();

        let copy = format!("cp '{}' \"$6\"", fixture.display());
        let ffmpeg = write_script(bin.path(), "ffmpeg", &copy);
        let rhubarb = write_script(bin.path(), "rhubarb", rhubarb_body);

        Tools {
            _bin: bin,
            scratch,
            ffmpeg,
            rhubarb,
            wav,
        }
    }

    fn config(server: &MockServer, tools: &Tools) -> Config {
        let mut config = Config::default();
        config.services.sentiment_url = server.uri();
        config.services.response_url = server.uri();
        config.services.tts_url = server.uri();
        config.services.timeout = Duration::from_secs(5);
        config.media.enabled = true;
        config.media.ffmpeg_path = tools.ffmpeg.clone();
        config.media.rhubarb_path = tools.rhubarb.clone();
        config.media.tool_timeout = Duration::from_secs(5);
        config.media.scratch_dir = Some(tools.scratch.path().to_path_buf());
        config
    }

    #[tokio::test]
    async fn test_full_chat_over_http_and_tools() {
        let server = MockServer::start().await;
        mount_upstreams(&server).await;
        let tools = tools(&format!("printf '%s' '{CUES}' > \"$4\""));
        let config = config(&server, &tools);

        let pipeline = Arc::new(Pipeline::from_config(&config).unwrap());
        let app = ApiServerBuilder::new(pipeline, 0)
            .media_config(&config.media)
            .build()
            .router();

        let (status, json) = post_chat(app, r#"{"query": "I love this"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["response_text"], REPLY);
        assert_eq!(audio_bytes(&json), tools.wav);
        assert_eq!(json["lip_sync_data"], CUES);
        assert_eq!(leftover_entries(tools.scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_lip_sync_tool_failure_leaves_no_scratch_files() {
        let server = MockServer::start().await;
        mount_upstreams(&server).await;
        let tools = tools("echo 'recognizer crashed' >&2\nexit 2");
        let config = config(&server, &tools);

        let err = Pipeline::from_config(&config)
            .unwrap()
            .run(&query("I love this"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::LipSync);
        assert!(matches!(err.failure, StageFailure::ToolExit { code: Some(2), .. }));
        assert_eq!(leftover_entries(tools.scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_upstream_outage_skips_later_services() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/generate-response"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tools = tools("exit 0");
        let config = config(&server, &tools);

        let err = Pipeline::from_config(&config)
            .unwrap()
            .run(&query("I love this"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Sentiment);
        assert!(matches!(err.failure, StageFailure::Status { status: 502, .. }));
        assert_eq!(leftover_entries(tools.scratch.path()), 0);
        server.verify().await;
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_upstream_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tools = tools("exit 0");
        let config = config(&server, &tools);
        let pipeline = Arc::new(Pipeline::from_config(&config).unwrap());
        let app = ApiServerBuilder::new(pipeline, 0).build().router();

        let (status, _) = post_chat(app, r#"{"query": ""}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        server.verify().await;
    }
}
