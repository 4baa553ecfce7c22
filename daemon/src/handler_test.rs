use super::*;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, DuplexStream, duplex};
use tokio_util::sync::CancellationToken;

use crate::transcribe::INFERENCE_FAILED_TEXT;

type SeenAudio = Arc<Mutex<Vec<Vec<f32>>>>;

struct StubTranscriber {
    reply: Option<&'static str>,
    seen: SeenAudio,
}

impl Transcriber for StubTranscriber {
    fn transcribe(&mut self, audio: &[f32], _sample_rate: u32) -> anyhow::Result<String> {
        self.seen.lock().unwrap().push(audio.to_vec());
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => anyhow::bail!("whisper_full returned -1"),
        }
    }
}

fn stub(reply: Option<&'static str>) -> (InferenceAdapter<StubTranscriber>, SeenAudio) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let adapter = InferenceAdapter::new(StubTranscriber {
        reply,
        seen: Arc::clone(&seen),
    });
    (adapter, seen)
}

/// Send `request` as the client, close the write side, and collect whatever
/// the server sends back along with the handler's outcome.
async fn exchange_bytes(
    request: &[u8],
    adapter: InferenceAdapter<StubTranscriber>,
    limits: ConnectionLimits,
) -> (Vec<u8>, ConnectionOutcome) {
    let (mut client, server): (DuplexStream, DuplexStream) = duplex(64 * 1024);
    let handler =
        tokio::spawn(async move {
        handle_connection(server, &adapter, &limits, &CancellationToken::new()).await
    });

    client.write_all(request).await.unwrap();
    client.shutdown().await.unwrap();

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    (response, handler.await.unwrap())
}

fn request(pcm: &[u8]) -> Vec<u8> {
    let mut bytes = (pcm.len() as u32).to_le_bytes().to_vec();
    bytes.extend_from_slice(pcm);
    bytes
}

#[tokio::test]
async fn test_half_scale_samples_scenario() {
    let (adapter, seen) = stub(Some("ok"));
    // 16384 and -16384, little-endian
    let wire = [0x04, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0xC0];

    let (response, outcome) = exchange_bytes(&wire, adapter, ConnectionLimits::default()).await;

    assert_eq!(response, b"\x02\x00\x00\x00ok");
    assert_eq!(seen.lock().unwrap()[0], vec![0.5, -0.5]);
    assert!(matches!(
        outcome,
        ConnectionOutcome::Responded {
            samples: 2,
            text_bytes: 2
        }
    ));
}

#[tokio::test]
async fn test_engine_failure_still_sends_frame() {
    let (adapter, _) = stub(None);

    let (response, outcome) =
        exchange_bytes(&request(&[0; 320]), adapter, ConnectionLimits::default()).await;

    let mut expected = (INFERENCE_FAILED_TEXT.len() as u32).to_le_bytes().to_vec();
    expected.extend_from_slice(INFERENCE_FAILED_TEXT.as_bytes());
    assert_eq!(response, expected);
    assert!(matches!(outcome, ConnectionOutcome::Responded { .. }));
}

#[tokio::test]
async fn test_zero_length_request_gets_response() {
    let (adapter, seen) = stub(Some(""));

    let (response, outcome) =
        exchange_bytes(&[0, 0, 0, 0], adapter, ConnectionLimits::default()).await;

    assert_eq!(response, vec![0, 0, 0, 0]);
    assert!(seen.lock().unwrap()[0].is_empty());
    assert!(matches!(
        outcome,
        ConnectionOutcome::Responded { samples: 0, .. }
    ));
}

#[tokio::test]
async fn test_partial_length_prefix_closes_silently() {
    let (adapter, seen) = stub(Some("unused"));

    let (response, outcome) =
        exchange_bytes(&[0x04, 0x00], adapter, ConnectionLimits::default()).await;

    assert!(response.is_empty());
    assert!(seen.lock().unwrap().is_empty());
    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingLength,
            error: ConnectionError::Frame(FrameError::ShortRead(_)),
        }
    ));
}

#[tokio::test]
async fn test_short_payload_closes_silently() {
    let (adapter, seen) = stub(Some("unused"));
    let mut wire = request(&[1, 2, 3, 4, 5, 6]);
    wire.pop();

    let (response, outcome) = exchange_bytes(&wire, adapter, ConnectionLimits::default()).await;

    assert!(response.is_empty());
    assert!(seen.lock().unwrap().is_empty());
    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingPayload,
            error: ConnectionError::Frame(FrameError::ShortPayload { declared: 6, .. }),
        }
    ));
}

#[tokio::test]
async fn test_odd_length_closes_silently() {
    let (adapter, seen) = stub(Some("unused"));

    let (response, outcome) =
        exchange_bytes(&request(&[1, 2, 3]), adapter, ConnectionLimits::default()).await;

    assert!(response.is_empty());
    assert!(seen.lock().unwrap().is_empty());
    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            error: ConnectionError::Frame(FrameError::OddLength(3)),
            ..
        }
    ));
}

#[tokio::test]
async fn test_request_over_limit_closes_silently() {
    let (adapter, seen) = stub(Some("unused"));
    let limits = ConnectionLimits {
        max_request_bytes: Some(4),
        ..ConnectionLimits::default()
    };

    let (response, outcome) = exchange_bytes(&request(&[0; 8]), adapter, limits).await;

    assert!(response.is_empty());
    assert!(seen.lock().unwrap().is_empty());
    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingLength,
            error: ConnectionError::Frame(FrameError::PayloadTooLarge { .. }),
        }
    ));
}

#[tokio::test]
async fn test_stalled_client_times_out() {
    let (adapter, _) = stub(Some("unused"));
    let limits = ConnectionLimits {
        read_timeout: Some(Duration::from_millis(50)),
        ..ConnectionLimits::default()
    };
    let (mut client, server) = duplex(1024);

    // Declare 4 bytes, send 2, then stall with the connection open
    client.write_all(&[4, 0, 0, 0, 1, 2]).await.unwrap();
    let outcome = handle_connection(server, &adapter, &limits, &CancellationToken::new()).await;

    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingPayload,
            error: ConnectionError::TimedOut(_),
        }
    ));

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_shutdown_abandons_stalled_client() {
    let (adapter, seen) = stub(Some("unused"));
    let (mut client, server) = duplex(1024);
    let shutdown = CancellationToken::new();

    // Declare 8 bytes, send 2, then stall with the connection open
    client.write_all(&[8, 0, 0, 0, 1, 2]).await.unwrap();
    let handler = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            handle_connection(server, &adapter, &ConnectionLimits::default(), &shutdown).await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handler)
        .await
        .expect("handler ignored shutdown")
        .unwrap();

    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingPayload,
            error: ConnectionError::Shutdown,
        }
    ));
    assert!(seen.lock().unwrap().is_empty());

    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    assert!(response.is_empty());
}

#[tokio::test]
async fn test_shutdown_before_any_bytes() {
    let (adapter, _) = stub(Some("unused"));
    let (_client, server) = duplex(1024);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let outcome =
        handle_connection(server, &adapter, &ConnectionLimits::default(), &shutdown).await;

    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::AwaitingLength,
            error: ConnectionError::Shutdown,
        }
    ));
}

#[tokio::test]
async fn test_extra_bytes_after_request_are_ignored() {
    let (adapter, seen) = stub(Some("ok"));
    let mut wire = request(&[0x00, 0x40]);
    wire.extend_from_slice(&request(&[0x00, 0xC0]));

    let (response, _) = exchange_bytes(&wire, adapter, ConnectionLimits::default()).await;

    assert_eq!(response, b"\x02\x00\x00\x00ok");
    // Only the first request is served
    assert_eq!(*seen.lock().unwrap(), vec![vec![0.5]]);
}

#[tokio::test]
async fn test_client_gone_before_response() {
    let (adapter, _) = stub(Some("ok"));
    let (mut client, server) = duplex(1024);

    client.write_all(&request(&[0, 0])).await.unwrap();
    drop(client);

    let outcome = handle_connection(
        server,
        &adapter,
        &ConnectionLimits::default(),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(
        outcome,
        ConnectionOutcome::Closed {
            state: ConnectionState::Responding,
            error: ConnectionError::Frame(FrameError::ShortWrite(_)),
        }
    ));
}

#[test]
fn test_limits_from_server_config() {
    let config = ServerConfig {
        max_request_bytes: Some(1024),
        read_timeout_secs: Some(5),
        ..ServerConfig::default()
    };

    let limits = ConnectionLimits::from(&config);

    assert_eq!(limits.max_request_bytes, Some(1024));
    assert_eq!(limits.read_timeout, Some(Duration::from_secs(5)));
    assert_eq!(
        ConnectionLimits::from(&ServerConfig::default()),
        ConnectionLimits::default()
    );
}
