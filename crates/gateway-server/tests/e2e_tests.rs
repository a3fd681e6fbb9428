//! End-to-end tests for the chat gateway.
//!
//! The completion backend and the Ollama catalog are mocked with wiremock;
//! requests go through the full router with `oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use gateway_config::{GatewayConfig, ModelSourceConfig, ProviderConfig};
use gateway_server::{create_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn ollama_provider(base_url: &str, fallback: &[&str]) -> ProviderConfig {
    ProviderConfig {
        key: "ollama".to_string(),
        display_name: None,
        prefix: "ollama/".to_string(),
        models: ModelSourceConfig::Ollama {
            base_url: base_url.to_string(),
            fallback: fallback.iter().map(ToString::to_string).collect(),
            cache_ttl: Duration::from_secs(30),
            timeout: Duration::from_millis(500),
        },
    }
}

fn test_config(backend_url: &str, ollama: ProviderConfig) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.base_url = backend_url.to_string();
    config.backend.api_key_env = None;
    config.fallback.pacing_delay = Duration::ZERO;
    config.fallback.attempt_timeout = Duration::from_secs(5);
    config.providers = vec![
        ollama,
        ProviderConfig::fixed("openai", "openai/", &["gpt-4o", "gpt-4o-mini"]),
        ProviderConfig::fixed("empty", "", &[]),
    ];
    config
}

fn app(config: GatewayConfig) -> (Router, AppState) {
    let state = AppState::builder().config(config).build().unwrap();
    (create_router(state.clone()), state)
}

fn post_chat(body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn sse_units(response: axum::response::Response) -> Vec<Value> {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}

fn sse_body(chunks: &[Value]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

async fn mock_sync_answer(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })))
        .mount(server)
        .await;
}

mod health_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &[])));

        for uri in ["/health", "/healthz", "/ready", "/live"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(body_json(response).await["status"], "healthy");
    }
}

mod catalog_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_providers_in_configuration_order() {
        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &[])));

        let response = app.oneshot(get("/api/providers")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"providers": [
                {"id": "ollama", "name": "Ollama"},
                {"id": "openai", "name": "OpenAI"},
                {"id": "empty", "name": "Empty"}
            ]})
        );
    }

    #[tokio::test]
    async fn test_dynamic_models_from_catalog() {
        let catalog = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "llama3:latest"}, {"name": "mistral"}]
            })))
            .mount(&catalog)
            .await;

        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(&catalog.uri(), &["fallback-model"])));

        let response = app.oneshot(get("/api/models/ollama?refresh=true")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"models": ["llama3:latest", "mistral"], "fallback": false})
        );
    }

    #[tokio::test]
    async fn test_unreachable_catalog_serves_flagged_fallback() {
        let (app, state) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &["llama3", "mistral"])));

        let response = app.oneshot(get("/api/models/ollama")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"models": ["llama3", "mistral"], "fallback": true})
        );
        assert!(state
            .metrics
            .gather()
            .contains(r#"model_catalog_fallbacks_total{provider="ollama"} 1"#));
    }

    #[tokio::test]
    async fn test_unreachable_catalog_without_fallback_is_unavailable() {
        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &[])));

        let response = app.oneshot(get("/api/models/ollama")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"]["type"], "service_unavailable");
    }

    #[tokio::test]
    async fn test_static_models_and_not_found_cases() {
        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &[])));

        let response = app.clone().oneshot(get("/api/models/openai")).await.unwrap();
        assert_eq!(
            body_json(response).await,
            json!({"models": ["gpt-4o", "gpt-4o-mini"], "fallback": false})
        );

        let response = app.clone().oneshot(get("/api/models/empty")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/api/models/unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["type"], "not_found_error");
    }
}

mod chat_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_non_streaming_happy_path() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hello!"}}]
            })))
            .expect(1)
            .mount(&backend)
            .await;

        let (app, state) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "message": {"role": "assistant", "content": "Hello!"},
                "model": "ollama/llama3"
            })
        );
        assert!(state
            .metrics
            .gather()
            .contains(r#"chat_requests_total{mode="sync",outcome="success"} 1"#));
    }

    #[tokio::test]
    async fn test_provider_key_qualifies_model() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "openai/gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&backend)
            .await;

        let (app, _) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "gpt-4o",
                "provider": "openai",
                "system_prompt": "Be brief."
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["model"], "openai/gpt-4o");
    }

    #[tokio::test]
    async fn test_reasoning_markup_stripped_for_standard_models() {
        let backend = MockServer::start().await;
        mock_sync_answer(&backend, "<think>internal</think>\n\n\n\nThe answer.").await;

        let (app, _) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Why?"}]
            })))
            .await
            .unwrap();

        assert_eq!(body_json(response).await["message"]["content"], "The answer.");
    }

    #[tokio::test]
    async fn test_reasoning_markup_labeled_for_thinking_models() {
        let backend = MockServer::start().await;
        mock_sync_answer(&backend, "<think>step one</think>\n<answer>42</answer>").await;

        let (app, _) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/deepseek-r1:14b",
                "messages": [{"role": "user", "content": "Why?"}]
            })))
            .await
            .unwrap();

        let content = body_json(response).await["message"]["content"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(content.contains("Thinking"));
        assert!(content.contains("step one"));
        assert!(content.contains("42"));
        assert!(!content.contains("<think>"));
    }

    #[tokio::test]
    async fn test_validation_errors_are_never_dispatched() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&backend)
            .await;

        let (app, _) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));

        let response = app
            .clone()
            .oneshot(post_chat(&json!({"model": "ollama/llama3", "messages": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["type"], "invalid_request_error");

        let response = app
            .clone()
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}],
                "temperature": 3.5
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(post_chat(&json!({
                "model": "gpt-4o",
                "provider": "nope",
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let malformed = Request::builder()
            .method(Method::POST)
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"model\":"))
            .unwrap();
        let response = app.oneshot(malformed).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_backend_failure_is_terminal_error() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&backend)
            .await;

        let (app, _) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/nope",
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "upstream_error");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("ollama/nope"));
        assert!(message.contains("Common issues"));
    }
}

mod streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_sse_chunks_then_done() {
        let backend = MockServer::start().await;
        let body = sse_body(&[
            json!({"choices": [{"delta": {"role": "assistant"}}]}),
            json!({"choices": [{"delta": {"content": "Hel"}}]}),
            json!({"choices": [{"delta": {"content": "lo!"}}]}),
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&backend)
            .await;

        let (app, state) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let units = sse_units(response).await;
        assert_eq!(
            units,
            vec![
                json!({"chunk": "Hel", "message": {"role": "assistant", "content": "Hel"}}),
                json!({"chunk": "lo!", "message": {"role": "assistant", "content": "lo!"}}),
                json!({
                    "done": true,
                    "message": {"role": "assistant", "content": "Hello!"},
                    "model": "ollama/llama3"
                }),
            ]
        );

        let metrics = state.metrics.gather();
        assert!(metrics.contains(r#"chat_requests_total{mode="stream",outcome="success"} 1"#));
        assert!(metrics.contains(r#"chat_stream_chunks_total{kind="empty"} 1"#));
    }

    #[tokio::test]
    async fn test_empty_stream_falls_back_to_sync() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body(&[]), "text/event-stream"))
            .expect(1)
            .mount(&backend)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "ollama/llama3", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "Hello!"}}]
            })))
            .expect(1)
            .mount(&backend)
            .await;

        let (app, state) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": true
            })))
            .await
            .unwrap();

        let units = sse_units(response).await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0]["done"], true);
        assert_eq!(units[0]["message"]["content"], "Hello!");

        let metrics = state.metrics.gather();
        assert!(metrics.contains(r#"chat_fallbacks_total{reason="empty"} 1"#));
        assert!(metrics.contains(r#"chat_requests_total{mode="stream",outcome="degraded"} 1"#));
    }

    #[tokio::test]
    async fn test_stream_and_sync_failure_ends_with_error_unit() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(2)
            .mount(&backend)
            .await;

        let (app, state) = app(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [{"role": "user", "content": "Hi"}],
                "stream": true
            })))
            .await
            .unwrap();

        let units = sse_units(response).await;
        assert_eq!(units.len(), 1);
        let error = units[0]["error"].as_str().unwrap();
        assert!(error.contains("ollama/llama3"));
        assert!(error.contains("streaming attempt failed first"));

        let metrics = state.metrics.gather();
        assert!(metrics.contains(r#"chat_fallbacks_total{reason="failed"} 1"#));
        assert!(metrics.contains(r#"chat_requests_total{mode="stream",outcome="error"} 1"#));
    }

    #[tokio::test]
    async fn test_streaming_validation_error_is_plain_400() {
        let (app, _) = app(test_config(UNREACHABLE, ollama_provider(UNREACHABLE, &[])));
        let response = app
            .oneshot(post_chat(&json!({
                "model": "ollama/llama3",
                "messages": [],
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod websocket_tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use gateway_server::Server;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message;

    async fn spawn_server(config: GatewayConfig) -> (SocketAddr, AppState, oneshot::Sender<()>) {
        let state = AppState::builder().config(config).build().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(Server::new(state.clone()).serve(listener, async {
            let _ = rx.await;
        }));
        (addr, state, tx)
    }

    /// Send one request frame and collect the units up to the close frame
    async fn exchange(addr: SocketAddr, request: String) -> (Vec<Value>, bool) {
        let (mut socket, _) = connect_async(format!("ws://{addr}/api/chat/stream"))
            .await
            .unwrap();
        socket.send(Message::Text(request)).await.unwrap();

        let mut units = Vec::new();
        let mut closed = false;
        while let Some(frame) = socket.next().await {
            match frame.unwrap() {
                Message::Text(text) => units.push(serde_json::from_str(&text).unwrap()),
                Message::Close(_) => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }
        (units, closed)
    }

    #[tokio::test]
    async fn test_websocket_streams_chunks_then_done() {
        let backend = MockServer::start().await;
        let body = sse_body(&[
            json!({"choices": [{"delta": {"content": "Hel"}}]}),
            json!({"choices": [{"delta": {"content": "lo!"}}]}),
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "ollama/llama3", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&backend)
            .await;

        let (addr, state, shutdown) =
            spawn_server(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[]))).await;

        // No stream flag: the socket always streams.
        let request = json!({
            "model": "llama3",
            "provider": "ollama",
            "messages": [{"role": "user", "content": "Hi"}]
        });
        let (units, closed) = exchange(addr, request.to_string()).await;

        assert!(closed);
        assert_eq!(
            units,
            vec![
                json!({"chunk": "Hel", "message": {"role": "assistant", "content": "Hel"}}),
                json!({"chunk": "lo!", "message": {"role": "assistant", "content": "lo!"}}),
                json!({
                    "done": true,
                    "message": {"role": "assistant", "content": "Hello!"},
                    "model": "ollama/llama3"
                }),
            ]
        );
        assert!(state
            .metrics
            .gather()
            .contains(r#"chat_requests_total{mode="stream",outcome="success"} 1"#));

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_websocket_invalid_requests_get_one_error_unit() {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&backend)
            .await;

        let (addr, state, shutdown) =
            spawn_server(test_config(&backend.uri(), ollama_provider(UNREACHABLE, &[]))).await;

        let (units, closed) = exchange(addr, "not json".to_string()).await;
        assert!(closed);
        assert_eq!(units.len(), 1);
        assert!(units[0]["error"].as_str().unwrap().contains("Invalid JSON"));

        let empty = json!({"model": "ollama/llama3", "messages": []});
        let (units, closed) = exchange(addr, empty.to_string()).await;
        assert!(closed);
        assert_eq!(units.len(), 1);
        assert!(units[0].get("error").is_some());
        assert!(units[0].get("done").is_none());

        assert!(state
            .metrics
            .gather()
            .contains(r#"chat_requests_total{mode="stream",outcome="error"} 2"#));

        shutdown.send(()).unwrap();
    }
}
