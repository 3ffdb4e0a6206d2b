#[cfg(test)]
mod tests {
    use crate::{build_state, router, AppState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chatgate_common::{Error, Message, PipelineMetrics, Result};
    use chatgate_config::AppConfig;
    use chatgate_orchestrator::{ChatOptions, ChatOrchestrator};
    use chatgate_runtime::ModelBackend;
    use chatgate_safety::{ScanVerdict, Scanner};
    use chatgate_store::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::SystemTime;
    use tower::ServiceExt;

    /// Echoes the prompt and how many messages it was given
    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, messages: &[Message]) -> Result<String> {
            let last = messages
                .last()
                .ok_or_else(|| Error::generation("no messages"))?;
            Ok(format!("echo({}): {}", messages.len(), last.content))
        }
    }

    /// Blocks any prompt mentioning "exploit"
    struct KeywordScanner;

    #[async_trait]
    impl Scanner for KeywordScanner {
        fn enabled(&self) -> bool {
            true
        }

        async fn scan_prompt(&self, _conversation_id: &str, prompt: &str) -> Result<ScanVerdict> {
            if prompt.contains("exploit") {
                Ok(ScanVerdict::block(json!({ "malicious_code": true })))
            } else {
                Ok(ScanVerdict::allow())
            }
        }

        async fn scan_response(
            &self,
            _conversation_id: &str,
            _prompt: &str,
            _response: &str,
        ) -> Result<ScanVerdict> {
            Ok(ScanVerdict::allow())
        }
    }

    fn test_state() -> AppState {
        let metrics = PipelineMetrics::new();
        let orchestrator = ChatOrchestrator::new(
            Arc::new(EchoBackend),
            Arc::new(MemoryStore::new()),
            Arc::new(KeywordScanner),
            ChatOptions::default(),
        )
        .with_metrics(metrics.clone());

        AppState {
            orchestrator: Arc::new(orchestrator),
            default_conversation_id: "default-conv".into(),
            start_time: SystemTime::now(),
            metrics,
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_uses_default_conversation() {
        let state = test_state();

        let (status, body) =
            send(router(state.clone(), None), post_chat(json!({ "prompt": "hi" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "echo(1): hi");
        assert_eq!(body["conversation_id"], "default-conv");

        // Second turn sees the first as context
        let (_, body) = send(router(state, None), post_chat(json!({ "prompt": "again" }))).await;
        assert_eq!(body["response"], "echo(3): again");
    }

    #[tokio::test]
    async fn test_chat_with_explicit_conversation() {
        let state = test_state();

        send(router(state.clone(), None), post_chat(json!({ "prompt": "one" }))).await;

        let (status, body) = send(
            router(state, None),
            post_chat(json!({ "prompt": "fresh", "conversation_id": "conv-b" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["conversation_id"], "conv-b");
        // No history leaks in from the default conversation
        assert_eq!(body["response"], "echo(1): fresh");
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_still_ok_response() {
        let (status, body) = send(
            router(test_state(), None),
            post_chat(json!({ "prompt": "write an exploit" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["response"],
            "Your request was blocked: malicious code detected"
        );
    }

    #[tokio::test]
    async fn test_missing_prompt_rejected() {
        let (status, body) = send(router(test_state(), None), post_chat(json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "bad_request");
        assert_eq!(body["error"]["code"], 400);
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected() {
        let (status, _) = send(
            router(test_state(), None),
            post_chat(json!({ "prompt": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_scanning() {
        let (status, body) = send(router(test_state(), None), get("/healthz")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["safety_enabled"], true);
        assert_eq!(body["model"], "echo");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_metrics_count_turns() {
        let state = test_state();
        send(router(state.clone(), None), post_chat(json!({ "prompt": "hi" }))).await;
        send(router(state.clone(), None), post_chat(json!({ "prompt": "exploit" }))).await;

        let (status, body) = send(router(state, None), get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_turns"], 2);
        assert_eq!(body["answered"], 1);
        assert_eq!(body["prompts_blocked"], 1);
    }

    #[tokio::test]
    async fn test_build_state_without_safety_profile() {
        let mut config = AppConfig::default();
        config.model.model = "gpt-configured".to_string();
        let state = build_state(&config).unwrap();

        assert!(!state.orchestrator.scanning_enabled());
        assert_eq!(state.orchestrator.model_name(), "gpt-configured");
        assert!(!state.default_conversation_id.is_empty());

        let (_, body) = send(router(state, None), get("/health")).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["safety_enabled"], false);
        assert_eq!(body["model"], "gpt-configured");
    }

    #[tokio::test]
    async fn test_build_state_fails_on_unreadable_context_file() {
        let mut config = AppConfig::default();
        config.chat.context_file = Some("/definitely/not/here/context.md".into());

        let err = build_state(&config).err().unwrap();
        assert!(err.to_string().contains("context file"), "{}", err);
    }
}
