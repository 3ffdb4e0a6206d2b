#[cfg(test)]
mod tests {
    use crate::reasons::{flagged_categories, resolve, BlockCategory};
    use crate::{ScanAction, ScanClient, ScanVerdict, Scanner, SafetyProfile, AUTH_HEADER};
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use chatgate_common::{BlockReasonMode, Error, RationaleLocale};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    const FIRST: BlockReasonMode = BlockReasonMode::FirstMatch;
    const ALL: BlockReasonMode = BlockReasonMode::AllMatches;
    const EN: RationaleLocale = RationaleLocale::En;

    // ==================== Block-reason resolution ====================

    #[test]
    fn test_single_flag_resolves_to_its_rationale() {
        for category in BlockCategory::PRIORITY {
            let mut map = serde_json::Map::new();
            map.insert(category.key().to_string(), Value::Bool(true));
            let flags = Value::Object(map);
            assert_eq!(
                resolve(Some(&flags), FIRST, EN),
                category.rationale(EN),
                "category {}",
                category.key()
            );
        }
    }

    #[test]
    fn test_no_true_flag_resolves_to_other() {
        let flags = json!({
            "dlp": false,
            "injection": false,
            "toxic_content": false
        });
        assert_eq!(resolve(Some(&flags), FIRST, EN), "other");
        assert_eq!(resolve(Some(&json!({})), FIRST, EN), "other");
    }

    #[test]
    fn test_absent_flags_resolve_to_other() {
        assert_eq!(resolve(None, FIRST, EN), "other");
        assert_eq!(resolve(Some(&Value::Null), FIRST, EN), "other");
    }

    #[test]
    fn test_non_mapping_resolves_to_unknown() {
        assert_eq!(resolve(Some(&json!(["injection"])), FIRST, EN), "unknown");
        assert_eq!(resolve(Some(&json!("injection")), FIRST, EN), "unknown");
        assert_eq!(resolve(Some(&json!(true)), ALL, EN), "unknown");
    }

    #[test]
    fn test_priority_order_wins_over_map_order() {
        // url_cats appears first in the payload but has the lowest priority
        let flags: Value =
            serde_json::from_str(r#"{"url_cats": true, "toxic_content": true, "injection": true}"#)
                .unwrap();

        assert_eq!(resolve(Some(&flags), FIRST, EN), "prompt injection detected");
        assert_eq!(
            resolve(Some(&flags), ALL, EN),
            "prompt injection detected, toxic content detected, suspicious URL detected"
        );
    }

    #[test]
    fn test_unknown_categories_and_non_bool_values_are_ignored() {
        let flags = json!({
            "agent": true,
            "dlp": "true",
            "malicious_code": 1,
            "topic_violation": true
        });
        assert_eq!(
            flagged_categories(Some(&flags)).unwrap(),
            vec![BlockCategory::TopicViolation]
        );

        let only_unknown = json!({ "ungrounded": true });
        assert_eq!(resolve(Some(&only_unknown), ALL, EN), "other");
    }

    #[test]
    fn test_german_rationales() {
        let de = RationaleLocale::De;
        assert_eq!(
            resolve(Some(&json!({"dlp": true})), FIRST, de),
            "Verletzung der Datenschutzrichtlinien"
        );
        assert_eq!(resolve(Some(&json!({})), FIRST, de), "Sonstiges");
        assert_eq!(resolve(Some(&json!(42)), FIRST, de), "Unbekannt");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let flags = json!({"malicious_code": true, "dlp": true});
        let first = resolve(Some(&flags), ALL, EN);
        for _ in 0..10 {
            assert_eq!(resolve(Some(&flags), ALL, EN), first);
        }
    }

    #[test]
    fn test_allow_verdict_has_no_rationale() {
        let verdict = ScanVerdict::allow();
        assert!(!verdict.is_blocked());
        assert_eq!(verdict.rationale(FIRST, EN), None);
    }

    #[test]
    fn test_block_verdict_always_has_rationale() {
        let verdict = ScanVerdict {
            action: ScanAction::Block,
            detected_flags: None,
            scan_id: None,
            category: Some("malicious".into()),
        };
        let rationale = verdict.rationale(FIRST, EN).unwrap();
        assert!(!rationale.is_empty());
        assert_eq!(rationale, "other");
    }

    // ==================== Profile ====================

    #[test]
    fn test_blank_profile_id_disables_scanning() {
        let profile = SafetyProfile::new("https://scan.example", "key", "", "gpt-test");
        assert!(!profile.is_enabled());

        let profile = SafetyProfile::new("https://scan.example", "key", "   ", "gpt-test");
        assert!(!profile.is_enabled());

        let profile = SafetyProfile::new("https://scan.example", "key", "profile-1", "gpt-test");
        assert!(profile.is_enabled());
    }

    #[test]
    fn test_incomplete_profile_still_constructs() {
        let client = ScanClient::new(SafetyProfile::new("", "", "profile-1", ""));
        assert!(client.enabled());
    }

    #[test]
    fn test_profile_debug_redacts_api_key() {
        let profile = SafetyProfile::new("https://scan.example", "super-secret", "p", "m");
        let debug = format!("{:?}", profile);
        assert!(!debug.contains("super-secret"));
    }

    // ==================== Wire contract ====================

    #[derive(Clone)]
    enum Reply {
        Json(StatusCode, Value),
        Text(StatusCode, &'static str),
    }

    struct MockService {
        reply: Reply,
        requests: Mutex<Vec<(HeaderMap, Value)>>,
    }

    async fn handle_scan(
        State(service): State<Arc<MockService>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        service.requests.lock().unwrap().push((headers, body));
        match service.reply.clone() {
            Reply::Json(status, value) => (status, Json(value)).into_response(),
            Reply::Text(status, text) => (status, text).into_response(),
        }
    }

    async fn spawn_scanner(reply: Reply) -> (String, Arc<MockService>) {
        let service = Arc::new(MockService {
            reply,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/scan/sync/request", post(handle_scan))
            .with_state(service.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/v1/scan/sync/request", addr), service)
    }

    fn client_for(endpoint: &str) -> ScanClient {
        ScanClient::new(
            SafetyProfile::new(endpoint, "scan-key", "profile-1", "gpt-test")
                .with_app_name("Test Chat"),
        )
    }

    #[tokio::test]
    async fn test_prompt_scan_envelope() {
        let reply = json!({"action": "allow", "category": "benign"});
        let (endpoint, service) = spawn_scanner(Reply::Json(StatusCode::OK, reply)).await;
        let client = client_for(&endpoint);

        let verdict = client.scan_prompt("conv-1", "2+2?").await.unwrap();
        assert_eq!(verdict.action, ScanAction::Allow);
        assert_eq!(verdict.category.as_deref(), Some("benign"));

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];

        assert_eq!(headers[AUTH_HEADER], "scan-key");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["accept"], "application/json");

        assert!(uuid::Uuid::parse_str(body["tr_id"].as_str().unwrap()).is_ok());
        assert_eq!(body["session_id"], "conv-1");
        assert_eq!(body["ai_profile"], json!({"profile_id": "profile-1"}));
        assert_eq!(body["metadata"], json!({"app_name": "Test Chat", "ai_model": "gpt-test"}));
        assert_eq!(body["contents"], json!([{"prompt": "2+2?"}]));
    }

    #[tokio::test]
    async fn test_response_scan_envelope_and_flags() {
        let (endpoint, service) = spawn_scanner(Reply::Json(
            StatusCode::OK,
            json!({
                "action": "block",
                "scan_id": "scan-42",
                "prompt_detected": {"injection": true},
                "response_detected": {"toxic_content": true}
            }),
        ))
        .await;
        let client = client_for(&endpoint);

        let verdict = client
            .scan_response("conv-1", "tell me something", "something rude")
            .await
            .unwrap();

        assert!(verdict.is_blocked());
        assert_eq!(verdict.scan_id.as_deref(), Some("scan-42"));
        // Response scans read response_detected, not prompt_detected
        assert_eq!(verdict.detected_flags, Some(json!({"toxic_content": true})));
        assert_eq!(
            verdict.rationale(FIRST, EN).as_deref(),
            Some("toxic content detected")
        );

        let requests = service.requests.lock().unwrap();
        assert_eq!(
            requests[0].1["contents"],
            json!([{"response": "something rude", "context": "tell me something"}])
        );
    }

    #[tokio::test]
    async fn test_each_call_gets_fresh_transaction_id() {
        let (endpoint, service) =
            spawn_scanner(Reply::Json(StatusCode::OK, json!({"action": "allow"}))).await;
        let client = client_for(&endpoint);

        client.scan_prompt("conv-1", "one").await.unwrap();
        client.scan_prompt("conv-1", "one").await.unwrap();

        let requests = service.requests.lock().unwrap();
        assert_ne!(requests[0].1["tr_id"], requests[1].1["tr_id"]);
    }

    #[tokio::test]
    async fn test_error_message_from_structured_body() {
        let (endpoint, _service) = spawn_scanner(Reply::Json(
            StatusCode::UNAUTHORIZED,
            json!({"error": {"message": "Invalid token provided"}}),
        ))
        .await;

        let err = client_for(&endpoint).scan_prompt("conv-1", "hi").await.unwrap_err();
        match err {
            Error::ScanFailed(message) => {
                assert!(message.contains("Invalid token provided"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_message_from_top_level_message() {
        let (endpoint, _service) = spawn_scanner(Reply::Json(
            StatusCode::FORBIDDEN,
            json!({"message": "profile not found"}),
        ))
        .await;

        let err = client_for(&endpoint).scan_prompt("conv-1", "hi").await.unwrap_err();
        assert!(err.to_string().contains("profile not found"));
    }

    #[tokio::test]
    async fn test_error_message_falls_back_to_status_text() {
        let (endpoint, _service) =
            spawn_scanner(Reply::Text(StatusCode::SERVICE_UNAVAILABLE, "upstream down")).await;

        let err = client_for(&endpoint).scan_prompt("conv-1", "hi").await.unwrap_err();
        assert!(matches!(err, Error::ScanFailed(_)));
        assert!(err.to_string().contains("Service Unavailable"), "{}", err);
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_fault() {
        let (endpoint, _service) =
            spawn_scanner(Reply::Json(StatusCode::OK, json!({"action": "maybe"}))).await;

        let err = client_for(&endpoint).scan_prompt("conv-1", "hi").await.unwrap_err();
        assert!(matches!(err, Error::ScanFailed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_fault() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}/scan", addr));
        let err = client.scan_prompt("conv-1", "hi").await.unwrap_err();
        assert!(matches!(err, Error::ScanFailed(_)));
    }
}
