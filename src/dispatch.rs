//! Concurrent dispatch of one input text to both model endpoints.
//!
//! Every call yields an [`InferenceResult`]; transport, status and response
//! shape failures become `success == false` results instead of errors.

use crate::compare::{EntityComparison, compare_entities};
use crate::config::Config;
use crate::entity::Entity;
use crate::error::{NerCompareError, Result};
use crate::llm::{LlmClient, LlmResponse, Message, Prompts};
use crate::parser::{self, ParseStatus};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of one (input text, endpoint) inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Model identifier the request was sent with.
    pub model_name: String,
    /// Deduplicated entities, in order of appearance.
    pub entities: Vec<Entity>,
    /// Wall-clock seconds from sending the request to receiving the body
    /// (or to the failure).
    pub inference_time: f64,
    pub success: bool,
    /// Set only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unparsed model output, empty on failure.
    pub raw_response: String,
    /// How the entities were recovered from `raw_response`.
    pub parse_status: ParseStatus,
}

impl InferenceResult {
    fn succeeded(model_name: &str, inference_time: f64, raw_response: String) -> Self {
        let outcome = parser::parse(&raw_response);
        if let parser::ParseOutcome::Degraded { reason, .. } = &outcome {
            warn!(model = model_name, %reason, "response partially unreadable");
        }
        Self {
            model_name: model_name.to_string(),
            parse_status: outcome.status(),
            entities: outcome.into_entities(),
            inference_time,
            success: true,
            error_message: None,
            raw_response,
        }
    }

    fn failed(model_name: &str, inference_time: f64, error: &NerCompareError) -> Self {
        Self {
            model_name: model_name.to_string(),
            entities: Vec::new(),
            inference_time,
            success: false,
            error_message: Some(error.to_string()),
            raw_response: String::new(),
            parse_status: ParseStatus::NoEntities,
        }
    }
}

/// Both results for one input plus their comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub base: InferenceResult,
    pub lora: InferenceResult,
    pub comparison: EntityComparison,
}

/// Sends each input to the base and the adapter endpoint.
#[derive(Clone)]
pub struct Dispatcher {
    base: LlmClient,
    lora: LlmClient,
}

impl Dispatcher {
    pub fn new(base: LlmClient, lora: LlmClient) -> Self {
        Self { base, lora }
    }

    /// Build both clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base = LlmClient::new(
            config.base.clone(),
            config.generation.clone(),
            config.timeout_secs,
        )?;
        let lora = LlmClient::new(
            config.lora.clone(),
            config.generation.clone(),
            config.timeout_secs,
        )?;
        Ok(Self::new(base, lora))
    }

    pub fn base_client(&self) -> &LlmClient {
        &self.base
    }

    pub fn lora_client(&self) -> &LlmClient {
        &self.lora
    }

    /// Run the NER prompt against a single endpoint.
    pub async fn extract_single(client: &LlmClient, text: &str) -> InferenceResult {
        let prompt = Prompts::ner_extraction(text);
        let model = client.model();

        let start = Instant::now();
        let response = client.chat(vec![Message::user(prompt)]).await;
        let elapsed = start.elapsed().as_secs_f64();

        match response {
            Ok(LlmResponse {
                content,
                finish_reason,
            }) => {
                match finish_reason.as_deref() {
                    Some("length") => {
                        warn!(model, "response hit max_tokens, output may be truncated")
                    }
                    reason => debug!(model, finish_reason = ?reason, "completion finished"),
                }
                let result = InferenceResult::succeeded(model, elapsed, content);
                info!(
                    model,
                    elapsed_secs = elapsed,
                    entities = result.entities.len(),
                    "inference finished"
                );
                result
            }
            Err(e) => {
                warn!(model, elapsed_secs = elapsed, error = %e, "inference failed");
                InferenceResult::failed(model, elapsed, &e)
            }
        }
    }

    /// Run both endpoints concurrently; the pair is always (base, lora).
    pub async fn extract_both(&self, text: &str) -> (InferenceResult, InferenceResult) {
        tokio::join!(
            Self::extract_single(&self.base, text),
            Self::extract_single(&self.lora, text)
        )
    }

    /// Run both endpoints and compare what they found.
    pub async fn compare(&self, text: &str) -> ModelComparison {
        let (base, lora) = self.extract_both(text).await;
        let comparison = compare_entities(&base.entities, &lora.entities);
        ModelComparison {
            base,
            lora,
            comparison,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{EndpointConfig, GenerationConfig};
    use crate::llm::STOP_SEQUENCES;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// One request as received by the fake endpoint.
    #[derive(Debug)]
    pub(crate) struct CapturedRequest {
        headers: String,
        pub(crate) body: Value,
    }

    impl CapturedRequest {
        /// Value of the first header named `name`, case-insensitively.
        pub(crate) fn header(&self, name: &str) -> Option<&str> {
            self.headers.lines().find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
        }
    }

    /// Read one HTTP request (headers plus Content-Length body).
    async fn read_request(socket: &mut TcpStream) -> CapturedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return CapturedRequest {
                    headers: String::from_utf8_lossy(&buf).into_owned(),
                    body: Value::Null,
                };
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).into_owned();
                let body_len = headers
                    .lines()
                    .find_map(|line| {
                        let (key, value) = line.split_once(':')?;
                        key.eq_ignore_ascii_case("content-length").then(|| value.trim())
                    })
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                let end = pos + 4 + body_len;
                if buf.len() >= end {
                    let body = serde_json::from_slice(&buf[pos + 4..end]).unwrap_or(Value::Null);
                    return CapturedRequest { headers, body };
                }
            }
        }
    }

    async fn serve(
        delay: Duration,
        status: &'static str,
        body: String,
        mut capture: Option<oneshot::Sender<CapturedRequest>>,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                let capture = capture.take();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    if let Some(tx) = capture {
                        let _ = tx.send(request);
                    }
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    /// Serve a fixed response on a local port, after `delay`.
    pub(crate) async fn spawn_endpoint(delay: Duration, status: &'static str, body: String) -> String {
        serve(delay, status, body, None).await
    }

    /// Like [`spawn_endpoint`], also handing back the first request received.
    pub(crate) async fn spawn_recording_endpoint(
        body: String,
    ) -> (String, oneshot::Receiver<CapturedRequest>) {
        let (tx, rx) = oneshot::channel();
        let url = serve(Duration::ZERO, "200 OK", body, Some(tx)).await;
        (url, rx)
    }

    pub(crate) fn completion(content: &str) -> String {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
        .to_string()
    }

    pub(crate) fn client(api_base: &str, model: &str, timeout: Duration) -> LlmClient {
        LlmClient::with_timeout(
            EndpointConfig::new(api_base, model),
            GenerationConfig::default(),
            timeout,
        )
        .unwrap()
    }

    pub(crate) fn dispatcher(base_url: &str, lora_url: &str, timeout: Duration) -> Dispatcher {
        Dispatcher::new(
            client(base_url, "qwen3-base", timeout),
            client(lora_url, "qwen3-ner-zero3", timeout),
        )
    }

    const BASE_OUTPUT: &str = r#"<think>先找装备</think>{"entities": [{"name":"坦克","type":"军事装备"}]}"#;
    const LORA_OUTPUT: &str = "{\"entities\": [{\"name\":\"坦克\",\"type\":\"军事装备\"}]}\n{\"entities\": [{\"name\":\"美国(-39.01,-141.10)\",\"type\":\"地理位置\"}]}";

    #[tokio::test]
    async fn test_extract_both_success() {
        let base_url = spawn_endpoint(Duration::ZERO, "200 OK", completion(BASE_OUTPUT)).await;
        let lora_url = spawn_endpoint(Duration::ZERO, "200 OK", completion(LORA_OUTPUT)).await;
        let dispatcher = dispatcher(&base_url, &lora_url, Duration::from_secs(5));

        let (base, lora) = dispatcher.extract_both("美国坦克").await;

        assert!(base.success);
        assert_eq!(base.model_name, "qwen3-base");
        assert_eq!(base.entities, vec![Entity::new("坦克", "军事装备")]);
        assert_eq!(base.raw_response, BASE_OUTPUT);
        assert_eq!(base.parse_status, ParseStatus::Extracted);
        assert!(base.error_message.is_none());

        assert!(lora.success);
        assert_eq!(lora.model_name, "qwen3-ner-zero3");
        assert_eq!(lora.entities.len(), 2);
        assert!(lora.inference_time >= 0.0);
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let base_url = spawn_endpoint(Duration::ZERO, "200 OK", completion(BASE_OUTPUT)).await;
        let lora_url =
            spawn_endpoint(Duration::from_secs(10), "200 OK", completion(LORA_OUTPUT)).await;
        let dispatcher = dispatcher(&base_url, &lora_url, Duration::from_millis(300));

        let (base, lora) = dispatcher.extract_both("美国坦克").await;

        assert!(base.success);
        assert_eq!(base.entities.len(), 1);

        assert!(!lora.success);
        assert!(lora.entities.is_empty());
        assert!(lora.raw_response.is_empty());
        let message = lora.error_message.unwrap();
        assert!(!message.is_empty());
        assert!(message.contains("timed out"), "unexpected message: {}", message);
        assert!(lora.inference_time < 5.0);
    }

    #[tokio::test]
    async fn test_order_is_independent_of_completion() {
        let base_url =
            spawn_endpoint(Duration::from_millis(400), "200 OK", completion(BASE_OUTPUT)).await;
        let lora_url =
            spawn_endpoint(Duration::from_millis(400), "200 OK", completion(LORA_OUTPUT)).await;
        let dispatcher = dispatcher(&base_url, &lora_url, Duration::from_secs(5));

        let start = Instant::now();
        let (base, lora) = dispatcher.extract_both("text").await;
        let wall = start.elapsed();

        assert_eq!(base.model_name, "qwen3-base");
        assert_eq!(lora.model_name, "qwen3-ner-zero3");
        // Serial execution would need at least 800ms.
        assert!(wall < Duration::from_millis(750), "calls were not concurrent: {:?}", wall);
    }

    #[tokio::test]
    async fn test_error_status_is_captured() {
        let body = json!({"error": {"message": "model overloaded", "type": "server_error"}}).to_string();
        let url = spawn_endpoint(Duration::ZERO, "503 Service Unavailable", body).await;
        let client = client(&url, "qwen3-base", Duration::from_secs(5));

        let result = Dispatcher::extract_single(&client, "text").await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("model overloaded"));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_a_failure() {
        let url = spawn_endpoint(Duration::ZERO, "200 OK", r#"{"result": "ok"}"#.to_string()).await;
        let client = client(&url, "qwen3-base", Duration::from_secs(5));

        let result = Dispatcher::extract_single(&client, "text").await;
        assert!(!result.success);
        assert!(result.entities.is_empty());
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client(&format!("http://{}", addr), "qwen3-base", Duration::from_secs(5));
        let result = Dispatcher::extract_single(&client, "text").await;
        assert!(!result.success);
        assert!(!result.error_message.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_is_success_without_entities() {
        let url = spawn_endpoint(Duration::ZERO, "200 OK", completion("没有找到任何实体和关系")).await;
        let client = client(&url, "qwen3-base", Duration::from_secs(5));

        let result = Dispatcher::extract_single(&client, "今天天气很好").await;
        assert!(result.success);
        assert!(result.entities.is_empty());
        assert_eq!(result.parse_status, ParseStatus::NoEntities);
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_compare() {
        let base_url = spawn_endpoint(Duration::ZERO, "200 OK", completion(BASE_OUTPUT)).await;
        let lora_url = spawn_endpoint(Duration::ZERO, "200 OK", completion(LORA_OUTPUT)).await;
        let dispatcher = dispatcher(&base_url, &lora_url, Duration::from_secs(5));

        let result = dispatcher.compare("美国坦克").await;
        assert_eq!(result.comparison.common, 1);
        assert_eq!(result.comparison.lora_only, 1);
        assert_eq!(result.comparison.improvement, 1);
    }

    #[tokio::test]
    async fn test_request_carries_prompt_stop_and_model() {
        let (url, request) = spawn_recording_endpoint(completion(BASE_OUTPUT)).await;
        let client = client(&url, "qwen3-base", Duration::from_secs(5));

        let result = Dispatcher::extract_single(&client, "美国坦克").await;
        assert!(result.success);

        let request = request.await.unwrap();
        assert_eq!(request.body["model"], "qwen3-base");
        let messages = request.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        let content = messages[0]["content"].as_str().unwrap();
        assert!(content.contains("美国坦克"));
        assert!(content.ends_with("请直接输出JSON结果："));
        assert_eq!(content, Prompts::ner_extraction("美国坦克"));
        assert_eq!(request.body["stop"], json!(STOP_SEQUENCES));
        assert_eq!(request.body["max_tokens"], 6144);
        assert!(request.header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_api_key_is_sent_as_bearer() {
        let (url, request) = spawn_recording_endpoint(completion(LORA_OUTPUT)).await;
        let mut endpoint = EndpointConfig::new(&url, "qwen3-ner-zero3");
        endpoint.api_key = "sk-local".to_string();
        let client =
            LlmClient::with_timeout(endpoint, GenerationConfig::default(), Duration::from_secs(5))
                .unwrap();

        let result = Dispatcher::extract_single(&client, "text").await;
        assert!(result.success);

        let request = request.await.unwrap();
        assert_eq!(request.header("authorization"), Some("Bearer sk-local"));
        assert_eq!(request.body["model"], "qwen3-ner-zero3");
    }

    #[tokio::test]
    async fn test_from_config_routes_each_endpoint() {
        let (base_url, base_request) = spawn_recording_endpoint(completion(BASE_OUTPUT)).await;
        let (lora_url, lora_request) = spawn_recording_endpoint(completion(LORA_OUTPUT)).await;
        let mut config = Config::default();
        config.base.api_base = base_url;
        config.lora.api_base = lora_url;
        config.lora.model = "ner-adapter".to_string();
        config.generation.max_tokens = 512;

        let dispatcher = Dispatcher::from_config(&config).unwrap();
        assert_eq!(dispatcher.base_client().model(), "qwen3-base");
        assert_eq!(dispatcher.lora_client().model(), "ner-adapter");

        let (base, lora) = dispatcher.extract_both("美国坦克").await;
        assert!(base.success && lora.success);
        assert_eq!(lora.model_name, "ner-adapter");

        let base_request = base_request.await.unwrap();
        let lora_request = lora_request.await.unwrap();
        assert_eq!(base_request.body["model"], "qwen3-base");
        assert_eq!(lora_request.body["model"], "ner-adapter");
        assert_eq!(base_request.body["max_tokens"], 512);
        assert_eq!(lora_request.body["max_tokens"], 512);
    }

    #[test]
    fn test_from_default_config() {
        let dispatcher = Dispatcher::from_config(&Config::default()).unwrap();
        assert_eq!(dispatcher.base_client().model(), "qwen3-base");
        assert_eq!(dispatcher.lora_client().model(), "qwen3-ner-zero3");
    }
}
