use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;

use super::{RunContext, StepRunner, required};
use crate::error::StepError;
use crate::model::StepKind;

/// Calls an external HTTP endpoint. Reads `request_verb_api`, `url_api`,
/// and optional `headers_api` / `body_api` params. On a non-2xx response,
/// the body is carried in `StepError::BadStatus` so a failure step can
/// still see it.
pub struct ApiCallRunner;

#[async_trait]
impl StepRunner for ApiCallRunner {
    fn kind(&self) -> StepKind {
        StepKind::ApiCall
    }

    async fn run_step(
        &self,
        ctx: &RunContext,
        params: &HashMap<String, String>,
    ) -> Result<String, StepError> {
        let verb = required(params, "request_verb_api")?;
        let url = required(params, "url_api")?;
        // Closed set per spec.md §4.1 — PATCH/HEAD/OPTIONS/etc. are rejected,
        // not merely whatever `reqwest::Method` happens to parse.
        let method = match verb.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            other => return Err(StepError::InvalidVerb(other.to_string())),
        };

        let mut request = ctx.http.request(method, url);

        if let Some(raw_headers) = params.get("headers_api") {
            match serde_json::from_str::<HashMap<String, Vec<String>>>(raw_headers) {
                Ok(headers) => {
                    for (name, values) in headers {
                        for value in values {
                            request = request.header(&name, value);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "headers_api is not valid JSON; calling without headers");
                }
            }
        }

        if let Some(body) = params.get("body_api") {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|source| StepError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| StepError::Transport {
                url: url.to_string(),
                source,
            })?;

        if !status.is_success() {
            return Err(StepError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryKvStore;

    fn ctx() -> RunContext {
        RunContext {
            kv: InMemoryKvStore::new(),
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn rejects_a_verb_outside_the_closed_set() {
        let runner = ApiCallRunner;
        let params = HashMap::from([
            ("request_verb_api".to_string(), "PATCH".to_string()),
            ("url_api".to_string(), "http://example.invalid".to_string()),
        ]);
        let err = runner.run_step(&ctx(), &params).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidVerb(v) if v == "PATCH"));
    }

    #[tokio::test]
    async fn missing_verb_param_fails() {
        let runner = ApiCallRunner;
        let params = HashMap::from([(
            "url_api".to_string(),
            "http://example.invalid".to_string(),
        )]);
        let err = runner.run_step(&ctx(), &params).await.unwrap_err();
        assert!(matches!(err, StepError::MissingParam(k) if k == "request_verb_api"));
    }
}
