//! Agent executor - runs one debater call with timeout, retry and degrade

use std::sync::Arc;
use std::time::Duration;

use dissent_core::{AgentAssignment, AgentResponse, Query};
use dissent_debate::{Debater, DebaterError};
use dissent_llm::{global_metrics, LlmError, LlmProvider};

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Bound on each completion call
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retries: 1,
        }
    }
}

/// Result of one agent's turn in one round
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    /// First attempt succeeded
    Answered(AgentResponse),
    /// Succeeded after `failures` earlier attempts failed
    Retried {
        response: AgentResponse,
        failures: Vec<String>,
    },
    /// Every attempt failed; the response carries the last failure
    Degraded {
        response: AgentResponse,
        failures: Vec<String>,
    },
}

impl AgentOutcome {
    pub fn response(&self) -> &AgentResponse {
        match self {
            AgentOutcome::Answered(response)
            | AgentOutcome::Retried { response, .. }
            | AgentOutcome::Degraded { response, .. } => response,
        }
    }

    pub fn into_response(self) -> AgentResponse {
        match self {
            AgentOutcome::Answered(response)
            | AgentOutcome::Retried { response, .. }
            | AgentOutcome::Degraded { response, .. } => response,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AgentOutcome::Degraded { .. })
    }

    pub fn failures(&self) -> &[String] {
        match self {
            AgentOutcome::Answered(_) => &[],
            AgentOutcome::Retried { failures, .. } | AgentOutcome::Degraded { failures, .. } => {
                failures
            }
        }
    }
}

/// Agent executor - runs the debater for one assignment
#[derive(Debug, Clone)]
pub struct AgentExecutor {
    pub config: ExecutorConfig,
    debater: Debater,
}

impl AgentExecutor {
    pub fn new(llm: Arc<dyn LlmProvider>, config: ExecutorConfig) -> Self {
        Self {
            config,
            debater: Debater::new(llm),
        }
    }

    async fn attempt(
        &self,
        query: &Query,
        assignment: &AgentAssignment,
        round: u32,
        transcript: &[AgentResponse],
        guidance: Option<&str>,
    ) -> Result<AgentResponse, DebaterError> {
        let call = self
            .debater
            .respond_counted(query, assignment, round, transcript, guidance);
        let result = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DebaterError::Completion(LlmError::Timeout(
                self.config.timeout.as_millis() as u64,
            ))),
        };
        let tokens = result.as_ref().map_or(0, |(_, tokens)| *tokens);
        global_metrics().record_llm_call(tokens, result.is_err());
        result.map(|(response, _)| response)
    }

    /// Run one agent's turn: attempt, retry on failure, then degrade.
    ///
    /// Never fails; a degraded outcome carries an empty claim.
    pub async fn execute(
        &self,
        query: &Query,
        assignment: &AgentAssignment,
        round: u32,
        transcript: &[AgentResponse],
        guidance: Option<&str>,
    ) -> AgentOutcome {
        let agent_id = assignment.agent_id;
        let mut failures = Vec::new();

        for attempt in 0..=self.config.retries {
            match self
                .attempt(query, assignment, round, transcript, guidance)
                .await
            {
                Ok(response) if failures.is_empty() => return AgentOutcome::Answered(response),
                Ok(response) => {
                    tracing::info!(agent_id, round, attempt, "Agent recovered after retry");
                    return AgentOutcome::Retried { response, failures };
                }
                Err(e) => {
                    tracing::warn!(agent_id, round, attempt, error = %e, "Agent attempt failed");
                    if attempt < self.config.retries {
                        metrics::counter!("dissent_agent_retries_total").increment(1);
                    }
                    failures.push(e.to_string());
                }
            }
        }

        let last = failures
            .last()
            .cloned()
            .unwrap_or_else(|| "no attempt was made".to_string());
        tracing::warn!(agent_id, round, failure = %last, "Agent degraded to empty response");
        metrics::counter!("dissent_degraded_responses_total").increment(1);
        global_metrics().record_degraded();

        AgentOutcome::Degraded {
            response: AgentResponse::degraded(
                agent_id,
                assignment.doc_ids.clone(),
                round,
                last,
            ),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::{DebateRequest, EvidenceSnippet, Limits};
    use dissent_llm::MockProvider;

    fn query() -> Query {
        DebateRequest::new(vec!["d"], "What year?")
            .validate(&Limits::default())
            .unwrap()
            .query
    }

    fn assignment() -> AgentAssignment {
        AgentAssignment {
            agent_id: 2,
            doc_ids: vec![2],
            snippets: vec![EvidenceSnippet {
                doc_id: 2,
                rank: 1,
                score: 1.0,
                start: 0,
                text: "Born in 2000.".to_string(),
            }],
        }
    }

    fn executor(provider: MockProvider) -> AgentExecutor {
        AgentExecutor::new(
            Arc::new(provider),
            ExecutorConfig {
                timeout: Duration::from_millis(200),
                retries: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_first_attempt_answers() {
        let outcome = executor(MockProvider::smart())
            .execute(&query(), &assignment(), 1, &[], None)
            .await;
        assert!(matches!(outcome, AgentOutcome::Answered(_)));
        assert_eq!(outcome.response().answer, "2000");
    }

    #[tokio::test]
    async fn test_single_failure_is_retried() {
        let outcome = executor(MockProvider::smart().fail_on("Agent 2", 1))
            .execute(&query(), &assignment(), 1, &[], None)
            .await;
        assert!(matches!(outcome, AgentOutcome::Retried { .. }));
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.response().answer, "2000");
    }

    #[tokio::test]
    async fn test_two_failures_degrade() {
        let outcome = executor(MockProvider::smart().fail_on("Agent 2", 2))
            .execute(&query(), &assignment(), 3, &[], None)
            .await;
        assert!(outcome.is_degraded());
        let response = outcome.into_response();
        assert!(response.is_degraded());
        assert_eq!(response.round, 3);
        assert!(!response.has_claim());
    }

    #[tokio::test]
    async fn test_answered_call_records_tokens() {
        let before = global_metrics().snapshot().tokens_used;
        let outcome = executor(MockProvider::smart())
            .execute(&query(), &assignment(), 1, &[], None)
            .await;
        assert!(matches!(outcome, AgentOutcome::Answered(_)));
        // Other tests share the global counters, so only growth is checked
        assert!(global_metrics().snapshot().tokens_used >= before + 100);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let outcome = executor(MockProvider::smart().with_latency(5_000))
            .execute(&query(), &assignment(), 1, &[], None)
            .await;
        assert!(outcome.is_degraded());
        assert!(outcome.failures().iter().all(|f| f.contains("Timed out")));
    }
}
