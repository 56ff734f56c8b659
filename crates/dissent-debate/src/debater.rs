//! Debater: one grounded response per agent per round
//!
//! Grounding is enforced only through the instructions in the prompt; the
//! parser checks the shape of the reply, not its truth.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use dissent_core::{AgentAssignment, AgentResponse, Citation, Dispute, Query, ResponseStatus};
use dissent_llm::{LlmError, LlmProvider, LlmRequest};

use crate::equivalence::AnswerKey;
use crate::prompts;

/// The reply did not follow the response contract
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("reply is empty")]
    Empty,
    #[error("reply has no answer field: {0}")]
    MissingAnswer(String),
    #[error("reply is neither JSON nor 'Answer: ... Explanation: ...': {0}")]
    Malformed(String),
}

/// Why one attempt at a response failed
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DebaterError {
    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
    #[error("malformed reply: {0}")]
    Parse(#[from] ParseError),
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    answer: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    explanation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    citations: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    disputes: Vec<RawDispute>,
}

#[derive(Debug, Deserialize)]
struct RawDispute {
    /// Disputes without a usable target are dropped
    #[serde(default)]
    agent: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    reason: String,
}

/// Models write `null` for fields they have nothing to say about
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First unsigned integer in a JSON scalar: `2`, `"2"`, `"[2]"`, `"Agent 2"`
fn scalar_index(value: &serde_json::Value) -> Option<u32> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn prose_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)answer\s*:\s*(.+?)\s*(?:\.\s*)?explanation\s*:\s*(.*)")
            .expect("answer pattern is valid")
    })
}

fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[(\d+)\]").expect("citation pattern is valid"))
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(120).collect()
}

/// Parse a completion into an [`AgentResponse`] for `assignment` in `round`.
///
/// Accepts the JSON contract (optionally wrapped in prose or a code fence)
/// and falls back to `Answer: X. Explanation: Y`. Citation indices that do
/// not point at an assigned snippet are dropped, as are disputes aimed at
/// the agent itself.
pub fn parse_response(
    raw: &str,
    assignment: &AgentAssignment,
    round: u32,
) -> Result<AgentResponse, ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut indices: Vec<u32> = Vec::new();
    let mut disputes = Vec::new();

    let json = raw
        .find('{')
        .zip(raw.rfind('}'))
        .filter(|(start, end)| start < end)
        .and_then(|(start, end)| serde_json::from_str::<RawResponse>(&raw[start..=end]).ok());

    let (answer, explanation) = if let Some(parsed) = json {
        let answer = scalar_text(&parsed.answer)
            .ok_or_else(|| ParseError::MissingAnswer(excerpt(raw)))?;
        indices.extend(parsed.citations.iter().filter_map(scalar_index));
        for dispute in parsed.disputes {
            if let Some(target) = scalar_index(&dispute.agent) {
                if target != assignment.agent_id {
                    disputes.push(Dispute {
                        target_agent: target,
                        reason: dispute.reason.trim().to_string(),
                    });
                }
            }
        }
        (answer, parsed.explanation.trim().to_string())
    } else if let Some(caps) = prose_pattern().captures(raw) {
        let answer = caps[1].trim().trim_end_matches('.').trim().to_string();
        let explanation = caps[2].trim().to_string();
        indices.extend(
            bracket_pattern()
                .captures_iter(&explanation)
                .filter_map(|c| c[1].parse::<u32>().ok()),
        );
        (answer, explanation)
    } else {
        return Err(ParseError::Malformed(excerpt(raw)));
    };

    if answer.is_empty() {
        return Err(ParseError::MissingAnswer(excerpt(raw)));
    }

    let citations: BTreeSet<Citation> = indices
        .into_iter()
        .filter_map(|i| assignment.snippet(i as usize))
        .map(|s| Citation {
            doc_id: s.doc_id,
            rank: s.rank,
        })
        .collect();

    let status = match AnswerKey::from_answer(&answer) {
        Some(_) => ResponseStatus::Answered,
        None => ResponseStatus::Abstained,
    };

    Ok(AgentResponse {
        agent_id: assignment.agent_id,
        doc_ids: assignment.doc_ids.clone(),
        round,
        answer,
        explanation,
        citations: citations.into_iter().collect(),
        disputes,
        status,
    })
}

/// The single debater capability, parameterized by assignment data
#[derive(Debug, Clone)]
pub struct Debater {
    llm: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Debater {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            max_tokens: 512,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// One attempt at this agent's response for `round`.
    ///
    /// `transcript` must hold only responses from rounds before `round`.
    pub async fn respond(
        &self,
        query: &Query,
        assignment: &AgentAssignment,
        round: u32,
        transcript: &[AgentResponse],
        guidance: Option<&str>,
    ) -> Result<AgentResponse, DebaterError> {
        self.respond_counted(query, assignment, round, transcript, guidance)
            .await
            .map(|(response, _)| response)
    }

    /// [`Debater::respond`] plus the tokens the provider reported for the call
    pub async fn respond_counted(
        &self,
        query: &Query,
        assignment: &AgentAssignment,
        round: u32,
        transcript: &[AgentResponse],
        guidance: Option<&str>,
    ) -> Result<(AgentResponse, u64), DebaterError> {
        let request = LlmRequest::with_role(
            &prompts::debater_system(assignment),
            &prompts::debater_prompt(query, assignment, round, transcript, guidance),
        )
        .max_tokens(self.max_tokens);

        let reply = self.llm.complete(request).await?;
        let tokens = u64::from(reply.tokens_used.unwrap_or(0));
        let response = parse_response(&reply.content, assignment, round)?;
        tracing::debug!(
            agent_id = assignment.agent_id,
            round,
            answer = %response.answer,
            citations = response.citations.len(),
            tokens,
            "Agent responded"
        );
        Ok((response, tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::EvidenceSnippet;
    use dissent_llm::MockProvider;

    fn assignment() -> AgentAssignment {
        let snippet = |rank| EvidenceSnippet {
            doc_id: 1,
            rank,
            score: 0.5,
            start: 0,
            text: "Michael Jordan was born in 1963.".to_string(),
        };
        AgentAssignment {
            agent_id: 1,
            doc_ids: vec![1],
            snippets: vec![snippet(1), snippet(2)],
        }
    }

    #[test]
    fn test_parse_json_contract() {
        let raw = r#"Here you go: {"answer": "1963", "explanation": "Snippet [1] says so.", "citations": [1, "[2]", 9], "disputes": [{"agent": 3, "reason": "Doc 3 is about a farmer"}, {"agent": 1, "reason": "self"}]}"#;
        let response = parse_response(raw, &assignment(), 2).unwrap();

        assert_eq!(response.answer, "1963");
        assert_eq!(response.round, 2);
        assert_eq!(response.status, ResponseStatus::Answered);
        assert_eq!(
            response.citations,
            vec![Citation { doc_id: 1, rank: 1 }, Citation { doc_id: 1, rank: 2 }]
        );
        assert_eq!(response.disputes.len(), 1);
        assert_eq!(response.disputes[0].target_agent, 3);
    }

    #[test]
    fn test_parse_numeric_answer() {
        let response =
            parse_response(r#"{"answer": 1963, "citations": [1]}"#, &assignment(), 1).unwrap();
        assert_eq!(response.answer, "1963");
        assert!(response.explanation.is_empty());
    }

    #[test]
    fn test_parse_null_explanation() {
        let raw = r#"{"answer": "1963", "explanation": null, "citations": [1]}"#;
        let response = parse_response(raw, &assignment(), 1).unwrap();
        assert_eq!(response.answer, "1963");
        assert!(response.explanation.is_empty());
        assert_eq!(response.citations, vec![Citation { doc_id: 1, rank: 1 }]);
    }

    #[test]
    fn test_parse_null_citations() {
        let raw = r#"{"answer": "1963", "explanation": "Doc 1 says so.", "citations": null}"#;
        let response = parse_response(raw, &assignment(), 1).unwrap();
        assert_eq!(response.answer, "1963");
        assert!(response.citations.is_empty());
    }

    #[test]
    fn test_parse_dispute_without_agent() {
        let raw = r#"{"answer": "1963", "explanation": "See [2].", "citations": [2], "disputes": [{"reason": "someone is wrong"}, {"agent": 2, "reason": null}]}"#;
        let response = parse_response(raw, &assignment(), 1).unwrap();
        assert_eq!(response.answer, "1963");
        assert_eq!(response.disputes.len(), 1);
        assert_eq!(response.disputes[0].target_agent, 2);
        assert!(response.disputes[0].reason.is_empty());
    }

    #[test]
    fn test_parse_prose_fallback() {
        let raw = "Answer: 1963. Explanation: The document states it in [2].";
        let response = parse_response(raw, &assignment(), 1).unwrap();
        assert_eq!(response.answer, "1963");
        assert_eq!(response.explanation, "The document states it in [2].");
        assert_eq!(response.citations, vec![Citation { doc_id: 1, rank: 2 }]);
    }

    #[test]
    fn test_parse_abstention() {
        let response =
            parse_response(r#"{"answer": "unknown", "explanation": "no date"}"#, &assignment(), 1)
                .unwrap();
        assert_eq!(response.status, ResponseStatus::Abstained);
        assert!(!response.has_claim());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_response("  ", &assignment(), 1), Err(ParseError::Empty));
        assert!(matches!(
            parse_response("I think it was sometime in the sixties", &assignment(), 1),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_response(r#"{"answer": "", "citations": []}"#, &assignment(), 1),
            Err(ParseError::MissingAnswer(_))
        ));
    }

    #[tokio::test]
    async fn test_respond_with_smart_mock() {
        let debater = Debater::new(Arc::new(MockProvider::smart()));
        let query = dissent_core::DebateRequest::new(vec!["x"], "When was he born?")
            .validate(&dissent_core::Limits::default())
            .unwrap()
            .query;

        let response = debater
            .respond(&query, &assignment(), 1, &[], None)
            .await
            .unwrap();
        assert_eq!(response.answer, "1963");
        assert_eq!(response.citations, vec![Citation { doc_id: 1, rank: 1 }]);
    }

    #[tokio::test]
    async fn test_respond_counted_reports_provider_tokens() {
        let debater = Debater::new(Arc::new(MockProvider::smart()));
        let query = dissent_core::DebateRequest::new(vec!["x"], "When was he born?")
            .validate(&dissent_core::Limits::default())
            .unwrap()
            .query;

        let (response, tokens) = debater
            .respond_counted(&query, &assignment(), 1, &[], None)
            .await
            .unwrap();
        assert_eq!(response.answer, "1963");
        assert!(tokens >= 100);
    }

    #[tokio::test]
    async fn test_respond_surfaces_completion_errors() {
        let debater = Debater::new(Arc::new(MockProvider::smart().fail_on("Agent 1", 1)));
        let query = dissent_core::DebateRequest::new(vec!["x"], "q")
            .validate(&dissent_core::Limits::default())
            .unwrap()
            .query;

        let result = debater.respond(&query, &assignment(), 1, &[], None).await;
        assert!(matches!(result, Err(DebaterError::Completion(_))));
    }
}
