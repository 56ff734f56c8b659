//! Answer equivalence shared by the Ambiguity Solver and the Synthesizer
//!
//! Two answers are equivalent when their normalized keys match. A key is
//! the set of years in the answer when it names any ("1963" and "February
//! 17, 1963" share the key `1963`), else the set of numbers, otherwise the
//! lowercased words left after dropping punctuation and filler. Abstentions
//! ("unknown", "not stated") have no key.

use std::collections::BTreeSet;

use dissent_core::{AgentId, AgentResponse, Citation};
use serde::{Deserialize, Serialize};

const FILLER: &[&str] = &[
    "a", "an", "the", "is", "was", "were", "are", "in", "on", "at", "of", "year", "born",
    "approximately", "about", "around", "answer", "it", "he", "she", "they",
];

const ABSTENTIONS: &[&str] = &[
    "unknown",
    "not stated",
    "not mentioned",
    "not specified",
    "not provided",
    "no answer",
    "none",
    "n/a",
    "cannot be determined",
    "the document does not say",
    "the document does not contain an answer",
    "insufficient information",
];

/// Normalized equivalence key for a candidate answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerKey(String);

impl AnswerKey {
    /// Normalize `answer`; `None` when it is blank or an abstention
    pub fn from_answer(answer: &str) -> Option<AnswerKey> {
        if is_abstention(answer) {
            return None;
        }

        let lowered = answer.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let numbers: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| w.chars().all(|c| c.is_ascii_digit()))
            .collect();
        let years: Vec<&str> = numbers.iter().copied().filter(|n| is_year(n)).collect();
        if !years.is_empty() {
            return Some(AnswerKey(years.join(" ")));
        }
        if !numbers.is_empty() {
            return Some(AnswerKey(numbers.join(" ")));
        }

        let kept: Vec<&str> = words
            .into_iter()
            .filter(|w| !FILLER.contains(w))
            .collect();
        if kept.is_empty() {
            return None;
        }
        Some(AnswerKey(kept.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Four digits from 1000 to 2999
fn is_year(number: &str) -> bool {
    number.len() == 4 && matches!(number.as_bytes()[0], b'1' | b'2')
}

/// Whether the answer says the evidence holds no answer
pub fn is_abstention(answer: &str) -> bool {
    let cleaned = answer
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    cleaned.is_empty() || ABSTENTIONS.contains(&cleaned.as_str())
}

/// Responses sharing one equivalence key
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerGroup {
    pub key: AnswerKey,
    /// Answer as stated by the lowest-numbered supporting agent
    pub value: String,
    pub agents: Vec<AgentId>,
    /// Union of the members' citations, sorted
    pub citations: Vec<Citation>,
}

impl AnswerGroup {
    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.contains(&agent)
    }
}

/// Group the responses that carry a claim by equivalence key.
///
/// Groups are ordered by their lowest supporting agent id, so the result
/// does not depend on the order responses arrived in.
pub fn group_responses(responses: &[AgentResponse]) -> Vec<AnswerGroup> {
    let mut sorted: Vec<&AgentResponse> = responses.iter().filter(|r| r.has_claim()).collect();
    sorted.sort_by_key(|r| r.agent_id);

    let mut groups: Vec<(AnswerGroup, BTreeSet<Citation>)> = Vec::new();
    for response in sorted {
        let Some(key) = AnswerKey::from_answer(&response.answer) else {
            continue;
        };
        match groups.iter_mut().find(|(g, _)| g.key == key) {
            Some((group, citations)) => {
                group.agents.push(response.agent_id);
                citations.extend(response.citations.iter().cloned());
            }
            None => groups.push((
                AnswerGroup {
                    key,
                    value: response.answer.trim().to_string(),
                    agents: vec![response.agent_id],
                    citations: Vec::new(),
                },
                response.citations.iter().cloned().collect(),
            )),
        }
    }

    groups
        .into_iter()
        .map(|(mut group, citations)| {
            group.citations = citations.into_iter().collect();
            group
        })
        .collect()
}
