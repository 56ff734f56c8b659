//! Binding of debate agents to documents

use dissent_core::{AgentAssignment, AgentId, Document};

use crate::store::EvidenceMap;

/// Hard ceiling on concurrent debate agents
pub const MAX_AGENTS: usize = 3;

/// Bind up to `max_agents` agents to `documents` round-robin by submission order.
///
/// Document `i` (1-based position) goes to agent `((i - 1) % n) + 1`, where
/// `n = min(max_agents, documents)`, so every document is represented and
/// the mapping depends only on input order. Each agent's snippets follow its
/// documents in ascending id, then rank.
pub fn assign_agents(
    documents: &[Document],
    evidence: &EvidenceMap,
    max_agents: usize,
) -> Vec<AgentAssignment> {
    let n = documents.len().min(max_agents.clamp(1, MAX_AGENTS));
    let mut assignments: Vec<AgentAssignment> = (1..=n)
        .map(|agent| AgentAssignment {
            agent_id: agent as AgentId,
            doc_ids: Vec::new(),
            snippets: Vec::new(),
        })
        .collect();

    for (position, document) in documents.iter().enumerate() {
        let assignment = &mut assignments[position % n];
        assignment.doc_ids.push(document.id);
    }

    for assignment in &mut assignments {
        assignment.doc_ids.sort_unstable();
        for doc_id in &assignment.doc_ids {
            if let Some(snippets) = evidence.get(doc_id) {
                assignment.snippets.extend(snippets.iter().cloned());
            }
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_core::EvidenceSnippet;

    fn docs(n: u32) -> Vec<Document> {
        (1..=n).map(|id| Document::new(id, format!("doc {}", id))).collect()
    }

    fn evidence(n: u32) -> EvidenceMap {
        (1..=n)
            .map(|id| {
                let snippet = EvidenceSnippet {
                    doc_id: id,
                    rank: 1,
                    score: 1.0,
                    start: 0,
                    text: format!("doc {}", id),
                };
                (id, vec![snippet])
            })
            .collect()
    }

    #[test]
    fn test_one_agent_per_document() {
        let assignments = assign_agents(&docs(2), &evidence(2), 3);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].doc_ids, vec![1]);
        assert_eq!(assignments[1].doc_ids, vec![2]);
        assert_eq!(assignments[1].snippets[0].doc_id, 2);
    }

    #[test]
    fn test_four_documents_round_robin() {
        let assignments = assign_agents(&docs(4), &evidence(4), 3);
        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0].doc_ids, vec![1, 4]);
        assert_eq!(assignments[1].doc_ids, vec![2]);
        assert_eq!(assignments[2].doc_ids, vec![3]);
        assert_eq!(assignments[0].snippets.len(), 2);

        let mut covered: Vec<_> = assignments.iter().flat_map(|a| a.doc_ids.clone()).collect();
        covered.sort();
        assert_eq!(covered, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_max_agents_is_clamped() {
        assert_eq!(assign_agents(&docs(4), &evidence(4), 10).len(), 3);
        assert_eq!(assign_agents(&docs(4), &evidence(4), 0).len(), 1);
    }

    #[test]
    fn test_no_documents_no_agents() {
        assert!(assign_agents(&[], &EvidenceMap::new(), 3).is_empty());
    }
}
