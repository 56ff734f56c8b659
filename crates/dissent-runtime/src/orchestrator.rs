//! Orchestrator - drives one debate through the stage machine
//!
//! ```text
//! setup -> indexing -> retrieval -> evidence -> {debate(r) -> ambiguity(r)}* -> synthesis -> done
//! ```
//!
//! Every state writes its events to the session log before handing them to
//! the sink, so the log and the delivered stream never diverge. Any failure
//! ends the session with exactly one terminal error record.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use dissent_core::{
    AgentAssignment, AgentResponse, AmbiguityAssessment, Classification, DebateError,
    DebateMessage, DebateRequest, Decision, FinalAnswer, Stage, StepDraft, StepPayload,
    StopReason, ValidatedRequest,
};
use dissent_debate::{AmbiguitySolver, Synthesizer};
use dissent_evidence::{
    assign_agents, compact, Chunker, EmbeddingRetriever, EvidenceStore, LexicalRetriever,
    Retriever,
};
use dissent_llm::{global_metrics, ConfigError, LlmConfig, LlmProvider, Timer};

use crate::config::DebateConfig;
use crate::executor::{AgentExecutor, AgentOutcome};
use crate::session::{DebateSession, DebateTranscript};
use crate::sink::EventSink;

const EXCERPT_CHARS: usize = 200;

fn classification_text(classification: Classification) -> &'static str {
    match classification {
        Classification::ResolvedSingle => "resolved (single answer)",
        Classification::ResolvedMulti => "resolved (multiple valid answers)",
        Classification::UnresolvedConflict => "unresolved conflict",
    }
}

fn decision_text(decision: Decision) -> &'static str {
    match decision {
        Decision::Continue => "continue debating",
        Decision::Stop(StopReason::Resolved) => "stop, resolved",
        Decision::Stop(StopReason::RoundLimit) => "stop, round limit reached",
        Decision::Stop(StopReason::NoNewInformation) => "stop, no new information",
    }
}

/// Orchestrator for debate sessions.
///
/// Cheap to clone; each call to [`Orchestrator::run`] owns a fresh
/// [`DebateSession`] and shares nothing with other sessions.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    pub config: DebateConfig,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    executor: AgentExecutor,
    solver: AmbiguitySolver,
    synthesizer: Synthesizer,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        config: DebateConfig,
    ) -> Self {
        let executor = AgentExecutor::new(llm.clone(), config.executor.clone());
        let solver = if config.ambiguity_guidance {
            AmbiguitySolver::with_guidance(llm.clone())
        } else {
            AmbiguitySolver::new()
        };
        let synthesizer = if config.narrate {
            Synthesizer::with_narration(llm.clone())
        } else {
            Synthesizer::new()
        };
        Self {
            config,
            llm,
            retriever,
            executor,
            solver,
            synthesizer,
        }
    }

    /// Build providers from `llm_config`, optionally overriding the chat model
    pub fn from_llm_config(
        llm_config: &LlmConfig,
        config: DebateConfig,
        model: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let llm = llm_config.completion_provider(model)?;
        let retriever: Arc<dyn Retriever> = match llm_config.embedding_provider()? {
            Some(embedder) => Arc::new(EmbeddingRetriever::new(embedder)),
            None => Arc::new(LexicalRetriever::new()),
        };
        Ok(Self::new(llm, retriever, config))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Run a debate to its terminal record, delivering every message to `sink`.
    ///
    /// The terminal `done` or `error` message is always the last one sent.
    pub async fn run(
        &self,
        request: &DebateRequest,
        sink: &EventSink,
    ) -> Result<DebateTranscript, DebateError> {
        let session = DebateSession::new(self.model());
        let span = tracing::info_span!("debate_session", session_id = %session.id);
        self.run_session(session, request, sink)
            .instrument(span)
            .await
    }

    async fn run_session(
        &self,
        mut session: DebateSession,
        request: &DebateRequest,
        sink: &EventSink,
    ) -> Result<DebateTranscript, DebateError> {
        global_metrics().record_debate();
        metrics::counter!("dissent_debates_total").increment(1);
        let started = Instant::now();

        let (query, answer) = match self.drive(&mut session, request, sink).await {
            Ok(result) => result,
            Err(err) => {
                self.fail(&mut session, &err, sink).await;
                return Err(err);
            }
        };

        let rounds = session.stats.rounds_executed;
        let done = StepDraft::new(
            Stage::Done,
            "System",
            format!("Debate complete after {} round(s)", rounds),
        );
        if let Err(err) = session.record(done) {
            self.fail(&mut session, &err, sink).await;
            return Err(err);
        }
        let (steps, stats) = session.finish();
        tracing::info!(
            rounds,
            answers = answer.answers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Debate finished"
        );

        // The debate is complete; deliver it even if cancellation raced the last stage
        let _ = sink
            .send_final(DebateMessage::Done {
                query: query.clone(),
                final_answer: answer.clone(),
                stats: stats.clone(),
            })
            .await;

        Ok(DebateTranscript {
            query,
            steps,
            final_answer: answer,
            stats,
        })
    }

    /// Run a debate with no consumer attached
    pub async fn run_to_completion(
        &self,
        request: &DebateRequest,
    ) -> Result<DebateTranscript, DebateError> {
        self.run(request, &EventSink::detached()).await
    }

    /// Run a debate in the background and stream its messages.
    ///
    /// Dropping the stream cancels the session at its next boundary.
    pub fn stream(&self, request: DebateRequest) -> ReceiverStream<DebateMessage> {
        self.stream_with_cancel(request, CancellationToken::new())
    }

    /// Like [`Orchestrator::stream`], also stopping when `token` is cancelled
    pub fn stream_with_cancel(
        &self,
        request: DebateRequest,
        token: CancellationToken,
    ) -> ReceiverStream<DebateMessage> {
        let (sink, rx) = EventSink::channel(self.config.event_buffer);
        let sink = sink.with_token(token);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            // The terminal record has already been delivered on error
            let _ = orchestrator.run(&request, &sink).await;
        });
        ReceiverStream::new(rx)
    }

    async fn emit(
        &self,
        session: &mut DebateSession,
        sink: &EventSink,
        draft: StepDraft,
    ) -> Result<(), DebateError> {
        if sink.is_cancelled() {
            return Err(DebateError::Cancelled);
        }
        let event = session.record(draft)?;
        sink.send(DebateMessage::Step { data: event }).await
    }

    async fn fail(&self, session: &mut DebateSession, err: &DebateError, sink: &EventSink) {
        global_metrics().record_debate_failed();
        if *err == DebateError::Cancelled {
            global_metrics().record_cancelled();
            tracing::info!(stage = ?session.stage(), "Debate cancelled");
        } else {
            tracing::error!(stage = ?session.stage(), error = %err, "Debate failed");
        }
        if !session.is_finished() {
            let _ = session.record(StepDraft::new(Stage::Error, "System", err.to_string()));
        }
        // Fails only when the consumer has already gone away
        let _ = sink.send_final(DebateMessage::error(err)).await;
    }

    async fn drive(
        &self,
        session: &mut DebateSession,
        request: &DebateRequest,
        sink: &EventSink,
    ) -> Result<(String, FinalAnswer), DebateError> {
        // setup
        let timer = Timer::new("setup");
        let valid = request.validate(&self.config.limits)?;
        let agents = valid.agent_count(self.config.max_agents);
        session.stats.documents = valid.documents.len();
        session.stats.agents = agents;
        session.stats.rounds = valid.rounds;
        self.emit(
            session,
            sink,
            StepDraft::new(
                Stage::Setup,
                "System",
                format!(
                    "Debating {} document(s) with {} agent(s), up to {} round(s), top_k {}",
                    valid.documents.len(),
                    agents,
                    valid.rounds,
                    valid.top_k
                ),
            ),
        )
        .await?;
        session.time(timer);

        let assignments = self.gather_evidence(session, &valid, sink).await?;

        let mut previous: Option<AmbiguityAssessment> = None;
        for round in 1..=valid.rounds {
            let guidance = previous.as_ref().and_then(|a| a.guidance.clone());
            self.debate_round(
                session,
                &valid,
                &assignments,
                round,
                guidance.as_deref(),
                sink,
            )
            .await?;
            let assessment = self
                .assess_round(session, &valid, round, previous.as_ref(), sink)
                .await?;
            let stop = assessment.decision.is_stop();
            session.add_assessment(assessment.clone());
            if stop {
                break;
            }
            previous = Some(assessment);
        }

        let answer = self.synthesize(session, &valid, sink).await?;
        Ok((valid.query.to_string(), answer))
    }

    async fn gather_evidence(
        &self,
        session: &mut DebateSession,
        valid: &ValidatedRequest,
        sink: &EventSink,
    ) -> Result<Vec<AgentAssignment>, DebateError> {
        let timer = Timer::new("indexing");
        let mut store = EvidenceStore::new(
            self.retriever.clone(),
            Chunker::new(self.config.chunk_size, self.config.chunk_overlap),
        );
        let chunks = store.index(&valid.documents);
        session.stats.chunks = chunks;
        self.emit(
            session,
            sink,
            StepDraft::new(
                Stage::Indexing,
                "Indexer",
                format!(
                    "Indexed {} document(s) into {} chunk(s) for {} retrieval",
                    valid.documents.len(),
                    chunks,
                    store.retriever_name()
                ),
            ),
        )
        .await?;
        session.time(timer);

        let timer = Timer::new("retrieval");
        let evidence = tokio::select! {
            result = store.retrieve(valid.query.as_str(), valid.top_k) => result?,
            _ = sink.cancelled() => return Err(DebateError::Cancelled),
        };
        session.stats.retrieval_seconds = timer.elapsed().as_secs_f64();
        session.stats.retrieved = evidence.values().map(Vec::len).sum();

        for document in &valid.documents {
            let snippets = evidence.get(&document.id).cloned().unwrap_or_default();
            let message = if snippets.is_empty() {
                format!("No evidence retrieved from {}", document.label())
            } else {
                snippets
                    .iter()
                    .map(|s| {
                        format!(
                            "[{}] Doc {}: {}",
                            s.rank,
                            s.doc_id,
                            compact(&s.text, EXCERPT_CHARS)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            tracing::debug!(doc_id = document.id, snippets = snippets.len(), "Retrieved evidence");
            self.emit(
                session,
                sink,
                StepDraft::new(Stage::Retrieval, "Retriever", message)
                    .doc(Some(document.id))
                    .payload(StepPayload::Snippets { snippets }),
            )
            .await?;
        }
        session.time(timer);

        let timer = Timer::new("evidence");
        let assignments = assign_agents(&valid.documents, &evidence, self.config.max_agents);
        for assignment in &assignments {
            let docs: Vec<String> = assignment
                .doc_ids
                .iter()
                .map(|d| format!("Doc {}", d))
                .collect();
            self.emit(
                session,
                sink,
                StepDraft::new(
                    Stage::Evidence,
                    "Assigner",
                    format!(
                        "{} bound to {} with {} snippet(s)",
                        assignment.speaker(),
                        docs.join(", "),
                        assignment.snippets.len()
                    ),
                )
                .agent(assignment.agent_id)
                .doc(assignment.primary_doc())
                .payload(StepPayload::Assignment {
                    assignment: assignment.clone(),
                }),
            )
            .await?;
        }
        session.time(timer);
        Ok(assignments)
    }

    async fn debate_round(
        &self,
        session: &mut DebateSession,
        valid: &ValidatedRequest,
        assignments: &[AgentAssignment],
        round: u32,
        guidance: Option<&str>,
        sink: &EventSink,
    ) -> Result<(), DebateError> {
        let timer = Timer::new("debate");
        self.emit(
            session,
            sink,
            StepDraft::new(
                Stage::Debate,
                "System",
                format!("Round {}: {} agent(s) debating", round, assignments.len()),
            )
            .round(round),
        )
        .await?;

        let transcript = session.transcript();
        let calls = assignments.iter().map(|assignment| {
            self.executor
                .execute(&valid.query, assignment, round, &transcript, guidance)
        });
        // Full barrier: every agent finishes or degrades before the round closes
        let outcomes: Vec<AgentOutcome> = tokio::select! {
            outcomes = join_all(calls) => outcomes,
            _ = sink.cancelled() => return Err(DebateError::Cancelled),
        };

        if !outcomes.is_empty() && outcomes.iter().all(AgentOutcome::is_degraded) {
            let failures = outcomes
                .iter()
                .map(|o| {
                    let reason = o.failures().last().cloned().unwrap_or_default();
                    format!("Agent {}: {}", o.response().agent_id, reason)
                })
                .collect();
            return Err(DebateError::AllAgentsFailed {
                round,
                agents: outcomes.len(),
                failures,
            });
        }

        // join_all keeps assignment order, which is ascending agent id
        let mut responses: Vec<AgentResponse> = Vec::with_capacity(outcomes.len());
        for (outcome, assignment) in outcomes.into_iter().zip(assignments) {
            let retried = matches!(outcome, AgentOutcome::Retried { .. });
            let response = outcome.into_response();
            let mut message = response.claim();
            if retried {
                message.push_str(" (after retry)");
            }
            self.emit(
                session,
                sink,
                StepDraft::new(Stage::Debate, assignment.speaker(), message)
                    .round(round)
                    .agent(response.agent_id)
                    .doc(assignment.primary_doc())
                    .payload(StepPayload::Response {
                        response: response.clone(),
                    }),
            )
            .await?;
            responses.push(response);
        }

        global_metrics().record_round();
        metrics::counter!("dissent_rounds_total").increment(1);
        session.add_round(responses);
        session.time(timer);
        Ok(())
    }

    async fn assess_round(
        &self,
        session: &mut DebateSession,
        valid: &ValidatedRequest,
        round: u32,
        previous: Option<&AmbiguityAssessment>,
        sink: &EventSink,
    ) -> Result<AmbiguityAssessment, DebateError> {
        let timer = Timer::new("ambiguity");
        let responses = session.last_round().unwrap_or_default().to_vec();
        let mut assessment = self
            .solver
            .assess(round, valid.rounds, &responses, previous);

        if assessment.decision == Decision::Continue {
            let guidance = self.bounded("guidance", self.solver.guidance(&valid.query, &responses));
            assessment.guidance = tokio::select! {
                guidance = guidance => guidance,
                _ = sink.cancelled() => return Err(DebateError::Cancelled),
            };
        }

        tracing::info!(
            round,
            classification = ?assessment.classification,
            decision = ?assessment.decision,
            "Ambiguity assessed"
        );
        self.emit(
            session,
            sink,
            StepDraft::new(
                Stage::Ambiguity,
                "Ambiguity Solver",
                format!(
                    "{}: {} Decision: {}.",
                    classification_text(assessment.classification),
                    assessment.rationale,
                    decision_text(assessment.decision)
                ),
            )
            .round(round)
            .payload(StepPayload::Assessment {
                assessment: assessment.clone(),
            }),
        )
        .await?;
        session.time(timer);
        Ok(assessment)
    }

    /// Optional completions get the same bound as agent calls; a late
    /// reply is dropped and the deterministic text stands.
    async fn bounded<F>(&self, what: &'static str, call: F) -> Option<String>
    where
        F: std::future::Future<Output = Option<String>>,
    {
        let limit = self.config.executor.timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!(
                    call = what,
                    timeout_ms = limit.as_millis() as u64,
                    "Optional completion timed out"
                );
                None
            }
        }
    }

    async fn synthesize(
        &self,
        session: &mut DebateSession,
        valid: &ValidatedRequest,
        sink: &EventSink,
    ) -> Result<FinalAnswer, DebateError> {
        let timer = Timer::new("synthesis");
        let (Some(responses), Some(assessment)) = (session.last_round(), session.last_assessment())
        else {
            return Err(DebateError::Synthesis(
                "no completed round to synthesize".to_string(),
            ));
        };
        let mut answer = self.synthesizer.synthesize(responses, assessment)?;

        let narration = self.bounded("narration", self.synthesizer.narrate(&valid.query, &answer));
        let narrative = tokio::select! {
            narrative = narration => narrative,
            _ = sink.cancelled() => return Err(DebateError::Cancelled),
        };
        if let Some(narrative) = narrative {
            answer.summary = narrative;
        }

        let rounds = session.stats.rounds_executed;
        self.emit(
            session,
            sink,
            StepDraft::new(Stage::Synthesis, "Synthesizer", answer.summary.clone())
                .round(rounds)
                .payload(StepPayload::Answer {
                    answer: answer.clone(),
                }),
        )
        .await?;
        session.time(timer);
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dissent_llm::MockProvider;

    fn orchestrator(provider: MockProvider) -> Orchestrator {
        Orchestrator::new(
            Arc::new(provider),
            Arc::new(LexicalRetriever::new()),
            DebateConfig::quiet(),
        )
    }

    #[tokio::test]
    async fn test_single_document_single_agent() {
        let request = DebateRequest::new(vec!["The bridge opened in 1937."], "When did it open?")
            .with_rounds(3);
        let transcript = orchestrator(MockProvider::smart())
            .run_to_completion(&request)
            .await
            .unwrap();

        assert_eq!(transcript.stats.agents, 1);
        assert_eq!(transcript.stats.rounds_executed, 1);
        assert_eq!(transcript.final_answer.answers.len(), 1);
        assert_eq!(transcript.final_answer.answers[0].value, "1937");
        assert_eq!(transcript.stages().last(), Some(&Stage::Done));
    }

    #[tokio::test]
    async fn test_validation_failure_emits_only_terminal_error() {
        let orchestrator = orchestrator(MockProvider::smart());
        let (sink, mut rx) = EventSink::channel(8);
        let request = DebateRequest::new(vec!["doc"], "   ");

        let err = orchestrator.run(&request, &sink).await.unwrap_err();
        assert!(matches!(err, DebateError::InputValidation(_)));
        drop(sink);

        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            messages.push(message);
        }
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            &messages[0],
            DebateMessage::Error { kind: dissent_core::ErrorKind::InputValidation, .. }
        ));
    }

    #[test]
    fn test_decision_text_covers_all_reasons() {
        assert_eq!(decision_text(Decision::Continue), "continue debating");
        assert!(decision_text(Decision::Stop(StopReason::NoNewInformation)).contains("no new"));
    }
}
