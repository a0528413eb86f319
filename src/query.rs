//! Retrieval-augmented question answering over one contract.
//!
//! Each call to [`RagPipeline::answer_query`] walks the same sequence:
//!
//! ```text
//! classify intent → search document → generate ─┬→ respond
//!                                               └→ extractive fallback → respond
//! ```
//!
//! Retrieval is mandatory: a search failure aborts the query with
//! [`Error::Retrieval`](crate::error::Error::Retrieval). Generation is
//! best-effort: when no completion provider is configured, when the search
//! found nothing, or when the provider call fails, the answer is assembled
//! from the retrieved passages instead.
//!
//! # Confidence
//!
//! - Generated answers: `min(0.95, mean relevance of the context passages × 1.1)`.
//! - Extractive answers: the highest relevance among all hits, `0.0` with no hits.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::generation::{CompletionProvider, CompletionRequest};
use crate::index::VectorIndex;
use crate::intent::{classify_intent, IntentCategory, IntentResult};
use crate::models::{QueryResponse, QuerySession, SearchHit};

/// Upper bound on a generated answer's confidence.
pub const MAX_GENERATED_CONFIDENCE: f64 = 0.95;
const CONFIDENCE_BOOST: f64 = 1.1;
const SNIPPET_CHARS: usize = 200;

pub const NOT_FOUND_ANSWER: &str =
    "Não encontrei informações relevantes no documento para responder sua pergunta.";

const BASE_SYSTEM_PROMPT: &str = "Você é um assistente especializado em análise de contratos de operadoras de telecomunicações, com foco em:

- Tempos de SLA (Service Level Agreement)
- Extensão de fibra óptica em quilômetros
- Valores de multas e penalidades
- Prazos e vigência de contratos
- Cláusulas de rescisão e renovação

Instruções:
1. Responda sempre em português brasileiro, o idioma do documento
2. Base suas respostas EXCLUSIVAMENTE no contexto fornecido
3. Seja preciso e objetivo
4. Cite os trechos específicos quando relevante
5. Se a informação não estiver no contexto, diga claramente
6. Para valores monetários, mantenha o formato original (R$)
7. Para prazos, seja específico (horas, dias, meses, anos)
8. Destaque informações críticas como SLA e multas";

fn intent_focus(category: IntentCategory) -> &'static str {
    match category {
        IntentCategory::Sla => "Foco especial: Esta pergunta é sobre SLA. Procure por tempos de resposta, prazos de atendimento e níveis de serviço.",
        IntentCategory::Fiber => "Foco especial: Esta pergunta é sobre fibra óptica. Procure por extensão em km, capacidade e especificações técnicas.",
        IntentCategory::Penalty => "Foco especial: Esta pergunta é sobre multas e penalidades. Procure por valores monetários e condições de aplicação.",
        IntentCategory::Duration => "Foco especial: Esta pergunta é sobre prazos e vigência. Procure por durações, datas de início/fim e condições de renovação.",
        IntentCategory::ContractInfo => "Foco especial: Esta pergunta é sobre a identificação do contrato. Procure pelo número do contrato, partes contratante e contratada e demais dados de identificação.",
    }
}

/// System prompt for a question, specialised by its primary intent.
pub fn system_prompt(primary_intent: Option<IntentCategory>) -> String {
    match primary_intent {
        Some(category) => format!("{}\n\n{}", BASE_SYSTEM_PROMPT, intent_focus(category)),
        None => BASE_SYSTEM_PROMPT.to_string(),
    }
}

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

/// Context block listing each passage with its relevance and, when known,
/// its page.
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let mut header = format!("[Trecho {} - Relevância: {}", i + 1, percent(hit.relevance_score));
            if hit.metadata.page_number > 0 {
                header.push_str(&format!(" - Página {}", hit.metadata.page_number));
            }
            format!("{}]\n{}\n", header, hit.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn user_prompt(question: &str, context: &str) -> String {
    format!(
        "Pergunta do usuário: {question}

Contexto relevante do contrato:
{context}

Por favor, responda à pergunta baseando-se exclusivamente no contexto fornecido. Se a informação não estiver disponível no contexto, diga claramente que não foi possível encontrar essa informação no documento.

Inclua referências específicas aos trechos relevantes em sua resposta.
"
    )
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Answer assembled from the retrieved passages, with its confidence.
pub fn extractive_answer(hits: &[SearchHit], shown: usize) -> (String, f64) {
    if hits.is_empty() {
        return (NOT_FOUND_ANSWER.to_string(), 0.0);
    }

    let mut answer = format!(
        "Encontrei {} trecho(s) relevante(s) no documento:\n\n",
        hits.len()
    );
    for (i, hit) in hits.iter().take(shown).enumerate() {
        answer.push_str(&format!(
            "{}. (Relevância: {})\n{}\n\n",
            i + 1,
            percent(hit.relevance_score),
            truncate_chars(&hit.content, SNIPPET_CHARS)
        ));
    }

    let confidence = hits
        .iter()
        .map(|h| h.relevance_score)
        .fold(f64::NEG_INFINITY, f64::max);
    (answer, confidence)
}

/// `min(0.95, mean(relevance) × 1.1)` over the passages used as context.
pub fn generated_confidence(context: &[SearchHit]) -> f64 {
    if context.is_empty() {
        return 0.0;
    }
    let mean = context.iter().map(|h| h.relevance_score).sum::<f64>() / context.len() as f64;
    (mean * CONFIDENCE_BOOST).min(MAX_GENERATED_CONFIDENCE)
}

/// Tunables for [`RagPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub context_chunks: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            context_chunks: config.retrieval.context_chunks,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

pub struct RagPipeline {
    index: Arc<VectorIndex>,
    generator: Option<Arc<dyn CompletionProvider>>,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(
        index: Arc<VectorIndex>,
        generator: Option<Arc<dyn CompletionProvider>>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            index,
            generator,
            options,
        }
    }

    /// Answer `question` from the contents of one document.
    ///
    /// # Errors
    ///
    /// Only retrieval failures are returned. Generation failures degrade to
    /// an extractive answer with `fallback` set.
    pub async fn answer_query(&self, question: &str, document_id: &str) -> Result<QueryResponse> {
        let intent = classify_intent(question);
        tracing::info!(
            document_id,
            primary_intent = intent.primary_intent.map(|c| c.as_str()).unwrap_or("none"),
            question_type = intent.question_type.as_str(),
            "Processing query"
        );

        let hits = self
            .index
            .search(question, self.options.top_k, Some(document_id))
            .await?;

        let generated = match (&self.generator, hits.is_empty()) {
            (Some(generator), false) => {
                match self.generate(generator.as_ref(), question, &hits, &intent).await {
                    Ok(answer) => Some(answer),
                    Err(e) => {
                        tracing::warn!(error = %e, "Generation failed, using extractive answer");
                        None
                    }
                }
            }
            _ => None,
        };

        let (answer, confidence_score, fallback) = match generated {
            Some(answer) => {
                let context = &hits[..hits.len().min(self.options.context_chunks)];
                (answer, generated_confidence(context), false)
            }
            None => {
                let (answer, confidence) = extractive_answer(&hits, self.options.context_chunks);
                (answer, confidence, true)
            }
        };

        tracing::info!(
            document_id,
            sources = hits.len(),
            confidence = confidence_score,
            fallback,
            "Query answered"
        );

        Ok(QueryResponse {
            question: question.to_string(),
            answer,
            sources: hits.iter().map(SearchHit::to_chunk).collect(),
            confidence_score,
            fallback,
            primary_intent: intent.primary_intent.map(|c| c.as_str().to_string()),
            timestamp: Utc::now(),
        })
    }

    /// Answer within a session, appending the response to its history.
    pub async fn ask(&self, session: &mut QuerySession, question: &str) -> Result<QueryResponse> {
        let response = self.answer_query(question, &session.document_id).await?;
        session.add_query(response.clone());
        Ok(response)
    }

    async fn generate(
        &self,
        generator: &dyn CompletionProvider,
        question: &str,
        hits: &[SearchHit],
        intent: &IntentResult,
    ) -> Result<String> {
        let context = &hits[..hits.len().min(self.options.context_chunks)];
        let request = CompletionRequest {
            system_prompt: system_prompt(intent.primary_intent),
            user_prompt: user_prompt(question, &build_context(context)),
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };
        tracing::debug!(
            model = generator.model_name(),
            context_passages = context.len(),
            prompt_chars = request.system_prompt.len() + request.user_prompt.len(),
            "Requesting completion"
        );
        let answer = generator.complete(&request).await.map_err(Error::Generation)?;
        Ok(answer)
    }
}

/// Example questions, grouped by topic.
#[derive(Debug, Clone, Serialize)]
pub struct QuerySuggestions {
    pub sla_questions: Vec<&'static str>,
    pub fiber_questions: Vec<&'static str>,
    pub penalty_questions: Vec<&'static str>,
    pub duration_questions: Vec<&'static str>,
    pub general_questions: Vec<&'static str>,
}

pub fn query_suggestions() -> QuerySuggestions {
    QuerySuggestions {
        sla_questions: vec![
            "Qual o tempo de SLA definido no contrato?",
            "Quais são os prazos de atendimento para incidentes?",
            "Qual o nível de disponibilidade garantido?",
        ],
        fiber_questions: vec![
            "Quantos quilômetros de fibra óptica estão inclusos?",
            "Qual a extensão da rede contratada?",
            "Quais as especificações técnicas da fibra?",
        ],
        penalty_questions: vec![
            "Qual o valor da multa por descumprimento?",
            "Quais são as penalidades previstas?",
            "Em que situações se aplicam multas?",
        ],
        duration_questions: vec![
            "Qual o prazo de vigência do contrato?",
            "Quando o contrato pode ser renovado?",
            "Qual a duração mínima do acordo?",
        ],
        general_questions: vec![
            "Qual o número do contrato?",
            "Quem são as partes contratantes?",
            "Quais os principais termos do acordo?",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMetadata;

    fn hit(score: f64, page: u32, content: &str) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            metadata: RecordMetadata {
                document_id: "d1".to_string(),
                filename: "c.pdf".to_string(),
                file_type: "pdf".to_string(),
                chunk_id: "chunk_1".to_string(),
                page_number: page,
                start_char: 0,
                end_char: 0,
            },
            relevance_score: score,
            rank: 1,
        }
    }

    #[test]
    fn context_includes_page_only_when_known() {
        let context = build_context(&[hit(0.873, 3, "SLA de 4 horas"), hit(0.5, 0, "multa")]);
        assert!(context.contains("[Trecho 1 - Relevância: 87.3% - Página 3]\nSLA de 4 horas\n"));
        assert!(context.contains("[Trecho 2 - Relevância: 50.0%]\nmulta\n"));
    }

    #[test]
    fn system_prompt_adds_intent_focus() {
        let base = system_prompt(None);
        let fiber = system_prompt(Some(IntentCategory::Fiber));
        assert!(fiber.starts_with(&base));
        assert!(fiber.contains("fibra óptica. Procure"));
        for category in IntentCategory::ALL {
            assert_ne!(system_prompt(Some(category)), base);
        }
    }

    #[test]
    fn generated_confidence_is_capped() {
        let hits = vec![hit(0.99, 0, "a"), hit(0.98, 0, "b"), hit(0.97, 0, "c")];
        assert_eq!(generated_confidence(&hits), MAX_GENERATED_CONFIDENCE);

        let low = vec![hit(0.5, 0, "a"), hit(0.3, 0, "b")];
        assert!((generated_confidence(&low) - 0.44).abs() < 1e-9);
    }

    #[test]
    fn extractive_answer_without_hits() {
        let (answer, confidence) = extractive_answer(&[], 3);
        assert_eq!(answer, NOT_FOUND_ANSWER);
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn extractive_answer_uses_max_relevance_over_all_hits() {
        let hits = vec![
            hit(0.4, 0, "a"),
            hit(0.3, 0, "b"),
            hit(0.2, 0, "c"),
            hit(0.9, 0, "d"),
        ];
        let (answer, confidence) = extractive_answer(&hits, 3);
        assert_eq!(confidence, 0.9);
        assert!(answer.starts_with("Encontrei 4 trecho(s) relevante(s) no documento:\n\n"));
        assert!(answer.contains("1. (Relevância: 40.0%)\na\n\n"));
        assert!(!answer.contains("4. "));
    }

    #[test]
    fn snippets_are_truncated_by_chars() {
        let long = "ç".repeat(250);
        let (answer, _) = extractive_answer(&[hit(0.5, 0, &long)], 3);
        assert!(answer.contains(&format!("{}...", "ç".repeat(200))));
        assert!(!answer.contains(&"ç".repeat(201)));
    }

    #[test]
    fn suggestions_cover_every_group() {
        let s = query_suggestions();
        for group in [
            &s.sla_questions,
            &s.fiber_questions,
            &s.penalty_questions,
            &s.duration_questions,
            &s.general_questions,
        ] {
            assert_eq!(group.len(), 3);
        }
    }
}
