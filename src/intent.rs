//! Rule-based question intent classification.
//!
//! A question is matched against a fixed table of categories, each with a
//! list of regular expressions applied to the lowercased question. The
//! table order (`sla`, `fiber`, `penalty`, `duration`, `contract_info`) is
//! significant: it breaks confidence ties when picking the primary intent.
//!
//! Alongside the intents, the classifier pulls simple entities out of the
//! question and labels its interrogative type from Portuguese question
//! words.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    Sla,
    Fiber,
    Penalty,
    Duration,
    ContractInfo,
}

impl IntentCategory {
    /// Table order, which is also the tie-break order.
    pub const ALL: [IntentCategory; 5] = [
        IntentCategory::Sla,
        IntentCategory::Fiber,
        IntentCategory::Penalty,
        IntentCategory::Duration,
        IntentCategory::ContractInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentCategory::Sla => "sla",
            IntentCategory::Fiber => "fiber",
            IntentCategory::Penalty => "penalty",
            IntentCategory::Duration => "duration",
            IntentCategory::ContractInfo => "contract_info",
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    What,
    HowMuch,
    When,
    Where,
    How,
    Why,
    General,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::What => "what",
            QuestionType::HowMuch => "how_much",
            QuestionType::When => "when",
            QuestionType::Where => "where",
            QuestionType::How => "how",
            QuestionType::Why => "why",
            QuestionType::General => "general",
        }
    }
}

/// One detected category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentMatch {
    pub category: IntentCategory,
    pub matches: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entities {
    pub numbers: Vec<String>,
    pub time_units: Vec<String>,
    pub money: Vec<String>,
    pub contract_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentResult {
    pub primary_intent: Option<IntentCategory>,
    /// Detected categories only, by descending confidence (ties in table order).
    pub all_intents: Vec<IntentMatch>,
    pub entities: Entities,
    pub question_type: QuestionType,
}

impl IntentResult {
    pub fn confidence(&self, category: IntentCategory) -> Option<f64> {
        self.all_intents
            .iter()
            .find(|m| m.category == category)
            .map(|m| m.confidence)
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("intent pattern is valid"))
        .collect()
}

static INTENT_TABLE: LazyLock<Vec<(IntentCategory, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            IntentCategory::Sla,
            compile(&[
                r"\bsla\b",
                r"tempo.*resposta",
                r"prazo.*atendimento",
                r"nivel.*serviço",
                r"disponibilidade",
                r"uptime",
            ]),
        ),
        (
            IntentCategory::Fiber,
            compile(&[
                r"\bfibra\b",
                r"\bkm\b",
                r"quilometr",
                r"extensão",
                r"rede",
                r"cabo",
                r"infraestrutura",
            ]),
        ),
        (
            IntentCategory::Penalty,
            compile(&[
                r"\bmulta\b",
                r"penalidade",
                r"sanção",
                r"valor.*multa",
                r"descumprimento",
                r"infração",
            ]),
        ),
        (
            IntentCategory::Duration,
            compile(&[
                r"\bprazo\b",
                r"vigência",
                r"duração",
                r"período",
                r"renovação",
                r"vencimento",
                r"término",
            ]),
        ),
        (
            IntentCategory::ContractInfo,
            compile(&[
                r"número.*contrato",
                r"contrato.*n",
                r"identificação",
                r"partes",
                r"contratante",
                r"contratada",
            ]),
        ),
    ]
});

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").expect("valid regex"));
static TIME_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d+\s*(?:horas?|dias?|meses?|anos?|minutos?)\b").expect("valid regex")
});
static MONEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R\$\s*\d+(?:[.,]\d+)*").expect("valid regex"));
static CONTRACT_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"contrato\s*n?[°º]?\s*[\w\-/]+").expect("valid regex"));

/// Question words per type, checked in priority order.
const QUESTION_WORDS: &[(QuestionType, &[&str])] = &[
    (QuestionType::What, &["qual", "quais", "que", "o que"]),
    (QuestionType::HowMuch, &["quanto", "quantos", "quantas"]),
    (QuestionType::When, &["quando", "que horas", "que dia"]),
    (QuestionType::Where, &["onde", "em que local"]),
    (QuestionType::How, &["como", "de que forma"]),
    (QuestionType::Why, &["por que", "porque", "motivo"]),
];

/// The ordered patterns for one category.
pub fn patterns(category: IntentCategory) -> &'static [Regex] {
    INTENT_TABLE
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, p)| p.as_slice())
        .unwrap_or(&[])
}

/// Classify a question. Never fails; a question matching nothing yields no
/// primary intent and an empty `all_intents`.
pub fn classify_intent(question: &str) -> IntentResult {
    let lowered = question.to_lowercase();

    let mut all_intents: Vec<IntentMatch> = INTENT_TABLE
        .iter()
        .filter_map(|(category, patterns)| {
            let matches = patterns.iter().filter(|p| p.is_match(&lowered)).count();
            (matches > 0).then(|| IntentMatch {
                category: *category,
                matches,
                confidence: (matches as f64 / patterns.len() as f64 * 2.0).min(1.0),
            })
        })
        .collect();

    // Stable sort keeps table order among equal confidences.
    all_intents.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    IntentResult {
        primary_intent: all_intents.first().map(|m| m.category),
        all_intents,
        entities: extract_entities(question, &lowered),
        question_type: question_type(&lowered),
    }
}

fn extract_entities(question: &str, lowered: &str) -> Entities {
    let collect = |re: &Regex, text: &str| -> Vec<String> {
        re.find_iter(text).map(|m| m.as_str().to_string()).collect()
    };
    Entities {
        numbers: collect(&NUMBER_RE, question),
        time_units: collect(&TIME_UNIT_RE, lowered),
        money: collect(&MONEY_RE, question),
        contract_refs: collect(&CONTRACT_REF_RE, lowered),
    }
}

fn question_type(lowered: &str) -> QuestionType {
    QUESTION_WORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(t, _)| *t)
        .unwrap_or(QuestionType::General)
}
