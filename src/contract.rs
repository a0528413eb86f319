//! Regex-driven extraction of contract fields.
//!
//! The patterns target Brazilian Portuguese telecom contracts: contract
//! numbers, SLA durations, fiber length in km, penalty amounts in `R$`, and
//! contract duration. All matching is case-insensitive.
//!
//! `contract_number` takes the first pattern that matches anywhere in the
//! text (patterns are ordered most specific first). Every other field
//! collects all matches of all its patterns, in pattern order then match
//! position, without deduplication: the same phrase may appear twice when
//! two patterns cover it.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::models::ContractInfo;

/// Field categories recognised by [`extract_contract_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractField {
    ContractNumber,
    SlaTime,
    FiberKm,
    PenaltyValue,
    ContractDuration,
}

impl ContractField {
    pub const ALL: [ContractField; 5] = [
        ContractField::ContractNumber,
        ContractField::SlaTime,
        ContractField::FiberKm,
        ContractField::PenaltyValue,
        ContractField::ContractDuration,
    ];
}

/// How a match is turned into the stored string.
#[derive(Debug, Clone, Copy)]
enum Render {
    /// Capture group 1 verbatim.
    Group,
    /// `"<g1> <g2>"`, e.g. `"4 horas"`.
    NumberUnit,
    /// `"<g1> km"`.
    Km,
    /// `"R$ <g1>"`.
    Currency,
}

impl Render {
    fn apply(self, caps: &Captures<'_>) -> String {
        let g = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        match self {
            Render::Group => g(1).to_string(),
            Render::NumberUnit => format!("{} {}", g(1), g(2)),
            Render::Km => format!("{} km", g(1)),
            Render::Currency => format!("R$ {}", g(1)),
        }
    }
}

/// A compiled pattern and the way its captures are rendered.
#[derive(Debug)]
pub struct FieldPattern {
    regex: Regex,
    render: Render,
}

impl FieldPattern {
    fn new(pattern: &str, render: Render) -> Self {
        Self {
            regex: Regex::new(&format!("(?i){}", pattern)).expect("contract pattern is valid"),
            render,
        }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

const TIME_UNIT: &str = r"(horas?|dias?|minutos?)";
const DECIMAL_KM: &str = r"(\d+(?:,\d+)?)";
const BRL_AMOUNT: &str = r"(\d+(?:\.\d{3})*(?:,\d{2})?)";

static PATTERN_TABLE: LazyLock<Vec<(ContractField, Vec<FieldPattern>)>> = LazyLock::new(|| {
    use Render::*;
    vec![
        (
            ContractField::ContractNumber,
            vec![
                FieldPattern::new(r"contrato\s+n[°º]?\s*(\w+[-/]\w+[-/]\w+)", Group),
                FieldPattern::new(r"contrato\s+(\w+[-/]\w+[-/]\w+)", Group),
                FieldPattern::new(r"n[°º]\s*(\w+[-/]\w+[-/]\w+)", Group),
            ],
        ),
        (
            ContractField::SlaTime,
            vec![
                FieldPattern::new(&format!(r"sla\s+.*?(\d+)\s*{}", TIME_UNIT), NumberUnit),
                FieldPattern::new(&format!(r"prazo\s+.*?(\d+)\s*{}", TIME_UNIT), NumberUnit),
                FieldPattern::new(&format!(r"atendimento\s+.*?(\d+)\s*{}", TIME_UNIT), NumberUnit),
                FieldPattern::new(
                    &format!(r"(\d+)\s*{}\s+para.*?(?:incidente|atendimento|sla)", TIME_UNIT),
                    NumberUnit,
                ),
                FieldPattern::new(&format!(r"será\s+de\s+(\d+)\s*{}", TIME_UNIT), NumberUnit),
            ],
        ),
        (
            ContractField::FiberKm,
            vec![
                FieldPattern::new(&format!(r"{}\s*km\s+de\s+fibra", DECIMAL_KM), Km),
                FieldPattern::new(&format!(r"fibra\s+(?:óptica\s+)?.*?{}\s*km", DECIMAL_KM), Km),
                FieldPattern::new(&format!(r"extensão\s+de\s+{}\s*km", DECIMAL_KM), Km),
                FieldPattern::new(&format!(r"será\s+de\s+{}\s*km", DECIMAL_KM), Km),
            ],
        ),
        (
            ContractField::PenaltyValue,
            vec![
                FieldPattern::new(&format!(r"multa\s+de\s+r\$\s*{}", BRL_AMOUNT), Currency),
                FieldPattern::new(&format!(r"penalidade\s+de\s+r\$\s*{}", BRL_AMOUNT), Currency),
                FieldPattern::new(
                    &format!(r"valor\s+da\s+multa\s*:\s*r\$\s*{}", BRL_AMOUNT),
                    Currency,
                ),
            ],
        ),
        (
            ContractField::ContractDuration,
            vec![
                FieldPattern::new(r"vigência\s+de\s+(\d+)\s*(anos?|meses?)", NumberUnit),
                FieldPattern::new(r"prazo\s+de\s+(\d+)\s*(anos?|meses?)", NumberUnit),
                FieldPattern::new(r"duração\s+de\s+(\d+)\s*(anos?|meses?)", NumberUnit),
            ],
        ),
    ]
});

/// The ordered patterns for one field.
pub fn patterns(field: ContractField) -> &'static [FieldPattern] {
    PATTERN_TABLE
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, p)| p.as_slice())
        .unwrap_or(&[])
}

fn first_match(field: ContractField, text: &str) -> Option<String> {
    patterns(field).iter().find_map(|p| {
        p.regex
            .captures(text)
            .map(|caps| p.render.apply(&caps))
    })
}

fn all_matches(field: ContractField, text: &str) -> Vec<String> {
    patterns(field)
        .iter()
        .flat_map(|p| p.regex.captures_iter(text).map(move |caps| p.render.apply(&caps)))
        .collect()
}

/// Extract contract fields from raw or cleaned text.
///
/// Absent fields are `None` or empty; extraction never fails.
pub fn extract_contract_info(text: &str) -> ContractInfo {
    ContractInfo {
        contract_number: first_match(ContractField::ContractNumber, text),
        sla_times: all_matches(ContractField::SlaTime, text),
        fiber_km: all_matches(ContractField::FiberKm, text),
        penalty_values: all_matches(ContractField::PenaltyValue, text),
        contract_duration: all_matches(ContractField::ContractDuration, text),
    }
}
