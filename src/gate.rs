//! Completion gate: decides whether a language's translated output is emitted.
//!
//! A threshold is either an absolute number of translated messages or a
//! percentage of the live messages. Decisions are taken on the statistics the
//! build has accumulated so far, and an excluded language stays excluded for
//! the rest of the build.

use std::{collections::BTreeSet, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{error::Error, types::CatalogStats};

/// Minimum translation requirement for a language.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ThresholdSetting", into = "ThresholdSetting")]
pub enum Threshold {
    /// Absolute number of translated messages.
    Messages(usize),
    /// Percentage (0-100) of translated messages.
    Percent(f64),
}

/// A threshold as written in the configuration, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSetting {
    Integer(i64),
    Text(String),
}

impl ThresholdSetting {
    pub fn resolve(&self) -> Result<Threshold, Error> {
        Threshold::try_from(self.clone())
    }
}

impl TryFrom<ThresholdSetting> for Threshold {
    type Error = Error;

    fn try_from(value: ThresholdSetting) -> Result<Self, Self::Error> {
        match value {
            ThresholdSetting::Integer(n) => usize::try_from(n)
                .map(Threshold::Messages)
                .map_err(|_| Error::InvalidThreshold(n.to_string())),
            ThresholdSetting::Text(s) => s.parse(),
        }
    }
}

impl From<Threshold> for ThresholdSetting {
    fn from(value: Threshold) -> Self {
        match value {
            Threshold::Messages(n) => ThresholdSetting::Integer(n as i64),
            Threshold::Percent(_) => ThresholdSetting::Text(value.to_string()),
        }
    }
}

impl FromStr for Threshold {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || Error::InvalidThreshold(s.to_string());
        if let Some(number) = trimmed.strip_suffix('%') {
            let percent: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !percent.is_finite() || percent < 0.0 {
                return Err(invalid());
            }
            Ok(Threshold::Percent(percent))
        } else {
            trimmed
                .parse::<usize>()
                .map(Threshold::Messages)
                .map_err(|_| invalid())
        }
    }
}

impl Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Threshold::Messages(n) => write!(f, "{}", n),
            Threshold::Percent(p) => write!(f, "{}%", readable_float(*p)),
        }
    }
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    pub include: bool,
    /// Human-readable notes: clamping and exclusion reasons.
    pub diagnostics: Vec<String>,
}

/// Evaluates the threshold for `language` against `stats`.
///
/// Without a threshold every language is included. An absolute threshold
/// above the number of messages is clamped to that number, so a language is
/// never excluded for missing an unreachable bar.
pub fn evaluate(
    language: &str,
    stats: CatalogStats,
    threshold: Option<Threshold>,
) -> GateDecision {
    let mut diagnostics = Vec::new();
    let include = match threshold {
        None => true,
        Some(Threshold::Percent(required)) => {
            let percent = stats.percent();
            let include = percent >= required;
            if !include {
                diagnostics.push(format!(
                    "Excluding language \"{}\". Translated {}% ({} of {} messages) but required {}% at least.",
                    language,
                    readable_float(percent),
                    stats.translated,
                    stats.total,
                    readable_float(required),
                ));
            }
            include
        }
        Some(Threshold::Messages(mut required)) => {
            if required > stats.total {
                let message = format!(
                    "Found more required translated messages ({}) than total of them ({}). Using {} for \"min_translated_messages\" value.",
                    required, stats.total, stats.total,
                );
                warn!("{}", message);
                diagnostics.push(message);
                required = stats.total;
            }
            let include = stats.translated >= required;
            if !include {
                diagnostics.push(format!(
                    "Excluding language \"{}\". Translated {} messages of {} but required {} translated messages at least.",
                    language, stats.translated, stats.total, required,
                ));
            }
            include
        }
    };
    GateDecision {
        include,
        diagnostics,
    }
}

/// Convenience wrapper over [`evaluate`] returning only the verdict.
pub fn should_include(language: &str, stats: CatalogStats, threshold: Option<Threshold>) -> bool {
    evaluate(language, stats, threshold).include
}

/// Which statistics the gate is fed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateScope {
    /// Running totals over every document of the language processed so far.
    #[default]
    Language,
    /// Only the statistics of the document being emitted.
    Document,
}

/// Tracks gate decisions over a whole build.
#[derive(Debug, Clone, Default)]
pub struct CompletionGate {
    threshold: Option<Threshold>,
    excluded: BTreeSet<String>,
}

impl CompletionGate {
    pub fn new(threshold: Option<Threshold>) -> Self {
        Self {
            threshold,
            excluded: BTreeSet::new(),
        }
    }

    pub fn threshold(&self) -> Option<Threshold> {
        self.threshold
    }

    /// Evaluates `language`; an exclusion is final for the rest of the build.
    pub fn check(&mut self, language: &str, stats: CatalogStats) -> GateDecision {
        if self.excluded.contains(language) {
            return GateDecision {
                include: false,
                diagnostics: Vec::new(),
            };
        }
        let decision = evaluate(language, stats, self.threshold);
        if !decision.include {
            for message in decision.diagnostics.iter().filter(|m| m.starts_with("Excluding")) {
                info!("{}", message);
            }
            self.excluded.insert(language.to_string());
        }
        decision
    }

    pub fn is_excluded(&self, language: &str) -> bool {
        self.excluded.contains(language)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }
}

/// Formats a float without a trailing `.0`, prefixing `~` when rounding to
/// two decimals changed its representation.
pub fn readable_float(number: f64) -> String {
    if number.fract() == 0.0 {
        return format!("{}", number as i64);
    }
    let exact = number.to_string();
    let rounded = ((number * 100.0).round() / 100.0).to_string();
    if rounded.len() != exact.len() {
        format!("~{}", rounded)
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thresholds() {
        assert_eq!("5".parse::<Threshold>().unwrap(), Threshold::Messages(5));
        assert_eq!("0".parse::<Threshold>().unwrap(), Threshold::Messages(0));
        assert_eq!(
            "50%".parse::<Threshold>().unwrap(),
            Threshold::Percent(50.0)
        );
        assert_eq!(
            " 12.5 % ".parse::<Threshold>().unwrap(),
            Threshold::Percent(12.5)
        );
    }

    #[test]
    fn test_parse_invalid_thresholds() {
        for raw in ["-1", "abc", "%", "-5%", "ten%", "1.5"] {
            assert!(
                matches!(raw.parse::<Threshold>(), Err(Error::InvalidThreshold(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialize_integer_or_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            threshold: Threshold,
        }
        let int: Wrapper = toml::from_str("threshold = 3").unwrap();
        assert_eq!(int.threshold, Threshold::Messages(3));
        let percent: Wrapper = toml::from_str("threshold = \"75%\"").unwrap();
        assert_eq!(percent.threshold, Threshold::Percent(75.0));
        assert!(toml::from_str::<Wrapper>("threshold = -3").is_err());
        assert!(toml::from_str::<Wrapper>("threshold = \"lots\"").is_err());
    }

    #[test]
    fn test_setting_resolves_to_threshold() {
        assert_eq!(
            ThresholdSetting::Integer(4).resolve().unwrap(),
            Threshold::Messages(4)
        );
        assert_eq!(
            ThresholdSetting::Text("80%".to_string()).resolve().unwrap(),
            Threshold::Percent(80.0)
        );
        assert!(matches!(
            ThresholdSetting::Integer(-1).resolve(),
            Err(Error::InvalidThreshold(_))
        ));
        assert_eq!(
            ThresholdSetting::from(Threshold::Percent(50.0)),
            ThresholdSetting::Text("50%".to_string())
        );
    }

    #[test]
    fn test_no_threshold_always_includes() {
        assert!(should_include("es", CatalogStats::new(0, 10), None));
    }

    #[test]
    fn test_percent_threshold() {
        let threshold = Some(Threshold::Percent(50.0));

        let decision = evaluate("es", CatalogStats::new(1, 3), threshold);
        assert!(!decision.include);
        assert_eq!(
            decision.diagnostics,
            vec![
                "Excluding language \"es\". Translated ~33.33% (1 of 3 messages) but required 50% at least."
                    .to_string()
            ]
        );

        assert!(should_include("es", CatalogStats::new(2, 3), threshold));
    }

    #[test]
    fn test_percent_with_no_messages_is_complete() {
        assert!(should_include(
            "es",
            CatalogStats::new(0, 0),
            Some(Threshold::Percent(100.0))
        ));
    }

    #[test]
    fn test_absolute_threshold_clamps_to_total() {
        let decision = evaluate("es", CatalogStats::new(0, 2), Some(Threshold::Messages(5)));

        assert!(!decision.include);
        assert!(decision.diagnostics[0].contains("Using 2 for \"min_translated_messages\""));
        assert!(decision.diagnostics[1].contains("required 2 translated messages"));
    }

    #[test]
    fn test_absolute_threshold_clamp_can_include() {
        let decision = evaluate("es", CatalogStats::new(2, 2), Some(Threshold::Messages(5)));
        assert!(decision.include);
        assert_eq!(decision.diagnostics.len(), 1);
    }

    #[test]
    fn test_absolute_threshold() {
        let threshold = Some(Threshold::Messages(2));
        assert!(!should_include("es", CatalogStats::new(1, 3), threshold));
        assert!(should_include("es", CatalogStats::new(2, 3), threshold));
    }

    #[test]
    fn test_gate_exclusion_is_final() {
        let mut gate = CompletionGate::new(Some(Threshold::Messages(2)));

        assert!(!gate.check("es", CatalogStats::new(1, 3)).include);
        assert!(gate.is_excluded("es"));
        assert!(!gate.check("es", CatalogStats::new(3, 3)).include);
        assert!(gate.check("fr", CatalogStats::new(3, 3)).include);
        assert_eq!(gate.excluded().collect::<Vec<_>>(), vec!["es"]);
    }

    #[test]
    fn test_readable_float() {
        assert_eq!(readable_float(50.0), "50");
        assert_eq!(readable_float(0.0), "0");
        assert_eq!(readable_float(12.5), "12.5");
        assert_eq!(readable_float(100.0 / 3.0), "~33.33");
    }

    #[test]
    fn test_threshold_display() {
        assert_eq!(Threshold::Messages(4).to_string(), "4");
        assert_eq!(Threshold::Percent(50.0).to_string(), "50%");
    }
}
