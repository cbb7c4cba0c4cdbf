use serde::{Deserialize, Serialize};

/// Totally ordered crisis severity classification.
///
/// Derived from a numeric crisis score in `[0,1]` via [`SeverityThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Safe => "safe",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(Severity::Safe),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Config-driven cutoffs for deriving [`Severity`] from a crisis score.
///
/// Defaults per spec §3: CRITICAL 0.85, HIGH 0.55, MEDIUM 0.28, LOW 0.16.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 0.85,
            high: 0.55,
            medium: 0.28,
            low: 0.16,
        }
    }
}

impl SeverityThresholds {
    /// Highest severity whose threshold is `<= score`; `Safe` iff `score < low`.
    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.critical {
            Severity::Critical
        } else if score >= self.high {
            Severity::High
        } else if score >= self.medium {
            Severity::Medium
        } else if score >= self.low {
            Severity::Low
        } else {
            Severity::Safe
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        let t = SeverityThresholds::default();
        assert_eq!(t.classify(0.0), Severity::Safe);
        assert_eq!(t.classify(0.15), Severity::Safe);
        assert_eq!(t.classify(0.16), Severity::Low);
        assert_eq!(t.classify(0.27), Severity::Low);
        assert_eq!(t.classify(0.28), Severity::Medium);
        assert_eq!(t.classify(0.54), Severity::Medium);
        assert_eq!(t.classify(0.55), Severity::High);
        assert_eq!(t.classify(0.84), Severity::High);
        assert_eq!(t.classify(0.85), Severity::Critical);
        assert_eq!(t.classify(1.0), Severity::Critical);
    }

    #[test]
    fn ordering_is_total() {
        assert!(Severity::Safe < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn parse_roundtrip() {
        for s in [
            Severity::Safe,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let parsed: Severity = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }
}
