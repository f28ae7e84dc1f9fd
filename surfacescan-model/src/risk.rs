use std::fmt;

/// Banding used for scan-complete notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            RiskLevel::High
        } else if score >= 60.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn headline(self) -> &'static str {
        match self {
            RiskLevel::High => "High Risk Scan Complete",
            RiskLevel::Medium => "Medium Risk Scan Complete",
            RiskLevel::Low => "Scan Complete",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}
