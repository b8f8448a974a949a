//! MemoryKind - Classification of recorded experience

use serde::{Deserialize, Serialize};

/// Memory kind classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    #[default]
    Observation,
    Decision,
    Reflection,
    Success,
    Failure,
    Learning,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 6] = [
        MemoryKind::Observation,
        MemoryKind::Decision,
        MemoryKind::Reflection,
        MemoryKind::Success,
        MemoryKind::Failure,
        MemoryKind::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Observation => "observation",
            MemoryKind::Decision => "decision",
            MemoryKind::Reflection => "reflection",
            MemoryKind::Success => "success",
            MemoryKind::Failure => "failure",
            MemoryKind::Learning => "learning",
        }
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "observation" => Ok(MemoryKind::Observation),
            "decision" => Ok(MemoryKind::Decision),
            "reflection" => Ok(MemoryKind::Reflection),
            "success" => Ok(MemoryKind::Success),
            "failure" => Ok(MemoryKind::Failure),
            "learning" => Ok(MemoryKind::Learning),
            _ => Err(format!("Unknown memory kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_agree() {
        for kind in MemoryKind::ALL {
            let parsed: MemoryKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("memo".parse::<MemoryKind>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&MemoryKind::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }
}
