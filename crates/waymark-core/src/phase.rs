//! Navigation phase state machine
//!
//! ```text
//! Idle → CheckingSameUrl → Recognizing → Diffing → ExitGuards
//!      → EntryGuards → Resolving → Committing → Idle
//! ```
//! Any working phase may end in `Cancelled` or `Errored`, both of which
//! return to `Idle`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationPhase {
    #[default]
    Idle,
    CheckingSameUrl,
    Recognizing,
    Diffing,
    ExitGuards,
    EntryGuards,
    Resolving,
    Committing,
    Cancelled,
    Errored,
}

impl NavigationPhase {
    pub fn can_transition_to(&self, target: NavigationPhase) -> bool {
        use NavigationPhase::*;

        match (self, target) {
            (Idle, CheckingSameUrl) => true,
            // Same URL under `ignore` finishes right away
            (CheckingSameUrl, Recognizing | Idle) => true,
            (Recognizing, Diffing) => true,
            (Diffing, ExitGuards) => true,
            (ExitGuards, EntryGuards | Resolving) => true,
            (EntryGuards, Resolving) => true,
            (Resolving, Committing) => true,
            (Committing, Idle) => true,
            (Cancelled | Errored, Idle) => true,
            (CheckingSameUrl | Recognizing | Diffing | ExitGuards | EntryGuards | Resolving | Committing, Cancelled) => true,
            (CheckingSameUrl | Recognizing | ExitGuards | EntryGuards | Resolving | Committing, Errored) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// True while guards or resolvers may still be running.
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, Self::Idle | Self::Cancelled | Self::Errored)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::CheckingSameUrl => "checking-same-url",
            Self::Recognizing => "recognizing",
            Self::Diffing => "diffing",
            Self::ExitGuards => "exit-guards",
            Self::EntryGuards => "entry-guards",
            Self::Resolving => "resolving",
            Self::Committing => "committing",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}

impl std::fmt::Display for NavigationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for NavigationPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "checking-same-url" => Ok(Self::CheckingSameUrl),
            "recognizing" => Ok(Self::Recognizing),
            "diffing" => Ok(Self::Diffing),
            "exit-guards" => Ok(Self::ExitGuards),
            "entry-guards" => Ok(Self::EntryGuards),
            "resolving" => Ok(Self::Resolving),
            "committing" => Ok(Self::Committing),
            "cancelled" => Ok(Self::Cancelled),
            "errored" => Ok(Self::Errored),
            _ => Err(format!("Unknown navigation phase: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NavigationPhase::*;

    #[test]
    fn test_happy_path() {
        let path = [
            Idle,
            CheckingSameUrl,
            Recognizing,
            Diffing,
            ExitGuards,
            EntryGuards,
            Resolving,
            Committing,
            Idle,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_invalid_transitions() {
        // Guards never run before the diff
        assert!(!Recognizing.can_transition_to(ExitGuards));
        // Entry guards never run before exit guards
        assert!(!Diffing.can_transition_to(EntryGuards));
        // A diff cannot fail, only be superseded
        assert!(!Diffing.can_transition_to(Errored));
        assert!(!Idle.can_transition_to(Committing));
        assert!(!Cancelled.can_transition_to(Resolving));
    }

    #[test]
    fn test_round_trip_names() {
        for phase in [Idle, CheckingSameUrl, ExitGuards, Committing, Errored] {
            assert_eq!(phase.as_str().parse::<NavigationPhase>().unwrap(), phase);
        }
        assert!("nowhere".parse::<NavigationPhase>().is_err());
        assert!(!Cancelled.is_in_flight());
        assert!(Resolving.is_in_flight());
    }
}
