//! Fallback levels
//!
//! | Level | Stages | Timeouts (simple) | Timeouts (complex) |
//! |---|---|---|---|
//! | 1 Optimal | variables, components, code | 5s / 10s / 15s | 3s / 6s / 9s |
//! | 2 Balanced | variables, components | 3s / 5s | 1.8s / 3s |
//! | 3 Minimal | variables | 2s | 1.2s |
//! | 4 Emergency | none, URL parse only | - | - |
//!
//! A level succeeds when its variables stage succeeds; component and code
//! failures only add warnings.

use std::fmt;
use std::time::Duration;

use crate::model::ExtractionMethod;
use crate::progress::Stage;
use crate::protocol::RemoteTool;

/// Complex nodes get `COMPLEX_NUMERATOR / COMPLEX_DENOMINATOR` of each timeout
const COMPLEX_NUMERATOR: u64 = 3;
const COMPLEX_DENOMINATOR: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FallbackLevel {
    Optimal,
    Balanced,
    Minimal,
    Emergency,
}

impl FallbackLevel {
    /// Levels in the order they are attempted
    pub const LADDER: [FallbackLevel; 4] = [
        FallbackLevel::Optimal,
        FallbackLevel::Balanced,
        FallbackLevel::Minimal,
        FallbackLevel::Emergency,
    ];

    pub fn number(&self) -> u8 {
        match self {
            FallbackLevel::Optimal => 1,
            FallbackLevel::Balanced => 2,
            FallbackLevel::Minimal => 3,
            FallbackLevel::Emergency => 4,
        }
    }

    pub fn method(&self) -> ExtractionMethod {
        match self {
            FallbackLevel::Optimal => ExtractionMethod::Optimal,
            FallbackLevel::Balanced => ExtractionMethod::Balanced,
            FallbackLevel::Minimal => ExtractionMethod::Minimal,
            FallbackLevel::Emergency => ExtractionMethod::EmergencyFallback,
        }
    }

    pub fn next(&self) -> Option<FallbackLevel> {
        match self {
            FallbackLevel::Optimal => Some(FallbackLevel::Balanced),
            FallbackLevel::Balanced => Some(FallbackLevel::Minimal),
            FallbackLevel::Minimal => Some(FallbackLevel::Emergency),
            FallbackLevel::Emergency => None,
        }
    }

    /// Stages and timeouts for this level
    pub fn plan(&self, is_complex: bool, include_code: bool) -> Vec<StagePlan> {
        let stages: &[(Stage, u64)] = match self {
            FallbackLevel::Optimal => &[
                (Stage::Variables, 5_000),
                (Stage::Components, 10_000),
                (Stage::Code, 15_000),
            ],
            FallbackLevel::Balanced => &[(Stage::Variables, 3_000), (Stage::Components, 5_000)],
            FallbackLevel::Minimal => &[(Stage::Variables, 2_000)],
            FallbackLevel::Emergency => &[],
        };

        stages
            .iter()
            .filter(|(stage, _)| include_code || *stage != Stage::Code)
            .map(|&(stage, millis)| {
                let millis = if is_complex {
                    millis * COMPLEX_NUMERATOR / COMPLEX_DENOMINATOR
                } else {
                    millis
                };
                StagePlan {
                    stage,
                    tool: tool_for(stage),
                    timeout: Duration::from_millis(millis),
                }
            })
            .collect()
    }
}

impl fmt::Display for FallbackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackLevel::Optimal => write!(f, "optimal"),
            FallbackLevel::Balanced => write!(f, "balanced"),
            FallbackLevel::Minimal => write!(f, "minimal"),
            FallbackLevel::Emergency => write!(f, "emergency"),
        }
    }
}

fn tool_for(stage: Stage) -> RemoteTool {
    match stage {
        Stage::Variables => RemoteTool::Variables,
        Stage::Components => RemoteTool::Components,
        Stage::Code | Stage::Complete => RemoteTool::Code,
    }
}

/// One sub-operation of a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub stage: Stage,
    pub tool: RemoteTool,
    pub timeout: Duration,
}

impl StagePlan {
    /// Only the variables stage decides whether a level succeeded
    pub fn is_required(&self) -> bool {
        self.stage == Stage::Variables
    }

    /// Human label used in warnings
    pub fn label(&self) -> &'static str {
        match self.stage {
            Stage::Variables => "variable extraction",
            Stage::Components => "component mapping",
            Stage::Code => "code generation",
            Stage::Complete => "completion",
        }
    }
}
