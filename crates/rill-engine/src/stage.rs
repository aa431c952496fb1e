//! Pipeline stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How far the engine is run.
///
/// Stages are ordered: running a later stage implies the earlier ones ran.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Lexical and syntax check.
    Syntax,
    /// Name resolution and validation.
    Validated,
    /// Lowered intermediate representation.
    Bir,
    /// Full execution.
    #[default]
    Execute,
}

impl PipelineStage {
    /// All stages in pipeline order.
    pub const ALL: [PipelineStage; 4] = [
        PipelineStage::Syntax,
        PipelineStage::Validated,
        PipelineStage::Bir,
        PipelineStage::Execute,
    ];

    /// Lower-case name, as used on the command line and in the protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Validated => "validated",
            Self::Bir => "bir",
            Self::Execute => "execute",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "syntax" => Ok(Self::Syntax),
            "validated" | "validate" => Ok(Self::Validated),
            "bir" => Ok(Self::Bir),
            "execute" | "exec" | "run" => Ok(Self::Execute),
            other => Err(format!(
                "unknown pipeline stage '{}' (expected syntax, validated, bir or execute)",
                other
            )),
        }
    }
}
