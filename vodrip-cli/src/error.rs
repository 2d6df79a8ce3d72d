use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use vodrip_engine::{Phase, PhaseError, VodError};

/// Scratch directory of a run and whether it could be cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scratch {
    pub path: PathBuf,
    pub removed: bool,
}

impl fmt::Display for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.removed {
            write!(f, "temporary directory {} was removed", self.path.display())
        } else {
            write!(
                f,
                "temporary directory {} could not be removed, please delete it by hand",
                self.path.display()
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Engine(#[from] VodError),

    #[error("{phase} failed: {source}{}", scratch_hint(.scratch))]
    Download {
        phase: Phase,
        source: VodError,
        /// Scratch directory in use when the run aborted, if one had been created
        scratch: Option<Scratch>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn scratch_hint(scratch: &Option<Scratch>) -> String {
    match scratch {
        Some(scratch) => format!("\n{scratch}"),
        None => String::new(),
    }
}

impl AppError {
    pub fn download(error: PhaseError, scratch: Option<Scratch>) -> Self {
        Self::Download {
            phase: error.phase,
            source: error.source,
            scratch,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Engine(VodError::Cancelled)
                | Self::Download {
                    source: VodError::Cancelled,
                    ..
                }
        )
    }
}

impl From<PhaseError> for AppError {
    fn from(error: PhaseError) -> Self {
        Self::download(error, None)
    }
}
