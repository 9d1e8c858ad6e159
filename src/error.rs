use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Normalization,
    ModelLoad,
    Recognition,
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Normalization => "normalization",
            Stage::ModelLoad => "model load",
            Stage::Recognition => "recognition",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// Which export file an output error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Subtitle,
    Metadata,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Subtitle => f.write_str("subtitle"),
            OutputKind::Metadata => f.write_str("metadata"),
        }
    }
}

/// The crate-wide error type.
///
/// Every fatal pipeline condition maps to exactly one variant so callers can tell which stage
/// failed without parsing messages. Collaborator failures are carried as `anyhow::Error` and
/// rendered with their full context chain.
///
/// This is decoupled from `anyhow` at the public boundary so downstream libraries aren't forced
/// to adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("invalid task '{0}': expected 'transcribe' or 'translate'")]
    InvalidTask(String),

    #[error("invalid quality '{0}': expected 'fast', 'balanced' or 'quality'")]
    InvalidQuality(String),

    #[error("failed to create working directory '{}'", path.display())]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audio normalization failed: {0:#}")]
    Normalize(anyhow::Error),

    #[error("model load failed: {primary:#}; cpu/int8 fallback also failed: {fallback:#}")]
    ModelLoad {
        primary: anyhow::Error,
        fallback: anyhow::Error,
    },

    #[error("recognition failed: {0:#}")]
    Recognition(anyhow::Error),

    #[error("failed to write {kind} output to '{}': {cause:#}", path.display())]
    Output {
        kind: OutputKind,
        path: PathBuf,
        cause: anyhow::Error,
    },
}

impl Error {
    /// The pipeline stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            Error::InputNotFound(_)
            | Error::InvalidTask(_)
            | Error::InvalidQuality(_)
            | Error::Workdir { .. } => Stage::Input,
            Error::Normalize(_) => Stage::Normalization,
            Error::ModelLoad { .. } => Stage::ModelLoad,
            Error::Recognition(_) => Stage::Recognition,
            Error::Output { .. } => Stage::Output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_load_error_names_the_stage() {
        let err = Error::ModelLoad {
            primary: anyhow::anyhow!("cuda unavailable"),
            fallback: anyhow::anyhow!("model file missing"),
        };
        assert_eq!(err.stage(), Stage::ModelLoad);
        let msg = err.to_string();
        assert!(msg.starts_with("model load failed"));
        assert!(msg.contains("cuda unavailable"));
        assert!(msg.contains("model file missing"));
    }

    #[test]
    fn output_error_mentions_kind_and_path() {
        let err = Error::Output {
            kind: OutputKind::Metadata,
            path: PathBuf::from("out/result.json"),
            cause: anyhow::anyhow!("permission denied"),
        };
        assert_eq!(err.stage(), Stage::Output);
        assert_eq!(
            err.to_string(),
            "failed to write metadata output to 'out/result.json': permission denied"
        );
    }

    #[test]
    fn every_error_names_its_stage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let cases = [
            (Error::InputNotFound(PathBuf::from("a.mp4")), Stage::Input),
            (Error::InvalidTask("dub".into()), Stage::Input),
            (Error::InvalidQuality("ultra".into()), Stage::Input),
            (
                Error::Workdir {
                    path: PathBuf::from("cache"),
                    source: io,
                },
                Stage::Input,
            ),
            (Error::Normalize(anyhow::anyhow!("bad codec")), Stage::Normalization),
            (Error::Recognition(anyhow::anyhow!("oom")), Stage::Recognition),
        ];

        for (err, stage) in cases {
            assert_eq!(err.stage(), stage, "{err}");
        }
    }
}
