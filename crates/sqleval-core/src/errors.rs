use thiserror::Error;

/// Fatal conditions. Anything here aborts the run; per-example database
/// errors are never represented this way (see `ExecOutcome::Failure`).
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("length mismatch: {left_name}={left}, {right_name}={right}")]
    LengthMismatch {
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    },
    #[error("missing {what}: tried {}", .tried.join(", "))]
    MissingArtifact { what: String, tried: Vec<String> },
    #[error("config error: {0}")]
    Config(String),
    #[error("unsupported outcome cache schema version {found} in {path}")]
    CacheSchema { path: String, found: u32 },
}

impl EvalError {
    pub fn length_mismatch(
        left_name: &'static str,
        left: usize,
        right_name: &'static str,
        right: usize,
    ) -> Self {
        EvalError::LengthMismatch {
            left_name,
            left,
            right_name,
            right,
        }
    }

    pub fn missing<P: AsRef<std::path::Path>>(what: impl Into<String>, tried: &[P]) -> Self {
        EvalError::MissingArtifact {
            what: what.into(),
            tried: tried
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect(),
        }
    }
}

/// Checks that two aligned sequences have the same length.
pub fn ensure_aligned(
    left_name: &'static str,
    left: usize,
    right_name: &'static str,
    right: usize,
) -> Result<(), EvalError> {
    if left != right {
        return Err(EvalError::length_mismatch(left_name, left, right_name, right));
    }
    Ok(())
}

/// Finds an [`EvalError`] anywhere in an anyhow chain.
pub fn try_map_error(e: &anyhow::Error) -> Option<&EvalError> {
    e.chain().find_map(|c| c.downcast_ref::<EvalError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn mismatch_message_names_both_sides() {
        let err = ensure_aligned("gold", 3, "predicted", 2).unwrap_err();
        assert_eq!(err.to_string(), "length mismatch: gold=3, predicted=2");
        assert!(ensure_aligned("gold", 2, "predicted", 2).is_ok());
    }

    #[test]
    fn maps_through_context() {
        let res: anyhow::Result<()> = Err(EvalError::Config("bad".into())).context("loading");
        let err = res.unwrap_err();
        assert!(matches!(try_map_error(&err), Some(EvalError::Config(_))));
    }
}
