#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("{program} not found — install: https://cloud.google.com/sdk/docs/install")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("gcloud command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("gcloud output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}

impl GcloudError {
    /// Whether gcloud reported that the function `name` does not exist.
    ///
    /// A not-found marker alone is not enough: a mistyped region or project
    /// also yields `NOT_FOUND`, and must not read as an absent function.
    pub fn is_function_not_found(&self, name: &str) -> bool {
        let Self::CommandFailed { stderr, .. } = self else {
            return false;
        };
        let stderr = stderr.to_ascii_lowercase();
        let missing = stderr.contains("not_found")
            || stderr.contains("not found")
            || stderr.contains("does not exist");
        missing && mentions_function(&stderr, &name.to_ascii_lowercase())
    }

    /// Whether the CLI itself could not be run; retrying other calls is pointless.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// `name` appears as a whole function name, e.g. `functions/<name>'`
/// or `Function <name> in region`.
fn mentions_function(stderr: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    stderr.match_indices(name).any(|(at, _)| {
        let before = stderr[..at].chars().next_back();
        let after = stderr[at + name.len()..].chars().next();
        matches!(before, Some('/' | '\'' | '"' | ' ' | '['))
            && !after.is_some_and(is_name_char)
    })
}
