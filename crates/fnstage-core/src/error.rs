use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Naming ──
    #[error("invalid prefix {prefix:?}: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("invalid function name {name:?}: {reason}")]
    InvalidFunctionName { name: String, reason: &'static str },

    #[error("invalid resource id {id:?}: {reason}")]
    InvalidResourceId { id: String, reason: &'static str },

    #[error("resource id '{id}' is {len} characters; Cloud Functions allows at most {max}")]
    ResourceIdTooLong { id: String, len: usize, max: usize },

    // ── Function declarations ──
    #[error("no functions declared — add a [[functions]] entry to fnstage.toml")]
    NoFunctions,

    #[error("function '{0}' is declared more than once")]
    DuplicateFunction(String),

    #[error("function '{0}' has no runtime — set `runtime` on it or in [defaults]")]
    MissingRuntime(String),

    #[error("invalid source path {path} for function '{function}': {reason}")]
    InvalidSourcePath {
        function: String,
        path: PathBuf,
        reason: &'static str,
    },

    #[error("invalid substitution key {key:?}: user substitutions must start with '_'")]
    InvalidSubstitutionKey { key: String },

    // ── Manifests ──
    #[error("failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}")]
    ManifestParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write manifest {path}")]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize manifest for prefix '{prefix}'")]
    ManifestSerialize {
        prefix: String,
        source: serde_json::Error,
    },
}
