use thiserror::Error;

#[derive(Error, Debug)]
pub enum HydrogitError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{step} returned error code {code}")]
    ToolFailed { step: String, code: i32 },

    #[error("Failed to run {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build failed: {0}")]
    Build(String),

    #[error("No {language} sources found in {workspace}")]
    NoSources { workspace: String, language: String },

    #[error("Output bitcode not found in {0}")]
    NoArtifacts(String),

    #[error("No versions built")]
    NoVersionsBuilt,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, HydrogitError>;
