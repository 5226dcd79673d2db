/// Errors raised inside the workflow engine.
///
/// The public entry points (`build_graph`, `infer_parameters`) never return
/// these: they log and degrade to an empty view instead. Callers that want
/// to distinguish "malformed" from "empty" use the fallible constructors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Layout failed: {0}")]
    Layout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
