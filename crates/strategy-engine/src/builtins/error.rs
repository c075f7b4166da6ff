use thiserror::Error;

/// Argument and dispatch failures raised by builtins. Surfaced to the
/// script as an evaluation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuiltinError {
    #[error("{name}() takes {expected} arguments, got {got}")]
    Arity {
        name: &'static str,
        expected: String,
        got: usize,
    },

    #[error("{name}(): `{param}` must be {expected}, got {got}")]
    Type {
        name: &'static str,
        param: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("{name}(): invalid `{param}`: {message}")]
    Value {
        name: &'static str,
        param: &'static str,
        message: String,
    },

    #[error("unknown builtin `{0}`")]
    Unknown(String),
}
