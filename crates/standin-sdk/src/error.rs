//! Error types for the standin call boundary

/// Result type for calls crossing the interception boundary
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Faults raised while marshaling, dispatching, or evaluating a call
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokeError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Wrong number of arguments
    #[error("Arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Method name not present in the class or its schema
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Method exists but cannot be called on an instance (static entries)
    #[error("Method `{0}` cannot be called on an instance")]
    NotCallable(String),

    /// Invoke-original requested where no base implementation exists
    #[error("No original implementation for `{0}`")]
    NoOriginal(String),

    /// Dispatch reached an instance whose interceptor slot is unset
    #[error("No interceptor bound to the instance")]
    InterceptorUnbound,

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<String> for InvokeError {
    fn from(s: String) -> Self {
        InvokeError::Runtime(s)
    }
}

impl From<&str> for InvokeError {
    fn from(s: &str) -> Self {
        InvokeError::Runtime(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = InvokeError::TypeMismatch {
            expected: "i32".to_string(),
            got: "string".to_string(),
        };
        assert_eq!(err.to_string(), "Type mismatch: expected i32, got string");

        let err = InvokeError::ArityMismatch {
            expected: 2,
            got: 0,
        };
        assert_eq!(err.to_string(), "Arity mismatch: expected 2 arguments, got 0");

        let err = InvokeError::UnknownMethod("frob".to_string());
        assert_eq!(err.to_string(), "Unknown method: frob");
    }

    #[test]
    fn test_from_string() {
        let err: InvokeError = "boom".into();
        assert!(matches!(err, InvokeError::Runtime(_)));
        assert_eq!(err.to_string(), "Runtime error: boom");

        let err: InvokeError = String::from("bang").into();
        assert_eq!(err.to_string(), "Runtime error: bang");
    }
}
