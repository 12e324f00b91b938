//! Registration-time errors
//!
//! These indicate a bug in an effect's declaration and are never recovered
//! at runtime.

/// Errors raised while declaring controls for an effect class
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// A control definition is malformed (bad bounds, default outside options, ...)
    InvalidControlDefinition {
        /// Control id as declared
        id: String,
        /// Human-readable reason
        reason: String,
    },
    /// The same property was registered twice for one class
    DuplicateControl {
        /// Declaring class identifier
        class: String,
        /// Control id registered twice
        id: String,
    },
    /// A legacy template declaration could not be read
    InvalidTemplate {
        /// Declaring class identifier
        class: String,
        /// Parser or attribute failure
        reason: String,
    },
}

impl RegistryError {
    pub(crate) fn invalid(id: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::InvalidControlDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidControlDefinition { id, reason } => {
                write!(f, "invalid control definition '{}': {}", id, reason)
            }
            RegistryError::DuplicateControl { class, id } => {
                write!(f, "control '{}' registered twice on {}", id, class)
            }
            RegistryError::InvalidTemplate { class, reason } => {
                write!(f, "invalid template for {}: {}", class, reason)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
