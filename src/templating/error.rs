//! Template rendering errors with job/template location.

use std::fmt;

/// Where a rendering error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    /// Job the template belongs to
    pub job_name: String,
    /// Template source path inside the job
    pub template: String,
    /// Line number if Tera reported one
    pub line_number: Option<usize>,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job_name, self.template)?;
        if let Some(line) = self.line_number {
            write!(f, ":{line}")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum TemplateError {
    /// A property or spec value the template references is not in the context.
    VariableNotFound {
        variable: String,
        location: Box<ErrorLocation>,
    },

    /// Any other Tera parse or render failure.
    SyntaxError {
        message: String,
        location: Box<ErrorLocation>,
    },
}

impl TemplateError {
    pub fn location(&self) -> &ErrorLocation {
        match self {
            TemplateError::VariableNotFound {
                location,
                ..
            }
            | TemplateError::SyntaxError {
                location,
                ..
            } => location,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::VariableNotFound { variable, location } => {
                write!(f, "Template variable not found: '{}' in {}", variable, location)
            }
            TemplateError::SyntaxError { message, location } => {
                write!(f, "Template error in {}: {}", location, message)
            }
        }
    }
}

impl std::error::Error for TemplateError {}
