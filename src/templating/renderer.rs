//! Tera rendering of a single job template.

use regex::Regex;
use tera::{Context as TeraContext, Tera};

use super::error::{ErrorLocation, TemplateError};

/// Identifies the template being rendered, for error reporting.
#[derive(Debug, Clone)]
pub struct RenderingMetadata {
    pub job_name: String,
    pub template: String,
}

/// Renders template sources against a prepared context.
#[derive(Debug, Default, Clone)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `template_content` once against `context`.
    ///
    /// A fresh Tera instance is used per render; autoescaping does not apply to
    /// one-off templates, so config files come out byte-for-byte as written.
    pub fn render_template(
        &self,
        template_content: &str,
        context: &TeraContext,
        metadata: &RenderingMetadata,
    ) -> Result<String, TemplateError> {
        tracing::trace!("Rendering {}/{}", metadata.job_name, metadata.template);

        let mut tera = Tera::default();
        tera.render_str(template_content, context)
            .map_err(|e| Self::parse_tera_error(&e, metadata))
    }

    fn parse_tera_error(error: &tera::Error, metadata: &RenderingMetadata) -> TemplateError {
        let location = Box::new(ErrorLocation {
            job_name: metadata.job_name.clone(),
            template: metadata.template.clone(),
            line_number: Self::extract_line_from_tera_error(error),
        });

        let message = Self::format_tera_error(error);
        if let Some(variable) = Self::extract_variable_name(&message) {
            return TemplateError::VariableNotFound { variable, location };
        }

        TemplateError::SyntaxError { message, location }
    }

    fn extract_variable_name(error_msg: &str) -> Option<String> {
        // "Variable `<name>` not found in context while rendering ..."
        let re = Regex::new(r"Variable `([^`]+)` not found").ok()?;
        re.captures(error_msg).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
    }

    fn extract_line_from_tera_error(error: &tera::Error) -> Option<usize> {
        let error_msg = format!("{:?}", error);

        // Parse errors carry "line:col" positions
        let re = Regex::new(r"(\d+):(\d+)").ok()?;
        re.captures(&error_msg)
            .and_then(|caps| caps.get(1))
            .and_then(|line| line.as_str().parse::<usize>().ok())
    }

    /// Flatten a Tera error chain into a readable message, hiding Tera's
    /// internal name for one-off templates.
    pub fn format_tera_error(error: &tera::Error) -> String {
        use std::error::Error;

        let mut all_messages = vec![error.to_string()];
        let mut current_error: Option<&dyn Error> = error.source();
        while let Some(err) = current_error {
            all_messages.push(err.to_string());
            current_error = err.source();
        }

        let messages: Vec<String> = all_messages
            .into_iter()
            .map(|msg| {
                msg.replace("while rendering '__tera_one_off'", "")
                    .replace("Failed to render '__tera_one_off'", "Template rendering failed")
                    .replace("Failed to parse '__tera_one_off'", "Template syntax error")
                    .replace("'__tera_one_off'", "template")
                    .trim()
                    .to_string()
            })
            .filter(|cleaned| {
                !cleaned.is_empty()
                    && cleaned != "Template rendering failed"
                    && cleaned != "Template syntax error"
            })
            .collect();

        if messages.is_empty() {
            "Template syntax error".to_string()
        } else {
            messages.join("\n  → ")
        }
    }
}
