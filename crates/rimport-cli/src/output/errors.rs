//! Error report formatting with actionable suggestions.

use super::colors::ColorSupport;
use rimport_core::ImportError;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self::with_colors(ColorSupport::detect())
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format a top-level error: the message, the config file location and
    /// a hint when the chain carries an `ImportError`, then every cause.
    pub fn format_report(&self, error: &anyhow::Error) -> String {
        let mut output = self.format_simple(&error.to_string());
        output.push('\n');

        let import_error = error.chain().find_map(|cause| cause.downcast_ref::<ImportError>());

        if let Some(ImportError::ConfigParse { file, line, column, .. }) = import_error {
            output.push_str(&self.format_location(file, *line, *column));
            output.push('\n');
        }

        if let Some(suggestion) = import_error.and_then(ImportError::suggestion) {
            output.push('\n');
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
            output.push('\n');
        }

        for cause in error.chain().skip(1) {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&cause.to_string());
        }

        output
    }

    /// Format a simple error message
    pub fn format_simple(&self, message: &str) -> String {
        format!("{}: {}", self.colors.red("error"), message)
    }

    /// Format file location context
    pub fn format_location(&self, file: &str, line: usize, column: usize) -> String {
        format!("{} {}:{}:{}", self.colors.dim("-->"), file, line, column)
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn formatter() -> ErrorFormatter {
        ErrorFormatter::with_colors(ColorSupport::disabled())
    }

    #[test]
    fn test_report_includes_suggestion() {
        let error = anyhow::Error::new(ImportError::ModuleNotFound {
            module: "demo.missing".to_string(),
        });

        let report = formatter().format_report(&error);
        assert!(report.starts_with("error: "));
        assert!(report.contains("demo.missing"));
        assert!(report.contains("help: Check the module name spelling"));
        assert!(!report.contains("caused by"));
    }

    #[test]
    fn test_report_finds_import_error_under_context() {
        let result: Result<(), ImportError> = Err(ImportError::ConfigParse {
            file: "rimport.toml".to_string(),
            message: "expected `=`".to_string(),
            line: 3,
            column: 7,
        });
        let error = result.context("Failed to load configuration").unwrap_err();

        let report = formatter().format_report(&error);
        assert!(report.starts_with("error: Failed to load configuration"));
        assert!(report.contains("--> rimport.toml:3:7"));
        assert!(report.contains("caused by: "));
    }

    #[test]
    fn test_plain_errors_have_no_hint() {
        let report = formatter().format_report(&anyhow::anyhow!("2 of 3 namespaces unreachable"));
        assert_eq!(report, "error: 2 of 3 namespaces unreachable\n");
    }
}
