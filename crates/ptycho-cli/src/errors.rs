use console::style;
use ptycho_core::PtychoError;
use std::fmt;

/// Enhanced error type with suggestions
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn patterns_not_loaded() -> CliError {
    CliError::new("No diffraction patterns loaded")
        .with_suggestion("Pass the assembled dataset: --patterns scan.patterns.json")
        .with_help("Run: ptycho reconstruct --help")
}

fn bad_pixels_missing() -> CliError {
    CliError::new("Diffraction dataset has no bad pixel mask")
        .with_context("Reconstruction needs to know which detector pixels to ignore.")
        .with_suggestion("Add a `bad_pixels` array to the patterns file")
        .with_suggestion("Use an all-false mask if every pixel is good")
}

fn plugin_not_found(message: &str) -> CliError {
    CliError::new(message.to_string())
        .with_suggestion("Names match either the display or the simple name, ignoring case")
        .with_help("Run: ptycho plugins")
}

fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Configuration value is invalid.\n\nReason: {}", reason))
        .with_suggestion("Check ptycho.toml and PTYCHO_* environment variables")
        .with_help("Run: ptycho config")
}

fn watcher_failed(message: &str) -> CliError {
    CliError::new("Cannot watch data directory")
        .with_context(message.to_string())
        .with_suggestion("Create the directory or pass --directory")
        .with_suggestion("On network filesystems, try --polling")
        .with_help("Run: ptycho watch --help")
}

/// Convert anyhow::Error to CliError with context
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    let message = format!("{:#}", error);

    match error.downcast_ref::<PtychoError>() {
        Some(PtychoError::PatternsNotLoaded) => patterns_not_loaded(),
        Some(PtychoError::BadPixelsMissing) => bad_pixels_missing(),
        Some(PtychoError::PluginNotFound { .. }) => plugin_not_found(&message),
        Some(PtychoError::ConfigInvalid { key, reason }) => invalid_config(key, reason),
        Some(PtychoError::Watcher(_)) => watcher_failed(&message),
        Some(PtychoError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            CliError::new("File not found")
                .with_context(format!("Error: {}", message))
                .with_suggestion("Check the file path and try again")
        }
        _ => CliError::new(message),
    }
}
