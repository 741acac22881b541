use crate::daemon::{CommandOptions, CommandTemplate, DaemonLogger};

/// Builder for test command templates
pub struct TemplateBuilder {
    template: CommandTemplate,
}

impl TemplateBuilder {
    pub fn new(program: &str) -> Self {
        Self {
            template: CommandTemplate::new(CommandOptions::new([program])),
        }
    }

    /// Append to the `args` option.
    pub fn with_option_args(mut self, args: &[&str]) -> Self {
        self.template
            .options
            .args
            .extend(args.iter().map(|a| a.to_string()));
        self
    }

    /// Append positional tokens.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.template = self.template.with_args(args.iter().copied());
        self
    }

    pub fn with_logger(mut self, name: &str) -> Self {
        self.template.options.logger = Some(DaemonLogger::new(name));
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.template
            .options
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> CommandTemplate {
        self.template
    }
}
