use rustyline::{Config, Editor, Result};

pub const IDLE_PLACEHOLDER: &str = "Type your question...";
pub const BUSY_PLACEHOLDER: &str = "Waiting for response...";

/// Prefix used for the second and later lines of a multi-line draft.
pub const CONTINUATION_PROMPT: &str = ". ";

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or("> ").to_string()
}

pub fn placeholder(busy: bool) -> &'static str {
    if busy {
        BUSY_PLACEHOLDER
    } else {
        IDLE_PLACEHOLDER
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(false)
        .build();
    Editor::with_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_reflects_busy_flag() {
        assert_eq!(placeholder(false), IDLE_PLACEHOLDER);
        assert_eq!(placeholder(true), BUSY_PLACEHOLDER);
    }

    #[test]
    fn default_prompt() {
        assert_eq!(generate_prompt(None), "> ");
        assert_eq!(generate_prompt(Some(CONTINUATION_PROMPT)), ". ");
    }
}
