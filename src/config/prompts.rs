//! Prompt templates for Blikk.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub analyze: AnalyzePrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for the analyze pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzePrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnalyzePrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a video analyst. You answer questions about a video using a set of frames captured from it.

The frames you receive are ordered chronologically by their timestamps. Treat them as a timeline, not as a relevance ranking.

Guidelines:
- Reason about the sequence of events: what happens first, what follows, and what one frame implies about the next
- When a question is about cause and effect, ground your reasoning in the order of the frames
- Cite 2-3 specific frames in your answer using their frame id and timestamp, e.g. [frame 12 @ 4.5s]
- Only use what is visible or described in the provided frames
- If the frames do not contain enough evidence to answer, say so explicitly instead of guessing"#
                .to_string(),

            user: r#"Question: {{question}}

Frames from the video, in chronological order:

{{frames}}

Answer the question from these frames. Cite the frames you relied on by id and timestamp, and decline if the evidence is insufficient."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            // Load analyze prompts if file exists
            let analyze_path = custom_path.join("analyze.toml");
            if analyze_path.exists() {
                let content = std::fs::read_to_string(&analyze_path)?;
                prompts.analyze = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.analyze.system.is_empty());
        assert!(prompts.analyze.user.contains("{{question}}"));
        assert!(prompts.analyze.user.contains("{{frames}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }
}
