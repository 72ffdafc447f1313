//! Prompt templates for section generation and review.
//!
//! Templates are configuration data (`generation.sections`, `review.prompt`);
//! this module only knows how to fill them in.

use pleasance_core::config::{GenerationConfig, ReviewConfig, SectionTemplate};

/// Built-in review prompt. Placeholders: `{name}`, `{section_key}`, `{content}`.
pub const REVIEW_PROMPT: &str = r#"Review this content for an educational kink encyclopedia:

KINK: {name}
SECTION: {section_key}
CONTENT:
{content}

Check for:
1. Factual accuracy
2. Educational tone (non-judgmental)
3. Safety warnings where needed
4. Completeness

Respond in JSON:
{"approved": true/false, "issues": [], "severity": "none|low|medium|high"}
"#;

/// Section templates (in generation order) plus the review prompt.
#[derive(Clone, Debug)]
pub struct PromptSet {
    sections: Vec<SectionTemplate>,
    review: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default(), &ReviewConfig::default())
    }
}

impl PromptSet {
    pub fn from_config(generation: &GenerationConfig, review: &ReviewConfig) -> Self {
        Self {
            sections: generation.sections.clone(),
            review: review
                .prompt
                .clone()
                .unwrap_or_else(|| REVIEW_PROMPT.to_string()),
        }
    }

    /// Section keys in generation order.
    pub fn section_keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.key.as_str())
    }

    /// Prompt for `section_key`, or `None` if no template has that key.
    pub fn section_prompt(
        &self,
        section_key: &str,
        name: &str,
        category: Option<&str>,
    ) -> Option<String> {
        let template = self.sections.iter().find(|s| s.key == section_key)?;
        Some(render(
            &template.template,
            &[("name", name), ("category", category.unwrap_or_default())],
        ))
    }

    pub fn review_prompt(&self, name: &str, section_key: &str, content: &str) -> String {
        render(
            &self.review,
            &[
                ("name", name),
                ("section_key", section_key),
                ("content", content),
            ],
        )
    }
}

/// Fill `{placeholder}`s in one pass. Substituted values are never re-scanned,
/// and braces that don't form a known placeholder are kept verbatim.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_section_keys() {
        let prompts = PromptSet::default();
        assert_eq!(
            prompts.section_keys().collect::<Vec<_>>(),
            ["appeal", "howTo", "variations"]
        );
    }

    #[test]
    fn test_section_prompt() {
        let prompts = PromptSet::default();
        let prompt = prompts.section_prompt("appeal", "Rope", None).unwrap();
        assert!(prompt.contains("find 'Rope' appealing"));
        assert!(prompts.section_prompt("history", "Rope", None).is_none());
    }

    #[test]
    fn test_review_prompt_keeps_json_example() {
        let prompt = PromptSet::default().review_prompt("Wax", "howTo", "Some text");
        assert!(prompt.contains("KINK: Wax"));
        assert!(prompt.contains("SECTION: howTo"));
        assert!(prompt.contains(r#"{"approved": true/false, "issues": [], "severity""#));
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{name} / {category}", &[("name", "{category}"), ("category", "x")]);
        assert_eq!(out, "{category} / x");
    }

    #[test]
    fn test_render_unknown_and_unclosed() {
        assert_eq!(render("a {b} c {", &[("x", "y")]), "a {b} c {");
        assert_eq!(render("{x}{x}", &[("x", "1")]), "11");
    }

    #[test]
    fn test_custom_templates() {
        let generation = GenerationConfig {
            sections: vec![SectionTemplate::new("history", "History of {name} ({category})")],
            ..Default::default()
        };
        let review = ReviewConfig {
            prompt: Some("Check {content}".into()),
            ..Default::default()
        };
        let prompts = PromptSet::from_config(&generation, &review);
        assert_eq!(
            prompts.section_prompt("history", "Rope", Some("bondage")).unwrap(),
            "History of Rope (bondage)"
        );
        assert_eq!(prompts.review_prompt("n", "k", "this"), "Check this");
    }
}
