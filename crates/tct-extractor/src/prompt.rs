//! Prompt templates
//!
//! Templates live in `src/prompts/*.txt`. Placeholders are `{name}`;
//! substitution is a single pass, so values containing placeholder-like
//! text are inserted verbatim.

use tct_core::Operation;

const EXTRACTION_SYSTEM: &str = include_str!("prompts/extraction_system.txt");
const EXTRACTION_USER: &str = include_str!("prompts/extraction_user.txt");
const JSON_CONFIG_SYSTEM: &str = include_str!("prompts/json_config_system.txt");
const JSON_CONFIG_USER: &str = include_str!("prompts/json_config_user.txt");
const SQL_MIGRATION_SYSTEM: &str = include_str!("prompts/sql_migration_system.txt");
const SQL_MIGRATION_USER: &str = include_str!("prompts/sql_migration_user.txt");
const POLICY_SYSTEM: &str = include_str!("prompts/policy_system.txt");
const POLICY_USER: &str = include_str!("prompts/policy_user.txt");
const CODE_SYSTEM: &str = include_str!("prompts/code_system.txt");
const CODE_USER: &str = include_str!("prompts/code_user.txt");

/// Context text used when the caller supplies none
pub const NO_CONTEXT: &str = "No additional context provided";

/// An output rendered from an entity set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    JsonConfig,
    SqlMigration,
    PolicyDefinition,
    CodeGeneration,
}

impl RenderTarget {
    /// The model operation the rendering call is tagged with
    pub fn operation(self) -> Operation {
        match self {
            Self::JsonConfig => Operation::JsonConfig,
            Self::SqlMigration => Operation::SqlMigration,
            Self::PolicyDefinition => Operation::PolicyDefinition,
            Self::CodeGeneration => Operation::CodeGeneration,
        }
    }

    fn templates(self) -> (&'static str, &'static str) {
        match self {
            Self::JsonConfig => (JSON_CONFIG_SYSTEM, JSON_CONFIG_USER),
            Self::SqlMigration => (SQL_MIGRATION_SYSTEM, SQL_MIGRATION_USER),
            Self::PolicyDefinition => (POLICY_SYSTEM, POLICY_USER),
            Self::CodeGeneration => (CODE_SYSTEM, CODE_USER),
        }
    }
}

/// A system prompt and its matching user prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Replace `{key}` placeholders in one left-to-right pass
///
/// Unknown placeholders and stray braces are kept as is.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
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

/// Prompts for extracting entities from one document slice
pub fn extraction_prompt(
    document_text: &str,
    country: &str,
    country_name: &str,
    language: &str,
    context: Option<&str>,
) -> PromptPair {
    let context = context
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_CONTEXT);

    PromptPair {
        system: EXTRACTION_SYSTEM.trim_end().to_string(),
        user: render_template(
            EXTRACTION_USER.trim_end(),
            &[
                ("country", country),
                ("country_name", country_name),
                ("language", language),
                ("context", context),
                ("document_text", document_text),
            ],
        ),
    }
}

/// Prompts for rendering an entity set into one output format
pub fn render_prompt(
    target: RenderTarget,
    entities_json: &str,
    country: &str,
    country_name: &str,
) -> PromptPair {
    let (system, user) = target.templates();
    let country_lower = country.to_lowercase();

    PromptPair {
        system: system.trim_end().to_string(),
        user: render_template(
            user.trim_end(),
            &[
                ("country", country),
                ("country_name", country_name),
                ("country_lower", &country_lower),
                ("entities_json", entities_json),
            ],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_template_single_pass() {
        let out = render_template(
            "{a} + {b} = {c} {",
            &[("a", "{b}"), ("b", "2"), ("c", "x")],
        );
        assert_eq!(out, "{b} + 2 = x {");
    }

    #[test]
    fn test_render_template_keeps_json_braces() {
        let out = render_template("{\n  \"country\": \"{country}\"\n}", &[("country", "DE")]);
        assert_eq!(out, "{\n  \"country\": \"DE\"\n}");
    }

    #[test]
    fn test_extraction_prompt_fields() {
        let prompt = extraction_prompt("Der Steuersatz beträgt 19%", "DE", "Germany", "de", None);

        assert!(prompt.system.contains("tax law analyst"));
        assert!(prompt.user.contains("- Country: DE (Germany)"));
        assert!(prompt.user.contains("- Language: de"));
        assert!(prompt.user.contains(NO_CONTEXT));
        assert!(prompt.user.contains("Der Steuersatz beträgt 19%"));
        assert!(prompt.user.contains("\"tax_types\""));
        assert!(!prompt.user.contains("{document_text}"));
    }

    #[test]
    fn test_extraction_prompt_with_context() {
        let prompt = extraction_prompt("text", "BR", "Brazil", "pt", Some("ICMS [Chunk 1 of 2]"));
        assert!(prompt.user.contains("- Additional Context: ICMS [Chunk 1 of 2]"));
    }

    #[test]
    fn test_code_prompt_uses_lower_case_country() {
        let prompt = render_prompt(RenderTarget::CodeGeneration, "{}", "FR", "France");
        assert!(prompt.user.contains("tax_calculator_fr.py"));
        assert!(prompt.user.contains("Tax calculator for France"));
    }

    #[test]
    fn test_sql_prompt_embeds_entities() {
        let prompt = render_prompt(RenderTarget::SqlMigration, "{\"rates\": []}", "US", "United States");
        assert!(prompt.system.contains("PostgreSQL"));
        assert!(prompt.user.contains("{\"rates\": []}"));
    }

    #[test]
    fn test_render_prompts_fill_every_placeholder() {
        for target in [
            RenderTarget::JsonConfig,
            RenderTarget::SqlMigration,
            RenderTarget::PolicyDefinition,
            RenderTarget::CodeGeneration,
        ] {
            let prompt = render_prompt(target, "[]", "DE", "Germany");
            for placeholder in ["{country}", "{country_name}", "{country_lower}", "{entities_json}"] {
                assert!(!prompt.user.contains(placeholder), "{target:?} left {placeholder}");
            }
            assert_ne!(target.operation(), Operation::EntityExtraction);
        }
    }
}
