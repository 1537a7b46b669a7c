/// Substituted when an article has no abstract, so the prompt shape never
/// changes between articles.
pub const MISSING_ABSTRACT_PLACEHOLDER: &str = "(no abstract available for this article)";

/// Build the user prompt for screening one article.
///
/// Fixed structure: criteria, title, abstract (or placeholder), then the
/// required response format. The system instructions come separately from
/// `AiSettings`.
pub fn build_screening_prompt(criteria: &str, title: &str, abstract_text: Option<&str>) -> String {
    let abstract_section = match abstract_text.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => MISSING_ABSTRACT_PLACEHOLDER,
    };

    format!(
        r#"Screen the following article against the inclusion criteria.

Inclusion criteria:
{criteria}

Title: {title}

Abstract:
{abstract_section}

Respond with exactly two labeled fields and nothing else:
Decision: Include, Exclude, or Unsure
Explanation: a short justification referencing the criteria"#
    )
}
