//! Prompt construction for summary generation and translation.

use marketbrief_shared::Language;

const ANALYST_ROLE: &str = "You are a cryptocurrency analyst who writes concise, well-sourced market summaries.";

const TRANSLATOR_ROLE: &str = "You are a professional financial translator.";

/// The four section headers, in the order the model must produce them.
pub const SECTION_HEADERS: [&str; 4] = ["Overview", "Last 24h", "Last 30d", "Outlook"];

const SECTION_GUIDANCE: [&str; 4] = [
    "Basic information about the asset, use cases, and key technical specifications",
    "Price movements, events, and significant news from the past 24 hours",
    "Trends, volatility, and major events from the past 30 days",
    "Fundamental analysis, technical factors, risks, and uncertainties",
];

/// A role-tagged message for the provider's `input` list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

impl PromptMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Messages asking for a four-section English summary of one asset.
pub fn summary_messages(
    symbol: &str,
    name: &str,
    allowed_domains: &[String],
    strict: bool,
) -> Vec<PromptMessage> {
    let mut prompt = format!(
        "Provide a summary of ${symbol} ({name}) in English, organized into the following four sections:\n\n"
    );

    for (header, guidance) in SECTION_HEADERS.iter().zip(SECTION_GUIDANCE) {
        prompt.push_str(&format!("## {header}\n{guidance}\n\n"));
    }

    prompt.push_str("Requirements:\n");
    prompt.push_str("- You MUST use web_search to gather the latest information\n");
    prompt.push_str("- Cite a source URL at the end of each paragraph (e.g. https://...)\n");
    prompt.push_str(
        "- Include specific numbers and dates for prices, volumes and market cap whenever possible\n",
    );
    prompt.push_str("- Avoid speculation; write \"unknown\" when information is unclear\n");
    prompt.push_str("- Use exactly the four ## headers above, in that order\n");

    if strict {
        prompt.push_str("- Do not give investment advice or price targets\n");
    }

    if !allowed_domains.is_empty() {
        prompt.push_str(&format!(
            "\nPrefer sources from: {}\n",
            allowed_domains.join(", ")
        ));
    }

    vec![PromptMessage::system(ANALYST_ROLE), PromptMessage::user(prompt)]
}

/// Messages asking for a structure-preserving translation of a summary.
pub fn translation_messages(content: &str, language: &Language) -> Vec<PromptMessage> {
    let headers = SECTION_HEADERS
        .iter()
        .map(|h| format!("## {h}"))
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        "Translate the following cryptocurrency market summary into {name} ({code}).\n\n\
         Rules:\n\
         - Do NOT translate the section headers {headers}; keep them verbatim in English\n\
         - Preserve the Markdown structure, paragraph breaks and section order\n\
         - Keep every URL, number and ticker symbol unchanged\n\
         - Output only the translated Markdown\n\n\
         ---\n\n{content}",
        name = language.name,
        code = language.code,
    );

    vec![
        PromptMessage::system(TRANSLATOR_ROLE),
        PromptMessage::user(prompt),
    ]
}

#[cfg(test)]
mod tests {
    use marketbrief_shared::SUPPORTED_LANGUAGES;

    use super::*;

    #[test]
    fn summary_prompt_lists_sections_in_order() {
        let messages = summary_messages("WLD", "Worldcoin", &[], false);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        let user = &messages[1].content;
        assert!(user.contains("$WLD (Worldcoin)"));
        assert!(user.contains("web_search"));

        let positions: Vec<usize> = SECTION_HEADERS
            .iter()
            .map(|h| user.find(&format!("## {h}\n")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn allowed_domains_and_strict_mode() {
        let domains = vec!["coindesk.com".to_string(), "worldcoin.org".to_string()];
        let user = &summary_messages("WLD", "Worldcoin", &domains, true)[1].content;
        assert!(user.contains("Prefer sources from: coindesk.com, worldcoin.org"));
        assert!(user.contains("investment advice"));

        let user = &summary_messages("WLD", "Worldcoin", &[], false)[1].content;
        assert!(!user.contains("Prefer sources from"));
        assert!(!user.contains("investment advice"));
    }

    #[test]
    fn translation_prompt_pins_headers() {
        let japanese = SUPPORTED_LANGUAGES[1];
        let messages = translation_messages("## Overview\nBody", &japanese);
        let user = &messages[1].content;
        assert!(user.contains("Japanese (ja)"));
        assert!(user.contains("Do NOT translate the section headers"));
        assert!(user.contains("## Last 24h"));
        assert!(user.ends_with("## Overview\nBody"));
    }
}
