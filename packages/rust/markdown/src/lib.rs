//! Section and source extraction from generated summary Markdown.
//!
//! Generated summaries are loosely structured: four `##` sections in a fixed
//! order, each paragraph ending in a cited URL. This crate turns that text into
//! structured sections and an ordered, de-duplicated URL list. Nothing here
//! fails: malformed input yields empty sections and no URLs.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The four narrative segments every summary must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Overview,
    Last24h,
    Last30d,
    Outlook,
}

impl SectionKind {
    /// All sections, in the order the model is asked to produce them.
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Overview,
        SectionKind::Last24h,
        SectionKind::Last30d,
        SectionKind::Outlook,
    ];

    /// Canonical English header text (without the `## ` prefix).
    pub fn header(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Last24h => "Last 24h",
            Self::Last30d => "Last 30d",
            Self::Outlook => "Outlook",
        }
    }
}

/// Extracted section bodies. A section that was not found is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummarySections {
    pub overview: String,
    pub last_24h: String,
    pub last_30d: String,
    pub outlook: String,
}

impl SummarySections {
    pub fn get(&self, kind: SectionKind) -> &str {
        match kind {
            SectionKind::Overview => &self.overview,
            SectionKind::Last24h => &self.last_24h,
            SectionKind::Last30d => &self.last_30d,
            SectionKind::Outlook => &self.outlook,
        }
    }

    fn set(&mut self, kind: SectionKind, body: String) {
        match kind {
            SectionKind::Overview => self.overview = body,
            SectionKind::Last24h => self.last_24h = body,
            SectionKind::Last30d => self.last_30d = body,
            SectionKind::Outlook => self.outlook = body,
        }
    }

    /// Replace every empty section with `placeholder`.
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        for kind in SectionKind::ALL {
            if self.get(kind).is_empty() {
                self.set(kind, placeholder.to_string());
            }
        }
        self
    }

    /// Number of sections with a non-empty body.
    pub fn found_count(&self) -> usize {
        SectionKind::ALL
            .iter()
            .filter(|k| !self.get(**k).is_empty())
            .count()
    }
}

// ---------------------------------------------------------------------------
// Keyword table
// ---------------------------------------------------------------------------

/// Maps each section to the header substrings that identify it.
///
/// Rows are checked in order and the first row with a matching substring wins,
/// so a header is assigned to at most one section. Keywords are lowercase and
/// matched against the lowercased header.
#[derive(Debug, Clone)]
pub struct SectionKeywords {
    rows: Vec<(SectionKind, Vec<String>)>,
}

impl Default for SectionKeywords {
    /// English keywords plus native equivalents for the translation targets.
    fn default() -> Self {
        Self::new()
            .with(
                SectionKind::Overview,
                &["overview", "概要", "개요", "概述", "resumen", "descripción general"],
            )
            .with(
                SectionKind::Last24h,
                &["last 24h", "24時間", "24시간", "24小时", "24 horas"],
            )
            .with(
                SectionKind::Last30d,
                &["last 30d", "30日", "30일", "30天", "30 días"],
            )
            .with(
                SectionKind::Outlook,
                &["outlook", "見通し", "전망", "展望", "perspectiva"],
            )
    }
}

impl SectionKeywords {
    /// An empty table that matches nothing.
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Add keywords for a section. Adding to an existing section extends its row.
    pub fn with(mut self, kind: SectionKind, keywords: &[&str]) -> Self {
        let lowered = keywords.iter().map(|k| k.to_lowercase());
        match self.rows.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => existing.extend(lowered),
            None => self.rows.push((kind, lowered.collect())),
        }
        self
    }

    /// Classify a header line.
    pub fn classify(&self, header: &str) -> Option<SectionKind> {
        let header = header.to_lowercase();
        self.rows
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| header.contains(k.as_str())))
            .map(|(kind, _)| *kind)
    }

    /// Split Markdown on level-2 headers and assign each segment to a section.
    ///
    /// Segments whose header matches no section are dropped. When several
    /// segments match the same section the last one wins.
    pub fn parse(&self, markdown: &str) -> SummarySections {
        static H2_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(?m)^##\s+").expect("valid regex"));

        let mut sections = SummarySections::default();

        for part in H2_RE.split(markdown) {
            let part = part.trim();
            let (header, body) = match part.split_once('\n') {
                Some((header, body)) => (header, body.trim()),
                None => (part, ""),
            };

            match self.classify(header) {
                Some(kind) => sections.set(kind, body.to_string()),
                None => debug!(header, "skipping unrecognized section"),
            }
        }

        sections
    }
}

/// Parse summary Markdown with the default keyword table.
pub fn parse_summary_sections(markdown: &str) -> SummarySections {
    SectionKeywords::default().parse(markdown)
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// Every `http(s)://` URL in the text, in first-seen order, without duplicates.
///
/// A URL ends at whitespace or a closing parenthesis, so Markdown links
/// `[text](https://...)` yield the bare target.
pub fn extract_source_urls(markdown: &str) -> Vec<String> {
    static URL_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("valid regex"));

    let mut seen = HashSet::new();
    URL_RE
        .find_iter(markdown)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(*url))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "## Overview\nWorldcoin is an identity protocol. https://worldcoin.org/about\n\n## Last 24h\nPrice rose 3%. https://www.coindesk.com/markets/wld?utm=x\n\n## Last 30d\nVolatile month.\n\nSecond paragraph. https://cointelegraph.com/news/wld\n\n## Outlook\nUnknown. (https://worldcoin.org/about)";

    fn reassemble(sections: &SummarySections) -> String {
        SectionKind::ALL
            .iter()
            .map(|k| format!("## {}\n{}", k.header(), sections.get(*k)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn parses_four_sections() {
        let s = parse_summary_sections(WELL_FORMED);
        assert_eq!(
            s.overview,
            "Worldcoin is an identity protocol. https://worldcoin.org/about"
        );
        assert_eq!(s.last_24h, "Price rose 3%. https://www.coindesk.com/markets/wld?utm=x");
        assert_eq!(
            s.last_30d,
            "Volatile month.\n\nSecond paragraph. https://cointelegraph.com/news/wld"
        );
        assert_eq!(s.outlook, "Unknown. (https://worldcoin.org/about)");
        assert_eq!(s.found_count(), 4);
    }

    #[test]
    fn reassembly_preserves_bodies() {
        let first = parse_summary_sections(WELL_FORMED);
        let second = parse_summary_sections(&reassemble(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn preamble_before_first_header_is_ignored() {
        let md = "Here is the report you asked for.\n\n## Overview\nBody";
        let s = parse_summary_sections(md);
        assert_eq!(s.overview, "Body");
        assert_eq!(s.found_count(), 1);
    }

    #[test]
    fn missing_sections_are_empty() {
        let s = parse_summary_sections("## Overview\nOnly this.");
        assert_eq!(s.overview, "Only this.");
        assert_eq!(s.last_24h, "");
        assert_eq!(s.last_30d, "");
        assert_eq!(s.outlook, "");
    }

    #[test]
    fn headerless_input_yields_nothing() {
        let s = parse_summary_sections("just some prose without headers");
        assert_eq!(s, SummarySections::default());
        assert_eq!(parse_summary_sections(""), SummarySections::default());
    }

    #[test]
    fn header_matching_is_case_insensitive() {
        let s = parse_summary_sections("## OUTLOOK for WLD\nBullish?\n## last 24H\nFlat");
        assert_eq!(s.outlook, "Bullish?");
        assert_eq!(s.last_24h, "Flat");
    }

    #[test]
    fn level_three_headers_stay_in_body() {
        let s = parse_summary_sections("## Overview\nIntro\n### Tokenomics\nSupply details");
        assert_eq!(s.overview, "Intro\n### Tokenomics\nSupply details");
    }

    #[test]
    fn last_matching_segment_wins() {
        let s = parse_summary_sections("## Overview\nfirst\n## Overview (cont.)\nsecond");
        assert_eq!(s.overview, "second");
    }

    #[test]
    fn native_headers_are_recognized() {
        let md = "## 概要\n日本語の概要\n## 過去24時間\n横ばい\n## 過去30日\n上昇\n## 見通し\n不明";
        let s = parse_summary_sections(md);
        assert_eq!(s.overview, "日本語の概要");
        assert_eq!(s.last_24h, "横ばい");
        assert_eq!(s.last_30d, "上昇");
        assert_eq!(s.outlook, "不明");
    }

    #[test]
    fn custom_keyword_table() {
        let table = SectionKeywords::new().with(SectionKind::Outlook, &["Forecast"]);
        let s = table.parse("## Overview\nignored\n## Forecast\nUp only");
        assert_eq!(s.overview, "");
        assert_eq!(s.outlook, "Up only");
        assert_eq!(table.classify("Weekly FORECAST"), Some(SectionKind::Outlook));
    }

    #[test]
    fn placeholder_fills_only_empty_sections() {
        let s = parse_summary_sections("## Overview\nBody").with_placeholder("N/A");
        assert_eq!(s.overview, "Body");
        assert_eq!(s.last_24h, "N/A");
        assert_eq!(s.last_30d, "N/A");
        assert_eq!(s.outlook, "N/A");
    }

    #[test]
    fn extracts_urls_in_order_without_duplicates() {
        let urls = extract_source_urls(WELL_FORMED);
        assert_eq!(
            urls,
            [
                "https://worldcoin.org/about",
                "https://www.coindesk.com/markets/wld?utm=x",
                "https://cointelegraph.com/news/wld",
            ]
        );
    }

    #[test]
    fn url_stops_at_closing_paren() {
        let urls = extract_source_urls("See [CoinDesk](https://coindesk.com/a) and http://x.io/b\tdone");
        assert_eq!(urls, ["https://coindesk.com/a", "http://x.io/b"]);
    }

    #[test]
    fn no_urls_in_plain_text() {
        assert!(extract_source_urls("no links here, ftp://nope").is_empty());
    }
}
