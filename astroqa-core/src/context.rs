//! Context assembly for grounded generation.
//!
//! Merges retrieved passages into a single attributable text block. Every
//! passage gets a stable attribution label even when upstream metadata is
//! incomplete, and individual bodies are truncated so prompt size stays
//! bounded regardless of passage count.

use crate::types::RetrievedPassage;

/// Marker appended to truncated passage bodies.
const ELLIPSIS: &str = "...";

/// Assembles retrieved passages into a prompt-ready context block.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_passage_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_passage_chars: usize) -> Self {
        Self { max_passage_chars }
    }

    /// Format passages into an attributed context string, in relevance order.
    ///
    /// Each passage becomes a `[label]` header line (with title-cased mission
    /// and category descriptors when present) followed by its body; blocks
    /// are separated by blank lines. An empty input yields an empty string.
    pub fn format(&self, passages: &[RetrievedPassage]) -> String {
        let blocks: Vec<String> = passages
            .iter()
            .enumerate()
            .map(|(i, passage)| self.format_passage(passage, i + 1))
            .collect();
        blocks.join("\n\n")
    }

    fn format_passage(&self, passage: &RetrievedPassage, rank: usize) -> String {
        let label = attribution_label(passage, rank);

        let mut descriptors = Vec::new();
        if let Some(ref mission) = passage.mission {
            descriptors.push(format!("Mission: {}", title_case(mission)));
        }
        if let Some(ref category) = passage.category {
            descriptors.push(format!("Category: {}", title_case(category)));
        }

        let header = if descriptors.is_empty() {
            format!("[{}]", label)
        } else {
            format!("[{}] ({})", label, descriptors.join(", "))
        };

        format!("{}\n{}", header, self.truncate_body(&passage.text))
    }

    fn truncate_body(&self, text: &str) -> String {
        if text.chars().count() <= self.max_passage_chars {
            return text.to_string();
        }
        let truncated: String = text.chars().take(self.max_passage_chars).collect();
        format!("{}{}", truncated, ELLIPSIS)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(1200)
    }
}

/// Attribution label for a passage: its metadata-derived source id, or a
/// synthesized `DOC_{rank}` (1-based) when the metadata carried none.
pub fn attribution_label(passage: &RetrievedPassage, rank: usize) -> String {
    if passage.source_id.is_empty() {
        format!("DOC_{}", rank)
    } else {
        passage.source_id.clone()
    }
}

/// Normalize a raw metadata value to human-readable title case.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn passage(text: &str, source_id: &str) -> RetrievedPassage {
        RetrievedPassage {
            text: text.to_string(),
            source_id: source_id.to_string(),
            mission: None,
            category: None,
        }
    }

    #[test]
    fn test_format_empty_input_yields_empty_string() {
        let assembler = ContextAssembler::default();
        assert_eq!(assembler.format(&[]), "");
    }

    #[test]
    fn test_format_uses_source_id_label() {
        let assembler = ContextAssembler::default();
        let out = assembler.format(&[passage("The Hubble Space Telescope...", "hubble_fact_sheet")]);
        assert_eq!(out, "[hubble_fact_sheet]\nThe Hubble Space Telescope...");
    }

    #[test]
    fn test_format_synthesizes_doc_labels_by_rank() {
        let assembler = ContextAssembler::default();
        let out = assembler.format(&[passage("first", ""), passage("second", "")]);
        assert_eq!(out, "[DOC_1]\nfirst\n\n[DOC_2]\nsecond");
    }

    #[test]
    fn test_format_mixed_labels_keep_rank_positions() {
        let assembler = ContextAssembler::default();
        let out = assembler.format(&[
            passage("a", "named"),
            passage("b", ""),
            passage("c", ""),
        ]);
        // The synthesized rank reflects input position, not a separate counter
        assert!(out.contains("[named]\na"));
        assert!(out.contains("[DOC_2]\nb"));
        assert!(out.contains("[DOC_3]\nc"));
    }

    #[test]
    fn test_format_includes_title_cased_descriptors() {
        let assembler = ContextAssembler::default();
        let mut p = passage("Mars rover data", "curiosity_log");
        p.mission = Some("mars science laboratory".to_string());
        p.category = Some("ROVERS".to_string());
        let out = assembler.format(&[p]);
        assert_eq!(
            out,
            "[curiosity_log] (Mission: Mars Science Laboratory, Category: Rovers)\nMars rover data"
        );
    }

    #[test]
    fn test_truncation_bounds_body_length() {
        let assembler = ContextAssembler::new(1200);
        let long = "A".repeat(2000);
        let out = assembler.format(&[passage(&long, "big_doc")]);
        let body = out.strip_prefix("[big_doc]\n").unwrap();
        assert_eq!(body.chars().count(), 1200 + ELLIPSIS.len());
        assert!(body.ends_with("..."));
    }

    #[test]
    fn test_no_truncation_at_exact_limit() {
        let assembler = ContextAssembler::new(10);
        let out = assembler.format(&[passage("exactly10!", "d")]);
        assert_eq!(out, "[d]\nexactly10!");
    }

    #[test]
    fn test_format_is_idempotent() {
        let assembler = ContextAssembler::default();
        let passages = vec![passage(&"x".repeat(1500), ""), passage("short", "s1")];
        let first = assembler.format(&passages);
        let second = assembler.format(&passages);
        assert_eq!(first, second);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("apollo 11"), "Apollo 11");
        assert_eq!(title_case("SPACE STATIONS"), "Space Stations");
        assert_eq!(title_case("mars"), "Mars");
    }
}
