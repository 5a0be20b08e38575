//! Plain-text report of a traversal

use crate::results::PageData;
use crate::utils::truncate_chars;
use std::fmt::Write;

/// Appended to content cut at the character budget
pub const TRUNCATION_MARKER: &str = "\n[... content truncated ...]";

const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Default per-page content budget, in characters
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 2000;

/// Renders visited pages as a single text document
#[derive(Debug, Clone, Copy)]
pub struct ReportFormatter {
    max_content_chars: usize,
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTENT_CHARS)
    }
}

impl ReportFormatter {
    pub fn new(max_content_chars: usize) -> Self {
        Self { max_content_chars }
    }

    /// Header with counts, then one section per page in visit order
    pub fn format(&self, query: &str, pages: &[PageData]) -> String {
        let failed = pages.iter().filter(|page| page.is_error()).count();

        let mut out = String::new();
        let _ = writeln!(out, "Deep search results for \"{}\"", query);
        let _ = write!(out, "Pages visited: {} ({} failed)", pages.len(), failed);

        if pages.is_empty() {
            out.push_str("\n\nNo pages could be retrieved.");
            return out;
        }

        out.push_str("\n\n");
        let sections: Vec<String> = pages
            .iter()
            .enumerate()
            .map(|(index, page)| self.format_page(index + 1, page))
            .collect();
        out.push_str(&sections.join(PAGE_SEPARATOR));
        out
    }

    fn format_page(&self, number: usize, page: &PageData) -> String {
        let title = if page.title.trim().is_empty() {
            "(untitled)"
        } else {
            page.title.as_str()
        };

        let mut section = String::new();
        let _ = write!(section, "[{}] {}\nURL: {}", number, title, page.url);
        if !page.description.is_empty() {
            let _ = write!(section, "\nDescription: {}", page.description);
        }
        if let Some(error) = &page.error {
            let _ = write!(section, "\nError: {}", error);
        }

        if !page.content.is_empty() {
            let (content, truncated) = truncate_chars(&page.content, self.max_content_chars);
            section.push_str("\n\n");
            section.push_str(content);
            if truncated {
                section.push_str(TRUNCATION_MARKER);
            }
        }

        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: &str, content: &str) -> PageData {
        PageData::new(
            url.to_string(),
            title.to_string(),
            String::new(),
            content.to_string(),
            Vec::new(),
        )
    }

    #[test]
    fn test_report_layout() {
        let mut first = page("https://a.example/", "Alpha", "Alpha body.");
        first.description = "About alpha".to_string();
        let second = PageData::failed("https://b.example/", "navigation timed out after 30s");

        let report = ReportFormatter::default().format("rust", &[first, second]);

        let expected = "Deep search results for \"rust\"\n\
                        Pages visited: 2 (1 failed)\n\
                        \n\
                        [1] Alpha\n\
                        URL: https://a.example/\n\
                        Description: About alpha\n\
                        \n\
                        Alpha body.\n\
                        \n\
                        ---\n\
                        \n\
                        [2] Error loading page\n\
                        URL: https://b.example/\n\
                        Error: navigation timed out after 30s";
        assert_eq!(report, expected);
    }

    #[test]
    fn test_untitled_page() {
        let report = ReportFormatter::default().format("q", &[page("https://a.example/", " ", "x")]);
        assert!(report.contains("[1] (untitled)\nURL: https://a.example/"));
    }

    #[test]
    fn test_content_is_truncated_on_char_boundary() {
        let content = "é".repeat(30);
        let report = ReportFormatter::new(10).format("q", &[page("https://a.example/", "T", &content)]);

        let expected_tail = format!("{}{}", "é".repeat(10), TRUNCATION_MARKER);
        assert!(report.ends_with(&expected_tail));
    }

    #[test]
    fn test_content_within_budget_is_untouched() {
        let report = ReportFormatter::new(11).format("q", &[page("https://a.example/", "T", "hello world")]);
        assert!(report.ends_with("\n\nhello world"));
        assert!(!report.contains("truncated"));
    }

    #[test]
    fn test_empty_report() {
        let report = ReportFormatter::default().format("nothing here", &[]);
        assert_eq!(
            report,
            "Deep search results for \"nothing here\"\nPages visited: 0 (0 failed)\n\nNo pages could be retrieved."
        );
    }
}
