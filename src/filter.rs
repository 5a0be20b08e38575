use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration for deciding which discovered links may be followed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

/// Non-document resources plus admin and CDN locations
fn default_exclude_patterns() -> Vec<String> {
    vec![
        r"(?i)\.(jpe?g|png|gif|webp|bmp|ico|svg|tiff?|avif|heic)($|\?)".to_string(),
        r"(?i)\.(pdf|docx?|xlsx?|pptx?|odt|rtf|epub)($|\?)".to_string(),
        r"(?i)\.(zip|tar|gz|tgz|bz2|xz|rar|7z|dmg|iso|exe|msi|deb|rpm|apk|bin)($|\?)"
            .to_string(),
        r"(?i)\.(mp3|mp4|m4a|wav|ogg|webm|avi|mov|wmv|flv|mkv)($|\?)".to_string(),
        r"(?i)\.(css|js|mjs|map|json|xml|rss|atom|woff2?|ttf|otf|eot)($|\?)".to_string(),
        r"(?i)/(wp-admin|admin|administrator)(/|$)".to_string(),
        r"(?i)/wp-login\.php".to_string(),
        r"(?i)/cdn-cgi/".to_string(),
        r"(?i)^https?://cdn\.".to_string(),
    ]
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// URL filter that uses the scheme and regex patterns to determine which links to follow
#[derive(Debug)]
pub struct UrlFilter {
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(UrlFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include_regexes,
            exclude_regexes,
        })
    }

    /// Determine if a link should be kept based on all filtering rules
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        // Exclusions take precedence
        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|re| re.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty() || self.include_regexes.iter().any(|re| re.is_match(url_str))
    }
}

/// Strip the fragment so that in-page anchors share one identity
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_default_filter() {
        let filter = UrlFilter::default();

        assert!(filter.should_crawl(&parse("https://example.com/page.html")));
        assert!(filter.should_crawl(&parse("http://example.com/docs/intro")));

        // Non-document resources
        assert!(!filter.should_crawl(&parse("https://example.com/image.JPG")));
        assert!(!filter.should_crawl(&parse("https://example.com/paper.pdf?download=1")));
        assert!(!filter.should_crawl(&parse("https://example.com/release.tar.gz")));
        assert!(!filter.should_crawl(&parse("https://example.com/static/app.js")));

        // Admin and CDN locations
        assert!(!filter.should_crawl(&parse("https://example.com/wp-admin/edit.php")));
        assert!(!filter.should_crawl(&parse("https://example.com/admin/")));
        assert!(!filter.should_crawl(&parse("https://example.com/cdn-cgi/l/email")));
        assert!(!filter.should_crawl(&parse("https://cdn.example.com/page")));

        // Words that merely contain an excluded fragment are fine
        assert!(filter.should_crawl(&parse("https://example.com/administration-guide")));
        assert!(filter.should_crawl(&parse("https://example.com/jsonl-format")));
    }

    #[test]
    fn test_scheme_restriction() {
        let filter = UrlFilter::default();
        assert!(!filter.should_crawl(&parse("javascript:void(0)")));
        assert!(!filter.should_crawl(&parse("mailto:someone@example.com")));
        assert!(!filter.should_crawl(&parse("ftp://example.com/file")));
        assert!(!filter.should_crawl(&parse("data:text/html,hello")));
    }

    #[test]
    fn test_regex_patterns() {
        let config = UrlFilterConfig {
            include_patterns: vec![r"/docs/".to_string()],
            exclude_patterns: vec![r"/docs/draft/".to_string()],
        };
        let filter = UrlFilter::new(config).unwrap();

        assert!(filter.should_crawl(&parse("https://example.com/docs/page.html")));
        assert!(!filter.should_crawl(&parse("https://example.com/blog/post")));
        assert!(!filter.should_crawl(&parse("https://example.com/docs/draft/page.html")));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = UrlFilterConfig {
            include_patterns: vec!["(unclosed".to_string()],
            exclude_patterns: vec![],
        };
        assert!(UrlFilter::new(config).is_err());
    }

    #[test]
    fn test_normalize_url() {
        let url = parse("https://example.com/page?x=1#section");
        assert_eq!(normalize_url(&url).as_str(), "https://example.com/page?x=1");
    }
}
