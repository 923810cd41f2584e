use std::sync::LazyLock;

use regex::Regex;

static CONTROL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{Cc}\p{Cf}]").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").unwrap());
static NOT_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Display names keep their case and script, only stray control characters and repeated
/// whitespace go.
pub fn clean_name(input: &str) -> String {
    let s = CONTROL.replace_all(input, "");

    SPACES.replace_all(s.trim(), " ").trim().to_string()
}

/// Lowercased letters and digits of any script joined by `-`.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();

    NOT_SLUG.replace_all(&lowered, "-").trim_matches('-').to_string()
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}
