use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static NON_WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\W+").expect("non-word regex should compile"));

/// Lowercase slug: runs of non-word characters become a single `-`
///
/// Used for auction ids (from detail URLs) and synthesized lot ids.
///
/// ```
/// use leilao_crawler::url::slugify;
///
/// assert_eq!(
///     slugify("https://leilao.detran.mg.gov.br/leilao/123"),
///     "https-leilao-detran-mg-gov-br-leilao-123"
/// );
/// ```
pub fn slugify(text: &str) -> String {
    NON_WORD_PATTERN
        .replace_all(text, "-")
        .trim_matches('-')
        .to_lowercase()
}

/// Resolves `href` against `base`, returning `None` for unusable input
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .ok()
        .map(|u| u.to_string())
}
