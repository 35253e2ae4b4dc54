//! Query expansion for inconsistently named media.
//!
//! Older and foreign titles rarely match a source's canonical name on
//! the first try: release years get glued on, Han text appears in both
//! simplified and traditional forms, short titles need a disambiguating
//! suffix, and some indexes only know a latin transliteration. A raw
//! phrase therefore becomes an ordered list of [`QueryVariant`]s, most
//! specific first. Every variant is fetched; the variant order decides
//! which duplicate wins during aggregation.
//!
//! Expansion is pure and synchronous. Each strategy contributes at most
//! one variant and can be toggled off in [`ExpansionConfig`].

use std::collections::HashSet;

use character_converter::{simplified_to_traditional, traditional_to_simplified};
use pinyin::ToPinyin;

use crate::config::ExpansionConfig;
use crate::types::{Query, QueryVariant, VariantStrategy};

/// Expand a query into its variant list.
///
/// The raw phrase (trimmed) always comes first. Strategies then run in
/// fixed order: year stripping, media suffix, Han script conversion,
/// phonetic spelling. All derived strategies work from the year-stripped
/// base when one exists, so `"天气之子 2019"` still produces
/// `"天气之子剧场版"`. Variants are deduplicated case-insensitively and
/// capped at `max_variants`.
///
/// A blank phrase expands to nothing.
pub fn expand(query: &Query, config: &ExpansionConfig) -> Vec<QueryVariant> {
    let raw = query.raw_text.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut variants = Vec::new();
    let mut seen = HashSet::new();
    push_variant(&mut variants, &mut seen, raw, VariantStrategy::Raw);

    let stripped = if config.strip_year {
        strip_trailing_year(raw)
    } else {
        None
    };
    if let Some(text) = &stripped {
        push_variant(&mut variants, &mut seen, text, VariantStrategy::StripYear);
    }
    // Later strategies build on the phrase without its year token.
    let base = stripped.as_deref().unwrap_or(raw);

    if config.media_suffixes
        && contains_cjk(base)
        && base.chars().count() <= config.short_phrase_chars
    {
        if let Some(suffix) = query.type_hint.and_then(|hint| config.suffix_for(hint)) {
            push_variant(
                &mut variants,
                &mut seen,
                &format!("{base}{suffix}"),
                VariantStrategy::SuffixAdded,
            );
        }
    }

    if config.transliterate && contains_cjk(base) {
        let traditional = simplified_to_traditional(base).to_string();
        if traditional != base {
            push_variant(
                &mut variants,
                &mut seen,
                &traditional,
                VariantStrategy::TraditionalForm,
            );
        } else {
            let simplified = traditional_to_simplified(base).to_string();
            if simplified != base {
                push_variant(
                    &mut variants,
                    &mut seen,
                    &simplified,
                    VariantStrategy::SimplifiedForm,
                );
            }
        }
    }

    if config.phonetic && contains_cjk(base) {
        let spelled = phonetic_spelling(base);
        if spelled != base {
            push_variant(&mut variants, &mut seen, &spelled, VariantStrategy::Pinyin);
        }
    }

    variants.truncate(config.max_variants);
    variants
}

/// Push a variant unless its normalized text was already emitted.
fn push_variant(
    variants: &mut Vec<QueryVariant>,
    seen: &mut HashSet<String>,
    text: &str,
    strategy: VariantStrategy,
) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    if seen.insert(trimmed.to_lowercase()) {
        variants.push(QueryVariant::new(trimmed, strategy));
    }
}

/// Remove a trailing release-year token, bare (`"流浪地球 2023"`) or
/// parenthesised (`"Inception (2010)"`). Returns `None` when there is no
/// year token or when stripping would leave an empty phrase.
fn strip_trailing_year(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    let (head, token) = match trimmed.rsplit_once(char::is_whitespace) {
        Some((head, token)) => (head, token),
        None => ("", trimmed),
    };
    let digits = token
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(token);
    if !is_year_token(digits) {
        return None;
    }
    let head = head.trim_end();
    if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    }
}

fn is_year_token(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && matches!(token.parse::<u32>(), Ok(1900..=2099))
}

/// Space-separated lowercase pinyin syllables. Characters without a
/// reading (latin letters, digits, kana) are kept as their own tokens.
fn phonetic_spelling(text: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut passthrough = String::new();

    for (ch, syllable) in text.chars().zip(text.to_pinyin()) {
        match syllable {
            Some(p) => {
                flush_passthrough(&mut tokens, &mut passthrough);
                tokens.push(p.plain().to_string());
            }
            None => passthrough.push(ch),
        }
    }
    flush_passthrough(&mut tokens, &mut passthrough);
    tokens.join(" ")
}

fn flush_passthrough(tokens: &mut Vec<String>, passthrough: &mut String) {
    let token = passthrough.trim();
    if !token.is_empty() {
        tokens.push(token.to_lowercase());
    }
    passthrough.clear();
}

/// Whether the text contains CJK characters (Han ideographs, kana,
/// hangul, or CJK punctuation).
fn contains_cjk(input: &str) -> bool {
    input.chars().any(|c| {
        let code = c as u32;
        matches!(
            code,
            0x3000..=0x303F
                | 0x3040..=0x309F
                | 0x30A0..=0x30FF
                | 0x4E00..=0x9FFF
                | 0xAC00..=0xD7AF
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaType;

    fn texts(variants: &[QueryVariant]) -> Vec<&str> {
        variants.iter().map(|v| v.text.as_str()).collect()
    }

    fn find<'a>(variants: &'a [QueryVariant], strategy: VariantStrategy) -> Option<&'a str> {
        variants
            .iter()
            .find(|v| v.strategy == strategy)
            .map(|v| v.text.as_str())
    }

    #[test]
    fn raw_phrase_is_always_first() {
        let variants = expand(&Query::new("流浪地球 2023"), &ExpansionConfig::default());
        assert_eq!(variants[0].text, "流浪地球 2023");
        assert_eq!(variants[0].strategy, VariantStrategy::Raw);
    }

    #[test]
    fn blank_phrase_expands_to_nothing() {
        assert!(expand(&Query::new(""), &ExpansionConfig::default()).is_empty());
        assert!(expand(&Query::new("   "), &ExpansionConfig::default()).is_empty());
    }

    #[test]
    fn trailing_year_is_stripped() {
        let variants = expand(&Query::new("流浪地球 2023"), &ExpansionConfig::default());
        assert_eq!(find(&variants, VariantStrategy::StripYear), Some("流浪地球"));
    }

    #[test]
    fn parenthesised_year_is_stripped() {
        let variants = expand(&Query::new("Inception (2010)"), &ExpansionConfig::default());
        assert_eq!(find(&variants, VariantStrategy::StripYear), Some("Inception"));
    }

    #[test]
    fn year_only_phrase_keeps_raw_variant() {
        let variants = expand(&Query::new("2046"), &ExpansionConfig::default());
        assert_eq!(texts(&variants), vec!["2046"]);
    }

    #[test]
    fn four_digit_numbers_outside_year_range_stay() {
        let variants = expand(&Query::new("The 4400"), &ExpansionConfig::default());
        assert!(find(&variants, VariantStrategy::StripYear).is_none());
    }

    #[test]
    fn short_han_phrase_with_movie_hint_gets_suffix() {
        let query = Query::new("柯南").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::SuffixAdded),
            Some("柯南剧场版")
        );
    }

    #[test]
    fn tv_hint_uses_tv_suffix() {
        let query = Query::new("柯南").with_type_hint(MediaType::Tv);
        let variants = expand(&query, &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::SuffixAdded),
            Some("柯南动画版")
        );
    }

    #[test]
    fn suffix_requires_type_hint() {
        let variants = expand(&Query::new("柯南"), &ExpansionConfig::default());
        assert!(find(&variants, VariantStrategy::SuffixAdded).is_none());
    }

    #[test]
    fn suffix_skips_long_phrases() {
        let query = Query::new("新世纪福音战士剧场版").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &ExpansionConfig::default());
        assert!(find(&variants, VariantStrategy::SuffixAdded).is_none());
    }

    #[test]
    fn suffix_skips_latin_phrases() {
        let query = Query::new("dune").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &ExpansionConfig::default());
        assert!(find(&variants, VariantStrategy::SuffixAdded).is_none());
    }

    #[test]
    fn suffix_builds_on_year_stripped_base() {
        let query = Query::new("天气之子 2019").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::SuffixAdded),
            Some("天气之子剧场版")
        );
    }

    #[test]
    fn simplified_input_gains_traditional_form() {
        let variants = expand(&Query::new("门"), &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::TraditionalForm),
            Some("門")
        );
    }

    #[test]
    fn traditional_input_gains_simplified_form() {
        let variants = expand(&Query::new("門"), &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::SimplifiedForm),
            Some("门")
        );
    }

    #[test]
    fn transliteration_drops_the_year_token() {
        let variants = expand(&Query::new("龙门客栈 1992"), &ExpansionConfig::default());
        let form = find(&variants, VariantStrategy::TraditionalForm).expect("variant");
        assert!(!form.contains("1992"));
    }

    #[test]
    fn phonetic_variant_spells_han_text() {
        let variants = expand(&Query::new("流浪地球"), &ExpansionConfig::default());
        assert_eq!(
            find(&variants, VariantStrategy::Pinyin),
            Some("liu lang di qiu")
        );
    }

    #[test]
    fn latin_phrases_get_no_phonetic_variant() {
        let variants = expand(&Query::new("blade runner"), &ExpansionConfig::default());
        assert!(find(&variants, VariantStrategy::Pinyin).is_none());
    }

    #[test]
    fn variants_are_deduplicated() {
        // An empty suffix would reproduce the base phrase; the duplicate
        // must be swallowed.
        let mut config = ExpansionConfig::default();
        config.suffixes.insert("movie".into(), String::new());
        let query = Query::new("柯南").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &config);
        assert!(find(&variants, VariantStrategy::SuffixAdded).is_none());
    }

    #[test]
    fn variant_count_is_capped() {
        let config = ExpansionConfig {
            max_variants: 2,
            ..Default::default()
        };
        let query = Query::new("流浪地球 2023").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &config);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].strategy, VariantStrategy::Raw);
        assert_eq!(variants[1].strategy, VariantStrategy::StripYear);
    }

    #[test]
    fn disabled_strategies_stay_silent() {
        let config = ExpansionConfig {
            strip_year: false,
            media_suffixes: false,
            transliterate: false,
            phonetic: false,
            ..Default::default()
        };
        let query = Query::new("流浪地球 2023").with_type_hint(MediaType::Movie);
        let variants = expand(&query, &config);
        assert_eq!(texts(&variants), vec!["流浪地球 2023"]);
    }

    #[test]
    fn year_detection_handles_whitespace() {
        assert_eq!(strip_trailing_year("dune 2021  "), Some("dune".to_string()));
        assert_eq!(strip_trailing_year("dune"), None);
        assert_eq!(strip_trailing_year("2021"), None);
        assert_eq!(strip_trailing_year("dune 1899"), None);
    }
}
