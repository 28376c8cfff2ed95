//! Content-quality heuristics. Deliberately simple pattern matching over
//! the title and body; this is not NLP and must not grow into it, since
//! the observable scoring behavior is part of the contract.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Fixed vocabulary for the trending-keyword density term.
static TRENDING_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "election",
        "vote",
        "poll",
        "scandal",
        "crisis",
        "government",
        "coalition",
        "budget",
        "protest",
        "reform",
        "resign",
        "debate",
        "investigation",
        "corruption",
        "parliament",
        "minister",
        "economy",
        "inflation",
    ]
    .into_iter()
    .collect()
});

/// Headline markers that get the breaking-news bonus.
const BREAKING_KEYWORDS: [&str; 6] = [
    "breaking",
    "exclusive",
    "urgent",
    "just in",
    "revealed",
    "live",
];

const TITLE_LEN_SWEET_SPOT: std::ops::RangeInclusive<usize> = 40..=70;

/// Blend of title quality, content structure, and trending-keyword
/// density, each term capped to [0, 1] before blending.
pub fn content_score(title: &str, content: &str) -> f64 {
    0.4 * title_quality(title) + 0.3 * structure_quality(content) + 0.3 * keyword_density(title, content)
}

fn title_quality(title: &str) -> f64 {
    let mut score: f64 = 0.0;
    let lowered = title.to_lowercase();

    if TITLE_LEN_SWEET_SPOT.contains(&title.chars().count()) {
        score += 0.4;
    }
    if title.chars().any(|c| c.is_ascii_digit()) {
        score += 0.2;
    }
    if title.contains('?') {
        score += 0.15;
    }
    if BREAKING_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        score += 0.25;
    }

    score.min(1.0)
}

fn structure_quality(content: &str) -> f64 {
    let words = content.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }

    let mut score = (words as f64 / 600.0).min(0.6);

    let paragraphs = content.split("\n\n").filter(|p| !p.trim().is_empty()).count();
    if paragraphs >= 3 {
        score += 0.2;
    }
    if content.contains('"') {
        score += 0.2; // quoted speech
    }

    score.min(1.0)
}

fn keyword_density(title: &str, content: &str) -> f64 {
    let text = format!("{} {}", title, content).to_lowercase();
    let words = text.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return 0.0;
    }

    let hits = words
        .iter()
        .filter(|word| {
            let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
            TRENDING_KEYWORDS.contains(trimmed)
        })
        .count();

    // Hits per hundred words, saturating at five.
    let per_hundred = hits as f64 * 100.0 / words.len() as f64;
    (per_hundred / 5.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_stay_in_unit_range() {
        let spam = "breaking election scandal crisis vote poll budget ".repeat(50);
        let score = content_score(&spam, &spam);
        assert!((0.0..=1.0).contains(&score));
        assert!(content_score("", "") == 0.0);
    }

    #[test]
    fn sweet_spot_titles_beat_terse_ones() {
        let good = "Coalition reaches late-night deal on contested budget"; // 53 chars
        let bad = "Deal";
        assert!(title_quality(good) > title_quality(bad));
    }

    #[test]
    fn numeric_question_and_breaking_bonuses_stack() {
        let loud = "Breaking: will the 2026 budget survive the vote?";
        assert!(title_quality(loud) >= 0.6);
    }

    #[test]
    fn keyword_density_rewards_vocabulary_hits() {
        let on_topic = "The election scandal deepens as parliament debates the budget.";
        let off_topic = "A quiet afternoon of gardening and tea on the porch today.";
        assert!(keyword_density(on_topic, "") > keyword_density(off_topic, ""));
    }

    #[test]
    fn structure_rewards_longer_multi_paragraph_bodies() {
        let long_body = format!(
            "{}\n\n{}\n\n{}",
            "word ".repeat(200),
            "word ".repeat(200),
            "word ".repeat(200)
        );
        assert!(structure_quality(&long_body) > structure_quality("short text"));
    }
}
