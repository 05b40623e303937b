use std::collections::{BTreeSet, HashSet};

use storesight_core::config::PipelineConfig;
use storesight_core::{Category, Intent, Metric, TimePeriod, TimeUnit};

type WeightedKeywords = &'static [(&'static str, u32)];

/// Category vocabulary. Phrases match on word boundaries of the lowercased
/// question and each phrase counts once.
const CATEGORY_KEYWORDS: &[(Category, WeightedKeywords)] = &[
    (
        Category::Sales,
        &[
            ("sold", 2),
            ("sell", 2),
            ("selling", 2),
            ("sales", 2),
            ("revenue", 3),
            ("top selling", 3),
            ("best selling", 3),
            ("best seller", 3),
            ("best sellers", 3),
            ("bestseller", 3),
            ("income", 2),
            ("earned", 1),
            ("orders", 1),
        ],
    ),
    (
        Category::Inventory,
        &[
            ("stock", 3),
            ("inventory", 3),
            ("reorder", 3),
            ("restock", 3),
            ("out of stock", 3),
            ("stockout", 3),
            ("run out", 3),
            ("running low", 2),
            ("units left", 2),
            ("should i order", 2),
            ("warehouse", 1),
            ("supply", 1),
        ],
    ),
    (
        Category::Customers,
        &[
            ("customer", 3),
            ("customers", 3),
            ("repeat", 2),
            ("retention", 3),
            ("returning", 2),
            ("loyal", 2),
            ("clients", 2),
            ("shoppers", 2),
            ("buyers", 1),
        ],
    ),
];

const TOP_WORDS: &[&str] = &["top", "best", "most", "how many", "highest", "leading"];
const REORDER_WORDS: &[&str] =
    &["reorder", "restock", "should i order", "how much to order", "replenish"];
const STOCKOUT_WORDS: &[&str] =
    &["out of stock", "stockout", "run out", "running low", "go out", "sell out"];
const REPEAT_WORDS: &[&str] =
    &["repeat", "returning", "loyal", "retention", "again", "more than once"];

const STOP_WORDS: &[&str] = &[
    "a", "all", "am", "an", "and", "any", "are", "be", "been", "best", "by", "can",
    "can't", "compare", "could", "did", "do", "does", "find", "for", "from", "get", "give", "had",
    "has", "have", "how", "i", "in", "is", "it", "last", "let", "list", "many", "me", "most",
    "much", "my", "next", "of", "on", "or", "our", "past", "please", "should", "show", "tell",
    "that", "the", "there", "they", "this", "to", "top", "us", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "won't", "would", "you", "your",
];

/// Verbs that open imperative questions ("Rank my customers").
const IMPERATIVE_VERBS: &[&str] = &[
    "analyze", "break", "calculate", "check", "count", "display", "estimate", "forecast",
    "identify", "predict", "rank", "report", "summarize", "sum",
];

const CONTRACTION_SUFFIXES: &[&str] = &["'s", "'re", "'ll", "'ve", "'d", "'m", "n't"];

const TIME_WORDS: &[&str] = &[
    "day", "days", "week", "weeks", "month", "months", "quarter", "year", "years", "today",
    "yesterday",
];

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    default_window: TimePeriod,
    max_window_days: u32,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl IntentClassifier {
    pub fn new(pipeline: &PipelineConfig) -> Self {
        Self {
            default_window: TimePeriod::days(pipeline.default_window_days.max(1)),
            max_window_days: pipeline.max_window_days.max(1),
        }
    }

    /// Never fails; unrecognized questions fall back to `general`.
    pub fn classify(&self, question: &str) -> Intent {
        let tokens = tokenize(question);
        let haystack = phrase_haystack(&tokens);

        let category = score_category(&haystack);
        let entities = extract_entities(question);
        let metrics = select_metrics(category, &haystack, !entities.is_empty());
        let time_period = extract_time_period(&tokens)
            .unwrap_or(self.default_window)
            .capped(self.max_window_days);
        let result_limit = extract_result_limit(&tokens);

        Intent { category, time_period, entities, metrics, result_limit }
    }
}

/// Score per category, in `Category::PRIORITY` order.
pub fn category_scores(haystack: &str) -> Vec<(Category, u32)> {
    Category::PRIORITY
        .iter()
        .map(|category| {
            let score = CATEGORY_KEYWORDS
                .iter()
                .filter(|(candidate, _)| candidate == category)
                .flat_map(|(_, keywords)| keywords.iter())
                .filter(|(phrase, _)| contains_phrase(haystack, phrase))
                .map(|(_, weight)| weight)
                .sum::<u32>();
            (*category, score)
        })
        .collect()
}

fn score_category(haystack: &str) -> Category {
    let mut best = (Category::General, 0);
    for (category, score) in category_scores(haystack) {
        if score > best.1 {
            best = (category, score);
        }
    }
    best.0
}

fn select_metrics(category: Category, haystack: &str, has_entities: bool) -> BTreeSet<Metric> {
    let has_any = |phrases: &[&str]| phrases.iter().any(|phrase| contains_phrase(haystack, phrase));

    let metric = match category {
        Category::Sales if has_any(TOP_WORDS) || has_entities => Some(Metric::TopProducts),
        Category::Sales => Some(Metric::SalesSummary),
        Category::Inventory if has_any(REORDER_WORDS) => Some(Metric::ReorderQuantity),
        Category::Inventory if has_any(STOCKOUT_WORDS) => Some(Metric::StockoutPrediction),
        Category::Inventory => Some(Metric::InventoryLevels),
        Category::Customers if has_any(REPEAT_WORDS) => Some(Metric::RepeatCustomers),
        Category::Customers => Some(Metric::TopCustomers),
        Category::General => None,
    };

    metric.into_iter().collect()
}

fn extract_time_period(tokens: &[String]) -> Option<TimePeriod> {
    for window in tokens.windows(3) {
        let [lead, count, unit] = window else {
            continue;
        };
        let (Ok(value), Some((value_unit, scale))) = (count.parse::<u32>(), parse_unit(unit))
        else {
            continue;
        };
        if value == 0 {
            continue;
        }
        let value = value.saturating_mul(scale);
        match lead.as_str() {
            "last" | "past" | "previous" => return Some(TimePeriod::new(value, value_unit)),
            "in" | "next" | "within" | "coming" => {
                return Some(TimePeriod::upcoming(value, value_unit))
            }
            _ => {}
        }
    }

    let haystack = phrase_haystack(tokens);
    let named = [
        ("yesterday", TimePeriod::days(1)),
        ("today", TimePeriod::days(1)),
        ("last week", TimePeriod::days(7)),
        ("past week", TimePeriod::days(7)),
        ("this week", TimePeriod::days(7)),
        ("next week", TimePeriod::upcoming(7, TimeUnit::Days)),
        ("last month", TimePeriod::days(30)),
        ("past month", TimePeriod::days(30)),
        ("this month", TimePeriod::days(30)),
        ("next month", TimePeriod::upcoming(30, TimeUnit::Days)),
        ("last quarter", TimePeriod::days(90)),
        ("past quarter", TimePeriod::days(90)),
        ("last year", TimePeriod::new(12, TimeUnit::Months)),
        ("past year", TimePeriod::new(12, TimeUnit::Months)),
    ];

    named
        .iter()
        .find(|(phrase, _)| contains_phrase(&haystack, phrase))
        .map(|(_, period)| *period)
}

fn parse_unit(token: &str) -> Option<(TimeUnit, u32)> {
    match token {
        "day" | "days" => Some((TimeUnit::Days, 1)),
        "week" | "weeks" => Some((TimeUnit::Weeks, 1)),
        "month" | "months" => Some((TimeUnit::Months, 1)),
        "year" | "years" => Some((TimeUnit::Months, 12)),
        _ => None,
    }
}

fn extract_result_limit(tokens: &[String]) -> Option<u32> {
    for window in tokens.windows(2) {
        let [first, second] = window else {
            continue;
        };
        let explicit = match (first.as_str(), second.as_str()) {
            ("top" | "best", count) => count.parse::<u32>().ok(),
            (count, "best" | "most" | "top") => count.parse::<u32>().ok(),
            _ => None,
        };
        if let Some(limit) = explicit.filter(|limit| *limit > 0) {
            return Some(limit);
        }
    }
    None
}

/// Runs of capitalized words in source order, deduplicated case-insensitively.
fn extract_entities(question: &str) -> Vec<String> {
    let excluded = excluded_words();
    let mut entities = Vec::new();
    let mut seen = HashSet::new();
    let mut current: Vec<String> = Vec::new();
    let mut clause_start = true;

    let mut flush = |current: &mut Vec<String>, entities: &mut Vec<String>| {
        if current.is_empty() {
            return;
        }
        let entity = current.join(" ");
        current.clear();
        if seen.insert(entity.to_lowercase()) {
            entities.push(entity);
        }
    };

    for raw in question.split_whitespace() {
        let word = raw.trim_matches(|character: char| !is_entity_char(character));
        let ends_clause = raw.ends_with([',', '?', '!', '.', ';', ':', ')']);

        let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
        let continues_run = !current.is_empty() && word.chars().all(|c| c.is_ascii_digit());
        let clean = !word.is_empty() && word.chars().all(is_entity_char);
        let lowered = word.to_lowercase();
        let base = strip_contraction(&lowered);
        let vocabulary = excluded.contains(lowered.as_str()) || excluded.contains(base);
        let opener = clause_start && IMPERATIVE_VERBS.contains(&base);
        let accepted = clean && (starts_upper || continues_run) && !vocabulary && !opener;

        if accepted {
            current.push(word.to_string());
        } else {
            flush(&mut current, &mut entities);
        }
        if ends_clause {
            flush(&mut current, &mut entities);
        }
        clause_start = ends_clause || (clause_start && word.is_empty());
    }
    flush(&mut current, &mut entities);

    entities
}

fn excluded_words() -> HashSet<&'static str> {
    let keyword_words = CATEGORY_KEYWORDS
        .iter()
        .flat_map(|(_, keywords)| keywords.iter())
        .flat_map(|&(phrase, _)| phrase.split_whitespace());

    STOP_WORDS.iter().copied().chain(TIME_WORDS.iter().copied()).chain(keyword_words).collect()
}

/// `what's` -> `what`, `hasn't` -> `has`. Other words are returned as is.
fn strip_contraction(word: &str) -> &str {
    let word = word.trim_end_matches('\'');
    CONTRACTION_SUFFIXES
        .iter()
        .find_map(|suffix| word.strip_suffix(suffix))
        .filter(|base| !base.is_empty())
        .unwrap_or(word)
}

fn is_entity_char(character: char) -> bool {
    character.is_alphanumeric() || matches!(character, '-' | '\'' | '&')
}

fn tokenize(text: &str) -> Vec<String> {
    let mut sanitized = String::with_capacity(text.len());
    for character in text.chars() {
        if character.is_alphanumeric() || character == '\'' {
            sanitized.extend(character.to_lowercase());
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(str::to_string).collect()
}

fn phrase_haystack(tokens: &[String]) -> String {
    format!(" {} ", tokens.join(" "))
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.contains(&format!(" {phrase} "))
}

#[cfg(test)]
mod tests {
    use storesight_core::{Category, Metric, TimePeriod, TimeUnit};

    use super::{category_scores, phrase_haystack, tokenize, IntentClassifier};

    fn classify(question: &str) -> storesight_core::Intent {
        IntentClassifier::default().classify(question)
    }

    #[test]
    fn unrecognized_questions_fall_back_to_general() {
        for question in ["", "   ", "hello there", "What is the meaning of life?", "42"] {
            let intent = classify(question);
            assert_eq!(intent.category, Category::General, "question: {question:?}");
            assert_eq!(intent.time_period, TimePeriod::days(30));
            assert!(intent.metrics.is_empty());
        }
    }

    #[test]
    fn top_selling_last_week_is_ranked_sales() {
        let intent = classify("What were my top 5 selling products last week?");

        assert_eq!(intent.category, Category::Sales);
        assert_eq!(intent.time_period, TimePeriod::days(7));
        assert_eq!(intent.result_limit, Some(5));
        assert!(intent.has_metric(Metric::TopProducts));
        assert!(intent.entities.is_empty());
    }

    #[test]
    fn forward_window_marks_future_period() {
        let intent = classify("Which products are likely to go out of stock in 7 days?");

        assert_eq!(intent.category, Category::Inventory);
        assert!(intent.has_metric(Metric::StockoutPrediction));
        assert_eq!(intent.time_period, TimePeriod::upcoming(7, TimeUnit::Days));
    }

    #[test]
    fn reorder_question_extracts_product_entity() {
        let intent = classify("How many Yoga Mat Pro should I reorder based on the last 2 weeks?");

        assert_eq!(intent.category, Category::Inventory);
        assert!(intent.has_metric(Metric::ReorderQuantity));
        assert_eq!(intent.entities, vec!["Yoga Mat Pro".to_string()]);
        assert_eq!(intent.time_period, TimePeriod::new(2, TimeUnit::Weeks));
    }

    #[test]
    fn repeat_customer_question_maps_to_repeat_metric() {
        let intent = classify("Which customers placed repeat orders in the last 90 days?");

        assert_eq!(intent.category, Category::Customers);
        assert!(intent.has_metric(Metric::RepeatCustomers));
        assert_eq!(intent.time_period, TimePeriod::days(90));
    }

    #[test]
    fn named_periods_resolve_to_fixed_lengths() {
        assert_eq!(classify("revenue yesterday").time_period, TimePeriod::days(1));
        assert_eq!(classify("revenue last month").time_period, TimePeriod::days(30));
        assert_eq!(classify("revenue last quarter").time_period, TimePeriod::days(90));
        assert_eq!(classify("revenue last year").time_period.in_days(), 360);
    }

    #[test]
    fn ties_break_by_priority_order() {
        let haystack = phrase_haystack(&tokenize("sales stock"));
        let scores = category_scores(&haystack);
        assert_eq!(scores[0], (Category::Sales, 2));
        assert_eq!(scores[1], (Category::Inventory, 3));

        // sold (2) + orders (1) ties with stock (3); sales wins.
        let intent = classify("sold orders stock");
        assert_eq!(intent.category, Category::Sales);
    }

    #[test]
    fn entities_are_deduplicated_in_source_order() {
        let intent = classify(
            "Compare Smart Watch Series 5 sales with Bamboo Sunglasses and smart watch series 5",
        );

        assert_eq!(
            intent.entities,
            vec!["Smart Watch Series 5".to_string(), "Bamboo Sunglasses".to_string()]
        );
    }

    #[test]
    fn lowercase_product_names_are_not_detected() {
        let intent = classify("how much yoga mat pro did we sell last week");
        assert!(intent.entities.is_empty());
        assert!(intent.has_metric(Metric::SalesSummary));
    }

    #[test]
    fn destructive_text_still_classifies() {
        let intent = classify("DROP TABLE orders");
        assert_eq!(intent.category, Category::Sales);
        assert_eq!(intent.entities, vec!["DROP TABLE".to_string()]);
    }

    #[test]
    fn sentence_openers_are_not_entities() {
        for question in [
            "What's my revenue last month?",
            "Rank my top customers this month",
            "Predict which products will run out of stock next week",
            "Has revenue dropped this week?",
            "Have my customers come back?",
            "Estimate how much stock I need",
            "Forecast sales for next month",
            "How's revenue looking?",
            "Who's my best customer?",
        ] {
            assert!(classify(question).entities.is_empty(), "question: {question:?}");
        }
    }

    #[test]
    fn summary_questions_opened_by_contractions_stay_summaries() {
        let intent = classify("What's my revenue last month?");
        assert_eq!(intent.category, Category::Sales);
        assert!(intent.has_metric(Metric::SalesSummary));
    }

    #[test]
    fn products_after_an_imperative_opener_are_kept() {
        let intent = classify("Predict when Yoga Mat Pro will run out of stock");
        assert_eq!(intent.entities, vec!["Yoga Mat Pro".to_string()]);

        let intent = classify("Has Bamboo Sunglasses sold well this week?");
        assert_eq!(intent.entities, vec!["Bamboo Sunglasses".to_string()]);
    }

    #[test]
    fn huge_windows_are_capped_to_the_configured_maximum() {
        let intent = classify("top selling products in the last 4000000000 days");
        assert_eq!(intent.time_period, TimePeriod::days(3_650));

        let intent = classify("revenue over the last 300000 years");
        assert_eq!(intent.time_period, TimePeriod::new(121, TimeUnit::Months));
    }
}
