//! Gift-finder conversation.
//!
//! The client carries the conversation: each request sends the current state
//! and the answers so far, and each reply returns the next state. Nothing is
//! stored server-side.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::PgPool;
use thiserror::Error;

use best_wishes_core::ProductId;

use crate::db::RepositoryError;
use crate::db::categories::CategoryRepository;
use crate::db::products::ProductRepository;
use crate::models::product::Product;

pub const NO_PREFERENCE: &str = "No preference";

const MAX_SUGGESTIONS: usize = 8;
const MAX_ALTERNATIVES: usize = 4;
const MAIN_SEARCH_LIMIT: usize = 20;
const FALLBACK_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    Start,
    Occasion,
    Recipient,
    Budget,
    Category,
    Style,
    FinalSuggestions,
}

impl ChatState {
    pub const ALL: &'static [Self] = &[
        Self::Start,
        Self::Occasion,
        Self::Recipient,
        Self::Budget,
        Self::Category,
        Self::Style,
        Self::FinalSuggestions,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Occasion => "occasion",
            Self::Recipient => "recipient",
            Self::Budget => "budget",
            Self::Category => "category",
            Self::Style => "style",
            Self::FinalSuggestions => "final_suggestions",
        }
    }

    /// Parse a client-supplied state name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.as_str() == s)
    }
}

pub const OCCASIONS: &[&str] = &[
    "Birthday",
    "Anniversary",
    "Wedding",
    "Valentine's Day",
    "Christmas",
    "Mother's Day",
    "Father's Day",
    "Graduation",
    "Baby Shower",
    "Just Because",
];

pub const RECIPIENTS: &[&str] = &[
    "Partner/Spouse",
    "Mother",
    "Father",
    "Friend",
    "Sibling",
    "Colleague",
    "Child",
    "Grandparent",
    "Teacher",
    "Boss",
];

pub const STYLES: &[&str] = &[
    "Modern",
    "Classic",
    "Romantic",
    "Funny",
    "Elegant",
    "Casual",
    "Luxury",
    "Personalized",
    "Practical",
    "Unique",
];

/// A budget option. `min` and `max` are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub label: String,
    pub min: Decimal,
    pub max: Decimal,
}

impl BudgetRange {
    fn new(label: &str, min: i64, max: i64) -> Self {
        Self {
            label: label.to_string(),
            min: Decimal::from(min),
            max: Decimal::from(max),
        }
    }

    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

#[must_use]
pub fn budgets() -> Vec<BudgetRange> {
    vec![
        BudgetRange::new("Under $25", 0, 25),
        BudgetRange::new("$25 - $50", 25, 50),
        BudgetRange::new("$50 - $100", 50, 100),
        BudgetRange::new("$100 - $200", 100, 200),
        BudgetRange::new("Over $200", 200, 10_000),
    ]
}

/// What a user answered: free text, or a budget option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Budget(BudgetRange),
    Text(String),
}

impl Answer {
    fn label(&self) -> &str {
        match self {
            Self::Budget(b) => &b.label,
            Self::Text(s) => s,
        }
    }

    fn text(&self) -> String {
        self.label().to_string()
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Budget(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

/// Answers gathered so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Answer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// Categories, tags, and keywords that fit an occasion.
struct OccasionHints {
    categories: &'static [&'static str],
    tags: &'static [&'static str],
    keywords: &'static [&'static str],
}

fn occasion_hints(occasion: &str) -> Option<OccasionHints> {
    let hints = match occasion {
        "Birthday" => OccasionHints {
            categories: &["gifts", "cards", "customizable"],
            tags: &["birthday", "celebration", "party", "cake", "candle"],
            keywords: &["birthday", "celebrate", "party", "gift", "card"],
        },
        "Anniversary" => OccasionHints {
            categories: &["gifts", "cards", "jewelry", "customizable"],
            tags: &["anniversary", "love", "romantic", "couple", "memory"],
            keywords: &["anniversary", "love", "romantic", "together", "memory"],
        },
        "Wedding" => OccasionHints {
            categories: &["gifts", "jewelry", "home-decor"],
            tags: &["wedding", "marriage", "couple", "celebration", "elegant"],
            keywords: &["wedding", "marriage", "bride", "groom", "couple"],
        },
        "Valentine's Day" => OccasionHints {
            categories: &["gifts", "jewelry", "cards", "flowers"],
            tags: &["valentine", "love", "romantic", "heart", "couple"],
            keywords: &["valentine", "love", "romantic", "heart", "red"],
        },
        "Christmas" => OccasionHints {
            categories: &["gifts", "decorations", "cards"],
            tags: &["christmas", "holiday", "festive", "winter", "family"],
            keywords: &["christmas", "holiday", "festive", "santa", "winter"],
        },
        _ => return None,
    };
    Some(hints)
}

fn recipient_tags(recipient: &str) -> Option<&'static [&'static str]> {
    match recipient {
        "Partner/Spouse" => Some(&["romantic", "love", "couple", "personal", "intimate"]),
        "Mother" => Some(&["mom", "mother", "family", "love", "care"]),
        "Father" => Some(&["dad", "father", "family", "practical", "tools"]),
        "Friend" => Some(&["friendship", "fun", "casual", "thoughtful", "share"]),
        _ => None,
    }
}

/// A reply to any conversation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub message: String,
    pub state: ChatState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_custom_input: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_summary: Option<SearchSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_data: Option<ConversationData>,
}

impl ChatReply {
    fn ask(
        message: String,
        state: ChatState,
        question: &'static str,
        options: Value,
        allow_custom_input: Option<bool>,
        data: Option<ConversationData>,
    ) -> Self {
        Self {
            message,
            state,
            question: Some(question),
            options: Some(options),
            allow_custom_input,
            suggestions: None,
            alternatives: None,
            search_summary: None,
            conversation_data: data,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: ProductId,
    pub name: String,
    pub short_description: String,
    pub price: Decimal,
    pub original_price: Decimal,
    pub images: Vec<String>,
    pub rating: f64,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl From<&Product> for Suggestion {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            short_description: p.short_description.clone(),
            price: p.price(),
            original_price: p.retail_price,
            images: p.images.clone(),
            rating: p.rating,
            category: p.main_category.clone(),
            tags: p.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub occasion: Option<String>,
    pub recipient: Option<String>,
    pub budget: Option<String>,
    pub category: Option<String>,
    pub style: Option<String>,
    pub total_found: usize,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("User input and current state are required")]
    MissingFields,

    #[error("Invalid conversation state")]
    InvalidState,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of recording one answer.
#[derive(Debug)]
pub enum Step {
    /// Ask the next question. Category options are filled in by the caller.
    Ask(ChatState, ConversationData),
    /// Every answer is in; time to search.
    Suggest(ConversationData),
}

#[must_use]
pub fn welcome() -> ChatReply {
    ChatReply::ask(
        "Hi! I'm here to help you find the perfect gift! 🎁 Let's start with a few questions to understand what you're looking for.".to_string(),
        ChatState::Occasion,
        "What's the occasion?",
        json!(OCCASIONS),
        Some(true),
        None,
    )
}

/// Record `input` as the answer for `state`.
///
/// # Errors
///
/// Returns `ChatError::MissingFields` for blank input and
/// `ChatError::InvalidState` for a state that takes no answer.
pub fn advance(
    state: Option<&str>,
    input: Option<Answer>,
    mut data: ConversationData,
) -> Result<Step, ChatError> {
    let (Some(state), Some(input)) = (state.filter(|s| !s.is_empty()), input) else {
        return Err(ChatError::MissingFields);
    };
    if input.is_empty() {
        return Err(ChatError::MissingFields);
    }
    match ChatState::parse(state) {
        Some(ChatState::Occasion) => {
            data.occasion = Some(input.text());
            Ok(Step::Ask(ChatState::Recipient, data))
        }
        Some(ChatState::Recipient) => {
            data.recipient = Some(input.text());
            Ok(Step::Ask(ChatState::Budget, data))
        }
        Some(ChatState::Budget) => {
            data.budget = Some(input);
            Ok(Step::Ask(ChatState::Category, data))
        }
        Some(ChatState::Category) => {
            data.preferred_category = Some(input.text());
            Ok(Step::Ask(ChatState::Style, data))
        }
        Some(ChatState::Style) => {
            data.style = Some(input.text());
            Ok(Step::Suggest(data))
        }
        _ => Err(ChatError::InvalidState),
    }
}

/// The question for `state`. `categories` are the active category names.
#[must_use]
pub fn question(state: ChatState, data: ConversationData, categories: &[String]) -> ChatReply {
    let occasion = data.occasion.clone().unwrap_or_default();
    let recipient = data.recipient.clone().unwrap_or_default();
    match state {
        ChatState::Recipient => ChatReply::ask(
            format!("Great! A gift for {occasion}. 🎉"),
            state,
            "Who is this gift for?",
            json!(RECIPIENTS),
            Some(true),
            Some(data),
        ),
        ChatState::Budget => ChatReply::ask(
            format!("Perfect! A {occasion} gift for your {recipient}. 💝"),
            state,
            "What's your budget range?",
            json!(budgets()),
            None,
            Some(data),
        ),
        ChatState::Category => {
            let mut options: Vec<String> = categories.to_vec();
            options.push(NO_PREFERENCE.to_string());
            ChatReply::ask(
                "Budget set! Now let's narrow it down. 🎯".to_string(),
                state,
                "Any specific product category in mind?",
                json!(options),
                Some(true),
                Some(data),
            )
        }
        ChatState::Style => ChatReply::ask(
            "Almost there! Just one more question. ✨".to_string(),
            state,
            "What style are you looking for?",
            json!(STYLES),
            Some(true),
            Some(data),
        ),
        ChatState::Start | ChatState::Occasion | ChatState::FinalSuggestions => welcome(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
}

fn tags_contain_any(product: &Product, needles: &[&str]) -> bool {
    product.tags.iter().any(|t| contains_any(t, needles))
}

fn category_of(product: &Product) -> &str {
    product.main_category.as_deref().unwrap_or_default()
}

fn wants_category(data: &ConversationData) -> Option<&str> {
    data.preferred_category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != NO_PREFERENCE)
}

/// Whether a product fits the gathered answers.
///
/// A preferred category must match. Beyond that, any occasion, recipient, or
/// style hint is enough; with no hints every product qualifies.
#[must_use]
pub fn fits(product: &Product, data: &ConversationData) -> bool {
    if let Some(category) = wants_category(data)
        && !contains_any(category_of(product), &[category])
    {
        return false;
    }

    let mut any_hint = false;
    let mut hit = false;

    if let Some(hints) = data.occasion.as_deref().and_then(occasion_hints) {
        any_hint = true;
        hit |= contains_any(category_of(product), hints.categories)
            || tags_contain_any(product, hints.tags)
            || contains_any(&product.name, hints.keywords)
            || contains_any(&product.short_description, hints.keywords)
            || product
                .detailed_description
                .as_deref()
                .is_some_and(|d| contains_any(d, hints.keywords));
    }
    if let Some(tags) = data.recipient.as_deref().and_then(recipient_tags) {
        any_hint = true;
        hit |= tags_contain_any(product, tags);
    }
    if let Some(style) = data.style.as_deref().filter(|s| !s.is_empty() && *s != NO_PREFERENCE) {
        any_hint = true;
        let style = [style];
        hit |= tags_contain_any(product, &style)
            || contains_any(&product.name, &style)
            || contains_any(&product.short_description, &style);
    }

    !any_hint || hit
}

fn newest_best_rated(a: &&Product, b: &&Product) -> std::cmp::Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

fn popular(products: &[Product]) -> Vec<&Product> {
    let mut all: Vec<&Product> = products.iter().collect();
    all.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then_with(|| b.featured.cmp(&a.featured))
    });
    all.truncate(FALLBACK_LIMIT);
    all
}

fn broader<'p>(products: &'p [Product], data: &ConversationData) -> Vec<&'p Product> {
    if let Some(first_word) = wants_category(data).and_then(|c| c.split(' ').next()) {
        let found: Vec<&Product> = products
            .iter()
            .filter(|p| contains_any(category_of(p), &[first_word]))
            .take(FALLBACK_LIMIT)
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    if let Some(occasion) = data.occasion.as_deref() {
        let lowered = occasion.to_lowercase();
        let terms = [lowered.as_str(), "gift", "present"];
        let found: Vec<&Product> = products
            .iter()
            .filter(|p| tags_contain_any(p, &terms) || contains_any(&p.name, &terms))
            .take(FALLBACK_LIMIT)
            .collect();
        if !found.is_empty() {
            return found;
        }
    }

    popular(products)
}

/// Pick suggestions from the active catalog.
#[must_use]
pub fn select_suggestions<'p>(products: &'p [Product], data: &ConversationData) -> Vec<&'p Product> {
    let mut found: Vec<&Product> = products.iter().filter(|p| fits(p, data)).collect();
    found.sort_by(newest_best_rated);
    found.truncate(MAIN_SEARCH_LIMIT);

    if found.is_empty() {
        found = broader(products, data);
    }

    if let Some(Answer::Budget(range)) = &data.budget {
        found.retain(|p| range.contains(p.price()));
    }
    found.truncate(MAX_SUGGESTIONS);
    found
}

/// Featured products, best rated first.
#[must_use]
pub fn select_alternatives(products: &[Product]) -> Vec<&Product> {
    let mut featured: Vec<&Product> = products.iter().filter(|p| p.featured).collect();
    featured.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    featured.truncate(MAX_ALTERNATIVES);
    featured
}

#[must_use]
pub fn suggestion_message(data: &ConversationData, count: usize) -> String {
    let occasion = data.occasion.as_deref().unwrap_or_default();
    let recipient = data.recipient.as_deref().unwrap_or_default();
    match count {
        0 => format!(
            "I couldn't find exact matches for your {occasion} gift for {recipient}, but here are some popular alternatives that might work! 🎁"
        ),
        1 => format!("Perfect! I found a great {occasion} gift for your {recipient}! ✨"),
        n => format!(
            "Excellent! I found {n} perfect {occasion} gifts for your {recipient}! Here are my top recommendations: 🎉"
        ),
    }
}

/// Build the final reply from the active catalog.
#[must_use]
pub fn final_reply(products: &[Product], data: ConversationData) -> ChatReply {
    let suggestions: Vec<Suggestion> = select_suggestions(products, &data)
        .into_iter()
        .map(Suggestion::from)
        .collect();
    let alternatives: Vec<Suggestion> = select_alternatives(products)
        .into_iter()
        .map(Suggestion::from)
        .collect();
    let summary = SearchSummary {
        occasion: data.occasion.clone(),
        recipient: data.recipient.clone(),
        budget: data.budget.as_ref().map(Answer::text),
        category: data.preferred_category.clone(),
        style: data.style.clone(),
        total_found: suggestions.len(),
    };
    ChatReply {
        message: suggestion_message(&data, suggestions.len()),
        state: ChatState::FinalSuggestions,
        question: None,
        options: None,
        allow_custom_input: None,
        suggestions: Some(suggestions),
        alternatives: Some(alternatives),
        search_summary: Some(summary),
        conversation_data: Some(data),
    }
}

/// Process one conversation turn.
///
/// # Errors
///
/// See [`advance`]. Also returns `ChatError::Repository` if the catalog
/// cannot be read.
pub async fn process(
    pool: &PgPool,
    state: Option<&str>,
    input: Option<Answer>,
    data: ConversationData,
) -> Result<ChatReply, ChatError> {
    let reply = match advance(state, input, data)? {
        Step::Ask(ChatState::Category, data) => {
            let categories: Vec<String> = match CategoryRepository::new(pool).list(true).await {
                Ok(list) => list.into_iter().map(|c| c.name).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "Falling back to built-in chatbot categories");
                    ["Gifts", "Cards", "Jewelry", "Accessories", "Home & Decor"]
                        .iter()
                        .map(ToString::to_string)
                        .collect()
                }
            };
            question(ChatState::Category, data, &categories)
        }
        Step::Ask(state, data) => question(state, data, &[]),
        Step::Suggest(data) => {
            let products = ProductRepository::new(pool).active().await?;
            final_reply(&products, data)
        }
    };
    Ok(reply)
}

/// State names and option lists for `GET /chatbot/state`.
#[must_use]
pub fn state_catalog() -> Value {
    let states: serde_json::Map<String, Value> = ChatState::ALL
        .iter()
        .map(|s| (s.as_str().to_uppercase(), json!(s.as_str())))
        .collect();
    json!({
        "success": true,
        "states": states,
        "options": {
            "occasions": OCCASIONS,
            "recipients": RECIPIENTS,
            "budgets": budgets(),
            "styles": STYLES,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures;

    fn text(s: &str) -> Option<Answer> {
        Some(Answer::Text(s.to_string()))
    }

    fn product(id: i32, name: &str, price: &str, tags: &[&str], category: &str) -> Product {
        let mut p = fixtures::product(id, name, price, None);
        p.tags = tags.iter().map(ToString::to_string).collect();
        p.main_category = Some(category.to_string());
        p.short_description = String::new();
        p
    }

    #[test]
    fn test_welcome_asks_occasion() {
        let reply = welcome();
        assert_eq!(reply.state, ChatState::Occasion);
        assert_eq!(reply.allow_custom_input, Some(true));
        let json = serde_json::to_value(&reply).unwrap_or_default();
        assert_eq!(json["options"][0], "Birthday");
        assert_eq!(json["state"], "occasion");
    }

    #[test]
    fn test_conversation_walks_every_state() {
        let data = ConversationData::default();
        let Ok(Step::Ask(next, data)) = advance(Some("occasion"), text("Birthday"), data) else {
            panic!("expected recipient question");
        };
        assert_eq!(next, ChatState::Recipient);
        let Ok(Step::Ask(next, data)) = advance(Some("recipient"), text("Friend"), data) else {
            panic!("expected budget question");
        };
        assert_eq!(next, ChatState::Budget);
        let budget = Answer::Budget(budgets()[1].clone());
        let Ok(Step::Ask(next, data)) = advance(Some("budget"), Some(budget), data) else {
            panic!("expected category question");
        };
        assert_eq!(next, ChatState::Category);
        let Ok(Step::Ask(next, data)) = advance(Some("category"), text(NO_PREFERENCE), data) else {
            panic!("expected style question");
        };
        assert_eq!(next, ChatState::Style);
        let Ok(Step::Suggest(data)) = advance(Some("style"), text("Funny"), data) else {
            panic!("expected suggestions");
        };
        assert_eq!(data.occasion.as_deref(), Some("Birthday"));
        assert_eq!(data.style.as_deref(), Some("Funny"));
    }

    #[test]
    fn test_bad_input() {
        let data = ConversationData::default();
        assert!(matches!(
            advance(None, text("x"), data.clone()),
            Err(ChatError::MissingFields)
        ));
        assert!(matches!(
            advance(Some("occasion"), text("  "), data.clone()),
            Err(ChatError::MissingFields)
        ));
        assert!(matches!(
            advance(Some("final_suggestions"), text("x"), data.clone()),
            Err(ChatError::InvalidState)
        ));
        assert!(matches!(
            advance(Some("nonsense"), text("x"), data),
            Err(ChatError::InvalidState)
        ));
    }

    #[test]
    fn test_budget_answer_parses_from_object() {
        let answer: Answer =
            serde_json::from_value(json!({"label": "Under $25", "min": 0, "max": 25}))
                .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(answer, Answer::Budget(budgets()[0].clone()));
        let answer: Answer = serde_json::from_value(json!("Mother")).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(answer, Answer::Text("Mother".to_string()));
    }

    #[test]
    fn test_category_question_appends_no_preference() {
        let reply = question(
            ChatState::Category,
            ConversationData::default(),
            &["Mugs".to_string()],
        );
        let json = serde_json::to_value(&reply).unwrap_or_default();
        assert_eq!(json["options"], json!(["Mugs", NO_PREFERENCE]));
    }

    #[test]
    fn test_suggestions_respect_hints_and_budget() {
        let products = vec![
            product(1, "Party Mug", "20", &["birthday"], "mugs"),
            product(2, "Desk Lamp", "20", &[], "lighting"),
            product(3, "Cake Topper", "80", &["cake"], "party"),
        ];
        let data = ConversationData {
            occasion: Some("Birthday".to_string()),
            recipient: Some("Boss".to_string()),
            budget: Some(Answer::Budget(budgets()[0].clone())),
            preferred_category: Some(NO_PREFERENCE.to_string()),
            style: Some(NO_PREFERENCE.to_string()),
        };
        let ids: Vec<i32> = select_suggestions(&products, &data)
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_preferred_category_is_required() {
        let data = ConversationData {
            preferred_category: Some("Cards".to_string()),
            ..ConversationData::default()
        };
        assert!(fits(&product(1, "Thanks", "5", &[], "Greeting Cards"), &data));
        assert!(!fits(&product(2, "Thanks", "5", &[], "Mugs"), &data));
    }

    #[test]
    fn test_no_match_falls_back_to_popular() {
        let mut best = product(1, "Lamp", "10", &[], "lighting");
        best.rating = 5.0;
        let products = vec![product(2, "Chair", "10", &[], "furniture"), best];
        let data = ConversationData {
            style: Some("Luxury".to_string()),
            ..ConversationData::default()
        };
        let ids: Vec<i32> = select_suggestions(&products, &data)
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_alternatives_are_featured_only() {
        let mut a = product(1, "A", "10", &[], "x");
        a.featured = true;
        let b = product(2, "B", "10", &[], "x");
        let products = [a, b];
        let alts = select_alternatives(&products);
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].id, ProductId::new(1));
    }

    #[test]
    fn test_suggestion_messages() {
        let data = ConversationData {
            occasion: Some("Wedding".to_string()),
            recipient: Some("Friend".to_string()),
            ..ConversationData::default()
        };
        assert!(suggestion_message(&data, 0).starts_with("I couldn't find"));
        assert!(suggestion_message(&data, 1).contains("a great Wedding gift"));
        assert!(suggestion_message(&data, 3).contains("found 3 perfect"));
    }

    #[test]
    fn test_state_catalog_lists_states() {
        let catalog = state_catalog();
        assert_eq!(catalog["states"]["FINAL_SUGGESTIONS"], "final_suggestions");
        assert_eq!(catalog["options"]["styles"].as_array().map(Vec::len), Some(10));
    }
}
