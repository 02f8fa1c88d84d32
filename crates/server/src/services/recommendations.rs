//! Occasion-based product recommendations.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use best_wishes_core::{Occasion, ProductId};

use crate::db::RepositoryError;
use crate::db::products::ProductRepository;
use crate::models::product::Product;

/// Default number of recommendations.
pub const DEFAULT_LIMIT: usize = 5;

/// Keyword matches below this count are padded with popular products.
const MIN_MATCHES: usize = 3;

/// Words that mark a product as suitable for an occasion.
#[must_use]
pub const fn keywords(occasion: Occasion) -> &'static [&'static str] {
    match occasion {
        Occasion::Birthday => &[
            "birthday", "cake", "celebration", "party", "gift", "candle", "balloon", "surprise",
            "happy birthday",
        ],
        Occasion::Anniversary => &[
            "anniversary", "love", "couple", "romantic", "romance", "heart", "together", "forever",
            "wedding",
        ],
        Occasion::Wedding => &[
            "wedding", "bride", "groom", "marriage", "ceremony", "bridal", "ring", "bouquet", "white",
            "dress",
        ],
        Occasion::Graduation => &[
            "graduation", "diploma", "achievement", "success", "graduate", "education", "school",
            "college", "university",
        ],
        Occasion::BabyShower => &[
            "baby", "newborn", "infant", "shower", "pregnancy", "mother", "cute", "soft", "toy",
        ],
        Occasion::Housewarming => &[
            "home", "house", "new home", "housewarming", "decor", "furniture", "decoration", "plant",
            "welcome",
        ],
        Occasion::ValentineDay => &[
            "valentine", "love", "romantic", "heart", "red", "rose", "romance", "couple", "date",
        ],
        Occasion::MotherDay => &[
            "mother", "mom", "mama", "maternal", "care", "love", "appreciation", "family", "woman",
        ],
        Occasion::FatherDay => &[
            "father", "dad", "papa", "paternal", "man", "masculine", "strength", "family",
            "appreciation",
        ],
        Occasion::Christmas => &[
            "christmas", "xmas", "holiday", "santa", "tree", "gift", "festive", "red", "green",
            "winter",
        ],
        Occasion::NewYear => &[
            "new year", "celebration", "party", "champagne", "fireworks", "resolution",
            "fresh start", "golden",
        ],
        Occasion::Thanksgiving => &[
            "thanksgiving", "grateful", "thankful", "harvest", "autumn", "family", "dinner", "turkey",
        ],
        Occasion::Engagement => &[
            "engagement", "proposal", "ring", "couple", "love", "commitment", "romantic", "forever",
        ],
        Occasion::Retirement => &[
            "retirement", "senior", "relaxation", "freedom", "achievement", "career", "rest", "hobby",
        ],
        Occasion::Promotion => &[
            "promotion", "success", "achievement", "career", "professional", "congratulations",
            "office", "work",
        ],
        Occasion::GetWellSoon => &[
            "get well", "health", "recovery", "healing", "care", "comfort", "wellness", "medicine",
            "support",
        ],
        Occasion::Sympathy => &[
            "sympathy", "condolence", "comfort", "support", "care", "thoughtful", "peaceful", "memory",
        ],
        Occasion::Congratulations => &[
            "congratulations", "achievement", "success", "celebration", "proud", "accomplishment",
            "victory",
        ],
        Occasion::ThankYou => &[
            "thank you", "appreciation", "grateful", "thanks", "gratitude", "thoughtful", "kind",
            "generous",
        ],
        Occasion::General => &[
            "gift", "present", "surprise", "special", "thoughtful", "care", "love", "appreciation",
        ],
    }
}

/// A recommended product as shown in emails and the reminder response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: ProductId,
    pub name: String,
    pub short_description: String,
    pub main_category: Option<String>,
    pub image: Option<String>,
    pub price: Decimal,
    pub original_price: Decimal,
    pub on_sale: bool,
    pub rating: f64,
    pub link: String,
    pub tags: Vec<String>,
}

impl Recommendation {
    #[must_use]
    pub fn from_product(product: &Product, frontend_url: &str) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            short_description: product.short_description.clone(),
            main_category: product.main_category.clone(),
            image: product.thumbnail(),
            price: product.price(),
            original_price: product.retail_price,
            on_sale: product.sale_price.is_some_and(|p| p > Decimal::ZERO),
            rating: product.rating,
            link: format!("{frontend_url}/products/{}", product.id),
            tags: product.tags.clone(),
        }
    }
}

/// Picker entry for `GET /recommendations/occasions`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OccasionOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[must_use]
pub fn occasion_options() -> Vec<OccasionOption> {
    Occasion::ALL
        .iter()
        .map(|o| OccasionOption {
            value: o.as_str(),
            label: o.display_name(),
        })
        .collect()
}

fn matches(product: &Product, words: &[&str]) -> bool {
    let name = product.name.to_lowercase();
    let description = product.short_description.to_lowercase();
    let category = product
        .main_category
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let tags: Vec<String> = product.tags.iter().map(|t| t.to_lowercase()).collect();

    words.iter().any(|word| {
        name.contains(word)
            || description.contains(word)
            || category.contains(word)
            || tags.iter().any(|t| t.contains(word))
    })
}

fn by_rating_then_featured(a: &&Product, b: &&Product) -> std::cmp::Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.featured.cmp(&a.featured))
}

fn by_featured_then_rating(a: &&Product, b: &&Product) -> std::cmp::Ordering {
    b.featured
        .cmp(&a.featured)
        .then_with(|| b.rating.total_cmp(&a.rating))
}

/// Rank active products for an occasion.
///
/// Keyword hits come first, best rated first. Fewer than three hits are
/// padded with featured and top-rated products. At least one product is
/// returned whenever `products` is non-empty.
#[must_use]
pub fn rank<'p>(products: &'p [Product], occasion: Occasion, limit: usize) -> Vec<&'p Product> {
    let limit = limit.max(1);
    let words = keywords(occasion);

    let mut hits: Vec<&Product> = products.iter().filter(|p| matches(p, words)).collect();
    hits.sort_by(by_rating_then_featured);
    hits.truncate(limit * 2);

    if hits.len() < MIN_MATCHES {
        let mut rest: Vec<&Product> = products
            .iter()
            .filter(|p| !hits.iter().any(|h| h.id == p.id))
            .collect();
        rest.sort_by(by_featured_then_rating);
        let room = limit.saturating_sub(hits.len());
        hits.extend(rest.into_iter().take(room));
    }

    hits.truncate(limit);
    hits
}

/// Recommend products for an occasion.
///
/// # Errors
///
/// Returns `RepositoryError` if the catalog cannot be read.
pub async fn recommend(
    pool: &PgPool,
    occasion: Occasion,
    limit: usize,
    frontend_url: &str,
) -> Result<Vec<Recommendation>, RepositoryError> {
    let products = ProductRepository::new(pool).active().await?;
    Ok(rank(&products, occasion, limit)
        .into_iter()
        .map(|p| Recommendation::from_product(p, frontend_url))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures;

    fn product(id: i32, name: &str, rating: f64, featured: bool) -> Product {
        let mut p = fixtures::product(id, name, "20", None);
        p.short_description = String::new();
        p.tags = Vec::new();
        p.main_category = None;
        p.rating = rating;
        p.featured = featured;
        p
    }

    #[test]
    fn test_every_occasion_has_keywords() {
        for occasion in Occasion::ALL {
            assert!(!keywords(*occasion).is_empty(), "{occasion}");
        }
    }

    #[test]
    fn test_keyword_hits_sorted_by_rating() {
        let products = vec![
            product(1, "Birthday Mug", 3.0, false),
            product(2, "Party Hat", 4.5, false),
            product(3, "Balloon Bunch", 4.0, true),
            product(4, "Desk Lamp", 5.0, true),
        ];
        let ranked: Vec<i32> = rank(&products, Occasion::Birthday, 5)
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ranked, vec![2, 3, 1]);
    }

    #[test]
    fn test_few_hits_are_padded_with_featured() {
        let products = vec![
            product(1, "Rose Bouquet", 2.0, false),
            product(2, "Desk Lamp", 3.0, false),
            product(3, "Notebook", 1.0, true),
        ];
        let ranked: Vec<i32> = rank(&products, Occasion::ValentineDay, 3)
            .iter()
            .map(|p| p.id.as_i32())
            .collect();
        assert_eq!(ranked, vec![1, 3, 2]);
    }

    #[test]
    fn test_matches_tags_and_category_case_insensitive() {
        let mut tagged = product(1, "Plain Box", 1.0, false);
        tagged.tags = vec!["XMAS".to_string()];
        let mut categorized = product(2, "Plain Jar", 1.0, false);
        categorized.main_category = Some("Holiday Decor".to_string());
        assert!(matches(&tagged, keywords(Occasion::Christmas)));
        assert!(matches(&categorized, keywords(Occasion::Christmas)));
        assert!(!matches(&product(3, "Plain Cup", 1.0, false), keywords(Occasion::Christmas)));
    }

    #[test]
    fn test_always_at_least_one() {
        let products = vec![product(1, "Desk Lamp", 1.0, false)];
        assert_eq!(rank(&products, Occasion::Sympathy, 0).len(), 1);
        assert!(rank(&[], Occasion::Sympathy, 5).is_empty());
    }

    #[test]
    fn test_recommendation_link_and_sale_flag() {
        let p = fixtures::product(9, "Mug", "20", Some("15"));
        let r = Recommendation::from_product(&p, "https://shop.example");
        assert_eq!(r.link, "https://shop.example/products/9");
        assert!(r.on_sale);
        assert_eq!(r.price, Decimal::from(15));
        assert_eq!(r.original_price, Decimal::from(20));
    }
}
