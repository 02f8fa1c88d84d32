//! Cross-crate workflow rules that need no server.
//!
//! These exercise the pieces several routes share: the order and gift
//! pipelines, group payment math, and the gift-finder conversation.

use std::str::FromStr;

use rust_decimal::Decimal;

use best_wishes_core::{
    CollaborativePurchaseId, CollaborativeStatus, OrderId, OrderStatus, SHIPPING_FEE, SurpriseGiftStatus,
    profit_margin, selling_price, split_share,
};
use best_wishes_server::services::chatbot::{Answer, ChatState, ConversationData, Step, advance, welcome};
use best_wishes_server::services::collaborative::{generate_payment_link, validate_participants};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

// =============================================================================
// Status pipelines
// =============================================================================

#[test]
fn test_order_walks_the_full_pipeline() {
    let path = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Packing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    for pair in path.windows(2) {
        if let [from, to] = pair {
            assert!(from.can_transition_to(*to), "{from} -> {to}");
        }
    }
    let committing: Vec<_> = path.iter().filter(|s| s.commits_stock()).collect();
    assert_eq!(committing, vec![&OrderStatus::Packing]);
}

#[test]
fn test_delivered_order_is_final() {
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
    assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
}

#[test]
fn test_surprise_gift_cannot_skip_back() {
    assert!(SurpriseGiftStatus::Paid.can_transition_to(SurpriseGiftStatus::Packing));
    assert!(!SurpriseGiftStatus::OutForDelivery.can_transition_to(SurpriseGiftStatus::Paid));
    assert!(!SurpriseGiftStatus::Cancelled.can_transition_to(SurpriseGiftStatus::Pending));
}

#[test]
fn test_collaborative_staff_labels() {
    assert_eq!(
        CollaborativeStatus::from_admin_label("OutForDelivery"),
        Some(CollaborativeStatus::OutForDelivery)
    );
    assert!(CollaborativeStatus::Completed.is_active());
    assert!(!CollaborativeStatus::Refunded.is_active());
}

// =============================================================================
// Group payments
// =============================================================================

#[test]
fn test_group_share_includes_creator_and_shipping() {
    let subtotal = selling_price(dec("60.00"), Some(dec("50.00"))) * Decimal::from(2);
    let total = subtotal + SHIPPING_FEE;
    assert_eq!(total, dec("110.00"));
    // Two invitees plus the creator.
    assert_eq!(split_share(total, 2), dec("36.67"));
}

#[test]
fn test_profit_margin_for_summary_rows() {
    assert_eq!(profit_margin(dec("40"), dec("50")), Some(dec("25.00")));
    assert_eq!(profit_margin(Decimal::ZERO, dec("50")), None);
}

#[test]
fn test_participants_are_normalized() {
    let emails = vec!["  Nimal@Example.com ".to_string(), "sara@example.com".to_string()];
    let out = validate_participants(&emails, "creator@example.com");
    assert_eq!(
        out,
        Ok(vec!["nimal@example.com".to_string(), "sara@example.com".to_string()])
    );
}

#[test]
fn test_participant_rules() {
    let four: Vec<String> = (0..4).map(|i| format!("p{i}@example.com")).collect();
    assert!(validate_participants(&four, "c@example.com").is_err());
    assert!(validate_participants(&[], "c@example.com").is_err());
    let own = vec!["C@example.com".to_string()];
    assert!(validate_participants(&own, "c@example.com").is_err());
}

#[test]
fn test_payment_links_are_unique_hex() {
    let a = generate_payment_link();
    let b = generate_payment_link();
    assert_eq!(a.len(), 64);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
}

#[test]
fn test_references() {
    assert_eq!(OrderId::new(42).reference(), "000042");
    assert_eq!(CollaborativePurchaseId::new(7).print_reference(), "00000007");
}

// =============================================================================
// Gift finder
// =============================================================================

#[test]
fn test_conversation_reaches_suggestions() {
    assert_eq!(welcome().state, ChatState::Occasion);

    let answers = [
        ("occasion", "Birthday"),
        ("recipient", "Friend"),
        ("budget", "Under $25"),
        ("category", "Mugs"),
    ];
    let mut data = ConversationData::default();
    for (state, answer) in answers {
        match advance(Some(state), Some(Answer::Text(answer.to_string())), data) {
            Ok(Step::Ask(_, next)) => data = next,
            other => panic!("unexpected step after {state}: {other:?}"),
        }
    }

    match advance(Some("style"), Some(Answer::Text("Fun".to_string())), data) {
        Ok(Step::Suggest(done)) => {
            assert_eq!(done.occasion.as_deref(), Some("Birthday"));
            assert_eq!(done.style.as_deref(), Some("Fun"));
        }
        other => panic!("expected suggestions, got {other:?}"),
    }
}

#[test]
fn test_conversation_rejects_blank_answer() {
    let result = advance(
        Some("occasion"),
        Some(Answer::Text("  ".to_string())),
        ConversationData::default(),
    );
    assert!(result.is_err());
}
