//! Database-backed workflow tests for payments, packing and refunds.
//!
//! Each test gets a fresh database migrated from `crates/server/migrations`.
//!
//! Run with: DATABASE_URL=postgres://... cargo test -p best-wishes-integration-tests -- --ignored

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use best_wishes_core::{
    CollaborativeStatus, Costume, Email, OrderStatus, ParticipantPaymentStatus, ProductId,
    ProductStatus, Role, ShippingClass, SurpriseGiftStatus, TaxClass,
};
use best_wishes_integration_tests::unique_email;
use best_wishes_server::db::RepositoryError;
use best_wishes_server::db::orders::{DeliveryUpdate, OrderRepository};
use best_wishes_server::db::products::ProductRepository;
use best_wishes_server::db::stock::StockError;
use best_wishes_server::db::surprise_gifts::{GiftStatusUpdate, SurpriseGiftRepository};
use best_wishes_server::db::users::UserRepository;
use best_wishes_server::models::collaborative::CollaborativeDetail;
use best_wishes_server::models::order::NewLineItem;
use best_wishes_server::models::product::{Product, ProductDraft, ProductFilters, StockRequest};
use best_wishes_server::models::surprise_gift::NewSurpriseGift;
use best_wishes_server::models::user::{NewUser, User};
use best_wishes_server::services::collaborative::{CollaborativeError, CollaborativeService};
use best_wishes_server::services::fulfillment::{FulfillmentError, set_gift_status, set_order_status};

// =============================================================================
// Fixtures
// =============================================================================

async fn customer(pool: &PgPool, role: Role) -> User {
    let email = Email::parse(&unique_email("db")).expect("valid email");
    UserRepository::new(pool)
        .create(&NewUser {
            first_name: "Amaya".to_string(),
            last_name: "Perera".to_string(),
            email,
            password_hash: "not-a-real-hash".to_string(),
            phone: None,
            address: None,
            zip_code: None,
            role,
        })
        .await
        .expect("create user")
}

async fn product(pool: &PgPool, sku: &str, stock: i32) -> Product {
    ProductRepository::new(pool)
        .create(&ProductDraft {
            name: format!("Gift box {sku}"),
            sku: sku.to_string(),
            short_description: "A wrapped gift box".to_string(),
            detailed_description: None,
            main_category: None,
            filters: ProductFilters::new(),
            tags: Vec::new(),
            images: Vec::new(),
            cost_price: Decimal::from(60),
            retail_price: Decimal::from(100),
            sale_price: None,
            stock,
            tax_class: TaxClass::default(),
            shipping_class: ShippingClass::default(),
            status: ProductStatus::default(),
            featured: false,
            is_customizable: false,
            customization_type: None,
            customization_price: Decimal::ZERO,
            seo_title: String::new(),
            seo_description: String::new(),
        })
        .await
        .expect("create product")
}

async fn stock_of(pool: &PgPool, id: ProductId) -> i32 {
    ProductRepository::new(pool)
        .get(id)
        .await
        .expect("load product")
        .expect("product exists")
        .stock
}

async fn summary_count(pool: &PgPool, source_id: i32, kind: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM order_summaries WHERE source_id = $1 AND kind::text = $2",
    )
    .bind(source_id)
    .bind(kind)
    .fetch_one(pool)
    .await
    .expect("count summaries")
}

fn line(product: &Product, quantity: i32) -> NewLineItem {
    NewLineItem {
        product_id: product.id,
        name: product.name.clone(),
        price: product.price(),
        quantity,
        image: None,
    }
}

/// A purchase of `quantity` units split between two invited friends.
async fn open_purchase(pool: &PgPool, creator: &User, product: &Product, quantity: i32) -> CollaborativeDetail {
    CollaborativeService::new(pool)
        .create(
            creator.id,
            &[StockRequest {
                product_id: product.id,
                quantity,
            }],
            vec![unique_email("friend-a"), unique_email("friend-b")],
            Utc::now(),
        )
        .await
        .expect("create purchase")
}

fn links(detail: &CollaborativeDetail) -> Vec<String> {
    detail.participants.iter().map(|p| p.payment_link.clone()).collect()
}

async fn pay_all(pool: &PgPool, detail: &CollaborativeDetail) {
    let service = CollaborativeService::new(pool);
    for link in links(detail) {
        service.pay(&link, Some("pi_test"), Utc::now()).await.expect("pay share");
    }
}

fn is_refund_id(id: &str) -> bool {
    let mut parts = id.splitn(3, '_');
    parts.next() == Some("refund")
        && parts.next().is_some_and(|ms| !ms.is_empty() && ms.bytes().all(|b| b.is_ascii_digit()))
        && parts
            .next()
            .is_some_and(|tail| tail.len() == 8 && tail.bytes().all(|b| b.is_ascii_alphanumeric()))
}

// =============================================================================
// Collaborative purchases
// =============================================================================

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_last_payment_creates_order(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-PAY", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 2).await;
    let service = CollaborativeService::new(&pool);
    let links = links(&detail);

    let first = service.pay(&links[0], None, Utc::now()).await.expect("first share");
    assert!(first.order_id.is_none());
    assert_eq!(first.detail.purchase.status, CollaborativeStatus::Pending);
    assert_eq!(first.participant.payment_status, ParticipantPaymentStatus::Paid);

    let last = service.pay(&links[1], None, Utc::now()).await.expect("last share");
    let order_id = last.order_id.expect("order created by the last payment");
    assert_eq!(last.detail.purchase.status, CollaborativeStatus::Completed);
    assert_eq!(last.detail.purchase.order_id, Some(order_id));

    let order = OrderRepository::new(&pool)
        .detail(order_id)
        .await
        .expect("load order")
        .expect("order exists");
    assert_eq!(order.order.status, OrderStatus::Processing);
    assert_eq!(order.order.user_id, creator.id);
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);

    let again = service.pay(&links[1], None, Utc::now()).await;
    assert!(matches!(again, Err(CollaborativeError::Invalid(_))));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_start_packing_commits_stock(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-PACK", 5).await;
    let detail = open_purchase(&pool, &creator, &item, 3).await;
    pay_all(&pool, &detail).await;
    let service = CollaborativeService::new(&pool);

    let scheduled = Utc::now() + Duration::days(2);
    let (packed, updates) = service
        .start_packing(detail.purchase.id, Some(scheduled))
        .await
        .expect("start packing");
    assert_eq!(packed.purchase.status, CollaborativeStatus::Packing);
    assert!(packed.purchase.scheduled_at.is_some());
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].old_stock, 5);
    assert_eq!(updates[0].new_stock, 2);
    assert_eq!(stock_of(&pool, item.id).await, 2);
    assert_eq!(summary_count(&pool, detail.purchase.id.as_i32(), "collaborative").await, 1);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_start_packing_reports_shortfall(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-SHORT", 1).await;
    let detail = open_purchase(&pool, &creator, &item, 4).await;
    pay_all(&pool, &detail).await;

    let err = CollaborativeService::new(&pool)
        .start_packing(detail.purchase.id, None)
        .await
        .expect_err("not enough stock");
    let CollaborativeError::Stock(StockError::Insufficient(short)) = err else {
        panic!("expected a stock shortfall, got {err:?}");
    };
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].product_id, item.id);
    assert_eq!(short[0].requested_quantity, 4);
    assert_eq!(short[0].available_stock, 1);

    // Nothing was written.
    assert_eq!(stock_of(&pool, item.id).await, 1);
    let after = CollaborativeService::new(&pool)
        .start_packing(detail.purchase.id, None)
        .await;
    assert!(after.is_err());
    assert_eq!(summary_count(&pool, detail.purchase.id.as_i32(), "collaborative").await, 0);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_creator_cancel_refunds_paid_shares(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-CANCEL", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;
    let service = CollaborativeService::new(&pool);
    let links = links(&detail);
    service.pay(&links[0], Some("pi_first"), Utc::now()).await.expect("pay share");

    let stranger = customer(&pool, Role::User).await;
    let denied = service.cancel(detail.purchase.id, stranger.id, Utc::now()).await;
    assert!(matches!(denied, Err(CollaborativeError::Forbidden(_))));

    let cancelled = service
        .cancel(detail.purchase.id, creator.id, Utc::now())
        .await
        .expect("creator cancels");
    assert_eq!(cancelled.purchase.status, CollaborativeStatus::Refunded);
    assert!(cancelled.purchase.cancelled_at.is_some());

    let refunded: Vec<_> = cancelled
        .participants
        .iter()
        .filter(|p| p.payment_status == ParticipantPaymentStatus::Refunded)
        .collect();
    assert_eq!(refunded.len(), 1);
    let refund_id = refunded[0].refund_id.as_deref().unwrap_or_default();
    assert!(is_refund_id(refund_id), "unexpected refund id {refund_id}");
    assert!(
        cancelled
            .participants
            .iter()
            .any(|p| p.payment_status == ParticipantPaymentStatus::Pending && p.refund_id.is_none())
    );
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_cancel_without_payments_ends_cancelled(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-NOPAY", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;

    let cancelled = CollaborativeService::new(&pool)
        .cancel(detail.purchase.id, creator.id, Utc::now())
        .await
        .expect("creator cancels");
    assert_eq!(cancelled.purchase.status, CollaborativeStatus::Cancelled);
    assert!(cancelled.participants.iter().all(|p| p.refund_id.is_none()));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_decline_cancels_purchase(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-DECLINE", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;
    let links = links(&detail);

    let declined = CollaborativeService::new(&pool)
        .decline(&links[0], Utc::now())
        .await
        .expect("decline");
    assert_eq!(declined.purchase.status, CollaborativeStatus::Cancelled);
    assert!(
        declined
            .participants
            .iter()
            .any(|p| p.payment_status == ParticipantPaymentStatus::Declined)
    );
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_decline_refunds_others_and_refuses_payers(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-MIXED", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;
    let service = CollaborativeService::new(&pool);
    let links = links(&detail);
    service.pay(&links[0], None, Utc::now()).await.expect("pay share");

    let refused = service.decline(&links[0], Utc::now()).await;
    assert!(matches!(refused, Err(CollaborativeError::Invalid(_))));

    let declined = service.decline(&links[1], Utc::now()).await.expect("decline");
    assert_eq!(declined.purchase.status, CollaborativeStatus::Refunded);
    let payer = declined
        .participants
        .iter()
        .find(|p| p.payment_link == links[0])
        .expect("payer listed");
    assert_eq!(payer.payment_status, ParticipantPaymentStatus::Refunded);
    assert!(payer.refund_id.as_deref().is_some_and(is_refund_id));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_inactive_purchase_rejects_pay_and_decline(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-CLOSED", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;
    let service = CollaborativeService::new(&pool);
    let links = links(&detail);
    service
        .cancel(detail.purchase.id, creator.id, Utc::now())
        .await
        .expect("creator cancels");

    let paid = service.pay(&links[0], None, Utc::now()).await;
    assert!(matches!(paid, Err(CollaborativeError::Invalid(m)) if m.contains("no longer active")));
    let declined = service.decline(&links[1], Utc::now()).await;
    assert!(matches!(declined, Err(CollaborativeError::Invalid(m)) if m.contains("no longer active")));
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_admin_status_guard_and_cancel_refunds(pool: PgPool) {
    let creator = customer(&pool, Role::User).await;
    let item = product(&pool, "COL-ADMIN", 10).await;
    let detail = open_purchase(&pool, &creator, &item, 1).await;
    pay_all(&pool, &detail).await;
    let service = CollaborativeService::new(&pool);
    let id = detail.purchase.id;

    let skipped = service
        .set_status(id, CollaborativeStatus::Delivered, None, Utc::now())
        .await;
    assert!(matches!(skipped, Err(CollaborativeError::Invalid(_))));

    let cancelled = service
        .set_status(id, CollaborativeStatus::Cancelled, None, Utc::now())
        .await
        .expect("admin cancels");
    assert_eq!(cancelled.purchase.status, CollaborativeStatus::Refunded);
    assert!(
        cancelled
            .participants
            .iter()
            .all(|p| p.payment_status == ParticipantPaymentStatus::Refunded)
    );

    let reopened = service
        .set_status(id, CollaborativeStatus::OutForDelivery, None, Utc::now())
        .await;
    assert!(matches!(reopened, Err(CollaborativeError::Invalid(_))));
}

// =============================================================================
// Orders and surprise gifts
// =============================================================================

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_order_packing_commits_stock_once(pool: PgPool) {
    let buyer = customer(&pool, Role::User).await;
    let admin = customer(&pool, Role::Admin).await;
    let item = product(&pool, "ORD-PACK", 10).await;
    let order = OrderRepository::new(&pool)
        .create(buyer.id, &[line(&item, 3)], Decimal::from(300))
        .await
        .expect("create order");
    let id = order.order.id;
    let update = DeliveryUpdate::default();

    let packed = set_order_status(&pool, id, OrderStatus::Packing, admin.id, &update)
        .await
        .expect("pack");
    assert_eq!(packed.stock.len(), 1);
    assert_eq!(stock_of(&pool, item.id).await, 7);

    let repeated = set_order_status(&pool, id, OrderStatus::Packing, admin.id, &update)
        .await
        .expect("re-apply packing");
    assert!(repeated.stock.is_empty());
    assert_eq!(stock_of(&pool, item.id).await, 7);
    assert_eq!(summary_count(&pool, id.as_i32(), "order").await, 1);

    let delivered = set_order_status(&pool, id, OrderStatus::Delivered, admin.id, &update)
        .await
        .expect("deliver");
    assert_eq!(delivered.row.status, OrderStatus::Delivered);
    assert!(delivered.row.delivered_at.is_some());

    let back = set_order_status(&pool, id, OrderStatus::Packing, admin.id, &update).await;
    assert!(matches!(back, Err(FulfillmentError::InvalidTransition { .. })));
    assert_eq!(stock_of(&pool, item.id).await, 7);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_order_packing_shortfall_leaves_order_untouched(pool: PgPool) {
    let buyer = customer(&pool, Role::User).await;
    let admin = customer(&pool, Role::Admin).await;
    let item = product(&pool, "ORD-SHORT", 2).await;
    let order = OrderRepository::new(&pool)
        .create(buyer.id, &[line(&item, 5)], Decimal::from(500))
        .await
        .expect("create order");

    let err = set_order_status(&pool, order.order.id, OrderStatus::Packing, admin.id, &DeliveryUpdate::default())
        .await
        .expect_err("shortfall");
    assert!(matches!(err, FulfillmentError::Stock(StockError::Insufficient(ref s)) if s.len() == 1));

    let reloaded = OrderRepository::new(&pool)
        .get(order.order.id)
        .await
        .expect("load order")
        .expect("order exists");
    assert_eq!(reloaded.status, OrderStatus::Processing);
    assert_eq!(stock_of(&pool, item.id).await, 2);
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_gift_packing_commits_stock_once(pool: PgPool) {
    let buyer = customer(&pool, Role::User).await;
    let item = product(&pool, "GIFT-PACK", 4).await;
    let gift = SurpriseGiftRepository::new(&pool)
        .create(
            buyer.id,
            &NewSurpriseGift {
                recipient_name: "Nadee".to_string(),
                recipient_phone: "0771234567".to_string(),
                shipping_address: "12 Lake Road, Kandy".to_string(),
                costume: Costume::Mickey,
                suggestions: None,
                total: Decimal::from(200),
                scheduled_at: None,
            },
            &[line(&item, 2)],
        )
        .await
        .expect("create gift");
    let id = gift.gift.id;
    let update = GiftStatusUpdate::default();

    set_gift_status(&pool, id, SurpriseGiftStatus::Packing, &update)
        .await
        .expect("pack");
    set_gift_status(&pool, id, SurpriseGiftStatus::Packing, &update)
        .await
        .expect("re-apply packing");
    assert_eq!(stock_of(&pool, item.id).await, 2);
    assert_eq!(summary_count(&pool, id.as_i32(), "surprisegift").await, 1);

    let delivered = set_gift_status(&pool, id, SurpriseGiftStatus::Delivered, &update)
        .await
        .expect("deliver");
    assert!(delivered.row.delivered_at.is_some());
    assert!(delivered.row.packed_at.is_some());
}

#[sqlx::test(migrations = "../server/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_unknown_product_is_missing_reference(pool: PgPool) {
    let buyer = customer(&pool, Role::User).await;
    let ghost = NewLineItem {
        product_id: ProductId::new(987_654),
        name: "Ghost".to_string(),
        price: Decimal::from(10),
        quantity: 1,
        image: None,
    };

    let err = OrderRepository::new(&pool)
        .create(buyer.id, &[ghost], Decimal::from(10))
        .await
        .expect_err("unknown product");
    assert!(
        matches!(&err, RepositoryError::MissingReference(m) if m == "Product with ID 987654 not found"),
        "unexpected error {err:?}"
    );
}
