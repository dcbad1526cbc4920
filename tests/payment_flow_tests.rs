mod common;

use std::sync::Arc;

use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use afrozon_backend::dto::order_dto::CreateOrderRequest;
use afrozon_backend::models::auth::Actor;
use afrozon_backend::models::order::{Order, OrderStatus};
use afrozon_backend::models::payment::PaymentStatus;
use afrozon_backend::models::pricing::PaymentType;
use afrozon_backend::repositories::OrderStore;
use afrozon_backend::services::IdentifierKind;
use afrozon_backend::utils::errors::AppError;

use common::{listing, synced_vehicle, FailingRate, TestApp, VIN_A};

async fn order_awaiting_deposit(app: &TestApp) -> (Order, Uuid) {
    let customer = app.customer_with_address().await;
    let vehicle_id = app
        .vehicles
        .seed(synced_vehicle(&listing(VIN_A, "Toyota", "Camry", dec!(20000)), Utc::now()))
        .await;
    let order = app
        .state
        .orders
        .create_order(
            CreateOrderRequest {
                vehicle_id: vehicle_id.to_string(),
                identifier_kind: IdentifierKind::Id,
                shipping_method: None,
                customer_notes: None,
            },
            &Actor::customer(customer),
        )
        .await
        .unwrap();

    let admin = Actor::admin(Uuid::new_v4());
    for status in [
        OrderStatus::QuoteSent,
        OrderStatus::QuoteAccepted,
        OrderStatus::DepositPending,
    ] {
        app.state.orders.update_status(order.id, status, &admin).await.unwrap();
    }
    let order = app.state.orders.get_order(order.id, &admin).await.unwrap();
    (order, customer)
}

#[tokio::test]
async fn test_deposit_payment_converts_to_local_currency() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;

    let initiation = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &Actor::customer(customer))
        .await
        .unwrap();

    let payment = initiation.payment;
    assert_eq!(payment.amount_usd, dec!(6691.50));
    assert_eq!(payment.exchange_rate, dec!(1500));
    assert_eq!(payment.amount_local, dec!(10037250.00));
    assert_eq!(payment.currency, "NGN");
    assert_eq!(payment.provider, "manual");
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.reference.starts_with("AFZPAY-"));

    // Iniciar un pago no mueve la orden
    let stored = app.state.orders.get_order(order.id, &Actor::customer(customer)).await.unwrap();
    assert_eq!(stored.status, OrderStatus::DepositPending);
}

#[tokio::test]
async fn test_payment_requires_matching_order_status() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;
    let actor = Actor::customer(customer);

    let balance = app
        .state
        .payments
        .initiate(order.id, PaymentType::Balance, &actor)
        .await;
    assert!(matches!(balance, Err(AppError::InvalidState { .. })));

    let refund = app
        .state
        .payments
        .initiate(order.id, PaymentType::Refund, &actor)
        .await;
    assert!(matches!(refund, Err(AppError::InvalidArgument(_))));

    let stranger = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &Actor::customer(Uuid::new_v4()))
        .await;
    assert!(matches!(stranger, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;
    let initiation = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &Actor::customer(customer))
        .await
        .unwrap();
    let reference = initiation.payment.reference.clone();

    let (payment, updated) = app.state.payments.complete(&reference).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.completed_at.is_some());
    assert_eq!(updated.status, OrderStatus::DepositPaid);
    assert_eq!(updated.amount_paid_usd, dec!(6691.50));
    let history_len = updated.previous_status.len();

    let (again, replayed) = app.state.payments.complete(&reference).await.unwrap();
    assert_eq!(again.id, payment.id);
    assert_eq!(replayed.status, OrderStatus::DepositPaid);
    assert_eq!(replayed.amount_paid_usd, dec!(6691.50));
    assert_eq!(replayed.previous_status.len(), history_len);

    let unknown = app.state.payments.complete("AFZPAY-missing").await;
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_balance_payment_starts_purchase() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;
    let actor = Actor::customer(customer);

    let deposit = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &actor)
        .await
        .unwrap();
    app.state.payments.complete(&deposit.payment.reference).await.unwrap();

    let admin = Actor::admin(Uuid::new_v4());
    for status in [
        OrderStatus::InspectionPending,
        OrderStatus::InspectionCompleted,
        OrderStatus::AwaitingApproval,
        OrderStatus::Approved,
    ] {
        app.state.orders.update_status(order.id, status, &admin).await.unwrap();
    }

    let balance = app
        .state
        .payments
        .initiate(order.id, PaymentType::Balance, &actor)
        .await
        .unwrap();
    assert_eq!(balance.payment.amount_usd, dec!(15613.50));

    let (_, updated) = app.state.payments.complete(&balance.payment.reference).await.unwrap();
    assert_eq!(updated.status, OrderStatus::PurchaseInProgress);
    assert_eq!(updated.amount_paid_usd, dec!(22305.00));
    assert_eq!(app.orders.list_payments(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_exchange_rate_blocks_payment() {
    let app = TestApp::with_rates(Arc::new(FailingRate));
    let (order, customer) = order_awaiting_deposit(&app).await;

    let result = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &Actor::customer(customer))
        .await;

    assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
    assert!(app.orders.list_payments(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_order_paid_in_full_accepts_no_further_charges() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;
    let actor = Actor::customer(customer);

    let full = app
        .state
        .payments
        .initiate(order.id, PaymentType::Full, &actor)
        .await
        .unwrap();
    assert_eq!(full.payment.amount_usd, dec!(22305.00));
    let (_, paid) = app.state.payments.complete(&full.payment.reference).await.unwrap();
    assert_eq!(paid.status, OrderStatus::DepositPaid);
    assert_eq!(paid.amount_paid_usd, dec!(22305.00));

    let admin = Actor::admin(Uuid::new_v4());
    for status in [
        OrderStatus::InspectionPending,
        OrderStatus::InspectionCompleted,
        OrderStatus::AwaitingApproval,
        OrderStatus::Approved,
    ] {
        app.state.orders.update_status(order.id, status, &admin).await.unwrap();
    }

    let balance = app
        .state
        .payments
        .initiate(order.id, PaymentType::Balance, &actor)
        .await;
    assert!(matches!(balance, Err(AppError::InvalidState { .. })));

    let stored = app.state.orders.get_order(order.id, &admin).await.unwrap();
    assert_eq!(stored.amount_paid_usd, dec!(22305.00));
    assert_eq!(stored.status, OrderStatus::Approved);
    assert_eq!(app.orders.list_payments(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_pending_charge_blocks_a_second_one() {
    let app = TestApp::new();
    let (order, customer) = order_awaiting_deposit(&app).await;
    let actor = Actor::customer(customer);

    let first = app
        .state
        .payments
        .initiate(order.id, PaymentType::Deposit, &actor)
        .await
        .unwrap();

    for payment_type in [PaymentType::Deposit, PaymentType::Full] {
        let again = app.state.payments.initiate(order.id, payment_type, &actor).await;
        assert!(matches!(again, Err(AppError::InvalidState { .. })), "{}", payment_type);
    }
    assert_eq!(app.orders.list_payments(order.id).await.unwrap().len(), 1);

    let (_, updated) = app.state.payments.complete(&first.payment.reference).await.unwrap();
    assert_eq!(updated.amount_paid_usd, dec!(6691.50));
}
