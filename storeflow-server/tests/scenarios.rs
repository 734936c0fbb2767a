//! End-to-end flows across stores, reservations and the prepay ledger

mod common;

use chrono::NaiveDate;
use common::{TestEnv, account};
use shared::error::ErrorCode;
use shared::models::{
    Account, PrepayCustomerCreate, ReservationInput, ReservationSource, ReservationStatus, Role,
    StoreCreate, StoreStatus, TransactionType, UNASSIGNED_STAFF_NAME, collections,
};
use storeflow_server::docstore::Query;
use storeflow_server::services::prepay::{self, DuplicatePolicy, Registration};
use storeflow_server::services::reservation;
use storeflow_server::services::stores::{CreationMail, StoreAdmin};

fn store_admin(env: &TestEnv) -> StoreAdmin {
    let root = account("root", Role::SuperAdmin, None);
    StoreAdmin::new(
        &root,
        env.access().clone(),
        env.state.functions.clone(),
        env.state.storage.clone(),
    )
    .unwrap()
}

async fn create_test_cafe(admin: &StoreAdmin) -> String {
    let input = StoreCreate {
        name: "Test Café".into(),
        business_number: "123-45-67890".into(),
        manager_email: "a@b.com".into(),
        logo_url: None,
    };
    let checks = vec![
        admin.check_name(&input.name, None).await.unwrap(),
        admin.check_business_number(&input.business_number, None).await.unwrap(),
        admin.check_manager_email(&input.manager_email, None).await.unwrap(),
    ];
    admin.create(input, &checks).await.unwrap().store_id
}

#[tokio::test]
async fn test_create_store_provisions_manager_account() {
    let env = TestEnv::new();
    let admin = store_admin(&env);

    let store_id = create_test_cafe(&admin).await;
    assert!(!store_id.is_empty());

    let store = admin.get(&store_id).await.unwrap();
    assert_eq!(store.name, "Test Café");
    assert_eq!(store.status, StoreStatus::Initial);

    let managers: Vec<Account> = env
        .access()
        .query_as(
            collections::ACCOUNTS,
            &Query::new()
                .eq("storeId", store_id.as_str())
                .eq("role", Role::StoreAdmin.as_str()),
        )
        .await
        .unwrap();
    assert_eq!(managers.len(), 1);
    assert_eq!(managers[0].email.as_deref(), Some("a@b.com"));
    assert_eq!(managers[0].store_id.as_deref(), Some(store_id.as_str()));

    let sent = env.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@b.com");
}

#[tokio::test]
async fn test_activation_notifies_once() {
    let env = TestEnv::new();
    let admin = store_admin(&env);
    let store_id = create_test_cafe(&admin).await;

    let change = admin.set_status(&store_id, StoreStatus::Active).await.unwrap();
    assert_eq!(change.store.status, StoreStatus::Active);
    assert!(matches!(change.creation_mail, CreationMail::Sent));

    let before = admin.get(&store_id).await.unwrap();
    let err = admin.set_status(&store_id, StoreStatus::Active).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StoreStatusLocked);
    assert_eq!(admin.get(&store_id).await.unwrap(), before);

    let creation_mails = env
        .mailer
        .sent()
        .iter()
        .filter(|m| m.subject.contains("매장 생성 완료"))
        .count();
    assert_eq!(creation_mails, 1);
}

#[tokio::test]
async fn test_staff_reservation_is_pending_and_unassigned() {
    let env = TestEnv::new();
    env.seed_store("A").await;
    let staff = env.context(Role::Staff, "A").await;

    let created = reservation::create(
        &staff,
        ReservationInput {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            hour: 19,
            minute: 30,
            customer_name: "Park".into(),
            phone: "010-2222-3333".into(),
            guest_count: Some(4),
            source: ReservationSource::Naver,
            staff_id: Some("admin-A".into()),
            staff_name: Some("Admin".into()),
            status: Some(ReservationStatus::Completed),
            notes: None,
        },
    )
    .await
    .unwrap();

    let stored: shared::models::Reservation = staff
        .scope
        .require(collections::RESERVATIONS, &created.id, ErrorCode::ReservationNotFound)
        .await
        .unwrap();
    assert_eq!(stored.status, ReservationStatus::Pending);
    assert_eq!(stored.staff_name, UNASSIGNED_STAFF_NAME);
    assert_eq!(stored.staff_id, None);
    assert_eq!(stored.store_id, "A");
}

#[tokio::test]
async fn test_overdraw_then_valid_deduct() {
    let env = TestEnv::new();
    env.seed_store("A").await;
    let ctx = env.context(Role::Staff, "A").await;

    let customer = prepay::register(
        &ctx,
        PrepayCustomerCreate {
            name: "Kim".into(),
            phone: "010-1234-5678".into(),
            initial_balance: 1000,
        },
        DuplicatePolicy::Abort,
    )
    .await
    .unwrap()
    .customer()
    .clone();
    let rows_before = prepay::history(&ctx, &customer.id).await.unwrap().len();

    let err = prepay::deduct(&ctx, &customer.id, 1500, "R-1").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InsufficientBalance);
    let customers = prepay::list_customers(&ctx).await.unwrap();
    assert_eq!(customers[0].balance, 1000);
    assert_eq!(prepay::history(&ctx, &customer.id).await.unwrap().len(), rows_before);

    let row = prepay::deduct(&ctx, &customer.id, 600, "R-2").await.unwrap();
    assert_eq!(row.kind, TransactionType::Deduct);
    assert_eq!(row.amount, 600);
    assert_eq!(row.balance, 400);
    assert_eq!(prepay::list_customers(&ctx).await.unwrap()[0].balance, 400);

    let history = prepay::history(&ctx, &customer.id).await.unwrap();
    assert_eq!(history.len(), rows_before + 1);
    let deducts: Vec<_> = history
        .iter()
        .filter(|r| r.kind == TransactionType::Deduct)
        .collect();
    assert_eq!(deducts.len(), 1);
    assert_eq!(deducts[0].balance, 400);
}

#[tokio::test]
async fn test_same_phone_in_other_store_is_not_a_duplicate() {
    let env = TestEnv::new();
    env.seed_store("A").await;
    env.seed_store("B").await;
    let a = env.context(Role::StoreAdmin, "A").await;
    let b = env.context(Role::StoreAdmin, "B").await;

    let input = || PrepayCustomerCreate {
        name: "Kim".into(),
        phone: "010-5555-6666".into(),
        initial_balance: 10_000,
    };
    let first = prepay::register(&a, input(), DuplicatePolicy::Abort).await.unwrap();
    let second = prepay::register(&b, input(), DuplicatePolicy::Abort).await.unwrap();
    assert!(matches!(first, Registration::Created(_)));
    assert!(matches!(second, Registration::Created(_)));
    assert_ne!(first.customer().id, second.customer().id);

    assert_eq!(prepay::list_customers(&a).await.unwrap().len(), 1);
    assert_eq!(prepay::list_customers(&b).await.unwrap().len(), 1);

    // Store A's customer stays invisible to B
    let err = prepay::history(&b, &first.customer().id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CrossTenantAccess);
}
