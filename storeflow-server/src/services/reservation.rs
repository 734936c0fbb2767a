//! Reservation Domain Service
//!
//! ```text
//!            ┌──► completed ─┐
//!  pending ──┼──► cancelled ─┼──► (admin only: any other status)
//!            └──► noShow ────┘
//! ```
//!
//! New reservations always start `pending`. Staff may only book (unassigned)
//! and close a pending reservation; reopening or changing a closed one needs
//! `can_override_reservation_status`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use tokio::sync::watch;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{
    Account, CustomerStats, Feature, Reservation, ReservationInput, ReservationStatus,
    UNASSIGNED_STAFF_NAME, collections,
};
use shared::util::{day_millis, day_time_millis, millis_to_date, month_bounds, now_millis};

use super::ServiceContext;
use crate::auth::Capability;
use crate::docstore::{Direction, FilterOp, Query, StoreResult, Subscription, SubscriptionSet, encode};
use crate::utils::validation::{
    MAX_GUEST_COUNT, MAX_NAME_LEN, MAX_NOTE_LEN, validate_optional_text, validate_phone,
    validate_range, validate_required_text,
};

/// Validated, normalized form input
struct Booking {
    date: i64,
    start_time: i64,
    customer_name: String,
    phone: String,
    guest_count: u32,
}

fn validate_input(input: &ReservationInput) -> AppResult<Booking> {
    validate_required_text(&input.customer_name, "customerName", MAX_NAME_LEN)?;
    validate_optional_text(&input.notes, "notes", MAX_NOTE_LEN)?;
    let phone = validate_phone(&input.phone)?;
    let guest_count = input.guest_count.unwrap_or(1);
    validate_range(guest_count, "guestCount", 1, MAX_GUEST_COUNT)?;
    let start_time = day_time_millis(input.date, input.hour, input.minute).ok_or_else(|| {
        AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("Invalid time {:02}:{:02}", input.hour, input.minute),
        )
    })?;
    Ok(Booking {
        date: day_millis(input.date),
        start_time,
        customer_name: input.customer_name.trim().to_string(),
        phone,
        guest_count,
    })
}

/// Resolve `(staffId, staffName)` for an admin's pick. No pick → unassigned.
async fn assigned_staff(ctx: &ServiceContext, staff_id: Option<&str>) -> AppResult<(Option<String>, String)> {
    let Some(staff_id) = staff_id.filter(|s| !s.is_empty()) else {
        return Ok((None, UNASSIGNED_STAFF_NAME.to_string()));
    };
    let account: Account = ctx
        .scope
        .require(collections::ACCOUNTS, staff_id, ErrorCode::AccountNotFound)
        .await?;
    Ok((Some(account.id.clone()), account.display_name().to_string()))
}

/// Whether `ctx` may move a reservation from `current` to `next`
fn check_transition(ctx: &ServiceContext, current: ReservationStatus, next: ReservationStatus) -> AppResult<()> {
    if ctx.caps.can_override_reservation_status || current == next {
        return Ok(());
    }
    if current.is_terminal() {
        return Err(AppError::new(ErrorCode::ReservationLocked).with_detail("status", current.as_str()));
    }
    if !next.is_terminal() {
        return Err(AppError::new(ErrorCode::InvalidStatusTransition)
            .with_detail("from", current.as_str())
            .with_detail("to", next.as_str()));
    }
    Ok(())
}

fn check_editable(ctx: &ServiceContext, current: &Reservation) -> AppResult<()> {
    if current.status.is_terminal() && !ctx.caps.can_override_reservation_status {
        return Err(AppError::new(ErrorCode::ReservationLocked)
            .with_detail("id", current.id.clone())
            .with_detail("status", current.status.as_str()));
    }
    Ok(())
}

async fn load(ctx: &ServiceContext, id: &str) -> AppResult<Reservation> {
    ctx.scope
        .require(collections::RESERVATIONS, id, ErrorCode::ReservationNotFound)
        .await
}

pub async fn create(ctx: &ServiceContext, input: ReservationInput) -> AppResult<Reservation> {
    ctx.require(Capability::EditReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let booking = validate_input(&input)?;

    let (staff_id, staff_name) = if ctx.caps.can_assign_reservation_staff {
        assigned_staff(ctx, input.staff_id.as_deref()).await?
    } else {
        (None, UNASSIGNED_STAFF_NAME.to_string())
    };

    let now = now_millis();
    let mut reservation = Reservation {
        id: String::new(),
        store_id: ctx.store_id().to_string(),
        date: booking.date,
        start_time: booking.start_time,
        customer_name: booking.customer_name,
        phone: booking.phone,
        guest_count: booking.guest_count,
        source: input.source,
        staff_id,
        staff_name,
        created_by: ctx.actor_id().to_string(),
        created_by_name: ctx.actor_name().to_string(),
        status: ReservationStatus::Pending,
        notes: input.notes.filter(|n| !n.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };
    reservation.id = ctx.scope.create_as(collections::RESERVATIONS, &reservation).await?;

    tracing::info!(
        store_id = %ctx.store_id(),
        reservation_id = %reservation.id,
        created_by = %reservation.created_by,
        "Reservation created"
    );
    Ok(reservation)
}

/// Edit a reservation. A staff edit keeps the status and the current staff
/// assignment whatever the form says.
pub async fn update(ctx: &ServiceContext, id: &str, input: ReservationInput) -> AppResult<Reservation> {
    ctx.require(Capability::EditReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let current = load(ctx, id).await?;
    check_editable(ctx, &current)?;
    let booking = validate_input(&input)?;

    let mut next = current.clone();
    next.date = booking.date;
    next.start_time = booking.start_time;
    next.customer_name = booking.customer_name;
    next.phone = booking.phone;
    next.guest_count = booking.guest_count;
    next.source = input.source;
    next.notes = input.notes.filter(|n| !n.trim().is_empty());

    if ctx.caps.can_assign_reservation_staff {
        let (staff_id, staff_name) = assigned_staff(ctx, input.staff_id.as_deref()).await?;
        next.staff_id = staff_id;
        next.staff_name = staff_name;
    }
    if ctx.caps.can_override_reservation_status
        && let Some(status) = input.status
    {
        next.status = status;
    }

    let mut patch = encode(&next)?;
    if next.notes.is_none() {
        patch.insert("notes".into(), Value::Null);
    }
    ctx.scope.update(collections::RESERVATIONS, id, patch).await?;

    tracing::info!(store_id = %ctx.store_id(), reservation_id = id, "Reservation updated");
    next.updated_at = now_millis();
    Ok(next)
}

pub async fn set_status(ctx: &ServiceContext, id: &str, status: ReservationStatus) -> AppResult<Reservation> {
    ctx.require(Capability::EditReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let mut current = load(ctx, id).await?;
    check_transition(ctx, current.status, status)?;
    if current.status == status {
        return Ok(current);
    }

    let mut patch = Map::new();
    patch.insert("status".into(), json!(status));
    ctx.scope.update(collections::RESERVATIONS, id, patch).await?;

    tracing::info!(
        store_id = %ctx.store_id(),
        reservation_id = id,
        from = current.status.as_str(),
        to = status.as_str(),
        "Reservation status changed"
    );
    current.status = status;
    Ok(current)
}

/// Delete. Closed reservations can only be removed by an admin.
pub async fn delete(ctx: &ServiceContext, id: &str) -> AppResult<()> {
    ctx.require(Capability::EditReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let current = load(ctx, id).await?;
    check_editable(ctx, &current)?;
    ctx.scope.delete(collections::RESERVATIONS, id).await?;
    tracing::info!(store_id = %ctx.store_id(), reservation_id = id, "Reservation deleted");
    Ok(())
}

// ========== Views ==========

/// Day list order: pending first, then the rest; each group by start time
pub fn sort_day(reservations: &mut [Reservation]) {
    reservations.sort_by_key(|r| (r.status != ReservationStatus::Pending, r.start_time, r.id.clone()));
}

fn day_query(date: NaiveDate) -> Query {
    Query::new().eq("date", day_millis(date))
}

fn month_query(date: NaiveDate) -> AppResult<Query> {
    let (first, last) =
        month_bounds(date).ok_or_else(|| AppError::validation(format!("Invalid month for {date}")))?;
    Ok(Query::new()
        .filter("date", FilterOp::Ge, first)
        .filter("date", FilterOp::Le, last)
        .order_by("date", Direction::Asc))
}

/// Days of the month with at least one reservation, any status
pub fn active_days(reservations: &[Reservation]) -> BTreeSet<NaiveDate> {
    reservations.iter().filter_map(|r| millis_to_date(r.date)).collect()
}

pub async fn day_list(ctx: &ServiceContext, date: NaiveDate) -> AppResult<Vec<Reservation>> {
    ctx.require(Capability::ViewReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let mut list: Vec<Reservation> = ctx.scope.query_as(collections::RESERVATIONS, day_query(date)).await?;
    sort_day(&mut list);
    Ok(list)
}

pub async fn month_activity(ctx: &ServiceContext, month: NaiveDate) -> AppResult<BTreeSet<NaiveDate>> {
    ctx.require(Capability::ViewReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    let list: Vec<Reservation> = ctx.scope.query_as(collections::RESERVATIONS, month_query(month)?).await?;
    Ok(active_days(&list))
}

/// Visit counts for one phone number across the store
pub async fn customer_stats(ctx: &ServiceContext, phone: &str) -> AppResult<CustomerStats> {
    ctx.require(Capability::ViewReservations)?;
    let phone = validate_phone(phone)?;
    let list: Vec<Reservation> = ctx
        .scope
        .query_as(collections::RESERVATIONS, Query::new().eq("phone", phone))
        .await?;
    Ok(CustomerStats {
        total: list.len() as u32,
        completed: list
            .iter()
            .filter(|r| r.status == ReservationStatus::Completed)
            .count() as u32,
    })
}

/// Live day list, already sorted
pub fn subscribe_day<F>(ctx: &ServiceContext, date: NaiveDate, mut on_change: F) -> AppResult<Subscription>
where
    F: FnMut(StoreResult<Vec<Reservation>>) + Send + 'static,
{
    ctx.require(Capability::ViewReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    Ok(ctx
        .scope
        .subscribe_as(collections::RESERVATIONS, day_query(date), move |result| {
            on_change(result.map(|mut list: Vec<Reservation>| {
                sort_day(&mut list);
                list
            }));
        }))
}

/// Live month range (for the calendar)
pub fn subscribe_month<F>(ctx: &ServiceContext, month: NaiveDate, on_change: F) -> AppResult<Subscription>
where
    F: FnMut(StoreResult<Vec<Reservation>>) + Send + 'static,
{
    ctx.require(Capability::ViewReservations)?;
    ctx.require_feature(Feature::Reservations)?;
    Ok(ctx
        .scope
        .subscribe_as(collections::RESERVATIONS, month_query(month)?, on_change))
}

/// Snapshot published by [`ReservationBoard`]
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub date: Option<NaiveDate>,
    pub day: Vec<Reservation>,
    pub active_days: BTreeSet<NaiveDate>,
    pub error: Option<AppError>,
}

/// Writes into the board snapshot on behalf of one date selection. Once a
/// newer selection exists every publish is dropped.
#[derive(Clone)]
struct BoardPublisher {
    generation: u64,
    current: Arc<AtomicU64>,
    snapshot: Arc<watch::Sender<BoardSnapshot>>,
}

impl BoardPublisher {
    /// Checked under the snapshot lock, so a selection change cannot slip
    /// in between the check and the write
    fn publish(&self, apply: impl FnOnce(&mut BoardSnapshot)) -> bool {
        self.snapshot.send_if_modified(|s| {
            if self.current.load(Ordering::Acquire) != self.generation {
                return false;
            }
            apply(s);
            true
        })
    }
}

/// Reservation page view: the selected day's list plus the month's active
/// days, both live. Selecting another date tears down every subscription
/// before opening the new ones.
pub struct ReservationBoard {
    ctx: ServiceContext,
    subscriptions: SubscriptionSet,
    generation: Arc<AtomicU64>,
    snapshot: Arc<watch::Sender<BoardSnapshot>>,
}

impl ReservationBoard {
    pub fn new(ctx: ServiceContext) -> Self {
        let (snapshot, _) = watch::channel(BoardSnapshot::default());
        Self {
            ctx,
            subscriptions: SubscriptionSet::new(),
            generation: Arc::new(AtomicU64::new(0)),
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn watch(&self) -> watch::Receiver<BoardSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    fn publisher(&self) -> BoardPublisher {
        BoardPublisher {
            generation: self.generation.load(Ordering::Acquire),
            current: Arc::clone(&self.generation),
            snapshot: Arc::clone(&self.snapshot),
        }
    }

    pub fn select_date(&mut self, date: NaiveDate) -> AppResult<()> {
        self.subscriptions.clear();
        self.snapshot.send_modify(|s| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *s = BoardSnapshot {
                date: Some(date),
                ..BoardSnapshot::default()
            };
        });

        let publisher = self.publisher();
        let day = subscribe_day(&self.ctx, date, move |result| {
            publisher.publish(|s| match result {
                Ok(list) => s.day = list,
                Err(e) => s.error = Some(e.into()),
            });
        })?;
        self.subscriptions.push(day);

        let publisher = self.publisher();
        let month = subscribe_month(&self.ctx, date, move |result| {
            publisher.publish(|s| match result {
                Ok(list) => s.active_days = active_days(&list),
                Err(e) => s.error = Some(e.into()),
            });
        })?;
        self.subscriptions.push(month);
        Ok(())
    }

    pub fn close(&mut self) {
        self.subscriptions.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::*;
    use crate::docstore::{ChangeEvent, Document, DocumentAccess, DocumentStore, MemoryStore, WriteBatch};
    use shared::models::{ReservationSource, Role};
    use std::time::Duration;

    fn reservation_stub(name: &str, date: NaiveDate) -> Reservation {
        Reservation {
            id: name.into(),
            store_id: "A".into(),
            date: day_millis(date),
            start_time: day_millis(date),
            customer_name: name.into(),
            phone: "01011112222".into(),
            guest_count: 2,
            source: ReservationSource::Phone,
            staff_id: None,
            staff_name: UNASSIGNED_STAFF_NAME.into(),
            created_by: "u".into(),
            created_by_name: "U".into(),
            status: ReservationStatus::Pending,
            notes: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn input(day: u32, hour: u32, name: &str) -> ReservationInput {
        ReservationInput {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            hour,
            minute: 0,
            customer_name: name.into(),
            phone: "010-1111-2222".into(),
            guest_count: Some(2),
            source: ReservationSource::Phone,
            staff_id: None,
            staff_name: None,
            status: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_staff_booking_is_pending_and_unassigned() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let staff = context(&access, Role::Staff, "A").await;

        let mut form = input(3, 18, "Lee");
        form.staff_id = Some("someone".into());
        form.status = Some(ReservationStatus::Completed);
        let r = create(&staff, form).await.unwrap();

        assert_eq!(r.status, ReservationStatus::Pending);
        assert_eq!(r.staff_id, None);
        assert_eq!(r.staff_name, UNASSIGNED_STAFF_NAME);
        assert_eq!(r.created_by, "staff-A");
        assert_eq!(r.phone, "01011112222");

        let stored = day_list(&staff, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].created_at > 0);
    }

    #[tokio::test]
    async fn test_admin_assigns_staff_by_account() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        access
            .create(
                "accounts",
                json!({"role": "staff", "username": "kim", "name": "", "storeId": "A"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                Some("k1"),
            )
            .await
            .unwrap();
        let admin = context(&access, Role::StoreAdmin, "A").await;

        let mut form = input(3, 18, "Lee");
        form.staff_id = Some("k1".into());
        let r = create(&admin, form).await.unwrap();
        assert_eq!(r.staff_id.as_deref(), Some("k1"));
        assert_eq!(r.staff_name, "kim");
    }

    #[tokio::test]
    async fn test_staff_cannot_touch_closed_reservation() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let staff = context(&access, Role::Staff, "A").await;
        let admin = context(&access, Role::StoreAdmin, "A").await;
        let r = create(&staff, input(3, 18, "Lee")).await.unwrap();

        set_status(&staff, &r.id, ReservationStatus::NoShow).await.unwrap();
        let err = set_status(&staff, &r.id, ReservationStatus::Completed)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservationLocked);
        let err = delete(&staff, &r.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservationLocked);
        let err = update(&staff, &r.id, input(4, 12, "Lee")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReservationLocked);

        // Admin may reopen
        let reopened = set_status(&admin, &r.id, ReservationStatus::Pending).await.unwrap();
        assert_eq!(reopened.status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn test_staff_edit_keeps_status_and_assignment() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let staff = context(&access, Role::Staff, "A").await;
        let r = create(&staff, input(3, 18, "Lee")).await.unwrap();

        let mut form = input(3, 19, "Lee Minho");
        form.status = Some(ReservationStatus::Cancelled);
        form.staff_id = Some("x".into());
        let edited = update(&staff, &r.id, form).await.unwrap();
        assert_eq!(edited.status, ReservationStatus::Pending);
        assert_eq!(edited.staff_name, UNASSIGNED_STAFF_NAME);
        assert_eq!(edited.customer_name, "Lee Minho");
        assert_eq!(edited.created_at, r.created_at);
    }

    #[tokio::test]
    async fn test_day_order_and_month_activity() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        let late = create(&ctx, input(3, 20, "late")).await.unwrap();
        let early = create(&ctx, input(3, 11, "early")).await.unwrap();
        let done = create(&ctx, input(3, 9, "done")).await.unwrap();
        set_status(&ctx, &done.id, ReservationStatus::Completed).await.unwrap();
        create(&ctx, input(17, 12, "other day")).await.unwrap();

        let day = day_list(&ctx, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap())
            .await
            .unwrap();
        let ids: Vec<_> = day.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![early.id.as_str(), late.id.as_str(), done.id.as_str()]);

        // Range query on date has no index here; served through degradation
        let days = month_activity(&ctx, NaiveDate::from_ymd_opt(2024, 5, 20).unwrap())
            .await
            .unwrap();
        let days: Vec<u32> = days.iter().map(|d| chrono::Datelike::day(d)).collect();
        assert_eq!(days, vec![3, 17]);

        let stats = customer_stats(&ctx, "01011112222").await.unwrap();
        assert_eq!(stats, CustomerStats { total: 4, completed: 1 });
    }

    #[tokio::test]
    async fn test_disabled_feature_blocks_writes() {
        let access = access();
        seed_store(&access, "A", json!({"reservations": true})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        let err = create(&ctx, input(3, 18, "Lee")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::FeatureDisabled);
    }

    #[tokio::test]
    async fn test_board_rescopes_on_date_change() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        create(&ctx, input(3, 18, "a")).await.unwrap();
        create(&ctx, input(4, 18, "b")).await.unwrap();

        let mut board = ReservationBoard::new(ctx.clone());
        let mut rx = board.watch();
        board.select_date(NaiveDate::from_ymd_opt(2024, 5, 3).unwrap()).unwrap();
        assert_eq!(board.active_subscriptions(), 2);

        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                let s = rx.borrow().clone();
                if s.day.len() == 1 && s.active_days.len() == 2 {
                    return s;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(seen.day[0].customer_name, "a");

        board.select_date(NaiveDate::from_ymd_opt(2024, 5, 4).unwrap()).unwrap();
        assert_eq!(board.active_subscriptions(), 2);
        let seen = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let s = rx.borrow_and_update().clone();
                if s.day.len() == 1 && s.day[0].customer_name == "b" {
                    return s;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(seen.date, NaiveDate::from_ymd_opt(2024, 5, 4));

        board.close();
        assert_eq!(board.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_superseded_selection_cannot_publish() {
        let access = access();
        seed_store(&access, "A", json!({})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        let d3 = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let d4 = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();

        let mut board = ReservationBoard::new(ctx);
        board.select_date(d3).unwrap();
        let stale = board.publisher();
        board.select_date(d4).unwrap();

        let late = reservation_stub("late", d3);
        assert!(!stale.publish(|s| s.day = vec![late]));
        let snapshot = board.snapshot();
        assert_eq!(snapshot.date, Some(d4));
        assert!(snapshot.day.iter().all(|r| r.customer_name != "late"));

        assert!(board.publisher().publish(|s| s.error = None));
        board.close();
    }

    /// Memory store whose queries take `delay_ms` to answer
    struct SlowStore {
        inner: MemoryStore,
        delay_ms: AtomicU64,
    }

    #[async_trait::async_trait]
    impl DocumentStore for SlowStore {
        async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
            self.inner.get(collection, id).await
        }

        async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.inner.query(collection, query).await
        }

        async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
            self.inner.commit(batch).await
        }

        fn changes(&self) -> tokio::sync::broadcast::Receiver<ChangeEvent> {
            self.inner.changes()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_date_switch_during_slow_query_shows_only_new_day() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::without_index_checks(),
            delay_ms: AtomicU64::new(0),
        });
        let access = DocumentAccess::new(store.clone());
        seed_store(&access, "A", json!({})).await;
        let ctx = context(&access, Role::StoreAdmin, "A").await;
        create(&ctx, input(3, 18, "a")).await.unwrap();
        create(&ctx, input(4, 18, "b")).await.unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        let d4 = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();

        let mut board = ReservationBoard::new(ctx);
        store.delay_ms.store(300, Ordering::SeqCst);
        board.select_date(d3).unwrap();
        // Let the first selection's queries start
        tokio::time::sleep(Duration::from_millis(50)).await;
        store.delay_ms.store(0, Ordering::SeqCst);
        board.select_date(d4).unwrap();

        // Outlive the first selection's queries
        tokio::time::sleep(Duration::from_millis(600)).await;
        let snapshot = board.snapshot();
        assert_eq!(snapshot.date, Some(d4));
        let names: Vec<_> = snapshot.day.iter().map(|r| r.customer_name.as_str()).collect();
        assert_eq!(names, ["b"]);
        assert_eq!(snapshot.active_days.len(), 2);
        board.close();
    }
}
