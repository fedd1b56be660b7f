use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use crate::models::{
    AddOnLine, Booking, BookingStatus, Combo, CustomerSnapshot, MenuItem, PaymentEventRecord,
    PaymentStatus, Resource,
};
use crate::services::pricing::PriceBreakdown;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Must list exactly `BookingStatus::ACTIVE`.
const ACTIVE_STATUSES_SQL: &str = "('pending', 'confirmed', 'checked-in')";

pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

// ── Reference catalog ──

pub fn get_resource(conn: &Connection, id: &str) -> anyhow::Result<Option<Resource>> {
    let resource = conn
        .query_row(
            "SELECT id, location_id, name, hourly_rate, is_active FROM resources WHERE id = ?1",
            params![id],
            |row| {
                Ok(Resource {
                    id: row.get(0)?,
                    location_id: row.get(1)?,
                    name: row.get(2)?,
                    hourly_rate: row.get(3)?,
                    is_active: row.get::<_, i32>(4)? != 0,
                })
            },
        )
        .optional()?;
    Ok(resource)
}

pub fn get_combo(conn: &Connection, id: &str) -> anyhow::Result<Option<Combo>> {
    let combo = conn
        .query_row(
            "SELECT id, name, duration_minutes, price, is_active FROM combos WHERE id = ?1",
            params![id],
            |row| {
                Ok(Combo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    duration_minutes: row.get(2)?,
                    price: row.get(3)?,
                    is_active: row.get::<_, i32>(4)? != 0,
                })
            },
        )
        .optional()?;
    Ok(combo)
}

pub fn get_menu_item(conn: &Connection, id: &str) -> anyhow::Result<Option<MenuItem>> {
    let item = conn
        .query_row(
            "SELECT id, name, price, is_active FROM menu_items WHERE id = ?1",
            params![id],
            |row| {
                Ok(MenuItem {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price: row.get(2)?,
                    is_active: row.get::<_, i32>(3)? != 0,
                })
            },
        )
        .optional()?;
    Ok(item)
}

pub fn upsert_resource(conn: &Connection, resource: &Resource) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO resources (id, location_id, name, hourly_rate, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           location_id = excluded.location_id,
           name = excluded.name,
           hourly_rate = excluded.hourly_rate,
           is_active = excluded.is_active",
        params![
            resource.id,
            resource.location_id,
            resource.name,
            resource.hourly_rate,
            resource.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn upsert_combo(conn: &Connection, combo: &Combo) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO combos (id, name, duration_minutes, price, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           duration_minutes = excluded.duration_minutes,
           price = excluded.price,
           is_active = excluded.is_active",
        params![
            combo.id,
            combo.name,
            combo.duration_minutes,
            combo.price,
            combo.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn upsert_menu_item(conn: &Connection, item: &MenuItem) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO menu_items (id, name, price, is_active)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           price = excluded.price,
           is_active = excluded.is_active",
        params![item.id, item.name, item.price, item.is_active as i32],
    )?;
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, booking_code, resource_id, location_id, start_time, end_time, booking_date, \
     customer_name, customer_phone, customer_email, customer_national_id, combo_id, add_ons, \
     resource_subtotal, add_on_subtotal, subtotal, tax, discount, total, status, payment_status, \
     payment_method, payment_transaction_id, paid_at, notes, check_in_time, check_out_time, \
     cancelled_at, cancel_reason, created_at, updated_at";

/// An active booking occupying part of a requested interval.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictingBooking {
    pub id: String,
    pub booking_code: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Conflict(ConflictingBooking),
    DuplicateCode,
}

/// Active booking on `resource_id` overlapping `[start, end)`, if any.
/// Intervals are half-open: one ending at T does not clash with one starting at T.
pub fn find_conflict(
    conn: &Connection,
    resource_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    exclude_id: Option<&str>,
) -> anyhow::Result<Option<ConflictingBooking>> {
    let sql = format!(
        "SELECT id, booking_code, start_time, end_time FROM bookings
         WHERE resource_id = ?1 AND status IN {ACTIVE_STATUSES_SQL}
           AND start_time < ?3 AND end_time > ?2
           AND (?4 IS NULL OR id != ?4)
         ORDER BY start_time ASC LIMIT 1"
    );
    let row = conn
        .query_row(
            &sql,
            params![resource_id, fmt_ts(start), fmt_ts(end), exclude_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, booking_code, start_time, end_time)) => Ok(Some(ConflictingBooking {
            id,
            booking_code,
            start_time: parse_ts(&start_time)?,
            end_time: parse_ts(&end_time)?,
        })),
        None => Ok(None),
    }
}

/// Insert `booking` unless an active booking on the same room overlaps it.
///
/// The overlap test is part of the INSERT itself and runs inside an
/// IMMEDIATE transaction, so two writers can never both observe a free slot.
pub fn insert_booking_if_free(conn: &mut Connection, booking: &Booking) -> anyhow::Result<InsertOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let add_ons = serde_json::to_string(&booking.add_ons)?;
    let sql = format!(
        "INSERT INTO bookings ({BOOKING_COLUMNS})
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31
         WHERE NOT EXISTS (
             SELECT 1 FROM bookings
             WHERE resource_id = ?3 AND status IN {ACTIVE_STATUSES_SQL}
               AND start_time < ?6 AND end_time > ?5
         )"
    );
    let p = &booking.pricing;
    let result = tx.execute(
        &sql,
        params![
            booking.id,
            booking.booking_code,
            booking.resource_id,
            booking.location_id,
            fmt_ts(&booking.start_time),
            fmt_ts(&booking.end_time),
            booking.booking_date.format(DATE_FORMAT).to_string(),
            booking.customer.name,
            booking.customer.phone,
            booking.customer.email,
            booking.customer.national_id,
            booking.combo_id,
            add_ons,
            p.resource_subtotal,
            p.add_on_subtotal,
            p.subtotal,
            p.tax,
            p.discount,
            p.total,
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_method,
            booking.payment_transaction_id,
            booking.paid_at.as_ref().map(fmt_ts),
            booking.notes,
            booking.check_in_time.as_ref().map(fmt_ts),
            booking.check_out_time.as_ref().map(fmt_ts),
            booking.cancelled_at.as_ref().map(fmt_ts),
            booking.cancel_reason,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    );

    let inserted = match result {
        Ok(n) => n,
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            return Ok(InsertOutcome::DuplicateCode);
        }
        Err(e) => return Err(e.into()),
    };

    if inserted == 0 {
        let conflict = find_conflict(
            &tx,
            &booking.resource_id,
            &booking.start_time,
            &booking.end_time,
            None,
        )?
        .context("insert was refused but no conflicting booking was found")?;
        return Ok(InsertOutcome::Conflict(conflict));
    }

    tx.commit()?;
    Ok(InsertOutcome::Inserted)
}

/// Write every mutable column of `booking`, but only if the stored row still
/// has the status and payment status the caller based its decision on.
/// Returns false when another writer got there first.
pub fn update_booking_guarded(
    conn: &Connection,
    booking: &Booking,
    expected_status: BookingStatus,
    expected_payment_status: PaymentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           start_time = ?1, end_time = ?2, booking_date = ?3,
           status = ?4, payment_status = ?5, payment_method = ?6,
           payment_transaction_id = ?7, paid_at = ?8, notes = ?9,
           check_in_time = ?10, check_out_time = ?11,
           cancelled_at = ?12, cancel_reason = ?13, updated_at = ?14
         WHERE id = ?15 AND status = ?16 AND payment_status = ?17",
        params![
            fmt_ts(&booking.start_time),
            fmt_ts(&booking.end_time),
            booking.booking_date.format(DATE_FORMAT).to_string(),
            booking.status.as_str(),
            booking.payment_status.as_str(),
            booking.payment_method,
            booking.payment_transaction_id,
            booking.paid_at.as_ref().map(fmt_ts),
            booking.notes,
            booking.check_in_time.as_ref().map(fmt_ts),
            booking.check_out_time.as_ref().map(fmt_ts),
            booking.cancelled_at.as_ref().map(fmt_ts),
            booking.cancel_reason,
            fmt_ts(&booking.updated_at),
            booking.id,
            expected_status.as_str(),
            expected_payment_status.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    get_booking_where(conn, "id = ?1", id)
}

pub fn get_booking_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Booking>> {
    get_booking_where(conn, "booking_code = ?1", &code.to_ascii_uppercase())
}

fn get_booking_where(conn: &Connection, condition: &str, value: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE {condition}");
    let result = conn
        .query_row(&sql, params![value], |row| Ok(parse_booking_row(row)))
        .optional()?;
    result.transpose()
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    date: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR booking_date = ?2)
         ORDER BY start_time DESC LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            status.map(|s| s.as_str()),
            date.map(|d| d.format(DATE_FORMAT).to_string()),
            limit
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Pending, unpaid bookings created before `created_before`, oldest first.
pub fn list_expired_unpaid(
    conn: &Connection,
    created_before: &DateTime<Utc>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE status = 'pending' AND payment_status = 'unpaid' AND created_at < ?1
         ORDER BY created_at ASC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![fmt_ts(created_before), limit], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get("status")?;
    let payment_status_str: String = row.get("payment_status")?;
    let booking_date_str: String = row.get("booking_date")?;
    let add_ons_json: String = row.get("add_ons")?;

    let add_ons: Vec<AddOnLine> =
        serde_json::from_str(&add_ons_json).context("invalid add_ons column")?;

    Ok(Booking {
        id: row.get("id")?,
        booking_code: row.get("booking_code")?,
        resource_id: row.get("resource_id")?,
        location_id: row.get("location_id")?,
        start_time: parse_ts(&row.get::<_, String>("start_time")?)?,
        end_time: parse_ts(&row.get::<_, String>("end_time")?)?,
        booking_date: NaiveDate::parse_from_str(&booking_date_str, DATE_FORMAT)
            .with_context(|| format!("invalid booking_date: {booking_date_str}"))?,
        customer: CustomerSnapshot {
            name: row.get("customer_name")?,
            phone: row.get("customer_phone")?,
            email: row.get("customer_email")?,
            national_id: row.get("customer_national_id")?,
        },
        combo_id: row.get("combo_id")?,
        add_ons,
        pricing: PriceBreakdown {
            resource_subtotal: row.get("resource_subtotal")?,
            add_on_subtotal: row.get("add_on_subtotal")?,
            subtotal: row.get("subtotal")?,
            tax: row.get("tax")?,
            discount: row.get("discount")?,
            total: row.get("total")?,
        },
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        payment_status: PaymentStatus::parse(&payment_status_str)
            .with_context(|| format!("unknown payment status: {payment_status_str}"))?,
        payment_method: row.get("payment_method")?,
        payment_transaction_id: row.get("payment_transaction_id")?,
        paid_at: parse_opt_ts(row.get("paid_at")?)?,
        notes: row.get("notes")?,
        check_in_time: parse_opt_ts(row.get("check_in_time")?)?,
        check_out_time: parse_opt_ts(row.get("check_out_time")?)?,
        cancelled_at: parse_opt_ts(row.get("cancelled_at")?)?,
        cancel_reason: row.get("cancel_reason")?,
        created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
    })
}

// ── Payment ledger ──

pub struct NewPaymentEvent<'a> {
    pub channel: &'a str,
    pub booking_ref: Option<&'a str>,
    pub booking_id: Option<&'a str>,
    pub amount: Option<i64>,
    pub transaction_id: Option<&'a str>,
    pub outcome: &'a str,
    pub detail: Option<&'a str>,
    pub received_at: DateTime<Utc>,
}

pub fn insert_payment_event(conn: &Connection, event: &NewPaymentEvent<'_>) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO payment_events (channel, booking_ref, booking_id, amount, transaction_id, outcome, detail, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            event.channel,
            event.booking_ref,
            event.booking_id,
            event.amount,
            event.transaction_id,
            event.outcome,
            event.detail,
            fmt_ts(&event.received_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_payment_events(
    conn: &Connection,
    outcome: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<PaymentEventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, channel, booking_ref, booking_id, amount, transaction_id, outcome, detail, received_at
         FROM payment_events WHERE (?1 IS NULL OR outcome = ?1)
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![outcome, limit], |row| Ok(parse_payment_event_row(row)))?;

    let mut events = vec![];
    for row in rows {
        events.push(row??);
    }
    Ok(events)
}

fn parse_payment_event_row(row: &rusqlite::Row) -> anyhow::Result<PaymentEventRecord> {
    Ok(PaymentEventRecord {
        id: row.get(0)?,
        channel: row.get(1)?,
        booking_ref: row.get(2)?,
        booking_id: row.get(3)?,
        amount: row.get(4)?,
        transaction_id: row.get(5)?,
        outcome: row.get(6)?,
        detail: row.get(7)?,
        received_at: parse_ts(&row.get::<_, String>(8)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::lifecycle::tests::sample_booking;
    use chrono::Duration;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn booking_at(id: &str, code: &str, start: DateTime<Utc>, hours: i64, status: BookingStatus) -> Booking {
        let mut b = sample_booking(status, PaymentStatus::Unpaid);
        b.id = id.to_string();
        b.booking_code = code.to_string();
        b.start_time = start;
        b.end_time = start + Duration::hours(hours);
        b
    }

    fn t(h: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2025, 6, 16)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_active_status_sql_matches_model() {
        for status in BookingStatus::ACTIVE {
            assert!(ACTIVE_STATUSES_SQL.contains(&format!("'{}'", status.as_str())));
        }
        assert_eq!(ACTIVE_STATUSES_SQL.matches('\'').count(), BookingStatus::ACTIVE.len() * 2);
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut conn = setup_db();
        let b = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Pending);
        assert!(matches!(insert_booking_if_free(&mut conn, &b).unwrap(), InsertOutcome::Inserted));

        let loaded = get_booking_by_id(&conn, "b-1").unwrap().unwrap();
        assert_eq!(loaded, b);
        let by_code = get_booking_by_code(&conn, "bk000000000001").unwrap().unwrap();
        assert_eq!(by_code.id, "b-1");
    }

    #[test]
    fn test_overlapping_insert_refused() {
        let mut conn = setup_db();
        let first = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Pending);
        insert_booking_if_free(&mut conn, &first).unwrap();

        let second = booking_at("b-2", "BK000000000002", t(8), 2, BookingStatus::Pending);
        match insert_booking_if_free(&mut conn, &second).unwrap() {
            InsertOutcome::Conflict(c) => {
                assert_eq!(c.booking_code, "BK000000000001");
                assert_eq!(c.start_time, t(7));
                assert_eq!(c.end_time, t(9));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(get_booking_by_id(&conn, "b-2").unwrap().is_none());
    }

    #[test]
    fn test_adjacent_insert_allowed() {
        let mut conn = setup_db();
        let first = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Pending);
        insert_booking_if_free(&mut conn, &first).unwrap();
        let second = booking_at("b-2", "BK000000000002", t(9), 1, BookingStatus::Pending);
        assert!(matches!(insert_booking_if_free(&mut conn, &second).unwrap(), InsertOutcome::Inserted));
    }

    #[test]
    fn test_cancelled_and_checked_out_do_not_block() {
        let mut conn = setup_db();
        let cancelled = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Cancelled);
        let done = booking_at("b-2", "BK000000000002", t(7), 2, BookingStatus::CheckedOut);
        insert_booking_if_free(&mut conn, &cancelled).unwrap();
        insert_booking_if_free(&mut conn, &done).unwrap();

        assert!(find_conflict(&conn, "room-1", &t(7), &t(9), None).unwrap().is_none());
    }

    #[test]
    fn test_other_room_does_not_block() {
        let mut conn = setup_db();
        let mut other = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Confirmed);
        other.resource_id = "room-2".to_string();
        insert_booking_if_free(&mut conn, &other).unwrap();
        assert!(find_conflict(&conn, "room-1", &t(7), &t(9), None).unwrap().is_none());
    }

    #[test]
    fn test_find_conflict_excludes_self() {
        let mut conn = setup_db();
        let b = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Confirmed);
        insert_booking_if_free(&mut conn, &b).unwrap();
        assert!(find_conflict(&conn, "room-1", &t(8), &t(10), None).unwrap().is_some());
        assert!(find_conflict(&conn, "room-1", &t(8), &t(10), Some("b-1")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_code_reported() {
        let mut conn = setup_db();
        let first = booking_at("b-1", "BK000000000001", t(7), 1, BookingStatus::Pending);
        insert_booking_if_free(&mut conn, &first).unwrap();
        let second = booking_at("b-2", "BK000000000001", t(12), 1, BookingStatus::Pending);
        assert!(matches!(insert_booking_if_free(&mut conn, &second).unwrap(), InsertOutcome::DuplicateCode));
    }

    #[test]
    fn test_guarded_update_rejects_stale_expectation() {
        let mut conn = setup_db();
        let b = booking_at("b-1", "BK000000000001", t(7), 2, BookingStatus::Pending);
        insert_booking_if_free(&mut conn, &b).unwrap();

        let mut paid = b.clone();
        paid.status = BookingStatus::Confirmed;
        paid.payment_status = PaymentStatus::Paid;
        assert!(update_booking_guarded(&conn, &paid, BookingStatus::Pending, PaymentStatus::Unpaid).unwrap());

        let mut expired = b.clone();
        expired.status = BookingStatus::Cancelled;
        assert!(!update_booking_guarded(&conn, &expired, BookingStatus::Pending, PaymentStatus::Unpaid).unwrap());

        let stored = get_booking_by_id(&conn, "b-1").unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_list_expired_unpaid() {
        let mut conn = setup_db();
        let now = t(12);
        let mut stale = booking_at("b-1", "BK000000000001", t(14), 1, BookingStatus::Pending);
        stale.created_at = now - Duration::minutes(11);
        let mut fresh = booking_at("b-2", "BK000000000002", t(16), 1, BookingStatus::Pending);
        fresh.created_at = now - Duration::minutes(2);
        let mut confirmed = booking_at("b-3", "BK000000000003", t(18), 1, BookingStatus::Confirmed);
        confirmed.created_at = now - Duration::hours(1);
        for b in [&stale, &fresh, &confirmed] {
            insert_booking_if_free(&mut conn, b).unwrap();
        }

        let expired = list_expired_unpaid(&conn, &(now - Duration::minutes(10)), 100).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "b-1");
    }

    #[test]
    fn test_payment_ledger_filter() {
        let conn = setup_db();
        for outcome in ["applied", "amount_mismatch", "applied"] {
            insert_payment_event(
                &conn,
                &NewPaymentEvent {
                    channel: "gateway",
                    booking_ref: Some("b-1"),
                    booking_id: Some("b-1"),
                    amount: Some(160_000),
                    transaction_id: Some("txn"),
                    outcome,
                    detail: None,
                    received_at: t(7),
                },
            )
            .unwrap();
        }
        assert_eq!(list_payment_events(&conn, None, 10).unwrap().len(), 3);
        let mismatches = list_payment_events(&conn, Some("amount_mismatch"), 10).unwrap();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].received_at, t(7));
    }
}
