//! Schedule generation and the read-time amount calculations.
//!
//! Everything here is a pure function of its inputs: callers pass the
//! record and the calendar date to evaluate against, nothing reads a clock.

use crate::error::LedgerError;
use crate::models::{Lease, PaymentRecord, PaymentStatus, PaymentView};
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Tunable rules applied by the ledger.
#[derive(Debug, Clone)]
pub struct LedgerPolicy {
    /// Days after the first of the month before rent is due.
    pub grace_days: u32,
    /// Fraction of the base amount charged per started late period.
    pub late_fee_rate: Decimal,
    pub late_fee_period_days: u32,
    /// Records overdue by more than this many days land in the severe bucket.
    pub severe_overdue_days: i64,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            grace_days: 5,
            late_fee_rate: Decimal::new(5, 2),
            late_fee_period_days: 30,
            severe_overdue_days: 60,
        }
    }
}

/// First day of each calendar month from `start`'s month through `end`'s
/// month, inclusive.
pub fn lease_months(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let last = first_of_month(end);
    let mut current = first_of_month(start);

    while current <= last {
        months.push(current);
        match current.checked_add_months(Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }

    months
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Check a lease contract before any records are built from it.
pub fn validate_lease(lease: &Lease) -> Result<(), LedgerError> {
    if lease.tenant_id.trim().is_empty()
        || lease.property_id.trim().is_empty()
        || lease.owner_id.trim().is_empty()
    {
        return Err(LedgerError::validation(
            "tenant_id, property_id and owner_id are required",
        ));
    }
    if lease.start_date > lease.end_date {
        return Err(LedgerError::validation(
            "start_date must not be after end_date",
        ));
    }
    if lease.monthly_rent <= Decimal::ZERO {
        return Err(LedgerError::validation("monthly_rent must be positive"));
    }
    Ok(())
}

/// Build the pending records for every month of the lease.
pub fn build_schedule(
    lease: &Lease,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<PaymentRecord>, LedgerError> {
    validate_lease(lease)?;

    lease_months(lease.start_date, lease.end_date)
        .into_iter()
        .map(|lease_month| {
            let due_date = lease_month
                .checked_add_days(Days::new(u64::from(policy.grace_days)))
                .ok_or_else(|| LedgerError::validation("due date out of range"))?;

            Ok(PaymentRecord {
                id: uuid::Uuid::new_v4().to_string(),
                tenant_id: lease.tenant_id.clone(),
                property_id: lease.property_id.clone(),
                owner_id: lease.owner_id.clone(),
                lease_month,
                due_date,
                base_amount: lease.monthly_rent,
                status: PaymentStatus::Pending,
                payment_date: None,
                payment_method: None,
                external_order_id: None,
                order_stamped_at: None,
                superseded_order_ids: Vec::new(),
                external_transaction_id: None,
                external_signature: None,
                notes: String::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

/// Whole days past the due date; always 0 for paid records.
pub fn days_overdue(record: &PaymentRecord, today: NaiveDate) -> i64 {
    if record.is_paid() {
        return 0;
    }
    (today - record.due_date).num_days().max(0)
}

/// Late fee as of `today`, rounded to 2 decimal places.
pub fn compute_late_fee(record: &PaymentRecord, policy: &LedgerPolicy, today: NaiveDate) -> Decimal {
    let days = days_overdue(record, today);
    if days == 0 || policy.late_fee_period_days == 0 {
        return Decimal::ZERO;
    }

    let period = i64::from(policy.late_fee_period_days);
    let periods = (days + period - 1) / period;

    (record.base_amount * policy.late_fee_rate * Decimal::from(periods))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn total_amount(record: &PaymentRecord, policy: &LedgerPolicy, today: NaiveDate) -> Decimal {
    record.base_amount + compute_late_fee(record, policy, today)
}

pub fn derive_status(record: &PaymentRecord, today: NaiveDate) -> PaymentStatus {
    if record.is_paid() {
        PaymentStatus::Paid
    } else if days_overdue(record, today) > 0 {
        PaymentStatus::Overdue
    } else {
        PaymentStatus::Pending
    }
}

/// Project a stored record into its display form as of `today`.
pub fn view(record: &PaymentRecord, policy: &LedgerPolicy, today: NaiveDate) -> PaymentView {
    let late_fee = compute_late_fee(record, policy, today);

    PaymentView {
        id: record.id.clone(),
        tenant_id: record.tenant_id.clone(),
        property_id: record.property_id.clone(),
        owner_id: record.owner_id.clone(),
        lease_month: record.lease_month,
        month_label: record.month_label(),
        due_date: record.due_date,
        base_amount: record.base_amount,
        late_fee,
        total_amount: record.base_amount + late_fee,
        days_overdue: days_overdue(record, today),
        status: derive_status(record, today),
        payment_date: record.payment_date,
        payment_method: record.payment_method,
        external_order_id: record.external_order_id.clone(),
        external_transaction_id: record.external_transaction_id.clone(),
        notes: record.notes.clone(),
    }
}

/// Convert a major-unit amount to minor units (paise for INR).
pub fn to_minor_units(amount: Decimal) -> Result<u64, LedgerError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| LedgerError::validation(format!("amount {} out of range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn lease(start: NaiveDate, end: NaiveDate) -> Lease {
        Lease {
            tenant_id: "tenant-1".to_string(),
            property_id: "property-1".to_string(),
            owner_id: "owner-1".to_string(),
            start_date: start,
            end_date: end,
            monthly_rent: Decimal::from(10_000),
        }
    }

    fn record_due(due: NaiveDate) -> PaymentRecord {
        let mut record = build_schedule(
            &lease(date(2024, 1, 1), date(2024, 1, 1)),
            &LedgerPolicy::default(),
            now(),
        )
        .unwrap()
        .remove(0);
        record.due_date = due;
        record
    }

    #[test]
    fn twelve_month_lease_produces_twelve_records() {
        let records = build_schedule(
            &lease(date(2024, 1, 15), date(2024, 12, 14)),
            &LedgerPolicy::default(),
            now(),
        )
        .unwrap();

        assert_eq!(records.len(), 12);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.lease_month, date(2024, i as u32 + 1, 1));
            assert_eq!(record.due_date, record.lease_month + Days::new(5));
            assert_eq!(record.status, PaymentStatus::Pending);
            assert_eq!(record.base_amount, Decimal::from(10_000));
        }
    }

    #[test]
    fn schedule_crosses_year_boundary_by_calendar_month() {
        let months = lease_months(date(2023, 11, 30), date(2024, 2, 29));
        assert_eq!(
            months,
            vec![
                date(2023, 11, 1),
                date(2023, 12, 1),
                date(2024, 1, 1),
                date(2024, 2, 1)
            ]
        );
    }

    #[test]
    fn one_day_lease_produces_one_record() {
        let records = build_schedule(
            &lease(date(2024, 3, 10), date(2024, 3, 10)),
            &LedgerPolicy::default(),
            now(),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].due_date, date(2024, 3, 6));
    }

    #[test]
    fn rejects_invalid_leases() {
        let policy = LedgerPolicy::default();

        let inverted = lease(date(2024, 5, 1), date(2024, 4, 1));
        assert!(matches!(
            build_schedule(&inverted, &policy, now()),
            Err(LedgerError::Validation(_))
        ));

        let mut free = lease(date(2024, 1, 1), date(2024, 2, 1));
        free.monthly_rent = Decimal::ZERO;
        assert!(matches!(
            build_schedule(&free, &policy, now()),
            Err(LedgerError::Validation(_))
        ));

        let mut anonymous = lease(date(2024, 1, 1), date(2024, 2, 1));
        anonymous.tenant_id = " ".to_string();
        assert!(matches!(
            build_schedule(&anonymous, &policy, now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn late_fee_is_zero_until_due_date() {
        let policy = LedgerPolicy::default();
        let record = record_due(date(2024, 1, 5));

        assert_eq!(compute_late_fee(&record, &policy, date(2024, 1, 1)), Decimal::ZERO);
        assert_eq!(compute_late_fee(&record, &policy, date(2024, 1, 5)), Decimal::ZERO);
        assert_eq!(derive_status(&record, date(2024, 1, 5)), PaymentStatus::Pending);
    }

    #[test]
    fn late_fee_steps_every_thirty_days() {
        let policy = LedgerPolicy::default();
        let record = record_due(date(2024, 1, 5));

        // 1 day and 30 days overdue are both the first period.
        assert_eq!(compute_late_fee(&record, &policy, date(2024, 1, 6)), Decimal::from(500));
        assert_eq!(compute_late_fee(&record, &policy, date(2024, 2, 4)), Decimal::from(500));
        // 31 days starts the second.
        assert_eq!(compute_late_fee(&record, &policy, date(2024, 2, 5)), Decimal::from(1000));
    }

    #[test]
    fn forty_six_days_overdue_charges_two_periods() {
        let policy = LedgerPolicy::default();
        let record = record_due(date(2024, 1, 5));
        let today = date(2024, 2, 20);

        assert_eq!(days_overdue(&record, today), 46);
        assert_eq!(compute_late_fee(&record, &policy, today), Decimal::from(1000));
        assert_eq!(total_amount(&record, &policy, today), Decimal::from(11_000));
        assert_eq!(derive_status(&record, today), PaymentStatus::Overdue);
    }

    #[test]
    fn paid_records_carry_no_fee() {
        let policy = LedgerPolicy::default();
        let mut record = record_due(date(2024, 1, 5));
        record.status = PaymentStatus::Paid;
        let today = date(2024, 6, 1);

        assert_eq!(days_overdue(&record, today), 0);
        let view = view(&record, &policy, today);
        assert_eq!(view.late_fee, Decimal::ZERO);
        assert_eq!(view.total_amount, record.base_amount);
        assert_eq!(view.status, PaymentStatus::Paid);
    }

    #[test]
    fn fee_rounds_to_two_places() {
        let policy = LedgerPolicy::default();
        let mut record = record_due(date(2024, 1, 5));
        record.base_amount = Decimal::new(999_99, 2);

        assert_eq!(
            compute_late_fee(&record, &policy, date(2024, 1, 6)),
            Decimal::new(50_00, 2)
        );
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::from(11_000)).unwrap(), 1_100_000);
        assert_eq!(to_minor_units(Decimal::new(1234_56, 2)).unwrap(), 123_456);
        assert!(to_minor_units(Decimal::from(-1)).is_err());
    }
}
