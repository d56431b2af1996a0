//! Remaining discount cycle estimation.
//!
//! Paddle imports a discount together with the number of billing cycles it
//! still applies to. Stripe only records when the discount started and the
//! coupon's duration policy, so the remaining count is derived from the
//! time elapsed since the start. The result is an estimate: coupon changes in
//! the middle of a cycle are not accounted for.

use std::fmt;

use chrono::{DateTime, Datelike, Months, Utc};

use crate::stripe::{BillingInterval, CouponDuration, Discount, IntervalUnit};

/// Marker written for discounts that never run out.
pub const UNLIMITED_MARKER: &str = "∞";

/// Cycles a discount still applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemainingCycles {
    /// `forever` coupon.
    Unlimited,
    /// Finite number of cycles left, possibly zero.
    Count(u32),
}

impl fmt::Display for RemainingCycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str(UNLIMITED_MARKER),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}

/// Discount ID and remaining cycles for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountCycles {
    /// Stripe discount ID.
    pub discount_id: String,
    /// Cycles left.
    pub remaining: RemainingCycles,
}

/// Estimates the remaining cycles of a subscription discount at `now`.
///
/// Returns `None` when there is no discount.
///
/// - `forever` coupons are [`RemainingCycles::Unlimited`].
/// - `repeating` coupons are entitled to `duration_in_months` cycles (1 if
///   missing), `once` coupons to a single cycle.
/// - Consumed cycles are the whole months or years elapsed for monthly and
///   yearly billing, and elapsed days divided by the cycle length in days for
///   weekly and daily billing.
///
/// # Examples
///
/// ```
/// use chrono::{Months, TimeZone, Utc};
/// use paddle_migration::{
///     extract::{RemainingCycles, remaining_discount_cycles},
///     stripe::{BillingInterval, Coupon, CouponDuration, Discount},
/// };
///
/// let now = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();
/// let start = now.checked_sub_months(Months::new(2)).unwrap();
/// let discount = Discount {
///     id: "di_1".into(),
///     start: start.timestamp(),
///     coupon: Coupon {
///         id: "SPRING".into(),
///         duration: CouponDuration::Repeating,
///         duration_in_months: Some(3),
///     },
/// };
///
/// let cycles =
///     remaining_discount_cycles(Some(&discount), BillingInterval::default(), now).unwrap();
/// assert_eq!(cycles.remaining, RemainingCycles::Count(1));
/// ```
#[must_use]
pub fn remaining_discount_cycles(
    discount: Option<&Discount>,
    interval: BillingInterval,
    now: DateTime<Utc>,
) -> Option<DiscountCycles> {
    let discount = discount?;
    let coupon = &discount.coupon;

    let total = match coupon.duration {
        CouponDuration::Forever => {
            return Some(DiscountCycles {
                discount_id: discount.id.clone(),
                remaining: RemainingCycles::Unlimited,
            });
        }
        CouponDuration::Repeating => coupon.duration_in_months.unwrap_or(1),
        CouponDuration::Once => 1,
    };

    let consumed = DateTime::from_timestamp(discount.start, 0)
        .map_or(0, |start| cycles_elapsed(start, now, interval));

    Some(DiscountCycles {
        discount_id: discount.id.clone(),
        remaining: RemainingCycles::Count(total.saturating_sub(consumed)),
    })
}

/// Number of complete billing cycles between `start` and `now`.
fn cycles_elapsed(start: DateTime<Utc>, now: DateTime<Utc>, interval: BillingInterval) -> u32 {
    if now <= start {
        return 0;
    }

    match interval.unit {
        IntervalUnit::Month => whole_months_between(start, now),
        IntervalUnit::Year => whole_months_between(start, now) / 12,
        IntervalUnit::Week | IntervalUnit::Day => {
            let count = i64::from(interval.count.max(1));
            let cycle_days =
                if interval.unit == IntervalUnit::Week { count.saturating_mul(7) } else { count };
            let days = (now - start).num_days();
            u32::try_from(days / cycle_days).unwrap_or(u32::MAX)
        }
    }
}

/// Whole calendar months from `start` to `now`, rounded down.
///
/// A month is complete once `start` shifted by that many months (chrono
/// clamps to the last day of shorter months) is not after `now`.
fn whole_months_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    #[allow(clippy::cast_possible_wrap, reason = "month0 is always below 12")]
    let calendar = (now.year() - start.year()) * 12 + now.month0() as i32 - start.month0() as i32;
    let mut months = u32::try_from(calendar).unwrap_or(0);

    while months > 0
        && start.checked_add_months(Months::new(months)).is_none_or(|shifted| shifted > now)
    {
        months -= 1;
    }

    months
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::stripe::Coupon;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()
    }

    fn discount(duration: CouponDuration, months: Option<u32>, start: DateTime<Utc>) -> Discount {
        Discount {
            id: "di_test".into(),
            start: start.timestamp(),
            coupon: Coupon { id: "COUPON".into(), duration, duration_in_months: months },
        }
    }

    fn monthly() -> BillingInterval {
        BillingInterval { unit: IntervalUnit::Month, count: 1 }
    }

    fn remaining(d: &Discount, interval: BillingInterval, at: DateTime<Utc>) -> RemainingCycles {
        remaining_discount_cycles(Some(d), interval, at).unwrap().remaining
    }

    #[test]
    fn test_no_discount() {
        assert_eq!(remaining_discount_cycles(None, monthly(), now()), None);
    }

    #[test]
    fn test_forever_is_unlimited() {
        let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let d = discount(CouponDuration::Forever, None, start);

        let cycles = remaining_discount_cycles(Some(&d), monthly(), now()).unwrap();
        assert_eq!(cycles.discount_id, "di_test");
        assert_eq!(cycles.remaining, RemainingCycles::Unlimited);
        assert_eq!(cycles.remaining.to_string(), "∞");
    }

    #[test]
    fn test_repeating_two_months_elapsed() {
        let start = now().checked_sub_months(Months::new(2)).unwrap();
        let d = discount(CouponDuration::Repeating, Some(3), start);
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(1));
    }

    #[test]
    fn test_repeating_never_negative() {
        let start = now().checked_sub_months(Months::new(4)).unwrap();
        let d = discount(CouponDuration::Repeating, Some(3), start);
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(0));
    }

    #[test]
    fn test_once_coupon_has_one_cycle() {
        let d = discount(CouponDuration::Once, None, now() - TimeDelta::days(3));
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(1));

        let d = discount(CouponDuration::Once, None, now() - TimeDelta::days(40));
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(0));
    }

    #[test]
    fn test_repeating_without_months_defaults_to_one() {
        let d = discount(CouponDuration::Repeating, None, now());
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(1));
    }

    #[test]
    fn test_partial_month_rounds_down() {
        // Started on the 31st; April has 30 days
        let start = Utc.with_ymd_and_hms(2026, 3, 31, 10, 0, 0).unwrap();
        let d = discount(CouponDuration::Repeating, Some(6), start);

        let before = Utc.with_ymd_and_hms(2026, 4, 30, 9, 59, 59).unwrap();
        assert_eq!(remaining(&d, monthly(), before), RemainingCycles::Count(6));

        let at = Utc.with_ymd_and_hms(2026, 4, 30, 10, 0, 0).unwrap();
        assert_eq!(remaining(&d, monthly(), at), RemainingCycles::Count(5));
    }

    #[test]
    fn test_yearly_interval() {
        let start = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
        let d = discount(CouponDuration::Repeating, Some(24), start);
        let yearly = BillingInterval { unit: IntervalUnit::Year, count: 1 };

        // 1 year and 11.5 months elapsed
        assert_eq!(remaining(&d, yearly, now()), RemainingCycles::Count(23));
    }

    #[test]
    fn test_weekly_interval_uses_interval_count() {
        let d = discount(CouponDuration::Repeating, Some(10), now() - TimeDelta::days(29));
        let biweekly = BillingInterval { unit: IntervalUnit::Week, count: 2 };

        // 29 days / 14 = 2 cycles
        assert_eq!(remaining(&d, biweekly, now()), RemainingCycles::Count(8));
    }

    #[test]
    fn test_daily_interval() {
        let d = discount(CouponDuration::Repeating, Some(10), now() - TimeDelta::days(7));
        let every_third_day = BillingInterval { unit: IntervalUnit::Day, count: 3 };

        assert_eq!(remaining(&d, every_third_day, now()), RemainingCycles::Count(8));
    }

    #[test]
    fn test_zero_interval_count_treated_as_one() {
        let d = discount(CouponDuration::Repeating, Some(10), now() - TimeDelta::days(4));
        let broken = BillingInterval { unit: IntervalUnit::Day, count: 0 };

        assert_eq!(remaining(&d, broken, now()), RemainingCycles::Count(6));
    }

    #[test]
    fn test_future_start_consumes_nothing() {
        let d = discount(CouponDuration::Repeating, Some(3), now() + TimeDelta::days(10));
        assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Count(3));
    }

    #[test]
    fn test_whole_months_between() {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        assert_eq!(whole_months_between(start, start), 0);
        assert_eq!(
            whole_months_between(start, Utc.with_ymd_and_hms(2025, 2, 15, 7, 59, 59).unwrap()),
            0
        );
        assert_eq!(
            whole_months_between(start, Utc.with_ymd_and_hms(2025, 2, 15, 8, 0, 0).unwrap()),
            1
        );
        assert_eq!(
            whole_months_between(start, Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap()),
            12
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_forever_ignores_elapsed_time(days_ago in 0i64..20_000) {
            let d = discount(CouponDuration::Forever, None, now() - TimeDelta::days(days_ago));
            prop_assert_eq!(remaining(&d, monthly(), now()), RemainingCycles::Unlimited);
        }

        #[test]
        fn prop_remaining_never_exceeds_total(
            months in 1u32..36,
            days_ago in -400i64..4_000,
            unit in prop_oneof![
                Just(IntervalUnit::Day),
                Just(IntervalUnit::Week),
                Just(IntervalUnit::Month),
                Just(IntervalUnit::Year),
            ],
            count in 0u32..12,
        ) {
            let d = discount(CouponDuration::Repeating, Some(months), now() - TimeDelta::days(days_ago));
            let interval = BillingInterval { unit, count };

            match remaining(&d, interval, now()) {
                RemainingCycles::Count(n) => prop_assert!(n <= months),
                RemainingCycles::Unlimited => prop_assert!(false, "repeating coupon is finite"),
            }
        }

        #[test]
        fn prop_monthly_remaining_is_non_increasing(months in 1u32..24, a in 0i64..1_000, b in 0i64..1_000) {
            let start = now() - TimeDelta::days(1_000);
            let d = discount(CouponDuration::Repeating, Some(months), start);
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };

            let at_earlier = remaining(&d, monthly(), start + TimeDelta::days(earlier));
            let at_later = remaining(&d, monthly(), start + TimeDelta::days(later));
            match (at_earlier, at_later) {
                (RemainingCycles::Count(x), RemainingCycles::Count(y)) => prop_assert!(y <= x),
                _ => prop_assert!(false, "repeating coupon is finite"),
            }
        }
    }
}
