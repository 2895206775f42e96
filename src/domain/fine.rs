use chrono::{DateTime, Utc};

use super::transaction::Transaction;

const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// 純粋関数：1取引の延滞料金を計算する
///
/// ビジネスルール：
/// - 延滞日数は切り上げ（1秒の延滞でも1日分）
/// - 期限ちょうど、または期限前は0
/// - `延滞日数 × 日額料金`
///
/// 割引はここでは適用しない。割引は利用者単位の合計に対して
/// 一度だけ適用される（`discounted_total`）。
pub fn calculate_fine(transaction: &Transaction, per_day_rate: f64, now: DateTime<Utc>) -> f64 {
    let overdue_seconds = (now - transaction.due_date).num_seconds();
    if overdue_seconds <= 0 {
        return 0.0;
    }

    let days_overdue = (overdue_seconds as f64 / SECONDS_PER_DAY).ceil();
    days_overdue * per_day_rate
}

/// 純粋関数：利用者カテゴリの割引を合計金額に適用する
///
/// `total * (1 - discount_fraction)`。取引ごとではなく
/// 合計に対して一度だけ適用する。
pub fn discounted_total(total: f64, discount_fraction: f64) -> f64 {
    total * (1.0 - discount_fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::open_transaction;
    use crate::domain::{BookId, PatronId};
    use chrono::Duration;

    fn transaction_due_at(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Transaction {
        let mut transaction =
            open_transaction(PatronId::new(), BookId::new(), now + Duration::days(7), now);
        transaction.due_date = due_date;
        transaction
    }

    #[test]
    fn test_fine_zero_when_due_in_future() {
        let now = Utc::now();
        let transaction = transaction_due_at(now + Duration::days(3), now);
        assert_eq!(calculate_fine(&transaction, 15.0, now), 0.0);
    }

    #[test]
    fn test_fine_zero_when_due_exactly_now() {
        let now = Utc::now();
        let transaction = transaction_due_at(now, now);
        assert_eq!(calculate_fine(&transaction, 15.0, now), 0.0);
    }

    #[test]
    fn test_fine_one_day_rate_one_second_past_due() {
        let now = Utc::now();
        let transaction = transaction_due_at(now - Duration::seconds(1), now);
        assert_eq!(calculate_fine(&transaction, 15.0, now), 15.0);
    }

    #[test]
    fn test_fine_ten_days_overdue() {
        let now = Utc::now();
        let transaction = transaction_due_at(now - Duration::days(10), now);
        assert_eq!(calculate_fine(&transaction, 15.0, now), 150.0);
    }

    #[test]
    fn test_fine_partial_day_rounds_up() {
        let now = Utc::now();
        let transaction = transaction_due_at(now - Duration::days(3) - Duration::hours(1), now);
        assert_eq!(calculate_fine(&transaction, 2.0, now), 8.0);
    }

    #[test]
    fn test_discount_applies_to_total() {
        let total = 150.0;
        assert_eq!(discounted_total(total, 0.2), 120.0);
    }

    #[test]
    fn test_zero_discount_leaves_total_unchanged() {
        assert_eq!(discounted_total(150.0, 0.0), 150.0);
    }
}
