use chrono::{DateTime, Utc};

use crate::config::CostConfig;
use crate::domain::fine;
use crate::domain::patron::Patron;
use crate::domain::transaction::Transaction;
use crate::domain::PatronId;
use crate::ports::{
    Paginator, PatronFilter, PatronStore, Sorter, StoreError, TransactionFilter, TransactionStore,
};

use super::circulation_service::{ServiceDependencies, with_deadline};
use super::errors::{CirculationError, Result};

/// 1取引とその延滞料金
#[derive(Debug, Clone)]
pub struct TransactionFine {
    pub transaction: Transaction,
    pub fine: f64,
}

/// 利用者サマリ - 利用者情報、取引ごとの延滞料金、割引適用後の合計
#[derive(Debug, Clone)]
pub struct PatronSummary {
    pub patron: Patron,
    pub transactions: Vec<TransactionFine>,
    pub total_fine: f64,
}

/// 利用者の取引一覧と延滞料金サマリを組み立てる
///
/// 利用者の全取引をページングなしで読み込み、取引ごとに延滞料金を
/// 計算して合算する。カテゴリ割引は**合計に対して一度だけ**適用する
/// （取引ごとには適用しない）。
pub async fn patron_summary(
    deps: &ServiceDependencies,
    cost: &CostConfig,
    patron_id: PatronId,
    now: DateTime<Utc>,
) -> Result<PatronSummary> {
    // 1. 利用者の存在確認
    let patron = with_deadline(deps.patron_store.get(PatronFilter::by_id(patron_id)))
        .await
        .map_err(|err| match err {
            StoreError::NotFound => CirculationError::PatronNotFound,
            other => CirculationError::Store(other),
        })?;

    // 2. 利用者の全取引を取得（ページングなし）
    let (transactions, _) = with_deadline(deps.transaction_store.get_all(
        TransactionFilter::by_patron(patron_id),
        Paginator::unpaged(),
        Sorter::none(),
    ))
    .await
    .map_err(CirculationError::from_store)?;

    // 3. 取引ごとの延滞料金を計算し、合算する
    let mut total = 0.0;
    let transactions: Vec<TransactionFine> = transactions
        .into_iter()
        .map(|transaction| {
            let fine = fine::calculate_fine(&transaction, cost.overdue_fine, now);
            total += fine;
            TransactionFine { transaction, fine }
        })
        .collect();

    // 4. カテゴリ割引を合計に適用
    let total_fine = fine::discounted_total(total, patron.category.discount());

    Ok(PatronSummary {
        patron,
        transactions,
        total_fine,
    })
}
