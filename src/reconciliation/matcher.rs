//! Threshold-tolerant matching of system transactions against bank buckets
//!
//! Matching is first-fit and intra-date only: a system transaction is
//! compared, in file order, against the not-yet-consumed bank transactions
//! recorded on the same calendar date, bank by bank in the order the banks
//! were supplied to the job. The first bank transaction whose amount falls
//! within the job's tolerance window is consumed; it can never match a
//! second system transaction. First-fit rather than best-fit is deliberate
//! so that repeated runs over the same inputs reproduce bit-for-bit.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::types::*;

/// One bank's transactions, bucketed by calendar date
#[derive(Debug, Clone, PartialEq)]
pub struct BankTransactions {
    /// Aggregation key for the missing-transactions report
    pub bank_name: String,
    /// Date buckets; file order is preserved within each bucket
    pub by_date: BTreeMap<NaiveDate, Vec<Transaction>>,
}

/// A date bucket with consumption tombstones
///
/// Matched transactions are tombstoned rather than removed in place, so
/// iteration order stays stable while consumption is tracked.
struct Bucket {
    transactions: Vec<Transaction>,
    taken: Vec<bool>,
}

struct BankBuckets {
    bank_name: String,
    buckets: BTreeMap<NaiveDate, Bucket>,
}

impl BankBuckets {
    fn new(bank: BankTransactions) -> Self {
        let buckets = bank
            .by_date
            .into_iter()
            .map(|(date, transactions)| {
                let taken = vec![false; transactions.len()];
                (date, Bucket { transactions, taken })
            })
            .collect();
        Self {
            bank_name: bank.bank_name,
            buckets,
        }
    }

    /// Consume the first free transaction on `date` with an amount inside
    /// `[lower, upper]`; returns whether one was found
    fn consume_match(&mut self, date: NaiveDate, lower: &BigDecimal, upper: &BigDecimal) -> bool {
        let Some(bucket) = self.buckets.get_mut(&date) else {
            return false;
        };
        for (index, candidate) in bucket.transactions.iter().enumerate() {
            if bucket.taken[index] {
                continue;
            }
            if candidate.amount >= *lower && candidate.amount <= *upper {
                bucket.taken[index] = true;
                return true;
            }
        }
        false
    }
}

/// Reconcile a job's system transactions against its bank transactions
///
/// System-side accounting satisfies `total_matched + total_unmatched ==
/// total_processed`. Bank transactions left unconsumed after the pass are
/// reported under `missing_bank_transactions` and added to the discrepancy
/// total, but do not count toward the processed or unmatched totals.
pub fn reconcile(
    job: &ReconciliationJob,
    system_transactions: &[Transaction],
    bank_transactions: Vec<BankTransactions>,
) -> ReconResult<ReconciliationResult> {
    let threshold = BigDecimal::try_from(job.discrepancy_threshold)
        .map_err(|_| ReconError::InvalidThreshold(job.discrepancy_threshold))?;

    let mut banks: Vec<BankBuckets> = bank_transactions.into_iter().map(BankBuckets::new).collect();
    let mut result = ReconciliationResult::default();

    for tx in system_transactions {
        result.total_processed += 1;

        let tolerance = &tx.amount * &threshold;
        let lower = &tx.amount - &tolerance;
        let upper = &tx.amount + &tolerance;
        let date = tx.calendar_date();

        let matched = banks
            .iter_mut()
            .any(|bank| bank.consume_match(date, &lower, &upper));

        if matched {
            result.total_matched += 1;
        } else {
            result.total_unmatched += 1;
            result.total_discrepancy_amount += &tx.amount;
            result.missing_system_transactions.push(tx.clone());
        }
    }

    // Sweep bank transactions that never matched into the per-bank report.
    for bank in banks {
        for bucket in bank.buckets.into_values() {
            for (tx, taken) in bucket.transactions.into_iter().zip(bucket.taken) {
                if taken {
                    continue;
                }
                result.total_discrepancy_amount += &tx.amount;
                result
                    .missing_bank_transactions
                    .entry(bank.bank_name.clone())
                    .or_default()
                    .push(tx);
            }
        }
    }

    Ok(result)
}
