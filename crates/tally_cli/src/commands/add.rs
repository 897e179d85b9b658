//! `add` command: record a transaction.

use chrono::NaiveDate;
use std::path::Path;
use tally_core::{NewTransaction, TransactionKind};
use tally_store::LocalStore;

#[allow(clippy::too_many_arguments)]
pub fn run(
    db: &Path,
    user: &str,
    amount: f64,
    kind: TransactionKind,
    category: &str,
    note: Option<String>,
    currency: &str,
    date: Option<NaiveDate>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::open(db)?;

    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut new = NewTransaction::new(user, kind, amount, category, date).with_currency(currency);
    if let Some(note) = note {
        new = new.with_note(note);
    }

    let row = store.add(new)?;
    println!(
        "Recorded {} {:.2} {} ({}) on {} [{}]",
        row.kind, row.amount, row.currency, row.category, row.date, row.id
    );
    Ok(())
}
