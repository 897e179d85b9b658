//! `list` command: show transactions and monthly summaries.

use std::path::Path;
use tally_store::LocalStore;

pub fn run(
    db: &Path,
    user: &str,
    limit: usize,
    month: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = LocalStore::open(db)?;

    let rows = store.list(user, limit, 0)?;
    if rows.is_empty() {
        println!("No transactions.");
    }
    for row in &rows {
        let note = row.note.as_deref().unwrap_or("");
        println!(
            "{}  {:>10.2} {}  {:<12} {:<8} {}  {}",
            row.date, row.amount, row.currency, row.category, row.kind, row.id, note
        );
    }

    if let Some(month) = month {
        let (year, month) = parse_month(month)?;
        let summary = store.summarize(user, year, month)?;
        println!();
        println!(
            "{year}-{month:02}: income {:.2}, expense {:.2}, net {:.2}",
            summary.income,
            summary.expense,
            summary.net()
        );
    }

    Ok(())
}

fn parse_month(value: &str) -> Result<(i32, u32), Box<dyn std::error::Error>> {
    let (year, month) = value
        .split_once('-')
        .ok_or("month must look like YYYY-MM")?;
    Ok((year.parse()?, month.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_parsing() {
        assert_eq!(parse_month("2026-08").unwrap(), (2026, 8));
        assert!(parse_month("202608").is_err());
        assert!(parse_month("2026-xx").is_err());
    }
}
