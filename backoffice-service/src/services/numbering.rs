//! Sequential invoice numbers: `INV-<year>-<counter:04>`.

use crate::store::{InvoiceSequence, Repository};
use service_core::error::AppError;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, PartialEq)]
#[error("'{0}' is not an invoice number of the form INV-YYYY-NNNN")]
pub struct InvalidInvoiceNumber(pub String);

pub fn format_invoice_number(sequence: InvoiceSequence) -> String {
    format!("INV-{}-{:04}", sequence.year, sequence.counter)
}

pub fn parse_invoice_number(number: &str) -> Result<InvoiceSequence, InvalidInvoiceNumber> {
    let invalid = || InvalidInvoiceNumber(number.to_string());
    let rest = number.strip_prefix("INV-").ok_or_else(invalid)?;
    let (year, counter) = rest.split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || counter.len() < 4 {
        return Err(invalid());
    }
    Ok(InvoiceSequence {
        year: year.parse().map_err(|_| invalid())?,
        counter: counter.parse().map_err(|_| invalid())?,
    })
}

/// Allocates the next number from the counter held by the store.
#[instrument(skip(store))]
pub async fn next_invoice_number(store: &dyn Repository, year: i32) -> Result<String, AppError> {
    let sequence = store.next_invoice_sequence(year).await?;
    Ok(format_invoice_number(sequence))
}

/// Highest sequence among existing invoice numbers, used to prime the counter.
pub fn latest_sequence<'a>(numbers: impl IntoIterator<Item = &'a str>) -> Option<InvoiceSequence> {
    numbers
        .into_iter()
        .filter_map(|n| parse_invoice_number(n).ok())
        .max_by_key(|s| (s.year, s.counter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn formats_with_four_digit_counter() {
        let n = format_invoice_number(InvoiceSequence {
            year: 2024,
            counter: 41,
        });
        assert_eq!(n, "INV-2024-0041");
        assert_eq!(parse_invoice_number(&n).unwrap().counter, 41);
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(parse_invoice_number("INV-24-0001").is_err());
        assert!(parse_invoice_number("SA-54321").is_err());
        assert!(parse_invoice_number("INV-2024-01").is_err());
    }

    #[test]
    fn latest_sequence_picks_highest() {
        let latest = latest_sequence(["INV-2024-0002", "INV-2023-0099", "junk", "INV-2024-0001"]);
        assert_eq!(
            latest,
            Some(InvoiceSequence {
                year: 2024,
                counter: 2
            })
        );
    }

    #[tokio::test]
    async fn numbers_increase_then_reset_on_new_year() {
        let store = MemoryStore::new();
        store
            .set_invoice_sequence(InvoiceSequence {
                year: 2024,
                counter: 40,
            })
            .await
            .unwrap();

        assert_eq!(next_invoice_number(&store, 2024).await.unwrap(), "INV-2024-0041");
        assert_eq!(next_invoice_number(&store, 2025).await.unwrap(), "INV-2025-0001");
        assert_eq!(next_invoice_number(&store, 2025).await.unwrap(), "INV-2025-0002");
    }
}
