pub mod ledger;

pub use ledger::{read_ledger, Ledger, LedgerEntry, LedgerError, LedgerRow, LEDGER_HEADER};
