mod circulation_service;
mod errors;
mod reporting;

pub use circulation_service::{
    STORE_DEADLINE, ServiceDependencies, borrow_book, reschedule_due_date, return_book,
    with_deadline,
};
pub use errors::{CirculationError, Result};
pub use reporting::{PatronSummary, TransactionFine, patron_summary};
