//! Types that represent the core data model, such as `ReceiptRecord` and `Category`.
mod amount;
mod category;
mod receipt;

pub use amount::{Amount, AmountError};
pub use category::Category;
pub use receipt::{ReceiptItem, ReceiptRecord};
