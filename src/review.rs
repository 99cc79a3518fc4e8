//! The review step: an editable copy of an extracted record.
//!
//! Only the merchant, the category and each item's name and price can be changed. Edits that would
//! break a record invariant are rejected and leave the record as it was.

use crate::error::{ErrorType, IntoResult};
use crate::model::{Amount, Category, ReceiptItem, ReceiptRecord};
use crate::{Error, Result};
use anyhow::Context;
use std::str::FromStr;

/// Holds the record being reviewed.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Review {
    original: ReceiptRecord,
    edited: ReceiptRecord,
}

impl Review {
    pub fn new(record: ReceiptRecord) -> Self {
        Self {
            edited: record.clone(),
            original: record,
        }
    }

    /// The record with all edits applied.
    pub fn record(&self) -> &ReceiptRecord {
        &self.edited
    }

    /// The record as it was extracted.
    pub fn original(&self) -> &ReceiptRecord {
        &self.original
    }

    pub fn is_edited(&self) -> bool {
        self.original != self.edited
    }

    /// The category shown in the picker: the edited label, or `Other` if it is not in the closed
    /// set.
    pub fn display_category(&self) -> Category {
        self.edited.display_category()
    }

    pub fn set_merchant(&mut self, merchant: impl Into<String>) {
        self.edited.set_merchant_name(merchant);
    }

    pub fn set_category(&mut self, category: Category) {
        self.edited.set_category(category.as_str());
    }

    pub fn set_item_name(&mut self, index: usize, name: impl Into<String>) -> Result<()> {
        self.item_mut(index)?.set_name(name);
        Ok(())
    }

    /// Sets the price of item `index`.
    ///
    /// # Errors
    /// A state error if there is no such item or the price is negative.
    pub fn set_item_price(&mut self, index: usize, price: Amount) -> Result<()> {
        if price.is_negative() {
            return Err(Error::msg(
                ErrorType::State,
                format!("The price of an item cannot be negative, got {price}"),
            ));
        }
        self.item_mut(index)?.set_price(price);
        Ok(())
    }

    /// Parses `price` as typed by the user and sets it, see `set_item_price`.
    pub fn set_item_price_str(&mut self, index: usize, price: &str) -> Result<()> {
        if price.trim().is_empty() {
            return Err(Error::msg(ErrorType::State, "The price of an item cannot be empty"));
        }
        let price = Amount::from_str(price)
            .with_context(|| format!("'{price}' is not a price"))
            .pub_result(ErrorType::State)?;
        self.set_item_price(index, price)
    }

    /// Ends the review, returning the edited record.
    pub fn finish(self) -> ReceiptRecord {
        self.edited
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut ReceiptItem> {
        let count = self.edited.items().len();
        self.edited.items_mut().get_mut(index).ok_or_else(|| {
            Error::msg(
                ErrorType::State,
                format!("There is no item {index}, the receipt has {count} items"),
            )
        })
    }
}
