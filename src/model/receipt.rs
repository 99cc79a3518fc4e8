use crate::error::Res;
use crate::model::{Amount, Category};
use anyhow::ensure;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single line of a receipt. It has no identity beyond its position in `ReceiptRecord::items`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    name: String,
    /// The schema does not require a quantity, so a missing one means a single unit.
    #[serde(default = "one")]
    quantity: Amount,
    price: Amount,
}

fn one() -> Amount {
    Amount::new(Decimal::ONE)
}

impl ReceiptItem {
    pub fn new(name: impl Into<String>, quantity: Amount, price: Amount) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> Amount {
        self.quantity
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_price(&mut self, price: Amount) {
        self.price = price;
    }
}

/// The structured content of one scanned receipt.
///
/// Created fresh for every scan, edited only during review and dropped after export or
/// cancellation. Serializes with the camelCase field names used by both the model schema and the
/// webhook payload.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    merchant_name: String,
    /// ISO 8601 calendar date. Not required by the schema; empty when the model omits it.
    #[serde(default)]
    date: String,
    total_amount: Amount,
    /// A symbol or an ISO code, e.g. `$` or `USD`.
    #[serde(default)]
    currency: String,
    /// The raw label. See `display_category` for the value shown to the user.
    category: String,
    items: Vec<ReceiptItem>,
}

impl ReceiptRecord {
    pub fn new(
        merchant_name: impl Into<String>,
        date: impl Into<String>,
        total_amount: Amount,
        currency: impl Into<String>,
        category: impl Into<String>,
        items: Vec<ReceiptItem>,
    ) -> Self {
        Self {
            merchant_name: merchant_name.into(),
            date: date.into(),
            total_amount,
            currency: currency.into(),
            category: category.into(),
            items,
        }
    }

    pub fn merchant_name(&self) -> &str {
        &self.merchant_name
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn total_amount(&self) -> Amount {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The category label exactly as extracted or edited.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The category as presented to the user, `Other` when the label is not in the closed set.
    pub fn display_category(&self) -> Category {
        Category::from_label(&self.category)
    }

    pub fn items(&self) -> &[ReceiptItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<ReceiptItem> {
        &mut self.items
    }

    pub(crate) fn set_merchant_name(&mut self, merchant_name: impl Into<String>) {
        self.merchant_name = merchant_name.into();
    }

    pub(crate) fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    /// Checks the invariants that serde cannot: the total and every item price are non-negative.
    pub(crate) fn validate(&self) -> Res<()> {
        ensure!(
            !self.total_amount.is_negative(),
            "The total amount {} is negative",
            self.total_amount
        );
        for (ix, item) in self.items.iter().enumerate() {
            ensure!(
                !item.price.is_negative(),
                "The price {} of item {} '{}' is negative",
                item.price,
                ix,
                item.name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::sample_record;
    use std::str::FromStr;

    #[test]
    fn test_deserialize_full_record() {
        let json = r#"{
            "merchantName": "Cafe X",
            "date": "2025-10-19",
            "totalAmount": 12.5,
            "currency": "$",
            "category": "Dining",
            "items": [
                {"name": "Coffee", "quantity": 2, "price": 4.5},
                {"name": "Bagel", "quantity": 1, "price": 3.5}
            ]
        }"#;
        let record: ReceiptRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.merchant_name(), "Cafe X");
        assert_eq!(record.date(), "2025-10-19");
        assert_eq!(record.total_amount().to_string(), "12.5");
        assert_eq!(record.display_category(), Category::Dining);
        assert_eq!(record.items().len(), 2);
        assert_eq!(record.items()[0].name(), "Coffee");
        assert_eq!(record.items()[0].quantity().to_string(), "2");
        assert_eq!(record.items()[1].name(), "Bagel");
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "merchantName": "Corner Shop",
            "totalAmount": 3,
            "category": "Groceries",
            "items": [{"name": "Milk", "price": 3}]
        }"#;
        let record: ReceiptRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.date(), "");
        assert_eq!(record.currency(), "");
        assert_eq!(record.items()[0].quantity().to_string(), "1");
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let json = r#"{"merchantName": "Corner Shop", "category": "Groceries", "items": []}"#;
        assert!(serde_json::from_str::<ReceiptRecord>(json).is_err());
        let json = r#"{"merchantName": "X", "totalAmount": 1, "category": "Other",
            "items": [{"name": "Milk"}]}"#;
        assert!(serde_json::from_str::<ReceiptRecord>(json).is_err());
    }

    #[test]
    fn test_serialize_uses_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(json["merchantName"], "Cafe X");
        assert_eq!(json["totalAmount"], 12.5);
        assert!(json.get("merchant_name").is_none());
    }

    #[test]
    fn test_validate_rejects_negative_amounts() {
        let mut record = sample_record();
        assert!(record.validate().is_ok());
        record.items_mut()[1].set_price(Amount::from_str("-1").unwrap());
        let message = record.validate().unwrap_err().to_string();
        assert!(message.contains("item 1 'Bagel'"), "{message}");

        let record = ReceiptRecord::new(
            "Refund",
            "",
            Amount::from_str("-5").unwrap(),
            "$",
            "Other",
            vec![],
        );
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_display_category_fallback_keeps_raw_label() {
        let mut record = sample_record();
        record.set_category("Coffee");
        assert_eq!(record.category(), "Coffee");
        assert_eq!(record.display_category(), Category::Other);
    }
}
