//! The fixed instruction and output schema sent with every extraction request.

use crate::model::Category;
use serde_json::{json, Value};

/// The natural-language instruction that accompanies the image.
pub const INSTRUCTION: &str = "Analyze this receipt image and extract details in a structured \
JSON format. Pay special attention to 'category'. Categorize the expense into exactly one of \
these: 'Dining', 'Groceries', 'Travel', 'Shopping', 'Utilities', 'Health', 'Entertainment', \
'Services', or 'Other' based on the merchant and items.";

/// The `responseSchema` describing a `ReceiptRecord`, in the OpenAPI subset Gemini accepts.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "merchantName": {
                "type": "STRING",
                "description": "Name of the store or restaurant"
            },
            "date": {
                "type": "STRING",
                "description": "Date of the transaction (YYYY-MM-DD)"
            },
            "totalAmount": {
                "type": "NUMBER",
                "description": "The final total paid"
            },
            "currency": {
                "type": "STRING",
                "description": "Currency symbol or code (e.g., USD, EUR, $)"
            },
            "category": {
                "type": "STRING",
                "description": format!("Categorize as: {}", Category::prompt_list())
            },
            "items": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "quantity": { "type": "NUMBER" },
                        "price": { "type": "NUMBER" }
                    },
                    "required": ["name", "price"]
                }
            }
        },
        "required": ["merchantName", "totalAmount", "category", "items"]
    })
}
