use serde::{Deserialize, Serialize};

/// Listing description submitted from the prediction form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    pub beds: i32,
    /// Number of occupants
    pub accommodates: i32,
    pub bathrooms: i32,
    pub neighbourhood: String,
}

/// API Response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: serde_json::to_value(data).ok(),
        }
    }
}

/// Result of a single price prediction
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub request_id: uuid::Uuid,
    /// Unrounded model estimate
    pub price: f64,
    /// Two-decimal rendering with currency suffix
    pub display: String,
    pub currency_symbol: String,
    /// Raw feature vector in model order
    pub features: Vec<f64>,
}

/// A district selectable in the form
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Neighbourhood {
    pub name: String,
    pub code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HostsParams {
    pub limit: Option<usize>,
}

/// Formats a price for display, e.g. `123.45 €`
pub fn format_price(price: f64, currency_symbol: &str) -> String {
    format!("{:.2} {}", price, currency_symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price_rounds_to_two_decimals() {
        assert_eq!(format_price(123.456, "€"), "123.46 €");
        assert_eq!(format_price(80.0, "€"), "80.00 €");
        assert_eq!(format_price(0.004, "$"), "0.00 $");
    }

    #[test]
    fn test_listing_query_wire_shape() {
        let query: ListingQuery = serde_json::from_str(
            r#"{"beds":1,"accommodates":2,"bathrooms":1,"neighbourhood":"I Centro Storico"}"#,
        )
        .unwrap();
        assert_eq!(query.accommodates, 2);
        assert_eq!(query.neighbourhood, "I Centro Storico");
    }
}
