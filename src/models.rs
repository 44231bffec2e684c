use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const CLIENT_NAME: &str = "Storefront Assistant Client";
pub const CLIENT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializeRequest {
    pub jsonrpc: &'static str,
    pub id: &'static str,
    pub method: &'static str,
    pub params: InitializeParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: &'static str,
    pub capabilities: Capabilities,
    pub client_info: ClientInfo,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: serde_json::Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl InitializeRequest {
    pub fn new() -> Self {
        Self {
            jsonrpc: "2.0",
            id: "1",
            method: "initialize",
            params: InitializeParams {
                protocol_version: PROTOCOL_VERSION,
                capabilities: Capabilities { tools: serde_json::Map::new() },
                client_info: ClientInfo { name: CLIENT_NAME, version: CLIENT_VERSION },
            },
        }
    }
}

impl Default for InitializeRequest {
    fn default() -> Self {
        Self::new()
    }
}

// The collaborator's product payloads are not contractually fixed; anything
// beyond id/name is optional and unknown fields ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: String,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl ProductRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            price: None,
            images: None,
            brand: None,
            category: None,
            sku: None,
            form: None,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PriceValue {
    Money { value: f64, currency: String },
    Amount(f64),
    Text(String),
    Other(Value),
}

impl PriceValue {
    pub fn money(value: f64, currency: impl Into<String>) -> Self {
        Self::Money { value, currency: currency.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Price {
    pub value: f64,
    pub currency: String,
}

pub fn normalize_price(price: &PriceValue) -> Option<Price> {
    match price {
        PriceValue::Money { value, currency } => {
            Some(Price { value: *value, currency: currency.clone() })
        }
        PriceValue::Amount(value) => Some(Price { value: *value, currency: "USD".into() }),
        PriceValue::Text(text) => {
            let value_re = Regex::new(r"(\d+(?:\.\d{2})?)").ok()?;
            let value: f64 = value_re.captures(text)?.get(1)?.as_str().parse().ok()?;
            let currency = Regex::new(r"([A-Z]{3})")
                .ok()
                .and_then(|re| re.captures(text))
                .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
                .unwrap_or_else(|| "USD".into());
            Some(Price { value, currency })
        }
        PriceValue::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_price_accepts_all_supported_shapes() {
        let n = normalize_price(&PriceValue::Amount(12.5)).unwrap();
        assert_eq!(n.value, 12.5);
        assert_eq!(n.currency, "USD");

        let n = normalize_price(&PriceValue::money(9.99, "EUR")).unwrap();
        assert_eq!(n.value, 9.99);
        assert_eq!(n.currency, "EUR");

        let n = normalize_price(&PriceValue::Text("$29.99".into())).unwrap();
        assert_eq!(n.value, 29.99);
        assert_eq!(n.currency, "USD");

        let n = normalize_price(&PriceValue::Text("29.99 EUR".into())).unwrap();
        assert_eq!(n.value, 29.99);
        assert_eq!(n.currency, "EUR");
    }

    #[test]
    fn normalize_price_rejects_unparseable_values() {
        assert!(normalize_price(&PriceValue::Text("free".into())).is_none());
        assert!(normalize_price(&PriceValue::Other(json!({"amount": 3}))).is_none());
    }

    #[test]
    fn price_value_deserializes_untagged() {
        let money: PriceValue = serde_json::from_value(json!({"value": 29.99, "currency": "USD"})).unwrap();
        assert_eq!(money, PriceValue::money(29.99, "USD"));

        let amount: PriceValue = serde_json::from_value(json!(15)).unwrap();
        assert_eq!(amount, PriceValue::Amount(15.0));

        let text: PriceValue = serde_json::from_value(json!("$5.00")).unwrap();
        assert_eq!(text, PriceValue::Text("$5.00".into()));

        // malformed price objects stay opaque instead of failing the record
        let other: PriceValue = serde_json::from_value(json!({"value": "n/a"})).unwrap();
        assert!(matches!(other, PriceValue::Other(_)));
    }

    #[test]
    fn product_record_tolerates_sparse_and_extra_fields() {
        let rec: ProductRecord = serde_json::from_value(json!({
            "id": "sim-1",
            "name": "Similac Alimentum",
            "availability": "in_stock",
            "rating": 4.5
        }))
        .unwrap();
        assert_eq!(rec.id, "sim-1");
        assert!(rec.price.is_none());
        assert_eq!(rec.extra.get("availability"), Some(&json!("in_stock")));

        let titled: ProductRecord =
            serde_json::from_value(json!({"id": "x", "title": "Listed by title"})).unwrap();
        assert_eq!(titled.name, "Listed by title");
    }

    #[test]
    fn chat_request_omits_absent_fields() {
        let body = serde_json::to_value(ChatRequest {
            message: "hi".into(),
            session_id: Some("s-1".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({"message": "hi", "sessionId": "s-1"}));
    }

    #[test]
    fn initialize_envelope_shape() {
        let body = serde_json::to_value(InitializeRequest::new()).unwrap();
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "initialize");
        assert_eq!(body["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(body["params"]["capabilities"]["tools"], json!({}));
        assert_eq!(body["params"]["clientInfo"]["name"], CLIENT_NAME);
    }
}
