use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::{PriceValue, ProductRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub narrative: Option<String>,
    pub tool_call_names: Vec<String>,
    pub tool_call_count: usize,
    pub confidence: Option<f64>,
    pub session_id: Option<String>,
    pub workflow_completed: Option<bool>,
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedResponse {
    Reply(AssistantReply),
    Failure(String),
}

// The collaborator answers either as {success: true, response: {...}} or as a
// flat body carrying `message` directly. Anything else is unrecognized.
pub fn decode_response(body: &Value) -> DecodedResponse {
    if body.get("success").and_then(Value::as_bool) == Some(true) {
        if let Some(inner) = body.get("response") {
            if !inner.is_null() {
                return DecodedResponse::Reply(decode_reply(inner));
            }
        }
    }
    if body.get("message").is_some() {
        return DecodedResponse::Reply(decode_reply(body));
    }
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("failed to process message")
        .to_string();
    DecodedResponse::Failure(error)
}

fn decode_reply(payload: &Value) -> AssistantReply {
    let narrative = match payload.get("message") {
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Object(obj)) => Some(
            obj.get("message")
                .or_else(|| obj.get("content"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| Value::Object(obj.clone()).to_string()),
        ),
        _ => None,
    };

    let tool_calls = payload.get("toolCalls").and_then(Value::as_array);
    let tool_call_names = tool_calls
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| tc.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let tool_call_count = tool_calls.map(|arr| arr.len()).unwrap_or(0);

    AssistantReply {
        narrative,
        tool_call_names,
        tool_call_count,
        confidence: payload.get("confidence").and_then(Value::as_f64),
        session_id: payload
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string),
        workflow_completed: payload.get("workflowCompleted").and_then(Value::as_bool),
        products: extract_products(payload),
    }
}

// Extraction cascade: the structured tool-call path is the authoritative
// contract; everything after it is a best-effort fallback for the looser
// response shapes the collaborator has been observed to emit. Every step
// degrades to an empty list instead of erroring.
pub fn extract_products(payload: &Value) -> Vec<ProductRecord> {
    if payload.is_null() {
        return Vec::new();
    }

    if let Some(found) = tool_call_products(payload) {
        if !found.is_empty() {
            debug!(count = found.len(), "products from tool-call result path");
            return found;
        }
    }

    for key in [
        "products",
        "productRecommendations",
        "items",
        "recommendations",
        "suggestions",
    ] {
        if let Some(arr) = payload.get(key).and_then(Value::as_array) {
            let found = parse_records(arr);
            debug!(key, count = found.len(), "products from top-level array");
            // an explicitly empty array still settles the question
            return found;
        }
    }

    if let Some(text) = payload.get("message").and_then(Value::as_str) {
        if let Some(found) = embedded_json_products(text) {
            if !found.is_empty() {
                debug!(count = found.len(), "products from embedded JSON in message");
                return found;
            }
        }
    }

    if let Some(arr) = payload.as_array() {
        if arr.first().is_some_and(looks_like_product) {
            let found = parse_records(arr);
            if !found.is_empty() {
                debug!(count = found.len(), "payload itself is a product array");
                return found;
            }
        }
    }

    if let Some(blocks) = payload.get("content").and_then(Value::as_array) {
        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    let found = parse_products_from_text(text);
                    if !found.is_empty() {
                        debug!(count = found.len(), "products mined from content block");
                        return found;
                    }
                }
            }
        }
    }

    if let Some(text) = payload.get("message").and_then(Value::as_str) {
        let found = parse_products_from_text(text);
        if !found.is_empty() {
            debug!(count = found.len(), "products mined from narrative text");
            return found;
        }
    }

    debug!("no recognizable product shape in response");
    Vec::new()
}

fn tool_call_products(payload: &Value) -> Option<Vec<ProductRecord>> {
    let products = payload
        .get("toolCalls")?
        .get(0)?
        .get("result")?
        .get("content")?
        .get(0)?
        .get("products")?;
    let mut out = Vec::new();
    if let Some(top) = products.get("topPick") {
        if let Ok(rec) = serde_json::from_value::<ProductRecord>(top.clone()) {
            out.push(rec);
        }
    }
    if let Some(recs) = products.get("recommendations").and_then(Value::as_array) {
        out.extend(parse_records(recs));
    }
    Some(out)
}

fn parse_records(arr: &[Value]) -> Vec<ProductRecord> {
    arr.iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

fn looks_like_product(v: &Value) -> bool {
    v.is_object() && (v.get("name").is_some() || v.get("title").is_some() || v.get("id").is_some())
}

fn embedded_json_products(text: &str) -> Option<Vec<ProductRecord>> {
    let re = Regex::new(r"(?s)\{.*\}").ok()?;
    let snippet = re.find(text)?;
    let parsed: Value = serde_json::from_str(snippet.as_str()).ok()?;
    let arr = parsed.get("products")?.as_array()?;
    Some(parse_records(arr))
}

// Mines the markdown the collaborator writes when it answers in prose:
// a bold-labelled "top recommendation" block, an "Alternative Options"
// section, and loose Product Name / Product N: lines. Synthetic ids and
// placeholder prices keep downstream consumers working until the backend
// sends structured records.
pub fn parse_products_from_text(text: &str) -> Vec<ProductRecord> {
    let mut products: Vec<ProductRecord> = Vec::new();

    if let Some(name) = first_capture(text, r"\*\*Product Name:\*\*\s*([^\n]+)") {
        let code = first_capture(text, r"\*\*Product Code:\*\*\s*([^\n]+)")
            .unwrap_or_else(|| "text-top-1".into());
        let mut rec = ProductRecord::new(code.clone(), name);
        rec.description = first_capture(text, r"\*\*Description:\*\*\s*([^\n]+)");
        rec.brand = first_capture(text, r"\*\*Brand:\*\*\s*([^\n]+)");
        rec.category = first_capture(text, r"\*\*Age Group:\*\*\s*([^\n]+)");
        rec.form = first_capture(text, r"\*\*Form:\*\*\s*([^\n]+)");
        rec.price = Some(PriceValue::money(29.99, "USD"));
        rec.images = rec
            .brand
            .as_ref()
            .map(|b| vec![format!("/images/brand-{}.svg", b.to_lowercase())]);
        rec.sku = Some(code);
        products.push(rec);
    }

    if let Some(section) = first_capture(text, r"(?s)\*\*Alternative Options\*\*(.*?)(?:\n###|\z)") {
        let numbered = all_captures(&section, r"\d+\.\s*\*\*Product Name:\*\*\s*([^\n]+)");
        if !numbered.is_empty() {
            let codes = all_captures(&section, r"\*\*Product Code:\*\*\s*([^\n]+)");
            let descriptions = all_captures(&section, r"\*\*Description:\*\*\s*([^\n]+)");
            for (i, name) in numbered.into_iter().enumerate() {
                if products.iter().any(|p| p.name == name) {
                    continue;
                }
                let code = codes
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("text-alt-{}", i + 1));
                let mut rec = ProductRecord::new(code.clone(), name);
                rec.description = descriptions.get(i).cloned();
                rec.price = Some(PriceValue::money(24.99 + (i as f64) * 2.0, "USD"));
                rec.sku = Some(code);
                products.push(rec);
            }
        } else {
            for (i, name) in all_captures(&section, r"\*\*Product Name:\*\*\s*([^\n]+)")
                .into_iter()
                .enumerate()
            {
                if products.iter().any(|p| p.name == name) {
                    continue;
                }
                let code = first_capture(&section, r"\*\*Product Code:\*\*\s*([^\n]+)")
                    .unwrap_or_else(|| format!("text-alt-{}", i + 1));
                let mut rec = ProductRecord::new(code.clone(), name);
                rec.price = Some(PriceValue::money(22.99 + (i as f64) * 1.5, "USD"));
                rec.sku = Some(code);
                products.push(rec);
            }
        }
    }

    if let Ok(re) =
        Regex::new(r"(?m)^\s*(?:\d+\.\s*)?(?:[-•]\s*)?\*\*Product Name:\*\*\s*([^\n]+)")
    {
        let blocks: Vec<(String, usize, usize)> = re
            .captures_iter(text)
            .filter_map(|c| {
                let whole = c.get(0)?;
                let name = c.get(1)?.as_str().trim().to_string();
                Some((name, whole.start(), whole.end()))
            })
            .collect();
        for (i, (name, _, block_start)) in blocks.iter().enumerate() {
            if products.iter().any(|p| &p.name == name) {
                continue;
            }
            let block_end = blocks.get(i + 1).map(|b| b.1).unwrap_or(text.len());
            let block = &text[*block_start..block_end];
            let code = first_capture(block, r"\*\*Product Code:\*\*\s*([^\n]+)")
                .unwrap_or_else(|| format!("auto-{}", i + 1));
            let mut rec = ProductRecord::new(code.clone(), name.clone());
            rec.description = first_capture(block, r"\*\*Description:\*\*\s*([^\n]+)");
            rec.brand =
                first_capture(block, r"\*\*Brand:\*\*\s*([^\n]+)").map(|b| b.to_uppercase());
            rec.price = Some(PriceValue::money(19.99 + i as f64, "USD"));
            rec.images = rec
                .brand
                .as_ref()
                .map(|b| vec![format!("/images/brand-{}.svg", b.to_lowercase())]);
            rec.sku = Some(code);
            products.push(rec);
        }
    }

    for (i, name) in all_captures(text, r"(?i)(?:Product|Item|Option)\s*\d*[:-]\s*([^\n]+)")
        .into_iter()
        .enumerate()
    {
        if name.len() < 10 || products.iter().any(|p| p.name == name) {
            continue;
        }
        let id = format!("text-opt-{}", i + 1);
        let mut rec = ProductRecord::new(id.clone(), name);
        rec.price = Some(PriceValue::money(18.99 + (i as f64) * 0.5, "USD"));
        rec.sku = Some(id);
        products.push(rec);
    }

    products
}

pub fn extract_customer_email(text: &str) -> Option<String> {
    let re = Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").ok()?;
    re.find(text).map(|m| m.as_str().to_string())
}

fn first_capture(text: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn all_captures(text: &str, pattern: &str) -> Vec<String> {
    let Some(re) = Regex::new(pattern).ok() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_path_yields_top_pick_then_recommendations() {
        let payload = json!({
            "message": "Here are some options",
            "toolCalls": [{
                "result": {
                    "content": [{
                        "products": {
                            "topPick": {"id": "p-1", "name": "Top pick"},
                            "recommendations": [
                                {"id": "p-2", "name": "Second"},
                                {"id": "p-3", "name": "Third"}
                            ]
                        }
                    }]
                }
            }]
        });
        let found = extract_products(&payload);
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-1", "p-2", "p-3"]);
    }

    #[test]
    fn tool_call_path_tolerates_missing_top_pick() {
        let payload = json!({
            "toolCalls": [{"result": {"content": [{"products": {
                "recommendations": [{"id": "p-9", "name": "Only rec"}]
            }}]}}]
        });
        let found = extract_products(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "p-9");
    }

    #[test]
    fn top_level_arrays_are_checked_in_order() {
        let payload = json!({"productRecommendations": [{"id": "a", "name": "A"}]});
        assert_eq!(extract_products(&payload).len(), 1);

        let payload = json!({"suggestions": [{"id": "s", "name": "S"}]});
        assert_eq!(extract_products(&payload)[0].id, "s");
    }

    #[test]
    fn empty_products_array_settles_the_cascade() {
        let payload = json!({
            "products": [],
            "message": "**Product Name:** Would Otherwise Match"
        });
        assert!(extract_products(&payload).is_empty());
    }

    #[test]
    fn embedded_json_in_message_is_parsed() {
        let payload = json!({
            "message": "Here you go: {\"products\": [{\"id\": \"j-1\", \"name\": \"From JSON\"}]}"
        });
        let found = extract_products(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "j-1");
    }

    #[test]
    fn payload_array_of_products_is_accepted() {
        let payload = json!([{"id": "x", "name": "X"}, {"id": "y", "name": "Y"}]);
        assert_eq!(extract_products(&payload).len(), 2);
        // arrays of non-products are left alone
        assert!(extract_products(&json!([{"foo": 1}])).is_empty());
    }

    #[test]
    fn content_text_blocks_are_mined() {
        let payload = json!({
            "content": [
                {"type": "image", "url": "ignored"},
                {"type": "text", "text": "**Product Name:** Gentle Formula\n**Product Code:** gf-100"}
            ]
        });
        let found = extract_products(&payload);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "gf-100");
        assert_eq!(found[0].name, "Gentle Formula");
    }

    #[test]
    fn unrecognized_shapes_yield_empty() {
        assert!(extract_products(&json!({"message": "no products here"})).is_empty());
        assert!(extract_products(&json!({"status": "ok"})).is_empty());
        assert!(extract_products(&Value::Null).is_empty());
    }

    #[test]
    fn text_mining_top_recommendation_block() {
        let text = "### Top Recommendation\n\
            **Product Name:** Hypoallergenic Infant Formula\n\
            **Product Code:** hf-200\n\
            **Description:** For sensitive tummies\n\
            **Brand:** Acme\n\
            **Age Group:** Infant\n\
            **Form:** Powder\n";
        let found = parse_products_from_text(text);
        assert_eq!(found.len(), 1);
        let rec = &found[0];
        assert_eq!(rec.id, "hf-200");
        assert_eq!(rec.name, "Hypoallergenic Infant Formula");
        assert_eq!(rec.description.as_deref(), Some("For sensitive tummies"));
        assert_eq!(rec.brand.as_deref(), Some("Acme"));
        assert_eq!(rec.category.as_deref(), Some("Infant"));
        assert_eq!(rec.form.as_deref(), Some("Powder"));
        assert_eq!(rec.price, Some(PriceValue::money(29.99, "USD")));
        assert_eq!(rec.images, Some(vec!["/images/brand-acme.svg".to_string()]));
    }

    #[test]
    fn text_mining_alternative_options_with_incrementing_prices() {
        let text = "**Product Name:** Main Pick\n\
            **Product Code:** main-1\n\
            ### **Alternative Options**\n\
            1. **Product Name:** Alt One\n\
            **Product Code:** alt-1\n\
            **Description:** First alternative\n\
            2. **Product Name:** Alt Two\n\
            **Product Code:** alt-2\n\
            **Description:** Second alternative\n\
            ### Next Section\n";
        let found = parse_products_from_text(text);
        let names: Vec<&str> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Main Pick", "Alt One", "Alt Two"]);
        assert_eq!(found[1].id, "alt-1");
        assert_eq!(found[1].price, Some(PriceValue::money(24.99, "USD")));
        assert_eq!(found[2].price, Some(PriceValue::money(26.99, "USD")));
    }

    #[test]
    fn text_mining_generic_scanner_slices_between_blocks() {
        let text = "intro\n\
            - **Product Name:** Scanner One\n\
            **Product Code:** sc-1\n\
            **Brand:** acme\n\
            - **Product Name:** Scanner Two\n\
            **Product Code:** sc-2\n\
            **Description:** second block only\n";
        let found = parse_products_from_text(text);
        assert_eq!(found.len(), 2);
        // first record comes from the top-recommendation pass (whole-text scan)
        assert_eq!(found[0].id, "sc-1");
        assert_eq!(found[0].name, "Scanner One");
        assert_eq!(found[0].brand.as_deref(), Some("acme"));
        // second comes from the block scanner, which only sees its own slice
        assert_eq!(found[1].id, "sc-2");
        assert_eq!(found[1].name, "Scanner Two");
        assert_eq!(found[1].description.as_deref(), Some("second block only"));
        assert_eq!(found[1].price, Some(PriceValue::money(20.99, "USD")));
    }

    #[test]
    fn text_mining_structured_lines_require_length() {
        let text = "Option 1: A very descriptive product name\nItem 2: short\n";
        let found = parse_products_from_text(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "A very descriptive product name");
        assert_eq!(found[0].price, Some(PriceValue::money(18.99, "USD")));
    }

    #[test]
    fn decode_unwraps_envelope_and_flat_shapes() {
        let envelope = json!({"success": true, "response": {"message": "hi there"}});
        match decode_response(&envelope) {
            DecodedResponse::Reply(r) => assert_eq!(r.narrative.as_deref(), Some("hi there")),
            other => panic!("expected reply, got {other:?}"),
        }

        let flat = json!({"message": "flat body", "confidence": 0.9, "sessionId": "s-1"});
        match decode_response(&flat) {
            DecodedResponse::Reply(r) => {
                assert_eq!(r.narrative.as_deref(), Some("flat body"));
                assert_eq!(r.confidence, Some(0.9));
                assert_eq!(r.session_id.as_deref(), Some("s-1"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn decode_surfaces_error_bodies_as_failure() {
        let body = json!({"success": false, "error": "backend exploded"});
        assert_eq!(
            decode_response(&body),
            DecodedResponse::Failure("backend exploded".into())
        );
        assert_eq!(
            decode_response(&json!({"status": "??"})),
            DecodedResponse::Failure("failed to process message".into())
        );
    }

    #[test]
    fn decode_handles_object_messages() {
        let nested = json!({"message": {"content": "from content"}});
        match decode_response(&nested) {
            DecodedResponse::Reply(r) => assert_eq!(r.narrative.as_deref(), Some("from content")),
            other => panic!("expected reply, got {other:?}"),
        }

        let opaque = json!({"message": {"weird": true}});
        match decode_response(&opaque) {
            DecodedResponse::Reply(r) => {
                assert_eq!(r.narrative.as_deref(), Some(r#"{"weird":true}"#))
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn decode_collects_tool_call_names() {
        let body = json!({
            "message": "done",
            "toolCalls": [{"name": "search_products"}, {"name": "check_inventory"}, {"noname": 1}]
        });
        match decode_response(&body) {
            DecodedResponse::Reply(r) => {
                assert_eq!(r.tool_call_names, vec!["search_products", "check_inventory"]);
                assert_eq!(r.tool_call_count, 3);
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn customer_email_first_match_wins() {
        assert_eq!(
            extract_customer_email("reach me at jane.doe@example.com or j@x.io"),
            Some("jane.doe@example.com".into())
        );
        assert_eq!(extract_customer_email("no address here"), None);
        assert_eq!(extract_customer_email("bad@host.c"), None);
    }
}
