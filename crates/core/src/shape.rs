//! Response shape resolver.
//!
//! Specialist agents reply with opaque JSON; the UI needs one of four
//! widget shapes or plain text. Detection is by marker substring on the
//! serialized payload, checked in a fixed precedence order. That ordering
//! is a compatibility contract: payloads can contain more than one marker
//! (an order row may embed product ids) and existing clients depend on
//! products winning over orders winning over subscriptions. A schema tag
//! on the agent replies would be the cleaner dispatch, but until every
//! endpoint emits one the precedence below is authoritative.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::response::{CanonicalResponse, WidgetKind, WidgetPayload};

const PRODUCT_MARKER: &str = "\"productId\"";
const ORDER_MARKER: &str = "\"masterOrderId\"";
const SUBSCRIPTION_MARKER: &str = "\"subscriptionId\"";
const STORE_MARKER: &str = "\"storeId\"";
const TEXT_MARKER: &str = "\"text\"";
const OPTIONS_MARKER: &str = "\"options\"";

const PRODUCTS_TEXT: &str =
    "We've found exactly what you're looking for! Check out your search results below.";
const ORDERS_TEXT: &str = "Here are your recent orders:";
const SUBSCRIPTIONS_TEXT: &str = "Here are your subscriptions:";

const LOAD_MORE_PRODUCTS: [&str; 1] = ["Load More Products"];
const ORDER_OPTIONS: [&str; 4] =
    ["Load More Orders", "Last Month", "Last 3 Months", "Last 6 Months"];
const SUBSCRIPTION_OPTIONS: [&str; 4] = [
    "View All Subscriptions",
    "Active Subscriptions",
    "Paused Subscriptions",
    "Cancelled Subscriptions",
];

/// Classifies a raw agent reply into a canonical response.
///
/// First match wins. A failed JSON parse in the structured rules logs and
/// falls through; the final rule is an unconditional passthrough, so every
/// input resolves to some response.
pub fn resolve(raw: &str) -> CanonicalResponse {
    if raw.contains(PRODUCT_MARKER) {
        match serde_json::from_str(raw) {
            Ok(products) => {
                return CanonicalResponse::with_widgets(
                    PRODUCTS_TEXT,
                    vec![
                        WidgetPayload::new(WidgetKind::Products, products),
                        WidgetPayload::options(LOAD_MORE_PRODUCTS),
                    ],
                );
            }
            Err(error) => debug!(%error, "product payload did not parse as JSON, falling through"),
        }
    }

    if raw.contains(ORDER_MARKER) {
        match serde_json::from_str(raw) {
            Ok(orders) => {
                return CanonicalResponse::with_widgets(
                    ORDERS_TEXT,
                    vec![
                        WidgetPayload::new(WidgetKind::Orders, orders),
                        WidgetPayload::options(ORDER_OPTIONS),
                    ],
                );
            }
            Err(error) => debug!(%error, "order payload did not parse as JSON, falling through"),
        }
    }

    if raw.contains(SUBSCRIPTION_MARKER) && raw.contains(STORE_MARKER) {
        match serde_json::from_str(raw) {
            Ok(subscriptions) => {
                return CanonicalResponse::with_widgets(
                    SUBSCRIPTIONS_TEXT,
                    vec![
                        WidgetPayload::new(WidgetKind::Subscriptions, subscriptions),
                        WidgetPayload::options(SUBSCRIPTION_OPTIONS),
                    ],
                );
            }
            Err(error) => {
                debug!(%error, "subscription payload did not parse as JSON, falling through")
            }
        }
    }

    if raw.contains(TEXT_MARKER) && raw.contains(OPTIONS_MARKER) {
        return resolve_text_options(raw);
    }

    CanonicalResponse::text(raw)
}

/// Extracts `text` and `options` by quoted-string pattern match rather
/// than a full JSON parse, so agents that emit slightly malformed JSON
/// still render. Missing pieces degrade to an empty string / empty list.
fn resolve_text_options(raw: &str) -> CanonicalResponse {
    let text = text_pattern()
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|group| group.as_str().to_string())
        .unwrap_or_default();

    let options: Vec<String> = options_pattern()
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|group| {
            quoted_pattern()
                .captures_iter(group.as_str())
                .filter_map(|item| item.get(1))
                .map(|item| item.as_str().to_string())
                .collect()
        })
        .unwrap_or_default();

    CanonicalResponse::with_widgets(text, vec![WidgetPayload::options(options)])
}

fn text_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""text":\s*"([^"]*)""#).expect("static pattern"))
}

fn options_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""options":\s*\[([^\]]*)\]"#).expect("static pattern"))
}

fn quoted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("static pattern"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::resolve;
    use crate::response::WidgetKind;

    #[test]
    fn product_payload_becomes_products_plus_load_more() {
        let resolved = resolve(r#"{"productId": "p1", "name": "Widget"}"#);

        assert_eq!(
            resolved.response,
            "We've found exactly what you're looking for! Check out your search results below."
        );
        assert_eq!(resolved.widgets.len(), 2);
        assert_eq!(resolved.widgets[0].kind, WidgetKind::Products);
        assert_eq!(resolved.widgets[0].widget, json!({"productId": "p1", "name": "Widget"}));
        assert_eq!(resolved.widgets[1].kind, WidgetKind::Options);
        assert_eq!(resolved.widgets[1].widget, json!(["Load More Products"]));
    }

    #[test]
    fn order_payload_becomes_orders_plus_time_ranges() {
        let resolved = resolve(r#"[{"masterOrderId": "o42", "status": "shipped"}]"#);

        assert_eq!(resolved.response, "Here are your recent orders:");
        assert_eq!(resolved.widgets[0].kind, WidgetKind::Orders);
        assert_eq!(
            resolved.widgets[1].widget,
            json!(["Load More Orders", "Last Month", "Last 3 Months", "Last 6 Months"])
        );
    }

    #[test]
    fn subscription_payload_requires_both_markers() {
        let with_both = resolve(r#"{"subscriptionId": "sub1", "storeId": "store9"}"#);
        assert_eq!(with_both.response, "Here are your subscriptions:");
        assert_eq!(with_both.widgets[0].kind, WidgetKind::Subscriptions);

        let missing_store = resolve(r#"{"subscriptionId": "sub1"}"#);
        assert!(missing_store.widgets.is_empty());
        assert_eq!(missing_store.response, r#"{"subscriptionId": "sub1"}"#);
    }

    #[test]
    fn product_marker_wins_over_order_marker() {
        let resolved = resolve(r#"{"productId": "p1", "masterOrderId": "o1"}"#);
        assert_eq!(resolved.widgets[0].kind, WidgetKind::Products);
    }

    #[test]
    fn malformed_product_json_falls_through_to_passthrough() {
        let raw = r#"{"productId": "p1", "name": "#;
        let resolved = resolve(raw);
        assert!(resolved.widgets.is_empty());
        assert_eq!(resolved.response, raw);
    }

    #[test]
    fn malformed_product_json_can_still_match_a_later_rule() {
        let raw = r#"broken {"productId" and also "text": "Pick one", "options": ["A", "B"]"#;
        let resolved = resolve(raw);
        assert_eq!(resolved.response, "Pick one");
        assert_eq!(resolved.widgets.len(), 1);
        assert_eq!(resolved.widgets[0].kind, WidgetKind::Options);
    }

    #[test]
    fn text_and_options_extract_without_full_json_parse() {
        let raw = r#"{"text": "How can I help?", "options": ["Orders", "Products", "Support"]}"#;
        let resolved = resolve(raw);

        assert_eq!(resolved.response, "How can I help?");
        assert_eq!(resolved.widgets.len(), 1);
        assert_eq!(resolved.widgets[0].kind, WidgetKind::Options);
        assert_eq!(resolved.widgets[0].widget, json!(["Orders", "Products", "Support"]));
    }

    #[test]
    fn text_options_with_missing_pieces_degrades_gracefully() {
        let resolved = resolve(r#"has "text" and "options" markers but no values"#);
        assert_eq!(resolved.response, "");
        assert_eq!(resolved.widgets[0].widget, json!([]));
    }

    #[test]
    fn plain_text_passes_through_unchanged() {
        let resolved = resolve("Your order will arrive on Tuesday.");
        assert_eq!(resolved.response, "Your order will arrive on Tuesday.");
        assert!(resolved.widgets.is_empty());
    }

    #[test]
    fn passthrough_resolution_is_idempotent() {
        let first = resolve("Plain answer with no markers.");
        let second = resolve(&first.response);
        assert_eq!(first.response, second.response);
        assert_eq!(first.widgets, second.widgets);
    }
}
