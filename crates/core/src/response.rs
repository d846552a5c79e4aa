use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Widget kinds the chat UI can render. The numeric ids are a wire
/// contract with existing clients and must not be renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Products,
    Orders,
    Subscriptions,
    Options,
}

impl WidgetKind {
    pub fn widget_id(self) -> u32 {
        match self {
            Self::Options => 1,
            Self::Products => 2,
            Self::Orders => 3,
            Self::Subscriptions => 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetPayload {
    #[serde(rename = "widgetId")]
    pub widget_id: u32,
    pub widgets_type: u32,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub widget: Value,
}

impl WidgetPayload {
    pub fn new(kind: WidgetKind, widget: Value) -> Self {
        Self { widget_id: kind.widget_id(), widgets_type: kind.widget_id(), kind, widget }
    }

    pub fn options<S: AsRef<str>>(labels: impl IntoIterator<Item = S>) -> Self {
        let values = labels.into_iter().map(|label| Value::from(label.as_ref())).collect();
        Self::new(WidgetKind::Options, Value::Array(values))
    }
}

/// The one response shape every code path funnels into. Constructed fresh
/// per request with a new `request_id`, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub response: String,
    pub request_id: String,
    pub widgets: Vec<WidgetPayload>,
}

impl CanonicalResponse {
    pub fn text(response: impl Into<String>) -> Self {
        Self::with_widgets(response, Vec::new())
    }

    pub fn with_widgets(response: impl Into<String>, widgets: Vec<WidgetPayload>) -> Self {
        Self { response: response.into(), request_id: Uuid::new_v4().to_string(), widgets }
    }
}
