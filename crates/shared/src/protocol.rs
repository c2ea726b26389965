use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{LineItemId, OrderId, ProductId, ReviewId};

/// Fixed page size for every list endpoint.
pub const PER_PAGE: u32 = 20;

/// Reserved key in count summaries that holds the grand total.
pub const TOTAL_COUNT_KEY: &str = "total";

/// Meta-data key under which the extra product options plugin stores the
/// options a customer picked for a line item.
pub const PRODUCT_OPTIONS_META_KEY: &str = "_tmcartepo_data";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    #[serde(deserialize_with = "lenient::string")]
    pub first_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub last_name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub company: String,
    #[serde(deserialize_with = "lenient::string")]
    pub address_1: String,
    #[serde(deserialize_with = "lenient::string")]
    pub address_2: String,
    #[serde(deserialize_with = "lenient::string")]
    pub city: String,
    #[serde(deserialize_with = "lenient::string")]
    pub state: String,
    #[serde(deserialize_with = "lenient::string")]
    pub postcode: String,
    #[serde(deserialize_with = "lenient::string")]
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    pub fn full_name(&self) -> String {
        join_non_empty(&[&self.first_name, &self.last_name])
    }

    /// Single-line postal address, the form copied to the clipboard.
    pub fn one_line(&self) -> String {
        let street = join_non_empty(&[
            &self.address_1,
            &self.address_2,
            &self.city,
            &self.postcode,
            &self.state,
            &self.country,
        ]);
        let name = self.full_name();
        match (name.is_empty(), street.is_empty()) {
            (true, _) => street,
            (false, true) => name,
            (false, false) => format!("{name}, {street}"),
        }
    }
}

fn join_non_empty(parts: &[&String]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub id: LineItemId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default)]
    pub product_id: ProductId,
    #[serde(default)]
    pub variation_id: Option<i64>,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sku: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub total: String,
    #[serde(default)]
    pub meta_data: Vec<MetaData>,
}

impl LineItem {
    /// Customer-picked product options as `"name: value"` strings.
    ///
    /// Options are deduplicated by name; the last value for a name wins while
    /// the name keeps the position of its first appearance.
    pub fn display_options(&self) -> Vec<String> {
        let mut options: Vec<(String, String)> = Vec::new();
        let picked = self
            .meta_data
            .iter()
            .filter(|meta| meta.key == PRODUCT_OPTIONS_META_KEY)
            .filter_map(|meta| meta.value.as_array())
            .flatten();

        for option in picked {
            let Some(name) = option.get("name").and_then(Value::as_str) else {
                continue;
            };
            let value = option.get("value").map(value_as_text).unwrap_or_default();
            match options.iter_mut().find(|(existing, _)| existing == name) {
                Some(slot) => slot.1 = value,
                None => options.push((name.to_string(), value)),
            }
        }

        options
            .into_iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect()
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub number: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_symbol: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub total: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub shipping_total: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub total_tax: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub payment_method_title: String,
    #[serde(default, deserialize_with = "lenient::datetime")]
    pub date_created: Option<NaiveDateTime>,
    #[serde(default)]
    pub billing: Address,
    #[serde(default)]
    pub shipping: Address,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl OrderRecord {
    /// Currency prefix for amounts: the explicit symbol when the store sends
    /// one, otherwise the raw ISO code.
    pub fn currency_display(&self) -> &str {
        match self.currency_symbol.as_deref() {
            Some(symbol) if !symbol.trim().is_empty() => symbol,
            _ => &self.currency,
        }
    }

    /// Sum of every line item's `total`. Unparseable totals count as zero.
    pub fn product_total(&self) -> f64 {
        self.line_items
            .iter()
            .filter_map(|item| parse_decimal(&item.total))
            .sum()
    }

    pub fn product_total_display(&self) -> String {
        format!("{:.2}", self.product_total())
    }
}

/// Parses a decimal amount as sent by the API (`"12.50"`, `" 3 "`, `"-1.5"`).
/// The `.` separator is used regardless of the host locale.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sku: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stock_status: String,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub regular_price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub sale_price: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub permalink: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl ProductRecord {
    pub fn primary_image_url(&self) -> Option<&str> {
        self.images
            .first()
            .map(|image| image.src.as_str())
            .filter(|src| !src.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewAuthor {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    #[serde(default)]
    pub author: ReviewAuthor,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub product_title: String,
    #[serde(default, deserialize_with = "lenient::rating")]
    pub rating: Option<u8>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::datetime")]
    pub date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOption {
    pub code: String,
    pub label: String,
}

/// Ordered set of order status codes the store accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVocabulary {
    pub options: Vec<StatusOption>,
}

/// Status code used by list filters to mean "no status filter".
pub const ALL_STATUSES: &str = "all";

impl StatusVocabulary {
    /// Object-of-counts schema: every key except the total is a status code.
    pub fn from_counts(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        let options = object
            .keys()
            .filter(|key| key.as_str() != TOTAL_COUNT_KEY)
            .map(|key| StatusOption {
                code: key.clone(),
                label: key.clone(),
            })
            .collect();
        Some(Self { options })
    }

    /// Array-of-totals schema: `[{"slug": "pending", "name": "Pending payment", "total": 3}]`.
    pub fn from_totals(body: &Value) -> Option<Self> {
        let entries = body.as_array()?;
        let mut vocabulary = Self::default();
        for entry in entries {
            let slug = entry.get("slug").and_then(Value::as_str);
            let name = entry.get("name").and_then(Value::as_str);
            let (Some(slug), Some(name)) = (slug, name) else {
                continue;
            };
            vocabulary.insert(StatusOption {
                code: slug.to_string(),
                label: name.to_string(),
            });
        }
        Some(vocabulary)
    }

    fn insert(&mut self, option: StatusOption) {
        match self.options.iter_mut().find(|o| o.code == option.code) {
            Some(existing) => existing.label = option.label,
            None => self.options.push(option),
        }
    }

    /// Copy of the vocabulary prefixed with the "all" filter sentinel.
    pub fn with_all_sentinel(&self) -> Self {
        let mut options = Vec::with_capacity(self.options.len() + 1);
        options.push(StatusOption {
            code: ALL_STATUSES.to_string(),
            label: ALL_STATUSES.to_string(),
        });
        options.extend(
            self.options
                .iter()
                .filter(|option| option.code != ALL_STATUSES)
                .cloned(),
        );
        Self { options }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.options.iter().any(|option| option.code == code)
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Splits a count summary into `(key, count)` pairs, skipping the total key.
pub fn count_breakdown(counts: &Map<String, Value>) -> Vec<(String, u64)> {
    counts
        .iter()
        .filter(|(key, _)| key.as_str() != TOTAL_COUNT_KEY)
        .map(|(key, value)| (key.clone(), count_value(value)))
        .collect()
}

pub fn count_total(counts: &Map<String, Value>) -> u64 {
    counts.get(TOTAL_COUNT_KEY).map(count_value).unwrap_or_default()
}

fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number.as_u64().unwrap_or_default(),
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// `GET reports/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub sales: Value,
    #[serde(default)]
    pub orders_count: Map<String, Value>,
    #[serde(default)]
    pub pageviews: Option<Value>,
    #[serde(default)]
    pub seller_balance: Option<Value>,
}

/// `GET products/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductsSummary {
    pub post_counts: Map<String, Value>,
    #[serde(default)]
    pub products_sold: Option<Value>,
}

/// `GET reviews/summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewsSummary {
    pub comment_counts: Map<String, Value>,
}

/// Deserializers tolerant of the loose typing of WordPress REST payloads,
/// where the same field may arrive as a string, a number or `null`.
mod lenient {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => text,
            Value::Null => String::new(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => other.to_string(),
        })
    }

    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(number) => number.as_f64().unwrap_or_default(),
            Value::String(text) => super::parse_decimal(&text).unwrap_or_default(),
            _ => 0.0,
        })
    }

    pub fn rating<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(number) => number.as_u64().and_then(|n| u8::try_from(n).ok()),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Value::String(text) = Value::deserialize(deserializer)? else {
            return Ok(None);
        };
        let text = text.trim();
        Ok(NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
            .ok())
    }
}
