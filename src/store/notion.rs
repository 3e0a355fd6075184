//! Notion-backed record store
//!
//! Translates [`Filter`], [`Fields`] and [`Icon`] to the Notion REST
//! payloads and parses database pages back into [`Record`]s.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{FieldValue, Fields, Filter, Icon, Record, RecordStore};
use crate::error::RecordStoreError;

const NOTION_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Record store talking to the Notion API.
pub struct NotionRecordStore {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NotionRecordStore {
    /// Create a store authenticated with an integration secret.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, NOTION_BASE_URL.to_string())
    }

    /// Create a store against a custom API root.
    #[must_use]
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Notion-Version", NOTION_VERSION)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, RecordStoreError> {
        let resp = self.authorized(builder).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %text, "Notion API error");
            return Err(RecordStoreError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        resp.json()
            .await
            .map_err(|e| RecordStoreError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for NotionRecordStore {
    async fn query(
        &self,
        collection_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>, RecordStoreError> {
        let url = format!("{}/databases/{collection_id}/query", self.base_url);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = query_body(filter, cursor.as_deref());
            debug!(collection = collection_id, "querying Notion database");
            let page = self.send(self.client.post(&url).json(&body)).await?;

            let results = page
                .get("results")
                .and_then(Value::as_array)
                .ok_or_else(|| RecordStoreError::Parse("query response has no results".into()))?;
            for result in results {
                records.push(record_from_page(result)?);
            }

            let has_more = page.get("has_more").and_then(Value::as_bool) == Some(true);
            cursor = page
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_string);
            if !has_more || cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }

    async fn create_record(
        &self,
        collection_id: &str,
        fields: Fields,
        icon: Option<Icon>,
    ) -> Result<Record, RecordStoreError> {
        let url = format!("{}/pages", self.base_url);
        let mut body = json!({
            "parent": { "type": "database_id", "database_id": collection_id },
            "properties": properties_to_json(&fields),
        });
        if let Some(icon) = &icon {
            body["icon"] = icon_to_json(icon);
        }

        let page = self.send(self.client.post(&url).json(&body)).await?;
        record_from_page(&page)
    }

    async fn update_record(
        &self,
        record_id: &str,
        fields: Fields,
    ) -> Result<(), RecordStoreError> {
        let url = format!("{}/pages/{record_id}", self.base_url);
        let body = json!({ "properties": properties_to_json(&fields) });
        self.send(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }
}

fn query_body(filter: Option<&Filter>, cursor: Option<&str>) -> Value {
    let mut body = Map::new();
    if let Some(filter) = filter {
        body.insert("filter".to_string(), filter_to_json(filter));
    }
    if let Some(cursor) = cursor {
        body.insert("start_cursor".to_string(), json!(cursor));
    }
    Value::Object(body)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Convert a filter to the Notion database query filter object.
#[must_use]
pub fn filter_to_json(filter: &Filter) -> Value {
    match filter {
        Filter::SelectEquals { property, value } => {
            json!({ "property": property, "select": { "equals": value } })
        }
        Filter::SelectNotEquals { property, value } => {
            json!({ "property": property, "select": { "does_not_equal": value } })
        }
        Filter::DateOnOrBefore { property, date } => {
            json!({ "property": property, "date": { "on_or_before": format_date(*date) } })
        }
        Filter::DateOnOrAfter { property, date } => {
            json!({ "property": property, "date": { "on_or_after": format_date(*date) } })
        }
        Filter::DateEquals { property, date } => {
            json!({ "property": property, "date": { "equals": format_date(*date) } })
        }
        Filter::And(filters) => json!({ "and": filters.iter().map(filter_to_json).collect::<Vec<_>>() }),
        Filter::Or(filters) => json!({ "or": filters.iter().map(filter_to_json).collect::<Vec<_>>() }),
    }
}

fn text_content(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content } }])
}

/// Convert record fields to a Notion `properties` object.
#[must_use]
pub fn properties_to_json(fields: &Fields) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| {
            let property = match value {
                FieldValue::Title(text) => json!({ "title": text_content(text) }),
                FieldValue::RichText(text) => json!({ "rich_text": text_content(text) }),
                FieldValue::Date { start, end } => json!({
                    "date": { "start": format_date(*start), "end": end.map(format_date) }
                }),
                FieldValue::Select(option) => json!({ "select": { "name": option } }),
                FieldValue::Relation(ids) => json!({
                    "relation": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
                }),
                FieldValue::Checkbox(checked) => json!({ "checkbox": checked }),
            };
            (name.clone(), property)
        })
        .collect();
    Value::Object(properties)
}

/// Convert an icon to the Notion icon object.
#[must_use]
pub fn icon_to_json(icon: &Icon) -> Value {
    match icon {
        Icon::Emoji(emoji) => json!({ "type": "emoji", "emoji": emoji }),
        Icon::External(url) => json!({ "type": "external", "external": { "url": url } }),
    }
}

/// Parse a page icon. Uploaded file icons become external links since
/// their signed payload cannot be sent back to the API.
fn icon_from_json(icon: &Value) -> Option<Icon> {
    match icon.get("type")?.as_str()? {
        "emoji" => icon.get("emoji")?.as_str().map(|e| Icon::Emoji(e.to_string())),
        kind @ ("external" | "file") => icon
            .get(kind)?
            .get("url")?
            .as_str()
            .map(|u| Icon::External(u.to_string())),
        _ => None,
    }
}

fn plain_text(parts: &Value) -> String {
    parts
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("plain_text")
                        .or_else(|| part.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_date(value: Option<&Value>) -> Option<NaiveDate> {
    let raw = value?.as_str()?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

fn field_from_property(property: &Value) -> Option<FieldValue> {
    match property.get("type")?.as_str()? {
        "title" => Some(FieldValue::Title(plain_text(property.get("title")?))),
        "rich_text" => Some(FieldValue::RichText(plain_text(property.get("rich_text")?))),
        "select" => property
            .get("select")?
            .get("name")
            .and_then(Value::as_str)
            .map(|name| FieldValue::Select(name.to_string())),
        "date" => {
            let date = property.get("date")?;
            Some(FieldValue::Date {
                start: parse_date(date.get("start"))?,
                end: parse_date(date.get("end")),
            })
        }
        "relation" => Some(FieldValue::Relation(
            property
                .get("relation")?
                .as_array()?
                .iter()
                .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
                .collect(),
        )),
        "checkbox" => property
            .get("checkbox")
            .and_then(Value::as_bool)
            .map(FieldValue::Checkbox),
        _ => None,
    }
}

/// Parse a Notion page object into a record.
///
/// Property types the core does not use are dropped.
pub fn record_from_page(page: &Value) -> Result<Record, RecordStoreError> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RecordStoreError::Parse("page has no id".to_string()))?
        .to_string();

    let fields = page
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .filter_map(|(name, property)| {
                    field_from_property(property).map(|value| (name.clone(), value))
                })
                .collect()
        })
        .unwrap_or_default();

    let icon = page.get("icon").and_then(icon_from_json);

    Ok(Record { id, fields, icon })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_select_filter_json() {
        let filter = Filter::select_equals("Status", "Active");
        assert_eq!(
            filter_to_json(&filter),
            json!({ "property": "Status", "select": { "equals": "Active" } })
        );
    }

    #[test]
    fn test_compound_filter_json() {
        let filter = Filter::And(vec![
            Filter::date_on_or_before("Date Range", date(2023, 4, 5)),
            Filter::select_not_equals("Status", "Archive"),
        ]);
        assert_eq!(
            filter_to_json(&filter),
            json!({ "and": [
                { "property": "Date Range", "date": { "on_or_before": "2023-04-05" } },
                { "property": "Status", "select": { "does_not_equal": "Archive" } },
            ]})
        );
    }

    #[test]
    fn test_query_body_includes_cursor_only_when_paging() {
        assert_eq!(query_body(None, None), json!({}));
        let filter = Filter::select_equals("Status", "Upcoming");
        let body = query_body(Some(&filter), Some("abc"));
        assert_eq!(body["start_cursor"], "abc");
        assert_eq!(body["filter"]["select"]["equals"], "Upcoming");
    }

    #[test]
    fn test_properties_json() {
        let mut fields = Fields::new();
        fields.insert("Name".to_string(), FieldValue::Title("Read".to_string()));
        fields.insert(
            "Date".to_string(),
            FieldValue::Date {
                start: date(2023, 4, 10),
                end: None,
            },
        );
        fields.insert("Missed".to_string(), FieldValue::Checkbox(true));
        fields.insert(
            "Cycle".to_string(),
            FieldValue::Relation(vec!["c1".to_string()]),
        );

        let json = properties_to_json(&fields);
        assert_eq!(json["Name"]["title"][0]["text"]["content"], "Read");
        assert_eq!(json["Date"]["date"]["start"], "2023-04-10");
        assert!(json["Date"]["date"]["end"].is_null());
        assert_eq!(json["Missed"]["checkbox"], true);
        assert_eq!(json["Cycle"]["relation"][0]["id"], "c1");
    }

    #[test]
    fn test_record_from_page() {
        let page = json!({
            "id": "page-1",
            "icon": { "type": "emoji", "emoji": "🌘" },
            "properties": {
                "Name": { "type": "title", "title": [{ "plain_text": "April" }] },
                "Status": { "type": "select", "select": { "name": "Active" } },
                "Date Range": { "type": "date", "date": { "start": "2023-04-01", "end": "2023-04-15" } },
                "Formula": { "type": "formula", "formula": { "number": 3 } },
            }
        });

        let record = record_from_page(&page).unwrap();
        assert_eq!(record.id, "page-1");
        assert_eq!(record.title("Name"), Some("April"));
        assert_eq!(record.select("Status"), Some("Active"));
        assert_eq!(
            record.date("Date Range"),
            Some((date(2023, 4, 1), Some(date(2023, 4, 15))))
        );
        assert!(!record.fields.contains_key("Formula"));
        assert_eq!(record.icon, Some(Icon::Emoji("🌘".to_string())));
    }

    #[test]
    fn test_record_from_page_empty_select_is_dropped() {
        let page = json!({
            "id": "page-2",
            "properties": {
                "Status": { "type": "select", "select": null },
                "Start": { "type": "date", "date": { "start": "2023-04-01T09:00:00.000Z", "end": null } },
            }
        });
        let record = record_from_page(&page).unwrap();
        assert_eq!(record.select("Status"), None);
        assert_eq!(record.date("Start"), Some((date(2023, 4, 1), None)));
        assert_eq!(record.icon, None);
    }

    #[test]
    fn test_file_icon_becomes_external() {
        let icon = json!({
            "type": "file",
            "file": { "url": "https://files.example/icon.png", "expiry_time": "2023-04-01T00:00:00Z" }
        });
        assert_eq!(
            icon_from_json(&icon),
            Some(Icon::External("https://files.example/icon.png".to_string()))
        );
    }

    #[test]
    fn test_record_from_page_requires_id() {
        let err = record_from_page(&json!({ "properties": {} })).unwrap_err();
        assert!(matches!(err, RecordStoreError::Parse(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = NotionRecordStore::with_base_url(
            "secret_x".to_string(),
            "http://localhost:9000/v1/".to_string(),
        );
        assert_eq!(store.base_url, "http://localhost:9000/v1");
    }
}
