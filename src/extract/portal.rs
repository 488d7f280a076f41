//! Customer-portal adapter.
//!
//! Loads the panel page, fills the consumer-number form the way a visitor
//! would (hidden inputs kept, history button included), submits it and reads
//! the consumption table out of the response.

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::PortalConfig;
use crate::extract::{ExtractError, UsageExtractor};
use crate::record::{ExtractedUsage, UsageRecord, IDENTITY_NOT_FOUND};

/// Identity tables are label/value pairs; the usage table is wider.
const IDENTITY_TABLE_WIDTH: usize = 2;

pub struct PortalExtractor {
    client: Client,
    url: Url,
    consumer_id: String,
    consumer_field: String,
    history_button: String,
}

#[derive(Debug, Clone, PartialEq)]
struct HistoryForm {
    method: Method,
    action: Url,
    fields: Vec<(String, String)>,
}

impl PortalExtractor {
    pub fn new(portal: &PortalConfig, consumer_id: impl Into<String>) -> Result<Self, ExtractError> {
        let url = Url::parse(&portal.url)
            .map_err(|e| ExtractError::Config(format!("portal url {:?}: {e}", portal.url)))?;
        let client = Client::builder()
            .user_agent(concat!("meter-watch/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(portal.request_timeout())
            .build()?;
        Ok(Self {
            client,
            url,
            consumer_id: consumer_id.into().trim().to_string(),
            consumer_field: portal.consumer_field.clone(),
            history_button: portal.history_button.clone(),
        })
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<String, ExtractError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(ExtractError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl UsageExtractor for PortalExtractor {
    fn name(&self) -> &str {
        "portal"
    }

    async fn extract(&self) -> Result<ExtractedUsage, ExtractError> {
        if self.consumer_id.is_empty() {
            return Err(ExtractError::MissingConsumerId);
        }

        debug!(url = %self.url, "loading portal panel");
        let panel = self.fetch(self.client.get(self.url.clone())).await?;
        let form = find_history_form(
            &panel,
            &self.url,
            &self.consumer_field,
            &self.history_button,
            &self.consumer_id,
        )?;

        debug!(action = %form.action, method = %form.method, "submitting consumption history form");
        let request = if form.method == Method::GET {
            self.client.get(form.action.clone()).query(&form.fields)
        } else {
            self.client.post(form.action.clone()).form(&form.fields)
        };
        let page = self.fetch(request).await?;

        let usage = parse_usage_page(&page)?;
        info!(
            customer = %usage.customer_name,
            consumer_number = %usage.consumer_number,
            rows = usage.rows.len(),
            "portal usage table extracted"
        );
        Ok(usage)
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Config(format!("bad selector {css:?}: {e:?}")))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn find_history_form(
    html: &str,
    page_url: &Url,
    consumer_field: &str,
    history_button: &str,
    consumer_id: &str,
) -> Result<HistoryForm, ExtractError> {
    let doc = Html::parse_document(html);
    let form_sel = selector("form")?;
    let field_sel = selector(&format!("#{consumer_field}, [name=\"{consumer_field}\"]"))?;
    let button_sel = selector(&format!("#{history_button}"))?;
    let input_sel = selector("input[name], select[name], textarea[name]")?;

    let form = doc
        .select(&form_sel)
        .find(|form| form.select(&field_sel).next().is_some())
        .ok_or_else(|| ExtractError::Layout(format!("no form holds the {consumer_field} field")))?;
    let consumer_name = form
        .select(&field_sel)
        .next()
        .and_then(|el| el.value().attr("name"))
        .unwrap_or(consumer_field)
        .to_string();

    let mut fields = Vec::new();
    for input in form.select(&input_sel) {
        let el = input.value();
        let Some(name) = el.attr("name") else {
            continue;
        };
        let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
        let skipped = matches!(kind.as_str(), "submit" | "button" | "image" | "reset")
            || (matches!(kind.as_str(), "checkbox" | "radio") && el.attr("checked").is_none());
        if skipped || name == consumer_name {
            continue;
        }
        fields.push((name.to_string(), el.attr("value").unwrap_or_default().to_string()));
    }
    fields.push((consumer_name, consumer_id.to_string()));

    if let Some(button) = form.select(&button_sel).next() {
        if let Some(name) = button.value().attr("name") {
            let value = button
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| cell_text(button));
            fields.push((name.to_string(), value));
        }
    }

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page_url
            .join(action)
            .map_err(|e| ExtractError::Layout(format!("bad form action {action:?}: {e}")))?,
        _ => page_url.clone(),
    };
    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("get") => Method::GET,
        _ => Method::POST,
    };

    Ok(HistoryForm {
        method,
        action,
        fields,
    })
}

/// Reads the customer identity and the consumption rows from a result page.
pub fn parse_usage_page(html: &str) -> Result<ExtractedUsage, ExtractError> {
    let doc = Html::parse_document(html);
    let (customer_name, consumer_number) = extract_identity(&doc)?;

    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;
    let any_cell_sel = selector("td, th")?;

    let table = doc
        .select(&table_sel)
        .find(|table| {
            table
                .select(&row_sel)
                .map(|row| row.select(&any_cell_sel).count())
                .max()
                .unwrap_or(0)
                > IDENTITY_TABLE_WIDTH
        })
        .ok_or_else(|| ExtractError::Layout("consumption table not found".to_string()))?;

    // Header and totals rows live in thead/tfoot; only body rows are usage.
    let body_row_sel = selector("tbody > tr")?;
    let rows = if table.select(&body_row_sel).next().is_some() {
        table.select(&body_row_sel).collect::<Vec<_>>()
    } else {
        table.select(&row_sel).collect::<Vec<_>>()
    };
    let rows = rows
        .into_iter()
        .map(|row| row.select(&cell_sel).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .map(UsageRecord::new)
        .collect();

    Ok(ExtractedUsage {
        customer_name,
        consumer_number,
        rows,
    })
}

fn extract_identity(doc: &Html) -> Result<(String, String), ExtractError> {
    let panel_sel = selector("div.panel-body")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let values: Vec<Option<String>> = doc
        .select(&panel_sel)
        .next()
        .map(|panel| {
            panel
                .select(&row_sel)
                .take(2)
                .map(|row| row.select(&cell_sel).nth(1).map(cell_text))
                .collect()
        })
        .unwrap_or_default();

    match values.as_slice() {
        [Some(name), Some(number)] => Ok((name.clone(), number.clone())),
        _ => Ok((IDENTITY_NOT_FOUND.to_string(), IDENTITY_NOT_FOUND.to_string())),
    }
}
