use crate::cli::OutputFormat;
use cloudip::CheckResult;
use comfy_table::presets::NOTHING;
use comfy_table::*;
use serde::Serialize;

/*-------------------------------------------------------------------------------------------------
  Output Functions
-------------------------------------------------------------------------------------------------*/

const IP_HEADER: &str = "IP";
const PROVIDER_HEADER: &str = "Provider";

/// Provider column value: the matching provider, `unknown` when none matched, or `ERROR` when
/// the lookup failed.
pub fn provider_label(result: &CheckResult) -> String {
    match (&result.provider, &result.error) {
        (Some(provider), _) => provider.to_string(),
        (None, Some(_)) => "ERROR".to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Render `results` in the requested format.
pub fn render(
    format: OutputFormat,
    results: &[CheckResult],
    header: bool,
    delimiter: &str,
) -> serde_json::Result<String> {
    match format {
        OutputFormat::Text => Ok(text(results, header, delimiter)),
        OutputFormat::Table => Ok(table(results, header)),
        OutputFormat::Json => json(results),
    }
}

/*--------------------------------------------------------------------------------------
  Text
--------------------------------------------------------------------------------------*/

pub fn text(results: &[CheckResult], header: bool, delimiter: &str) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(results.len() + 1);
    if header {
        lines.push(format!("{IP_HEADER}{delimiter}{PROVIDER_HEADER}"));
    }
    for result in results {
        lines.push(format!("{}{}{}", result.ip, delimiter, provider_label(result)));
    }
    lines.join("\n")
}

/*--------------------------------------------------------------------------------------
  Table
--------------------------------------------------------------------------------------*/

pub fn table(results: &[CheckResult], header: bool) -> String {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled);

    if header {
        table.set_header(vec![
            Cell::new(IP_HEADER).add_attribute(Attribute::Bold),
            Cell::new(PROVIDER_HEADER).add_attribute(Attribute::Bold),
        ]);
    }

    for result in results {
        let provider = provider_label(result);
        let provider_cell = if result.is_error() && result.provider.is_none() {
            Cell::new(provider).fg(Color::Red)
        } else {
            Cell::new(provider)
        };
        table.add_row(vec![Cell::new(&result.ip), provider_cell]);
    }

    table.to_string()
}

/*--------------------------------------------------------------------------------------
  JSON
--------------------------------------------------------------------------------------*/

#[derive(Serialize)]
struct JsonRow<'r> {
    #[serde(rename = "IP")]
    ip: &'r str,

    #[serde(rename = "Provider")]
    provider: String,

    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn json(results: &[CheckResult]) -> serde_json::Result<String> {
    let rows: Vec<JsonRow> = results
        .iter()
        .map(|result| JsonRow {
            ip: &result.ip,
            provider: provider_label(result),
            error: result.error.as_ref().map(|error| error.to_string()),
        })
        .collect();
    serde_json::to_string(&rows)
}

/*-------------------------------------------------------------------------------------------------
  Unit Tests
-------------------------------------------------------------------------------------------------*/
