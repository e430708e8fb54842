//! Output formatting for list results.

use clap::ValueEnum;
use csv::WriterBuilder;
use serde::Serialize;
use serde_json::{Map, Value};

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated values format.
    #[default]
    Tsv,
    /// Comma-separated values format.
    Csv,
    /// JSON format.
    Json,
}

/// Formats `items` as rows restricted to `fields`, in the order given.
///
/// Fields are matched against the serialized keys of `T`. An empty item list
/// formats to an empty string in every format.
pub fn format<T, F>(items: &[T], fields: &[F], format: OutputFormat) -> anyhow::Result<String>
where
    T: Serialize,
    F: Serialize,
{
    if items.is_empty() {
        return Ok(String::new());
    }

    let field_names = get_field_names(fields);
    let rows = items
        .iter()
        .map(|item| select_fields(serde_json::to_value(item)?, &field_names))
        .collect::<anyhow::Result<Vec<Map<String, Value>>>>()?;

    match format {
        OutputFormat::Tsv => format_delimited(&rows, &field_names, b'\t'),
        OutputFormat::Csv => format_delimited(&rows, &field_names, b','),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&rows)?),
    }
}

fn select_fields(item: Value, field_names: &[String]) -> anyhow::Result<Map<String, Value>> {
    let Value::Object(mut map) = item else {
        anyhow::bail!("Only structs can be formatted as rows");
    };

    Ok(field_names
        .iter()
        .map(|name| (name.clone(), map.remove(name).unwrap_or(Value::Null)))
        .collect())
}

fn format_delimited(
    rows: &[Map<String, Value>],
    field_names: &[String],
    delimiter: u8,
) -> anyhow::Result<String> {
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_writer(vec![]);

    for row in rows {
        let record = field_names
            .iter()
            .map(|name| row.get(name).map(stringify).unwrap_or_default())
            .collect::<Vec<String>>();

        writer.write_record(&record)?;
    }

    let bytes = writer.into_inner()?;
    let mut output = String::from_utf8(bytes)?;

    if output.ends_with('\n') {
        output.pop();
    }

    Ok(output)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.replace(['\t', '\r', '\n'], " ").trim().to_string(),
        Value::Array(arr) => arr.iter().map(stringify).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn get_field_names<F: Serialize>(fields: &[F]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|f| match serde_json::to_value(f) {
            Ok(Value::String(s)) => Some(s),
            _ => None,
        })
        .collect()
}
