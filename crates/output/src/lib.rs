use std::collections::BTreeSet;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::{Map, Value};
use tabled::builder::Builder;
use tabled::settings::Style;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
    /// Ticket numbers (or ids) only, one per line.
    Quiet,
}

pub struct OutputRenderer {
    format: OutputFormat,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = self.to_text(value)?;
        if !text.is_empty() {
            println!("{text}");
        }
        Ok(())
    }

    pub fn to_text<T: Serialize>(&self, value: &T) -> Result<String> {
        let json_value = serde_json::to_value(value)?;

        let text = match self.format {
            OutputFormat::Table => match Self::table(&json_value) {
                Some(table) => table,
                None => serde_json::to_string_pretty(&json_value)?,
            },
            OutputFormat::Json => serde_json::to_string_pretty(&json_value)?,
            OutputFormat::Yaml => serde_yaml::to_string(&json_value)?
                .trim_end()
                .to_string(),
            OutputFormat::Quiet => Self::quiet(&json_value).join("\n"),
        };

        Ok(text)
    }

    /// Status line for a completed action. Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if self.format != OutputFormat::Quiet {
            println!("{} {}", "✔".green().bold(), message);
        }
    }

    pub fn failure(&self, message: &str) {
        eprintln!("{} {}", "✘".red().bold(), message);
    }

    fn table(value: &Value) -> Option<String> {
        let (headers, rows) = match value {
            Value::Object(obj) if !obj.is_empty() => Self::field_rows(obj),
            other => Self::coerce_rows(other)?,
        };

        let mut builder = Builder::default();
        builder.push_record(headers);
        for row in rows {
            builder.push_record(row);
        }

        Some(builder.build().with(Style::rounded()).to_string())
    }

    fn field_rows(obj: &Map<String, Value>) -> (Vec<String>, Vec<Vec<String>>) {
        let rows: Vec<Vec<String>> = obj
            .iter()
            .map(|(key, val)| vec![key.clone(), Self::value_to_string(val)])
            .collect();
        (vec!["field".to_string(), "value".to_string()], rows)
    }

    fn coerce_rows(value: &Value) -> Option<(Vec<String>, Vec<Vec<String>>)> {
        let rows = match value {
            Value::Array(rows) if !rows.is_empty() => rows,
            _ => return None,
        };

        let mut headers = BTreeSet::new();
        for row in rows {
            if let Value::Object(obj) = row {
                headers.extend(obj.keys().cloned());
            }
        }

        if headers.is_empty() {
            return None;
        }

        let headers: Vec<String> = headers.into_iter().collect();
        let data: Vec<Vec<String>> = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|obj| {
                headers
                    .iter()
                    .map(|h| obj.get(h).map(Self::value_to_string).unwrap_or_default())
                    .collect::<Vec<String>>()
            })
            .collect();

        Some((headers, data))
    }

    fn quiet(value: &Value) -> Vec<String> {
        let key_of = |obj: &Map<String, Value>| {
            let present = |key: &str| obj.get(key).filter(|v| !v.is_null());
            present("number")
                .or_else(|| present("id"))
                .map(Self::value_to_string)
        };

        match value {
            Value::Array(rows) => rows
                .iter()
                .filter_map(|row| match row {
                    Value::Object(obj) => key_of(obj),
                    Value::Null => None,
                    other => Some(Self::value_to_string(other)),
                })
                .collect(),
            Value::Object(obj) => key_of(obj).into_iter().collect(),
            Value::Null => Vec::new(),
            other => vec![Self::value_to_string(other)],
        }
    }

    fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}
