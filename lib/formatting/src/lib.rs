//! Renders structured results into the always-present text side of
//! success responses, and error chains into display text.

use comfy_table::{Table, presets::ASCII_MARKDOWN};
use serde_json::Value;
use serror::Serror;

/// Text rendering of an arbitrary structured payload:
/// arrays of records become markdown-ish tables, records become
/// `key: value` lines, scalars pass through.
pub fn text_from_value(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Array(items) if items.is_empty() => {
      String::from("(empty)")
    }
    Value::Array(items) => {
      if items.iter().all(Value::is_object) {
        render_table(items)
      } else {
        items
          .iter()
          .map(render_scalar)
          .collect::<Vec<_>>()
          .join("\n")
      }
    }
    Value::Object(map) => map
      .iter()
      .map(|(k, v)| format!("{k}: {}", render_scalar(v)))
      .collect::<Vec<_>>()
      .join("\n"),
    scalar => render_scalar(scalar),
  }
}

fn render_table(items: &[Value]) -> String {
  // Header order follows first appearance across all rows.
  let mut columns: Vec<&str> = Vec::new();
  for item in items {
    if let Value::Object(map) = item {
      for key in map.keys() {
        if !columns.contains(&key.as_str()) {
          columns.push(key);
        }
      }
    }
  }

  let mut table = Table::new();
  table.load_preset(ASCII_MARKDOWN);
  table.set_header(columns.clone());
  for item in items {
    let Value::Object(map) = item else {
      continue;
    };
    table.add_row(
      columns
        .iter()
        .map(|column| {
          map.get(*column).map(render_scalar).unwrap_or_default()
        })
        .collect::<Vec<_>>(),
    );
  }
  table.to_string()
}

fn render_scalar(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    // Nested structures stay compact inside cells.
    nested => nested.to_string(),
  }
}

pub fn format_serror(Serror { error, trace }: &Serror) -> String {
  let trace = if !trace.is_empty() {
    let mut out = String::from("\n\nTRACE:");
    for (i, msg) in trace.iter().enumerate() {
      out.push_str(&format!("\n\t{}: {msg}", i + 1));
    }
    out
  } else {
    Default::default()
  };
  format!("ERROR: {error}{trace}")
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn arrays_of_records_render_as_tables() {
    let value = json!([
      { "host": "tower", "name": "plex", "state": "running" },
      { "host": "nas", "name": "arr", "state": "exited" },
    ]);
    let text = text_from_value(&value);
    assert!(text.contains("host"));
    assert!(text.contains("plex"));
    assert!(text.contains("nas"));
    // Two data rows plus header rows.
    assert!(text.lines().count() >= 4);
  }

  #[test]
  fn records_render_as_key_value_lines() {
    let value = json!({ "host": "tower", "reachable": true });
    let text = text_from_value(&value);
    assert!(text.contains("host: tower"));
    assert!(text.contains("reachable: true"));
  }

  #[test]
  fn ragged_rows_keep_column_union() {
    let value = json!([
      { "a": 1 },
      { "a": 2, "b": "x" },
    ]);
    let text = text_from_value(&value);
    assert!(text.contains('a'));
    assert!(text.contains('b'));
  }

  #[test]
  fn scalars_pass_through() {
    assert_eq!(text_from_value(&json!("done")), "done");
    assert_eq!(text_from_value(&json!(3)), "3");
    assert_eq!(text_from_value(&json!([])), "(empty)");
    assert_eq!(text_from_value(&json!(["a", "b"])), "a\nb");
  }
}
