//! Front-matter extraction.
//!
//! A document may open with a metadata block:
//!
//! ```text
//! ---                      +++
//! title: Hello             title = "Hello"
//! tags: [rust, sync]       tags = ["rust", "sync"]
//! ---                      +++
//! body…                    body…
//! ```
//!
//! `---` blocks are YAML unless tagged `---toml`; `+++` blocks are TOML.
//! A block without a closing fence is treated as ordinary body text.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use docsync_core::models::DocumentMetadata;
use docsync_core::{Result, SyncError};

/// Typed fields read from a front-matter block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

/// Split `raw` into its front matter and body. `id` only labels errors.
///
/// The body is returned untrimmed with `\r\n` normalised to `\n`.
pub fn split_front_matter(id: &str, raw: &str) -> Result<(FrontMatter, String)> {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw).replace("\r\n", "\n");

    let Some((format, fence, block, body)) = locate_block(&text) else {
        return Ok((FrontMatter::default(), text));
    };
    tracing::trace!(id, ?format, fence, "found front matter");

    let fields = match format {
        Format::Yaml => parse_yaml(block),
        Format::Toml => parse_toml(block),
    }
    .map_err(|message| SyncError::FrontMatter {
        id: id.to_string(),
        message,
    })?;

    Ok((front_matter_from(id, fields), body.to_string()))
}

/// Find the opening and closing fences. Returns the format, the fence,
/// the block between the fences and everything after the closing fence.
fn locate_block(text: &str) -> Option<(Format, &'static str, &str, &str)> {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let (format, fence) = match first.trim_end() {
        "---" | "---yaml" | "---yml" => (Format::Yaml, "---"),
        "---toml" => (Format::Toml, "---"),
        "+++" => (Format::Toml, "+++"),
        _ => return None,
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == fence {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((format, fence, block, body));
        }
        offset += line.len();
    }
    None
}

/// Format-neutral view of the values we care about.
#[derive(Debug, Clone, PartialEq)]
enum Field {
    Missing,
    Text(String),
    List(Vec<Field>),
}

#[derive(Debug, Default)]
struct Fields {
    title: Option<Field>,
    date: Option<Field>,
    tags: Option<Field>,
    categories: Option<Field>,
}

fn parse_yaml(block: &str) -> std::result::Result<Fields, String> {
    let value: serde_yaml::Value = serde_yaml::from_str(block).map_err(|e| e.to_string())?;
    let mapping = match value {
        serde_yaml::Value::Null => return Ok(Fields::default()),
        serde_yaml::Value::Mapping(mapping) => mapping,
        _ => return Err("front matter is not a key/value mapping".to_string()),
    };

    let get = |key: &str| mapping.get(key).map(yaml_field);
    Ok(Fields {
        title: get("title"),
        date: get("date"),
        tags: get("tags"),
        categories: get("categories"),
    })
}

fn yaml_field(value: &serde_yaml::Value) -> Field {
    use serde_yaml::Value;
    match value {
        Value::Null => Field::Missing,
        Value::Bool(b) => Field::Text(b.to_string()),
        Value::Number(n) => Field::Text(n.to_string()),
        Value::String(s) => Field::Text(s.clone()),
        Value::Sequence(items) => Field::List(items.iter().map(yaml_field).collect()),
        Value::Tagged(tagged) => yaml_field(&tagged.value),
        Value::Mapping(_) => Field::Missing,
    }
}

fn parse_toml(block: &str) -> std::result::Result<Fields, String> {
    let table: toml::Table = toml::from_str(block).map_err(|e| e.to_string())?;
    let get = |key: &str| table.get(key).map(toml_field);
    Ok(Fields {
        title: get("title"),
        date: get("date"),
        tags: get("tags"),
        categories: get("categories"),
    })
}

fn toml_field(value: &toml::Value) -> Field {
    use toml::Value;
    match value {
        Value::String(s) => Field::Text(s.clone()),
        Value::Integer(i) => Field::Text(i.to_string()),
        Value::Float(f) => Field::Text(f.to_string()),
        Value::Boolean(b) => Field::Text(b.to_string()),
        Value::Datetime(dt) => Field::Text(dt.to_string()),
        Value::Array(items) => Field::List(items.iter().map(toml_field).collect()),
        Value::Table(_) => Field::Missing,
    }
}

fn front_matter_from(id: &str, fields: Fields) -> FrontMatter {
    let title = match fields.title {
        Some(Field::Text(t)) if !t.trim().is_empty() => Some(t),
        _ => None,
    };

    let date = match fields.date {
        Some(Field::Text(raw)) => {
            let parsed = parse_date(&raw);
            if parsed.is_none() {
                tracing::debug!(id, date = %raw, "ignoring unparseable front-matter date");
            }
            parsed
        }
        _ => None,
    };

    FrontMatter {
        title,
        metadata: DocumentMetadata {
            date,
            tags: flatten(fields.tags),
            categories: flatten(fields.categories),
        },
    }
}

/// A scalar becomes a one-element list; nested lists are flattened in order.
fn flatten(field: Option<Field>) -> Vec<String> {
    fn walk(field: Field, out: &mut Vec<String>) {
        match field {
            Field::Missing => {}
            Field::Text(s) => out.push(s),
            Field::List(items) => items.into_iter().for_each(|item| walk(item, out)),
        }
    }
    let mut out = Vec::new();
    if let Some(field) = field {
        walk(field, &mut out);
    }
    out
}

/// Parse the date layouts blogs commonly use.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for layout in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
