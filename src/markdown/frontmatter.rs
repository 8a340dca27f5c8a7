use serde_yaml::Value;

/// Keys that only style the document and are never shown.
const HIDDEN_KEYS: &[&str] = &["cssclass", "status"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmatterEntry {
    pub key: String,
    pub value: FrontmatterValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontmatterValue {
    Text(String),
    /// YAML sequences, with wikilink brackets removed
    Tags(Vec<String>),
}

/// Parse a leading `---` YAML block.
///
/// Returns the visible entries and the line where the markdown body starts.
/// A block that is not a YAML mapping is left in the body.
pub fn parse(content: &str) -> (Option<Vec<FrontmatterEntry>>, usize) {
    let lines: Vec<&str> = content.lines().collect();

    if lines.is_empty() || lines[0].trim() != "---" {
        return (None, 0);
    }
    let end_index = match lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, line)| line.trim() == "---")
    {
        Some((i, _)) => i,
        None => return (None, 0),
    };

    let yaml_content = lines[1..end_index].join("\n");
    let mapping = match serde_yaml::from_str::<Value>(&yaml_content) {
        Ok(Value::Mapping(mapping)) => mapping,
        _ => return (None, 0),
    };

    let entries = mapping
        .iter()
        .filter_map(|(key, value)| {
            let key = scalar_text(key)?;
            if HIDDEN_KEYS.contains(&key.as_str()) {
                return None;
            }
            Some(FrontmatterEntry {
                key,
                value: entry_value(value),
            })
        })
        .collect();

    (Some(entries), end_index + 1)
}

fn entry_value(value: &Value) -> FrontmatterValue {
    match value {
        Value::Sequence(items) => FrontmatterValue::Tags(
            items
                .iter()
                .filter_map(scalar_text)
                .map(|item| item.replace("[[", "").replace("]]", ""))
                .collect(),
        ),
        other => FrontmatterValue::Text(scalar_text(other).unwrap_or_else(|| {
            serde_yaml::to_string(other)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        })),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
