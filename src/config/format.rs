//! Config file formats
//!
//! Every supported format is parsed into the same generic tree
//! (`serde_json::Value`) so the merger never cares where a value came from.

use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Supported config file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Yaml,
    Xml,
    Ini,
    Toml,
}

impl ConfigFormat {
    /// Pick the format for a file extension (without the dot)
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yml" | "yaml" => Some(ConfigFormat::Yaml),
            "xml" => Some(ConfigFormat::Xml),
            "ini" => Some(ConfigFormat::Ini),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Upper-case label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "JSON",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Xml => "XML",
            ConfigFormat::Ini => "INI",
            ConfigFormat::Toml => "TOML",
        }
    }

    /// Parse file contents into a generic tree
    pub fn parse(&self, contents: &str) -> Result<Value, String> {
        match self {
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => {
                if contents.trim().is_empty() {
                    return Ok(Value::Null);
                }
                let value: serde_yaml::Value =
                    serde_yaml::from_str(contents).map_err(|e| e.to_string())?;
                Ok(yaml_to_json(value))
            }
            ConfigFormat::Xml => parse_xml(contents),
            ConfigFormat::Ini => parse_ini(contents),
            ConfigFormat::Toml => {
                let value: toml::Value = toml::from_str(contents).map_err(|e| e.to_string())?;
                Ok(toml_to_json(value))
            }
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert YAML Value to JSON Value. Non-string keys use their scalar text.
fn yaml_to_json(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Parse INI keeping values raw: no escape processing, surrounding quotes
/// stripped. Sections become nested mappings.
fn parse_ini(contents: &str) -> Result<Value, String> {
    let options = ini::ParseOption {
        enabled_quote: true,
        enabled_escape: false,
        ..Default::default()
    };
    let document = ini::Ini::load_from_str_opt(contents, options).map_err(|e| e.to_string())?;

    let mut root = Map::new();
    for (section, properties) in document.iter() {
        let entries = properties
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())));

        match section {
            None => root.extend(entries),
            Some(name) => {
                let target = root
                    .entry(name.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(map) = target {
                    map.extend(entries);
                } else {
                    *target = Value::Object(entries.collect());
                }
            }
        }
    }

    Ok(Value::Object(root))
}

/// Element being assembled while walking XML events
struct XmlNode {
    name: String,
    attributes: Map<String, Value>,
    children: Vec<(String, Value)>,
    text: String,
}

impl XmlNode {
    fn open(start: &BytesStart<'_>) -> Result<Self, String> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            attributes.insert(key, Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// Text-only elements collapse to their text; everything else becomes a
    /// mapping of attributes and children, repeated children as arrays.
    fn close(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        if self.attributes.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(text));
        }

        let mut map = self.attributes;
        for (key, value) in self.children {
            match map.remove(&key) {
                None => {
                    map.insert(key, value);
                }
                Some(Value::Array(mut items)) => {
                    items.push(value);
                    map.insert(key, Value::Array(items));
                }
                Some(existing) => {
                    map.insert(key, Value::Array(vec![existing, value]));
                }
            }
        }
        if !text.is_empty() {
            map.insert("value".to_string(), Value::String(text));
        }
        (self.name, Value::Object(map))
    }
}

/// Parse XML; the document element itself is dropped and its content returned.
fn parse_xml(contents: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(contents);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(start) => stack.push(XmlNode::open(&start)?),
            Event::Empty(start) => {
                let node = XmlNode::open(&start)?;
                attach(&mut stack, &mut root, node.close())?;
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| e.to_string())?;
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| "unexpected closing tag".to_string())?;
                attach(&mut stack, &mut root, node.close())?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }

    root.ok_or_else(|| "document has no root element".to_string())
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<Value>,
    (name, value): (String, Value),
) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push((name, value));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(value);
            Ok(())
        }
        None => Err("document has more than one root element".to_string()),
    }
}
