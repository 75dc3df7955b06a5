//! Property-file materialisation.
//!
//! Turns the search locations computed for a request into an ordered list of
//! [`PropertySource`]s. Each directory is scanned for YAML, JSON and
//! `.properties` files named after the application and its profiles;
//! matching files are parsed and flattened into dotted keys
//! (`server.port`, `hosts[0]`), most specific file first.

use crate::environment::PropertySource;
use crate::error::{EnvironmentError, EnvironmentResult};
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["yml", "yaml", "json", "properties"];

/// Read the property sources for `application` under `profiles` from the
/// given search paths.
///
/// Priority within a directory: `{application}-{profile}` over
/// `{application}` over `application-{profile}` over `application`; later
/// profiles in the list rank above earlier ones. Directories are visited in
/// the order given (most specific first).
pub fn property_sources(
    search_paths: &[PathBuf],
    application: &str,
    profiles: &[String],
) -> EnvironmentResult<Vec<PropertySource>> {
    let mut stems: Vec<String> = Vec::new();
    let mut push = |stems: &mut Vec<String>, stem: String| {
        if !stems.contains(&stem) {
            stems.push(stem);
        }
    };
    for profile in profiles.iter().rev() {
        push(&mut stems, format!("{application}-{profile}"));
    }
    push(&mut stems, application.to_string());
    for profile in profiles.iter().rev() {
        push(&mut stems, format!("application-{profile}"));
    }
    push(&mut stems, "application".to_string());

    let mut sources = Vec::new();
    for dir in search_paths {
        for stem in &stems {
            for ext in EXTENSIONS {
                let path = dir.join(format!("{stem}.{ext}"));
                if path.is_file() {
                    sources.push(read_property_source(&path)?);
                    break;
                }
            }
        }
    }
    Ok(sources)
}

fn read_property_source(path: &Path) -> EnvironmentResult<PropertySource> {
    let text = fs::read_to_string(path).map_err(EnvironmentError::PropertyRead)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let value = match extension {
        "yml" | "yaml" => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&text).map_err(|e| parse_error(path, e))?;
            serde_json::to_value(yaml).map_err(|e| parse_error(path, e))?
        }
        "json" => serde_json::from_str(&text).map_err(|e| parse_error(path, e))?,
        _ => properties_value(&text),
    };

    let mut source = serde_json::Map::new();
    flatten("", &value, &mut source);
    Ok(PropertySource {
        name: path.display().to_string(),
        source,
    })
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> EnvironmentError {
    EnvironmentError::PropertyParse {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// Parse `key=value` lines; `#` and `!` start comments.
fn properties_value(text: &str) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(
                key.trim().to_string(),
                serde_json::Value::String(value.trim().to_string()),
            );
        }
    }
    serde_json::Value::Object(map)
}

fn flatten(prefix: &str, value: &serde_json::Value, out: &mut serde_json::Map<String, serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&key, nested, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten(&format!("{prefix}[{index}]"), nested, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}
