use serde_json::{json, Value};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(Value::Object(fields)) = data {
                if let Some(object) = response.as_object_mut() {
                    object.extend(fields);
                }
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a JSON document; text mode prints it pretty as well
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Output a list of `(code, name)` rows, or the raw collection as JSON
pub fn output_rows(
    output_format: &OutputFormat,
    collection_name: &str,
    collection: Value,
    rows: &[(String, String)],
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({
                collection_name: collection
            }))?);
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No {} found", collection_name);
            }
            let width = rows.iter().map(|(code, _)| code.len()).max().unwrap_or(0);
            for (code, name) in rows {
                println!("{:<width$}  {}", code, name, width = width);
            }
        }
    }
    Ok(())
}

/// Extract target item code from optional parameter or use current
pub fn resolve_target_item(
    provided: Option<String>,
    current: Option<String>,
    item_type: &str,
) -> anyhow::Result<String> {
    match provided.or(current) {
        Some(code) => Ok(code),
        None => Err(anyhow::anyhow!(
            "No {} given and no current {} selected",
            item_type,
            item_type
        )),
    }
}

/// Capitalize the first letter of a label for messages
pub fn title_case(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
