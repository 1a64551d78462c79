use crate::core::api::{ApiClient, TextQuery};
use crate::core::config::load_config;
use anyhow::Result;
use colored::*;
use serde_json::Value;

pub async fn run(query: TextQuery, json: bool) -> Result<()> {
    let config = load_config()?;
    let client = ApiClient::new(&config.backend_url);

    let result = client.search(&query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    // Pretty Print
    if let Some(results) = result.get("results").and_then(|v| v.as_array()) {
        if results.is_empty() {
            println!("No matching pills found.");
            return Ok(());
        }

        for item in results {
            let (header, details) = describe_hit(item);
            println!("{}", header);
            if !details.is_empty() {
                println!("  {}", details.dimmed());
            }
        }

        let total = result.get("total_hits").and_then(|n| n.as_u64()).unwrap_or(0);
        println!();
        println!("{} of {} hits shown", results.len(), total);
    } else {
        println!("Invalid response format.");
    }

    Ok(())
}

/// Header line (id, name, score) and a detail line (imprint, shape, colors)
fn describe_hit(item: &Value) -> (String, String) {
    let item_seq = item.get("item_seq").and_then(|s| s.as_str()).unwrap_or("unknown");
    let score = item.get("score").and_then(|f| f.as_f64()).unwrap_or(0.0);
    let data = item.get("data").cloned().unwrap_or(Value::Null);
    let name = data.get("item_name").and_then(|s| s.as_str()).unwrap_or("");

    let header = format!(
        "{} {} {}",
        item_seq.magenta(),
        name.bold(),
        format!("{:.4}", score).green()
    );

    let imprint: Vec<&str> = ["print_front", "print_back"]
        .iter()
        .filter_map(|f| data.get(*f).and_then(|s| s.as_str()))
        .collect();
    let colors: Vec<&str> = data
        .get("color_classes")
        .and_then(|c| c.as_array())
        .map(|c| c.iter().filter_map(|s| s.as_str()).collect())
        .unwrap_or_default();

    let mut details = Vec::new();
    if !imprint.is_empty() {
        details.push(imprint.join(" / "));
    }
    if let Some(shape) = data.get("drug_shape").and_then(|s| s.as_str()) {
        details.push(shape.to_string());
    }
    if !colors.is_empty() {
        details.push(colors.join(", "));
    }

    (header, details.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_hit() {
        colored::control::set_override(false);
        let (header, details) = describe_hit(&json!({
            "score": 12.5,
            "item_seq": "200808876",
            "data": {
                "item_name": "가나다정",
                "print_front": "8B",
                "print_back": "KP",
                "drug_shape": "타원형",
                "color_classes": ["하양", "분홍"]
            }
        }));
        assert!(header.starts_with("200808876 가나다정"));
        assert_eq!(details, "8B / KP | 타원형 | 하양, 분홍");
    }

    #[test]
    fn test_describe_sparse_hit() {
        colored::control::set_override(false);
        let (header, details) = describe_hit(&json!({ "score": 1.0 }));
        assert!(header.starts_with("unknown"));
        assert!(details.is_empty());
    }
}
