use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::captioner::{Captioner, CreateImage};
use crate::compose::TextEntry;

pub async fn run_mcp(captioner: Arc<Captioner>) -> Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin).lines();
    let mut writer = stdout;

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(value) = handle_line(&line, &captioner).await {
            let payload = serde_json::to_vec(&value)?;
            writer.write_all(&payload).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

async fn handle_line(line: &str, captioner: &Arc<Captioner>) -> Option<Value> {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => {
            return Some(jsonrpc_error(None, -32700, &format!("parse error: {}", err)));
        }
    };
    let id = value.get("id").cloned();
    let method = match value.get("method").and_then(|method| method.as_str()) {
        Some(method) => method,
        None => return Some(jsonrpc_error(id, -32600, "invalid request")),
    };
    let params = value.get("params").cloned().unwrap_or_else(|| json!({}));

    match method {
        "initialize" => Some(jsonrpc_response(id, initialize_result(&params))),
        "tools/list" => Some(jsonrpc_response(id, tools_list_result())),
        "tools/call" => Some(jsonrpc_response(
            id,
            tools_call_result(params, captioner).await,
        )),
        "resources/list" => Some(jsonrpc_response(id, json!({ "resources": [] }))),
        "resources/read" => Some(jsonrpc_error(id, -32601, "resources not supported")),
        "prompts/list" => Some(jsonrpc_response(id, json!({ "prompts": [] }))),
        "prompts/get" => Some(jsonrpc_error(id, -32601, "prompts not supported")),
        "initialized" | "notifications/initialized" => None,
        _ => Some(jsonrpc_error(id, -32601, "method not found")),
    }
}

fn initialize_result(params: &Value) -> Value {
    let requested = params
        .get("protocolVersion")
        .and_then(|value| value.as_str())
        .unwrap_or("unknown");
    json!({
        "protocolVersion": requested,
        "capabilities": {
            "tools": { "listChanged": false },
            "resources": {},
            "prompts": {}
        },
        "serverInfo": {
            "name": "caption-compositor",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": "list_templates",
                "description": "List caption templates, optionally filtered by a keyword. Each text region is listed by index with a description of what belongs there.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Case-insensitive keyword matched against names and descriptions."
                        }
                    }
                }
            },
            {
                "name": "create_image",
                "description": "Render captions onto a template. Each text id must be the index of the region it fills.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "template": {
                            "type": "string",
                            "description": "Template id from list_templates."
                        },
                        "texts": {
                            "type": "array",
                            "description": "Captions keyed by region index.",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "id": { "type": "string", "description": "Region index, e.g. \"0\"." },
                                    "text": { "type": "string" }
                                },
                                "required": ["id", "text"]
                            }
                        },
                        "out": {
                            "type": "string",
                            "description": "Optional file path to also write the PNG to."
                        }
                    },
                    "required": ["template", "texts"]
                }
            }
        ]
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ListArgs {
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    template: String,
    texts: Vec<TextEntry>,
    #[serde(default)]
    out: Option<String>,
}

async fn tools_call_result(params: Value, captioner: &Arc<Captioner>) -> Value {
    let name = params
        .get("name")
        .and_then(|value| value.as_str())
        .unwrap_or("");
    let args_value = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    match name {
        "list_templates" => {
            let args: ListArgs = match serde_json::from_value(args_value) {
                Ok(args) => args,
                Err(err) => return tool_error(&format!("invalid arguments: {}", err)),
            };
            let listing = template_listing(captioner, args.query.as_deref().unwrap_or(""));
            json!({
                "content": [
                    { "type": "text", "text": listing.to_string() }
                ]
            })
        }
        "create_image" => {
            let args: CreateArgs = match serde_json::from_value(args_value) {
                Ok(args) => args,
                Err(err) => return tool_error(&format!("invalid arguments: {}", err)),
            };
            create_image_result(args, captioner).await
        }
        _ => tool_error(&format!("unknown tool: {}", name)),
    }
}

pub(crate) fn template_listing(captioner: &Captioner, query: &str) -> Value {
    let templates: Vec<Value> = captioner
        .catalog()
        .search(query)
        .into_iter()
        .map(|(id, record)| {
            let regions: Vec<Value> = record
                .text_options
                .iter()
                .enumerate()
                .map(|(index, region)| {
                    json!({
                        "id": index.to_string(),
                        "description": region.description.as_deref().unwrap_or("")
                    })
                })
                .collect();
            json!({
                "id": id,
                "name": record.name,
                "description": record.image_description.as_deref().unwrap_or(""),
                "width": record.width,
                "height": record.height,
                "regions": regions
            })
        })
        .collect();
    json!({ "templates": templates })
}

async fn create_image_result(args: CreateArgs, captioner: &Arc<Captioner>) -> Value {
    let request = CreateImage {
        template: args.template,
        texts: args.texts,
        image_bytes: None,
    };
    let bytes = match captioner.create_image(request).await {
        Ok(bytes) => bytes,
        Err(err) => return tool_error(&format!("{:#}", err)),
    };
    let mut content = vec![json!({
        "type": "image",
        "data": BASE64.encode(&bytes),
        "mimeType": "image/png"
    })];
    if let Some(out) = args.out {
        if let Err(err) = tokio::fs::write(&out, &bytes).await {
            return tool_error(&format!("failed to write image: {} ({})", out, err));
        }
        content.push(json!({ "type": "text", "text": format!("wrote {}", out) }));
    }
    json!({ "content": content })
}

fn jsonrpc_response(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn jsonrpc_error(id: Option<Value>, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

fn tool_error(message: &str) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": message
            }
        ],
        "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::template::{TemplateCatalog, TemplateRecord};
    use std::collections::BTreeMap;
    use std::path::Path;

    fn captioner() -> Arc<Captioner> {
        let record: TemplateRecord = serde_json::from_value(json!({
            "name": "change-my-mind",
            "filename": "change-my-mind.jpg",
            "image_description": "A man at a table with a sign.",
            "text_options": [
                {"position": {"left": 10, "top": 10, "width": 100, "height": 50}, "description": "The opinion on the sign"}
            ]
        }))
        .unwrap();
        let mut templates = BTreeMap::new();
        templates.insert("change-my-mind".to_string(), record);
        let catalog = TemplateCatalog::from_records(templates, Path::new("/nonexistent"));
        Arc::new(Captioner::with_catalog(Settings::default(), catalog).unwrap())
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let line = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let reply = handle_line(line, &captioner()).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let reply = handle_line("{not json", &captioner()).await.unwrap();
        assert_eq!(reply["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn lists_both_tools() {
        let line = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        let reply = handle_line(line, &captioner()).await.unwrap();
        let names: Vec<&str> = reply["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert_eq!(names, vec!["list_templates", "create_image"]);
    }

    #[tokio::test]
    async fn list_templates_reports_region_indices() {
        let line = r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"list_templates","arguments":{"query":"sign"}}}"#;
        let reply = handle_line(line, &captioner()).await.unwrap();
        let text = reply["result"]["content"][0]["text"].as_str().unwrap();
        let listing: Value = serde_json::from_str(text).unwrap();
        assert_eq!(listing["templates"][0]["id"], "change-my-mind");
        assert_eq!(listing["templates"][0]["regions"][0]["id"], "0");
    }

    #[tokio::test]
    async fn create_image_for_unknown_template_is_a_tool_error() {
        let line = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"create_image","arguments":{"template":"nope","texts":[]}}}"#;
        let reply = handle_line(line, &captioner()).await.unwrap();
        assert_eq!(reply["result"]["isError"], true);
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("template not found"));
    }

    #[tokio::test]
    async fn create_image_requires_texts() {
        let line = r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"create_image","arguments":{"template":"change-my-mind"}}}"#;
        let reply = handle_line(line, &captioner()).await.unwrap();
        assert_eq!(reply["result"]["isError"], true);
    }
}
