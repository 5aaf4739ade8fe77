//! MCP call tool — invokes a method on a configured remote MCP-style server.
//!
//! Scope is intentionally narrow: a single JSON-RPC 2.0 POST per call,
//! addressed by a server nickname configured up front (never a raw URL
//! supplied by the LLM, to avoid turning this into an open SSRF proxy).
//! Built on the same `reqwest::Client` construction as `web.rs`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{require_string, Tool};

/// A named remote server this tool is allowed to call.
#[derive(Clone, Debug)]
pub struct McpServer {
    pub name: String,
    pub url: String,
}

/// Calls a method on a configured MCP server via JSON-RPC 2.0 over HTTP.
pub struct McpCallTool {
    servers: HashMap<String, String>,
    client: Client,
}

impl McpCallTool {
    pub fn new(servers: Vec<McpServer>) -> Self {
        Self {
            servers: servers.into_iter().map(|s| (s.name, s.url)).collect(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl Tool for McpCallTool {
    fn name(&self) -> &str {
        "mcp_call"
    }

    fn description(&self) -> &str {
        "Call a method on a configured MCP server. `server` must be one of the names \
         configured for this agent; `method` and `params` are forwarded as a JSON-RPC 2.0 request."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "server": {
                    "type": "string",
                    "description": "Configured server nickname",
                    "enum": self.server_names()
                },
                "method": {
                    "type": "string",
                    "description": "RPC method name"
                },
                "params": {
                    "type": "object",
                    "description": "Method parameters",
                    "additionalProperties": true
                }
            },
            "required": ["server", "method"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let server = require_string(&params, "server")?;
        let method = require_string(&params, "method")?;
        let call_params = params.get("params").cloned().unwrap_or(json!({}));

        let url = match self.servers.get(&server) {
            Some(u) => u,
            None => return Ok(format!("Error: unknown MCP server '{server}'")),
        };

        debug!(server = %server, method = %method, "calling MCP server");

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": call_params,
        });

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("MCP request to '{server}' failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("MCP server '{server}' returned {status}: {text}");
        }

        let reply: Value = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse MCP response: {e}"))?;

        if let Some(error) = reply.get("error") {
            return Ok(format!("MCP error: {}", serde_json::to_string(error).unwrap_or_default()));
        }

        let result = reply.get("result").cloned().unwrap_or(Value::Null);
        Ok(serde_json::to_string_pretty(&result).unwrap_or_default())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool_for(name: &str, url: String) -> McpCallTool {
        McpCallTool::new(vec![McpServer { name: name.to_string(), url }])
    }

    #[tokio::test]
    async fn unknown_server_reported() {
        let tool = tool_for("known", "http://example.invalid".into());
        let mut params = HashMap::new();
        params.insert("server".into(), json!("unknown"));
        params.insert("method".into(), json!("ping"));

        let result = tool.execute(params).await.unwrap();
        assert!(result.contains("unknown MCP server"));
    }

    #[tokio::test]
    async fn successful_call_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"pong": true}
            })))
            .mount(&server)
            .await;

        let tool = tool_for("local", server.uri());
        let mut params = HashMap::new();
        params.insert("server".into(), json!("local"));
        params.insert("method".into(), json!("ping"));

        let result = tool.execute(params).await.unwrap();
        assert!(result.contains("pong"));
    }

    #[tokio::test]
    async fn rpc_error_surfaced_as_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "Method not found"}
            })))
            .mount(&server)
            .await;

        let tool = tool_for("local", server.uri());
        let mut params = HashMap::new();
        params.insert("server".into(), json!("local"));
        params.insert("method".into(), json!("bogus"));

        let result = tool.execute(params).await.unwrap();
        assert!(result.contains("MCP error"));
        assert!(result.contains("Method not found"));
    }

    #[tokio::test]
    async fn http_error_status_bails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = tool_for("local", server.uri());
        let mut params = HashMap::new();
        params.insert("server".into(), json!("local"));
        params.insert("method".into(), json!("ping"));

        let result = tool.execute(params).await;
        assert!(result.is_err());
    }

    #[test]
    fn tool_definition_lists_servers() {
        let tool = tool_for("alpha", "http://example.invalid".into());
        let def = tool.to_definition();
        assert_eq!(def.function.name, "mcp_call");
        let servers = def.function.parameters["properties"]["server"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(servers, &vec![json!("alpha")]);
    }
}
