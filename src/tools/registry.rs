//! 工具注册表
//!
//! 抓取与搜索都实现 Tool trait（name / description / execute），由 ToolRegistry 按名注册与查找；
//! TUI 的斜杠命令（`/fetch <url>`、`/search <query>`）通过注册表分发。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

/// 工具 trait：名称、描述、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（斜杠命令名）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>（有序，便于 /help 稳定输出）
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// 执行指定工具，并记录耗时与结果
    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        let tool = self.tools.get(name).ok_or_else(|| format!("Unknown tool: {name}"))?;
        let start = Instant::now();
        let result = tool.execute(args).await;
        tracing::info!(
            tool = %name,
            ok = result.is_ok(),
            duration_ms = start.elapsed().as_millis() as u64,
            "tool"
        );
        result
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase text"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            Ok(args["text"].as_str().unwrap_or_default().to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper));
        assert_eq!(
            registry.tool_descriptions(),
            vec![("upper".to_string(), "Uppercase text".to_string())]
        );
        let out = registry
            .execute("upper", serde_json::json!({"text": "abc"}))
            .await
            .unwrap();
        assert_eq!(out, "ABC");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nope", Value::Null).await.unwrap_err();
        assert_eq!(err, "Unknown tool: nope");
    }
}
