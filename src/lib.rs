//! Reflector - Rust 反思式对话智能体
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话流程、状态投影、错误、主控循环
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Grok / 本地 / Mock）与响应缓存
//! - **memory**: 会话历史与截断
//! - **reflection**: 生成 → 评审 → 重新生成 的反思循环
//! - **tools**: URL 识别与抓取、搜索、工具注册表
//! - **ui**: Ratatui TUI 界面

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod reflection;
pub mod tools;
pub mod ui;

pub use reflection::{ReflectionEvent, ReflectionLoop};
