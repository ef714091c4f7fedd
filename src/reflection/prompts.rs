//! 反思循环的固定指令模板

use crate::memory::Message;

pub const GENERATE_TEMPLATE: &str = "System: You are a reflective reasoning agent. Use context and previous messages to respond. If needed, perform searches or fetches.\n\n{context}\n\nMessages: {messages}";

/// 上一轮批评意见（仅在重新生成时追加）
pub const FEEDBACK_TEMPLATE: &str = "\n\nReviewer feedback on your previous draft: {feedback}";

pub const CRITIQUE_TEMPLATE: &str = "Critique the latest response for accuracy and completeness. If 'good', respond 'satisfactory'; else, provide feedback.\n\nResponse: {response}";

/// 历史消息渲染为 `role: content`，每条一行
pub fn render_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn generate_prompt(context: &str, messages: &[Message], feedback: Option<&str>) -> String {
    let mut prompt = GENERATE_TEMPLATE
        .replace("{context}", context)
        .replace("{messages}", &render_messages(messages));
    if let Some(fb) = feedback {
        prompt.push_str(&FEEDBACK_TEMPLATE.replace("{feedback}", fb));
    }
    prompt
}

pub fn critique_prompt(response: &str) -> String {
    CRITIQUE_TEMPLATE.replace("{response}", response)
}
