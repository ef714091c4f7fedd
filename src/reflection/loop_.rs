//! 反思主循环
//!
//! Generate（流式）→ Critique → 按状态机决定重新生成或结束。
//! run 返回惰性事件流：消费方逐个拉取，停止拉取（drop）即取消，进行中的请求随之释放。
//! 模型调用失败不在循环内恢复：流产出一个 Err 后结束，不重试。

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;
use crate::reflection::prompts::generate_prompt;
use crate::reflection::state::{next_step, ConversationState, Step};
use crate::reflection::{Critic, ReflectionEvent};

/// 反思事件流：有限、不可重启
pub type ReflectionStream = Pin<Box<dyn Stream<Item = Result<ReflectionEvent, LlmError>> + Send>>;

/// 一次完整运行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionOutcome {
    pub response: String,
    pub iterations: usize,
}

/// 反思循环：生成用 LLM + Critic + 迭代上限
#[derive(Clone)]
pub struct ReflectionLoop {
    llm: Arc<dyn LlmClient>,
    critic: Critic,
    max_iterations: usize,
}

impl ReflectionLoop {
    /// 生成与评审共用同一个 LLM
    pub fn new(llm: Arc<dyn LlmClient>, max_iterations: usize) -> Self {
        Self {
            critic: Critic::new(llm.clone()),
            llm,
            max_iterations,
        }
    }

    /// 启动一次运行。messages 是调用方历史的副本，循环内的追加不会影响调用方。
    pub fn run(&self, context: impl Into<String>, messages: Vec<Message>) -> ReflectionStream {
        let llm = self.llm.clone();
        let critic = self.critic.clone();
        let max_iterations = self.max_iterations;
        let mut state = ConversationState::new(context, messages);

        Box::pin(async_stream::stream! {
            let mut step = Step::Generate;
            loop {
                match step {
                    Step::Generate => {
                        let iteration = state.iteration + 1;
                        tracing::info!(iteration, max_iterations, model = %llm.model_name(), "generate");
                        yield Ok(ReflectionEvent::DraftStarted { iteration, max_iterations });

                        let prompt = generate_prompt(&state.context, &state.messages, state.feedback.as_deref());
                        let mut tokens = match llm.complete_stream(&[Message::user(prompt)]).await {
                            Ok(t) => t,
                            Err(e) => {
                                tracing::warn!(error = %e, iteration, "generate failed");
                                yield Err(e);
                                return;
                            }
                        };

                        let mut draft = String::new();
                        while let Some(token) = tokens.next().await {
                            match token {
                                Ok(text) => {
                                    draft.push_str(&text);
                                    yield Ok(ReflectionEvent::Token { text });
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, iteration, "generate stream failed");
                                    yield Err(e);
                                    return;
                                }
                            }
                        }

                        state = state.with_generation(draft.clone());
                        yield Ok(ReflectionEvent::DraftDone { iteration, text: draft });
                    }
                    Step::Critique => {
                        let iteration = state.iteration;
                        yield Ok(ReflectionEvent::Critiquing { iteration });

                        let draft = state.last_assistant().unwrap_or_default().to_string();
                        let verdict = match critic.evaluate(&draft).await {
                            Ok(v) => v,
                            Err(e) => {
                                tracing::warn!(error = %e, iteration, "critique failed");
                                yield Err(e);
                                return;
                            }
                        };
                        let satisfactory = verdict.is_satisfactory();
                        tracing::info!(iteration, satisfactory, "critique");

                        let feedback = verdict.into_feedback();
                        state = state.with_feedback(feedback.clone());
                        yield Ok(ReflectionEvent::Critique { iteration, feedback, satisfactory });
                    }
                    Step::Done => {
                        let response = state.last_assistant().unwrap_or_default().to_string();
                        yield Ok(ReflectionEvent::Done { response, iterations: state.iteration });
                        return;
                    }
                }
                step = next_step(step, &state, max_iterations);
            }
        })
    }

    /// 消费整条事件流，返回最终回复
    pub async fn run_to_completion(
        &self,
        context: impl Into<String>,
        messages: Vec<Message>,
    ) -> Result<ReflectionOutcome, LlmError> {
        let mut events = self.run(context, messages);
        let mut outcome = None;
        while let Some(event) = events.next().await {
            if let ReflectionEvent::Done { response, iterations } = event? {
                outcome = Some(ReflectionOutcome { response, iterations });
            }
        }
        Ok(outcome.unwrap_or(ReflectionOutcome {
            response: String::new(),
            iterations: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    async fn collect(stream: ReflectionStream) -> Vec<Result<ReflectionEvent, LlmError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_stops_at_first_satisfactory() {
        let llm = Arc::new(ScriptedLlmClient::new(["first draft", "Looks satisfactory."]));
        let outcome = ReflectionLoop::new(llm.clone(), 5)
            .run_to_completion("ctx", vec![Message::user("q")])
            .await
            .unwrap();
        assert_eq!(outcome, ReflectionOutcome { response: "first draft".into(), iterations: 1 });
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_regenerates_until_limit() {
        let llm = Arc::new(ScriptedLlmClient::new([
            "d1", "bad", "d2", "worse", "d3", "still bad", "unused",
        ]));
        let outcome = ReflectionLoop::new(llm.clone(), 3)
            .run_to_completion("ctx", vec![])
            .await
            .unwrap();
        assert_eq!(outcome.response, "d3");
        assert_eq!(outcome.iterations, 3);
        assert_eq!(llm.calls(), 6);
    }

    #[tokio::test]
    async fn test_zero_limit_runs_one_cycle() {
        let llm = Arc::new(ScriptedLlmClient::new(["only", "nope", "unused"]));
        let outcome = ReflectionLoop::new(llm.clone(), 0)
            .run_to_completion("ctx", vec![])
            .await
            .unwrap();
        assert_eq!(outcome.iterations, 1);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_event_sequence_and_tokens() {
        let llm = Arc::new(ScriptedLlmClient::new(["hello streamed world", "satisfactory"]));
        let events: Vec<ReflectionEvent> = collect(ReflectionLoop::new(llm, 2).run("ctx", vec![]))
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        assert_eq!(events.first(), Some(&ReflectionEvent::DraftStarted { iteration: 1, max_iterations: 2 }));
        let streamed: String = events
            .iter()
            .filter_map(|e| match e {
                ReflectionEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(streamed, "hello streamed world");
        assert!(events.contains(&ReflectionEvent::Critique {
            iteration: 1,
            feedback: "satisfactory".into(),
            satisfactory: true,
        }));
        assert_eq!(
            events.last(),
            Some(&ReflectionEvent::Done { response: "hello streamed world".into(), iterations: 1 })
        );
    }

    #[tokio::test]
    async fn test_done_response_is_last_draft_tokens() {
        let llm = Arc::new(ScriptedLlmClient::new(["first try", "needs work", "second try", "satisfactory"]));
        let events: Vec<ReflectionEvent> = collect(ReflectionLoop::new(llm, 3).run("ctx", vec![]))
            .await
            .into_iter()
            .map(|e| e.unwrap())
            .collect();

        let last_start = events
            .iter()
            .rposition(|e| matches!(e, ReflectionEvent::DraftStarted { .. }))
            .unwrap();
        let last_draft: String = events[last_start..]
            .iter()
            .filter_map(|e| match e {
                ReflectionEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(last_draft, "second try");
        assert_eq!(
            events.last(),
            Some(&ReflectionEvent::Done { response: last_draft.clone(), iterations: 2 })
        );
    }

    #[tokio::test]
    async fn test_feedback_is_fed_into_regeneration() {
        let llm = Arc::new(ScriptedLlmClient::new(["d1", "add an example", "d2", "satisfactory"]));
        ReflectionLoop::new(llm.clone(), 3)
            .run_to_completion("ctx", vec![])
            .await
            .unwrap();
        let prompts = llm.prompts();
        // 第 3 次调用是第二次生成：包含上一份草稿与批评意见
        let regen = &prompts[2][0].content;
        assert!(regen.contains("assistant: d1"));
        assert!(regen.ends_with("previous draft: add an example"));
        // 批评 prompt 只包含最新草稿
        assert!(prompts[3][0].content.ends_with("Response: d2"));
    }

    #[tokio::test]
    async fn test_empty_history_uses_context_only() {
        let llm = Arc::new(ScriptedLlmClient::new(["answer", "satisfactory"]));
        ReflectionLoop::new(llm.clone(), 1)
            .run_to_completion("just the context", vec![])
            .await
            .unwrap();
        let first = &llm.prompts()[0][0].content;
        assert!(first.contains("just the context"));
        assert!(first.ends_with("Messages: "));
    }

    #[tokio::test]
    async fn test_generate_failure_ends_stream() {
        let llm = Arc::new(
            ScriptedLlmClient::new(Vec::<String>::new()).then_fail(LlmError::ApiError("503".into())),
        );
        let events = collect(ReflectionLoop::new(llm.clone(), 3).run("ctx", vec![])).await;
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert_eq!(events[1], Err(LlmError::ApiError("503".into())));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_critique_failure_propagates() {
        let llm = Arc::new(ScriptedLlmClient::new(["draft"]).then_fail(LlmError::ApiError("down".into())));
        let result = ReflectionLoop::new(llm, 3).run_to_completion("ctx", vec![]).await;
        assert_eq!(result, Err(LlmError::ApiError("down".into())));
    }

    #[tokio::test]
    async fn test_dropping_stream_stops_model_calls() {
        let llm = Arc::new(ScriptedLlmClient::new(["a b c", "bad", "d2", "bad"]));
        let mut stream = ReflectionLoop::new(llm.clone(), 5).run("ctx", vec![]);
        // 只拉取到第一个 token 就停止
        while let Some(event) = stream.next().await {
            if matches!(event, Ok(ReflectionEvent::Token { .. })) {
                break;
            }
        }
        drop(stream);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_caller_history_untouched() {
        let history = vec![Message::user("q")];
        let llm = Arc::new(ScriptedLlmClient::new(["a", "satisfactory"]));
        ReflectionLoop::new(llm, 1)
            .run_to_completion("ctx", history.clone())
            .await
            .unwrap();
        assert_eq!(history, vec![Message::user("q")]);
    }
}
