use super::Advisor;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const HINT_SYSTEM_PROMPT: &str = "\
You are an assistant for a recruiter running a live technical interview. \
You receive the conversation transcript in real time and generate short, \
actionable hints: a follow-up question to ask, a vague answer to pin down, \
a contradiction to flag, a strong answer worth acknowledging, or a nudge to \
move to the next topic. Keep every hint to one to three sentences. Reply \
ONLY when something genuinely deserves the recruiter's attention; otherwise \
reply with an empty string.";

const HINT_MAX_TOKENS: u32 = 200;
const PREP_MAX_TOKENS: u32 = 1500;

/// Advisor backed by the OpenAI chat completions API.
pub struct OpenAiAdvisor {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiAdvisor {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn chat(&self, messages: Vec<ChatMessage>, max_tokens: u32) -> Result<Option<String>> {
        let request = ChatRequest {
            model: &self.model,
            max_tokens,
            messages,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Chat completion request failed")?
            .error_for_status()
            .context("Chat completion request rejected")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        Ok(content)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl Advisor for OpenAiAdvisor {
    async fn generate_hint(&self, context: &str) -> Result<Option<String>> {
        let messages = vec![
            ChatMessage {
                role: "system",
                content: HINT_SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: context.to_string(),
            },
        ];
        let hint = self.chat(messages, HINT_MAX_TOKENS).await?;
        debug!("Advisor hint: {:?}", hint);
        Ok(hint)
    }

    async fn generate_prep_brief(
        &self,
        candidate_cv: &str,
        job_description: &str,
        role: &str,
    ) -> Result<String> {
        let prompt = format!(
            "Prepare a recruiter for a technical interview for the role: {role}\n\n\
             Candidate CV:\n{candidate_cv}\n\n\
             Job description:\n{job_description}\n\n\
             Write a brief prep kit the recruiter can absorb in five minutes: \
             the candidate's stack and level, 8-10 key terms likely to come up \
             with one-line explanations, 6-8 sharp follow-up questions, red \
             flags and gaps to probe, positive indicators of a strong \
             candidate, and how to close the interview. Be concise - the \
             recruiter is not an engineer but should sound competent."
        );
        let messages = vec![ChatMessage {
            role: "user",
            content: prompt,
        }];
        self.chat(messages, PREP_MAX_TOKENS)
            .await?
            .ok_or_else(|| anyhow!("Prep brief came back empty"))
    }
}
