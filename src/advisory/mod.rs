//! Advisory service boundary
//!
//! Given a window of recent conversation, the advisor produces a short hint
//! for the recruiter, or nothing. Both operations may fail; callers treat
//! failure and empty output the same way (no hint this round).

mod openai;

pub use openai::OpenAiAdvisor;

use anyhow::Result;

#[async_trait::async_trait]
pub trait Advisor: Send + Sync + 'static {
    /// Produce a short hint for the given conversation context, or None when
    /// nothing is worth saying.
    async fn generate_hint(&self, context: &str) -> Result<Option<String>>;

    /// Produce a pre-interview briefing from the candidate's CV, the job
    /// description, and the role title.
    async fn generate_prep_brief(
        &self,
        candidate_cv: &str,
        job_description: &str,
        role: &str,
    ) -> Result<String>;
}
