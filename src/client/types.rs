//! Request/response shapes for pipeline management calls.

use serde::{Deserialize, Serialize};

use serde_json::Value;

/// User-editable pipeline settings.
///
/// Optional engine fields are sent as `null` rather than omitted; the server
/// expects every key on create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistPipelineParams {
    pub name: String,
    pub language: String,
    pub conversation_engine: String,
    pub conversation_language: Option<String>,
    pub stt_engine: Option<String>,
    pub stt_language: Option<String>,
    pub tts_engine: Option<String>,
    pub tts_language: Option<String>,
    pub tts_voice: Option<String>,
    pub wake_word_entity: Option<String>,
    pub wake_word_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_local_intents: Option<bool>,
}

/// A stored pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistPipeline {
    pub id: String,
    #[serde(flatten)]
    pub params: AssistPipelineParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineList {
    pub pipelines: Vec<AssistPipeline>,
    pub preferred_pipeline: Option<String>,
}

impl PipelineList {
    /// The preferred pipeline, if it is set and present in the list.
    pub fn preferred(&self) -> Option<&AssistPipeline> {
        let id = self.preferred_pipeline.as_deref()?;
        self.pipelines.iter().find(|pipeline| pipeline.id == id)
    }
}

/// One recorded run in a pipeline's debug history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunSummary {
    pub pipeline_run_id: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DebugRunList {
    pub pipeline_runs: Vec<PipelineRunSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DebugRun {
    pub events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LanguageList {
    pub languages: Vec<String>,
}
