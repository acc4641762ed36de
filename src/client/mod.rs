//! Pipeline management over the transport's one-shot `call`.
//!
//! [`PipelineClient`] wraps the request/response messages for pipeline CRUD,
//! the preferred pipeline, supported languages and the debug run history.
//! None of these carry ordering or partial state; each is a single call.

pub mod types;

use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::pipeline::PipelineRunEvent;
use crate::transport::{Transport, TransportError};

pub use types::{AssistPipeline, AssistPipelineParams, PipelineList, PipelineRunSummary};
use types::{DebugRun, DebugRunList, LanguageList};

// ---------------------------------------------------------------------------
// ClientError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to encode `{message_type}` request: {source}")]
    Encode {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected `{message_type}` response: {source}")]
    Decode {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// PipelineClient
// ---------------------------------------------------------------------------

/// Typed pipeline management calls.
///
/// ```rust,no_run
/// use assist_pipeline::client::PipelineClient;
/// # async fn example(transport: &dyn assist_pipeline::transport::Transport) {
/// let client = PipelineClient::new(transport);
/// let list = client.list_pipelines().await.unwrap();
/// if let Some(preferred) = list.preferred() {
///     println!("preferred pipeline: {}", preferred.params.name);
/// }
/// # }
/// ```
pub struct PipelineClient<'a> {
    transport: &'a dyn Transport,
}

impl<'a> PipelineClient<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    pub async fn list_pipelines(&self) -> Result<PipelineList, ClientError> {
        self.request("assist_pipeline/pipeline/list", Map::new()).await
    }

    /// Fetch one pipeline, or the preferred one when `pipeline_id` is `None`.
    pub async fn get_pipeline(&self, pipeline_id: Option<&str>) -> Result<AssistPipeline, ClientError> {
        let mut fields = Map::new();
        if let Some(id) = pipeline_id {
            fields.insert("pipeline_id".into(), Value::from(id));
        }
        self.request("assist_pipeline/pipeline/get", fields).await
    }

    pub async fn create_pipeline(
        &self,
        params: &AssistPipelineParams,
    ) -> Result<AssistPipeline, ClientError> {
        const TYPE: &str = "assist_pipeline/pipeline/create";
        let fields = encode(TYPE, params)?;
        self.request(TYPE, fields).await
    }

    pub async fn update_pipeline(
        &self,
        pipeline_id: &str,
        params: &AssistPipelineParams,
    ) -> Result<AssistPipeline, ClientError> {
        const TYPE: &str = "assist_pipeline/pipeline/update";
        let mut fields = encode(TYPE, params)?;
        fields.insert("pipeline_id".into(), Value::from(pipeline_id));
        self.request(TYPE, fields).await
    }

    pub async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), ClientError> {
        let _: IgnoredAny = self
            .request("assist_pipeline/pipeline/delete", pipeline_field(pipeline_id))
            .await?;
        Ok(())
    }

    pub async fn set_preferred_pipeline(&self, pipeline_id: &str) -> Result<(), ClientError> {
        let _: IgnoredAny = self
            .request(
                "assist_pipeline/pipeline/set_preferred",
                pipeline_field(pipeline_id),
            )
            .await?;
        Ok(())
    }

    /// Languages supported by at least one pipeline engine.
    pub async fn list_languages(&self) -> Result<Vec<String>, ClientError> {
        let list: LanguageList = self
            .request("assist_pipeline/language/list", Map::new())
            .await?;
        Ok(list.languages)
    }

    /// Recent runs recorded for `pipeline_id`.
    pub async fn list_debug_runs(
        &self,
        pipeline_id: &str,
    ) -> Result<Vec<PipelineRunSummary>, ClientError> {
        let list: DebugRunList = self
            .request("assist_pipeline/pipeline_debug/list", pipeline_field(pipeline_id))
            .await?;
        Ok(list.pipeline_runs)
    }

    /// Events of one recorded run, ready for
    /// [`replay_events`](crate::pipeline::replay_events).
    ///
    /// Recorded events that do not decode are skipped with a warning.
    pub async fn get_debug_run(
        &self,
        pipeline_id: &str,
        pipeline_run_id: &str,
    ) -> Result<Vec<PipelineRunEvent>, ClientError> {
        let mut fields = pipeline_field(pipeline_id);
        fields.insert("pipeline_run_id".into(), Value::from(pipeline_run_id));
        let run: DebugRun = self
            .request("assist_pipeline/pipeline_debug/get", fields)
            .await?;
        let total = run.events.len();
        let events: Vec<PipelineRunEvent> = run
            .events
            .into_iter()
            .filter_map(|message| match PipelineRunEvent::from_value(message) {
                Ok(event) => Some(event),
                Err(e) => {
                    log::warn!("client: skipping recorded event: {e}");
                    None
                }
            })
            .collect();
        if events.len() < total {
            log::debug!(
                "client: kept {} of {} events of run {pipeline_run_id}",
                events.len(),
                total
            );
        }
        Ok(events)
    }

    async fn request<R: DeserializeOwned>(
        &self,
        message_type: &str,
        mut fields: Map<String, Value>,
    ) -> Result<R, ClientError> {
        fields.insert("type".into(), Value::from(message_type));
        log::debug!("client: {message_type}");
        let response = self.transport.call(Value::Object(fields)).await?;
        serde_json::from_value(response).map_err(|source| ClientError::Decode {
            message_type: message_type.to_string(),
            source,
        })
    }
}

fn pipeline_field(pipeline_id: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("pipeline_id".into(), Value::from(pipeline_id));
    fields
}

fn encode(message_type: &str, params: &AssistPipelineParams) -> Result<Map<String, Value>, ClientError> {
    let encode_error = |source| ClientError::Encode {
        message_type: message_type.to_string(),
        source,
    };
    match serde_json::to_value(params).map_err(encode_error)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(encode_error(serde::ser::Error::custom(
            "pipeline params must encode as an object",
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
