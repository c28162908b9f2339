//! Answer generation for the analyze pipeline.

use super::context::{chronological, format_frames_for_prompt, frame_label};
use super::CitedFrame;
use crate::config::Prompts;
use crate::error::{BlikkError, Result};
use crate::frames::{image_mime_type, ImageLoader};
use crate::openai::create_client;
use crate::vector_store::QueryMatch;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
};
use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Analyze engine: turns retrieved frames into a grounded answer.
pub struct AnalyzeEngine {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    prompts: Prompts,
    image_loader: Option<Arc<dyn ImageLoader>>,
}

impl AnalyzeEngine {
    /// Create a new analyze engine.
    pub fn new(model: &str, temperature: f32) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            temperature,
            prompts: Prompts::default(),
            image_loader: None,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Attach an image loader. Frames whose image resolves are sent to the
    /// model inline; the rest stay text-only.
    pub fn with_image_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.image_loader = Some(loader);
        self
    }

    /// Answer a question from similarity matches.
    ///
    /// Matches are reordered chronologically before prompt assembly, and
    /// the returned citations keep that timeline order.
    #[instrument(skip(self, matches), fields(question = %question, matches = matches.len()))]
    pub async fn analyze(
        &self,
        question: &str,
        matches: Vec<QueryMatch>,
    ) -> Result<AnalyzeResponse> {
        info!("Analyzing question over {} matches", matches.len());

        let citations = chronological(matches);
        let frames: Vec<CitedFrame> = citations.iter().map(CitedFrame::from).collect();
        let mut warnings = Vec::new();

        let user_message = match &self.image_loader {
            Some(loader) => {
                self.multimodal_message(question, &frames, loader.as_ref(), &mut warnings)
                    .await?
            }
            None => self.text_message(question, &frames)?,
        };

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.prompts.analyze.system.clone())
                .build()
                .map_err(|e| BlikkError::Generation(e.to_string()))?
                .into(),
            user_message,
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| BlikkError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| BlikkError::Generation(format!("Generation call failed: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| BlikkError::Generation("Empty response from model".to_string()))?
            .clone();

        debug!("Generated answer with {} citations", citations.len());

        Ok(AnalyzeResponse {
            answer,
            citations,
            warnings,
        })
    }

    /// Text-only user message, rendered from the prompt template.
    fn text_message(
        &self,
        question: &str,
        frames: &[CitedFrame],
    ) -> Result<ChatCompletionRequestMessage> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("frames".to_string(), format_frames_for_prompt(frames));

        let content = self
            .prompts
            .render_with_custom(&self.prompts.analyze.user, &vars);

        Ok(ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| BlikkError::Generation(e.to_string()))?
            .into())
    }

    /// User message interleaving {label, image, description} per frame.
    /// A frame whose image cannot load falls back to text-only.
    async fn multimodal_message(
        &self,
        question: &str,
        frames: &[CitedFrame],
        loader: &dyn ImageLoader,
        warnings: &mut Vec<String>,
    ) -> Result<ChatCompletionRequestMessage> {
        let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();

        parts.push(text_part(&format!(
            "Question: {}\n\nFrames from the video, in chronological order:",
            question
        ))?);

        for (i, frame) in frames.iter().enumerate() {
            parts.push(text_part(&frame_label(i + 1, frame))?);

            match loader.load(&frame.path).await {
                Ok(bytes) => {
                    let data_url = format!(
                        "data:{};base64,{}",
                        image_mime_type(&frame.path),
                        general_purpose::STANDARD.encode(bytes)
                    );
                    parts.push(
                        ChatCompletionRequestMessageContentPartImageArgs::default()
                            .image_url(
                                ImageUrlArgs::default()
                                    .url(data_url)
                                    .detail(ImageDetail::Auto)
                                    .build()
                                    .map_err(|e| BlikkError::Generation(e.to_string()))?,
                            )
                            .build()
                            .map_err(|e| BlikkError::Generation(e.to_string()))?
                            .into(),
                    );
                }
                Err(e) => {
                    warn!("Frame image '{}' unavailable: {}", frame.path, e);
                    warnings.push(format!(
                        "Image for frame {} unavailable, using description only",
                        frame.frame_id
                    ));
                }
            }

            parts.push(text_part(&frame.description)?);
        }

        parts.push(text_part(
            "Answer the question from these frames. Cite the frames you relied on by id and timestamp, and decline if the evidence is insufficient.",
        )?);

        Ok(ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| BlikkError::Generation(e.to_string()))?
            .into())
    }
}

fn text_part(text: &str) -> Result<ChatCompletionRequestUserMessageContentPart> {
    Ok(ChatCompletionRequestMessageContentPartTextArgs::default()
        .text(text)
        .build()
        .map_err(|e| BlikkError::Generation(e.to_string()))?
        .into())
}

/// An analyze result: the answer plus its supporting frames.
#[derive(Debug, Clone)]
pub struct AnalyzeResponse {
    /// The generated answer.
    pub answer: String,
    /// Matches backing the answer, in chronological order, metadata intact.
    pub citations: Vec<QueryMatch>,
    /// Degradations that did not stop the pipeline (e.g. missing images).
    pub warnings: Vec<String>,
}
