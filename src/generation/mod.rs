//! Structured generation client
//!
//! Three model tasks share one mechanism: build a task prompt, call the
//! text model, then parse and validate the output against the declared
//! shape before anything downstream sees it. A schema violation is a
//! `MalformedOutput` error and nothing gets persisted.

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiModel;

use crate::error::TutorError;
use crate::models::{ChatMessage, HealthSnapshot, QuizQuestion};
use crate::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

//
// ================= Text Model =================
//

/// Trait for the underlying language model (vendor independent).
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run one completion. Transport problems map to `Transport`; the
    /// content of the reply is the caller's problem.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Canned model for development and testing.
/// Keeps the system functional without LLM dependency.
pub struct CannedModel {
    responses: Mutex<VecDeque<String>>,
}

impl CannedModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn single(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }
}

#[async_trait]
impl TextModel for CannedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| TutorError::Transport("no canned response left".to_string()))
    }
}

//
// ================= Knowledge Level =================
//

/// Self-reported financial knowledge level. Steers topical emphasis of the
/// generated learning path; the output schema never changes with it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeLevel {
    Principiante,
    Intermedio,
    Avanzado,
}

impl KnowledgeLevel {
    /// Fixed editorial policy per level.
    pub fn emphasis(&self) -> &'static str {
        match self {
            KnowledgeLevel::Principiante => {
                "saving habits, building a budget, managing debt, and interest basics"
            }
            KnowledgeLevel::Intermedio => {
                "credit cards, expense control, and setting financial goals"
            }
            KnowledgeLevel::Avanzado => {
                "compound interest and the fundamentals of investing"
            }
        }
    }
}

impl fmt::Display for KnowledgeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KnowledgeLevel::Principiante => "principiante",
            KnowledgeLevel::Intermedio => "intermedio",
            KnowledgeLevel::Avanzado => "avanzado",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for KnowledgeLevel {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "principiante" => Ok(KnowledgeLevel::Principiante),
            "intermedio" => Ok(KnowledgeLevel::Intermedio),
            "avanzado" => Ok(KnowledgeLevel::Avanzado),
            other => Err(TutorError::Validation(format!(
                "Nivel de conocimiento desconocido: {}",
                other
            ))),
        }
    }
}

//
// ================= Task Inputs =================
//

/// One chat turn with the prior transcript passed explicitly. Invocations
/// are otherwise stateless.
#[derive(Debug, Clone)]
pub struct ChatInput {
    pub query: String,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone)]
pub struct LearningPathRequest {
    pub level: KnowledgeLevel,
    pub financial_goals: String,
    pub financial_background: String,
}

/// Tagged union of the supported generation tasks.
#[derive(Debug, Clone)]
pub enum GenerationTask {
    Chat(ChatInput),
    HealthRecommendation(HealthSnapshot),
    LearningPath(LearningPathRequest),
}

//
// ================= Task Outputs =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecommendations {
    pub recommendations: String,
}

/// Generated learning path before persistence. Field names mirror the
/// stored lesson shape so generated content is copied verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedLearningPath {
    pub modules: Vec<GeneratedModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedModule {
    pub title: String,
    pub lessons: Vec<GeneratedLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedLesson {
    pub title: String,
    pub detailed_content: String,
    pub practical_tips: Vec<String>,
    pub real_example: String,
    pub quiz: Vec<QuizQuestion>,
}

#[derive(Debug, Clone)]
pub enum GenerationOutput {
    Chat(ChatAnswer),
    HealthRecommendation(HealthRecommendations),
    LearningPath(GeneratedLearningPath),
}

//
// ================= Client =================
//

/// Evaluate one task against the model: pure in the sense that everything
/// the call depends on is in the task itself.
pub async fn generate(model: &dyn TextModel, task: GenerationTask) -> Result<GenerationOutput> {
    match task {
        GenerationTask::Chat(input) => {
            let prompt = prompts::chat_prompt(&input.query, &input.history);
            let raw = model.complete(&prompt).await?;
            let answer: ChatAnswer = parse_structured(&raw)?;
            Ok(GenerationOutput::Chat(answer))
        }
        GenerationTask::HealthRecommendation(snapshot) => {
            let prompt = prompts::health_prompt(&snapshot);
            let raw = model.complete(&prompt).await?;
            let recommendations: HealthRecommendations = parse_structured(&raw)?;
            Ok(GenerationOutput::HealthRecommendation(recommendations))
        }
        GenerationTask::LearningPath(request) => {
            let prompt = prompts::learning_path_prompt(&request);
            let raw = model.complete(&prompt).await?;
            let path: GeneratedLearningPath = parse_structured(&raw)?;
            validate_learning_path(&path)?;
            info!(
                "Generated learning path: {} modules, {} lessons",
                path.modules.len(),
                path.modules.iter().map(|m| m.lessons.len()).sum::<usize>()
            );
            Ok(GenerationOutput::LearningPath(path))
        }
    }
}

/// Typed facade over `generate` for the three tasks.
#[derive(Clone)]
pub struct StructuredGenerator {
    model: Arc<dyn TextModel>,
}

impl StructuredGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    pub async fn chat(&self, query: &str, history: &[ChatMessage]) -> Result<ChatAnswer> {
        let task = GenerationTask::Chat(ChatInput {
            query: query.to_string(),
            history: history.to_vec(),
        });
        match generate(self.model.as_ref(), task).await? {
            GenerationOutput::Chat(answer) => Ok(answer),
            _ => unreachable!("chat task produced a different output"),
        }
    }

    pub async fn recommend(&self, snapshot: &HealthSnapshot) -> Result<HealthRecommendations> {
        let task = GenerationTask::HealthRecommendation(snapshot.clone());
        match generate(self.model.as_ref(), task).await? {
            GenerationOutput::HealthRecommendation(recommendations) => Ok(recommendations),
            _ => unreachable!("health task produced a different output"),
        }
    }

    pub async fn learning_path(
        &self,
        request: &LearningPathRequest,
    ) -> Result<GeneratedLearningPath> {
        let task = GenerationTask::LearningPath(request.clone());
        match generate(self.model.as_ref(), task).await? {
            GenerationOutput::LearningPath(path) => Ok(path),
            _ => unreachable!("learning-path task produced a different output"),
        }
    }
}

//
// ================= Parsing & Validation =================
//

/// Strip a markdown code fence the model may wrap its JSON in.
fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse model output into the declared shape. Anything that does not
/// parse is a schema failure, never retried as-is.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fence(raw);

    serde_json::from_str(cleaned).map_err(|e| {
        let excerpt: String = cleaned.chars().take(200).collect();
        TutorError::MalformedOutput(format!("{} | raw={}", e, excerpt))
    })
}

/// Enforce the declared learning-path bounds: at least one module, lessons
/// per module, 2-3 practical tips, 1-2 quiz questions with 2+ options and a
/// correct answer that is one of them.
pub fn validate_learning_path(path: &GeneratedLearningPath) -> Result<()> {
    if path.modules.is_empty() {
        return Err(TutorError::MalformedOutput(
            "learning path has no modules".to_string(),
        ));
    }

    for module in &path.modules {
        if module.title.trim().is_empty() {
            return Err(TutorError::MalformedOutput(
                "module with empty title".to_string(),
            ));
        }
        if module.lessons.is_empty() {
            return Err(TutorError::MalformedOutput(format!(
                "module '{}' has no lessons",
                module.title
            )));
        }

        for lesson in &module.lessons {
            if !(2..=3).contains(&lesson.practical_tips.len()) {
                return Err(TutorError::MalformedOutput(format!(
                    "lesson '{}' has {} practical tips, expected 2-3",
                    lesson.title,
                    lesson.practical_tips.len()
                )));
            }
            if !(1..=2).contains(&lesson.quiz.len()) {
                return Err(TutorError::MalformedOutput(format!(
                    "lesson '{}' has {} quiz questions, expected 1-2",
                    lesson.title,
                    lesson.quiz.len()
                )));
            }

            for question in &lesson.quiz {
                if question.options.len() < 2 {
                    return Err(TutorError::MalformedOutput(format!(
                        "quiz question '{}' has fewer than 2 options",
                        question.question
                    )));
                }
                if !question.options.contains(&question.correct_answer) {
                    return Err(TutorError::MalformedOutput(format!(
                        "quiz question '{}' has a correct answer that is not an option",
                        question.question
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageRole;
    use serde_json::json;

    pub(crate) fn valid_path_json() -> serde_json::Value {
        json!({
            "modules": [
                {
                    "title": "Fundamentos del Ahorro",
                    "lessons": [
                        {
                            "title": "Por qué ahorrar",
                            "detailedContent": "El ahorro es la base de la salud financiera...",
                            "practicalTips": [
                                "Separa el 10% de tu ingreso apenas lo recibas",
                                "Usa una cuenta separada para tu ahorro"
                            ],
                            "realExample": "Ana ahorra 500 pesos al mes y en un año junta 6000.",
                            "quiz": [
                                {
                                    "question": "¿Cuál es un buen primer paso para ahorrar?",
                                    "options": [
                                        "Gastar todo el ingreso",
                                        "Separar un porcentaje fijo cada mes"
                                    ],
                                    "correctAnswer": "Separar un porcentaje fijo cada mes"
                                }
                            ]
                        }
                    ]
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_chat_parses_answer() {
        let model = CannedModel::single(r#"{"answer": "Un presupuesto es un plan de gastos."}"#);
        let generator = StructuredGenerator::new(Arc::new(model));

        let history = vec![ChatMessage {
            role: MessageRole::User,
            content: "Hola".to_string(),
        }];
        let answer = generator.chat("¿Qué es un presupuesto?", &history).await.unwrap();
        assert!(answer.answer.contains("plan de gastos"));
    }

    #[tokio::test]
    async fn test_fenced_output_is_accepted() {
        let model = CannedModel::single(
            "```json\n{\"recommendations\": \"Reduce tus gastos hormiga.\"}\n```",
        );
        let generator = StructuredGenerator::new(Arc::new(model));

        let snapshot = HealthSnapshot {
            income: 3000.0,
            expenses: 2500.0,
            debt: 1000.0,
            savings: 500.0,
            goals: "Salir de deudas".to_string(),
        };
        let result = generator.recommend(&snapshot).await.unwrap();
        assert!(result.recommendations.contains("gastos hormiga"));
    }

    #[tokio::test]
    async fn test_learning_path_parses_for_every_level() {
        for level in [
            KnowledgeLevel::Principiante,
            KnowledgeLevel::Intermedio,
            KnowledgeLevel::Avanzado,
        ] {
            let model = CannedModel::single(&valid_path_json().to_string());
            let generator = StructuredGenerator::new(Arc::new(model));

            let path = generator
                .learning_path(&LearningPathRequest {
                    level,
                    financial_goals: "Ahorrar para mi primer auto".to_string(),
                    financial_background: "Soy estudiante sin ingresos fijos".to_string(),
                })
                .await
                .unwrap();

            assert!(!path.modules.is_empty());
            for module in &path.modules {
                for lesson in &module.lessons {
                    assert!((1..=2).contains(&lesson.quiz.len()));
                    for question in &lesson.quiz {
                        assert!(question.options.len() >= 2);
                        assert!(question.options.contains(&question.correct_answer));
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_non_json_output_is_malformed() {
        let model = CannedModel::single("Here is your learning path: saving, budgeting...");
        let generator = StructuredGenerator::new(Arc::new(model));

        let err = generator
            .chat("¿Qué es el interés compuesto?", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::MalformedOutput(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_correct_answer_outside_options_is_rejected() {
        let mut path_json = valid_path_json();
        path_json["modules"][0]["lessons"][0]["quiz"][0]["correctAnswer"] =
            json!("Una respuesta inventada");

        let model = CannedModel::single(&path_json.to_string());
        let generator = StructuredGenerator::new(Arc::new(model));

        let err = generator
            .learning_path(&LearningPathRequest {
                level: KnowledgeLevel::Principiante,
                financial_goals: "Aprender a invertir".to_string(),
                financial_background: "Trabajo a tiempo completo".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_empty_modules_rejected() {
        let model = CannedModel::single(r#"{"modules": []}"#);
        let generator = StructuredGenerator::new(Arc::new(model));

        let err = generator
            .learning_path(&LearningPathRequest {
                level: KnowledgeLevel::Intermedio,
                financial_goals: "Controlar mis gastos".to_string(),
                financial_background: "Uso tarjetas de crédito".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TutorError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_distinguishable() {
        // An exhausted canned model behaves like a transport failure.
        let model = CannedModel::new(vec![]);
        let generator = StructuredGenerator::new(Arc::new(model));

        let err = generator.chat("Hola", &[]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, TutorError::Transport(_)));
    }

    #[test]
    fn test_level_round_trip() {
        for s in ["principiante", "intermedio", "avanzado"] {
            let level: KnowledgeLevel = s.parse().unwrap();
            assert_eq!(level.to_string(), s);
        }
        assert!("experto".parse::<KnowledgeLevel>().is_err());
    }
}
