//! Core data models for the financial tutor
//!
//! Everything that reaches the document store serializes with camelCase
//! field names so stored JSON matches the collection shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Budget =================
//

/// One expense line in the budget simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub name: String,
    pub amount: f64,
}

/// Locally held budget edit state, mirrored to storage on every dirty change.
/// One draft per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetDraft {
    pub income: f64,
    pub expenses: Vec<ExpenseEntry>,
}

impl BudgetDraft {
    /// Form-level validation. Runs before any write; invalid entries are
    /// never persisted.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.income.is_finite() || self.income < 0.0 {
            return Err(crate::error::TutorError::Validation(
                "El ingreso debe ser positivo.".to_string(),
            ));
        }
        for entry in &self.expenses {
            if entry.name.trim().is_empty() {
                return Err(crate::error::TutorError::Validation(
                    "El nombre es requerido.".to_string(),
                ));
            }
            if !entry.amount.is_finite() || entry.amount <= 0.0 {
                return Err(crate::error::TutorError::Validation(
                    "El monto debe ser mayor a 0.".to_string(),
                ));
            }
        }
        Ok(())
    }
}

//
// ================= Goals =================
//

/// A savings goal. Created and deleted explicitly by the user; the saved
/// amount is written once at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub target_amount: f64,
    pub saved_amount: f64,
}

impl Goal {
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(crate::error::TutorError::Validation(
                "El nombre de la meta es requerido.".to_string(),
            ));
        }
        if !self.target_amount.is_finite() || self.target_amount <= 0.0 {
            return Err(crate::error::TutorError::Validation(
                "El objetivo debe ser mayor a 0.".to_string(),
            ));
        }
        if !self.saved_amount.is_finite() || self.saved_amount < 0.0 {
            return Err(crate::error::TutorError::Validation(
                "Lo ahorrado debe ser positivo.".to_string(),
            ));
        }
        Ok(())
    }

    /// A goal is complete once the saved amount reaches the target.
    /// Saved may exceed target.
    pub fn is_completed(&self) -> bool {
        self.saved_amount >= self.target_amount
    }
}

//
// ================= Learning Path =================
//

/// Parent record of a generated learning path. Owned by exactly one user;
/// modules and lessons live in nested collections under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A module within a learning path. `order` is unique per path and defines
/// the display sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningModule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    pub order: u32,
}

/// A lesson within a module, carrying the generated educational content
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    pub order: u32,
    pub detailed_content: String,
    pub practical_tips: Vec<String>,
    pub real_example: String,
    pub quiz: Vec<QuizQuestion>,
}

/// A single quiz question. The correct answer is always one of the options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

//
// ================= Chat =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// One turn of the ephemeral chat transcript. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

//
// ================= Financial Health =================
//

/// Transient input to the health-recommendation task. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub income: f64,
    pub expenses: f64,
    pub debt: f64,
    pub savings: f64,
    pub goals: String,
}

//
// ================= User =================
//

/// Profile supplied by the external identity provider. The user id scopes
/// every persisted entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageRole::User => "user",
            MessageRole::Model => "model",
        };
        write!(f, "{}", s)
    }
}
