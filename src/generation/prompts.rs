//! Instruction templates for the three generation tasks
//!
//! Each template interpolates the user-supplied fields and pins the exact
//! JSON shape the caller validates against.

use super::LearningPathRequest;
use crate::models::{ChatMessage, HealthSnapshot};

/// Conversational tutor prompt. Carries the persona and the full history
/// that was explicitly passed in.
pub fn chat_prompt(query: &str, history: &[ChatMessage]) -> String {
    let mut rendered_history = String::new();
    for msg in history {
        rendered_history.push_str(&format!("- {}: {}\n", msg.role, msg.content));
    }

    format!(
        r#"You are "Tutor Financiero IA", an educational conversational assistant designed to teach, guide, and accompany the user in learning personal finance. Your language must be clear, empathetic, and adapted to people with a low level of financial knowledge.

Your role is an educational, empathetic, accessible, and motivating mentor. Your tone should be:
- Clear, without complicated technical terms.
- Friendly and approachable (like a teacher or coach).
- Motivating but realistic.

Main objectives:
- Educate the user on personal finance concepts through natural conversation.
- Adapt content to the user's needs, level, and economic situation.
- Resolve specific doubts with clear and relevant examples.
- Guide the user step-by-step in creating financial goals and improving their budget.

Write your answer in Spanish.

Conversation history:
{}

User's new question: {}

Answer the user's new question based on your persona and the conversation history.

Rules:
- Return ONLY valid JSON
- No explanation text
- JSON format:

{{
  "answer": "..."
}}
"#,
        rendered_history, query
    )
}

/// Financial-health recommendation prompt.
pub fn health_prompt(snapshot: &HealthSnapshot) -> String {
    format!(
        r#"You are a personal finance advisor. Analyze the user's financial situation and provide personalized recommendations based on their income, expenses, debt, savings, and goals.

Income: {}
Expenses: {}
Debt: {}
Savings: {}
Goals: {}

Provide specific and actionable recommendations to improve their financial health, written in Spanish.

Rules:
- Return ONLY valid JSON
- No explanation text
- JSON format:

{{
  "recommendations": "..."
}}
"#,
        snapshot.income, snapshot.expenses, snapshot.debt, snapshot.savings, snapshot.goals
    )
}

/// Learning-path prompt. The knowledge level steers topical emphasis only;
/// the JSON shape is fixed.
pub fn learning_path_prompt(request: &LearningPathRequest) -> String {
    format!(
        r#"You are an expert financial literacy tutor. Based on the user's financial background, goals, and current knowledge level, create a personalized learning path tailored to the user's needs.

Current knowledge level: {}
Financial goals: {}
Financial background: {}

For this level, emphasize {}.

Write all titles, content, tips, examples, and quiz questions in Spanish.

Rules:
- Return between 2 and 4 modules, each with 2 to 3 lessons
- Each lesson has exactly 2 or 3 practicalTips (short strings)
- Each lesson has exactly 1 or 2 quiz questions
- Each quiz question has at least 2 options and correctAnswer must match one of the options exactly
- Return ONLY valid JSON
- No explanation text
- JSON format:

{{
  "modules": [
    {{
      "title": "...",
      "lessons": [
        {{
          "title": "...",
          "detailedContent": "...",
          "practicalTips": ["...", "..."],
          "realExample": "...",
          "quiz": [
            {{
              "question": "...",
              "options": ["...", "..."],
              "correctAnswer": "..."
            }}
          ]
        }}
      ]
    }}
  ]
}}
"#,
        request.level,
        request.financial_goals,
        request.financial_background,
        request.level.emphasis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::KnowledgeLevel;
    use crate::models::MessageRole;

    #[test]
    fn test_chat_prompt_includes_history_and_query() {
        let history = vec![
            ChatMessage {
                role: MessageRole::User,
                content: "¿Qué es el ahorro?".to_string(),
            },
            ChatMessage {
                role: MessageRole::Model,
                content: "El ahorro es guardar parte de tu ingreso.".to_string(),
            },
        ];

        let prompt = chat_prompt("¿Y cómo empiezo?", &history);
        assert!(prompt.contains("- user: ¿Qué es el ahorro?"));
        assert!(prompt.contains("- model: El ahorro es guardar"));
        assert!(prompt.contains("User's new question: ¿Y cómo empiezo?"));
        assert!(prompt.contains("\"answer\""));
    }

    #[test]
    fn test_level_steers_emphasis_not_schema() {
        let base = LearningPathRequest {
            level: KnowledgeLevel::Principiante,
            financial_goals: "Pagar mis deudas".to_string(),
            financial_background: "Trabajo a tiempo completo".to_string(),
        };
        let advanced = LearningPathRequest {
            level: KnowledgeLevel::Avanzado,
            ..base.clone()
        };

        let beginner_prompt = learning_path_prompt(&base);
        let advanced_prompt = learning_path_prompt(&advanced);

        assert!(beginner_prompt.contains("managing debt"));
        assert!(advanced_prompt.contains("compound interest"));
        // The declared shape is identical for both levels.
        assert!(beginner_prompt.contains("\"correctAnswer\""));
        assert!(advanced_prompt.contains("\"correctAnswer\""));
    }

    #[test]
    fn test_health_prompt_interpolates_fields() {
        let prompt = health_prompt(&HealthSnapshot {
            income: 3000.0,
            expenses: 2500.0,
            debt: 1000.0,
            savings: 500.0,
            goals: "Fondo de emergencia".to_string(),
        });
        assert!(prompt.contains("Income: 3000"));
        assert!(prompt.contains("Fondo de emergencia"));
        assert!(prompt.contains("\"recommendations\""));
    }
}
