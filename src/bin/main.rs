use financial_tutor_backend::budget;
use financial_tutor_backend::fanout;
use financial_tutor_backend::generation::{
    CannedModel, KnowledgeLevel, LearningPathRequest, StructuredGenerator,
};
use financial_tutor_backend::models::{BudgetDraft, ExpenseEntry, Goal};
use financial_tutor_backend::store::{paths, DocumentStore, InMemoryDocumentStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// A canned learning path so the demo runs without an API key.
const SAMPLE_PATH: &str = r#"{
  "modules": [
    {
      "title": "Fundamentos del Ahorro",
      "lessons": [
        {
          "title": "Por qué ahorrar",
          "detailedContent": "El ahorro es la base de la salud financiera y tu primera defensa ante imprevistos.",
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
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Financial Tutor demo starting");

    let store = InMemoryDocumentStore::new();
    let user_id = Uuid::new_v4();

    // Budget simulator
    let draft = BudgetDraft {
        income: 5000.0,
        expenses: vec![
            ExpenseEntry {
                name: "Renta".to_string(),
                amount: 1500.0,
            },
            ExpenseEntry {
                name: "Comida".to_string(),
                amount: 600.0,
            },
        ],
    };
    let summary = budget::summarize(&draft);

    println!("\n=== PRESUPUESTO ===");
    println!("Ingreso: {}", draft.income);
    println!("Gasto total: {}", summary.total_expenses);
    println!("Balance restante: {}", summary.remaining_balance);

    // A savings goal
    let goal_doc = paths::user_goals(user_id).new_doc();
    let goal = Goal {
        id: goal_doc.id(),
        name: "Ahorrar para vacaciones".to_string(),
        target_amount: 1000.0,
        saved_amount: 250.0,
    };
    store
        .set_merge(&goal_doc, serde_json::to_value(&goal)?)
        .await?;
    println!("\n=== META ===");
    println!("{}: {}/{} (completada: {})",
        goal.name, goal.saved_amount, goal.target_amount, goal.is_completed());

    // Learning path: generate with a canned model, then fan out
    let generator = StructuredGenerator::new(Arc::new(CannedModel::single(SAMPLE_PATH)));
    let generated = generator
        .learning_path(&LearningPathRequest {
            level: KnowledgeLevel::Principiante,
            financial_goals: "Ahorrar para mi primer auto".to_string(),
            financial_background: "Soy estudiante sin ingresos fijos".to_string(),
        })
        .await?;

    let persisted = fanout::persist_learning_path(
        &store,
        user_id,
        "Ruta de aprendizaje para principiante",
        "Metas: ahorrar para mi primer auto",
        &generated,
    )
    .await?;

    println!("\n=== RUTA DE APRENDIZAJE ===");
    println!("Documentos creados: {}", persisted.document_count);

    if let Some(active) = fanout::load_active_learning_path(&store, user_id).await? {
        println!("Ruta activa: {}", active.path.name);
        for module in &active.modules {
            println!("  Módulo {}: {}", module.module.order + 1, module.module.title);
            for lesson in &module.lessons {
                println!("    Lección {}: {}", lesson.order + 1, lesson.title);
            }
        }
    }

    Ok(())
}
