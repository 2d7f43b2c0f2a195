//! Content of the downstream task and the notification.

use beverage_inventor_core::ports::{TaskPriority, TaskSpec};
use beverage_inventor_core::Response;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Tags on every testing task, before the theme.
pub const TASK_TAGS: [&str; 2] = ["beverage-testing", "enhanced-recipe"];

/// Recommendations included in a notification.
const NOTIFY_RECOMMENDATIONS: usize = 3;
/// Warnings included in a notification.
const NOTIFY_WARNINGS: usize = 2;

/// The testing task for a finished run.
#[must_use]
pub fn task_spec(response: &Response) -> TaskSpec {
    let beverage = &response.beverage;

    let mut tags: Vec<String> = TASK_TAGS.iter().map(ToString::to_string).collect();
    tags.push(beverage.theme.clone());

    let custom_fields = BTreeMap::from([
        ("beverage_id".to_string(), beverage.id.to_string()),
        ("theme".to_string(), beverage.theme.clone()),
        ("created_by".to_string(), beverage.created_by.clone()),
        ("ai_used".to_string(), response.ai_used.to_string()),
    ]);

    TaskSpec {
        title: format!("Test New Beverage: {}", beverage.name),
        description: task_description(response),
        priority: TaskPriority::High,
        tags,
        custom_fields,
    }
}

fn task_description(response: &Response) -> String {
    let beverage = &response.beverage;
    let mut out = String::new();

    let _ = writeln!(out, "Beverage: {}", beverage.name);
    let _ = writeln!(out, "Description: {}", beverage.description);
    let _ = writeln!(out, "Theme: {}", beverage.theme);
    let _ = writeln!(out, "Created by: {}", beverage.created_by);

    out.push_str("\nIngredients:\n");
    for ingredient in &beverage.ingredients {
        let _ = writeln!(out, "- {}: {:.1} {}", ingredient.name, ingredient.quantity, ingredient.unit);
    }

    out.push_str("\nAnalysis:\n");
    let _ = writeln!(out, "- Cost per serving: ${:.2}", response.cost_per_serving());
    if let Some(nutrition) = &response.nutritional_analysis {
        let _ = writeln!(out, "- Health score: {:.1}/100", nutrition.health_score);
        let n = &nutrition.nutrition;
        let _ = writeln!(
            out,
            "- Calories: {}, protein: {:.1} g, sugar: {:.1} g, caffeine: {:.1} mg",
            n.calories, n.protein, n.sugar, n.caffeine
        );
    }
    if let Some(compatibility) = &response.compatibility_analysis {
        let _ = writeln!(
            out,
            "- Compatibility score: {:.1}/100 ({} conflicts, {} synergies)",
            compatibility.overall_compatibility,
            compatibility.conflicts.len(),
            compatibility.synergies.len()
        );
    }

    if !response.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for recommendation in &response.recommendations {
            let _ = writeln!(out, "- {recommendation}");
        }
    }
    if !response.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &response.warnings {
            let _ = writeln!(out, "- {warning}");
        }
    }

    if !beverage.metadata.target_audience.is_empty() {
        let audience: Vec<&str> = beverage.metadata.target_audience.iter().map(String::as_str).collect();
        let _ = writeln!(out, "\nTarget audience: {}", audience.join(", "));
    }
    out
}

/// The notification text for a finished run.
#[must_use]
pub fn notification(response: &Response) -> String {
    let beverage = &response.beverage;
    let mut out = String::new();

    let _ = writeln!(out, "*New Beverage Recipe Created: {}*", beverage.name);
    let _ = writeln!(out, "{}", beverage.description);
    out.push('\n');

    if let Some(score) = response.health_score() {
        let _ = writeln!(out, "Health Score: {score:.1}/100");
    }
    let _ = writeln!(out, "Estimated Cost: ${:.2} per serving", response.cost_per_serving());
    if let Some(compatibility) = &response.compatibility_analysis {
        let _ = writeln!(out, "Ingredient Compatibility: {:.1}/100", compatibility.overall_compatibility);
    }

    if !response.recommendations.is_empty() {
        out.push_str("\nKey Recommendations:\n");
        for recommendation in response.recommendations.iter().take(NOTIFY_RECOMMENDATIONS) {
            let _ = writeln!(out, "- {recommendation}");
        }
    }
    if !response.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in response.warnings.iter().take(NOTIFY_WARNINGS) {
            let _ = writeln!(out, "- {warning}");
        }
    }

    if let Some(task_id) = &response.task_id {
        let _ = writeln!(out, "\nTesting task created: {task_id}");
    }

    let audience: Vec<&str> = beverage.metadata.target_audience.iter().map(String::as_str).collect();
    let audience = if audience.is_empty() { "everyone".to_string() } else { audience.join(", ") };
    let _ = write!(out, "\nTheme: {} | Target: {audience}", beverage.theme);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use beverage_inventor_core::analysis::CompatibilityAnalysis;
    use beverage_inventor_core::{Beverage, Ingredient, Utc};

    fn response() -> Response {
        let mut beverage = Beverage::draft(
            "Comfort Latte",
            "Espresso with steamed milk",
            "comfort",
            vec![
                Ingredient::new("espresso", 2.0, "shots"),
                Ingredient::new("whole milk", 200.0, "ml"),
            ],
            Utc::now(),
        );
        beverage.created_by = "u1".to_string();
        beverage.metadata.estimated_cost = 1.75;
        beverage.metadata.target_audience.insert("coffee lovers".to_string());

        let mut response = Response::new(beverage);
        response.recommendations = vec!["a".into(), "b".into(), "c".into(), "d".into()];
        response.warnings = vec!["w1".into(), "w2".into(), "w3".into()];
        response.compatibility_analysis = Some(CompatibilityAnalysis {
            overall_compatibility: 68.6,
            conflicts: Vec::new(),
            synergies: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.9,
        });
        response
    }

    #[test]
    fn test_task_spec_fields() {
        let response = response();
        let task = task_spec(&response);

        assert_eq!(task.title, "Test New Beverage: Comfort Latte");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.tags, vec!["beverage-testing", "enhanced-recipe", "comfort"]);
        assert_eq!(task.custom_fields["beverage_id"], response.beverage.id.to_string());
        assert_eq!(task.custom_fields["ai_used"], "false");
        assert_eq!(task.custom_fields["created_by"], "u1");
    }

    #[test]
    fn test_task_description_lists_ingredients_and_scores() {
        let description = task_spec(&response()).description;

        assert!(description.contains("- espresso: 2.0 shots"));
        assert!(description.contains("- whole milk: 200.0 ml"));
        assert!(description.contains("Cost per serving: $1.75"));
        assert!(description.contains("Compatibility score: 68.6/100"));
        assert!(description.contains("- w3"));
        assert!(description.contains("Target audience: coffee lovers"));
    }

    #[test]
    fn test_notification_truncates_lists() {
        let mut response = response();
        response.task_id = Some("task-7".to_string());
        let message = notification(&response);

        assert!(message.starts_with("*New Beverage Recipe Created: Comfort Latte*"));
        assert!(message.contains("- c"));
        assert!(!message.contains("- d"));
        assert!(message.contains("- w2"));
        assert!(!message.contains("- w3"));
        assert!(message.contains("Testing task created: task-7"));
        assert!(message.ends_with("Theme: comfort | Target: coffee lovers"));
    }

    #[test]
    fn test_notification_without_task() {
        let message = notification(&response());
        assert!(!message.contains("Testing task created"));
        assert!(!message.contains("Health Score"));
    }
}
