use serde_json::Value;

use crate::config::ExtractionConfig;

use super::outcome::ExtractionOutcome;

/// Required-field checks applied to a merged outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    pub relation_fields: Vec<String>,
    pub specification_fields: Vec<String>,
    pub faq_fields: Vec<String>,
}

impl ValidationRules {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            relation_fields: config.compatibility.required_fields.clone(),
            specification_fields: config.technical.required_fields.clone(),
            faq_fields: config.faq.required_fields.clone(),
        }
    }

    /// Returns one message per problem found; empty means valid.
    pub fn validate(&self, outcome: &ExtractionOutcome) -> Vec<String> {
        let mut problems = Vec::new();

        check_items(
            "Relation",
            outcome.relations(),
            &self.relation_fields,
            &mut problems,
        );
        check_items(
            "Specification",
            outcome.specifications(),
            &self.specification_fields,
            &mut problems,
        );

        if outcome.has_faq_data() {
            match outcome.faq_data.as_object() {
                Some(faq) => {
                    for field in &self.faq_fields {
                        if !faq.contains_key(field) {
                            problems.push(format!("FAQ data is missing required field '{}'", field));
                        }
                    }
                    if faq
                        .get("compatible_products")
                        .is_some_and(|products| !products.is_array())
                    {
                        problems.push("FAQ field 'compatible_products' must be a list".to_string());
                    }
                }
                None => problems.push("FAQ data is not an object".to_string()),
            }
        }

        problems
    }
}

fn check_items(kind: &str, items: &[Value], required: &[String], problems: &mut Vec<String>) {
    for (i, item) in items.iter().enumerate() {
        let Some(map) = item.as_object() else {
            problems.push(format!("{} {} is not an object", kind, i + 1));
            continue;
        };
        for field in required {
            if !map.contains_key(field) {
                problems.push(format!(
                    "{} {} is missing required field '{}'",
                    kind,
                    i + 1,
                    field
                ));
            }
        }
    }
}
