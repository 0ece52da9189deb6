use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Closed set of answer kinds; each one has its own validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Existing directory or file, or a new location inside an existing directory.
    Path,
    /// Existing, readable `.csv` file.
    File,
    /// Literal `0` or `1`.
    Boolean,
    /// Any non-empty text.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub prompt: String,
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>, prompt: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            field_type,
        }
    }
}

// Keys of the default script, in the order the analysis program takes them.
pub mod field_keys {
    pub const INPUT_MEAS_PATH: &str = "input_meas_path";
    pub const OUTPUT_PATH: &str = "output_path";
    pub const SYSTEM: &str = "system";
    pub const PROJECT_DESCRIPTION: &str = "project_description";
    pub const SIGNAL_LIST_PATH: &str = "signal_list_path";
    pub const MOTOR_PARAMETER_EVALUATION: &str = "motor_parameter_evaluation";
    pub const P_MODEL_VS_SIM_COMPARISON: &str = "p_model_vs_sim_comparision";
}

/// Ordered, immutable conversation script.
///
/// Cloning is cheap; all clones share the same field list.
#[derive(Debug, Clone)]
pub struct DialogSchema {
    fields: Arc<[FieldSpec]>,
}

impl DialogSchema {
    /// Builds a schema from an ordered field list.
    ///
    /// Panics if the list is empty or a key repeats; a schema is fixed at
    /// startup so either case is a programming error.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        assert!(!fields.is_empty(), "dialog schema needs at least one field");
        for (i, field) in fields.iter().enumerate() {
            assert!(
                fields[..i].iter().all(|f| f.key != field.key),
                "duplicate field key in dialog schema: {}",
                field.key
            );
        }
        Self {
            fields: fields.into(),
        }
    }

    /// The seven-question script the SPoC analysis needs.
    pub fn spoc_default() -> Self {
        use field_keys::*;

        Self::new(vec![
            FieldSpec::new(
                INPUT_MEAS_PATH,
                "Enter input measurement folder path:",
                FieldType::Path,
            ),
            FieldSpec::new(OUTPUT_PATH, "Enter output folder path:", FieldType::Path),
            FieldSpec::new(
                SYSTEM,
                "Enter system name (e.g., ESP10CU):",
                FieldType::Text,
            ),
            FieldSpec::new(
                PROJECT_DESCRIPTION,
                "Enter project description:",
                FieldType::Text,
            ),
            FieldSpec::new(
                SIGNAL_LIST_PATH,
                "Enter signal list CSV file path:",
                FieldType::File,
            ),
            FieldSpec::new(
                MOTOR_PARAMETER_EVALUATION,
                "Enable Motor Parameter Evaluation? (1=Yes, 0=No):",
                FieldType::Boolean,
            ),
            FieldSpec::new(
                P_MODEL_VS_SIM_COMPARISON,
                "Enable P Model vs Sim Comparison? (1=Yes, 0=No):",
                FieldType::Boolean,
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, step: usize) -> Option<&FieldSpec> {
        self.fields.get(step)
    }

    pub fn first_prompt(&self) -> &str {
        &self.fields[0].prompt
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}

impl Default for DialogSchema {
    fn default() -> Self {
        Self::spoc_default()
    }
}
