use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    BreastCancer,
    HeartDisease,
    Diabetes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    LogisticRegression,
    SupportVectorMachine,
}

/// How the raw label column is turned into a class index.
#[derive(Debug, Clone, Copy)]
pub enum LabelEncoding {
    /// Categorical codes; the first entry maps to class 1, the second to class 0.
    Categorical {
        positive: &'static str,
        negative: &'static str,
    },
    /// Numeric column already holding 0 or 1.
    Binary,
}

#[derive(Debug)]
pub struct DomainSpec {
    pub domain: Domain,
    pub label_column: &'static str,
    pub label_encoding: LabelEncoding,
    pub dropped_columns: &'static [&'static str],
    pub feature_columns: &'static [&'static str],
    pub classifier: ClassifierKind,
    pub seed: u64,
    /// Human readable class names, indexed by class.
    pub class_names: [&'static str; 2],
    /// Response keys carrying the probability of each class, indexed by class.
    pub probability_keys: [&'static str; 2],
    pub message_prefix: &'static str,
}

const BREAST_CANCER: DomainSpec = DomainSpec {
    domain: Domain::BreastCancer,
    label_column: "diagnosis",
    label_encoding: LabelEncoding::Categorical {
        positive: "M",
        negative: "B",
    },
    dropped_columns: &["id", "Unnamed: 32"],
    feature_columns: &[
        "radius_mean",
        "perimeter_mean",
        "area_mean",
        "concavity_mean",
        "concave points_mean",
        "compactness_mean",
        "texture_mean",
        "smoothness_mean",
        "symmetry_mean",
        "fractal_dimension_mean",
    ],
    classifier: ClassifierKind::LogisticRegression,
    seed: 2,
    class_names: ["Benign", "Malignant"],
    probability_keys: ["probability_benign", "probability_malignant"],
    message_prefix: "The Breast Cancer is",
};

// class 0 is the diseased class in this dataset
const HEART_DISEASE: DomainSpec = DomainSpec {
    domain: Domain::HeartDisease,
    label_column: "target",
    label_encoding: LabelEncoding::Binary,
    dropped_columns: &["fbs", "restecg", "sex"],
    feature_columns: &[
        "age", "cp", "trestbps", "chol", "thalach", "exang", "oldpeak", "slope", "ca", "thal",
    ],
    classifier: ClassifierKind::LogisticRegression,
    seed: 50,
    class_names: ["has Heart Disease", "does not have Heart Disease"],
    probability_keys: ["probability_heart_disease", "probability_healthy"],
    message_prefix: "The person",
};

const DIABETES: DomainSpec = DomainSpec {
    domain: Domain::Diabetes,
    label_column: "Outcome",
    label_encoding: LabelEncoding::Binary,
    dropped_columns: &["Pregnancies"],
    feature_columns: &[
        "Glucose",
        "BloodPressure",
        "SkinThickness",
        "Insulin",
        "BMI",
        "DiabetesPedigreeFunction",
        "Age",
    ],
    classifier: ClassifierKind::SupportVectorMachine,
    seed: 2,
    class_names: ["Non-Diabetic", "Diabetic"],
    probability_keys: ["probability_non_diabetic", "probability_diabetic"],
    message_prefix: "The person is",
};

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::BreastCancer, Domain::HeartDisease, Domain::Diabetes];

    pub fn spec(self) -> &'static DomainSpec {
        match self {
            Domain::BreastCancer => &BREAST_CANCER,
            Domain::HeartDisease => &HEART_DISEASE,
            Domain::Diabetes => &DIABETES,
        }
    }

    /// Stem shared by the dataset, model and scaler file names.
    pub fn slug(self) -> &'static str {
        match self {
            Domain::BreastCancer => "breast_cancer",
            Domain::HeartDisease => "heart_disease",
            Domain::Diabetes => "diabetes",
        }
    }

    pub fn route(self) -> String {
        format!("/{}_predict", self.slug())
    }

    pub fn dataset_file_name(self) -> String {
        format!("{}_data.csv", self.slug())
    }

    pub fn model_file_name(self) -> String {
        format!("{}_model.toml", self.slug())
    }

    pub fn scaler_file_name(self) -> String {
        format!("{}_model_scaler.toml", self.slug())
    }

    pub fn dimensions(self) -> usize {
        self.spec().feature_columns.len()
    }
}

impl DomainSpec {
    pub fn message(&self, class: usize) -> String {
        format!("{} {}", self.message_prefix, self.class_names[class])
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.replace('-', "_").as_str() {
            "breast_cancer" => Ok(Domain::BreastCancer),
            "heart_disease" => Ok(Domain::HeartDisease),
            "diabetes" => Ok(Domain::Diabetes),
            other => Err(format!("unknown domain '{other}'")),
        }
    }
}
