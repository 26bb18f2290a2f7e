use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::types::{Category, GeoPoint};

const HEURISTIC_CONFIDENCE: f64 = 0.3;
const SAFETY_SEVERITY_THRESHOLD: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn for_score(score: u8) -> Self {
        match score {
            9.. => PriorityLevel::Critical,
            7..=8 => PriorityLevel::High,
            4..=6 => PriorityLevel::Medium,
            _ => PriorityLevel::Low,
        }
    }

    /// Lowest priority score that maps to this level.
    pub fn floor(&self) -> u8 {
        match self {
            PriorityLevel::Low => 1,
            PriorityLevel::Medium => 4,
            PriorityLevel::High => 7,
            PriorityLevel::Critical => 9,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(PriorityLevel::Low),
            "MEDIUM" => Some(PriorityLevel::Medium),
            "HIGH" => Some(PriorityLevel::High),
            "CRITICAL" => Some(PriorityLevel::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Model,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub category: Category,
    pub severity_score: u8,
    pub location_sensitivity_score: u8,
    pub public_risk_score: u8,
    pub environmental_impact_score: u8,
    pub priority_score: u8,
    pub priority_level: PriorityLevel,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_department: Option<String>,
    pub source: ClassificationSource,
}

#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub description: String,
    pub photo_url: Option<String>,
    pub location: GeoPoint,
    /// Category the citizen picked, consulted only by the heuristic.
    pub category_hint: Option<Category>,
}

/// What the adapter learned from the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutcome {
    Classified(Classification),
    ClassificationInvalid { reason: String },
    ClassifierUnavailable { reason: String },
}

/// The external classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<serde_json::Value, ClassifierError>;
}

// ========== HTTP COLLABORATOR ==========

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifierPayload<'a> {
    description: &'a str,
    photo_reference: Option<&'a str>,
    coordinate: GeoPoint,
}

/// Calls the classification service over HTTP with a JSON body.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<serde_json::Value, ClassifierError> {
        let payload = ClassifierPayload {
            description: &request.description,
            photo_reference: request.photo_url.as_deref(),
            coordinate: request.location,
        };

        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                ClassifierError::Timeout(self.timeout.as_millis())
            } else {
                ClassifierError::Transport(e.to_string())
            }
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(to_error)?
            .error_for_status()
            .map_err(to_error)?;

        response.json::<serde_json::Value>().await.map_err(to_error)
    }
}

// ========== ADAPTER ==========

/// Calls the collaborator with a bounded timeout and checks its raw JSON
/// against the expected shape and ranges. Anything else is replaced by the
/// keyword heuristic, so `classify` always yields a usable [`Classification`].
pub struct ClassificationAdapter {
    classifier: Option<Arc<dyn Classifier>>,
    timeout: Duration,
}

impl ClassificationAdapter {
    pub fn new(classifier: Option<Arc<dyn Classifier>>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    /// Asks the collaborator and validates its answer, without falling back.
    pub async fn assess(&self, request: &ClassificationRequest) -> ClassifierOutcome {
        let Some(classifier) = &self.classifier else {
            return ClassifierOutcome::ClassifierUnavailable {
                reason: ClassifierError::NotConfigured.to_string(),
            };
        };

        match tokio::time::timeout(self.timeout, classifier.classify(request)).await {
            Err(_) => ClassifierOutcome::ClassifierUnavailable {
                reason: ClassifierError::Timeout(self.timeout.as_millis()).to_string(),
            },
            Ok(Err(e)) => ClassifierOutcome::ClassifierUnavailable {
                reason: e.to_string(),
            },
            Ok(Ok(raw)) => match validate_raw(raw) {
                Ok(classification) => ClassifierOutcome::Classified(classification),
                Err(reason) => ClassifierOutcome::ClassificationInvalid { reason },
            },
        }
    }

    /// Always returns a classification, with the safety override applied.
    pub async fn classify(&self, request: &ClassificationRequest) -> Classification {
        let classification = match self.assess(request).await {
            ClassifierOutcome::Classified(classification) => classification,
            ClassifierOutcome::ClassificationInvalid { reason } => {
                tracing::warn!("Classifier returned invalid data, using heuristic: {}", reason);
                heuristic_classification(request)
            }
            ClassifierOutcome::ClassifierUnavailable { reason } => {
                if self.classifier.is_some() {
                    tracing::warn!("Classifier unavailable, using heuristic: {}", reason);
                }
                heuristic_classification(request)
            }
        };
        apply_safety_override(classification)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    category: String,
    severity_score: i64,
    location_sensitivity_score: i64,
    public_risk_score: i64,
    environmental_impact_score: i64,
    priority_score: i64,
    priority_level: String,
    tags: Vec<String>,
    reasoning: String,
    confidence: f64,
    #[serde(default)]
    suggested_department: Option<String>,
}

fn score_in_range(name: &str, value: i64) -> Result<u8, String> {
    if (1..=10).contains(&value) {
        Ok(value as u8)
    } else {
        Err(format!("{} {} outside 1..=10", name, value))
    }
}

/// Checks the collaborator's JSON against the expected shape and ranges.
pub fn validate_raw(raw: serde_json::Value) -> Result<Classification, String> {
    let raw: RawClassification =
        serde_json::from_value(raw).map_err(|e| format!("unexpected shape: {}", e))?;

    let category = Category::parse(&raw.category)
        .ok_or_else(|| format!("unknown category {:?}", raw.category))?;
    let priority_level = PriorityLevel::parse(&raw.priority_level)
        .ok_or_else(|| format!("unknown priority level {:?}", raw.priority_level))?;
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
        return Err(format!("confidence {} outside 0..=1", raw.confidence));
    }

    Ok(Classification {
        category,
        severity_score: score_in_range("severityScore", raw.severity_score)?,
        location_sensitivity_score: score_in_range(
            "locationSensitivityScore",
            raw.location_sensitivity_score,
        )?,
        public_risk_score: score_in_range("publicRiskScore", raw.public_risk_score)?,
        environmental_impact_score: score_in_range(
            "environmentalImpactScore",
            raw.environmental_impact_score,
        )?,
        priority_score: score_in_range("priorityScore", raw.priority_score)?,
        priority_level,
        tags: raw.tags,
        confidence: raw.confidence,
        reasoning: raw.reasoning,
        suggested_department: raw
            .suggested_department
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        source: ClassificationSource::Model,
    })
}

/// Severe issues are never left at LOW.
pub fn apply_safety_override(mut classification: Classification) -> Classification {
    if classification.severity_score >= SAFETY_SEVERITY_THRESHOLD
        && classification.priority_level == PriorityLevel::Low
    {
        classification.priority_level = PriorityLevel::Medium;
        classification.priority_score = classification
            .priority_score
            .max(PriorityLevel::Medium.floor());
        classification
            .reasoning
            .push_str(" [safety override: severity >= 8 raised LOW to MEDIUM]");
    }
    classification
}

// ========== HEURISTIC ==========

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Sanitation,
        &["sewage", "sewer", "drain", "manhole", "toilet", "stench", "mosquito"],
    ),
    (
        Category::Water,
        &["water", "pipe", "leak", "burst", "tap", "supply", "flood"],
    ),
    (
        Category::Road,
        &["pothole", "road", "asphalt", "pavement", "footpath", "sinkhole", "speed bump"],
    ),
    (
        Category::Garbage,
        &["garbage", "trash", "waste", "litter", "rubbish", "dump", "bin"],
    ),
    (
        Category::Streetlight,
        &["streetlight", "street light", "lamp", "light pole", "bulb", "dark"],
    ),
];

const CRITICAL_KEYWORDS: &[&str] = &[
    "collapse",
    "sinkhole",
    "electrocut",
    "live wire",
    "exposed wire",
    "fire",
    "explosion",
    "gas leak",
    "accident",
    "injur",
    "flood",
    "contaminat",
    "open manhole",
    "burst",
    "danger",
    "emergency",
];

const MODERATE_KEYWORDS: &[&str] = &[
    "broken",
    "leak",
    "overflow",
    "blocked",
    "clogged",
    "pothole",
    "outage",
    "no water",
    "not working",
    "damaged",
    "smell",
];

fn matched<'a>(text: &str, keywords: &[&'a str]) -> Vec<&'a str> {
    keywords.iter().copied().filter(|k| text.contains(k)).collect()
}

/// Deterministic stand-in used whenever the model is unavailable.
pub fn heuristic_classification(request: &ClassificationRequest) -> Classification {
    let text = request.description.to_lowercase();

    let mut best: Option<(Category, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let hits = matched(&text, keywords).len();
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((*category, hits));
        }
    }
    let category = best
        .map(|(category, _)| category)
        .or(request.category_hint)
        .unwrap_or(Category::Other);

    let critical = matched(&text, CRITICAL_KEYWORDS);
    let moderate = matched(&text, MODERATE_KEYWORDS);
    let (severity, tier, trigger) = if !critical.is_empty() {
        (8, "critical", critical)
    } else if !moderate.is_empty() {
        (5, "moderate", moderate)
    } else {
        (3, "routine", Vec::new())
    };

    let environmental_impact = match category {
        Category::Garbage | Category::Sanitation | Category::Water => 6,
        _ => 3,
    };

    let reasoning = if trigger.is_empty() {
        format!("heuristic: no severity keywords, {} default", tier)
    } else {
        format!("heuristic: matched {} ({})", trigger.join(", "), tier)
    };

    Classification {
        category,
        severity_score: severity,
        location_sensitivity_score: 5,
        public_risk_score: severity,
        environmental_impact_score: environmental_impact,
        priority_score: severity,
        priority_level: PriorityLevel::for_score(severity),
        tags: trigger.into_iter().map(str::to_string).collect(),
        confidence: HEURISTIC_CONFIDENCE,
        reasoning,
        suggested_department: None,
        source: ClassificationSource::Heuristic,
    }
}
