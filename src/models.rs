use serde::Serialize;
use serde_json::{Map, Value};

/// Backend calls block the page for at most this long unless overridden.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const UNKNOWN_CLASSIFICATION: &str = "Unknown";

/// Shown in place of the ratio metric when the backend sent nothing usable.
pub const RATIO_PLACEHOLDER: &str = "—";

// Alternate key names, in resolution order. First present value wins.
const CLASSIFICATION_KEYS: &[&str] = &["classification", "final_classification"];
const DETAIL_KEYS: &[&str] = &["detail", "details"];
const RATIO_KEYS: &[&str] = &["ratio", "cdr"];
const ANNOTATED_IMAGE_KEYS: &[&str] = &["annotated_image_url"];

/// One upload, built fresh for every press of the analyze button.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub base_url: String,
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    pub timeout_seconds: u64,
}

impl PredictionRequest {
    pub fn new(
        base_url: impl Into<String>,
        file_name: impl Into<String>,
        file_bytes: Vec<u8>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            file_name: file_name.into(),
            file_bytes,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn endpoint(&self) -> String {
        predict_url(&self.base_url)
    }

    pub fn mime_type(&self) -> String {
        infer_mime(&self.file_name)
    }
}

/// Joins the backend base URL with `/predict`, dropping any trailing slashes.
pub fn predict_url(base_url: &str) -> String {
    format!("{}/predict", base_url.trim_end_matches('/'))
}

pub fn infer_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .to_string()
}

/// Colour category of the classification badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    Affirmative,
    Caution,
    Alert,
}

impl Badge {
    /// Substring match on the lower-cased label. `non` is checked before
    /// `suspect`, so "Non-suspect" stays affirmative.
    pub fn classify(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.contains("non") {
            Badge::Affirmative
        } else if label.contains("suspect") {
            Badge::Caution
        } else {
            Badge::Alert
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Badge::Affirmative => "badge-affirmative",
            Badge::Caution => "badge-caution",
            Badge::Alert => "badge-alert",
        }
    }
}

/// Normalized view of a successful `/predict` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub classification: String,
    pub detail: Option<String>,
    /// `ratio_raw` coerced to a number, `None` when that fails.
    pub ratio: Option<f64>,
    pub ratio_raw: Option<Value>,
    pub annotated_image_url: Option<String>,
    pub raw: Map<String, Value>,
}

impl PredictionResult {
    pub fn from_json(raw: Map<String, Value>) -> Self {
        let classification = first_present(&raw, CLASSIFICATION_KEYS)
            .map(value_text)
            .unwrap_or_else(|| UNKNOWN_CLASSIFICATION.to_string());
        let detail = first_present(&raw, DETAIL_KEYS).map(value_text);
        let ratio_raw = first_present(&raw, RATIO_KEYS).cloned();
        let ratio = ratio_raw.as_ref().and_then(coerce_ratio);
        let annotated_image_url = first_present(&raw, ANNOTATED_IMAGE_KEYS)
            .and_then(Value::as_str)
            .map(str::to_owned);

        Self {
            classification,
            detail,
            ratio,
            ratio_raw,
            annotated_image_url,
            raw,
        }
    }

    pub fn badge(&self) -> Badge {
        Badge::classify(&self.classification)
    }

    pub fn ratio_display(&self) -> String {
        match (self.ratio, &self.ratio_raw) {
            (Some(ratio), _) => format!("{:.2}", ratio),
            (None, Some(raw)) => value_text(raw),
            (None, None) => RATIO_PLACEHOLDER.to_string(),
        }
    }

    /// The annotated image URL, only when it is an absolute http(s) URL.
    pub fn annotated_image(&self) -> Option<&str> {
        self.annotated_image_url
            .as_deref()
            .filter(|url| is_web_url(url))
    }
}

pub fn is_web_url(candidate: &str) -> bool {
    match url::Url::parse(candidate) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Returns the value of the first key whose value is present.
pub fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| is_present(value))
}

/// `null`, blank strings and empty containers count as absent. Zero and
/// `false` are real values.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Display text of a JSON value: strings verbatim, anything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn coerce_ratio(value: &Value) -> Option<f64> {
    let ratio = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    ratio.is_finite().then_some(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn predict_url_has_single_slash() {
        assert_eq!(predict_url("http://host:5000"), "http://host:5000/predict");
        assert_eq!(predict_url("http://host:5000/"), "http://host:5000/predict");
        assert_eq!(predict_url("http://h//"), "http://h/predict");
        assert_eq!(
            predict_url("https://x.ngrok-free.app/api/"),
            "https://x.ngrok-free.app/api/predict"
        );
    }

    #[test]
    fn mime_is_inferred_from_extension() {
        assert_eq!(infer_mime("eye.png"), "image/png");
        assert_eq!(infer_mime("EYE.JPG"), "image/jpeg");
        assert_eq!(infer_mime("scan.jpeg"), "image/jpeg");
        assert_eq!(infer_mime("fundus"), "application/octet-stream");
    }

    #[test]
    fn badge_matches_substrings_case_insensitively() {
        assert_eq!(Badge::classify("Non-Glaucoma"), Badge::Affirmative);
        assert_eq!(Badge::classify("NON GLAUCOMATOUS"), Badge::Affirmative);
        assert_eq!(Badge::classify("Glaucoma Suspect"), Badge::Caution);
        assert_eq!(Badge::classify("non-suspect"), Badge::Affirmative);
        assert_eq!(Badge::classify("Glaucoma"), Badge::Alert);
        assert_eq!(Badge::classify(""), Badge::Alert);
    }

    #[test]
    fn alternate_keys_resolve_first_present() {
        let result = PredictionResult::from_json(object(json!({
            "classification": "",
            "final_classification": "Glaucoma",
            "details": "cup enlarged",
            "cdr": 0.71,
        })));

        assert_eq!(result.classification, "Glaucoma");
        assert_eq!(result.detail.as_deref(), Some("cup enlarged"));
        assert_eq!(result.ratio, Some(0.71));
        assert_eq!(result.annotated_image_url, None);
    }

    #[test]
    fn primary_key_wins_over_alternate() {
        let result = PredictionResult::from_json(object(json!({
            "classification": "Non-Glaucoma",
            "final_classification": "Glaucoma",
            "ratio": 0.3,
            "cdr": 0.9,
        })));

        assert_eq!(result.classification, "Non-Glaucoma");
        assert_eq!(result.ratio, Some(0.3));
    }

    #[test]
    fn missing_classification_is_unknown() {
        let result = PredictionResult::from_json(object(json!({ "ratio": null })));
        assert_eq!(result.classification, UNKNOWN_CLASSIFICATION);
        assert_eq!(result.badge(), Badge::Alert);
        assert_eq!(result.ratio_raw, None);
    }

    #[test]
    fn zero_ratio_is_present() {
        let result = PredictionResult::from_json(object(json!({ "ratio": 0, "cdr": 0.5 })));
        assert_eq!(result.ratio, Some(0.0));
        assert_eq!(result.ratio_display(), "0.00");
    }

    #[test]
    fn ratio_coercion() {
        assert_eq!(coerce_ratio(&json!("0.6")), Some(0.6));
        assert_eq!(coerce_ratio(&json!(" 0.45 ")), Some(0.45));
        assert_eq!(coerce_ratio(&json!(1)), Some(1.0));
        assert_eq!(coerce_ratio(&json!("high")), None);
        assert_eq!(coerce_ratio(&json!("inf")), None);
        assert_eq!(coerce_ratio(&json!(true)), None);
        assert_eq!(coerce_ratio(&json!([0.5])), None);
    }

    #[test]
    fn ratio_display_formats() {
        let numeric = PredictionResult::from_json(object(json!({ "ratio": "0.6" })));
        assert_eq!(numeric.ratio_display(), "0.60");

        let long = PredictionResult::from_json(object(json!({ "cdr": 0.4567 })));
        assert_eq!(long.ratio_display(), "0.46");

        let text = PredictionResult::from_json(object(json!({ "ratio": "not measured" })));
        assert_eq!(text.ratio, None);
        assert_eq!(text.ratio_display(), "not measured");

        let empty = PredictionResult::from_json(object(json!({ "ratio": "" })));
        assert_eq!(empty.ratio_display(), RATIO_PLACEHOLDER);

        let absent = PredictionResult::from_json(Map::new());
        assert_eq!(absent.ratio_display(), RATIO_PLACEHOLDER);
    }

    #[test]
    fn annotated_image_requires_web_url() {
        let ok = PredictionResult::from_json(object(json!({
            "annotated_image_url": "http://x/img.png"
        })));
        assert_eq!(ok.annotated_image(), Some("http://x/img.png"));

        for bad in ["/static/img.png", "ftp://x/img.png", "httpx", "javascript:alert(1)"] {
            let result =
                PredictionResult::from_json(object(json!({ "annotated_image_url": bad })));
            assert_eq!(result.annotated_image(), None, "{bad} should be rejected");
        }

        let not_string =
            PredictionResult::from_json(object(json!({ "annotated_image_url": 42 })));
        assert_eq!(not_string.annotated_image_url, None);
    }

    #[test]
    fn non_string_values_render_as_json() {
        let result = PredictionResult::from_json(object(json!({
            "classification": 1,
            "detail": { "cup": 0.3 },
        })));
        assert_eq!(result.classification, "1");
        assert_eq!(result.detail.as_deref(), Some(r#"{"cup":0.3}"#));
    }

    #[test]
    fn request_defaults() {
        let request = PredictionRequest::new("http://h/", "eye.jpeg", vec![1, 2, 3]);
        assert_eq!(request.timeout_seconds, DEFAULT_TIMEOUT_SECS);
        assert_eq!(request.endpoint(), "http://h/predict");
        assert_eq!(request.mime_type(), "image/jpeg");
        assert_eq!(request.with_timeout(5).timeout_seconds, 5);
    }
}
