//! Network-free half of the analysis boundary: the prompt builders,
//! sampling bounds, comparison-window fill, and the structured payload
//! types with their validation gate. The `llm` module (feature
//! `gemini`) drives these against the live API.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DataStoryError, Result};
use crate::record::AggregatedRecord;

pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash";

/// Max data rows serialized into the analysis prompt.
pub const MAX_SAMPLE_ROWS: usize = 20;
/// Rough prompt size bound; the JSON sample is truncated at half this.
pub const MAX_PROMPT_CHARS_ESTIMATE: usize = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ChartType {
    LineChart,
    BarChart,
    PieChart,
    ScatterChart,
}

/// `y` may name a single series or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum SeriesKeys {
    One(String),
    Many(Vec<String>),
}

impl SeriesKeys {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let keys = match self {
            SeriesKeys::One(key) => std::slice::from_ref(key),
            SeriesKeys::Many(keys) => keys.as_slice(),
        };
        keys.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChartDataKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<SeriesKeys>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartSuggestion {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub title: String,
    pub data_keys: ChartDataKeys,
    pub description: String,
}

impl ChartSuggestion {
    /// Whether every referenced data key names a known record field.
    /// The model is instructed to only use real field names but may
    /// not comply; renderers check this before binding a chart.
    pub fn references_known_fields(&self, fields: &[&str]) -> bool {
        let known = |key: &Option<String>| match key {
            Some(k) => fields.contains(&k.as_str()),
            None => true,
        };
        let series_known = match &self.data_keys.y {
            Some(series) => series.iter().all(|k| fields.contains(&k)),
            None => true,
        };
        known(&self.data_keys.x)
            && series_known
            && known(&self.data_keys.name)
            && known(&self.data_keys.value)
            && known(&self.data_keys.z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSuggestion {
    pub description: String,
    pub suggested_chart_type_for_theme: String,
}

/// The full dashboard payload (current deployment shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalysis {
    pub summary_text: String,
    pub key_insights: Vec<String>,
    pub chart_suggestions: Vec<ChartSuggestion>,
    pub actionable_recommendations: Vec<String>,
    pub visualization_theme_suggestion: ThemeSuggestion,
}

impl DashboardAnalysis {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(DashboardAnalysis)
    }

    pub fn schema_as_json() -> Result<String> {
        let schema = Self::generate_json_schema();
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// The reduced payload shape an older deployment returns: no chart
/// suggestions, theme collapsed to a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryAnalysis {
    pub summary_text: String,
    pub key_insights: Vec<String>,
    pub actionable_recommendations: Vec<String>,
    pub theme: String,
}

/// A validated model reply, tagged by which deployment shape it
/// matched. Never constructed from a reply that failed the structural
/// checks in [`parse_analysis_response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Dashboard(DashboardAnalysis),
    Summary(SummaryAnalysis),
}

impl AnalysisResponse {
    pub fn summary_text(&self) -> &str {
        match self {
            AnalysisResponse::Dashboard(d) => &d.summary_text,
            AnalysisResponse::Summary(s) => &s.summary_text,
        }
    }

    pub fn key_insights(&self) -> &[String] {
        match self {
            AnalysisResponse::Dashboard(d) => &d.key_insights,
            AnalysisResponse::Summary(s) => &s.key_insights,
        }
    }
}

/// Validate and parse a raw model reply. Required fields must be
/// present and hold the right container type before any
/// deserialization happens; a structural mismatch fails the request
/// rather than filling in defaults.
pub fn parse_analysis_response(raw: &str) -> Result<AnalysisResponse> {
    let cleaned = clean_json_output(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| DataStoryError::MalformedResponse(e.to_string()))?;

    let object = value.as_object().ok_or_else(|| {
        DataStoryError::SchemaMismatch("top level is not a JSON object".to_string())
    })?;

    require_string(object, "summaryText")?;
    require_array(object, "keyInsights")?;
    require_array(object, "actionableRecommendations")?;

    if object.contains_key("chartSuggestions") || object.contains_key("visualizationThemeSuggestion")
    {
        require_array(object, "chartSuggestions")?;
        require_object(object, "visualizationThemeSuggestion")?;
        let dashboard: DashboardAnalysis = serde_json::from_value(value)
            .map_err(|e| DataStoryError::SchemaMismatch(e.to_string()))?;
        return Ok(AnalysisResponse::Dashboard(dashboard));
    }

    require_string(object, "theme")?;
    let summary: SummaryAnalysis =
        serde_json::from_value(value).map_err(|e| DataStoryError::SchemaMismatch(e.to_string()))?;
    Ok(AnalysisResponse::Summary(summary))
}

fn require_string(object: &serde_json::Map<String, Value>, field: &str) -> Result<()> {
    match object.get(field) {
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(DataStoryError::SchemaMismatch(format!(
            "`{}` is not a string",
            field
        ))),
        None => Err(DataStoryError::SchemaMismatch(format!(
            "missing field `{}`",
            field
        ))),
    }
}

fn require_array(object: &serde_json::Map<String, Value>, field: &str) -> Result<()> {
    match object.get(field) {
        Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(DataStoryError::SchemaMismatch(format!(
            "`{}` is not an array",
            field
        ))),
        None => Err(DataStoryError::SchemaMismatch(format!(
            "missing field `{}`",
            field
        ))),
    }
}

fn require_object(object: &serde_json::Map<String, Value>, field: &str) -> Result<()> {
    match object.get(field) {
        Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(DataStoryError::SchemaMismatch(format!(
            "`{}` is not an object",
            field
        ))),
        None => Err(DataStoryError::SchemaMismatch(format!(
            "missing field `{}`",
            field
        ))),
    }
}

/// Extract the JSON span from a reply that may wrap it in a fenced
/// code block or surrounding prose.
pub fn clean_json_output(raw: &str) -> String {
    if let Some(start) = raw.find('{') {
        if let Some(end) = raw.rfind('}') {
            if end > start {
                return raw[start..=end].to_string();
            }
        }
    }
    if let Some(start) = raw.find('[') {
        if let Some(end) = raw.rfind(']') {
            if end > start {
                return raw[start..=end].to_string();
            }
        }
    }
    raw.trim().to_string()
}

/// Strip a single surrounding ``` fence from a plain-text reply.
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some((_, body)) = rest.split_once('\n') {
            if let Some(inner) = body.trim_end().strip_suffix("```") {
                return inner.trim().to_string();
            }
        }
    }
    trimmed.to_string()
}

/// The bounded sample that goes into the prompt.
pub fn sample_records(records: &[AggregatedRecord]) -> &[AggregatedRecord] {
    &records[..records.len().min(MAX_SAMPLE_ROWS)]
}

/// Serialize the sample, truncating at half the prompt budget on a
/// char boundary so umlauts in region names cannot split.
fn serialized_sample(records: &[AggregatedRecord]) -> Result<String> {
    let mut json = serde_json::to_string_pretty(sample_records(records))?;
    let budget = MAX_PROMPT_CHARS_ESTIMATE / 2;
    if json.len() > budget {
        let mut cut = budget;
        while !json.is_char_boundary(cut) {
            cut -= 1;
        }
        json.truncate(cut);
        json.push_str("\n... (Daten gekürzt)");
    }
    Ok(json)
}

/// The dashboard analysis prompt. The data section carries the
/// serialized aggregated sample; `dataKeys` in the reply must reference
/// the listed field names.
pub fn build_analysis_prompt(records: &[AggregatedRecord], file_name: &str) -> Result<String> {
    let sample = serialized_sample(records)?;
    let headers = AggregatedRecord::field_names().join(", ");
    let sample_len = sample_records(records).len();

    Ok(format!(
        r#"Du bist ein KI-Datenanalyst und Storytelling-Experte. Entwickle aus den bereitgestellten Daten (im JSON-Format) ein umfassendes Verständnis und erstelle eine visuelle Datenstory.

Die Daten stammen aus der Datei '{file_name}'.
Die Spaltenüberschriften der vollständigen Daten sind: {headers}.
Hier sind die ersten {sample_len} Zeilen der Daten (oder ein repräsentativer Auszug):
```json
{sample}
```

Analysiere diese Daten und gib eine JSON-Antwort mit exakt der folgenden Struktur zurück. Ändere keine Schlüsselnamen:

{{
  "summaryText": "Eine prägnante Zusammenfassung der wichtigsten Erkenntnisse, Trends und Ausreißer in 2-4 Sätzen.",
  "keyInsights": ["3-5 prägnante Bullet Points (Strings) zu Trends, Ausreißern oder Korrelationen."],
  "chartSuggestions": [
    {{
      "type": "LineChart | BarChart | PieChart | ScatterChart",
      "title": "Ein aussagekräftiger Titel für das Diagramm",
      "dataKeys": {{
        "x": "Spaltenname für die X-Achse",
        "y": "Spaltenname für die Y-Achse oder Array von Spaltennamen",
        "name": "Kategoriespalte für Kreisdiagramme",
        "value": "Wertspalte für Kreisdiagramme",
        "z": "Optionale dritte Dimension für Scatterplots"
      }},
      "description": "Warum dieses Diagramm relevant ist und was es zeigt."
    }}
  ],
  "actionableRecommendations": ["2-3 konkrete, handlungsorientierte Empfehlungen (Strings)."],
  "visualizationThemeSuggestion": {{
    "description": "Ein kurzer Vorschlag für ein Visualisierungsdesign oder Thema.",
    "suggestedChartTypeForTheme": "BarChart"
  }}
}}

Wichtige Hinweise:
- Identifiziere Trends (Wachstum, Rückgang, Saisonalität), signifikante Ausreißer und Korrelationen.
- Die `dataKeys` müssen exakt mit den oben genannten Spaltenüberschriften übereinstimmen.
- Erstelle 2 bis 3 unterschiedliche `chartSuggestions`.
- Für Zeitreihen eignet sich ein LineChart, für Kategorien BarChart oder PieChart, für zwei numerische Variablen ein ScatterChart.
- Die gesamte Ausgabe muss ein valides JSON-Objekt sein. Gib keinen Text vor oder nach dem JSON-Objekt aus.
"#
    ))
}

/// The free-text chat prompt over the (zero-filled) dataset. The reply
/// is plain text, not JSON.
pub fn build_chat_prompt(
    records: &[AggregatedRecord],
    file_name: &str,
    question: &str,
) -> Result<String> {
    let data = serde_json::to_string_pretty(records)?;

    Ok(format!(
        r#"Du bist ein KI-Datenanalyst. Dir liegt der folgende aggregierte Datensatz aus der Datei '{file_name}' vor (Monat, Region, Umsatz):

```json
{data}
```

Frage: {question}

Antworte kurz und präzise auf Deutsch, ausschließlich auf Basis dieser Daten. Antworte als Fließtext ohne JSON."#
    ))
}

/// The two most recent months present in the data, used as the
/// comparison window for chat questions.
pub fn comparison_periods(records: &[AggregatedRecord]) -> Vec<String> {
    let mut months: Vec<&str> = records.iter().map(|r| r.month.as_str()).collect();
    months.sort_unstable();
    months.dedup();
    months
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|m| m.to_string())
        .collect()
}

/// Back-fill the comparison window so every region has an entry for
/// each comparison period; missing combinations default to a
/// zero-measure record. Zero-filling (rather than omission) keeps
/// "no revenue" regions visible to the model.
pub fn fill_comparison_gaps(records: &[AggregatedRecord]) -> Vec<AggregatedRecord> {
    let periods = comparison_periods(records);
    let mut regions: Vec<&str> = records.iter().map(|r| r.region.as_str()).collect();
    regions.sort_unstable();
    regions.dedup();

    let mut filled = Vec::with_capacity(regions.len() * periods.len());
    for region in &regions {
        for month in &periods {
            let existing = records
                .iter()
                .find(|r| r.region == *region && &r.month == month);
            filled.push(existing.cloned().unwrap_or_else(|| AggregatedRecord {
                month: month.clone(),
                region: region.to_string(),
                revenue: 0.0,
            }));
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(month: &str, region: &str, revenue: f64) -> AggregatedRecord {
        AggregatedRecord {
            month: month.into(),
            region: region.into(),
            revenue,
        }
    }

    const RICH_REPLY: &str = r#"{
        "summaryText": "Die Umsätze sind im März gestiegen.",
        "keyInsights": ["Region Nord wächst am stärksten."],
        "chartSuggestions": [
            {
                "type": "LineChart",
                "title": "Umsatz pro Monat",
                "dataKeys": { "x": "month", "y": "revenue" },
                "description": "Zeigt den Verlauf über die Monate."
            }
        ],
        "actionableRecommendations": ["Marketing im Februar prüfen."],
        "visualizationThemeSuggestion": {
            "description": "Dynamische Balkengrafik.",
            "suggestedChartTypeForTheme": "BarChart"
        }
    }"#;

    #[test]
    fn test_parse_dashboard_reply() {
        let parsed = parse_analysis_response(RICH_REPLY).unwrap();
        match parsed {
            AnalysisResponse::Dashboard(dashboard) => {
                assert_eq!(dashboard.chart_suggestions.len(), 1);
                assert_eq!(
                    dashboard.chart_suggestions[0].chart_type,
                    ChartType::LineChart
                );
            }
            AnalysisResponse::Summary(_) => panic!("expected the dashboard shape"),
        }
    }

    #[test]
    fn test_parse_fenced_reply() {
        let fenced = format!("```json\n{}\n```", RICH_REPLY);
        assert!(parse_analysis_response(&fenced).is_ok());
    }

    #[test]
    fn test_parse_summary_reply() {
        let reply = r#"{
            "summaryText": "Kurzfassung.",
            "keyInsights": ["Ein Insight."],
            "actionableRecommendations": ["Eine Empfehlung."],
            "theme": "Frühlingsdesign"
        }"#;
        match parse_analysis_response(reply).unwrap() {
            AnalysisResponse::Summary(summary) => assert_eq!(summary.theme, "Frühlingsdesign"),
            AnalysisResponse::Dashboard(_) => panic!("expected the reduced shape"),
        }
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let reply = r#"{
            "summaryText": "Ohne Insights.",
            "actionableRecommendations": [],
            "theme": "egal"
        }"#;
        let err = parse_analysis_response(reply).unwrap_err();
        assert!(matches!(err, DataStoryError::SchemaMismatch(_)));
        assert!(err.to_string().contains("keyInsights"));
    }

    #[test]
    fn test_wrong_container_type_is_rejected() {
        let reply = r#"{
            "summaryText": "x",
            "keyInsights": "kein Array",
            "actionableRecommendations": [],
            "theme": "egal"
        }"#;
        assert!(matches!(
            parse_analysis_response(reply),
            Err(DataStoryError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_non_json_reply_is_a_parse_failure() {
        assert!(matches!(
            parse_analysis_response("Entschuldigung, das kann ich nicht."),
            Err(DataStoryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```text\nHallo\n```"), "Hallo");
        assert_eq!(strip_code_fence("Hallo"), "Hallo");
        assert_eq!(strip_code_fence("  Hallo  "), "Hallo");
    }

    #[test]
    fn test_prompt_contains_sample_and_headers() {
        let records = vec![
            record("2025-02", "Nord", 1500.0),
            record("2025-03", "Nord", 1800.0),
        ];
        let prompt = build_analysis_prompt(&records, "umsatz.csv").unwrap();

        assert!(prompt.contains("umsatz.csv"));
        assert!(prompt.contains("month, region, revenue"));
        let sample = serde_json::to_string_pretty(&records).unwrap();
        assert!(prompt.contains(&sample));
    }

    #[test]
    fn test_prompt_sample_is_bounded() {
        let records: Vec<AggregatedRecord> = (0..200)
            .map(|i| record(&format!("20{:02}-01", i % 99), "Nord", i as f64))
            .collect();
        let prompt = build_analysis_prompt(&records, "groß.csv").unwrap();

        // 21st record never appears
        let beyond = serde_json::to_string(&records[MAX_SAMPLE_ROWS]).unwrap();
        assert!(!prompt.contains(&beyond));
        assert!(prompt.len() < MAX_PROMPT_CHARS_ESTIMATE);
    }

    #[test]
    fn test_chart_suggestion_field_check() {
        let suggestion = ChartSuggestion {
            chart_type: ChartType::LineChart,
            title: "Umsatz".into(),
            data_keys: ChartDataKeys {
                x: Some("month".into()),
                y: Some(SeriesKeys::One("revenue".into())),
                ..Default::default()
            },
            description: String::new(),
        };
        assert!(suggestion.references_known_fields(AggregatedRecord::field_names()));

        let invented = ChartSuggestion {
            data_keys: ChartDataKeys {
                y: Some(SeriesKeys::Many(vec!["revenue".into(), "profit".into()])),
                ..Default::default()
            },
            ..suggestion
        };
        assert!(!invented.references_known_fields(AggregatedRecord::field_names()));
    }

    #[test]
    fn test_comparison_periods_are_latest_two() {
        let records = vec![
            record("2025-01", "Nord", 1.0),
            record("2025-03", "Nord", 3.0),
            record("2025-02", "Süd", 2.0),
        ];
        assert_eq!(comparison_periods(&records), vec!["2025-02", "2025-03"]);
    }

    #[test]
    fn test_fill_comparison_gaps_zero_fills() {
        let records = vec![
            record("2025-02", "Nord", 1500.0),
            record("2025-03", "Nord", 1800.0),
            record("2025-03", "Süd", 950.0),
        ];
        let filled = fill_comparison_gaps(&records);

        // Every region × period combination is present
        assert_eq!(filled.len(), 4);
        let south_feb = filled
            .iter()
            .find(|r| r.region == "Süd" && r.month == "2025-02")
            .unwrap();
        assert_eq!(south_feb.revenue, 0.0);

        let north_feb = filled
            .iter()
            .find(|r| r.region == "Nord" && r.month == "2025-02")
            .unwrap();
        assert_eq!(north_feb.revenue, 1500.0);
    }

    #[test]
    fn test_schema_generation() {
        let schema = DashboardAnalysis::schema_as_json().unwrap();
        assert!(schema.contains("summaryText"));
        assert!(schema.contains("chartSuggestions"));
        assert!(schema.contains("visualizationThemeSuggestion"));
    }
}
