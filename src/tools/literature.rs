//! Literature search for the Researcher: PubMed and ClinicalTrials.gov.

use crate::llm::client::{ensure_success, http_client};
use crate::tools::registry::Capability;
use crate::tools::schema::FunctionSpec;
use crate::types::{AppError, Result};
use crate::utils::sync_bridge::run_sync;
use crate::utils::toml_config::LiteratureConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const SEARCH_PUBMED_DOC: &str = "\
Searches PubMed for medical abstracts related to the query.

Args:
    query: The search keywords (e.g., \"Treg cell therapy\").

Returns:
    A JSON string containing a list of articles with titles and abstracts.";

const SEARCH_CLINICAL_TRIALS_DOC: &str = "\
Searches ClinicalTrials.gov for active studies.

Args:
    query: The search keywords.

Returns:
    A JSON string containing a list of clinical trials.";

/// One search hit, in the shape the Researcher's model reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteratureRecord {
    pub source: String,
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
}

#[async_trait]
pub trait LiteratureSource: Send + Sync {
    async fn search_pubmed(&self, query: &str, max_results: usize)
        -> Result<Vec<LiteratureRecord>>;

    async fn search_clinical_trials(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<LiteratureRecord>>;
}

/// NCBI E-utilities and the ClinicalTrials.gov v2 API over HTTP.
pub struct HttpLiteratureSource {
    client: reqwest::Client,
    eutils_base: String,
    trials_base: String,
    email: Option<String>,
}

impl HttpLiteratureSource {
    pub fn new(
        eutils_base: impl Into<String>,
        trials_base: impl Into<String>,
        email: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            eutils_base: eutils_base.into(),
            trials_base: trials_base.into(),
            email,
        })
    }

    pub fn from_config(config: &LiteratureConfig) -> Result<Self> {
        Self::new(
            config.eutils_base.clone(),
            config.clinical_trials_base.clone(),
            config.email.clone(),
        )
    }

    async fn get(&self, url: String, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(fetch_error)?;
        ensure_success(response)
            .await
            .map_err(|e| AppError::CapabilityExecution(e.to_string()))
    }

    async fn get_json(&self, url: String, query: &[(&str, String)]) -> Result<Value> {
        self.get(url, query)
            .await?
            .json()
            .await
            .map_err(|e| AppError::CapabilityExecution(format!("malformed response: {}", e)))
    }

    async fn get_text(&self, url: String, query: &[(&str, String)]) -> Result<String> {
        self.get(url, query).await?.text().await.map_err(fetch_error)
    }

    fn eutils_params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }
}

fn fetch_error(err: reqwest::Error) -> AppError {
    AppError::CapabilityExecution(format!("literature request failed: {}", err))
}

#[async_trait]
impl LiteratureSource for HttpLiteratureSource {
    async fn search_pubmed(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<LiteratureRecord>> {
        info!(query, "Searching PubMed");
        let base = self.eutils_base.trim_end_matches('/');

        let search = self
            .get_json(
                format!("{}/esearch.fcgi", base),
                &self.eutils_params(vec![
                    ("db", "pubmed".to_string()),
                    ("term", query.to_string()),
                    ("retmode", "json".to_string()),
                    ("retmax", max_results.to_string()),
                ]),
            )
            .await?;
        let ids = parse_esearch_ids(&search);
        if ids.is_empty() {
            debug!(query, "No PubMed results");
            return Ok(Vec::new());
        }

        let articles = self
            .get_text(
                format!("{}/efetch.fcgi", base),
                &self.eutils_params(vec![
                    ("db", "pubmed".to_string()),
                    ("id", ids.join(",")),
                    ("retmode", "xml".to_string()),
                ]),
            )
            .await?;
        let mut records = parse_pubmed_articles(&articles)?;
        records.truncate(max_results);
        Ok(records)
    }

    async fn search_clinical_trials(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<LiteratureRecord>> {
        info!(query, "Searching ClinicalTrials.gov");
        let body = self
            .get_json(
                format!("{}/studies", self.trials_base.trim_end_matches('/')),
                &[
                    ("query.term", query.to_string()),
                    ("pageSize", max_results.to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;
        let mut records = parse_studies(&body);
        records.truncate(max_results);
        Ok(records)
    }
}

fn parse_esearch_ids(json: &Value) -> Vec<String> {
    json.pointer("/esearchresult/idlist")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Concatenated text of a node, including text inside inline markup.
fn node_text(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn first_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.has_tag_name(tag))
        .map(node_text)
        .filter(|t| !t.is_empty())
}

/// Parse an efetch `PubmedArticleSet`. Structured abstracts keep their
/// section labels, one section per line.
fn parse_pubmed_articles(xml: &str) -> Result<Vec<LiteratureRecord>> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| AppError::CapabilityExecution(format!("malformed PubMed XML: {}", e)))?;

    let records = doc
        .descendants()
        .filter(|n| n.has_tag_name("PubmedArticle"))
        .map(|article| {
            let pmid = first_text(article, "PMID").unwrap_or_else(|| "Unknown".to_string());
            let sections: Vec<String> = article
                .descendants()
                .filter(|n| n.has_tag_name("Abstract"))
                .flat_map(|abs| abs.children().filter(|n| n.has_tag_name("AbstractText")))
                .map(|section| {
                    let text = node_text(section);
                    match section.attribute("Label") {
                        Some(label) if !text.is_empty() => format!("{}: {}", label, text),
                        _ => text,
                    }
                })
                .filter(|t| !t.is_empty())
                .collect();
            let content = if sections.is_empty() {
                "No abstract available.".to_string()
            } else {
                sections.join("\n")
            };

            LiteratureRecord {
                source: "PubMed".to_string(),
                title: first_text(article, "ArticleTitle").unwrap_or_else(|| "No Title".to_string()),
                content,
                url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
                id: pmid,
            }
        })
        .collect();
    Ok(records)
}

fn parse_studies(json: &Value) -> Vec<LiteratureRecord> {
    let Some(studies) = json.get("studies").and_then(Value::as_array) else {
        return Vec::new();
    };

    studies
        .iter()
        .map(|study| {
            let field = |pointer: &str| {
                study
                    .pointer(pointer)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            };
            let nct_id = field("/protocolSection/identificationModule/nctId").unwrap_or("Unknown");
            let title = field("/protocolSection/identificationModule/officialTitle")
                .or_else(|| field("/protocolSection/identificationModule/briefTitle"))
                .unwrap_or("No Title");
            let summary = field("/protocolSection/descriptionModule/briefSummary")
                .unwrap_or("No summary available.");

            LiteratureRecord {
                source: "ClinicalTrials.gov".to_string(),
                id: nct_id.to_string(),
                title: title.to_string(),
                content: summary.to_string(),
                url: format!("https://clinicaltrials.gov/study/{}", nct_id),
            }
        })
        .collect()
}

fn records_json(records: &[LiteratureRecord]) -> Result<String> {
    serde_json::to_string_pretty(records)
        .map_err(|e| AppError::CapabilityExecution(format!("encode results: {}", e)))
}

fn query_arg(args: &Map<String, Value>) -> String {
    args.get("query")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `search_pubmed(query)` and `search_clinical_trials(query)` over `source`.
pub fn literature_capabilities(
    source: Arc<dyn LiteratureSource>,
    max_results: usize,
) -> Vec<Capability> {
    let pubmed_source = Arc::clone(&source);
    let pubmed = Capability::new(
        FunctionSpec::new("search_pubmed")
            .doc(SEARCH_PUBMED_DOC)
            .param::<str>("query"),
        move |args: &Map<String, Value>| {
            let query = query_arg(args);
            let source = Arc::clone(&pubmed_source);
            let records =
                run_sync(async move { source.search_pubmed(&query, max_results).await })?;
            records_json(&records)
        },
    );

    let trials = Capability::new(
        FunctionSpec::new("search_clinical_trials")
            .doc(SEARCH_CLINICAL_TRIALS_DOC)
            .param::<str>("query"),
        move |args: &Map<String, Value>| {
            let query = query_arg(args);
            let source = Arc::clone(&source);
            let records =
                run_sync(async move { source.search_clinical_trials(&query, max_results).await })?;
            records_json(&records)
        },
    );

    vec![pubmed, trials]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const EFETCH_XML: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">222</PMID>
      <Article PubModel="Print">
        <ArticleTitle>Low-dose <i>IL-2</i> expands Tregs.</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Tregs depend on IL-2.</AbstractText>
          <AbstractText Label="RESULTS">Treg counts rose threefold.</AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ReferenceList><Reference><ArticleIdList><ArticleId IdType="pubmed">999</ArticleId></ArticleIdList></Reference></ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">111</PMID>
      <Article><ArticleTitle>Editorial.</ArticleTitle></Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_pubmed_articles() {
        let records = parse_pubmed_articles(EFETCH_XML).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "222");
        assert_eq!(records[0].title, "Low-dose IL-2 expands Tregs.");
        assert_eq!(
            records[0].content,
            "BACKGROUND: Tregs depend on IL-2.\nRESULTS: Treg counts rose threefold."
        );
        assert_eq!(records[0].url, "https://pubmed.ncbi.nlm.nih.gov/222/");
        assert_eq!(records[1].content, "No abstract available.");
    }

    #[test]
    fn test_parse_pubmed_articles_rejects_garbage() {
        let err = parse_pubmed_articles("<PubmedArticleSet><oops>").unwrap_err();
        assert!(err.to_string().contains("malformed PubMed XML"));
    }

    #[test]
    fn test_parse_studies_fallbacks() {
        let records = parse_studies(&json!({
            "studies": [
                {"protocolSection": {
                    "identificationModule": {"nctId": "NCT01", "briefTitle": "Brief"},
                    "descriptionModule": {}
                }},
                {"protocolSection": {
                    "identificationModule": {"nctId": "NCT02", "briefTitle": "B", "officialTitle": "Official"},
                    "descriptionModule": {"briefSummary": "Low-dose IL-2."}
                }}
            ]
        }));

        assert_eq!(records[0].title, "Brief");
        assert_eq!(records[0].content, "No summary available.");
        assert_eq!(records[1].title, "Official");
        assert_eq!(records[1].url, "https://clinicaltrials.gov/study/NCT02");
        assert_eq!(records[1].source, "ClinicalTrials.gov");
    }

    #[test]
    fn test_parse_esearch_ids_missing() {
        assert!(parse_esearch_ids(&json!({"error": "bad"})).is_empty());
    }
}
