use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Connection settings for the experience backend.
///
/// `base_url` is the scheme+host(+prefix) the per-property paths are appended
/// to. `token` is forwarded as `Authorization: Token <value>` when present.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_secs: 15,
            user_agent: format!("experience-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Thin typed HTTP client for the experience endpoints. Cheap to clone; the
/// underlying connection pool is shared.
#[derive(Clone)]
pub struct ExperienceClient {
    http: Client,
    cfg: Arc<ClientConfig>,
}

impl ExperienceClient {
    pub fn new(cfg: ClientConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &cfg.token {
            match HeaderValue::from_str(&format!("Token {token}")) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    warn!("experience api token contains non-header characters; sending unauthenticated");
                }
            }
        }

        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            cfg: Arc::new(cfg),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Root categories of a property's taxonomy, with their translations.
    pub async fn categories(&self, property_code: &str) -> Result<CategoriesResponse, ApiError> {
        self.get_json(&format!("experience/{property_code}"), &[]).await
    }

    /// Direct children of `category_id`, same envelope as the root listing.
    pub async fn subcategories(
        &self,
        property_code: &str,
        category_id: i64,
    ) -> Result<CategoriesResponse, ApiError> {
        self.get_json(
            &format!("experience/{property_code}/category/{category_id}"),
            &[],
        )
        .await
    }

    /// Offer listing for one category. Either window bound may be omitted; the
    /// backend then falls back to its "everything" default for that side.
    pub async fn experiences_by_category(
        &self,
        property_code: &str,
        category_id: i64,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<ExperiencesByCategoryResponse, ApiError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(start) = start_date {
            query.push(("startDate", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(end) = end_date {
            query.push(("endDate", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        self.get_json(
            &format!("experience/bycategory/{property_code}/{category_id}"),
            &query,
        )
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "experience api request");

        let mut req = self.http.get(&url);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        debug!(url = %url, status = %status.as_u16(), body_len = body.len(), "experience api response");

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let sample = body.get(..200).unwrap_or(&body);
            debug!(url = %url, error = %e, sample_body = %sample, "experience api decode failure");
            ApiError::Json(e)
        })
    }
}

// --- wire types --------------------------------------------------------------
//
// Field names mirror the backend payloads exactly; the ID/CODE suffixes do not
// follow camelCase, so those fields carry explicit renames.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCategory {
    #[serde(rename = "offerCategoryID")]
    pub offer_category_id: i64,
    #[serde(default)]
    pub offer_category_name: String,
    #[serde(rename = "offerCategoryCODE", default)]
    pub offer_category_code: String,
    #[serde(rename = "offerID", default)]
    pub offer_id: Option<i64>,
    #[serde(default)]
    pub offer_category_commercial_name: String,
    #[serde(default)]
    pub offer_category_image_url: String,
    #[serde(default)]
    pub has_category_child: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCategoryTranslation {
    #[serde(rename = "languageID")]
    pub language_id: i64,
    #[serde(rename = "offerCategoryID")]
    pub offer_category_id: i64,
    #[serde(default)]
    pub offer_category_commercial_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(rename = "offerID")]
    pub offer_id: i64,
    #[serde(rename = "offerCategoryID")]
    pub offer_category_id: i64,
    #[serde(rename = "serviceID", default)]
    pub service_id: Option<i64>,
    #[serde(default)]
    pub offer_name: Option<String>,
    #[serde(default)]
    pub offer_category_name: Option<String>,
    #[serde(rename = "offerCODE", default)]
    pub offer_code: Option<String>,
    #[serde(default)]
    pub min_duration: Option<String>,
    #[serde(default)]
    pub min_duration_hours: Option<i32>,
    #[serde(default)]
    pub min_duration_minutes: Option<i32>,
    #[serde(default)]
    pub max_duration: Option<String>,
    #[serde(default)]
    pub max_duration_hours: Option<i32>,
    #[serde(default)]
    pub max_duration_minutes: Option<i32>,
    #[serde(default)]
    pub is_all_period: Option<bool>,
    #[serde(default)]
    pub service_location: Option<String>,
    #[serde(default)]
    pub meeting_location: Option<String>,
    #[serde(default)]
    pub is_different_meeting_point: Option<bool>,
    #[serde(default)]
    pub is_transactive: Option<bool>,
    #[serde(default)]
    pub is_informative: Option<bool>,
    #[serde(default)]
    pub multimedia: Vec<OfferMedia>,
    #[serde(default)]
    pub rates: Vec<Rate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferTranslation {
    #[serde(rename = "offerID")]
    pub offer_id: i64,
    #[serde(rename = "languageID")]
    pub language_id: i64,
    #[serde(default)]
    pub offer_name: String,
    #[serde(default)]
    pub offer_short_description: String,
    #[serde(default)]
    pub offer_long_description: String,
    #[serde(default)]
    pub how_to_order: String,
    #[serde(default)]
    pub who_can_order: String,
    #[serde(default)]
    pub how_to_use: String,
}

/// One availability row of an offer. A row without a date means the offer is
/// open over the whole period rather than on a specific day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningHour {
    #[serde(rename = "offerID", default)]
    pub offer_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub day_name: Option<String>,
    #[serde(default)]
    pub is_all_period: Option<bool>,
    #[serde(default)]
    pub is_opened: Option<bool>,
    #[serde(default)]
    pub opening_hours_string: Option<String>,
    #[serde(default)]
    pub opening_hours: Vec<TimeSlot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferMedia {
    #[serde(rename = "offerID", default)]
    pub offer_id: Option<i64>,
    #[serde(rename = "multimediaID", default)]
    pub multimedia_id: Option<i64>,
    #[serde(default)]
    pub multimedia_url: Option<String>,
    #[serde(rename = "multimediaTypeID", default)]
    pub multimedia_type_id: Option<i64>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    #[serde(rename = "rateID", default)]
    pub rate_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price_per_unit: Option<f64>,
    #[serde(default)]
    pub has_default: Option<bool>,
    #[serde(default)]
    pub unit_of_measure_name: Option<String>,
}

/// Envelope of the root/subcategory listings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesResponse {
    #[serde(default)]
    pub offer_categories: Vec<OfferCategory>,
    #[serde(default)]
    pub offer_category_translations: Vec<OfferCategoryTranslation>,
}

/// Envelope of the per-category offer listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperiencesByCategoryResponse {
    #[serde(default)]
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub opening_hours: Vec<OpeningHour>,
    #[serde(default)]
    pub offer_translations: Vec<OfferTranslation>,
    #[serde(default)]
    pub offer_categories: Vec<OfferCategory>,
    #[serde(default)]
    pub offer_category_translations: Vec<OfferCategoryTranslation>,
}

/// The backend is inconsistent about date shapes: plain dates, naive
/// datetimes and zoned datetimes all occur. Accept all three and keep the
/// calendar date, which is the only part the schedule rows carry meaning in.
fn lenient_date<'de, D>(de: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_wire_date(s.trim())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date: {s}"))),
    }
}

fn parse_wire_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn category_wire_names_round_trip() {
        let raw = r#"{
            "offerCategoryID": 7,
            "offerCategoryName": "Wellness",
            "offerCategoryCODE": "WELL",
            "offerID": 0,
            "offerCategoryCommercialName": "Wellness & Spa",
            "offerCategoryImageUrl": "https://img.example/well.jpg",
            "hasCategoryChild": true
        }"#;
        let cat: OfferCategory = serde_json::from_str(raw).unwrap();
        assert_eq!(cat.offer_category_id, 7);
        assert_eq!(cat.offer_category_code, "WELL");
        assert!(cat.has_category_child);

        let back = serde_json::to_value(&cat).unwrap();
        assert_eq!(back["offerCategoryID"], 7);
        assert_eq!(back["offerCategoryCODE"], "WELL");
        assert_eq!(back["hasCategoryChild"], true);
    }

    #[test]
    fn listing_envelope_tolerates_missing_arrays() {
        let resp: ExperiencesByCategoryResponse = serde_json::from_str(r#"{"offers": []}"#).unwrap();
        assert!(resp.offers.is_empty());
        assert!(resp.opening_hours.is_empty());
        assert!(resp.offer_translations.is_empty());
    }

    #[test]
    fn opening_hour_dates_accept_all_backend_shapes() {
        let expect = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        for raw in [
            r#"{"offerID": 1, "date": "2024-03-01"}"#,
            r#"{"offerID": 1, "date": "2024-03-01T00:00:00"}"#,
            r#"{"offerID": 1, "date": "2024-03-01T10:30:00.000Z"}"#,
        ] {
            let row: OpeningHour = serde_json::from_str(raw).unwrap();
            assert_eq!(row.date, Some(expect), "shape: {raw}");
        }

        let dateless: OpeningHour = serde_json::from_str(r#"{"offerID": 1}"#).unwrap();
        assert_eq!(dateless.date, None);
        let blank: OpeningHour = serde_json::from_str(r#"{"offerID": 1, "date": ""}"#).unwrap();
        assert_eq!(blank.date, None);

        let bad = serde_json::from_str::<OpeningHour>(r#"{"offerID": 1, "date": "01.03.2024"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn url_joins_without_doubled_slashes() {
        let client = ExperienceClient::new(ClientConfig {
            base_url: "https://api.example.com/".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/experience/HTL1"),
            "https://api.example.com/experience/HTL1"
        );
    }

    #[test]
    fn window_bounds_serialize_as_utc_seconds() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 10, 2, 0, 0).unwrap();
        assert_eq!(ts.to_rfc3339_opts(SecondsFormat::Secs, true), "2024-01-10T02:00:00Z");
    }
}
