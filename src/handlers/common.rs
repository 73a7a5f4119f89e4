use crate::{config::AppConfig, errors::ServiceError};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::IntoParams;
use validator::Validate;

/// JSON body that is deserialized strictly and then validated. Malformed
/// bodies, unknown fields and wrong types become `ValidationError`s instead
/// of axum's plain-text rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, IntoParams)]
#[serde(deny_unknown_fields)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Items per page
    pub limit: Option<u64>,
}

impl PageQuery {
    /// Page number and page size, clamped to the configured bounds.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.page_size(self.limit))
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ServiceError> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc).date_naive()))
        .map_err(|_| {
            ServiceError::ValidationError(format!(
                "{} must be a date (YYYY-MM-DD) or an RFC 3339 timestamp",
                field
            ))
        })
}

/// Like [`parse_date`], but keeps the time of day when one is given. Bare
/// dates mean midnight UTC.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, ServiceError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    parse_date(field, value).map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

pub fn parse_optional_timestamp(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ServiceError> {
    value.map(|v| parse_timestamp(field, v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Timelike;
    use rstest::rstest;

    #[rstest]
    #[case("2024-05-01")]
    #[case("2024-05-01T23:15:00Z")]
    #[case(" 2024-05-01T10:00:00+00:00 ")]
    fn dates_accept_both_forms(#[case] raw: &str) {
        assert_eq!(
            parse_date("startDate", raw).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }

    #[test]
    fn bad_dates_are_validation_errors() {
        assert_matches!(
            parse_date("endDate", "01/05/2024"),
            Err(ServiceError::ValidationError(msg)) if msg.starts_with("endDate")
        );
    }

    #[test]
    fn timestamps_keep_time_of_day() {
        let ts = parse_timestamp("dateDistributed", "2024-05-01T09:30:00+02:00").unwrap();
        assert_eq!(ts.hour(), 7);
        let midnight = parse_timestamp("dateDistributed", "2024-05-01").unwrap();
        assert_eq!(midnight.hour(), 0);
        assert_eq!(parse_optional_timestamp("x", None).unwrap(), None);
    }

    #[test]
    fn page_query_is_clamped() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "k3Jd9Qw7Lm2Xp5Rt8Vb1Nc4Hy6Gz0Fs-page-query-test-secret-value".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        );
        let (page, limit) = PageQuery {
            page: Some(0),
            limit: Some(10_000),
        }
        .resolve(&cfg);
        assert_eq!(page, 1);
        assert_eq!(limit, cfg.api_max_page_size);
        assert_eq!(PageQuery::default().resolve(&cfg).1, cfg.api_default_page_size);
    }
}
