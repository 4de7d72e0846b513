use chrono::{DateTime, Datelike, Duration, Local, SecondsFormat, TimeZone, Utc};

use crate::config::RangeParams;
use crate::error::{AppError, Result};
use quitpath_core::TimeRange;

pub fn resolve_range(params: &RangeParams) -> Result<TimeRange> {
    if let (Some(start), Some(end)) = (params.start.clone(), params.end.clone()) {
        let start = normalize_rfc3339_to_utc(&start)?;
        let end = normalize_rfc3339_to_utc(&end)?;
        return Ok(TimeRange { start, end });
    }
    if let Some(start) = params.start.clone() {
        let start = normalize_rfc3339_to_utc(&start)?;
        let end = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        return Ok(TimeRange { start, end });
    }
    let now_local = Local::now();
    let (start_local, end_local) = match params.range.as_deref().unwrap_or("last24hours") {
        "today" => {
            let start = Local
                .with_ymd_and_hms(
                    now_local.year(),
                    now_local.month(),
                    now_local.day(),
                    0,
                    0,
                    0,
                )
                .single()
                .ok_or_else(|| AppError::InvalidInput("invalid local date".to_string()))?;
            (start, now_local)
        }
        "last24hours" => {
            let start = now_local - Duration::hours(24);
            (start, now_local)
        }
        "last7days" => {
            let start = now_local - Duration::days(7);
            (start, now_local)
        }
        "alltime" => {
            let start = Local
                .with_ymd_and_hms(1970, 1, 1, 0, 0, 0)
                .single()
                .ok_or_else(|| AppError::InvalidInput("invalid local date".to_string()))?;
            (start, now_local)
        }
        value => {
            return Err(AppError::InvalidInput(format!(
                "unsupported range {}",
                value
            )));
        }
    };
    let start = start_local
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let end = end_local
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok(TimeRange { start, end })
}

pub fn normalize_rfc3339_to_utc(value: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(value)
        .map_err(|err| AppError::InvalidInput(format!("invalid datetime: {}", err)))?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_bounds_win_over_named_range() {
        let range = resolve_range(&RangeParams {
            range: Some("last7days".to_string()),
            start: Some("2025-06-01T00:00:00Z".to_string()),
            end: Some("2025-06-02T00:00:00Z".to_string()),
        })
        .expect("range");
        assert_eq!(range.start, "2025-06-01T00:00:00.000Z");
        assert_eq!(range.end, "2025-06-02T00:00:00.000Z");
    }

    #[test]
    fn offsets_normalize_to_utc() {
        let normalized = normalize_rfc3339_to_utc("2025-06-01T02:00:00+02:00").expect("normalize");
        assert_eq!(normalized, "2025-06-01T00:00:00.000Z");
    }

    #[test]
    fn unknown_range_is_rejected() {
        let err = resolve_range(&RangeParams {
            range: Some("fortnight".to_string()),
            start: None,
            end: None,
        })
        .expect_err("should reject");
        assert!(err.to_string().contains("unsupported range"));
    }
}
