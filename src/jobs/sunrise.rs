use crate::apis::{SunriseResults, SunriseSource};
use crate::config::ConflictPolicy;
use crate::constants::{ENDSONG_TABLE, SUNRISE_TABLE};
use crate::db::{ColumnDef, Database, InsertMode, TableSpec};
use crate::error::{EtlError, Result};
use crate::jobs::{Job, JobReport};
use crate::transform::convert_timestamp;
use crate::types::Scalar;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

pub const SUNRISE: TableSpec = TableSpec {
    name: SUNRISE_TABLE,
    columns: &[
        ColumnDef::text("date").key(),
        ColumnDef::text("sunrise"),
        ColumnDef::text("sunset"),
        ColumnDef::text("solar_noon"),
        ColumnDef::integer("day_length"),
        ColumnDef::text("civil_twilight_begin"),
        ColumnDef::text("civil_twilight_end"),
        ColumnDef::text("nautical_twilight_begin"),
        ColumnDef::text("nautical_twilight_end"),
        ColumnDef::text("astronomical_twilight_begin"),
        ColumnDef::text("astronomical_twilight_end"),
    ],
};

/// One `sunrise` row with every timestamp already in the local zone.
#[derive(Debug, Clone, PartialEq)]
pub struct SunriseRecord {
    pub date: NaiveDate,
    pub sunrise: String,
    pub sunset: String,
    pub solar_noon: String,
    pub day_length: i64,
    pub civil_twilight_begin: String,
    pub civil_twilight_end: String,
    pub nautical_twilight_begin: String,
    pub nautical_twilight_end: String,
    pub astronomical_twilight_begin: String,
    pub astronomical_twilight_end: String,
}

impl SunriseRecord {
    pub fn from_results(date: NaiveDate, results: &SunriseResults, zone: Tz) -> Result<Self> {
        let local = |value: &str| convert_timestamp(value, zone);
        Ok(Self {
            date,
            sunrise: local(&results.sunrise)?,
            sunset: local(&results.sunset)?,
            solar_noon: local(&results.solar_noon)?,
            day_length: results.day_length,
            civil_twilight_begin: local(&results.civil_twilight_begin)?,
            civil_twilight_end: local(&results.civil_twilight_end)?,
            nautical_twilight_begin: local(&results.nautical_twilight_begin)?,
            nautical_twilight_end: local(&results.nautical_twilight_end)?,
            astronomical_twilight_begin: local(&results.astronomical_twilight_begin)?,
            astronomical_twilight_end: local(&results.astronomical_twilight_end)?,
        })
    }

    pub fn into_row(self) -> Vec<Scalar> {
        vec![
            self.date.format("%Y-%m-%d").to_string().into(),
            self.sunrise.into(),
            self.sunset.into(),
            self.solar_noon.into(),
            self.day_length.into(),
            self.civil_twilight_begin.into(),
            self.civil_twilight_end.into(),
            self.nautical_twilight_begin.into(),
            self.nautical_twilight_end.into(),
            self.astronomical_twilight_begin.into(),
            self.astronomical_twilight_end.into(),
        ]
    }
}

/// Distinct UTC calendar dates of `endsong.ts`, ascending.
pub fn distinct_dates(db: &Database) -> Result<Vec<NaiveDate>> {
    let batch = db.query_batch(&format!(
        "SELECT DISTINCT date(ts) AS day FROM {ENDSONG_TABLE} WHERE date(ts) IS NOT NULL ORDER BY day"
    ))?;
    batch
        .column("day")?
        .into_iter()
        .filter_map(Scalar::as_str)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| EtlError::Timestamp {
                value: s.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn stored_dates(db: &Database) -> Result<HashSet<String>> {
    let batch = db.query_batch(&format!("SELECT date FROM {SUNRISE_TABLE}"))?;
    Ok(batch
        .column("date")?
        .into_iter()
        .filter_map(Scalar::as_str)
        .map(str::to_string)
        .collect())
}

/// Fetch sun times for every listening date and store one row per date.
///
/// Each row is committed as soon as it is inserted, so an aborted run keeps
/// the dates it already finished.
#[instrument(skip(db, source, zone))]
pub async fn run(
    db: &Database,
    source: &dyn SunriseSource,
    zone: Tz,
    policy: ConflictPolicy,
) -> Result<JobReport> {
    let mut report = JobReport::new(Job::Sunrise, SUNRISE_TABLE);

    db.create_table_if_missing(&SUNRISE)?;
    let dates = distinct_dates(db)?;
    report.rows_read = dates.len();

    let existing = match policy {
        ConflictPolicy::Skip => stored_dates(db)?,
        ConflictPolicy::Fail | ConflictPolicy::Replace => HashSet::new(),
    };
    let mode = match policy {
        ConflictPolicy::Replace => InsertMode::Replace,
        ConflictPolicy::Skip | ConflictPolicy::Fail => InsertMode::Insert,
    };
    info!(
        "{} dates in {}, {} already stored",
        dates.len(),
        ENDSONG_TABLE,
        existing.len()
    );

    for (i, date) in dates.iter().enumerate() {
        let remaining = dates.len() - i - 1;
        let key = date.format("%Y-%m-%d").to_string();
        if existing.contains(&key) {
            debug!("Skipping {}, already stored", key);
            report.skipped += 1;
            continue;
        }

        let results = source.get_day(*date).await?;
        report.api_calls += 1;

        let record = SunriseRecord::from_results(*date, &results, zone)?;
        if let Err(e) = db.insert_row(&SUNRISE, mode, &record.into_row()) {
            warn!("Insert for {} failed: {}", key, e);
            return Err(e);
        }
        report.rows_written += 1;
        info!("Inserted sunrise data for {}. {} dates remaining.", key, remaining);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Australia::Melbourne;

    fn results() -> SunriseResults {
        SunriseResults {
            sunrise: "2021-01-14T19:12:33+00:00".into(),
            sunset: "2021-01-15T09:45:02+00:00".into(),
            solar_noon: "2021-01-15T02:28:48+00:00".into(),
            day_length: 52349,
            civil_twilight_begin: "2021-01-14T18:41:32+00:00".into(),
            civil_twilight_end: "2021-01-15T10:16:03+00:00".into(),
            nautical_twilight_begin: "2021-01-14T18:02:09+00:00".into(),
            nautical_twilight_end: "2021-01-15T10:55:26+00:00".into(),
            astronomical_twilight_begin: "2021-01-14T17:18:52+00:00".into(),
            astronomical_twilight_end: "2021-01-15T11:38:43+00:00".into(),
        }
    }

    #[test]
    fn record_converts_every_timestamp() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let record = SunriseRecord::from_results(date, &results(), Melbourne).unwrap();
        assert_eq!(record.sunrise, "2021-01-15 06:12:33+11:00");
        assert_eq!(record.sunset, "2021-01-15 20:45:02+11:00");
        assert_eq!(record.astronomical_twilight_begin, "2021-01-15 04:18:52+11:00");
        assert_eq!(record.day_length, 52349);

        let row = record.into_row();
        assert_eq!(row.len(), SUNRISE.columns.len());
        assert_eq!(row[0], Scalar::from("2021-01-15"));
        assert_eq!(row[4], Scalar::Integer(52349));
    }

    #[test]
    fn bad_timestamp_fails_the_record() {
        let mut bad = results();
        bad.solar_noon = "noon-ish".into();
        let date = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        assert!(SunriseRecord::from_results(date, &bad, Melbourne).is_err());
    }

    #[test]
    fn distinct_dates_skip_nulls_and_sort() {
        let db = Database::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE endsong (ts TEXT);
             INSERT INTO endsong VALUES
                ('2021-01-16T01:00:00Z'), ('2021-01-15T23:00:00Z'),
                ('2021-01-15T10:00:00Z'), (NULL), ('not a date');",
        )
        .unwrap();

        let dates = distinct_dates(&db).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2021, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2021, 1, 16).unwrap(),
            ]
        );
    }
}
