use std::collections::BTreeMap;

use serde::Serialize;

use voxledger_core::{format_hms, AccountingRecord, SubjectId};

/// Answer to "how long was this subject in voice on `day`, and overall".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceTimeReport {
    pub subject_id: SubjectId,
    pub display_name: String,
    pub day: String,
    pub daily_seconds: u64,
    pub total_seconds: u64,
    pub daily_breakdown: BTreeMap<String, u64>,
    pub active: bool,
    /// `daily_seconds` as `HH:MM:SS`.
    pub voice_time: String,
    /// `total_seconds` as `HH:MM:SS`.
    pub total_time: String,
}

impl VoiceTimeReport {
    pub fn from_record(record: &AccountingRecord, day: &str) -> Self {
        let daily_seconds = record.seconds_on(day);
        Self {
            subject_id: record.subject_id.clone(),
            display_name: record.display_name.clone(),
            day: day.to_string(),
            daily_seconds,
            total_seconds: record.total_seconds,
            daily_breakdown: record.daily_seconds.clone(),
            active: record.is_active(),
            voice_time: format_hms(daily_seconds),
            total_time: format_hms(record.total_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxledger_core::Presentation;

    #[test]
    fn test_report_for_day() {
        let mut rec = AccountingRecord::new("5".into(), &Presentation::named("ada"));
        rec.daily_seconds.insert("2026-10-18".into(), 3_600);
        rec.daily_seconds.insert("2026-10-19".into(), 95);
        rec.total_seconds = 3_695;

        let report = VoiceTimeReport::from_record(&rec, "2026-10-19");
        assert_eq!(report.daily_seconds, 95);
        assert_eq!(report.voice_time, "00:01:35");
        assert_eq!(report.total_time, "01:01:35");
        assert_eq!(report.daily_breakdown.len(), 2);

        let empty_day = VoiceTimeReport::from_record(&rec, "2026-01-01");
        assert_eq!(empty_day.daily_seconds, 0);
        assert_eq!(empty_day.total_seconds, 3_695);
    }
}
