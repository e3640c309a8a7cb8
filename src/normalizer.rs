use chrono::{DateTime, Local};

use crate::{profile::RecordFormat, reader::RawRecord};

/// Wall-clock instant taken right after a record was framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimestamp(DateTime<Local>);

impl CaptureTimestamp {
    pub fn new(at: DateTime<Local>) -> Self {
        Self(at)
    }

    pub fn instant(&self) -> DateTime<Local> {
        self.0
    }

    pub fn date(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    pub fn time_of_day(&self) -> String {
        self.0.format("%H:%M:%S%.3f").to_string()
    }
}

/// Turns a record into one newline-terminated line of the log file.
pub fn normalize(record: &RawRecord, index: u64, captured: &CaptureTimestamp) -> String {
    let raw = record.as_str();
    let fields = match record.profile().traits().format {
        RecordFormat::Passthrough => return format!("{raw}\n"),
        RecordFormat::IndexPrefixed => raw.to_string(),
        RecordFormat::TabSeparated => {
            let line = raw.split('\r').next().unwrap_or_default();
            line.split('\t').collect::<Vec<_>>().join(",")
        }
    };
    format!(
        "{:05}, {}, {},{}\n",
        index,
        captured.date(),
        captured.time_of_day(),
        fields
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::InstrumentProfile;
    use chrono::TimeZone;

    fn captured() -> CaptureTimestamp {
        let at = Local.with_ymd_and_hms(2022, 11, 11, 16, 0, 5).unwrap()
            + chrono::Duration::milliseconds(42);
        CaptureTimestamp::new(at)
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = captured();
        assert_eq!(ts.date(), "2022-11-11");
        assert_eq!(ts.time_of_day(), "16:00:05.042");
    }

    #[test]
    fn passthrough_profiles_are_verbatim() {
        for profile in [InstrumentProfile::Serial, InstrumentProfile::Pops] {
            let raw = "POPS,123,20221111,1668182400,\tx y";
            let record = RawRecord::new(profile, raw);
            assert_eq!(normalize(&record, 7, &captured()), format!("{raw}\n"));
        }
    }

    #[test]
    fn anemometer_records_get_index_date_and_time() {
        let record = RawRecord::new(InstrumentProfile::Csat3b, "0.1,-0.2,0.03,21.5,0,12,ab");
        assert_eq!(
            normalize(&record, 3, &captured()),
            "00003, 2022-11-11, 16:00:05.042,0.1,-0.2,0.03,21.5,0,12,ab\n"
        );
    }

    #[test]
    fn index_keeps_growing_past_five_digits() {
        let record = RawRecord::new(InstrumentProfile::Windmaster, "Q");
        assert!(normalize(&record, 123_456, &captured()).starts_with("123456, "));
    }

    #[test]
    fn sizer_tabs_become_commas() {
        let record = RawRecord::new(InstrumentProfile::Uhsas, "1.5\t2\t\t4\r");
        let line = normalize(&record, 0, &captured());
        assert!(!line.contains('\t'));
        assert!(!line.contains('\r'));
        let fields: Vec<_> = line.trim_end().split(',').collect();
        assert_eq!(fields.len(), 3 + 4);
        assert_eq!(&fields[..3], ["00000", " 2022-11-11", " 16:00:05.042"]);
        assert_eq!(&fields[3..], ["1.5", "2", "", "4"]);
    }
}
