//! Column headers written as the first line of every log file.

use std::io::Read;

use crate::{
    profile::{HeaderSource, InstrumentProfile, RecordFormat, TIMING_COLUMNS},
    reader::{self, FrameReader},
};

/// Logarithmically spaced concentration bins, as (lower, upper) edges.
#[derive(Debug, Clone, PartialEq)]
pub struct BinTable {
    bins: Vec<(f64, f64)>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl BinTable {
    /// Edges are rounded to two decimals before they are formatted.
    pub fn new(bin_count: usize, log_min: f64, log_max: f64) -> Self {
        let delta = (log_max - log_min) / bin_count as f64;
        let edge = |i: usize| round2(10f64.powf(log_min + i as f64 * delta));
        let bins = (0..bin_count).map(|i| (edge(i), edge(i + 1))).collect();
        Self { bins }
    }

    pub fn bins(&self) -> &[(f64, f64)] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// `lower_upper` tokens joined by commas, e.g. `57.41_89.01,89.01_138.0`.
    pub fn header(&self) -> String {
        self.bins
            .iter()
            .map(|(lower, upper)| format!("{lower:?}_{upper:?}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn header_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split('\r').next().unwrap_or_default().split('\t')
}

/// Column names reported by the instrument over its first two records.
///
/// The nth tab-separated tokens of both records are joined with `_`.
pub fn probe_header<R: Read>(reader: &mut FrameReader<R>) -> Result<String, reader::Error> {
    let first = reader.read_record()?;
    let second = reader.read_record()?;
    let joined: Vec<String> = header_tokens(first.as_str())
        .zip(header_tokens(second.as_str()))
        .map(|(a, b)| format!("{a}_{b}"))
        .collect();
    Ok(joined.join(","))
}

/// Full header line for `profile`, newline included.
///
/// `probed` is the column list obtained with [`probe_header`]; it is only
/// consulted for profiles whose header comes from the instrument. Returns
/// `None` when the profile writes no header at all.
pub fn build_header(profile: InstrumentProfile, probed: Option<&str>) -> Option<String> {
    let traits = profile.traits();
    let columns = match traits.header {
        HeaderSource::None => return None,
        HeaderSource::Static(columns) => columns.to_string(),
        HeaderSource::BinTable {
            columns,
            bin_count,
            log_min,
            log_max,
        } => format!("{columns}{}", BinTable::new(bin_count, log_min, log_max).header()),
        HeaderSource::Probed => probed.unwrap_or_default().to_string(),
    };
    let timing = match traits.format {
        RecordFormat::Passthrough => "",
        RecordFormat::IndexPrefixed | RecordFormat::TabSeparated => TIMING_COLUMNS,
    };
    Some(format!("{timing}{columns}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pops_table() -> BinTable {
        BinTable::new(16, 1.759, 4.806)
    }

    #[test]
    fn pops_bins_are_ascending_and_contiguous() {
        let table = pops_table();
        assert_eq!(table.len(), 16);
        for (lower, upper) in table.bins() {
            assert!(lower < upper);
        }
        for pair in table.bins().windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn pops_bin_edges_are_stable() {
        let header = pops_table().header();
        assert!(header.starts_with("57.41_89.01,89.01_138.0,138.0_213.95,"));
        assert!(header.ends_with(",41263.16_63973.48"));
        assert_eq!(header.split(',').count(), 16);
        assert_eq!(header, pops_table().header());
    }

    #[test]
    fn other_bin_parameters() {
        let table = BinTable::new(4, 0.0, 2.0);
        assert_eq!(table.header(), "1.0_3.16,3.16_10.0,10.0_31.62,31.62_100.0");
        assert!(BinTable::new(0, 1.0, 2.0).is_empty());
    }

    #[test]
    fn pops_header_has_bins_but_no_timing_columns() {
        let header = build_header(InstrumentProfile::Pops, None).unwrap();
        assert!(header.starts_with(
            "Name, Serial, DateTime(YYYYMMDD),Time(S Unix-epoch),Particle_con(cc),"
        ));
        assert!(header.contains("Voltage(V),57.41_89.01,"));
        assert!(header.ends_with("63973.48\n"));
    }

    #[test]
    fn anemometer_headers_start_with_timing_columns() {
        let header = build_header(InstrumentProfile::Windmaster, None).unwrap();
        assert_eq!(
            header,
            "Index,Day_CPU(YYYY-MM-DD),time_CPU(HH:MM:SS.FFF),Start_codon,u(m/s),v(m/s),w(m/s),\
             unit_ident,SOS(m/s),T(Celsius),Error_code,Check_sum\n"
        );
        let header = build_header(InstrumentProfile::Csat3b, None).unwrap();
        assert!(header.starts_with(TIMING_COLUMNS));
        assert!(header.ends_with("sig_hex\n"));
    }

    #[test]
    fn serial_profile_has_no_header() {
        assert_eq!(build_header(InstrumentProfile::Serial, Some("ignored")), None);
    }

    #[test]
    fn sizer_header_is_probed_from_two_records() {
        let stream = b"Time\tBin\tFlow\r\n(s)\t(#)\t(ccm)\r\n".to_vec();
        let mut reader = FrameReader::new(Cursor::new(stream), InstrumentProfile::Uhsas);
        let probed = probe_header(&mut reader).unwrap();
        assert_eq!(probed, "Time_(s),Bin_(#),Flow_(ccm)");

        let header = build_header(InstrumentProfile::Uhsas, Some(&probed)).unwrap();
        assert_eq!(header, format!("{TIMING_COLUMNS}Time_(s),Bin_(#),Flow_(ccm)\n"));
    }

    #[test]
    fn probe_fails_on_short_stream() {
        let stream = Cursor::new(b"only\n".to_vec());
        let mut reader = FrameReader::new(stream, InstrumentProfile::Uhsas);
        assert!(matches!(probe_header(&mut reader), Err(reader::Error::LinkClosed)));
    }
}
