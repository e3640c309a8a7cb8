use std::{fmt::Display, str::FromStr};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown instrument profile: {0}")]
    UnknownProfile(String),
}

/// Instruments the logger knows how to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentProfile {
    Serial,
    Csat3b,
    Windmaster,
    Pops,
    Uhsas,
}

/// How the link's flow control lines are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    /// RTS/CTS only.
    Hardware,
    /// RTS/CTS, XON/XOFF and DTR asserted.
    Full,
}

/// Where the column header of a log file comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderSource {
    None,
    Static(&'static str),
    /// Fixed columns followed by a logarithmic bin table.
    BinTable {
        columns: &'static str,
        bin_count: usize,
        log_min: f64,
        log_max: f64,
    },
    /// Reported by the instrument on two leading records.
    Probed,
}

/// How a raw record becomes a line of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Passthrough,
    /// Already comma separated; index, date and time are prepended.
    IndexPrefixed,
    /// Tab separated fields rejoined with commas, then index-prefixed.
    TabSeparated,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileTraits {
    pub name: &'static str,
    pub baud_rate: u32,
    pub terminator: u8,
    pub flow_control: FlowControl,
    pub header: HeaderSource,
    pub format: RecordFormat,
}

pub const TIMING_COLUMNS: &str = "Index,Day_CPU(YYYY-MM-DD),time_CPU(HH:MM:SS.FFF),";

const SERIAL: ProfileTraits = ProfileTraits {
    name: "serial",
    baud_rate: 9600,
    terminator: b'\n',
    flow_control: FlowControl::Hardware,
    header: HeaderSource::None,
    format: RecordFormat::Passthrough,
};

const CSAT3B: ProfileTraits = ProfileTraits {
    name: "csat3b",
    baud_rate: 115_200,
    terminator: b'\n',
    flow_control: FlowControl::Full,
    header: HeaderSource::Static(
        "u_x(m/s),u_y(m/s),u_z(m/s),T(Celsius),Diagnostic_code,record_counter,sig_hex",
    ),
    format: RecordFormat::IndexPrefixed,
};

// Gill instruments end their records with a bare carriage return.
const WINDMASTER: ProfileTraits = ProfileTraits {
    name: "windmaster",
    baud_rate: 9600,
    terminator: b'\r',
    flow_control: FlowControl::Hardware,
    header: HeaderSource::Static(
        "Start_codon,u(m/s),v(m/s),w(m/s),unit_ident,SOS(m/s),T(Celsius),Error_code,Check_sum",
    ),
    format: RecordFormat::IndexPrefixed,
};

// Bin parameters must match the POPS_BBB.cfg loaded on the instrument.
const POPS: ProfileTraits = ProfileTraits {
    name: "pops",
    baud_rate: 9600,
    terminator: b'\n',
    flow_control: FlowControl::Hardware,
    header: HeaderSource::BinTable {
        columns: "Name, Serial, DateTime(YYYYMMDD),Time(S Unix-epoch),\
                  Particle_con(cc),POPS_flow(sccm),POPS_P(hPa),POPS_T(C),\
                  Data_status, baseline(counts), stdev_baseline, max_stdev,\
                  PumpFB(PID),LaserT(C),LaserFB(PID),Laser_Monitor,Voltage(V),",
        bin_count: 16,
        log_min: 1.759,
        log_max: 4.806,
    },
    format: RecordFormat::Passthrough,
};

const UHSAS: ProfileTraits = ProfileTraits {
    name: "uhsas",
    baud_rate: 115_200,
    terminator: b'\n',
    flow_control: FlowControl::Hardware,
    header: HeaderSource::Probed,
    format: RecordFormat::TabSeparated,
};

impl InstrumentProfile {
    pub const ALL: [InstrumentProfile; 5] = [
        InstrumentProfile::Serial,
        InstrumentProfile::Csat3b,
        InstrumentProfile::Windmaster,
        InstrumentProfile::Pops,
        InstrumentProfile::Uhsas,
    ];

    pub const fn traits(self) -> &'static ProfileTraits {
        match self {
            InstrumentProfile::Serial => &SERIAL,
            InstrumentProfile::Csat3b => &CSAT3B,
            InstrumentProfile::Windmaster => &WINDMASTER,
            InstrumentProfile::Pops => &POPS,
            InstrumentProfile::Uhsas => &UHSAS,
        }
    }

    pub fn name(self) -> &'static str {
        self.traits().name
    }

    pub fn terminator(self) -> u8 {
        self.traits().terminator
    }

    pub fn names() -> [&'static str; 5] {
        Self::ALL.map(InstrumentProfile::name)
    }
}

impl FromStr for InstrumentProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.name() == s)
            .ok_or_else(|| Error::UnknownProfile(s.to_string()))
    }
}

impl Display for InstrumentProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for profile in InstrumentProfile::ALL {
            assert_eq!(profile.name().parse::<InstrumentProfile>().unwrap(), profile);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "sonic".parse::<InstrumentProfile>().unwrap_err();
        assert!(matches!(err, Error::UnknownProfile(name) if name == "sonic"));
    }

    #[test]
    fn only_windmaster_uses_carriage_return() {
        for profile in InstrumentProfile::ALL {
            let expected = if profile == InstrumentProfile::Windmaster { b'\r' } else { b'\n' };
            assert_eq!(profile.terminator(), expected, "{profile}");
        }
    }

    #[test]
    fn fast_links_and_full_flow_control() {
        let fast: Vec<_> = InstrumentProfile::ALL
            .into_iter()
            .filter(|p| p.traits().baud_rate == 115_200)
            .collect();
        assert_eq!(fast, [InstrumentProfile::Csat3b, InstrumentProfile::Uhsas]);

        let full: Vec<_> = InstrumentProfile::ALL
            .into_iter()
            .filter(|p| p.traits().flow_control == FlowControl::Full)
            .collect();
        assert_eq!(full, [InstrumentProfile::Csat3b]);
    }
}
