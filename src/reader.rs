//! Extracts terminator-delimited records from a continuous byte stream.

use std::{
    io::{self, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::profile::InstrumentProfile;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("undecodable byte 0x{byte:02x} at offset {offset} of a {len} byte record")]
    Decode { byte: u8, offset: usize, len: usize },

    #[error("link closed")]
    LinkClosed,

    #[error("interrupted while waiting for data")]
    Interrupted,

    #[error("io error: {0}")]
    IoError(io::Error),
}

impl Error {
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode { .. })
    }
}

/// One record as read off the wire, terminator excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    profile: InstrumentProfile,
    text: String,
}

impl RawRecord {
    pub fn new(profile: InstrumentProfile, text: impl Into<String>) -> Self {
        Self {
            profile,
            text: text.into(),
        }
    }

    pub fn profile(&self) -> InstrumentProfile {
        self.profile
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

pub struct FrameReader<R> {
    source: R,
    profile: InstrumentProfile,
    stop: Option<Arc<AtomicBool>>,
}

impl<R: Read> FrameReader<R> {
    pub fn new(source: R, profile: InstrumentProfile) -> Self {
        Self {
            source,
            profile,
            stop: None,
        }
    }

    /// Gives up waiting for bytes with [`Error::Interrupted`] once `stop` is raised.
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn stopped(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::Relaxed))
    }

    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        loop {
            match self.source.read(&mut byte) {
                Ok(0) => return Err(Error::LinkClosed),
                Ok(_) => return Ok(byte[0]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    if self.stopped() {
                        return Err(Error::Interrupted);
                    }
                }
                Err(e) => return Err(Error::IoError(e)),
            }
        }
    }

    /// Blocks until a whole record has been framed.
    ///
    /// A terminator arriving as the very first byte is left over from an
    /// earlier partial read and is skipped. Records that are not ASCII are
    /// consumed up to their terminator and reported as [`Error::Decode`], so
    /// the next call starts cleanly on the following record.
    pub fn read_record(&mut self) -> Result<RawRecord, Error> {
        let terminator = self.profile.terminator();
        let mut bytes = Vec::new();

        let mut byte = self.read_byte()?;
        if byte == terminator {
            byte = self.read_byte()?;
        }
        while byte != terminator {
            bytes.push(byte);
            byte = self.read_byte()?;
        }

        if let Some(offset) = bytes.iter().position(|b| !b.is_ascii()) {
            return Err(Error::Decode {
                byte: bytes[offset],
                offset,
                len: bytes.len(),
            });
        }
        let text: String = bytes.into_iter().map(char::from).collect();
        Ok(RawRecord::new(self.profile, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8], profile: InstrumentProfile) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(bytes.to_vec()), profile)
    }

    #[test]
    fn frames_on_profile_terminator() {
        let mut r = reader(b"a,b\nc,d\n", InstrumentProfile::Csat3b);
        assert_eq!(r.read_record().unwrap().as_str(), "a,b");
        assert_eq!(r.read_record().unwrap().as_str(), "c,d");
        assert!(matches!(r.read_record(), Err(Error::LinkClosed)));
    }

    #[test]
    fn windmaster_frames_on_carriage_return() {
        let mut r = reader(b"Q,1,2\rQ,3,4\r", InstrumentProfile::Windmaster);
        assert_eq!(r.read_record().unwrap().as_str(), "Q,1,2");
        assert_eq!(r.read_record().unwrap().as_str(), "Q,3,4");
    }

    #[test]
    fn leading_terminator_is_skipped() {
        let mut r = reader(b"\nhello\n", InstrumentProfile::Serial);
        let record = r.read_record().unwrap();
        assert_eq!(record.as_str(), "hello");
        assert_eq!(record.profile(), InstrumentProfile::Serial);
    }

    #[test]
    fn only_one_leading_terminator_is_skipped() {
        let mut r = reader(b"\n\nhello\n", InstrumentProfile::Serial);
        assert_eq!(r.read_record().unwrap().as_str(), "");
        assert_eq!(r.read_record().unwrap().as_str(), "hello");
    }

    #[test]
    fn malformed_record_is_discarded_whole() {
        let mut r = reader(b"ok\nb\xffad\nnext\n", InstrumentProfile::Serial);
        assert_eq!(r.read_record().unwrap().as_str(), "ok");
        let err = r.read_record().unwrap_err();
        assert!(err.is_decode());
        assert!(matches!(err, Error::Decode { byte: 0xff, offset: 1, len: 4 }));
        assert_eq!(r.read_record().unwrap().as_str(), "next");
    }

    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::TimedOut.into())
        }
    }

    #[test]
    fn raised_stop_flag_ends_a_stalled_read() {
        let stop = Arc::new(AtomicBool::new(true));
        let mut r = FrameReader::new(Stalled, InstrumentProfile::Serial).with_stop(stop);
        assert!(matches!(r.read_record(), Err(Error::Interrupted)));
    }

    struct Flaky {
        data: Cursor<Vec<u8>>,
        timeouts: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.timeouts > 0 {
                self.timeouts -= 1;
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.timeouts = 1;
            self.data.read(buf)
        }
    }

    #[test]
    fn empty_reads_are_retried() {
        let source = Flaky {
            data: Cursor::new(b"x\n".to_vec()),
            timeouts: 3,
        };
        let mut r = FrameReader::new(source, InstrumentProfile::Serial)
            .with_stop(Arc::new(AtomicBool::new(false)));
        assert_eq!(r.read_record().unwrap().as_str(), "x");
    }
}
