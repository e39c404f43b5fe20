//! `SETTINGS` frame and the settings it carries.

use crate::codec::write_buffer::WriteBuffer;
use crate::solicit::frame::flags::Flag;
use crate::solicit::frame::flags::Flags;
use crate::solicit::frame::Frame;
use crate::solicit::frame::FrameHeader;
use crate::solicit::frame::FrameIR;
use crate::solicit::frame::FrameScope;
use crate::solicit::frame::ParseFrameError;
use crate::solicit::frame::ParseFrameResult;
use crate::solicit::frame::RawFrame;
use crate::solicit::stream_id::StreamId;

pub const SETTINGS_FRAME_TYPE: u8 = 0x4;

/// Settings of a SETTINGS frame, section 6.5.1.
///
/// Values are carried as received. Range checks depend on which side sent
/// them and are done by the session.
#[derive(Clone, PartialEq, Debug, Copy)]
pub enum HttpSetting {
    HeaderTableSize(u32),
    /// Any value but `0` and `1` is invalid.
    EnablePush(u32),
    MaxConcurrentStreams(u32),
    InitialWindowSize(u32),
    MaxFrameSize(u32),
    MaxHeaderListSize(u32),
}

impl HttpSetting {
    /// Unknown ids yield `None` and must be ignored by the receiver.
    pub fn from_id(id: u16, val: u32) -> Option<HttpSetting> {
        Some(match id {
            1 => HttpSetting::HeaderTableSize(val),
            2 => HttpSetting::EnablePush(val),
            3 => HttpSetting::MaxConcurrentStreams(val),
            4 => HttpSetting::InitialWindowSize(val),
            5 => HttpSetting::MaxFrameSize(val),
            6 => HttpSetting::MaxHeaderListSize(val),
            _ => return None,
        })
    }

    /// Identifier and value as they go on the wire.
    pub fn to_pair(&self) -> (u16, u32) {
        match *self {
            HttpSetting::HeaderTableSize(val) => (1, val),
            HttpSetting::EnablePush(val) => (2, val),
            HttpSetting::MaxConcurrentStreams(val) => (3, val),
            HttpSetting::InitialWindowSize(val) => (4, val),
            HttpSetting::MaxFrameSize(val) => (5, val),
            HttpSetting::MaxHeaderListSize(val) => (6, val),
        }
    }
}

/// Full set of settings values of one side of a connection.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct HttpSettings {
    pub header_table_size: u32,
    pub enable_push: bool,
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_frame_size: u32,
    pub max_header_list_size: u32,
}

impl HttpSettings {
    pub fn apply(&mut self, setting: HttpSetting) {
        match setting {
            HttpSetting::HeaderTableSize(s) => self.header_table_size = s,
            HttpSetting::EnablePush(e) => self.enable_push = e != 0,
            HttpSetting::MaxConcurrentStreams(m) => self.max_concurrent_streams = m,
            HttpSetting::InitialWindowSize(s) => self.initial_window_size = s,
            HttpSetting::MaxFrameSize(s) => self.max_frame_size = s,
            HttpSetting::MaxHeaderListSize(s) => self.max_header_list_size = s,
        }
    }

    pub fn apply_all(&mut self, settings: &[HttpSetting]) {
        for s in settings {
            self.apply(*s);
        }
    }
}

/// Flags of the `SETTINGS` frame, RFC 7540 section 6.5.
#[derive(Clone, PartialEq, Debug, Copy)]
pub enum SettingsFlag {
    Ack = 0x1,
}

impl Flag for SettingsFlag {
    #[inline]
    fn bitmask(&self) -> u8 {
        *self as u8
    }

    fn flags() -> &'static [Self] {
        static FLAGS: &'static [SettingsFlag] = &[SettingsFlag::Ack];
        FLAGS
    }
}

/// A `SETTINGS` frame, RFC 7540 section 6.5.
///
/// Parsing only checks the framing: an ACK must be empty, other payloads a
/// multiple of 6 octets, and the stream id zero.
#[derive(PartialEq, Debug, Clone)]
pub struct SettingsFrame {
    pub settings: Vec<HttpSetting>,
    flags: Flags<SettingsFlag>,
}

impl SettingsFrame {
    /// Acknowledges the peer's settings; carries none.
    pub fn new_ack() -> SettingsFrame {
        SettingsFrame {
            settings: Vec::new(),
            flags: SettingsFlag::Ack.to_flags(),
        }
    }

    pub fn from_settings(settings: Vec<HttpSetting>) -> SettingsFrame {
        SettingsFrame {
            settings,
            flags: Flags::default(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.flags.is_set(SettingsFlag::Ack)
    }

    fn payload_len(&self) -> u32 {
        6 * self.settings.len() as u32
    }

    fn parse_payload(payload: &[u8]) -> ParseFrameResult<Vec<HttpSetting>> {
        if payload.len() % 6 != 0 {
            return Err(ParseFrameError::IncorrectFrameLength(payload.len() as u32));
        }

        Ok(payload
            .chunks(6)
            .filter_map(|chunk| {
                let id = u16::from_be_bytes([chunk[0], chunk[1]]);
                let val = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
                HttpSetting::from_id(id, val)
            })
            .collect())
    }
}

impl Frame for SettingsFrame {
    type FlagType = SettingsFlag;

    fn from_raw(raw_frame: &RawFrame) -> ParseFrameResult<SettingsFrame> {
        let header = raw_frame.checked_header(SETTINGS_FRAME_TYPE, FrameScope::Connection, None)?;
        let flags: Flags<SettingsFlag> = Flags::new(header.flags);
        if flags.is_set(SettingsFlag::Ack) && header.payload_len != 0 {
            return Err(ParseFrameError::IncorrectFrameLength(header.payload_len));
        }
        let settings = SettingsFrame::parse_payload(&raw_frame.payload())?;
        Ok(SettingsFrame { settings, flags })
    }

    fn flags(&self) -> Flags<SettingsFlag> {
        self.flags
    }

    fn get_stream_id(&self) -> StreamId {
        0
    }

    fn get_header(&self) -> FrameHeader {
        FrameHeader {
            payload_len: self.payload_len(),
            frame_type: SETTINGS_FRAME_TYPE,
            flags: self.flags.0,
            stream_id: 0,
        }
    }
}

impl FrameIR for SettingsFrame {
    fn serialize_into(self, b: &mut WriteBuffer) {
        b.write_header(self.get_header());
        for setting in &self.settings {
            let (id, val) = setting.to_pair();
            b.extend_from_slice(&id.to_be_bytes());
            b.write_u32(val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solicit::tests::common::raw_frame_from_parts;

    #[test]
    fn max_concurrent_streams_wire_format() {
        let frame = SettingsFrame::from_settings(vec![HttpSetting::MaxConcurrentStreams(100)]);
        assert_eq!(
            vec![0, 0, 6, 0x4, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 100],
            frame.serialize_into_vec()
        );
    }

    #[test]
    fn parse_ignores_unknown_setting() {
        let payload = vec![0, 1, 0, 0, 0x10, 0, 0, 0x42, 0, 0, 0, 1];
        let raw = raw_frame_from_parts(FrameHeader::new(12, 0x4, 0, 0), payload);
        let frame = SettingsFrame::from_raw(&raw).unwrap();
        assert_eq!(vec![HttpSetting::HeaderTableSize(4096)], frame.settings);
        assert!(!frame.is_ack());
    }

    #[test]
    fn parse_ack() {
        let raw = raw_frame_from_parts(FrameHeader::new(0, 0x4, 1, 0), vec![]);
        assert!(SettingsFrame::from_raw(&raw).unwrap().is_ack());
        assert_eq!(
            SettingsFrame::new_ack().serialize_into_vec(),
            raw.as_ref().to_vec()
        );
    }

    #[test]
    fn parse_errors() {
        // ACK with a payload
        let raw = raw_frame_from_parts(FrameHeader::new(6, 0x4, 1, 0), vec![0, 3, 0, 0, 0, 1]);
        assert!(SettingsFrame::from_raw(&raw).is_err());
        // not a multiple of 6
        let raw = raw_frame_from_parts(FrameHeader::new(5, 0x4, 0, 0), vec![0, 3, 0, 0, 0]);
        assert!(SettingsFrame::from_raw(&raw).is_err());
        // non-zero stream
        let raw = raw_frame_from_parts(FrameHeader::new(6, 0x4, 0, 1), vec![0, 3, 0, 0, 0, 1]);
        assert_eq!(
            Err(ParseFrameError::StreamIdMustBeZero(1)),
            SettingsFrame::from_raw(&raw)
        );
    }

    #[test]
    fn values_are_not_range_checked() {
        let raw = raw_frame_from_parts(
            FrameHeader::new(12, 0x4, 0, 0),
            vec![0, 5, 0, 0, 0, 1, 0, 2, 0, 0, 0, 7],
        );
        assert_eq!(
            vec![HttpSetting::MaxFrameSize(1), HttpSetting::EnablePush(7)],
            SettingsFrame::from_raw(&raw).unwrap().settings
        );
    }

    #[test]
    fn apply() {
        let mut settings = crate::solicit::DEFAULT_SETTINGS;
        settings.apply_all(&[
            HttpSetting::MaxFrameSize(32768),
            HttpSetting::EnablePush(0),
        ]);
        assert_eq!(32768, settings.max_frame_size);
        assert!(!settings.enable_push);
    }
}
