use bytes::{BufMut, BytesMut};
use dutylink_motor::Duty;

use crate::error::DecodeError;

/// Largest frame read in one go, in bytes.
pub const MAX_FRAME_SIZE: usize = 127;

/// Discriminator for a duty query.
pub const GET: &str = "0";

/// Discriminator for a duty change.
pub const SET: &str = "1";

/// An operator's request to move to a new duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeRequest {
    pub target: Duty,
    /// Requested fade time; the controller may lengthen it.
    pub duration_ms: u32,
}

/// A decoded request frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Report the current duty.
    Get,
    /// Fade to a new duty. Not answered.
    Set(FadeRequest),
}

impl Command {
    pub fn set(target: Duty, duration_ms: u32) -> Self {
        Command::Set(FadeRequest {
            target,
            duration_ms,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Get => "get",
            Command::Set(_) => "set",
        }
    }
}

/// Decode a request frame.
///
/// Wire format, whitespace separated ASCII:
/// ```text
/// 0                      get
/// 1 <duty> <fade_ms>     set, duty in -100..=100, fade_ms >= 0
/// ```
/// Tokens after a get are ignored; a set takes exactly two arguments.
pub fn decode_command(frame: &[u8]) -> Result<Command, DecodeError> {
    let text = ascii(frame)?;
    let mut tokens = text.split_ascii_whitespace();
    let discriminator = tokens.next().ok_or(DecodeError::Empty)?;

    match discriminator {
        GET => Ok(Command::Get),
        SET => {
            let duty = tokens.next().ok_or(DecodeError::MissingArgument("duty"))?;
            let fade = tokens
                .next()
                .ok_or(DecodeError::MissingArgument("fade_ms"))?;
            if let Some(extra) = tokens.next() {
                return Err(DecodeError::TrailingToken(extra.to_string()));
            }
            Ok(Command::set(parse_duty(duty)?, parse_fade(fade)?))
        }
        other => Err(DecodeError::UnknownCommand(other.to_string())),
    }
}

/// Encode a request frame, newline terminated.
pub fn encode_command(command: &Command, dst: &mut BytesMut) {
    let line = match command {
        Command::Get => format!("{GET}\n"),
        Command::Set(request) => format!("{SET} {} {}\n", request.target, request.duration_ms),
    };
    dst.put_slice(line.as_bytes());
}

/// Encode a get response: the duty in decimal, no delimiter.
pub fn encode_duty(duty: Duty, dst: &mut BytesMut) {
    dst.put_slice(duty.to_string().as_bytes());
}

/// Decode a get response.
pub fn decode_duty(frame: &[u8]) -> Result<Duty, DecodeError> {
    let text = ascii(frame)?.trim_ascii();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    parse_duty(text)
}

fn ascii(frame: &[u8]) -> Result<&str, DecodeError> {
    if !frame.is_ascii() {
        return Err(DecodeError::NotText);
    }
    std::str::from_utf8(frame).map_err(|_| DecodeError::NotText)
}

fn parse_int(field: &'static str, token: &str) -> Result<i64, DecodeError> {
    token.parse().map_err(|_| DecodeError::InvalidInteger {
        field,
        token: token.to_string(),
    })
}

fn parse_duty(token: &str) -> Result<Duty, DecodeError> {
    let value = parse_int("duty", token)?;
    Duty::new(value).map_err(|_| DecodeError::DutyOutOfRange(value))
}

fn parse_fade(token: &str) -> Result<u32, DecodeError> {
    let value = parse_int("fade_ms", token)?;
    if value < 0 {
        return Err(DecodeError::NegativeFade(value));
    }
    u32::try_from(value).map_err(|_| DecodeError::FadeTooLong(value))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes taken by one read, and the largest frame written.
    /// Default: 127.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duty(p: i64) -> Duty {
        Duty::new(p).unwrap()
    }

    #[test]
    fn decode_get() {
        assert_eq!(decode_command(b"0").unwrap(), Command::Get);
        assert_eq!(decode_command(b"0\n").unwrap(), Command::Get);
        assert_eq!(decode_command(b"  0  ignored").unwrap(), Command::Get);
    }

    #[test]
    fn decode_set() {
        assert_eq!(
            decode_command(b"1 -40 1000").unwrap(),
            Command::set(duty(-40), 1000)
        );
        assert_eq!(
            decode_command(b"1\t+100\t0\r\n").unwrap(),
            Command::set(duty(100), 0)
        );
    }

    #[test]
    fn decode_rejects_empty() {
        assert_eq!(decode_command(b""), Err(DecodeError::Empty));
        assert_eq!(decode_command(b" \n "), Err(DecodeError::Empty));
    }

    #[test]
    fn decode_rejects_unknown_discriminator() {
        assert!(matches!(
            decode_command(b"2 10 10"),
            Err(DecodeError::UnknownCommand(cmd)) if cmd == "2"
        ));
        assert!(matches!(
            decode_command(b"00"),
            Err(DecodeError::UnknownCommand(_))
        ));
        assert!(matches!(
            decode_command(b"get"),
            Err(DecodeError::UnknownCommand(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_set_arguments() {
        assert_eq!(
            decode_command(b"1"),
            Err(DecodeError::MissingArgument("duty"))
        );
        assert_eq!(
            decode_command(b"1 50"),
            Err(DecodeError::MissingArgument("fade_ms"))
        );
    }

    #[test]
    fn decode_rejects_extra_set_arguments() {
        assert!(matches!(
            decode_command(b"1 50 0 9"),
            Err(DecodeError::TrailingToken(t)) if t == "9"
        ));
    }

    #[test]
    fn decode_rejects_non_numeric() {
        assert!(matches!(
            decode_command(b"1 fast 0"),
            Err(DecodeError::InvalidInteger { field: "duty", .. })
        ));
        assert!(matches!(
            decode_command(b"1 10 1.5"),
            Err(DecodeError::InvalidInteger { field: "fade_ms", .. })
        ));
    }

    #[test]
    fn decode_rejects_out_of_range_duty() {
        assert_eq!(
            decode_command(b"1 101 0"),
            Err(DecodeError::DutyOutOfRange(101))
        );
        assert_eq!(
            decode_command(b"1 -101 0"),
            Err(DecodeError::DutyOutOfRange(-101))
        );
    }

    #[test]
    fn decode_rejects_bad_fade() {
        assert_eq!(
            decode_command(b"1 10 -5"),
            Err(DecodeError::NegativeFade(-5))
        );
        assert_eq!(
            decode_command(b"1 10 4294967296"),
            Err(DecodeError::FadeTooLong(4_294_967_296))
        );
    }

    #[test]
    fn decode_rejects_binary() {
        assert_eq!(decode_command(&[0x31, 0x20, 0xff]), Err(DecodeError::NotText));
    }

    #[test]
    fn encode_commands() {
        let mut buf = BytesMut::new();
        encode_command(&Command::Get, &mut buf);
        encode_command(&Command::set(duty(-7), 250), &mut buf);
        assert_eq!(buf.as_ref(), b"0\n1 -7 250\n");
    }

    #[test]
    fn encode_duty_has_no_delimiter() {
        let mut buf = BytesMut::new();
        encode_duty(duty(-25), &mut buf);
        assert_eq!(buf.as_ref(), b"-25");
    }

    #[test]
    fn decode_duty_responses() {
        assert_eq!(decode_duty(b"-25").unwrap(), duty(-25));
        assert_eq!(decode_duty(b"100\n").unwrap(), duty(100));
        assert_eq!(decode_duty(b""), Err(DecodeError::Empty));
        assert_eq!(decode_duty(b"250"), Err(DecodeError::DutyOutOfRange(250)));
    }

    #[test]
    fn encoded_set_is_accepted_by_decoder() {
        let mut buf = BytesMut::new();
        let command = Command::set(duty(33), 1500);
        encode_command(&command, &mut buf);
        assert_eq!(decode_command(&buf).unwrap(), command);
    }
}
