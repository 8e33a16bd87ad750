use nom::combinator::{cond, map, peek};
use nom::IResult;

use super::crc::{CrcStyle, CrcWidth};
use super::{
    unpack_lr_ids, Control2ch, Extra3ch, FrameOptions, FrameType, HeaderExtension, HeaderFormat,
    Info2ch, Info3ch, InfoLr, HOME_ID_LEN, LENGTH_INDEX,
};
use crate::DecodeError;

/// A received frame, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedFrame<'a> {
    pub format: HeaderFormat,
    pub options: FrameOptions,
    /// Routing header, empty unless the frame is routed.
    pub route: &'a [u8],
    /// Everything after the basic, routing and extended headers.
    pub payload: &'a [u8],
    /// The whole frame without its CRC trailer.
    pub content: &'a [u8],
}

impl<'a> DecodedFrame<'a> {
    /// Offset of the payload inside the frame.
    pub fn payload_offset(&self) -> usize {
        self.content.len() - self.payload.len()
    }
}

/// Fail a parser without consuming anything.
fn reject<O>(input: &[u8]) -> IResult<&[u8], O> {
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

// concrete wrappers, so `?` knows which error type is meant

fn byte(input: &[u8]) -> IResult<&[u8], u8> {
    nom::number::complete::u8(input)
}

fn signed_byte(input: &[u8]) -> IResult<&[u8], i8> {
    nom::number::complete::i8(input)
}

fn take(count: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], &[u8]> {
    move |input: &[u8]| nom::bytes::complete::take(count)(input)
}

fn home_id(input: &[u8]) -> IResult<&[u8], [u8; HOME_ID_LEN]> {
    let mut data = [0; HOME_ID_LEN];
    let (input, _) = nom::multi::fill(byte, &mut data[..])(input)?;
    Ok((input, data))
}

/// A routing header: `fixed` bytes, plus one per repeater counted in
/// the upper nibble of its second byte.
fn route(fixed: usize) -> impl FnMut(&[u8]) -> IResult<&[u8], &[u8]> {
    move |input: &[u8]| {
        let (_, (_, hops)) = peek(nom::sequence::pair(byte, byte))(input)?;
        take(fixed + (hops >> 4) as usize)(input)
    }
}

fn extension(format: HeaderFormat) -> impl FnMut(&[u8]) -> IResult<&[u8], HeaderExtension> {
    move |input: &[u8]| {
        let (rest, info) = byte(input)?;
        let body_len = match format {
            HeaderFormat::LongRange => (info & 0x07) as usize,
            // 3-channel length counts the info byte itself
            _ => match (info & 0x07) as usize {
                0 => return reject(input),
                n => n - 1,
            },
        };
        let (rest, body) = take(body_len)(rest)?;
        match HeaderExtension::new(info, body) {
            Some(ext) => Ok((rest, ext)),
            None => reject(input),
        }
    }
}

fn header_2ch(input: &[u8]) -> IResult<&[u8], (FrameOptions, &[u8])> {
    let (input, home_id) = home_id(input)?;
    let (input, source) = byte(input)?;
    let (input, info) = map(byte, Info2ch::from)(input)?;
    let (input, control) = map(byte, Control2ch::from)(input)?;
    let (input, _length) = byte(input)?;

    let frame_type = match FrameType::from_code(info.header_type()) {
        Some(FrameType::Singlecast) if info.routed() => FrameType::Routed,
        Some(FrameType::Routed) | None => return reject(input),
        Some(t) => t,
    };

    let (input, destination) = cond(frame_type != FrameType::Multicast, byte)(input)?;
    let (input, route) = cond(frame_type == FrameType::Routed, route(2))(input)?;

    let mut options = FrameOptions::new(
        frame_type,
        home_id,
        source as u16,
        destination.unwrap_or(0) as u16,
    );
    options.sequence = control.sequence();
    options.acknowledge = info.ack();
    options.low_power = info.low_power();
    options.speed_modified = info.speed_modified();
    options.multicast_followup = control.multicast_followup();
    options.wakeup_250ms = control.wakeup_250ms();
    options.wakeup_1000ms = control.wakeup_1000ms();

    Ok((input, (options, route.unwrap_or(&[]))))
}

fn header_3ch(input: &[u8]) -> IResult<&[u8], (FrameOptions, &[u8])> {
    let (input, home_id) = home_id(input)?;
    let (input, source) = byte(input)?;
    let (input, info) = map(byte, Info3ch::from)(input)?;
    let (input, extra) = map(byte, Extra3ch::from)(input)?;
    let (input, _length) = byte(input)?;
    let (input, sequence) = byte(input)?;

    let Some(frame_type) = FrameType::from_code(info.header_type()) else {
        return reject(input);
    };

    let (input, destination) = cond(frame_type != FrameType::Multicast, byte)(input)?;
    let (input, route) = cond(frame_type == FrameType::Routed, route(3))(input)?;
    let (input, extension) = cond(extra.extended(), extension(HeaderFormat::ThreeChannel))(input)?;

    let mut options = FrameOptions::new(
        frame_type,
        home_id,
        source as u16,
        destination.unwrap_or(0) as u16,
    );
    options.sequence = sequence;
    options.acknowledge = info.ack();
    options.low_power = info.low_power();
    options.multicast_followup = info.multicast_followup();
    options.wakeup_250ms = extra.wakeup_250ms();
    options.wakeup_1000ms = extra.wakeup_1000ms();
    options.extension = extension;

    Ok((input, (options, route.unwrap_or(&[]))))
}

fn header_lr(input: &[u8]) -> IResult<&[u8], (FrameOptions, &[u8])> {
    let (input, home_id) = home_id(input)?;
    let (input, ids) = take(3)(input)?;
    let (input, _length) = byte(input)?;
    let (input, info) = map(byte, InfoLr::from)(input)?;
    let (input, sequence) = byte(input)?;
    let (input, noise_floor) = signed_byte(input)?;
    let (input, tx_power) = signed_byte(input)?;

    let frame_type = match FrameType::from_code(info.header_type()) {
        Some(t @ (FrameType::Singlecast | FrameType::Ack)) => t,
        _ => return reject(input),
    };

    let (input, receive_rssi) = cond(frame_type == FrameType::Ack, signed_byte)(input)?;
    let (input, extension) = cond(info.extended(), extension(HeaderFormat::LongRange))(input)?;

    let (source, destination) = unpack_lr_ids([ids[0], ids[1], ids[2]]);
    let mut options = FrameOptions::new(frame_type, home_id, source, destination);
    options.sequence = sequence;
    options.acknowledge = info.ack();
    options.noise_floor = noise_floor;
    options.tx_power = tx_power;
    options.receive_rssi = receive_rssi.unwrap_or(0);
    options.extension = extension;

    Ok((input, (options, &[][..])))
}

/// Decode the headers of a frame whose CRC trailer is already
/// removed.
///
/// The layout comes only from `format`, never from the length.
pub fn decode_header(content: &[u8], format: HeaderFormat) -> Result<DecodedFrame<'_>, DecodeError> {
    let parsed = match format {
        HeaderFormat::TwoChannel => header_2ch(content),
        HeaderFormat::ThreeChannel => header_3ch(content),
        HeaderFormat::LongRange => header_lr(content),
    };
    let (payload, (options, route)) = parsed.map_err(|_| DecodeError::MalformedFrame)?;

    Ok(DecodedFrame {
        format,
        options,
        route,
        payload,
        content,
    })
}

/// Check the big-endian CRC at the end of a frame.
///
/// Return the frame (without CRC) on success.
pub fn check_crc<C>(crc: C, input: &[u8]) -> Option<&[u8]>
where
    C: CrcStyle,
{
    let width = crc.width();
    if input.len() < width {
        return None;
    }

    let (content, trailer) = input.split_at(input.len() - width);
    let provided = match *trailer {
        [a] => a as u16,
        [a, b] => u16::from_be_bytes([a, b]),
        _ => return None,
    };

    if crc.validate(crc.checksum(content), provided) {
        Some(content)
    } else {
        None
    }
}

/// Decode a raw frame as delivered by the radio: trim it to its
/// length byte, verify the CRC, then decode the headers.
pub fn decode(raw: &[u8], format: HeaderFormat, crc: CrcWidth) -> Result<DecodedFrame<'_>, DecodeError> {
    let length = *raw.get(LENGTH_INDEX).ok_or(DecodeError::MalformedFrame)? as usize;
    if length > raw.len() || length < LENGTH_INDEX + 1 + crc.len() {
        return Err(DecodeError::MalformedFrame);
    }

    let frame = &raw[..length];
    let content = match crc.style() {
        Some(style) => check_crc(&style, frame).ok_or(DecodeError::ChecksumMismatch)?,
        None => frame,
    };

    decode_header(content, format)
}
