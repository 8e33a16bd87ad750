use super::crc::{CrcDigest, CrcStyle, CrcWidth};
use super::{
    pack_lr_ids, Control2ch, Extra3ch, FrameOptions, FrameType, HeaderExtension, HeaderFormat,
    Info2ch, Info3ch, InfoLr, MAX_FRAME_LEN, MAX_HEADER_LEN,
};
use crate::Error;

/// A trait for serializing frames.
pub trait Serializer {
    type Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error>;

    // everything else can be written in terms of write_u8
    // specialize them in SerializerLength and &mut S too

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        for b in val.iter() {
            self.write_u8(*b)?;
        }
        Ok(())
    }

    fn write_i8(&mut self, val: i8) -> Result<(), Self::Error> {
        self.write_u8(val as u8)
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        self.write_bytes(&val.to_be_bytes())
    }
}

impl<S> Serializer for &mut S
where
    S: Serializer,
{
    type Error = S::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        (*self).write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        (*self).write_bytes(val)
    }

    fn write_i8(&mut self, val: i8) -> Result<(), Self::Error> {
        (*self).write_i8(val)
    }

    fn write_be_u16(&mut self, val: u16) -> Result<(), Self::Error> {
        (*self).write_be_u16(val)
    }
}

/// A serializer that only counts bytes written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SerializerLength {
    len: usize,
}

impl SerializerLength {
    pub fn new() -> Self {
        SerializerLength { len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Serializer for SerializerLength {
    type Error = void::Void;

    fn write_u8(&mut self, _val: u8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.len += val.len();
        Ok(())
    }

    fn write_i8(&mut self, _val: i8) -> Result<(), Self::Error> {
        self.len += 1;
        Ok(())
    }

    fn write_be_u16(&mut self, _val: u16) -> Result<(), Self::Error> {
        self.len += 2;
        Ok(())
    }
}

/// A serializer that also computes a CRC on the side.
pub struct SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    digest: C::Digest<'a>,
    inner: T,
}

impl<'a, C, T> SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
{
    pub fn new(crc: &'a C, inner: T) -> Self {
        Self {
            digest: crc.digest(),
            inner,
        }
    }

    pub fn finalize(self) -> (u16, T) {
        (self.digest.finalize(), self.inner)
    }
}

impl<'a, C, T> Serializer for SerializerCrc<'a, C, T>
where
    C: CrcStyle + 'a,
    T: Serializer,
{
    type Error = T::Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        self.digest.update(&[val]);
        self.inner.write_u8(val)
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        self.digest.update(val);
        self.inner.write_bytes(val)
    }
}

/// A fixed-capacity byte buffer that serializers can fill.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FrameBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
}

/// Encoded header bytes.
pub type Header = FrameBuffer<MAX_HEADER_LEN>;

impl<const N: usize> FrameBuffer<N> {
    pub fn new() -> Self {
        Self {
            data: [0; N],
            len: 0,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Self::new();
        buf.write_bytes(bytes)?;
        Ok(buf)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for FrameBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "FrameBuffer({:02x?})", self.as_slice())
    }
}

#[cfg(feature = "defmt")]
impl<const N: usize> defmt::Format for FrameBuffer<N> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "FrameBuffer({=[u8]:x})", self.as_slice())
    }
}

impl<const N: usize> core::ops::Deref for FrameBuffer<N> {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<const N: usize> Serializer for FrameBuffer<N> {
    type Error = Error;

    fn write_u8(&mut self, val: u8) -> Result<(), Self::Error> {
        if self.len >= N {
            return Err(Error::NoMemory);
        }
        self.data[self.len] = val;
        self.len += 1;
        Ok(())
    }

    fn write_bytes(&mut self, val: &[u8]) -> Result<(), Self::Error> {
        let end = self.len + val.len();
        if end > N {
            return Err(Error::NoMemory);
        }
        self.data[self.len..end].copy_from_slice(val);
        self.len = end;
        Ok(())
    }
}

/// Write a header with the given value in the length byte.
///
/// This *must* write the same number of bytes no matter the length
/// value, since it is run once with [SerializerLength] to find out
/// how long the header is.
pub fn write_header<S>(
    options: &FrameOptions,
    format: HeaderFormat,
    length: u8,
    ser: &mut S,
) -> Result<(), S::Error>
where
    S: Serializer,
{
    match format {
        HeaderFormat::TwoChannel => {
            let (header_type, routed) = match options.frame_type {
                FrameType::Routed => (FrameType::Singlecast, true),
                t => (t, false),
            };
            let info = Info2ch::new()
                .with_header_type(header_type.code())
                .with_speed_modified(options.speed_modified)
                .with_low_power(options.low_power)
                .with_ack(options.acknowledge)
                .with_routed(routed);
            let control = Control2ch::new()
                .with_sequence(options.sequence & 0x0f)
                .with_wakeup_250ms(options.wakeup_250ms)
                .with_wakeup_1000ms(options.wakeup_1000ms)
                .with_multicast_followup(options.multicast_followup);

            ser.write_bytes(&options.home_id)?;
            ser.write_u8(options.source as u8)?;
            ser.write_u8(info.into())?;
            ser.write_u8(control.into())?;
            ser.write_u8(length)?;
            if options.frame_type != FrameType::Multicast {
                ser.write_u8(options.destination as u8)?;
            }
        }
        HeaderFormat::ThreeChannel => {
            let info = Info3ch::new()
                .with_header_type(options.frame_type.code())
                .with_multicast_followup(options.multicast_followup)
                .with_low_power(options.low_power)
                .with_ack(options.acknowledge);
            let extra = Extra3ch::new()
                .with_wakeup_250ms(options.wakeup_250ms)
                .with_wakeup_1000ms(options.wakeup_1000ms)
                .with_extended(options.extended());

            ser.write_bytes(&options.home_id)?;
            ser.write_u8(options.source as u8)?;
            ser.write_u8(info.into())?;
            ser.write_u8(extra.into())?;
            ser.write_u8(length)?;
            ser.write_u8(options.sequence)?;
            if options.frame_type != FrameType::Multicast {
                ser.write_u8(options.destination as u8)?;
            }
        }
        HeaderFormat::LongRange => {
            let info = InfoLr::new()
                .with_header_type(options.frame_type.code() & 0x07)
                .with_extended(options.extended())
                .with_ack(options.acknowledge);

            ser.write_bytes(&options.home_id)?;
            ser.write_bytes(&pack_lr_ids(options.source, options.destination))?;
            ser.write_u8(length)?;
            ser.write_u8(info.into())?;
            ser.write_u8(options.sequence)?;
            ser.write_i8(options.noise_floor)?;
            ser.write_i8(options.tx_power)?;
            if options.frame_type == FrameType::Ack {
                ser.write_i8(options.receive_rssi)?;
            }
        }
    }

    if let Some(ext) = options.extension {
        ser.write_u8(ext.info_byte(format))?;
        ser.write_bytes(ext.body())?;
    }

    Ok(())
}

/// Check that a format can carry these options at all.
fn check_encodable(options: &FrameOptions, format: HeaderFormat) -> Result<(), Error> {
    if format.header_len(options.frame_type).is_none() {
        return Err(Error::Unsupported);
    }
    match (format, options.extension) {
        (HeaderFormat::TwoChannel, Some(_)) => Err(Error::Unsupported),
        (HeaderFormat::ThreeChannel, Some(ext))
            if ext.body().len() > HeaderExtension::MAX_BODY_3CH =>
        {
            Err(Error::InvalidParameters)
        }
        _ => Ok(()),
    }
}

/// Length of the encoded header, extended header included.
pub fn header_len(options: &FrameOptions, format: HeaderFormat) -> Result<usize, Error> {
    use void::ResultVoidExt;

    check_encodable(options, format)?;
    let mut len_ser = SerializerLength::new();
    write_header(options, format, 0, &mut len_ser).void_unwrap();
    Ok(len_ser.len())
}

/// Encode a header for a frame carrying `payload_len` bytes and a
/// `crc` trailer.
///
/// Deterministic: the same input always yields the same bytes.
pub fn encode_header(
    options: &FrameOptions,
    format: HeaderFormat,
    payload_len: usize,
    crc: CrcWidth,
) -> Result<Header, Error> {
    let len = header_len(options, format)?;
    let total = len + payload_len + crc.len();
    if total > MAX_FRAME_LEN {
        return Err(Error::InvalidParameters);
    }

    let mut header = Header::new();
    write_header(options, format, total as u8, &mut header)?;
    Ok(header)
}

/// Encode a whole frame: header, payload, and CRC trailer.
pub fn encode_frame(
    options: &FrameOptions,
    format: HeaderFormat,
    payload: &[u8],
    crc: CrcWidth,
) -> Result<FrameBuffer<MAX_FRAME_LEN>, Error> {
    let header = encode_header(options, format, payload.len(), crc)?;

    let mut out = FrameBuffer::new();
    match crc.style() {
        Some(style) => {
            let mut crc_ser = SerializerCrc::new(&style, &mut out);
            crc_ser.write_bytes(&header)?;
            crc_ser.write_bytes(payload)?;
            let (value, out) = crc_ser.finalize();
            match style.width() {
                1 => out.write_u8(value as u8)?,
                _ => out.write_be_u16(value)?,
            }
        }
        None => {
            out.write_bytes(&header)?;
            out.write_bytes(payload)?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::LENGTH_INDEX;
    use quickcheck_macros::quickcheck;

    fn cafebabf(frame_type: FrameType) -> FrameOptions {
        FrameOptions::new(frame_type, [0xca, 0xfe, 0xba, 0xbf], 1, 2)
    }

    #[test]
    fn singlecast_vector() {
        let mut options = cafebabf(FrameType::Singlecast);
        options.sequence = 10;
        options.acknowledge = true;
        options.speed_modified = true;

        let frame = encode_frame(
            &options,
            HeaderFormat::TwoChannel,
            &[0x5e, 0x01],
            CrcWidth::Crc8,
        )
        .unwrap();
        assert_eq!(
            frame.as_slice(),
            &[0xca, 0xfe, 0xba, 0xbf, 0x01, 0x51, 0x0a, 0x0c, 0x02, 0x5e, 0x01, 0xc5]
        );
    }

    #[test]
    fn multicast_has_no_destination() {
        let options = cafebabf(FrameType::Multicast);
        let header = encode_header(&options, HeaderFormat::TwoChannel, 0, CrcWidth::Crc8).unwrap();
        assert_eq!(header.len(), 8);
        let header = encode_header(&options, HeaderFormat::ThreeChannel, 0, CrcWidth::Crc16).unwrap();
        assert_eq!(header.len(), 9);
    }

    #[test]
    fn routed_two_channel_sets_bit() {
        let options = cafebabf(FrameType::Routed);
        let header = encode_header(&options, HeaderFormat::TwoChannel, 0, CrcWidth::Crc8).unwrap();
        assert_eq!(header[5], 0x81);
        let header = encode_header(&options, HeaderFormat::ThreeChannel, 0, CrcWidth::Crc16).unwrap();
        assert_eq!(header[5] & 0x0f, 0x08);
    }

    #[test]
    fn long_range_layout() {
        let mut options = FrameOptions::new(FrameType::Singlecast, [1, 2, 3, 4], 0x123, 0x456);
        options.sequence = 0x77;
        options.acknowledge = true;
        options.noise_floor = -90;
        options.tx_power = 14;
        let header = encode_header(&options, HeaderFormat::LongRange, 3, CrcWidth::Crc16).unwrap();
        assert_eq!(
            header.as_slice(),
            &[1, 2, 3, 4, 0x12, 0x34, 0x56, 17, 0x81, 0x77, (-90i8) as u8, 14]
        );
    }

    #[test]
    fn long_range_rejects_explore() {
        let options = cafebabf(FrameType::Explore);
        assert_eq!(
            encode_header(&options, HeaderFormat::LongRange, 0, CrcWidth::Crc16),
            Err(Error::Unsupported)
        );
        let options = cafebabf(FrameType::Multicast);
        assert_eq!(
            encode_header(&options, HeaderFormat::LongRange, 0, CrcWidth::Crc16),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn two_channel_rejects_extension() {
        let mut options = cafebabf(FrameType::Singlecast);
        options.extension = HeaderExtension::new(0, &[1]);
        assert_eq!(
            encode_header(&options, HeaderFormat::TwoChannel, 0, CrcWidth::Crc8),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn extension_follows_header() {
        let mut options = cafebabf(FrameType::Singlecast);
        options.extension = HeaderExtension::new(0x08, &[0xaa, 0xbb]);
        let header = encode_header(&options, HeaderFormat::ThreeChannel, 0, CrcWidth::Crc16).unwrap();
        assert_eq!(header.len(), 13);
        assert_eq!(header[6] & 0x80, 0x80);
        assert_eq!(&header[10..], &[0x0b, 0xaa, 0xbb]);
    }

    #[test]
    fn oversized_payload() {
        let options = cafebabf(FrameType::Singlecast);
        assert_eq!(
            encode_header(&options, HeaderFormat::TwoChannel, MAX_FRAME_LEN, CrcWidth::Crc8),
            Err(Error::InvalidParameters)
        );
    }

    #[quickcheck]
    fn crc_trailer_width(options: FrameOptions, payload: Vec<u8>) -> bool {
        let Some(options) = crate::frame::test::fit(options, HeaderFormat::ThreeChannel) else {
            return true;
        };
        let payload = &payload[..payload.len().min(64)];
        let frame8 = encode_frame(&options, HeaderFormat::ThreeChannel, payload, CrcWidth::Crc8).unwrap();
        let frame16 = encode_frame(&options, HeaderFormat::ThreeChannel, payload, CrcWidth::Crc16).unwrap();
        frame16.len() == frame8.len() + 1
            && frame8[LENGTH_INDEX] as usize == frame8.len()
            && frame16[LENGTH_INDEX] as usize == frame16.len()
    }

    #[quickcheck]
    fn encode_is_deterministic(options: FrameOptions, format: crate::frame::HeaderFormat) -> bool {
        encode_header(&options, format, 4, CrcWidth::Crc16)
            == encode_header(&options, format, 4, CrcWidth::Crc16)
    }
}
