/// Generic CRC style, for encoding and decoding frames.
pub trait CrcStyle {
    type Digest<'a>: CrcDigest
    where
        Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a>;

    /// Number of trailer bytes this CRC occupies on air.
    fn width(&self) -> usize;

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        calculated == provided
    }

    /// Compute the CRC over a whole buffer at once.
    fn checksum(&self, bytes: &[u8]) -> u16 {
        let mut digest = self.digest();
        digest.update(bytes);
        digest.finalize()
    }
}

/// Interface for a CRC digest.
pub trait CrcDigest {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self) -> u16;
}

impl<C> CrcStyle for &C
where
    C: CrcStyle,
{
    type Digest<'a> = C::Digest<'a> where Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        (*self).digest()
    }

    fn width(&self) -> usize {
        (*self).width()
    }

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        (*self).validate(calculated, provided)
    }
}

/// Trailer width selected for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcWidth {
    /// Beams carry no trailer.
    None,
    /// 8-bit XOR checksum, used at 9.6k and 40k.
    Crc8,
    /// 16-bit CCITT, used at 100k and on every 3-channel and LR frame.
    Crc16,
}

impl CrcWidth {
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Crc8 => 1,
            Self::Crc16 => 2,
        }
    }

    /// The CRC implementation for this width, if any.
    pub fn style(&self) -> Option<FrameCrc> {
        match self {
            Self::None => None,
            Self::Crc8 => Some(CrcEither::Left(CrcXor8)),
            Self::Crc16 => Some(CrcEither::Right(CrcCcitt::new())),
        }
    }
}

/// The CRC used on any data frame.
pub type FrameCrc = CrcEither<CrcXor8, CrcCcitt>;

/// A CRC that is one of two possible implementations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CrcEither<A, B> {
    Left(A),
    Right(B),
}

impl<A, B> CrcStyle for CrcEither<A, B>
where
    A: CrcStyle,
    B: CrcStyle,
{
    type Digest<'a> = CrcEither<A::Digest<'a>, B::Digest<'a>> where Self: 'a;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        match self {
            Self::Left(a) => Self::Digest::Left(a.digest()),
            Self::Right(b) => Self::Digest::Right(b.digest()),
        }
    }

    fn width(&self) -> usize {
        match self {
            Self::Left(a) => a.width(),
            Self::Right(b) => b.width(),
        }
    }

    fn validate(&self, calculated: u16, provided: u16) -> bool {
        match self {
            Self::Left(a) => a.validate(calculated, provided),
            Self::Right(b) => b.validate(calculated, provided),
        }
    }
}

impl<A, B> CrcDigest for CrcEither<A, B>
where
    A: CrcDigest,
    B: CrcDigest,
{
    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Left(a) => a.update(bytes),
            Self::Right(b) => b.update(bytes),
        }
    }

    fn finalize(self) -> u16 {
        match self {
            Self::Left(a) => a.finalize(),
            Self::Right(b) => b.finalize(),
        }
    }
}

/// The 8-bit checksum: 0xff xor'd with every byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CrcXor8;

/// Running state for [CrcXor8].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrcXor8Digest(u8);

impl CrcStyle for CrcXor8 {
    type Digest<'a> = CrcXor8Digest;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        CrcXor8Digest(0xff)
    }

    fn width(&self) -> usize {
        1
    }
}

impl CrcDigest for CrcXor8Digest {
    fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 ^= b;
        }
    }

    fn finalize(self) -> u16 {
        self.0 as u16
    }
}

/// 16-bit CCITT with initial value 0x1d0f, sent big-endian.
#[derive(Clone)]
pub struct CrcCcitt(crc::Crc<u16>);

/// A 16-bit CCITT digest struct.
#[derive(Clone)]
pub struct CrcCcittDigest<'a>(crc::Digest<'a, u16, crc::Table<1>>);

impl CrcCcitt {
    pub fn new() -> Self {
        Self(crc::Crc::<u16>::new(&crc::CRC_16_SPI_FUJITSU))
    }
}

impl Default for CrcCcitt {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CrcCcitt {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("CrcCcitt").finish()
    }
}

// every instance computes the same function
impl PartialEq for CrcCcitt {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for CrcCcitt {}

impl PartialOrd for CrcCcitt {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CrcCcitt {
    fn cmp(&self, _other: &Self) -> core::cmp::Ordering {
        core::cmp::Ordering::Equal
    }
}

impl core::hash::Hash for CrcCcitt {
    fn hash<H: core::hash::Hasher>(&self, _state: &mut H) {}
}

impl CrcStyle for CrcCcitt {
    type Digest<'a> = CrcCcittDigest<'a>;

    fn digest<'a>(&'a self) -> Self::Digest<'a> {
        CrcCcittDigest(self.0.digest())
    }

    fn width(&self) -> usize {
        2
    }
}

impl<'a> CrcDigest for CrcCcittDigest<'a> {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes)
    }

    fn finalize(self) -> u16 {
        self.0.finalize()
    }
}
