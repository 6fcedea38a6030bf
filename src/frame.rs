//! 프레임 정의 및 코덱
//!
//! ```text
//! DATA  | KIND(2b) | SEQ(7b) | ACK(7b) | DATA(packet_len) | CRC(4) |
//! ACK   | KIND(2b) | 0(7b)   | ACK(7b) | CRC(4) |
//! NAK   | KIND(2b) | 0(7b)   | NAK(7b) | CRC(4) |
//! ```
//!
//! 헤더(u16)와 CRC 는 little-endian 으로 기록한다.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Error, Result, Seq};

/// 헤더 길이 (바이트)
pub const HEADER_LEN: usize = 2;

/// 체크섬 길이 (바이트)
pub const CHECKSUM_LEN: usize = 4;

/// 최소 프레임 길이 (헤더 + 체크섬, 페이로드 없음)
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;

const KIND_MASK: u16 = 0xC000;
const SEQ_MASK: u16 = 0x3F80;
const ACK_MASK: u16 = 0x007F;
const KIND_SHIFT: u16 = 14;
const SEQ_SHIFT: u16 = 7;

/// 프레임 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// 데이터 (피기백 ACK 포함)
    Data = 1,

    /// 단독 누적 ACK
    Ack = 2,

    /// 부정 확인응답 (재전송 요청)
    Nak = 3,
}

impl FrameKind {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            1 => Some(FrameKind::Data),
            2 => Some(FrameKind::Ack),
            3 => Some(FrameKind::Nak),
            _ => None,
        }
    }
}

/// 2바이트 비트 패킹 헤더
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader(u16);

impl FrameHeader {
    pub fn new(kind: FrameKind, seq: Seq, ack: Seq) -> Self {
        let mut header = FrameHeader(0);
        header.set_kind_bits(kind as u8);
        header.set_seq(seq);
        header.set_ack(ack);
        header
    }

    pub fn from_raw(raw: u16) -> Self {
        FrameHeader(raw)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn kind_bits(self) -> u8 {
        ((self.0 & KIND_MASK) >> KIND_SHIFT) as u8
    }

    pub fn kind(self) -> Option<FrameKind> {
        FrameKind::from_bits(self.kind_bits())
    }

    pub fn seq(self) -> Seq {
        Seq::new(((self.0 & SEQ_MASK) >> SEQ_SHIFT) as u8)
    }

    /// DATA/ACK 는 확인 번호, NAK 는 재전송 요청 번호
    pub fn ack(self) -> Seq {
        Seq::new((self.0 & ACK_MASK) as u8)
    }

    pub fn set_kind_bits(&mut self, bits: u8) {
        self.0 = (self.0 & !KIND_MASK) | (((bits as u16) << KIND_SHIFT) & KIND_MASK);
    }

    pub fn set_seq(&mut self, seq: Seq) {
        self.0 = (self.0 & !SEQ_MASK) | ((seq.value() as u16) << SEQ_SHIFT);
    }

    pub fn set_ack(&mut self, ack: Seq) {
        self.0 = (self.0 & !ACK_MASK) | ack.value() as u16;
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Self {
        FrameHeader(u16::from_le_bytes(bytes))
    }
}

/// 디코딩된 (또는 전송할) 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn data(seq: Seq, ack: Seq, payload: Bytes) -> Self {
        Self {
            header: FrameHeader::new(FrameKind::Data, seq, ack),
            payload,
        }
    }

    pub fn ack(ack: Seq) -> Self {
        Self {
            header: FrameHeader::new(FrameKind::Ack, Seq::ZERO, ack),
            payload: Bytes::new(),
        }
    }

    pub fn nak(missing: Seq) -> Self {
        Self {
            header: FrameHeader::new(FrameKind::Nak, Seq::ZERO, missing),
            payload: Bytes::new(),
        }
    }

    /// 디코더가 종류를 검증하므로 디코딩된 프레임에서는 항상 Some
    pub fn kind(&self) -> Option<FrameKind> {
        self.header.kind()
    }

    pub fn seq(&self) -> Seq {
        self.header.seq()
    }

    pub fn ack_seq(&self) -> Seq {
        self.header.ack()
    }
}

/// 체크섬 프리미티브
///
/// `verify` 는 수신한 바이트 전체(체크섬 포함)에 대해 유효 여부를 돌려준다.
pub trait Checksum {
    fn compute(&self, bytes: &[u8]) -> u32;

    fn verify(&self, bytes: &[u8]) -> bool {
        if bytes.len() < CHECKSUM_LEN {
            return false;
        }
        let (body, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        self.compute(body) == expected
    }
}

/// CRC-32 (IEEE)
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32;

impl Checksum for Crc32 {
    fn compute(&self, bytes: &[u8]) -> u32 {
        crc32fast::hash(bytes)
    }
}

/// 프레임 인코더/디코더 (상태 없음)
#[derive(Debug, Clone)]
pub struct FrameCodec<C = Crc32> {
    packet_len: usize,
    checksum: C,
}

impl FrameCodec<Crc32> {
    pub fn new(packet_len: usize) -> Self {
        Self::with_checksum(packet_len, Crc32)
    }
}

impl<C: Checksum> FrameCodec<C> {
    pub fn with_checksum(packet_len: usize, checksum: C) -> Self {
        Self {
            packet_len,
            checksum,
        }
    }

    pub fn packet_len(&self) -> usize {
        self.packet_len
    }

    /// 종류별 전송 프레임 길이
    pub fn frame_len(&self, kind: FrameKind) -> usize {
        match kind {
            FrameKind::Data => MIN_FRAME_LEN + self.packet_len,
            FrameKind::Ack | FrameKind::Nak => MIN_FRAME_LEN,
        }
    }

    /// 헤더 + 페이로드 + CRC 로 직렬화
    pub fn encode(&self, frame: &Frame) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_LEN + frame.payload.len());
        buf.put_slice(&frame.header.to_bytes());
        buf.put_slice(&frame.payload);
        let crc = self.checksum.compute(&buf);
        buf.put_u32_le(crc);
        buf.freeze()
    }

    /// 수신 바이트에서 프레임 복원
    ///
    /// 길이와 체크섬을 먼저 확인하고, 통과한 경우에만 헤더 필드를 해석한다.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(Error::FrameTooShort {
                len: bytes.len(),
                min: MIN_FRAME_LEN,
            });
        }

        if !self.checksum.verify(bytes) {
            return Err(Error::ChecksumMismatch { len: bytes.len() });
        }

        let header = FrameHeader::from_bytes([bytes[0], bytes[1]]);
        let kind = header.kind().ok_or(Error::UnknownFrameKind {
            kind: header.kind_bits(),
        })?;

        let payload = &bytes[HEADER_LEN..bytes.len() - CHECKSUM_LEN];
        let expected = match kind {
            FrameKind::Data => self.packet_len,
            FrameKind::Ack | FrameKind::Nak => 0,
        };
        if payload.len() != expected {
            return Err(Error::PayloadLength {
                expected,
                got: payload.len(),
            });
        }

        Ok(Frame {
            header,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}
