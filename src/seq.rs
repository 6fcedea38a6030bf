//! 7비트 순환 시퀀스 번호
//!
//! ```text
//!        lower                upper
//!   -------|====================|-------
//!          [  윈도우 안 (반열림)  )
//! ```
//!
//! 모든 비교는 modulo 128 로 이루어지며 `lower == upper` 이면 빈 구간이다.

use std::fmt;

use crate::{SEQ_SPACE, WINDOW_SIZE};

/// 시퀀스 번호 (0 ~ 127)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Seq(u8);

impl Seq {
    pub const ZERO: Seq = Seq(0);

    /// 하위 7비트만 취해 생성
    pub const fn new(value: u8) -> Self {
        Seq(value & (SEQ_SPACE as u8 - 1))
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// 다음 번호 (127 → 0)
    pub const fn next(self) -> Self {
        Seq::new(self.0.wrapping_add(1))
    }

    /// 이전 번호 (0 → 127)
    pub const fn prev(self) -> Self {
        Seq::new(self.0.wrapping_add(SEQ_SPACE as u8 - 1))
    }

    /// 링 버퍼 슬롯 인덱스
    pub const fn slot(self) -> usize {
        self.0 as usize % WINDOW_SIZE
    }

    /// `from` 에서 `to` 까지 앞으로 센 거리
    pub fn distance(from: Seq, to: Seq) -> usize {
        (to.0 as usize + SEQ_SPACE - from.0 as usize) % SEQ_SPACE
    }

    /// `x` 가 `[lower, upper)` 안에 있는지
    pub fn between(lower: Seq, x: Seq, upper: Seq) -> bool {
        if lower.0 <= upper.0 {
            lower.0 <= x.0 && x.0 < upper.0
        } else {
            lower.0 <= x.0 || x.0 < upper.0
        }
    }

    /// `n` 만큼 앞으로
    pub fn advance(self, n: usize) -> Self {
        Seq::new(((self.0 as usize + n) % SEQ_SPACE) as u8)
    }
}

impl From<u8> for Seq {
    fn from(value: u8) -> Self {
        Seq::new(value)
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
