//! 수신 윈도우
//!
//! - 순서가 어긋난 DATA 를 `seq % W` 링 버퍼에 보관
//! - 빈 자리(gap)당 NAK 는 한 번만 요청
//! - 앞부분이 채워지면 연속 구간을 순서대로 상위 계층에 전달
//! - 전달한 마지막 번호를 pending ACK 으로 기록
//! - 윈도우 밖 DATA 는 전달하지 않고 버린다. 다만 이미 전달한 프레임의 재전송은
//!   그 ACK 이 유실됐다는 뜻이므로 implied ACK 을 pending 으로 다시 예약한다
//!   (마지막 ACK 이 유실돼도 송신측 재전송은 ACK 으로 끝난다).

use bytes::Bytes;
use tracing::debug;

use crate::link::Link;
use crate::{Seq, WINDOW_SIZE};

/// 수신 슬롯
#[derive(Debug, Clone, Default)]
struct RecvSlot {
    arrived: bool,

    /// 이 위치의 gap 에 대해 NAK 를 이미 보냈는지
    nak_sent: bool,

    payload: Bytes,
}

/// DATA 수용 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// 윈도우 밖 (이미 전달했거나 아직 받을 수 없는 번호)
    OutOfWindow,

    /// 순서가 어긋나 보관만 함. `nak` 이 있으면 그 번호로 NAK 전송 필요
    Buffered { nak: Option<Seq>, duplicate: bool },

    /// 연속 구간을 전달함
    Delivered { count: usize, last: Seq },
}

/// 수신 윈도우 관리자
#[derive(Debug)]
pub struct RecvWindow {
    slots: [RecvSlot; WINDOW_SIZE],

    /// 상위 계층이 다음에 기대하는 번호
    lower: Seq,

    /// `lower + W` (항상 폭 W 유지)
    upper: Seq,

    /// 아직 상대에게 알리지 않은 누적 ACK
    pending_ack: Option<Seq>,
}

impl Default for RecvWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RecvWindow {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| RecvSlot::default()),
            lower: Seq::ZERO,
            upper: Seq::ZERO.advance(WINDOW_SIZE),
            pending_ack: None,
        }
    }

    pub fn lower(&self) -> Seq {
        self.lower
    }

    pub fn upper(&self) -> Seq {
        self.upper
    }

    pub fn contains(&self, seq: Seq) -> bool {
        Seq::between(self.lower, seq, self.upper)
    }

    /// 보관 중(아직 전달 전)인 프레임 수
    pub fn buffered(&self) -> usize {
        self.slots.iter().filter(|slot| slot.arrived).count()
    }

    pub fn pending_ack(&self) -> Option<Seq> {
        self.pending_ack
    }

    pub fn take_pending_ack(&mut self) -> Option<Seq> {
        self.pending_ack.take()
    }

    /// 윈도우 상태만으로 알 수 있는 누적 ACK (`lower - 1`)
    ///
    /// 아무것도 전달하기 전에는 127 이며, 상대 송신 윈도우가 0 에서 시작하므로
    /// 어떤 프레임도 해제하지 않는다.
    pub fn implied_ack(&self) -> Seq {
        self.lower.prev()
    }

    /// 나가는 DATA 에 실을 ACK
    ///
    /// pending ACK 이 있으면 꺼내고 ACK 타이머를 멈춘다 (피기백 우선).
    /// 두 번째 값은 피기백 여부.
    pub fn outbound_ack<L: Link>(&mut self, link: &mut L) -> (Seq, bool) {
        match self.pending_ack.take() {
            Some(ack) => {
                link.stop_ack_timer();
                (ack, true)
            }
            None => (self.implied_ack(), false),
        }
    }

    /// 검증된 DATA 프레임 수용
    pub fn accept<L: Link>(&mut self, seq: Seq, payload: Bytes, link: &mut L) -> Acceptance {
        if !self.contains(seq) {
            // 이미 전달한 프레임의 재전송이면 그 ACK 이 유실된 것이므로 다시 예약한다
            debug!(
                "DATA {} outside receive window [{}, {})",
                seq, self.lower, self.upper
            );
            self.pending_ack = Some(self.implied_ack());
            link.start_ack_timer();
            return Acceptance::OutOfWindow;
        }

        let slot = &mut self.slots[seq.slot()];
        let duplicate = slot.arrived;
        slot.payload = payload;
        slot.arrived = true;

        if seq != self.lower {
            let gap = &mut self.slots[self.lower.slot()];
            let nak = if gap.nak_sent {
                None
            } else {
                gap.nak_sent = true;
                Some(self.lower)
            };
            return Acceptance::Buffered { nak, duplicate };
        }

        let mut count = 0;
        let mut last = self.lower;
        while self.slots[self.lower.slot()].arrived {
            let slot = &mut self.slots[self.lower.slot()];
            slot.arrived = false;
            slot.nak_sent = false;
            link.deliver(std::mem::take(&mut slot.payload));

            last = self.lower;
            self.pending_ack = Some(last);
            self.lower = self.lower.next();
            self.upper = self.upper.next();
            count += 1;
        }
        debug_assert_eq!(Seq::distance(self.lower, self.upper), WINDOW_SIZE);

        link.start_ack_timer();
        debug!("Delivered {} packets up to {}", count, last);
        Acceptance::Delivered { count, last }
    }
}
