//! 송신 윈도우
//!
//! - 미확인 DATA 프레임을 `seq % W` 링 버퍼에 보관
//! - 프레임마다 재전송 타이머 관리
//! - 누적 ACK 로 `[lower, upper)` 구간 앞부분 해제

use bytes::Bytes;
use tracing::debug;

use crate::frame::{Checksum, Frame, FrameCodec};
use crate::link::Link;
use crate::{Error, Result, Seq, WINDOW_SIZE};

/// 송신 슬롯
#[derive(Debug, Clone, Default)]
struct SendSlot {
    /// 마지막으로 보낸 DATA 페이로드
    payload: Bytes,

    /// 재전송 타이머 동작 여부
    timer_active: bool,
}

/// 송신 윈도우 관리자
#[derive(Debug)]
pub struct SendWindow {
    slots: [SendSlot; WINDOW_SIZE],

    /// 가장 오래된 미확인 번호
    lower: Seq,

    /// 다음에 할당할 번호
    upper: Seq,

    /// 미확인 프레임 수
    outstanding: usize,
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SendWindow {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| SendSlot::default()),
            lower: Seq::ZERO,
            upper: Seq::ZERO,
            outstanding: 0,
        }
    }

    pub fn lower(&self) -> Seq {
        self.lower
    }

    pub fn upper(&self) -> Seq {
        self.upper
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn is_full(&self) -> bool {
        self.outstanding >= WINDOW_SIZE
    }

    /// 보냈지만 아직 확인되지 않은 번호인지
    pub fn contains(&self, seq: Seq) -> bool {
        Seq::between(self.lower, seq, self.upper)
    }

    /// 타이머가 동작 중인지 (윈도우 밖이면 false)
    pub fn timer_active(&self, seq: Seq) -> bool {
        self.contains(seq) && self.slots[seq.slot()].timer_active
    }

    /// 새 패킷을 `upper` 번호로 보관하고 번호 반환
    pub fn enqueue(&mut self, payload: Bytes) -> Result<Seq> {
        if self.is_full() {
            return Err(Error::WindowFull {
                outstanding: self.outstanding,
            });
        }

        let seq = self.upper;
        self.slots[seq.slot()] = SendSlot {
            payload,
            timer_active: false,
        };
        self.upper = self.upper.next();
        self.outstanding += 1;
        debug_assert_eq!(self.outstanding, Seq::distance(self.lower, self.upper));

        Ok(seq)
    }

    /// 보관 중인 프레임을 `ack` 를 실어 (재)전송하고 타이머 재시작
    ///
    /// 윈도우 밖 번호(이미 확인된 슬롯)는 보내지 않고 false.
    pub fn transmit<C: Checksum, L: Link>(
        &mut self,
        seq: Seq,
        ack: Seq,
        codec: &FrameCodec<C>,
        link: &mut L,
    ) -> bool {
        if !self.contains(seq) {
            return false;
        }

        let slot = &mut self.slots[seq.slot()];
        let frame = Frame::data(seq, ack, slot.payload.clone());
        debug!("Send DATA seq={} ack={}", seq, ack);

        link.send_frame(codec.encode(&frame));
        link.start_data_timer(seq);
        slot.timer_active = true;
        true
    }

    /// 누적 ACK: `[lower, ack]` 를 해제하고 해제한 수 반환
    ///
    /// 이미 윈도우 밖인 번호면 아무것도 하지 않는다.
    pub fn ack<L: Link>(&mut self, ack: Seq, link: &mut L) -> usize {
        let mut released = 0;

        while self.contains(ack) {
            let slot = &mut self.slots[self.lower.slot()];
            slot.timer_active = false;
            slot.payload = Bytes::new();
            link.stop_data_timer(self.lower);

            self.outstanding -= 1;
            self.lower = self.lower.next();
            released += 1;
        }

        if released > 0 {
            debug!(
                "Recv ACK {}: {} released, window [{}, {})",
                ack, released, self.lower, self.upper
            );
        }
        released
    }
}
