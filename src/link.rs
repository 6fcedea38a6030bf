//! 외부 협력자 인터페이스
//!
//! 물리 계층 송신, 타이머, 상위 계층 전달/흐름 제어를 한데 묶는다.
//! 컨트롤러는 이 트레이트만 호출하며 실제 IO 는 구현체가 맡는다.

use bytes::Bytes;

use crate::Seq;

/// 컨트롤러가 요구하는 링크 프리미티브
pub trait Link {
    /// 인코딩된 프레임 송신
    fn send_frame(&mut self, frame: Bytes);

    /// 데이터 재전송 타이머 시작 (이미 돌고 있으면 재시작)
    fn start_data_timer(&mut self, seq: Seq);

    /// 데이터 재전송 타이머 정지 (이미 멈췄으면 무시)
    fn stop_data_timer(&mut self, seq: Seq);

    /// ACK 지연 타이머 시작
    fn start_ack_timer(&mut self);

    fn stop_ack_timer(&mut self);

    /// 순서대로 도착한 패킷을 상위 계층에 전달
    fn deliver(&mut self, packet: Bytes);

    /// 상위 계층 패킷 요청 허용/차단
    fn set_upper_layer_enabled(&mut self, enabled: bool);
}

/// 링크 호출 기록
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SendFrame(Bytes),
    StartDataTimer(Seq),
    StopDataTimer(Seq),
    StartAckTimer,
    StopAckTimer,
    Deliver(Bytes),
    UpperLayer(bool),
}

/// 호출을 순서대로 쌓아 두는 `Link` 구현
///
/// 이벤트 루프는 이벤트 하나를 처리한 뒤 `drain` 으로 꺼내 실제 IO 에 반영한다.
#[derive(Debug, Default)]
pub struct Outbox {
    actions: Vec<Action>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Action> {
        self.actions.drain(..)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// 송신된 프레임만
    pub fn sent_frames(&self) -> Vec<Bytes> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::SendFrame(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// 전달된 패킷만
    pub fn delivered(&self) -> Vec<Bytes> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::Deliver(packet) => Some(packet.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Link for Outbox {
    fn send_frame(&mut self, frame: Bytes) {
        self.actions.push(Action::SendFrame(frame));
    }

    fn start_data_timer(&mut self, seq: Seq) {
        self.actions.push(Action::StartDataTimer(seq));
    }

    fn stop_data_timer(&mut self, seq: Seq) {
        self.actions.push(Action::StopDataTimer(seq));
    }

    fn start_ack_timer(&mut self) {
        self.actions.push(Action::StartAckTimer);
    }

    fn stop_ack_timer(&mut self) {
        self.actions.push(Action::StopAckTimer);
    }

    fn deliver(&mut self, packet: Bytes) {
        self.actions.push(Action::Deliver(packet));
    }

    fn set_upper_layer_enabled(&mut self, enabled: bool) {
        self.actions.push(Action::UpperLayer(enabled));
    }
}
