//! 상위 계층 흐름 제어 (Flow Gate)
//!
//! 윈도우 점유와 물리 계층 준비 상태만 보는 단순 허용 제어.
//! 손실률이나 지연은 고려하지 않는다.

use crate::WINDOW_SIZE;

#[derive(Debug, Clone, Default)]
pub struct FlowGate {
    /// 물리 계층이 다음 프레임을 받을 수 있는지
    transport_ready: bool,

    /// 마지막 평가 결과
    open: bool,
}

impl FlowGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport_ready(&self) -> bool {
        self.transport_ready
    }

    pub fn set_transport_ready(&mut self, ready: bool) {
        self.transport_ready = ready;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// `outstanding < W && transport_ready` 를 다시 계산
    pub fn evaluate(&mut self, outstanding: usize) -> bool {
        self.open = outstanding < WINDOW_SIZE && self.transport_ready;
        self.open
    }
}
