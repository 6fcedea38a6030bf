//! 링크 설정
//!
//! 윈도우 크기(64)와 시퀀스 공간(128)은 와이어 포맷에 묶여 있어 설정 대상이 아니다.

use std::time::Duration;

use crate::{Error, Result, DEFAULT_PACKET_LEN, MAX_PACKET_LEN};

/// SRL 링크 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// DATA 프레임 페이로드 길이 (바이트, 고정)
    pub packet_len: usize,

    /// DATA 재전송 타이머 (밀리초)
    pub data_timeout_ms: u64,

    /// ACK 지연 타이머 (밀리초)
    /// 이 안에 나가는 DATA 가 없으면 단독 ACK 전송
    pub ack_timeout_ms: u64,

    /// 상위 계층 제출 큐 길이
    pub submit_queue: usize,

    /// 상위 계층 전달 큐 길이
    pub deliver_queue: usize,

    /// 물리 계층 큐 길이
    pub frame_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packet_len: DEFAULT_PACKET_LEN,
            data_timeout_ms: 5000,            // 5초
            ack_timeout_ms: 1000,             // 1초
            submit_queue: 64,
            deliver_queue: 256,
            frame_queue: 1024,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.packet_len == 0 || self.packet_len > MAX_PACKET_LEN {
            return Err(Error::InvalidConfig(format!(
                "packet_len {} (1..={})",
                self.packet_len, MAX_PACKET_LEN
            )));
        }
        if self.data_timeout_ms == 0 || self.ack_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout must be positive".into()));
        }
        // ACK 이 재전송보다 늦으면 매번 불필요한 재전송이 일어난다
        if self.ack_timeout_ms >= self.data_timeout_ms {
            return Err(Error::InvalidConfig(format!(
                "ack_timeout_ms {} >= data_timeout_ms {}",
                self.ack_timeout_ms, self.data_timeout_ms
            )));
        }
        if self.submit_queue == 0 || self.deliver_queue == 0 || self.frame_queue == 0 {
            return Err(Error::InvalidConfig("queue length must be positive".into()));
        }
        Ok(())
    }

    /// 저지연 로컬 링크용 설정
    pub fn low_latency() -> Self {
        Self {
            packet_len: DEFAULT_PACKET_LEN,
            data_timeout_ms: 200,
            ack_timeout_ms: 40,
            submit_queue: 64,
            deliver_queue: 256,
            frame_queue: 1024,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            packet_len: 128,                  // 작은 프레임
            data_timeout_ms: 8000,
            ack_timeout_ms: 1500,
            submit_queue: 32,
            deliver_queue: 256,
            frame_queue: 512,
        }
    }
}
