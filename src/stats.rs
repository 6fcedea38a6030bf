//! 링크 통계

use std::time::{Duration, Instant};

/// 컨트롤러 카운터
#[derive(Debug, Clone)]
pub struct LinkStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 상위 계층에서 받은 패킷 수
    pub packets_submitted: u64,

    /// 전송한 DATA 프레임 수 (재전송 포함)
    pub data_frames_sent: u64,

    /// 재전송 수 (타임아웃 + NAK)
    pub retransmissions: u64,

    /// NAK 로 인한 재전송 수
    pub nak_retransmissions: u64,

    /// 단독 ACK 프레임 수
    pub acks_sent: u64,

    /// DATA 에 실어 보낸 pending ACK 수
    pub piggybacked_acks: u64,

    /// 보낸 NAK 수
    pub naks_sent: u64,

    /// 수신 프레임 수 (손상 포함)
    pub frames_received: u64,

    /// 체크섬/길이 불량으로 버린 프레임 수
    pub malformed_frames: u64,

    /// 알 수 없는 종류로 버린 프레임 수
    pub unknown_frames: u64,

    /// 윈도우 밖이라 버린 DATA 수
    pub out_of_window: u64,

    /// 윈도우 안 중복 DATA 수
    pub duplicates: u64,

    /// 상위 계층에 전달한 패킷 수
    pub packets_delivered: u64,

    /// 상대가 확인한 패킷 수
    pub packets_acked: u64,

    /// 무시한 stale 타이머/NAK 수
    pub stale_events: u64,
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            packets_submitted: 0,
            data_frames_sent: 0,
            retransmissions: 0,
            nak_retransmissions: 0,
            acks_sent: 0,
            piggybacked_acks: 0,
            naks_sent: 0,
            frames_received: 0,
            malformed_frames: 0,
            unknown_frames: 0,
            out_of_window: 0,
            duplicates: 0,
            packets_delivered: 0,
            packets_acked: 0,
            stale_events: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 전송 DATA 중 재전송 비율
    pub fn retransmit_ratio(&self) -> f64 {
        if self.data_frames_sent == 0 {
            return 0.0;
        }
        self.retransmissions as f64 / self.data_frames_sent as f64
    }

    /// 수신 프레임 중 손상 비율
    pub fn corruption_rate(&self) -> f64 {
        if self.frames_received == 0 {
            return 0.0;
        }
        self.malformed_frames as f64 / self.frames_received as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sent: {} DATA ({} retx, {:.1}%) | ACK: {} + {} piggyback | NAK: {} | Recv: {} ({} bad) | Delivered: {} | Acked: {}",
            self.elapsed().as_secs_f64(),
            self.data_frames_sent,
            self.retransmissions,
            self.retransmit_ratio() * 100.0,
            self.acks_sent,
            self.piggybacked_acks,
            self.naks_sent,
            self.frames_received,
            self.malformed_frames,
            self.packets_delivered,
            self.packets_acked,
        )
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}
