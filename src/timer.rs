//! 타이머 테이블
//!
//! 번호별 DATA 재전송 타이머 + 공유 ACK 지연 타이머.
//! 모두 단발성이며 다시 시작하면 기존 기한을 덮어쓴다.

use std::time::Duration;

use tokio::time::Instant;

use crate::{Seq, SEQ_SPACE};

/// 만료된 타이머
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    Data(Seq),
    Ack,
}

#[derive(Debug)]
pub struct TimerSet {
    data: [Option<Instant>; SEQ_SPACE],
    ack: Option<Instant>,
    data_timeout: Duration,
    ack_timeout: Duration,
}

impl TimerSet {
    pub fn new(data_timeout: Duration, ack_timeout: Duration) -> Self {
        Self {
            data: [None; SEQ_SPACE],
            ack: None,
            data_timeout,
            ack_timeout,
        }
    }

    pub fn start_data(&mut self, seq: Seq, now: Instant) {
        self.data[seq.value() as usize] = Some(now + self.data_timeout);
    }

    pub fn stop_data(&mut self, seq: Seq) {
        self.data[seq.value() as usize] = None;
    }

    pub fn start_ack(&mut self, now: Instant) {
        self.ack = Some(now + self.ack_timeout);
    }

    pub fn stop_ack(&mut self) {
        self.ack = None;
    }

    pub fn is_data_armed(&self, seq: Seq) -> bool {
        self.data[seq.value() as usize].is_some()
    }

    pub fn is_ack_armed(&self) -> bool {
        self.ack.is_some()
    }

    /// 가장 이른 기한
    pub fn next_deadline(&self) -> Option<Instant> {
        self.data.iter().flatten().chain(self.ack.iter()).min().copied()
    }

    /// `now` 까지 만료된 타이머 중 가장 이른 것을 해제하고 반환
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerId> {
        let mut earliest: Option<(Instant, TimerId)> = None;

        for (seq, deadline) in self.data.iter().enumerate() {
            if let Some(deadline) = *deadline {
                if deadline <= now && earliest.map_or(true, |(at, _)| deadline < at) {
                    earliest = Some((deadline, TimerId::Data(Seq::new(seq as u8))));
                }
            }
        }
        if let Some(deadline) = self.ack {
            if deadline <= now && earliest.map_or(true, |(at, _)| deadline < at) {
                earliest = Some((deadline, TimerId::Ack));
            }
        }

        let (_, id) = earliest?;
        match id {
            TimerId::Data(seq) => self.stop_data(seq),
            TimerId::Ack => self.stop_ack(),
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timers() -> TimerSet {
        TimerSet::new(Duration::from_millis(100), Duration::from_millis(20))
    }

    #[test]
    fn test_nothing_armed() {
        let mut timers = timers();
        assert_eq!(timers.next_deadline(), None);
        assert_eq!(timers.pop_expired(Instant::now()), None);
    }

    #[test]
    fn test_pop_earliest_first() {
        let mut timers = timers();
        let now = Instant::now();
        timers.start_data(Seq::new(3), now);
        timers.start_ack(now);
        timers.start_data(Seq::new(1), now + Duration::from_millis(5));

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(20)));

        let later = now + Duration::from_millis(200);
        assert_eq!(timers.pop_expired(later), Some(TimerId::Ack));
        assert_eq!(timers.pop_expired(later), Some(TimerId::Data(Seq::new(3))));
        assert_eq!(timers.pop_expired(later), Some(TimerId::Data(Seq::new(1))));
        assert_eq!(timers.pop_expired(later), None);
    }

    #[test]
    fn test_not_expired_yet() {
        let mut timers = timers();
        let now = Instant::now();
        timers.start_data(Seq::new(0), now);
        assert_eq!(timers.pop_expired(now + Duration::from_millis(50)), None);
        assert!(timers.is_data_armed(Seq::new(0)));
    }

    #[test]
    fn test_restart_and_idempotent_stop() {
        let mut timers = timers();
        let now = Instant::now();
        timers.start_data(Seq::new(7), now);
        timers.start_data(Seq::new(7), now + Duration::from_millis(50));
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_millis(150)));

        timers.stop_data(Seq::new(7));
        timers.stop_data(Seq::new(7));
        timers.stop_ack();
        assert_eq!(timers.next_deadline(), None);
    }
}
