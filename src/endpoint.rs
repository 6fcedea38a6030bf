//! 링크 엔드포인트 (tokio 이벤트 루프)
//!
//! - 컨트롤러 하나를 단일 태스크가 소유
//! - 이벤트 하나를 끝까지 처리한 뒤 기록된 Action 을 실제 IO 에 반영 (await 없음)
//! - Flow Gate 가 닫혀 있으면 제출 큐를 읽지 않음 (백프레셔)
//! - 전달 패킷은 내부 backlog 에 쌓고 상위 계층 큐에 자리가 날 때 넘김.
//!   상위 계층이 늦게 읽어도 ACK/타이머/제출 처리는 멈추지 않는다.
//! - 물리 계층 큐가 가득 차면 프레임을 버린다 (손실로 간주, 재전송으로 복구)

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::channel::{lossy_pair, ChannelConfig, PhysicalPort};
use crate::engine::{ArqController, Event};
use crate::link::{Action, Outbox};
use crate::stats::LinkStats;
use crate::timer::{TimerId, TimerSet};
use crate::{Config, Error, Result};

/// 이벤트 루프 내부 상태 (단일 태스크에서만 접근)
struct Driver {
    controller: ArqController,
    timers: TimerSet,
    outbox: Outbox,
    port: PhysicalPort,
    submit_rx: mpsc::Receiver<Bytes>,
    submit_open: bool,
    deliver_tx: mpsc::Sender<Bytes>,
    /// 상위 계층 큐로 아직 넘기지 못한 전달 패킷
    backlog: VecDeque<Bytes>,
    deliver_open: bool,
    upper_enabled: bool,
    stats: Arc<RwLock<LinkStats>>,
    acked_tx: watch::Sender<u64>,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl Driver {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        // 물리 계층은 처음부터 준비 상태
        if !self.dispatch(Event::TransportReady) {
            return;
        }

        loop {
            let deadline = self.timers.next_deadline();

            let event = tokio::select! {
                biased;

                _ = &mut stop_rx => break,

                // 수신 트래픽이 계속되어도 타이머가 밀리지 않도록 먼저 본다
                _ = sleep_until(deadline) => match self.timers.pop_expired(Instant::now()) {
                    Some(TimerId::Data(seq)) => Event::DataTimeout(seq),
                    Some(TimerId::Ack) => Event::AckTimeout,
                    None => continue,
                },

                permit = self.deliver_tx.reserve(), if !self.backlog.is_empty() => {
                    match (permit, self.backlog.pop_front()) {
                        (Ok(permit), Some(packet)) => permit.send(packet),
                        (Ok(_), None) => {}
                        (Err(_), _) => {
                            debug!("upper layer dropped delivery queue");
                            self.deliver_open = false;
                            self.backlog.clear();
                        }
                    }
                    continue;
                }

                frame = self.port.rx.recv() => match frame {
                    Some(bytes) => Event::FrameReceived(bytes),
                    None => {
                        info!("물리 계층 종료");
                        break;
                    }
                },

                packet = self.submit_rx.recv(), if self.upper_enabled && self.submit_open => {
                    match packet {
                        Some(packet) => Event::UpperLayerReady(packet),
                        None => {
                            debug!("submit queue closed");
                            self.submit_open = false;
                            continue;
                        }
                    }
                }
            };

            if !self.dispatch(event) {
                break;
            }
        }

        info!("SRL link stopped: {}", self.controller.stats().summary());
    }

    /// 이벤트 처리 + Action 반영. 물리 계층이 닫히면 false
    fn dispatch(&mut self, event: Event) -> bool {
        let mut next = Some(event);

        while let Some(event) = next.take() {
            if let Err(e) = self.controller.handle(event, &mut self.outbox) {
                warn!("이벤트 처리 에러: {}", e);
            }

            let now = Instant::now();
            let actions: Vec<Action> = self.outbox.drain().collect();
            for action in actions {
                match action {
                    Action::SendFrame(frame) => match self.port.tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => trace!("물리 계층 큐 가득 참, 프레임 버림"),
                        Err(TrySendError::Closed(_)) => {
                            info!("물리 계층 송신 종료");
                            return false;
                        }
                    },
                    Action::StartDataTimer(seq) => {
                        self.timers.start_data(seq, now);
                        // DATA 를 내보낸 뒤 물리 계층이 다시 준비됨을 알린다
                        next = Some(Event::TransportReady);
                    }
                    Action::StopDataTimer(seq) => self.timers.stop_data(seq),
                    Action::StartAckTimer => self.timers.start_ack(now),
                    Action::StopAckTimer => self.timers.stop_ack(),
                    Action::Deliver(packet) => {
                        if self.deliver_open {
                            self.backlog.push_back(packet);
                        }
                    }
                    Action::UpperLayer(enabled) => self.upper_enabled = enabled,
                }
            }
        }

        let stats = self.controller.stats().clone();
        self.acked_tx.send_replace(stats.packets_acked);
        *self.stats.write() = stats;
        true
    }
}

/// 링크 엔드포인트 핸들 (상위 계층용)
pub struct Endpoint {
    submit_tx: mpsc::Sender<Bytes>,
    deliver_rx: mpsc::Receiver<Bytes>,
    stats: Arc<RwLock<LinkStats>>,
    acked_rx: watch::Receiver<u64>,
    submitted: u64,
    packet_len: usize,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Endpoint {
    /// 이벤트 루프 태스크 시작
    pub fn start(config: Config, port: PhysicalPort) -> Result<Self> {
        config.validate()?;

        let (submit_tx, submit_rx) = mpsc::channel(config.submit_queue);
        let (deliver_tx, deliver_rx) = mpsc::channel(config.deliver_queue);
        let (acked_tx, acked_rx) = watch::channel(0u64);
        let (stop_tx, stop_rx) = oneshot::channel();
        let stats = Arc::new(RwLock::new(LinkStats::new()));

        let driver = Driver {
            controller: ArqController::new(config.packet_len),
            timers: TimerSet::new(config.data_timeout(), config.ack_timeout()),
            outbox: Outbox::new(),
            port,
            submit_rx,
            submit_open: true,
            deliver_tx,
            backlog: VecDeque::new(),
            deliver_open: true,
            upper_enabled: false,
            stats: stats.clone(),
            acked_tx,
        };

        info!(
            "SRL link started: packet_len={}, data_timeout={}ms, ack_timeout={}ms",
            config.packet_len, config.data_timeout_ms, config.ack_timeout_ms
        );
        let task = tokio::spawn(driver.run(stop_rx));

        Ok(Self {
            submit_tx,
            deliver_rx,
            stats,
            acked_rx,
            submitted: 0,
            packet_len: config.packet_len,
            stop_tx: Some(stop_tx),
            task: Some(task),
        })
    }

    /// 장애 주입 채널로 연결된 엔드포인트 쌍
    pub fn pair(config: Config, channel: ChannelConfig) -> Result<(Self, Self)> {
        config.validate()?;
        let (a, b) = lossy_pair(channel, config.frame_queue);
        Ok((Self::start(config.clone(), a)?, Self::start(config, b)?))
    }

    pub fn packet_len(&self) -> usize {
        self.packet_len
    }

    /// 패킷 제출 (윈도우가 가득 차면 대기)
    pub async fn submit(&mut self, packet: Bytes) -> Result<()> {
        if packet.len() != self.packet_len {
            return Err(Error::PayloadLength {
                expected: self.packet_len,
                got: packet.len(),
            });
        }

        self.submit_tx
            .send(packet)
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        self.submitted += 1;
        Ok(())
    }

    /// 순서대로 전달된 다음 패킷 (링크 종료 시 None)
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.deliver_rx.recv().await
    }

    /// 지금까지 제출한 패킷이 모두 확인될 때까지 대기
    pub async fn flush(&mut self) -> Result<()> {
        let target = self.submitted;
        self.acked_rx
            .wait_for(|acked| *acked >= target)
            .await
            .map(|_| ())
            .map_err(|_| Error::ConnectionClosed)
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> LinkStats {
        self.stats.read().clone()
    }

    /// 이벤트 루프 정지 후 종료 대기
    pub async fn stop(mut self) -> Result<LinkStats> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await.map_err(|_| Error::ChannelError)?;
        }
        Ok(self.stats())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
