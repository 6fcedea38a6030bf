//! 점대점 물리 채널 (장애 주입)
//!
//! 실제 링크는 프레임을 잃거나 깨뜨리지만 순서는 바꾸지 않는다.
//! [`LossyChannel`] 은 이 모델대로 손실, 비트 오류, 중복을 주입한다.
//! 시드를 고정하면 같은 장애 패턴이 재현된다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::MAX_PACKET_LEN;

/// 장애 주입 설정 (확률은 0.0 ~ 1.0)
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// 프레임 손실 확률
    pub loss_rate: f64,

    /// 한 비트를 뒤집을 확률
    pub corrupt_rate: f64,

    /// 프레임을 두 번 전달할 확률
    pub duplicate_rate: f64,

    /// RNG 시드 (None 이면 OS 엔트로피)
    pub seed: Option<u64>,
}

impl ChannelConfig {
    /// 장애 없음
    pub fn transparent() -> Self {
        Self::default()
    }

    pub fn lossy(loss_rate: f64, corrupt_rate: f64) -> Self {
        Self {
            loss_rate,
            corrupt_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.loss_rate <= 0.0 && self.corrupt_rate <= 0.0 && self.duplicate_rate <= 0.0
    }
}

/// 장애 주입 채널 (한 방향)
#[derive(Debug)]
pub struct LossyChannel {
    config: ChannelConfig,
    rng: StdRng,

    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
}

impl LossyChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            rng,
            dropped: 0,
            corrupted: 0,
            duplicated: 0,
        }
    }

    fn roll(&mut self, probability: f64) -> bool {
        probability > 0.0 && self.rng.gen::<f64>() < probability
    }

    /// 프레임 하나를 채널에 통과시켜 도착할 사본들을 반환 (0 ~ 2개)
    pub fn transmit(&mut self, frame: Bytes) -> Vec<Bytes> {
        if self.roll(self.config.loss_rate) {
            self.dropped += 1;
            trace!("channel: drop {} bytes", frame.len());
            return Vec::new();
        }

        let copies = if self.roll(self.config.duplicate_rate) {
            self.duplicated += 1;
            2
        } else {
            1
        };

        (0..copies)
            .map(|_| {
                if frame.is_empty() || !self.roll(self.config.corrupt_rate) {
                    return frame.clone();
                }
                self.corrupted += 1;
                let mut bytes = frame.to_vec();
                let bit = self.rng.gen_range(0..bytes.len() * 8);
                bytes[bit / 8] ^= 1 << (bit % 8);
                trace!("channel: flip bit {}", bit);
                Bytes::from(bytes)
            })
            .collect()
    }
}

/// 엔드포인트 하나가 보는 물리 계층 (송신/수신 큐)
#[derive(Debug)]
pub struct PhysicalPort {
    pub tx: mpsc::Sender<Bytes>,
    pub rx: mpsc::Receiver<Bytes>,
}

/// 장애 없는 직결 포트 쌍
pub fn port_pair(capacity: usize) -> (PhysicalPort, PhysicalPort) {
    let (a_tx, b_rx) = mpsc::channel(capacity);
    let (b_tx, a_rx) = mpsc::channel(capacity);
    (
        PhysicalPort { tx: a_tx, rx: a_rx },
        PhysicalPort { tx: b_tx, rx: b_rx },
    )
}

/// 방향마다 [`LossyChannel`] 을 끼운 포트 쌍
///
/// tokio 런타임 안에서 호출해야 한다 (방향별 펌프 태스크 생성).
pub fn lossy_pair(config: ChannelConfig, capacity: usize) -> (PhysicalPort, PhysicalPort) {
    let (a_port, a_far) = port_pair(capacity);
    let (b_port, b_far) = port_pair(capacity);

    let reverse = ChannelConfig {
        seed: config.seed.map(|seed| seed.wrapping_add(1)),
        ..config.clone()
    };

    spawn_pump(a_far.rx, b_far.tx, LossyChannel::new(config));
    spawn_pump(b_far.rx, a_far.tx, LossyChannel::new(reverse));

    (a_port, b_port)
}

fn spawn_pump(mut rx: mpsc::Receiver<Bytes>, tx: mpsc::Sender<Bytes>, mut channel: LossyChannel) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            for copy in channel.transmit(frame) {
                if tx.send(copy).await.is_err() {
                    return;
                }
            }
        }
    });
}

/// UDP 소켓을 물리 계층으로 사용하는 포트
///
/// 송신 방향에만 `config` 의 장애를 주입하고, `peer` 가 아닌 주소에서 온 데이터그램은 버린다.
pub fn udp_port(
    socket: UdpSocket,
    peer: SocketAddr,
    config: ChannelConfig,
    capacity: usize,
) -> PhysicalPort {
    let (port, far) = port_pair(capacity);
    let socket = Arc::new(socket);

    let send_socket = socket.clone();
    let mut outbound = far.rx;
    let mut channel = LossyChannel::new(config);
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            for copy in channel.transmit(frame) {
                if let Err(e) = send_socket.send_to(&copy, peer).await {
                    warn!("UDP send error: {}", e);
                }
            }
        }
        debug!(
            "UDP outbound closed (dropped={}, corrupted={}, duplicated={})",
            channel.dropped, channel.corrupted, channel.duplicated
        );
    });

    let inbound = far.tx;
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_LEN + 64];
        loop {
            let (len, from) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("UDP recv error: {}", e);
                    continue;
                }
            };
            if from != peer {
                trace!("ignore datagram from {}", from);
                continue;
            }
            if inbound.send(Bytes::copy_from_slice(&buf[..len])).await.is_err() {
                return;
            }
        }
    });

    port
}
