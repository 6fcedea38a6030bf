//! # SRL (Selective Repeat Link)
//!
//! 프레임을 잃거나 깨뜨릴 수는 있지만 순서는 바꾸지 않는 점대점 채널 위에서
//! 가변 길이 패킷을 순서대로, 정확히 한 번 전달하는 데이터 링크 계층
//!
//! ## 핵심 특징
//! - **Selective Repeat**: 타임아웃/NAK 된 프레임만 재전송
//! - **피기백 ACK**: 나가는 DATA 에 누적 ACK 을 실어 대역폭 절약
//! - **NAK 중복 억제**: gap 하나당 NAK 한 번
//! - **고정 윈도우**: 7비트 시퀀스 공간, 윈도우 64
//! - **Sans-IO 코어**: [`ArqController`] 는 [`Link`] 트레이트로만 IO 수행
//! - **tokio 드라이버**: [`Endpoint`] 가 타이머와 채널을 붙여 실제로 구동

pub mod channel;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod flow;
pub mod frame;
pub mod link;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod stats;
pub mod timer;

pub use channel::{lossy_pair, port_pair, udp_port, ChannelConfig, LossyChannel, PhysicalPort};
pub use config::Config;
pub use endpoint::Endpoint;
pub use engine::{ArqController, Event};
pub use error::{Error, Result};
pub use flow::FlowGate;
pub use frame::{Checksum, Crc32, Frame, FrameCodec, FrameHeader, FrameKind};
pub use link::{Action, Link, Outbox};
pub use receiver::{Acceptance, RecvWindow};
pub use sender::SendWindow;
pub use seq::Seq;
pub use stats::LinkStats;

/// 시퀀스 공간 크기 (7비트)
pub const SEQ_SPACE: usize = 128;

/// 최대 시퀀스 번호
pub const MAX_SEQ: u8 = 127;

/// 송신/수신 윈도우 크기 (SEQ_SPACE / 2)
pub const WINDOW_SIZE: usize = 64;

/// 기본 패킷 길이 (바이트)
pub const DEFAULT_PACKET_LEN: usize = 256;

/// 최대 패킷 길이 (바이트)
pub const MAX_PACKET_LEN: usize = 1024;
