//! ARQ 컨트롤러
//!
//! 외부 이벤트 하나를 끝까지 처리하고 무엇을 보낼지 결정한다.
//! 상태는 송신/수신 윈도우와 Flow Gate 가 전부이며 IO 는 [`Link`] 로만 나간다.
//!
//! 프로토콜 이상(손상 프레임, 윈도우 밖 번호, 알 수 없는 종류)은 로그와 통계로만
//! 남기고 타임아웃 재전송에 맡긴다.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::flow::FlowGate;
use crate::frame::{Checksum, Crc32, Frame, FrameCodec, FrameKind};
use crate::link::Link;
use crate::receiver::{Acceptance, RecvWindow};
use crate::sender::SendWindow;
use crate::stats::LinkStats;
use crate::{Error, Result, Seq};

/// 컨트롤러 입력 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 상위 계층이 내준 패킷 (Flow Gate 가 열려 있을 때만 발생)
    UpperLayerReady(Bytes),

    /// 물리 계층이 다음 프레임을 받을 준비가 됨
    TransportReady,

    /// 물리 계층에서 받은 원시 바이트
    FrameReceived(Bytes),

    /// 해당 번호의 DATA 재전송 타이머 만료
    DataTimeout(Seq),

    /// ACK 지연 타이머 만료
    AckTimeout,
}

/// 재전송 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retransmit {
    Timeout,
    Nak,
}

/// 선택적 반복 ARQ 컨트롤러
#[derive(Debug)]
pub struct ArqController<C = Crc32> {
    codec: FrameCodec<C>,
    sender: SendWindow,
    receiver: RecvWindow,
    gate: FlowGate,
    stats: LinkStats,
}

impl ArqController<Crc32> {
    pub fn new(packet_len: usize) -> Self {
        Self::with_codec(FrameCodec::new(packet_len))
    }
}

impl<C: Checksum> ArqController<C> {
    pub fn with_codec(codec: FrameCodec<C>) -> Self {
        Self {
            codec,
            sender: SendWindow::new(),
            receiver: RecvWindow::new(),
            gate: FlowGate::new(),
            stats: LinkStats::new(),
        }
    }

    pub fn codec(&self) -> &FrameCodec<C> {
        &self.codec
    }

    pub fn send_window(&self) -> &SendWindow {
        &self.sender
    }

    pub fn recv_window(&self) -> &RecvWindow {
        &self.receiver
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// 미확인 프레임 수
    pub fn outstanding(&self) -> usize {
        self.sender.outstanding()
    }

    /// 상위 계층에 패킷을 요청해도 되는지 (마지막 이벤트 기준)
    pub fn upper_layer_enabled(&self) -> bool {
        self.gate.is_open()
    }

    /// 이벤트 하나 처리
    ///
    /// `Err` 는 인터페이스 오용(윈도우가 가득 찬 상태에서 패킷 제출, 길이가 다른 패킷)뿐이다.
    /// 어떤 경우든 처리 후 Flow Gate 를 다시 평가한다.
    pub fn handle<L: Link>(&mut self, event: Event, link: &mut L) -> Result<()> {
        let result = match event {
            Event::UpperLayerReady(packet) => self.on_packet(packet, link),
            Event::TransportReady => {
                self.gate.set_transport_ready(true);
                Ok(())
            }
            Event::FrameReceived(bytes) => {
                self.on_frame(&bytes, link);
                Ok(())
            }
            Event::DataTimeout(seq) => {
                debug!("---- DATA {} timeout", seq);
                self.retransmit(seq, Retransmit::Timeout, link);
                Ok(())
            }
            Event::AckTimeout => {
                self.on_ack_timeout(link);
                Ok(())
            }
        };

        let open = self.gate.evaluate(self.sender.outstanding());
        link.set_upper_layer_enabled(open);
        result
    }

    fn on_packet<L: Link>(&mut self, packet: Bytes, link: &mut L) -> Result<()> {
        if packet.len() != self.codec.packet_len() {
            return Err(Error::PayloadLength {
                expected: self.codec.packet_len(),
                got: packet.len(),
            });
        }

        let seq = self.sender.enqueue(packet)?;
        self.stats.packets_submitted += 1;
        self.transmit(seq, link);
        Ok(())
    }

    /// 보관된 DATA 를 현재 ACK 값으로 전송. 윈도우 밖이면 false
    fn transmit<L: Link>(&mut self, seq: Seq, link: &mut L) -> bool {
        if !self.sender.contains(seq) {
            return false;
        }

        let (ack, piggybacked) = self.receiver.outbound_ack(link);
        self.sender.transmit(seq, ack, &self.codec, link);

        self.stats.data_frames_sent += 1;
        if piggybacked {
            self.stats.piggybacked_acks += 1;
        }
        self.gate.set_transport_ready(false);
        true
    }

    /// 한 프레임만 재전송 (selective repeat)
    ///
    /// 이미 확인된 번호를 가리키는 타이머/NAK 는 stale 로 보고 무시한다.
    fn retransmit<L: Link>(&mut self, seq: Seq, cause: Retransmit, link: &mut L) {
        if !self.transmit(seq, link) {
            debug!("Ignore stale {:?} for {}", cause, seq);
            self.stats.stale_events += 1;
            return;
        }

        self.stats.retransmissions += 1;
        if cause == Retransmit::Nak {
            self.stats.nak_retransmissions += 1;
        }
    }

    fn on_frame<L: Link>(&mut self, bytes: &[u8], link: &mut L) {
        self.stats.frames_received += 1;

        let frame = match self.codec.decode(bytes) {
            Ok(frame) => frame,
            Err(Error::UnknownFrameKind { kind }) => {
                warn!("**** Receiver Error, Unknown Frame Type {}", kind);
                self.stats.unknown_frames += 1;
                return;
            }
            Err(e) => {
                warn!("**** Receiver Error, {}", e);
                self.stats.malformed_frames += 1;
                return;
            }
        };

        match frame.kind() {
            Some(FrameKind::Data) => {
                self.on_ack(frame.ack_seq(), link);
                self.on_data(frame.seq(), frame.payload, link);
            }
            Some(FrameKind::Ack) => self.on_ack(frame.ack_seq(), link),
            Some(FrameKind::Nak) => {
                debug!("Recv NAK {}", frame.ack_seq());
                self.retransmit(frame.ack_seq(), Retransmit::Nak, link);
            }
            None => {
                warn!("**** Receiver Error, Unknown Frame Type {}", frame.header.kind_bits());
                self.stats.unknown_frames += 1;
            }
        }
    }

    fn on_ack<L: Link>(&mut self, ack: Seq, link: &mut L) {
        let released = self.sender.ack(ack, link);
        self.stats.packets_acked += released as u64;
    }

    fn on_data<L: Link>(&mut self, seq: Seq, payload: Bytes, link: &mut L) {
        match self.receiver.accept(seq, payload, link) {
            Acceptance::OutOfWindow => self.stats.out_of_window += 1,
            Acceptance::Buffered { nak, duplicate } => {
                if duplicate {
                    self.stats.duplicates += 1;
                }
                if let Some(missing) = nak {
                    debug!("Send NAK {}", missing);
                    link.send_frame(self.codec.encode(&Frame::nak(missing)));
                    self.stats.naks_sent += 1;
                }
            }
            Acceptance::Delivered { count, .. } => {
                self.stats.packets_delivered += count as u64;
            }
        }
    }

    /// pending ACK 이 남아 있으면 단독 ACK 전송
    fn on_ack_timeout<L: Link>(&mut self, link: &mut L) {
        match self.receiver.take_pending_ack() {
            Some(ack) => {
                debug!("---- ACK timeout, send ACK {}", ack);
                link.send_frame(self.codec.encode(&Frame::ack(ack)));
                self.stats.acks_sent += 1;
            }
            None => debug!("---- ACK timeout, already piggybacked"),
        }
    }
}
