//! 두 컨트롤러를 가상 채널로 잇는 결정적 시뮬레이션
//!
//! 타이머는 채널이 조용해졌을 때만 만료시킨다 (ACK 지연 < 재전송 < 그 외 모든 것).

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use srlink::{
    Action, ArqController, ChannelConfig, Event, Frame, FrameKind, LossyChannel, Outbox, Seq,
    WINDOW_SIZE,
};

const PACKET_LEN: usize = 16;

fn packet(id: u32) -> Bytes {
    let mut buf = vec![0u8; PACKET_LEN];
    buf[..4].copy_from_slice(&id.to_le_bytes());
    buf[4] = 0xA5;
    Bytes::from(buf)
}

struct Node {
    ctl: ArqController,
    link: Outbox,
    to_send: VecDeque<Bytes>,
    delivered: Vec<Bytes>,
    sent: Vec<Bytes>,
    enabled: bool,
    data_timers: HashMap<Seq, u64>,
    ack_timer: bool,
    clock: u64,
}

impl Node {
    fn new() -> Self {
        Self {
            ctl: ArqController::new(PACKET_LEN),
            link: Outbox::new(),
            to_send: VecDeque::new(),
            delivered: Vec::new(),
            sent: Vec::new(),
            enabled: false,
            data_timers: HashMap::new(),
            ack_timer: false,
            clock: 0,
        }
    }

    fn handle(&mut self, event: Event, wire: &mut VecDeque<Bytes>, channel: &mut LossyChannel) {
        self.ctl.handle(event, &mut self.link).unwrap();

        let mut sent_data = false;
        let actions: Vec<Action> = self.link.drain().collect();
        for action in actions {
            match action {
                Action::SendFrame(frame) => {
                    self.sent.push(frame.clone());
                    wire.extend(channel.transmit(frame));
                }
                Action::StartDataTimer(seq) => {
                    self.clock += 1;
                    self.data_timers.insert(seq, self.clock);
                    sent_data = true;
                }
                Action::StopDataTimer(seq) => {
                    self.data_timers.remove(&seq);
                }
                Action::StartAckTimer => self.ack_timer = true,
                Action::StopAckTimer => self.ack_timer = false,
                Action::Deliver(packet) => self.delivered.push(packet),
                Action::UpperLayer(enabled) => self.enabled = enabled,
            }
        }

        if sent_data {
            self.handle(Event::TransportReady, wire, channel);
        }
    }

    fn earliest_data_timer(&self) -> Option<Seq> {
        self.data_timers
            .iter()
            .min_by_key(|(_, armed)| **armed)
            .map(|(seq, _)| *seq)
    }

    fn sent_of_kind(&self, kind: FrameKind) -> Vec<Frame> {
        self.sent
            .iter()
            .filter_map(|bytes| self.ctl.codec().decode(bytes).ok())
            .filter(|frame| frame.kind() == Some(kind))
            .collect()
    }

    fn check_windows(&self) {
        let send = self.ctl.send_window();
        let recv = self.ctl.recv_window();
        assert!(Seq::distance(send.lower(), send.upper()) <= WINDOW_SIZE);
        assert_eq!(Seq::distance(send.lower(), send.upper()), send.outstanding());
        assert_eq!(Seq::distance(recv.lower(), recv.upper()), WINDOW_SIZE);
    }
}

struct World {
    a: Node,
    b: Node,
    a_to_b: VecDeque<Bytes>,
    b_to_a: VecDeque<Bytes>,
    ch_ab: LossyChannel,
    ch_ba: LossyChannel,
}

impl World {
    fn new(config: ChannelConfig) -> Self {
        let reverse = ChannelConfig {
            seed: config.seed.map(|seed| seed.wrapping_add(1)),
            ..config.clone()
        };
        let mut world = Self {
            a: Node::new(),
            b: Node::new(),
            a_to_b: VecDeque::new(),
            b_to_a: VecDeque::new(),
            ch_ab: LossyChannel::new(config),
            ch_ba: LossyChannel::new(reverse),
        };
        world
            .a
            .handle(Event::TransportReady, &mut world.a_to_b, &mut world.ch_ab);
        world
            .b
            .handle(Event::TransportReady, &mut world.b_to_a, &mut world.ch_ba);
        world
    }

    /// 이벤트 하나 처리. 할 일이 없으면 false
    fn step(&mut self) -> bool {
        if let Some(frame) = self.a_to_b.pop_front() {
            self.b
                .handle(Event::FrameReceived(frame), &mut self.b_to_a, &mut self.ch_ba);
            return true;
        }
        if let Some(frame) = self.b_to_a.pop_front() {
            self.a
                .handle(Event::FrameReceived(frame), &mut self.a_to_b, &mut self.ch_ab);
            return true;
        }
        if self.a.enabled {
            if let Some(packet) = self.a.to_send.pop_front() {
                self.a
                    .handle(Event::UpperLayerReady(packet), &mut self.a_to_b, &mut self.ch_ab);
                return true;
            }
        }
        if self.b.enabled {
            if let Some(packet) = self.b.to_send.pop_front() {
                self.b
                    .handle(Event::UpperLayerReady(packet), &mut self.b_to_a, &mut self.ch_ba);
                return true;
            }
        }
        if self.a.ack_timer {
            self.a.ack_timer = false;
            self.a.handle(Event::AckTimeout, &mut self.a_to_b, &mut self.ch_ab);
            return true;
        }
        if self.b.ack_timer {
            self.b.ack_timer = false;
            self.b.handle(Event::AckTimeout, &mut self.b_to_a, &mut self.ch_ba);
            return true;
        }
        if let Some(seq) = self.a.earliest_data_timer() {
            self.a.data_timers.remove(&seq);
            self.a
                .handle(Event::DataTimeout(seq), &mut self.a_to_b, &mut self.ch_ab);
            return true;
        }
        if let Some(seq) = self.b.earliest_data_timer() {
            self.b.data_timers.remove(&seq);
            self.b
                .handle(Event::DataTimeout(seq), &mut self.b_to_a, &mut self.ch_ba);
            return true;
        }
        false
    }

    fn run(&mut self, max_steps: usize) {
        for _ in 0..max_steps {
            if !self.step() {
                return;
            }
            self.a.check_windows();
            self.b.check_windows();
        }
        panic!("simulation did not settle in {} steps", max_steps);
    }
}

fn ready() -> (ArqController, Outbox) {
    let mut controller = ArqController::new(PACKET_LEN);
    let mut link = Outbox::new();
    controller.handle(Event::TransportReady, &mut link).unwrap();
    link.clear();
    (controller, link)
}

fn submit(controller: &mut ArqController, link: &mut Outbox, packet: Bytes) -> Bytes {
    link.clear();
    controller
        .handle(Event::UpperLayerReady(packet), link)
        .unwrap();
    controller.handle(Event::TransportReady, link).unwrap();
    let frames = link.sent_frames();
    assert_eq!(frames.len(), 1);
    frames[0].clone()
}

#[test]
fn test_scenario_a_lossless_in_order_delivery() {
    let mut world = World::new(ChannelConfig::transparent().with_seed(1));
    let packets: Vec<Bytes> = (0..4).map(packet).collect();
    world.a.to_send.extend(packets.iter().cloned());

    world.run(10_000);

    assert_eq!(world.b.delivered, packets);
    assert_eq!(world.a.ctl.outstanding(), 0);
    assert_eq!(world.a.ctl.stats().packets_acked, 4);
    assert_eq!(world.a.ctl.stats().retransmissions, 0);

    // b 는 보낼 DATA 가 없으므로 지연 ACK 하나가 네 개를 모두 덮는다
    let acks = world.b.sent_of_kind(FrameKind::Ack);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].ack_seq(), Seq::new(3));
    assert!(world.b.sent_of_kind(FrameKind::Nak).is_empty());
}

#[test]
fn test_scenario_b_lost_frame_recovered_by_single_nak() {
    let (mut a, mut a_link) = ready();
    let (mut b, mut b_link) = ready();

    let f0 = submit(&mut a, &mut a_link, packet(0));
    let _lost = submit(&mut a, &mut a_link, packet(1));
    let f2 = submit(&mut a, &mut a_link, packet(2));

    b.handle(Event::FrameReceived(f0), &mut b_link).unwrap();
    assert_eq!(b_link.delivered(), vec![packet(0)]);
    b_link.clear();

    b.handle(Event::FrameReceived(f2.clone()), &mut b_link).unwrap();
    // 같은 gap 에 대한 추가 도착은 NAK 를 만들지 않는다
    b.handle(Event::FrameReceived(f2), &mut b_link).unwrap();
    let naks: Vec<Frame> = b_link
        .sent_frames()
        .iter()
        .map(|bytes| b.codec().decode(bytes).unwrap())
        .collect();
    assert_eq!(naks.len(), 1);
    assert_eq!(naks[0].kind(), Some(FrameKind::Nak));
    assert_eq!(naks[0].ack_seq(), Seq::new(1));
    assert!(b_link.delivered().is_empty());

    a_link.clear();
    a.handle(Event::FrameReceived(b_link.sent_frames()[0].clone()), &mut a_link)
        .unwrap();
    let resent = a_link.sent_frames();
    assert_eq!(resent.len(), 1);
    let frame = a.codec().decode(&resent[0]).unwrap();
    assert_eq!(frame.seq(), Seq::new(1));
    assert_eq!(frame.payload, packet(1));

    b_link.clear();
    b.handle(Event::FrameReceived(resent[0].clone()), &mut b_link)
        .unwrap();
    assert_eq!(b_link.delivered(), vec![packet(1), packet(2)]);
    assert_eq!(b.stats().naks_sent, 1);
}

#[test]
fn test_scenario_c_timeout_retransmits_identical_frame() {
    let (mut a, mut link) = ready();
    let first = submit(&mut a, &mut link, packet(7));

    link.clear();
    a.handle(Event::DataTimeout(Seq::new(0)), &mut link).unwrap();

    let resent = link.sent_frames();
    assert_eq!(resent, vec![first]);
    assert!(link.actions().contains(&Action::StartDataTimer(Seq::new(0))));
    assert_eq!(a.stats().retransmissions, 1);
}

#[test]
fn test_scenario_d_delayed_standalone_ack_sent_once() {
    let (mut a, mut a_link) = ready();
    let (mut b, mut b_link) = ready();
    let f0 = submit(&mut a, &mut a_link, packet(0));

    b.handle(Event::FrameReceived(f0), &mut b_link).unwrap();
    assert!(b_link.actions().contains(&Action::StartAckTimer));
    assert!(b_link.sent_frames().is_empty());
    b_link.clear();

    b.handle(Event::AckTimeout, &mut b_link).unwrap();
    b.handle(Event::AckTimeout, &mut b_link).unwrap();

    let frames = b_link.sent_frames();
    assert_eq!(frames.len(), 1);
    let ack = b.codec().decode(&frames[0]).unwrap();
    assert_eq!(ack.kind(), Some(FrameKind::Ack));
    assert_eq!(ack.ack_seq(), Seq::new(0));

    a_link.clear();
    a.handle(Event::FrameReceived(frames[0].clone()), &mut a_link)
        .unwrap();
    assert_eq!(a.outstanding(), 0);
    assert!(a_link.actions().contains(&Action::StopDataTimer(Seq::new(0))));
}

#[test]
fn test_scenario_e_full_window_withholds_upper_layer() {
    let (mut a, mut link) = ready();
    for id in 0..WINDOW_SIZE as u32 {
        submit(&mut a, &mut link, packet(id));
    }
    assert_eq!(a.outstanding(), WINDOW_SIZE);
    assert!(!a.upper_layer_enabled());
    assert_eq!(link.actions().last(), Some(&Action::UpperLayer(false)));

    link.clear();
    assert!(a
        .handle(Event::UpperLayerReady(packet(99)), &mut link)
        .is_err());
    assert!(link.sent_frames().is_empty());

    let ack = a.codec().encode(&Frame::ack(Seq::new(0)));
    a.handle(Event::FrameReceived(ack), &mut link).unwrap();
    assert!(a.upper_layer_enabled());
    assert_eq!(link.actions().last(), Some(&Action::UpperLayer(true)));
}

#[test]
fn test_cumulative_ack_is_idempotent() {
    let (mut a, mut link) = ready();
    for id in 0..5 {
        submit(&mut a, &mut link, packet(id));
    }

    let ack = a.codec().encode(&Frame::ack(Seq::new(2)));
    a.handle(Event::FrameReceived(ack.clone()), &mut link).unwrap();
    let (lower, outstanding) = (a.send_window().lower(), a.outstanding());

    a.handle(Event::FrameReceived(ack), &mut link).unwrap();
    assert_eq!(a.send_window().lower(), lower);
    assert_eq!(a.outstanding(), outstanding);
    assert_eq!(outstanding, 2);
}

#[test]
fn test_lost_final_ack_recovers() {
    let (mut a, mut a_link) = ready();
    let (mut b, mut b_link) = ready();
    let f0 = submit(&mut a, &mut a_link, packet(0));

    b.handle(Event::FrameReceived(f0), &mut b_link).unwrap();
    b.handle(Event::AckTimeout, &mut b_link).unwrap();
    // 이 ACK 은 유실
    b_link.clear();

    a_link.clear();
    a.handle(Event::DataTimeout(Seq::new(0)), &mut a_link).unwrap();
    b.handle(Event::FrameReceived(a_link.sent_frames()[0].clone()), &mut b_link)
        .unwrap();
    assert!(b_link.delivered().is_empty());

    b.handle(Event::AckTimeout, &mut b_link).unwrap();
    a.handle(Event::FrameReceived(b_link.sent_frames()[0].clone()), &mut a_link)
        .unwrap();
    assert_eq!(a.outstanding(), 0);
}

#[test]
fn test_bidirectional_traffic_piggybacks_acks() {
    let mut world = World::new(ChannelConfig::transparent().with_seed(2));
    let forward: Vec<Bytes> = (0..200).map(packet).collect();
    let backward: Vec<Bytes> = (1000..1200).map(packet).collect();
    world.a.to_send.extend(forward.iter().cloned());
    world.b.to_send.extend(backward.iter().cloned());

    world.run(100_000);

    assert_eq!(world.b.delivered, forward);
    assert_eq!(world.a.delivered, backward);
    assert!(world.a.ctl.stats().piggybacked_acks > 0);
    assert!(world.b.ctl.stats().piggybacked_acks > 0);
}

#[test]
fn test_lossy_channel_delivers_everything_in_order_exactly_once() {
    for seed in [1u64, 7, 42, 1234, 9999] {
        let config = ChannelConfig {
            loss_rate: 0.2,
            corrupt_rate: 0.1,
            duplicate_rate: 0.1,
            seed: Some(seed),
        };
        let mut world = World::new(config);
        let forward: Vec<Bytes> = (0..500).map(packet).collect();
        let backward: Vec<Bytes> = (5000..5300).map(packet).collect();
        world.a.to_send.extend(forward.iter().cloned());
        world.b.to_send.extend(backward.iter().cloned());

        world.run(2_000_000);

        assert_eq!(world.b.delivered, forward, "seed {}", seed);
        assert_eq!(world.a.delivered, backward, "seed {}", seed);
        assert_eq!(world.a.ctl.outstanding(), 0);
        assert_eq!(world.b.ctl.outstanding(), 0);
        assert!(world.a.ctl.stats().retransmissions > 0);
    }
}

#[test]
fn test_nak_sent_at_most_once_per_gap() {
    let (mut a, mut a_link) = ready();
    let (mut b, mut b_link) = ready();
    let frames: Vec<Bytes> = (0..20)
        .map(|id| submit(&mut a, &mut a_link, packet(id)))
        .collect();

    let count_naks = |link: &Outbox, controller: &ArqController| {
        link.sent_frames()
            .iter()
            .filter_map(|bytes| controller.codec().decode(bytes).ok())
            .filter(|frame| frame.kind() == Some(FrameKind::Nak))
            .map(|frame| frame.ack_seq())
            .collect::<Vec<_>>()
    };

    // 1 유실: 2..10 이 도착해도 NAK 은 하나
    b.handle(Event::FrameReceived(frames[0].clone()), &mut b_link)
        .unwrap();
    for frame in &frames[2..10] {
        b.handle(Event::FrameReceived(frame.clone()), &mut b_link)
            .unwrap();
    }
    assert_eq!(count_naks(&b_link, &b), vec![Seq::new(1)]);

    // gap 이 채워지면 10 까지 한꺼번에 전달
    b_link.clear();
    b.handle(Event::FrameReceived(frames[1].clone()), &mut b_link)
        .unwrap();
    assert_eq!(b_link.delivered().len(), 9);
    assert_eq!(b.recv_window().lower(), Seq::new(10));

    // 다음 gap(10) 은 새로 NAK 한다
    b_link.clear();
    for frame in &frames[11..20] {
        b.handle(Event::FrameReceived(frame.clone()), &mut b_link)
            .unwrap();
    }
    assert_eq!(count_naks(&b_link, &b), vec![Seq::new(10)]);
    assert_eq!(b.stats().naks_sent, 2);
}
