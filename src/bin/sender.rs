//! SRL 송신기 - Selective Repeat Link 파일 전송
//!
//! UDP 데이터그램 하나를 프레임 하나로 사용한다.
//! - 첫 패킷: 파일 길이 (u64 LE)
//! - 이후 패킷: 파일을 packet_len 단위로 자른 조각 (마지막은 0 으로 채움)
//!
//! 사용법:
//!   cargo run --release --bin srlink-send -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin srlink-send -- --bind 127.0.0.1:9001 --peer 127.0.0.1:9002 --file data.bin

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use srlink::{udp_port, ChannelConfig, Config, Endpoint};

/// 송신기 설정
struct SendConfig {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    file_path: Option<PathBuf>,
    channel: ChannelConfig,
    config: Config,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9001)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 9002)),
            file_path: None,
            channel: ChannelConfig::transparent(),
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<SendConfig, Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = SendConfig::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--bind" | "-b", Some(v)) => {
                config.bind_addr = v.parse()?;
                i += 1;
            }
            ("--peer" | "-p", Some(v)) => {
                config.peer_addr = v.parse()?;
                i += 1;
            }
            ("--file" | "-f", Some(v)) => {
                config.file_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--loss", Some(v)) => {
                config.channel.loss_rate = v.parse()?;
                i += 1;
            }
            ("--corrupt", Some(v)) => {
                config.channel.corrupt_rate = v.parse()?;
                i += 1;
            }
            ("--seed", Some(v)) => {
                config.channel.seed = Some(v.parse()?);
                i += 1;
            }
            ("--packet-len", Some(v)) => {
                config.config.packet_len = v.parse()?;
                i += 1;
            }
            ("--low-latency", _) => {
                let packet_len = config.config.packet_len;
                config.config = Config::low_latency();
                config.config.packet_len = packet_len;
            }
            ("--help" | "-h", _) => {
                println!(
                    r#"SRL Sender - Selective Repeat Link 송신기

선택적 반복 ARQ 로 파일을 순서대로, 정확히 한 번 전달
- 피기백 ACK, gap 당 NAK 한 번
- 송신 방향 손실/비트 오류 주입 가능

사용법:
  cargo run --release --bin srlink-send -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:9001)
  -p, --peer <ADDR>       수신기 주소 (기본: 127.0.0.1:9002)
  -f, --file <PATH>       전송할 파일 (기본: 1MB 테스트 데이터)
  --loss <RATE>           송신 프레임 손실 확률 (0.0 ~ 1.0)
  --corrupt <RATE>        송신 프레임 비트 오류 확률 (0.0 ~ 1.0)
  --seed <N>              장애 주입 RNG 시드
  --packet-len <BYTES>    패킷 길이 (기본: 256, 수신기와 같아야 함)
  --low-latency           짧은 타이머 사용 (로컬 링크용)
  -h, --help              이 도움말 출력

로그 레벨은 RUST_LOG 로 조정 (예: RUST_LOG=srlink=debug)
"#
                );
                std::process::exit(0);
            }
            (flag, None) if flag.starts_with('-') => {
                return Err(format!("{} 에 값이 필요합니다", flag).into());
            }
            _ => {}
        }
        i += 1;
    }

    Ok(config)
}

/// 파일 길이 패킷 + 0 으로 채운 데이터 패킷
fn packetize(data: &[u8], packet_len: usize) -> Vec<Bytes> {
    let mut header = vec![0u8; packet_len];
    header[..8].copy_from_slice(&(data.len() as u64).to_le_bytes());

    let mut packets = vec![Bytes::from(header)];
    packets.extend(data.chunks(packet_len).map(|chunk| {
        let mut buf = vec![0u8; packet_len];
        buf[..chunk.len()].copy_from_slice(chunk);
        Bytes::from(buf)
    }));
    packets
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let send_config = parse_args()?;
    let config = send_config.config.clone();
    config.validate()?;
    if config.packet_len < 8 {
        return Err("packet_len 은 파일 길이(8바이트)를 담을 수 있어야 합니다".into());
    }

    info!("SRL Sender starting...");
    info!("Bind address: {}", send_config.bind_addr);
    info!("Peer address: {}", send_config.peer_addr);
    info!("Packet length: {} bytes", config.packet_len);
    if !send_config.channel.is_transparent() {
        info!(
            "Fault injection: loss={:.1}%, corrupt={:.1}%",
            send_config.channel.loss_rate * 100.0,
            send_config.channel.corrupt_rate * 100.0
        );
    }

    // 전송할 데이터 준비
    let data = if let Some(path) = &send_config.file_path {
        info!("Loading file: {:?}", path);
        tokio::fs::read(path).await?
    } else {
        info!("Using test data (1MB)");
        (0..1024 * 1024).map(|i| (i % 251) as u8).collect()
    };
    info!("Data size: {} bytes", data.len());

    let socket = UdpSocket::bind(send_config.bind_addr).await?;
    let port = udp_port(
        socket,
        send_config.peer_addr,
        send_config.channel.clone(),
        config.frame_queue,
    );
    let mut endpoint = Endpoint::start(config.clone(), port)?;

    let packets = packetize(&data, config.packet_len);
    let total = packets.len();
    let start = Instant::now();

    for (i, packet) in packets.into_iter().enumerate() {
        endpoint.submit(packet).await?;
        if (i + 1) % 1000 == 0 {
            info!("Progress: {}/{} packets submitted", i + 1, total);
        }
    }

    info!("All packets submitted, waiting for acknowledgement...");
    endpoint.flush().await?;

    let elapsed = start.elapsed();
    let throughput = data.len() as f64 / elapsed.as_secs_f64() / 1_000_000.0;
    let stats = endpoint.stop().await?;

    info!("Transfer complete!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Packets: {}", total);
    info!("  Throughput: {:.2} MB/s", throughput);
    info!("  Retransmit ratio: {:.2}%", stats.retransmit_ratio() * 100.0);
    info!("  {}", stats.summary());

    Ok(())
}
