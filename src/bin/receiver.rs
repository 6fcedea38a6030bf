//! SRL 수신기 - Selective Repeat Link 파일 수신
//!
//! 첫 패킷의 파일 길이만큼 데이터를 모아 저장한 뒤, 마지막 ACK 이 유실됐을 때
//! 들어오는 재전송에 답하기 위해 잠시 링크를 유지한다.
//!
//! 사용법:
//!   cargo run --release --bin srlink-recv -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin srlink-recv -- --bind 127.0.0.1:9002 --peer 127.0.0.1:9001 --output received.bin

use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use srlink::{udp_port, ChannelConfig, Config, Endpoint};

/// 수신기 설정
struct RecvConfig {
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
    output_path: Option<PathBuf>,
    channel: ChannelConfig,
    config: Config,
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            peer_addr: SocketAddr::from(([127, 0, 0, 1], 9001)),
            output_path: None,
            channel: ChannelConfig::transparent(),
            config: Config::default(),
        }
    }
}

fn parse_args() -> Result<RecvConfig, Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RecvConfig::default();

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
            ("--output" | "-o", Some(v)) => {
                config.output_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--loss", Some(v)) => {
                config.channel.loss_rate = v.parse()?;
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
                    r#"SRL Receiver - Selective Repeat Link 수신기

송신기가 보낸 파일을 순서대로 받아 저장
- 누락 프레임은 NAK 으로 즉시 요청
- 보낼 데이터가 없으므로 ACK 은 지연 타이머로 단독 전송

사용법:
  cargo run --release --bin srlink-recv -- [OPTIONS]

옵션:
  -b, --bind <ADDR>       로컬 바인드 주소 (기본: 0.0.0.0:9002)
  -p, --peer <ADDR>       송신기 주소 (기본: 127.0.0.1:9001)
  -o, --output <PATH>     수신 데이터 저장 경로
  --loss <RATE>           송신(ACK/NAK) 프레임 손실 확률 (0.0 ~ 1.0)
  --seed <N>              장애 주입 RNG 시드
  --packet-len <BYTES>    패킷 길이 (기본: 256, 송신기와 같아야 함)
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

/// 미리 잡아둘 수신 버퍼 상한 (이후는 받으면서 늘린다)
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// 첫 패킷에서 (파일 길이, 데이터 패킷 수) 계산
///
/// 길이는 상대가 보낸 값이므로 패딩 포함 크기가 usize 를 넘으면 거부한다.
fn file_layout(header: &[u8], packet_len: usize) -> Result<(usize, usize), Box<dyn Error>> {
    let size_bytes: [u8; 8] = header
        .get(..8)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or("길이 패킷이 8바이트보다 짧습니다")?;
    let total_size = usize::try_from(u64::from_le_bytes(size_bytes))
        .map_err(|_| "파일 길이가 너무 큽니다")?;
    let expected_packets = total_size.div_ceil(packet_len);
    expected_packets
        .checked_mul(packet_len)
        .ok_or("파일 길이가 너무 큽니다")?;
    Ok((total_size, expected_packets))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let recv_config = parse_args()?;
    let config = recv_config.config.clone();
    config.validate()?;
    if config.packet_len < 8 {
        return Err("packet_len 은 파일 길이(8바이트)를 담을 수 있어야 합니다".into());
    }

    info!("SRL Receiver starting...");
    info!("Bind address: {}", recv_config.bind_addr);
    info!("Peer address: {}", recv_config.peer_addr);
    info!("Packet length: {} bytes", config.packet_len);

    let socket = UdpSocket::bind(recv_config.bind_addr).await?;
    let port = udp_port(
        socket,
        recv_config.peer_addr,
        recv_config.channel.clone(),
        config.frame_queue,
    );
    let mut endpoint = Endpoint::start(config.clone(), port)?;

    info!("Waiting for data...");
    let header = endpoint.recv().await.ok_or("링크가 종료되었습니다")?;
    let (total_size, expected_packets) = file_layout(&header, config.packet_len)?;
    info!(
        "File size: {} bytes ({} packets)",
        total_size, expected_packets
    );

    let start = Instant::now();
    let mut data = Vec::with_capacity(total_size.min(MAX_PREALLOC));
    for i in 0..expected_packets {
        let packet = endpoint.recv().await.ok_or("링크가 종료되었습니다")?;
        data.extend_from_slice(&packet);
        if (i + 1) % 1000 == 0 {
            info!("Progress: {}/{} packets", i + 1, expected_packets);
        }
    }
    data.truncate(total_size);

    let elapsed = start.elapsed();
    let throughput = total_size as f64 / elapsed.as_secs_f64().max(1e-9) / 1_000_000.0;
    info!("Receive complete!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Throughput: {:.2} MB/s", throughput);

    if let Some(path) = &recv_config.output_path {
        tokio::fs::write(path, &data).await?;
        info!("Saved to {:?}", path);
    } else {
        warn!("No --output given, discarding {} bytes", data.len());
    }

    // 마지막 ACK 유실에 대비해 재전송 타이머 두 번만큼 유지
    let linger = config.data_timeout() * 2;
    info!("Lingering {:?} for late retransmissions...", linger);
    tokio::time::sleep(linger.max(Duration::from_millis(100))).await;

    let stats = endpoint.stop().await?;
    info!("  {}", stats.summary());

    Ok(())
}
