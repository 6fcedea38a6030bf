//! 에러 타입 정의

use thiserror::Error;

/// SRL 링크 에러 타입
///
/// 프로토콜 이상(손상 프레임, 윈도우 밖 번호 등)은 로그로만 남기고
/// 여기로 올라오는 것은 디코딩 결과와 인터페이스 오용뿐이다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("프레임이 너무 짧음: {len} bytes (최소 {min})")]
    FrameTooShort { len: usize, min: usize },

    #[error("체크섬 불일치: {len} bytes 프레임")]
    ChecksumMismatch { len: usize },

    #[error("알 수 없는 프레임 종류: {kind}")]
    UnknownFrameKind { kind: u8 },

    #[error("페이로드 길이 불일치: expected {expected}, got {got}")]
    PayloadLength { expected: usize, got: usize },

    #[error("송신 윈도우 가득 참: outstanding={outstanding}")]
    WindowFull { outstanding: usize },

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("채널 에러")]
    ChannelError,

    #[error("연결 종료")]
    ConnectionClosed,
}

impl Error {
    /// 수신 프레임을 버려야 하는 손상 계열 에러인지
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Error::FrameTooShort { .. } | Error::ChecksumMismatch { .. } | Error::PayloadLength { .. }
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
