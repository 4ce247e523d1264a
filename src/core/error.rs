use thiserror::Error;

/// パケットのデコード/エンコード/組み立てで発生するエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("{header}ヘッダーが不正です: {reason}")]
    Malformed {
        header: &'static str,
        reason: String,
    },

    #[error("未サポートのプロトコルです ({layer}: {value:#06x})")]
    UnsupportedProtocol {
        layer: &'static str,
        value: u16,
    },

    #[error("チェックサムが一致しません: 期待値 {expected:#06x}, 実際 {actual:#06x}")]
    ChecksumMismatch {
        expected: u16,
        actual: u16,
    },

    #[error("ペイロードが大きすぎます: {length} バイト (上限 {max} バイト)")]
    PayloadTooLarge {
        length: usize,
        max: usize,
    },
}

impl PacketError {
    pub(crate) fn truncated(header: &'static str, needed: usize, actual: usize) -> Self {
        PacketError::Malformed {
            header,
            reason: format!("{} バイト必要ですが {} バイトしかありません", needed, actual),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, PacketError::Malformed { .. })
    }
}

pub type PacketResult<T> = Result<T, PacketError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ロガーのセットアップに失敗しました: {0}")]
    Logger(String),

    #[error("デバイス選択エラー: {0}")]
    DeviceSelection(String),

    #[error("キャプチャエラー: {0}")]
    Capture(#[from] std::io::Error),

    #[error("パケット注入エラー: {0}")]
    Injection(String),

    #[error("ルールテーブルの読み込みに失敗しました: {0}")]
    RuleTable(String),

    #[error("パケット処理エラー: {0}")]
    Packet(#[from] PacketError),

    #[error("タスクの実行に失敗しました: {0}")]
    Task(String),
}

pub type AppResult<T> = Result<T, AppError>;
