use crate::core::error::{AppError, AppResult};
use pnet::datalink::DataLinkSender;

/// 組み立て済みフレームの送信先
pub trait FrameSink {
    fn send_frame(&mut self, frame: &[u8]) -> AppResult<()>;
}

pub struct PacketInjector {
    tx: Box<dyn DataLinkSender>,
}

impl PacketInjector {
    pub fn new(tx: Box<dyn DataLinkSender>) -> Self {
        Self { tx }
    }
}

impl FrameSink for PacketInjector {
    fn send_frame(&mut self, frame: &[u8]) -> AppResult<()> {
        match self.tx.send_to(frame, None) {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(AppError::Injection(format!("パケットの送信に失敗しました: {}", e))),
            None => Err(AppError::Injection("パケットの送信に失敗しました".to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 送信したフレームを記録する
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub(crate) sent: Vec<Vec<u8>>,
        pub(crate) fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&mut self, frame: &[u8]) -> AppResult<()> {
            if self.fail {
                return Err(AppError::Injection("送信できません".to_string()));
            }
            self.sent.push(frame.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::default();
        sink.send_frame(&[1, 2, 3]).unwrap();
        assert_eq!(sink.sent, vec![vec![1, 2, 3]]);

        sink.fail = true;
        assert!(matches!(sink.send_frame(&[4]), Err(AppError::Injection(_))));
    }
}
