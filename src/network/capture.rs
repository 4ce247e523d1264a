use crate::core::error::{AppError, AppResult};
use crate::network::injection::PacketInjector;
use log::{debug, warn};
use pnet::datalink::{self, Channel, DataLinkReceiver, NetworkInterface};
use std::io;
use std::time::Duration;

/// 受信フレームの供給元
pub trait FrameSource {
    /// 読み取りタイムアウトの場合は `Ok(None)`
    fn next_frame(&mut self) -> io::Result<Option<&[u8]>>;
}

pub struct PacketCapture {
    rx: Box<dyn DataLinkReceiver>,
}

impl PacketCapture {
    pub fn new(rx: Box<dyn DataLinkReceiver>) -> Self {
        Self { rx }
    }
}

impl FrameSource for PacketCapture {
    fn next_frame(&mut self) -> io::Result<Option<&[u8]>> {
        match self.rx.next() {
            Ok(frame) => Ok(Some(frame)),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// インターフェースのデータリンクチャネルを開く
pub fn open_ethernet_channel(
    interface: &NetworkInterface,
    read_timeout: Duration,
) -> AppResult<(PacketInjector, PacketCapture)> {
    let config = datalink::Config {
        read_timeout: Some(read_timeout),
        ..Default::default()
    };

    match datalink::channel(interface, config) {
        Ok(Channel::Ethernet(tx, rx)) => Ok((PacketInjector::new(tx), PacketCapture::new(rx))),
        Ok(_) => Err(AppError::Capture(io::Error::new(
            io::ErrorKind::Other,
            "未サポートのチャネルタイプです",
        ))),
        Err(e) => Err(AppError::Capture(e)),
    }
}

/// `predicate` が値を返すフレームを最大 `max_attempts` 回まで待つ
///
/// 1回の読み取り (フレーム受信または読み取りタイムアウト) で1回分を消費する。
/// 見つからなければ `Ok(None)`。
pub fn receive_until<S, T, F>(source: &mut S, max_attempts: usize, mut predicate: F) -> AppResult<Option<T>>
where
    S: FrameSource + ?Sized,
    F: FnMut(&[u8]) -> Option<T>,
{
    for attempt in 1..=max_attempts {
        match source.next_frame()? {
            Some(frame) => {
                if let Some(found) = predicate(frame) {
                    debug!("{} 回目の受信で一致するフレームを受信しました", attempt);
                    return Ok(Some(found));
                }
            }
            None => debug!("読み取りタイムアウト ({}/{})", attempt, max_attempts),
        }
    }

    warn!("{} 回の受信で一致するフレームがありませんでした", max_attempts);
    Ok(None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// 用意したフレームを順に返し、尽きたらタイムアウトを返し続ける
    pub(crate) struct ScriptedSource {
        frames: VecDeque<io::Result<Option<Vec<u8>>>>,
        current: Vec<u8>,
        pub(crate) reads: usize,
    }

    impl ScriptedSource {
        pub(crate) fn new(frames: Vec<Vec<u8>>) -> Self {
            Self::with_events(frames.into_iter().map(|f| Ok(Some(f))).collect())
        }

        pub(crate) fn with_events(events: Vec<io::Result<Option<Vec<u8>>>>) -> Self {
            Self {
                frames: events.into(),
                current: Vec::new(),
                reads: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> io::Result<Option<&[u8]>> {
            self.reads += 1;
            match self.frames.pop_front() {
                Some(Ok(Some(frame))) => {
                    self.current = frame;
                    Ok(Some(self.current.as_slice()))
                }
                Some(Ok(None)) | None => Ok(None),
                Some(Err(e)) => Err(e),
            }
        }
    }

    #[test]
    fn test_receive_until_returns_first_match() {
        let mut source = ScriptedSource::new(vec![vec![1], vec![2, 2], vec![3, 3, 3], vec![2, 9]]);

        let found = receive_until(&mut source, 10, |frame| (frame[0] == 2).then(|| frame.len())).unwrap();
        assert_eq!(found, Some(2));
        assert_eq!(source.reads, 2);
    }

    #[test]
    fn test_receive_until_is_bounded() {
        // フレームが来なくても max_attempts 回で終了する
        let mut source = ScriptedSource::new(vec![]);

        let found: Option<()> = receive_until(&mut source, 5, |_| Some(())).unwrap();
        assert_eq!(found, None);
        assert_eq!(source.reads, 5);
    }

    #[test]
    fn test_receive_until_counts_non_matching_frames() {
        let mut source = ScriptedSource::new(vec![vec![0]; 8]);

        let found: Option<()> = receive_until(&mut source, 3, |_| None).unwrap();
        assert_eq!(found, None);
        assert_eq!(source.reads, 3);
    }

    #[test]
    fn test_receive_until_match_after_timeout() {
        let mut source = ScriptedSource::with_events(vec![Ok(None), Ok(None), Ok(Some(vec![7]))]);

        let found = receive_until(&mut source, 3, |frame| Some(frame[0])).unwrap();
        assert_eq!(found, Some(7));
    }

    #[test]
    fn test_receive_until_propagates_io_error() {
        let mut source = ScriptedSource::with_events(vec![Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))]);

        let result: AppResult<Option<()>> = receive_until(&mut source, 3, |_| Some(()));
        assert!(matches!(result, Err(AppError::Capture(_))));
    }

    #[test]
    fn test_receive_until_zero_attempts() {
        let mut source = ScriptedSource::new(vec![vec![1]]);

        let found: Option<()> = receive_until(&mut source, 0, |_| Some(())).unwrap();
        assert_eq!(found, None);
        assert_eq!(source.reads, 0);
    }
}
