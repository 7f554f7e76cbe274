//! 파이프라인 trait -- 알림 채널 확장 포인트 정의

use std::future::Future;
use std::pin::Pin;

/// `dyn` 호환 trait에서 사용하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 알림 채널 trait
///
/// 전송은 best-effort입니다. 구현체는 전송 실패를 스스로 로그로 남기고
/// 호출자에게 에러를 돌려주지 않습니다. 실행 루프는 알림 실패로 멈추지 않습니다.
///
/// # 구현 예시
/// ```ignore
/// struct StdoutNotifier;
///
/// impl Notifier for StdoutNotifier {
///     fn name(&self) -> &str { "stdout" }
///
///     async fn send_notification(&self, message: serde_json::Value, title: &str) {
///         println!("{title}: {message}");
///     }
/// }
/// ```
pub trait Notifier: Send + Sync {
    /// 채널 이름
    fn name(&self) -> &str;

    /// 알림을 전송합니다.
    fn send_notification(
        &self,
        message: serde_json::Value,
        title: &str,
    ) -> impl Future<Output = ()> + Send;
}

/// dyn-compatible 알림 채널 trait
///
/// `Notifier`는 RPITIT를 사용하므로 `dyn Notifier`가 불가합니다.
/// `DynNotifier`는 `BoxFuture`를 반환하여 `Arc<dyn DynNotifier>`로
/// 엔진과 파이프라인이 채널을 공유할 수 있게 합니다.
pub trait DynNotifier: Send + Sync {
    /// 채널 이름
    fn name(&self) -> &str;

    /// 알림을 전송합니다.
    fn send_notification<'a>(
        &'a self,
        message: serde_json::Value,
        title: &'a str,
    ) -> BoxFuture<'a, ()>;
}

/// Notifier를 구현한 타입은 자동으로 DynNotifier도 구현됩니다.
impl<T: Notifier> DynNotifier for T {
    fn name(&self) -> &str {
        Notifier::name(self)
    }

    fn send_notification<'a>(
        &'a self,
        message: serde_json::Value,
        title: &'a str,
    ) -> BoxFuture<'a, ()> {
        Box::pin(Notifier::send_notification(self, message, title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_notification(&self, _message: serde_json::Value, title: &str) {
            self.sent.lock().unwrap().push(title.to_owned());
        }
    }

    #[tokio::test]
    async fn dyn_notifier_forwards_to_notifier() {
        let inner = Arc::new(RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        });
        let notifier: Arc<dyn DynNotifier> = inner.clone();

        assert_eq!(notifier.name(), "recording");
        notifier
            .send_notification(serde_json::json!({"k": 1}), "Test Event")
            .await;

        assert_eq!(inner.sent.lock().unwrap().as_slice(), ["Test Event"]);
    }
}
