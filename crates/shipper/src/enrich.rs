//! 역방향 DNS 보강
//!
//! 알림의 `src`/`dest`를 `"<ip> - <hostname>"` 형식으로 바꿉니다.
//! PTR 레코드가 없거나 조회가 제한 시간을 넘기면 `"<ip> - unknown"`입니다.
//! IP가 아닌 값은 그대로 둡니다.
//!
//! 두 주소는 동시에 조회하므로 알림 한 건의 지연은 제한 시간 한 번을 넘지 않습니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::TokioResolver;
use tokio::time::timeout;

use alertrelay_core::pipeline::BoxFuture;
use alertrelay_core::types::NormalizedAlert;

use crate::error::ShipperError;

/// 이름을 찾지 못했을 때 붙이는 표기
const UNKNOWN_HOST: &str = "unknown";

/// 호스트 이름 조회 trait
pub trait HostnameResolver: Send + Sync {
    /// IP의 PTR 이름을 조회합니다. 없으면 `None`입니다.
    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>>;
}

/// 시스템 DNS 설정(`/etc/resolv.conf`)을 쓰는 비동기 리졸버
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl DnsResolver {
    /// 시스템 설정으로 리졸버를 생성합니다.
    ///
    /// # Errors
    ///
    /// 시스템 DNS 설정을 읽지 못하면 [`ShipperError::Resolver`]를 반환합니다.
    pub fn system() -> Result<Self, ShipperError> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ShipperError::Resolver(e.to_string()))?
            .build();
        Ok(Self { resolver })
    }
}

impl HostnameResolver for DnsResolver {
    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Option<String>> {
        Box::pin(async move {
            match self.resolver.reverse_lookup(ip).await {
                Ok(names) => names
                    .iter()
                    .next()
                    .map(|ptr| ptr.to_string().trim_end_matches('.').to_owned())
                    .filter(|name| !name.is_empty()),
                Err(e) => {
                    tracing::debug!(ip = %ip, error = %e, "reverse dns lookup failed");
                    None
                }
            }
        })
    }
}

/// 역방향 DNS 보강기
#[derive(Clone)]
pub struct ReverseDnsEnricher {
    resolver: Arc<dyn HostnameResolver>,
    timeout: Duration,
}

impl ReverseDnsEnricher {
    /// 주어진 리졸버와 조회당 제한 시간으로 보강기를 생성합니다.
    pub fn new(resolver: Arc<dyn HostnameResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// 시스템 DNS 설정을 쓰는 보강기를 생성합니다.
    ///
    /// # Errors
    ///
    /// 리졸버 구성에 실패하면 [`ShipperError::Resolver`]를 반환합니다.
    pub fn system(timeout: Duration) -> Result<Self, ShipperError> {
        Ok(Self::new(Arc::new(DnsResolver::system()?), timeout))
    }

    /// 알림의 `src`와 `dest`를 제자리에서 보강합니다.
    pub async fn enrich(&self, alert: &mut NormalizedAlert) {
        let (src, dest) = tokio::join!(self.describe(&alert.src), self.describe(&alert.dest));
        alert.src = src;
        alert.dest = dest;
    }

    async fn describe(&self, addr: &str) -> String {
        let Ok(ip) = addr.parse::<IpAddr>() else {
            return addr.to_owned();
        };

        let name = match timeout(self.timeout, self.resolver.lookup(ip)).await {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(
                    ip = %ip,
                    timeout_secs = self.timeout.as_secs(),
                    "reverse dns lookup timeout"
                );
                None
            }
        };

        format!("{addr} - {}", name.as_deref().unwrap_or(UNKNOWN_HOST))
    }
}
