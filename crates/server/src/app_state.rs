use bff_api::BffContext;
use upstream_client::UpstreamClient;

use crate::proxy::ProxyTarget;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) bff: BffContext,
    pub(crate) proxy: ProxyTarget,
    pub(crate) max_body_bytes: usize,
}

impl AppState {
    pub(crate) fn new(upstream: UpstreamClient, max_body_bytes: usize) -> Self {
        Self {
            proxy: ProxyTarget::new(&upstream),
            bff: BffContext::new(upstream),
            max_body_bytes,
        }
    }
}
