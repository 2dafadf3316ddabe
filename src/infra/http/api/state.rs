use std::sync::Arc;

use crate::application::banners::BannerService;
use crate::config::AuthSettings;

#[derive(Clone)]
pub struct ApiState {
    pub banners: Arc<BannerService>,
    pub auth: Arc<AuthSettings>,
}

impl ApiState {
    pub fn new(banners: Arc<BannerService>, auth: AuthSettings) -> Self {
        Self {
            banners,
            auth: Arc::new(auth),
        }
    }
}
