use std::time::Duration;

/// 同步引擎配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | SYNC_API_URL | http://localhost:3000/api | REST 基础地址 |
/// | SYNC_WS_URL | 由 API 地址推导 (`http→ws` + `/realtime`) | 实时通道地址 |
/// | REQUEST_TIMEOUT_MS | 15000 | REST 请求超时(毫秒) |
/// | RECONNECT_FLOOR_MS | 1000 | 重连退避下限(毫秒) |
/// | RECONNECT_CEILING_MS | 5000 | 重连退避上限(毫秒) |
/// | HEARTBEAT_INTERVAL_MS | 25000 | 心跳间隔(毫秒)，0 表示关闭 |
/// | HEARTBEAT_TIMEOUT_MS | 5000 | 心跳超时宽限(毫秒) |
/// | VIEW_FETCH_LIMIT | 100 | 视图查询默认 limit |
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// REST 基础地址
    pub api_url: String,
    /// 实时通道地址
    pub ws_url: String,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    pub reconnect_floor_ms: u64,
    pub reconnect_ceiling_ms: u64,
    /// 心跳间隔 (毫秒)，0 表示关闭
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// 视图查询默认条数
    pub view_fetch_limit: u32,
}

/// Channel URL for a REST base: scheme swapped to ws(s), `/realtime` appended
pub fn derive_ws_url(api_url: &str) -> String {
    let ws = api_url
        .replace("https://", "wss://")
        .replace("http://", "ws://");
    format!("{}/realtime", ws.trim_end_matches('/'))
}

impl SyncConfig {
    /// 使用默认值创建配置
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            ws_url: derive_ws_url(&api_url),
            api_url,
            request_timeout_ms: 15000,
            reconnect_floor_ms: 1000,
            reconnect_ceiling_ms: 5000,
            heartbeat_interval_ms: 25000,
            heartbeat_timeout_ms: 5000,
            view_fetch_limit: 100,
        }
    }

    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("SYNC_API_URL").unwrap_or_else(|_| "http://localhost:3000/api".into());
        let defaults = Self::new(api_url);

        Self {
            ws_url: std::env::var("SYNC_WS_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.ws_url),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            reconnect_floor_ms: std::env::var("RECONNECT_FLOOR_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.reconnect_floor_ms),
            reconnect_ceiling_ms: std::env::var("RECONNECT_CEILING_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.reconnect_ceiling_ms),
            heartbeat_interval_ms: std::env::var("HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.heartbeat_interval_ms),
            heartbeat_timeout_ms: std::env::var("HEARTBEAT_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.heartbeat_timeout_ms),
            view_fetch_limit: std::env::var("VIEW_FETCH_LIMIT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.view_fetch_limit),
            api_url: defaults.api_url,
        }
    }

    /// Set the channel URL explicitly
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    /// Set the reconnect backoff bounds
    pub fn with_reconnect_bounds(mut self, floor_ms: u64, ceiling_ms: u64) -> Self {
        self.reconnect_floor_ms = floor_ms;
        self.reconnect_ceiling_ms = ceiling_ms.max(floor_ms);
        self
    }

    /// Set heartbeat timing (interval 0 disables)
    pub fn with_heartbeat(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self.heartbeat_timeout_ms = timeout_ms;
        self
    }

    pub fn with_view_fetch_limit(mut self, limit: u32) -> Self {
        self.view_fetch_limit = limit;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_floor(&self) -> Duration {
        Duration::from_millis(self.reconnect_floor_ms)
    }

    pub fn reconnect_ceiling(&self) -> Duration {
        Duration::from_millis(self.reconnect_ceiling_ms)
    }

    /// `None` when heartbeats are disabled
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
