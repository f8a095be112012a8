// ==========================================
// 生产订单追踪系统 - 应用状态
// ==========================================
// 职责: 组装仓储、引擎与 API,管理共享连接与配置快照
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{JobApi, JobDetail, ScanApi};
use crate::config::{ConfigManager, ConfigSnapshot, EngineConfig};
use crate::engine::{
    AuditTrailRecorder, CapabilityAuthorizer, Clock, JobStateMachine, OperatorActionHandler,
    OptionalEventPublisher, ScanIngestor, StationSequenceValidator, SystemClock,
};
use crate::poller::{JobSnapshotSource, PollUpdate, PollerHandle, ResilientPoller};
use crate::repository::{
    AuditEventRepository, JobRepository, ScanEventRepository, StationRepository,
};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 扫码API
    pub scan_api: Arc<ScanApi>,

    /// 工单API
    pub job_api: Arc<JobApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 工位/设备组仓储 (管理端维护拓扑)
    pub station_repo: Arc<StationRepository>,

    /// 当前配置快照
    pub config: Arc<ConfigSnapshot>,

    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// 创建新的AppState实例 (系统时钟,不发布事件)
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_options(db_path, Arc::new(SystemClock), OptionalEventPublisher::none())
    }

    /// 创建AppState实例
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开数据库并建表
    /// 2. 写入标准拓扑 (已有数据不覆盖)
    /// 3. 读取配置,构建配置快照
    /// 4. 组装引擎与 API
    pub fn with_options(
        db_path: String,
        clock: Arc<dyn Clock>,
        publisher: OptionalEventPublisher,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState,数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 仓储层
        // ==========================================
        let job_repo = Arc::new(JobRepository::new(conn.clone()));
        let scan_repo = Arc::new(ScanEventRepository::new(conn.clone()));
        let audit_repo = Arc::new(AuditEventRepository::new(conn.clone()));
        let station_repo = Arc::new(StationRepository::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn)
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 拓扑与配置
        // ==========================================
        let dwell_minutes = config_manager
            .get_default_dwell_minutes()
            .map_err(|e| format!("读取停留时间配置失败: {}", e))?;
        station_repo
            .seed_standard_topology(chrono::Duration::minutes(dwell_minutes))
            .map_err(|e| format!("写入标准拓扑失败: {}", e))?;
        let engine_config = config_manager
            .load_engine_config(&station_repo)
            .map_err(|e| format!("加载引擎配置失败: {}", e))?;
        log_config_summary(&engine_config);
        let config = Arc::new(ConfigSnapshot::new(engine_config));

        // ==========================================
        // 引擎层
        // ==========================================
        let recorder = Arc::new(AuditTrailRecorder::new(audit_repo));
        let state_machine = Arc::new(
            JobStateMachine::new(job_repo.clone(), recorder.clone(), clock.clone())
                .with_publisher(publisher),
        );
        let validator = StationSequenceValidator::new(scan_repo);
        let ingestor = Arc::new(ScanIngestor::new(
            state_machine.clone(),
            validator,
            clock.clone(),
        ));
        let operator_actions = Arc::new(OperatorActionHandler::new(
            state_machine.clone(),
            Arc::new(CapabilityAuthorizer),
        ));

        // ==========================================
        // API层
        // ==========================================
        let scan_api = Arc::new(ScanApi::new(ingestor, config.clone()));
        let job_api = Arc::new(JobApi::new(
            job_repo,
            state_machine,
            operator_actions,
            recorder,
            config.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            scan_api,
            job_api,
            config_manager,
            station_repo,
            config,
            clock,
        })
    }

    /// 重新加载配置
    ///
    /// 整体替换快照; 进行中的请求继续使用旧快照
    pub fn reload_config(&self) -> Result<(), String> {
        let engine_config = self
            .config_manager
            .load_engine_config(&self.station_repo)
            .map_err(|e| format!("加载引擎配置失败: {}", e))?;
        log_config_summary(&engine_config);
        self.config.replace(engine_config);
        Ok(())
    }

    /// 轮询单个工单详情
    ///
    /// 返回的句柄被丢弃或 stop() 后不再回调
    pub fn watch_job<F>(&self, job_id: &str, sink: F) -> anyhow::Result<PollerHandle<JobDetail>>
    where
        F: Fn(PollUpdate<JobDetail>) + Send + Sync + 'static,
    {
        let poller_config = self.config.current().poller;
        let source = JobSnapshotSource::new(self.job_api.clone(), job_id);
        ResilientPoller::start(source, poller_config, sink)
    }
}

fn log_config_summary(config: &EngineConfig) {
    tracing::info!(
        retry_count_max = config.retry_count_max,
        default_dwell_minutes = config.default_dwell.num_minutes(),
        lock_timeout_ms = config.lock_timeout.as_millis() as u64,
        poll_base_ms = config.poller.base_interval.as_millis() as u64,
        poll_max_ms = config.poller.max_interval.as_millis() as u64,
        device_groups = config.topology.device_groups().len(),
        "引擎配置已加载"
    );
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 ORDER_TRACKING_DB 指定的路径
/// - 否则: 用户数据目录/order-tracking/order_tracking.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("ORDER_TRACKING_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./order_tracking.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("order-tracking");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("order_tracking.db");
        }
    }

    path.to_string_lossy().to_string()
}
