use crate::config::DatabaseConfig;
use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use log::{error, info, warn};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// 按环境名创建数据库句柄
#[async_trait]
pub trait HandleFactory: Send + Sync {
    type Handle: Send + Sync;

    async fn connect(&self, env: &str) -> Result<Self::Handle>;
}

/// 每个环境一个句柄，首次使用时创建，之后整个进程生命周期内复用。
///
/// 读路径无锁（`ArcSwap` 快照），创建路径由一把互斥锁串行化并二次检查，
/// 保证并发首次访问时只创建一次。创建失败不缓存，下次调用会重试。
pub struct HandleProvider<F: HandleFactory> {
    factory: F,
    handles: ArcSwap<HashMap<String, Arc<F::Handle>>>,
    init_lock: Mutex<()>,
}

impl<F: HandleFactory> HandleProvider<F> {
    pub fn new(factory: F) -> Self {
        Self { factory, handles: ArcSwap::from_pointee(HashMap::new()), init_lock: Mutex::new(()) }
    }

    pub async fn get(&self, env: &str) -> Option<Arc<F::Handle>> {
        if let Some(handle) = self.handles.load().get(env) {
            return Some(handle.clone());
        }

        let _guard = self.init_lock.lock().await;
        // 等锁期间可能已被其他任务创建
        if let Some(handle) = self.handles.load().get(env) {
            return Some(handle.clone());
        }

        match self.factory.connect(env).await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                let mut next = (**self.handles.load()).clone();
                next.insert(env.to_string(), handle.clone());
                self.handles.store(Arc::new(next));
                info!("db handle for env [{}] initialized", env);
                Some(handle)
            }
            Err(e) => {
                error!("db handle for env [{}] init failed: {:?}", env, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlVariant {
    MySql,
    Sqlite,
}

impl SqlVariant {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("mysql") {
            Ok(SqlVariant::MySql)
        } else if url.starts_with("sqlite") {
            Ok(SqlVariant::Sqlite)
        } else {
            Err(anyhow!("unsupported database url: {}", url))
        }
    }
}

/// 单个环境的数据库连接池
#[derive(Debug)]
pub struct DbHandle {
    pub env: String,
    pub variant: SqlVariant,
    pub pool: AnyPool,
}

impl DbHandle {
    /// 连接池是否仍可用
    pub fn is_usable(&self) -> bool {
        !self.pool.is_closed()
    }
}

/// 建表语句，按方言区分
pub type SchemaFn = fn(SqlVariant) -> &'static [&'static str];

pub struct SqlHandleFactory {
    databases: HashMap<String, DatabaseConfig>,
    schema: Option<SchemaFn>,
}

impl SqlHandleFactory {
    pub fn new(databases: HashMap<String, DatabaseConfig>) -> Self {
        Self { databases, schema: None }
    }

    /// 连接建立后执行的建表语句
    pub fn with_schema(mut self, schema: SchemaFn) -> Self {
        self.schema = Some(schema);
        self
    }

    fn pool_options(config: &DatabaseConfig) -> AnyPoolOptions {
        let mut opts = AnyPoolOptions::new();
        if let Some(max_connections) = config.max_connections {
            opts = opts.max_connections(max_connections);
        }
        if let Some(min_connections) = config.min_connections {
            opts = opts.min_connections(min_connections);
        }
        if let Some(secs) = config.connect_timeout_secs {
            opts = opts.acquire_timeout(Duration::from_secs(secs));
        }
        // 内存库每个连接都是独立的数据库，只能保留唯一且常驻的连接
        if config.url.contains(":memory:") {
            opts = opts.max_connections(1).min_connections(1).idle_timeout(None).max_lifetime(None);
        }
        opts
    }
}

#[async_trait]
impl HandleFactory for SqlHandleFactory {
    type Handle = DbHandle;

    async fn connect(&self, env: &str) -> Result<DbHandle> {
        let config = self.databases.get(env).ok_or_else(|| anyhow!("no database config for env [{}]", env))?;
        if config.url.is_empty() {
            return Err(anyhow!("empty database url for env [{}]", env));
        }
        let variant = SqlVariant::from_url(&config.url)?;

        sqlx::any::install_default_drivers();
        let pool = Self::pool_options(config)
            .connect(&config.url)
            .await
            .map_err(|e| anyhow!("connect [{}] error: {}", env, e))?;

        if let Some(schema) = self.schema {
            for stmt in schema(variant) {
                sqlx::query(stmt).execute(&pool).await.map_err(|e| anyhow!("init schema error: {}", e))?;
            }
        } else {
            warn!("no schema registered for env [{}]", env);
        }
        Ok(DbHandle { env: env.to_string(), variant, pool })
    }
}
