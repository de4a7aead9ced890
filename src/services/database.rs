use crate::config::Config;
use crate::error::Result;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::{error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // 内存数据库每个连接都是独立的库，只能保留一个连接
        let in_memory = config.database_url.contains(":memory:")
            || config.database_url.contains("mode=memory");
        let max_connections = if in_memory {
            1
        } else {
            config.database_max_connections.max(1)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(if in_memory { 1 } else { 0 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(e.into())
            }
        }
    }

    /// 执行内嵌的迁移脚本
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 开始事务
    ///
    /// 返回的事务在 drop 时自动回滚，只有显式 `commit` 才会生效。
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }
}

/// 分页请求，由 `?page=` 参数和结果总数解析而来
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
}

impl PageRequest {
    /// 非整数或缺省 → 第 1 页；越界（小于 1 或超过最后一页）→ 最后一页
    pub fn resolve(raw: Option<&str>, total: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let num_pages = ((total + per_page - 1) / per_page).max(1);

        let number = match raw.map(str::trim).map(str::parse::<i64>) {
            None | Some(Err(_)) => 1,
            Some(Ok(n)) if n < 1 || n as usize > num_pages => num_pages,
            Some(Ok(n)) => n as usize,
        };

        Self {
            number,
            num_pages,
            per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.number - 1) * self.per_page) as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// 分页结果结构
#[derive(Debug, Serialize, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub per_page: usize,
    pub total: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
    pub page_range: Vec<usize>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: usize) -> Self {
        let number = request.number;
        Self {
            items,
            number,
            num_pages: request.num_pages,
            per_page: request.per_page,
            total,
            has_previous: number > 1,
            has_next: number < request.num_pages,
            previous_page_number: (number > 1).then(|| number - 1),
            next_page_number: (number < request.num_pages).then(|| number + 1),
            page_range: (1..=request.num_pages).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_database_connection() {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            ..Config::default()
        };
        let db = Database::new(&config).await.unwrap();
        assert!(db.verify_connection().await.is_ok());
        assert!(db.migrate().await.is_ok());
    }

    #[test]
    fn test_page_request_defaults_to_first_page() {
        assert_eq!(PageRequest::resolve(None, 13, 10).number, 1);
        assert_eq!(PageRequest::resolve(Some("abc"), 13, 10).number, 1);
        assert_eq!(PageRequest::resolve(Some(""), 13, 10).number, 1);
    }

    #[test]
    fn test_page_request_out_of_range_goes_to_last_page() {
        assert_eq!(PageRequest::resolve(Some("99"), 13, 10).number, 2);
        assert_eq!(PageRequest::resolve(Some("0"), 13, 10).number, 2);
        assert_eq!(PageRequest::resolve(Some("-3"), 13, 10).number, 2);
    }

    #[test]
    fn test_empty_result_is_single_empty_page() {
        let request = PageRequest::resolve(Some("5"), 0, 10);
        assert_eq!(request.number, 1);
        assert_eq!(request.num_pages, 1);

        let page: Page<i64> = Page::new(vec![], request, 0);
        assert!(page.is_empty());
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_page_navigation_flags() {
        let request = PageRequest::resolve(Some("2"), 25, 10);
        let page = Page::new(vec![0; 10], request, 25);
        assert_eq!(page.previous_page_number, Some(1));
        assert_eq!(page.next_page_number, Some(3));
        assert_eq!(page.page_range, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn pages_partition_the_result_set(total in 0usize..500, per_page in 1usize..30) {
            let first = PageRequest::resolve(None, total, per_page);
            let mut seen = 0usize;
            for number in 1..=first.num_pages {
                let request = PageRequest::resolve(Some(&number.to_string()), total, per_page);
                prop_assert_eq!(request.number, number);
                let remaining = total.saturating_sub(request.offset() as usize);
                let size = remaining.min(request.limit() as usize);
                prop_assert!(size <= per_page);
                seen += size;
            }
            prop_assert_eq!(seen, total);
        }
    }
}
