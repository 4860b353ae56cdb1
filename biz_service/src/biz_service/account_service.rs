use crate::entitys::user_profile_entity::UserProfile;
use common::errors::AppError;
use common::repository::db::{DbHandle, SqlVariant};
use common::util::common_utils::{build_pass_id, is_empty_str, is_empty_value};
use common::util::date_util::now;
use log::{info, warn};
use sqlx::{Any, AnyPool};
use std::sync::Arc;

pub const TABLE_NAME: &str = "user_profile";

const SELECT_COLUMNS: &str = "id, openid, passid, email, phone, password, update_time, nick_name, avatar, ext, active";

const MYSQL_SCHEMA: &[&str] = &["CREATE TABLE IF NOT EXISTS user_profile (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    openid VARCHAR(64) NOT NULL UNIQUE,
    passid VARCHAR(64) NOT NULL UNIQUE,
    email VARCHAR(255) NULL UNIQUE,
    phone BIGINT NULL UNIQUE,
    password VARCHAR(64) NOT NULL,
    update_time BIGINT NOT NULL,
    nick_name VARCHAR(128) NOT NULL DEFAULT '',
    avatar VARCHAR(512) NOT NULL DEFAULT '',
    ext TEXT NOT NULL,
    active BIGINT NOT NULL DEFAULT 1
)"];

const SQLITE_SCHEMA: &[&str] = &["CREATE TABLE IF NOT EXISTS user_profile (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    openid TEXT NOT NULL UNIQUE,
    passid TEXT NOT NULL UNIQUE,
    email TEXT UNIQUE,
    phone INTEGER UNIQUE,
    password TEXT NOT NULL,
    update_time INTEGER NOT NULL,
    nick_name TEXT NOT NULL DEFAULT '',
    avatar TEXT NOT NULL DEFAULT '',
    ext TEXT NOT NULL DEFAULT '',
    active INTEGER NOT NULL DEFAULT 1
)"];

/// `user_profile` 建表语句，供 [`common::repository::db::SqlHandleFactory::with_schema`] 使用
pub fn account_schema(variant: SqlVariant) -> &'static [&'static str] {
    match variant {
        SqlVariant::MySql => MYSQL_SCHEMA,
        SqlVariant::Sqlite => SQLITE_SCHEMA,
    }
}

/// 部分更新的字段，空字符串和 0 表示不修改
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    /// md5 后的密码
    pub password: String,
    pub email: String,
    pub nick_name: String,
    pub avatar: String,
    pub ext: String,
    pub phone: i64,
    /// true 时 active 置 0
    pub deactivate: bool,
}

enum FieldValue {
    Text(String),
    Int(i64),
}

impl UpdateProfile {
    fn changed_fields(&self) -> Vec<(&'static str, FieldValue)> {
        let mut fields = Vec::new();
        let texts = [
            ("password", &self.password),
            ("email", &self.email),
            ("nick_name", &self.nick_name),
            ("avatar", &self.avatar),
            ("ext", &self.ext),
        ];
        for (column, value) in texts {
            if !is_empty_value(value) {
                fields.push((column, FieldValue::Text(value.clone())));
            }
        }
        if self.phone > 0 {
            fields.push(("phone", FieldValue::Int(self.phone)));
        }
        fields
    }
}

/// 账号数据访问，持有某个环境的数据库句柄
#[derive(Debug, Clone)]
pub struct AccountService {
    handle: Arc<DbHandle>,
    allow_status_only_update: bool,
}

impl AccountService {
    pub fn new(handle: Arc<DbHandle>) -> Self {
        Self { handle, allow_status_only_update: false }
    }

    /// 允许只修改 active 状态的更新
    pub fn with_status_only_update(mut self, allow: bool) -> Self {
        self.allow_status_only_update = allow;
        self
    }

    pub fn env(&self) -> &str {
        &self.handle.env
    }

    fn conn(&self) -> Result<&AnyPool, AppError> {
        if !self.handle.is_usable() {
            return Err(AppError::Unavailable("get db connection fail".to_string()));
        }
        Ok(&self.handle.pool)
    }

    /// 写入新用户，服务端生成 passid 并同时作为 openid。密码需由调用方先做 md5。
    pub async fn insert_new_user(&self, user: &mut UserProfile) -> Result<(), AppError> {
        let conn = self.conn()?;
        let id = build_pass_id();
        user.passid = id.clone();
        user.openid = id;

        let sql = format!(
            "INSERT INTO {} (openid, passid, email, phone, password, update_time, nick_name, avatar, ext, active) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TABLE_NAME
        );
        sqlx::query::<Any>(&sql)
            .bind(user.openid.clone())
            .bind(user.passid.clone())
            .bind(user.email.clone())
            .bind(user.phone)
            .bind(user.password.clone())
            .bind(user.update_time)
            .bind(user.nick_name.clone())
            .bind(user.avatar.clone())
            .bind(user.ext.clone())
            .bind(user.active)
            .execute(conn)
            .await?;

        // AnyPool 下 SQLite 不回填 last_insert_id，按 passid 回查自增主键
        let sql = format!("SELECT id FROM {} WHERE passid = ?", TABLE_NAME);
        user.id = sqlx::query_scalar::<Any, i64>(&sql).bind(user.passid.clone()).fetch_one(conn).await?;
        info!("[{}] new user passid={} id={}", self.env(), user.passid, user.id);
        Ok(())
    }

    /// openid 非空时按 openid 查询，否则按 passid 查询
    pub async fn get_user_by_id(&self, pass_id: &str, open_id: &str) -> Result<UserProfile, AppError> {
        let conn = self.conn()?;
        let (column, value) = if !is_empty_str(open_id) {
            ("openid", open_id)
        } else if !is_empty_str(pass_id) {
            ("passid", pass_id)
        } else {
            return Err(AppError::Validation("empty passid".to_string()));
        };
        let sql = format!("SELECT {} FROM {} WHERE {} = ? LIMIT 1", SELECT_COLUMNS, TABLE_NAME, column);
        let user = sqlx::query_as::<Any, UserProfile>(&sql).bind(value.to_string()).fetch_optional(conn).await?;
        user.ok_or(AppError::NotFound)
    }

    pub async fn get_user_by_phone(&self, phone: i64) -> Result<UserProfile, AppError> {
        let conn = self.conn()?;
        if phone <= 0 {
            return Err(AppError::Validation("empty phone".to_string()));
        }
        let sql = format!("SELECT {} FROM {} WHERE phone = ? LIMIT 1", SELECT_COLUMNS, TABLE_NAME);
        let user = sqlx::query_as::<Any, UserProfile>(&sql).bind(phone).fetch_optional(conn).await?;
        user.ok_or(AppError::NotFound)
    }

    /// 只写入非空字段，同时刷新 active 与 update_time，返回受影响行数
    pub async fn update_user(&self, update: &UpdateProfile, pass_id: &str) -> Result<u64, AppError> {
        let mut fields = update.changed_fields();
        if fields.is_empty() {
            if !self.allow_status_only_update {
                return Err(AppError::Validation("no field to update".to_string()));
            }
            warn!("[{}] status only update for passid={}", self.env(), pass_id);
        }
        let active = if update.deactivate { 0 } else { 1 };
        fields.push(("active", FieldValue::Int(active)));
        fields.push(("update_time", FieldValue::Int(now())));

        let conn = self.conn()?;
        let assignments = fields.iter().map(|(column, _)| format!("{} = ?", column)).collect::<Vec<_>>().join(", ");
        let sql = format!("UPDATE {} SET {} WHERE passid = ?", TABLE_NAME, assignments);

        let mut query = sqlx::query::<Any>(&sql);
        for (_, value) in fields {
            query = match value {
                FieldValue::Text(s) => query.bind(s),
                FieldValue::Int(i) => query.bind(i),
            };
        }
        let res = query.bind(pass_id.to_string()).execute(conn).await?;
        Ok(res.rows_affected())
    }

    pub async fn check_user_login_by_phone(&self, phone: i64, password: &str) -> Result<UserProfile, AppError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM {} WHERE phone = ? AND password = ? LIMIT 1", SELECT_COLUMNS, TABLE_NAME);
        let user = sqlx::query_as::<Any, UserProfile>(&sql)
            .bind(phone)
            .bind(password.to_string())
            .fetch_optional(conn)
            .await?;
        user.ok_or(AppError::NotFound)
    }

    pub async fn check_user_login_by_email(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM {} WHERE email = ? AND password = ? LIMIT 1", SELECT_COLUMNS, TABLE_NAME);
        let user = sqlx::query_as::<Any, UserProfile>(&sql)
            .bind(email.to_string())
            .bind(password.to_string())
            .fetch_optional(conn)
            .await?;
        user.ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::config::DatabaseConfig;
    use common::repository::db::{HandleProvider, SqlHandleFactory};
    use common::util::common_utils::build_md5;
    use std::collections::HashMap;

    async fn service() -> AccountService {
        let mut databases = HashMap::new();
        databases.insert("test".to_string(), DatabaseConfig { url: "sqlite::memory:".into(), ..Default::default() });
        let provider = HandleProvider::new(SqlHandleFactory::new(databases).with_schema(account_schema));
        AccountService::new(provider.get("test").await.unwrap())
    }

    fn profile(email: &str, phone: i64, password: &str) -> UserProfile {
        UserProfile {
            email: Some(email.to_string()).filter(|e| !e.is_empty()),
            phone: Some(phone).filter(|p| *p > 0),
            password: build_md5(password),
            update_time: now(),
            nick_name: "tom".into(),
            active: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_assigns_same_pass_and_open_id() {
        let svc = service().await;
        let mut a = profile("a@b.com", 13512415778, "secret123");
        let mut b = profile("c@d.com", 0, "secret123");
        svc.insert_new_user(&mut a).await.unwrap();
        svc.insert_new_user(&mut b).await.unwrap();
        assert_eq!(a.passid, a.openid);
        assert_ne!(a.passid, b.passid);
        assert!(a.id > 0 && b.id > a.id);
    }

    #[tokio::test]
    async fn fetch_account_without_phone() {
        let svc = service().await;
        let mut a = profile("a@b.com", 0, "secret123");
        svc.insert_new_user(&mut a).await.unwrap();

        let found = svc.get_user_by_id(&a.passid, "").await.unwrap();
        assert_eq!(found.id, a.id);
        assert_eq!(found.email.as_deref(), Some("a@b.com"));
        assert_eq!(found.phone, None);
        let found = svc.check_user_login_by_email("a@b.com", &build_md5("secret123")).await.unwrap();
        assert_eq!(found.passid, a.passid);
    }

    #[tokio::test]
    async fn fetch_account_without_email() {
        let svc = service().await;
        let mut a = profile("", 13512415778, "x");
        svc.insert_new_user(&mut a).await.unwrap();
        let found = svc.get_user_by_phone(13512415778).await.unwrap();
        assert_eq!(found.email, None);
    }

    #[tokio::test]
    async fn wide_integers_are_not_truncated() {
        let svc = service().await;
        let phone = i32::MAX as i64 + 13512415778;
        let mut a = profile("", phone, "x");
        a.update_time = 4_102_444_800; // 2100-01-01
        svc.insert_new_user(&mut a).await.unwrap();

        let found = svc.get_user_by_id(&a.passid, "").await.unwrap();
        assert_eq!(found.phone, Some(phone));
        assert_eq!(found.update_time, 4_102_444_800);
        assert_eq!(svc.get_user_by_phone(phone).await.unwrap().passid, a.passid);
    }

    #[tokio::test]
    async fn update_ignores_negative_phone() {
        let svc = service().await;
        let mut a = profile("a@b.com", 13512415778, "x");
        svc.insert_new_user(&mut a).await.unwrap();

        let err = svc.update_user(&UpdateProfile { phone: -1, ..Default::default() }, &a.passid).await.unwrap_err();
        assert_eq!(err.to_string(), "no field to update");
        let update = UpdateProfile { phone: -1, nick_name: "jerry".into(), ..Default::default() };
        assert_eq!(svc.update_user(&update, &a.passid).await.unwrap(), 1);
        assert_eq!(svc.get_user_by_id(&a.passid, "").await.unwrap().phone, Some(13512415778));
    }

    #[tokio::test]
    async fn update_to_taken_email_is_conflict() {
        let svc = service().await;
        let mut a = profile("a@b.com", 0, "x");
        let mut b = profile("c@d.com", 0, "x");
        svc.insert_new_user(&mut a).await.unwrap();
        svc.insert_new_user(&mut b).await.unwrap();

        let update = UpdateProfile { email: "a@b.com".into(), ..Default::default() };
        let err = svc.update_user(&update, &b.passid).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
        assert_eq!(svc.get_user_by_id(&b.passid, "").await.unwrap().email.as_deref(), Some("c@d.com"));
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let svc = service().await;
        svc.insert_new_user(&mut profile("a@b.com", 0, "x")).await.unwrap();
        let err = svc.insert_new_user(&mut profile("a@b.com", 0, "y")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn absent_email_and_phone_do_not_collide() {
        let svc = service().await;
        svc.insert_new_user(&mut profile("", 0, "x")).await.unwrap();
        svc.insert_new_user(&mut profile("", 0, "y")).await.unwrap();
    }

    #[tokio::test]
    async fn get_by_id_prefers_open_id() {
        let svc = service().await;
        let mut a = profile("a@b.com", 0, "x");
        let mut b = profile("c@d.com", 0, "x");
        svc.insert_new_user(&mut a).await.unwrap();
        svc.insert_new_user(&mut b).await.unwrap();

        let found = svc.get_user_by_id(&a.passid, &b.openid).await.unwrap();
        assert_eq!(found.passid, b.passid);
        let found = svc.get_user_by_id(&a.passid, "").await.unwrap();
        assert_eq!(found.email.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn get_by_id_errors() {
        let svc = service().await;
        let err = svc.get_user_by_id("", "").await.unwrap_err();
        assert_eq!(err.to_string(), "empty passid");
        let err = svc.get_user_by_id("P1", "").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn get_by_phone() {
        let svc = service().await;
        let mut a = profile("a@b.com", 13512415778, "x");
        svc.insert_new_user(&mut a).await.unwrap();
        assert_eq!(svc.get_user_by_phone(13512415778).await.unwrap().passid, a.passid);
        assert_eq!(svc.get_user_by_phone(0).await.unwrap_err().to_string(), "empty phone");
        assert_eq!(svc.get_user_by_phone(-5).await.unwrap_err().to_string(), "empty phone");
        assert!(matches!(svc.get_user_by_phone(1).await.unwrap_err(), AppError::NotFound));
    }

    #[tokio::test]
    async fn update_without_fields_is_rejected() {
        let svc = service().await;
        let err = svc.update_user(&UpdateProfile::default(), "P1").await.unwrap_err();
        assert_eq!(err.to_string(), "no field to update");
        let err = svc.update_user(&UpdateProfile { deactivate: true, ..Default::default() }, "P1").await.unwrap_err();
        assert_eq!(err.to_string(), "no field to update");
    }

    #[tokio::test]
    async fn status_only_update_when_allowed() {
        let svc = service().await.with_status_only_update(true);
        let mut a = profile("a@b.com", 0, "x");
        svc.insert_new_user(&mut a).await.unwrap();
        let rows = svc.update_user(&UpdateProfile { deactivate: true, ..Default::default() }, &a.passid).await.unwrap();
        assert_eq!(rows, 1);
        assert_eq!(svc.get_user_by_id(&a.passid, "").await.unwrap().active, 0);
    }

    #[tokio::test]
    async fn update_writes_only_supplied_fields() {
        let svc = service().await;
        let mut a = profile("a@b.com", 13512415778, "x");
        svc.insert_new_user(&mut a).await.unwrap();

        let update = UpdateProfile { nick_name: "jerry".into(), ext: "{\"vip\":1}".into(), ..Default::default() };
        assert_eq!(svc.update_user(&update, &a.passid).await.unwrap(), 1);

        let found = svc.get_user_by_id(&a.passid, "").await.unwrap();
        assert_eq!(found.nick_name, "jerry");
        assert_eq!(found.ext, "{\"vip\":1}");
        assert_eq!(found.email.as_deref(), Some("a@b.com"));
        assert_eq!(found.phone, Some(13512415778));
        assert_eq!(found.password, build_md5("x"));
        assert_eq!(found.active, 1);
        assert!(found.update_time >= a.update_time);

        let deactivate = UpdateProfile { avatar: "a.png".into(), deactivate: true, ..Default::default() };
        svc.update_user(&deactivate, &a.passid).await.unwrap();
        assert_eq!(svc.get_user_by_id(&a.passid, "").await.unwrap().active, 0);
    }

    #[tokio::test]
    async fn update_unknown_pass_id_affects_nothing() {
        let svc = service().await;
        let update = UpdateProfile { nick_name: "jerry".into(), ..Default::default() };
        assert_eq!(svc.update_user(&update, "P1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn login_does_not_leak_which_field_was_wrong() {
        let svc = service().await;
        svc.insert_new_user(&mut profile("a@b.com", 13512415778, "secret123")).await.unwrap();
        let hash = build_md5("secret123");

        assert_eq!(svc.check_user_login_by_email("a@b.com", &hash).await.unwrap().phone, Some(13512415778));
        assert_eq!(svc.check_user_login_by_phone(13512415778, &hash).await.unwrap().email.as_deref(), Some("a@b.com"));

        let wrong_email = svc.check_user_login_by_email("x@b.com", &hash).await.unwrap_err();
        let wrong_password = svc.check_user_login_by_email("a@b.com", &build_md5("nope")).await.unwrap_err();
        assert!(matches!(wrong_email, AppError::NotFound));
        assert_eq!(wrong_email.to_string(), wrong_password.to_string());
        assert!(matches!(svc.check_user_login_by_phone(1, &hash).await.unwrap_err(), AppError::NotFound));
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable() {
        let svc = service().await;
        svc.handle.pool.close().await;
        let err = svc.get_user_by_phone(1).await.unwrap_err();
        assert_eq!(err.to_string(), "get db connection fail");
    }
}
