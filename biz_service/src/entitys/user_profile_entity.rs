use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户账号信息，对应 `user_profile` 表
#[derive(Debug, Clone, Serialize, Deserialize, Default, FromRow)]
pub struct UserProfile {
    /// 自增主键
    pub id: i64,
    /// 对外展示 ID，创建时与 passid 相同
    pub openid: String,
    /// 业务唯一 ID
    pub passid: String,
    /// 邮箱，未填写时为 NULL
    pub email: Option<String>,
    /// 手机号，未填写时为 NULL
    pub phone: Option<i64>,
    /// md5 后的密码，不参与序列化输出
    #[serde(skip_serializing, default)]
    pub password: String,
    /// 最后更新时间（Unix 时间戳，秒）
    pub update_time: i64,
    pub nick_name: String,
    pub avatar: String,
    pub ext: String,
    /// 1=启用 0=停用
    pub active: i64,
}
