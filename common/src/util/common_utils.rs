use crate::util::date_util::now;
use hex::encode;
use md5::{Digest, Md5};
use rand::Rng;

/// pass id 中随机后缀的取值范围
const PASS_ID_SUFFIX_MIN: i64 = 1;
const PASS_ID_SUFFIX_MAX: i64 = 9999;

pub fn build_md5(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content);
    let result = hasher.finalize();
    encode(result)
}

/// 带混淆 key 的 md5，key 为空时等价于 [`build_md5`]
pub fn build_md5_with_key(content: &str, key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content);
    hasher.update(key);
    encode(hasher.finalize())
}

/// 闭区间 `[min, max]` 内的随机整数
pub fn rand_int(min: i64, max: i64) -> i64 {
    rand::rng().random_range(min..=max)
}

/// 生成 pass id：秒级时间戳 * 10000 + 随机后缀
pub fn build_pass_id() -> String {
    let id = now() * 10000 + rand_int(PASS_ID_SUFFIX_MIN, PASS_ID_SUFFIX_MAX);
    id.to_string()
}

pub fn is_empty_str(value: &str) -> bool {
    value.is_empty()
}

/// 是否等于该类型的零值
pub fn is_empty_value<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}
