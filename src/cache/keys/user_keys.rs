/// 用户资料持久层键前缀
const PROFILE_PREFIX: &str = "user_";

/// 生成用户资料持久层键
pub fn profile_key(identity_id: &str) -> String {
    format!("{}{}", PROFILE_PREFIX, identity_id)
}
