use crate::protocol::account::{Response, ResponseSafe, SafeAccount};
use biz_service::entitys::user_profile_entity::UserProfile;
use common::errors::AppError;
use prost::Message;
use tonic::{Code, Status};

pub const CODE_SUCCESS: i32 = 200;
pub const CODE_INTERNAL_ERROR: i32 = 500;

pub fn code_string(code: i32) -> &'static str {
    match code {
        CODE_SUCCESS => "success",
        CODE_INTERNAL_ERROR => "internal error",
        _ => "unknown",
    }
}

/// 带 code / message 的响应体
pub trait Envelope: Message + Default {
    fn set_status(&mut self, code: i32, message: String);
}

impl Envelope for Response {
    fn set_status(&mut self, code: i32, message: String) {
        self.code = code;
        self.message = message;
    }
}

impl Envelope for ResponseSafe {
    fn set_status(&mut self, code: i32, message: String) {
        self.code = code;
        self.message = message;
    }
}

impl From<&UserProfile> for SafeAccount {
    fn from(user: &UserProfile) -> Self {
        SafeAccount {
            open_id: user.openid.clone(),
            pass_id: user.passid.clone(),
            phone: user.phone.unwrap_or_default(),
            ext: user.ext.clone(),
            avatar: user.avatar.clone(),
            nick_name: user.nick_name.clone(),
            email: user.email.clone().unwrap_or_default(),
        }
    }
}

pub fn result() -> Response {
    Response { code: CODE_SUCCESS, message: code_string(CODE_SUCCESS).to_string(), data: String::new() }
}

pub fn result_data(user: &UserProfile) -> ResponseSafe {
    ResponseSafe { code: CODE_SUCCESS, message: code_string(CODE_SUCCESS).to_string(), data: Some(user.into()) }
}

/// 错误统一转为 Aborted，响应体编码后放在 details 中供客户端解析
pub fn result_error<T: Envelope>(err: &AppError) -> Status {
    let message = err.to_string();
    let mut envelope = T::default();
    envelope.set_status(CODE_INTERNAL_ERROR, message.clone());
    Status::with_details(Code::Aborted, message, envelope.encode_to_vec().into())
}

/// 从错误状态中取回响应体
pub fn error_envelope<T: Envelope>(status: &Status) -> Option<T> {
    T::decode(status.details()).ok()
}
