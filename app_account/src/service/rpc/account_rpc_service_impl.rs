use crate::protocol::account::account_rpc_service_server::AccountRpcService;
use crate::protocol::account::{Request as AccountRequest, RequestLogin, RequestQuery, Response as AccountResponse, ResponseSafe};
use crate::result::{CODE_SUCCESS, Envelope, result, result_data, result_error};
use biz_service::biz_service::account_service::{AccountService, UpdateProfile, account_schema};
use biz_service::entitys::user_profile_entity::UserProfile;
use common::config::AppConfig;
use common::errors::AppError;
use common::repository::db::{HandleProvider, SqlHandleFactory};
use common::util::common_utils::{build_md5_with_key, is_empty_str};
use common::util::date_util::now;
use futures::FutureExt;
use log::{info, warn};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

pub type AccountHandleProvider = HandleProvider<SqlHandleFactory>;

/// 日志中屏蔽明文密码
fn mask(password: &str) -> &'static str {
    if password.is_empty() { "" } else { "***" }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 执行单个请求：捕获 panic，错误统一转换为响应体，并记录耗时
async fn dispatch<T, F>(method: &'static str, handler: F) -> Result<Response<T>, Status>
where
    T: Envelope,
    F: Future<Output = Result<T, AppError>>,
{
    let start = Instant::now();
    let result = match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(AppError::Internal(panic_message(panic))),
    };
    let reply = match result {
        Ok(envelope) => Ok(Response::new(envelope)),
        Err(e) => {
            warn!("{} failed: {}", method, e);
            Err(result_error::<T>(&e))
        }
    };
    info!("end request method={} request_time/ms={}", method, start.elapsed().as_millis());
    reply
}

/// AccountRpcService 实现体，持有句柄提供者，按当前环境取得数据访问服务
#[derive(Clone)]
pub struct AccountRpcServiceImpl {
    provider: Arc<AccountHandleProvider>,
    env: String,
    md5_key: String,
    allow_status_only_update: bool,
}

impl AccountRpcServiceImpl {
    pub fn new(provider: Arc<AccountHandleProvider>, env: impl Into<String>) -> Self {
        Self { provider, env: env.into(), md5_key: String::new(), allow_status_only_update: false }
    }

    pub fn from_config(app_cfg: &AppConfig) -> Self {
        let factory = SqlHandleFactory::new(app_cfg.database.clone()).with_schema(account_schema);
        Self::new(Arc::new(HandleProvider::new(factory)), app_cfg.get_env())
            .with_md5_key(app_cfg.get_sys().md5_key)
            .with_status_only_update(app_cfg.get_account().allow_status_only_update)
    }

    pub fn with_md5_key(mut self, md5_key: impl Into<String>) -> Self {
        self.md5_key = md5_key.into();
        self
    }

    pub fn with_status_only_update(mut self, allow: bool) -> Self {
        self.allow_status_only_update = allow;
        self
    }

    async fn load_account_service(&self) -> Result<AccountService, AppError> {
        match self.provider.get(&self.env).await {
            Some(handle) => Ok(AccountService::new(handle).with_status_only_update(self.allow_status_only_update)),
            None => Err(AppError::Unavailable("load account service fail".to_string())),
        }
    }

    fn encode_password(&self, password: &str) -> String {
        build_md5_with_key(password, &self.md5_key)
    }

    async fn insert_account(&self, req: AccountRequest) -> Result<ResponseSafe, AppError> {
        let info = req.info.unwrap_or_default();
        info!(
            "Received Account.InsertAccountInfo request email={} phone={} nick_name={} avatar={} ext={} password={}",
            info.email,
            info.phone,
            info.nick_name,
            info.avatar,
            info.ext,
            mask(&info.password)
        );
        if is_empty_str(&info.password) {
            return Err(AppError::Validation("password invalid".to_string()));
        }
        let account_service = self.load_account_service().await?;

        let mut user = UserProfile {
            email: Some(info.email).filter(|email| !email.is_empty()),
            phone: Some(info.phone).filter(|phone| *phone > 0),
            password: self.encode_password(&info.password),
            update_time: now(),
            nick_name: info.nick_name,
            avatar: info.avatar,
            ext: info.ext,
            active: 1,
            ..Default::default()
        };
        account_service.insert_new_user(&mut user).await?;
        Ok(result_data(&user))
    }

    async fn update_account(&self, req: AccountRequest) -> Result<AccountResponse, AppError> {
        let info = req.info.unwrap_or_default();
        info!(
            "Received Account.UpdateAccountInfo request pass_id={} email={} phone={} nick_name={} avatar={} ext={} deactivate={} password={}",
            info.pass_id,
            info.email,
            info.phone,
            info.nick_name,
            info.avatar,
            info.ext,
            info.deactivate,
            mask(&info.password)
        );
        if is_empty_str(&info.pass_id) {
            return Err(AppError::Validation("get passid empty".to_string()));
        }
        let account_service = self.load_account_service().await?;

        let password = if is_empty_str(&info.password) { String::new() } else { self.encode_password(&info.password) };
        let update = UpdateProfile {
            password,
            email: info.email,
            nick_name: info.nick_name,
            avatar: info.avatar,
            ext: info.ext,
            phone: info.phone,
            deactivate: info.deactivate,
        };
        let affected = account_service.update_user(&update, &info.pass_id).await?;
        let mut rsp = result();
        if affected != 1 {
            rsp.set_status(CODE_SUCCESS, "no update record".to_string());
        }
        Ok(rsp)
    }

    async fn get_account(&self, req: RequestQuery) -> Result<ResponseSafe, AppError> {
        info!("Received Account.GetAccountInfo request pass_id={} open_id={} phone={}", req.pass_id, req.open_id, req.phone);
        if is_empty_str(&req.pass_id) && is_empty_str(&req.open_id) && req.phone <= 0 {
            return Err(AppError::Validation("no valid query option".to_string()));
        }
        let account_service = self.load_account_service().await?;

        let user = if !is_empty_str(&req.pass_id) {
            account_service.get_user_by_id(&req.pass_id, "").await?
        } else if !is_empty_str(&req.open_id) {
            account_service.get_user_by_id("", &req.open_id).await?
        } else {
            account_service.get_user_by_phone(req.phone).await?
        };
        Ok(result_data(&user))
    }

    async fn check_login(&self, req: RequestLogin) -> Result<ResponseSafe, AppError> {
        info!("Received Account.LoginAccount request phone={} email={} password={}", req.phone, req.email, mask(&req.password));
        if is_empty_str(&req.password) {
            return Err(AppError::Validation("get Password empty".to_string()));
        }
        if req.phone <= 0 && is_empty_str(&req.email) {
            return Err(AppError::Validation("get login data empty".to_string()));
        }
        let account_service = self.load_account_service().await?;

        let password = self.encode_password(&req.password);
        let user = if req.phone > 0 {
            account_service.check_user_login_by_phone(req.phone, &password).await?
        } else {
            account_service.check_user_login_by_email(&req.email, &password).await?
        };
        Ok(result_data(&user))
    }
}

#[tonic::async_trait]
impl AccountRpcService for AccountRpcServiceImpl {
    async fn insert_account_info(&self, request: Request<AccountRequest>) -> Result<Response<ResponseSafe>, Status> {
        dispatch("Account.InsertAccountInfo", self.insert_account(request.into_inner())).await
    }

    async fn update_account_info(&self, request: Request<AccountRequest>) -> Result<Response<AccountResponse>, Status> {
        dispatch("Account.UpdateAccountInfo", self.update_account(request.into_inner())).await
    }

    async fn get_account_info(&self, request: Request<RequestQuery>) -> Result<Response<ResponseSafe>, Status> {
        dispatch("Account.GetAccountInfo", self.get_account(request.into_inner())).await
    }

    async fn login_account(&self, request: Request<RequestLogin>) -> Result<Response<ResponseSafe>, Status> {
        dispatch("Account.LoginAccount", self.check_login(request.into_inner())).await
    }
}
