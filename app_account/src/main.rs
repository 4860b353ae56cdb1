use anyhow::Result;
use app_account::protocol::account::account_rpc_service_server::AccountRpcServiceServer;
use app_account::service::rpc::account_rpc_service_impl::AccountRpcServiceImpl;
use common::config::AppConfig;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<()> {
    // 读取配置文件
    let file = std::env::args().nth(1).unwrap_or_else(|| "./app_account/account-config.toml".to_string());
    AppConfig::init(&file)?;
    let app_cfg = AppConfig::get()?;
    //初始化日志
    let log_level = app_cfg.get_sys().log_level.unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let server = app_cfg.get_server();
    let addr: SocketAddr = format!("{}:{}", server.host, server.port).parse()?;
    let svc = AccountRpcServiceImpl::from_config(&app_cfg);
    log::warn!("AccountRpcService starting on {} env={}", addr, app_cfg.get_env());
    tonic::transport::Server::builder().add_service(AccountRpcServiceServer::new(svc)).serve(addr).await?;
    Ok(())
}
