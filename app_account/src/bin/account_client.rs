use anyhow::{Result, anyhow};
use app_account::protocol::account::account_rpc_service_client::AccountRpcServiceClient;
use app_account::protocol::account::{FullAccount, Request, RequestLogin, RequestQuery, ResponseSafe};
use app_account::result::error_envelope;
use tonic::Status;

const USAGE: &str = "usage: account_client <addr> create <password> [email] [phone]
       account_client <addr> login <email|phone> <password>
       account_client <addr> get <pass_id>";

fn print_reply(reply: Result<tonic::Response<ResponseSafe>, Status>) {
    let rsp = match reply {
        Ok(rsp) => rsp.into_inner(),
        Err(status) => {
            println!("status : {:?} {}", status.code(), status.message());
            match error_envelope::<ResponseSafe>(&status) {
                Some(rsp) => rsp,
                None => return,
            }
        }
    };
    println!("code : {}", rsp.code);
    println!("message : {}", rsp.message);
    println!("data : {:?}", rsp.data);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        return Err(anyhow!(USAGE));
    }
    let mut client = AccountRpcServiceClient::connect(format!("http://{}", args[0])).await?;

    match args[1].as_str() {
        "create" => {
            let info = FullAccount {
                password: args[2].clone(),
                email: args.get(3).cloned().unwrap_or_default(),
                phone: args.get(4).map(|p| p.parse::<i64>()).transpose()?.unwrap_or_default(),
                ..Default::default()
            };
            print_reply(client.insert_account_info(Request { info: Some(info) }).await);
        }
        "login" => {
            let password = args.get(3).cloned().ok_or_else(|| anyhow!(USAGE))?;
            let req = match args[2].parse::<i64>() {
                Ok(phone) => RequestLogin { phone, password, ..Default::default() },
                Err(_) => RequestLogin { email: args[2].clone(), password, ..Default::default() },
            };
            print_reply(client.login_account(req).await);
        }
        "get" => {
            print_reply(client.get_account_info(RequestQuery { pass_id: args[2].clone(), ..Default::default() }).await);
        }
        _ => return Err(anyhow!(USAGE)),
    }
    Ok(())
}
