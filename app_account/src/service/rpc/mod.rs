pub mod account_rpc_service_impl;
