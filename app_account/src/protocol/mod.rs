pub mod account {
    tonic::include_proto!("account");
}
