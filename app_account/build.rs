fn main() {
    // 启用 vendored-protoc 时使用源码编译的 protoc，无需本机安装
    #[cfg(feature = "vendored-protoc")]
    unsafe {
        std::env::set_var("PROTOC", protobuf_src::protoc());
    }
    println!("cargo:rerun-if-changed=proto/account.proto");

    // 编译 proto 文件
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/account.proto"], &["proto"])
        .expect("💥 Proto 编译失败，请检查路径和语法！");
}
