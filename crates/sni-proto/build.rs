use std::path::PathBuf;

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("failed to locate workspace root");
    let proto_root = workspace_root.join("proto");

    let protos = [proto_root.join("sni.proto")];

    for p in &protos {
        println!("cargo:rerun-if-changed={}", p.display());
    }

    // Client stubs only; the server lives in the SNI project itself.
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&protos, &[proto_root])
        .expect("failed to compile protos");
}
